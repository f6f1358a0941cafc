//! Repeat detection for held keys
//!
//! The OS re-sends the same transition while a key stays down. A repeat is
//! any event whose `(scan_code, flags)` equals the previous event's.

use super::raw::RawKeyEvent;

/// The `(scan_code, flags)` pair of the last observed event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeatState {
    previous: Option<(u32, u32)>,
}

impl RepeatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare against the previous event, then record this one.
    ///
    /// The baseline moves on every call, repeat or not, so the next event is
    /// always compared with its immediate predecessor.
    pub fn observe(&mut self, raw: &RawKeyEvent) -> bool {
        let current = (raw.scan_code, raw.flags);
        let is_repeat = self.previous == Some(current);
        self.previous = Some(current);
        is_repeat
    }

    /// Forget the previous event
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

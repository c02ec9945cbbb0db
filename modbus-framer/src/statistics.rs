//! Framer statistics collection

/// Framer statistics
///
/// Tracks how much of the received byte stream turned into replies and how
/// much was thrown away while resynchronising.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramerStatistics {
    /// Complete frames handed to the reply callback
    pub frames_decoded: u64,
    /// Delimited frames dropped because they failed validation
    pub frames_rejected: u64,
    /// Bytes skipped while looking for a frame start
    pub bytes_discarded: u64,
}

impl FramerStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_frames_decoded(&mut self) {
        self.frames_decoded += 1;
    }

    pub fn increment_frames_rejected(&mut self) {
        self.frames_rejected += 1;
    }

    pub fn add_bytes_discarded(&mut self, count: usize) {
        self.bytes_discarded += count as u64;
    }

    /// Percentage of delimited frames that were rejected
    ///
    /// Returns 0.0 if no frames have been seen.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.frames_decoded + self.frames_rejected;
        if total == 0 {
            0.0
        } else {
            (self.frames_rejected as f64 / total as f64) * 100.0
        }
    }
}

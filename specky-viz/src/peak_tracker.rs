use crate::config::{COLUMNS, ROWS};
use crate::types::{ColumnHeights, LitMask};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeakState {
    pub peak_row: u16,
    pub ticks_since_update: u16,
}

/// Peak-hold marker per column.
///
/// A new peak (or an expired one) blanks its cell for one frame; a held peak
/// lights the cell until the timeout runs out. The blank frame shows up as a
/// thin gap that the rising bar closes on the next frame.
pub struct PeakTracker {
    peaks: [PeakState; COLUMNS],
    timeout: u16,
}

impl PeakTracker {
    pub fn new(timeout: u16) -> Self {
        Self {
            peaks: [PeakState::default(); COLUMNS],
            timeout,
        }
    }

    /// Updates every column and applies the markers on top of the bar fill.
    pub fn update(&mut self, heights: &ColumnHeights, mask: &mut LitMask) {
        for ((peak, &height), cells) in self.peaks.iter_mut().zip(heights).zip(mask.iter_mut()) {
            let lit = Self::step(peak, height, self.timeout);

            let row = usize::from(peak.peak_row);
            if row > 0 && row < ROWS {
                cells[row] = lit;
            }
        }
    }

    /// Advances one column and reports whether its marker is lit this frame.
    fn step(peak: &mut PeakState, height: u16, timeout: u16) -> bool {
        if height > peak.peak_row || peak.ticks_since_update > timeout {
            peak.peak_row = height;
            peak.ticks_since_update = 0;
            false
        } else {
            peak.ticks_since_update = peak.ticks_since_update.saturating_add(1);
            true
        }
    }

    pub fn peaks(&self) -> &[PeakState; COLUMNS] {
        &self.peaks
    }
}

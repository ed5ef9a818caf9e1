// --- Display Config ---
pub const ROWS: usize = 23;
pub const COLUMNS: usize = 12;
pub const AMOUNT_TRIMMED: usize = 4; // Unwired pixels at each end of the strip
pub const PIXEL_COUNT: usize = COLUMNS * ROWS - 2 * AMOUNT_TRIMMED;

// --- Brightness Config ---
pub const MAX_BRIGHTNESS: u8 = 35;
pub const DEFAULT_BRIGHTNESS: u8 = 1;

// --- EQ Config ---
pub const EQ_BANDS: usize = 14; // Two MSGEQ7 ICs strobed in lockstep
pub const NOISE_FLOOR: u16 = 70;
pub const GAIN: f32 = 1.2;
pub const EQ_DELTA: f32 = 5.0; // Band energy per display row
pub const ADC_MAX: u16 = 1023;
pub const STROBE_SETTLE_US: u32 = 30; // MSGEQ7 output settling time

// --- Smoothing Config ---
// Alpha is the weight of the newest sample, so the top of the pot is the smoothest.
pub const SMOOTHING_ALPHA_MIN: f32 = 1.0 - 0.5;
pub const SMOOTHING_ALPHA_MAX: f32 = 1.0 - 0.98;

// --- Peak Indicator Config ---
pub const PEAK_TIMEOUT: u16 = 25; // Frames

// --- Color Split Config ---
pub const LOW_BAND_END: usize = 11;
pub const MID_BAND_END: usize = 18;

// --- Diagnostics ---
pub const REPORT_INTERVAL: u32 = 60; // Frames between periodic reports

/// Runtime-adjustable numeric tuning for the pipeline.
///
/// `Default` reproduces the compile-time constants above.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    pub noise_floor: u16,
    pub gain: f32,
    pub eq_delta: f32,
    pub smoothing_alpha_min: f32,
    pub smoothing_alpha_max: f32,
    pub peak_timeout: u16,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            noise_floor: NOISE_FLOOR,
            gain: GAIN,
            eq_delta: EQ_DELTA,
            smoothing_alpha_min: SMOOTHING_ALPHA_MIN,
            smoothing_alpha_max: SMOOTHING_ALPHA_MAX,
            peak_timeout: PEAK_TIMEOUT,
        }
    }
}

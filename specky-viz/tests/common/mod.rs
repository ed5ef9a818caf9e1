use std::convert::Infallible;

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, OutputPin},
};
use specky_viz::config::{Tuning, EQ_BANDS};
use specky_viz::hardware::{AnalogChannel, AnalogInput, LedDisplay};
use specky_viz::spectrum_sampler::SpectrumSampler;
use specky_viz::types::PixelBuffer;

/// Plays back fixed raw readings: one per band, in strobe order.
pub struct ScriptedEq {
    pub raw_bands: [u16; EQ_BANDS],
    pub smoothing: u16,
    next_band: usize,
}

impl ScriptedEq {
    pub fn new(raw_bands: [u16; EQ_BANDS], smoothing: u16) -> Self {
        Self {
            raw_bands,
            smoothing,
            next_band: 0,
        }
    }
}

impl AnalogInput for ScriptedEq {
    fn read_channel(&mut self, channel: AnalogChannel) -> u16 {
        match channel {
            AnalogChannel::Smoothing => self.smoothing,
            AnalogChannel::EqLow | AnalogChannel::EqHigh => {
                let value = self.raw_bands[self.next_band];
                self.next_band = (self.next_band + 1) % EQ_BANDS;
                value
            }
        }
    }
}

pub struct NoopPin;

impl ErrorType for NoopPin {
    type Error = Infallible;
}

impl OutputPin for NoopPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Default)]
pub struct CapturedDisplay {
    pub last_frame: Option<PixelBuffer>,
    pub frames: usize,
    pub brightness: Option<u8>,
}

impl LedDisplay for CapturedDisplay {
    fn push(&mut self, pixels: &PixelBuffer) {
        self.last_frame = Some(*pixels);
        self.frames += 1;
    }

    fn set_brightness(&mut self, level: u8) {
        self.brightness = Some(level);
    }
}

pub type TestSampler = SpectrumSampler<ScriptedEq, NoopPin, NoopPin, NoopDelay>;

pub fn sampler(raw_bands: [u16; EQ_BANDS], smoothing: u16) -> TestSampler {
    SpectrumSampler::new(
        ScriptedEq::new(raw_bands, smoothing),
        NoopPin,
        NoopPin,
        NoopDelay,
        &Tuning::default(),
    )
}

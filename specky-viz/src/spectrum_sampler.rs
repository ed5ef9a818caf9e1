use core::convert::Infallible;

use embedded_hal::{
    delay::DelayNs,
    digital::{OutputPin, PinState},
};

use crate::config::{Tuning, ADC_MAX, EQ_BANDS, STROBE_SETTLE_US};
use crate::hardware::{drive, AnalogChannel, AnalogInput};
use crate::types::BandArray;

/// Reads the two lockstep MSGEQ7 outputs into a [`BandArray`].
///
/// A reset pulse rewinds both ICs to their first band. Every strobe cycle then
/// advances both by one band, so one cycle yields an even band from
/// [`AnalogChannel::EqLow`] and the following odd band from [`AnalogChannel::EqHigh`].
pub struct SpectrumSampler<A, R, S, D> {
    analog: A,
    reset: R,
    strobe: S,
    delay: D,
    noise_floor: u16,
    gain: f32,
    bands: BandArray,
}

impl<A, R, S, D> SpectrumSampler<A, R, S, D>
where
    A: AnalogInput,
    R: OutputPin<Error = Infallible>,
    S: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    pub fn new(analog: A, reset: R, strobe: S, delay: D, tuning: &Tuning) -> Self {
        Self {
            analog,
            reset,
            strobe,
            delay,
            noise_floor: tuning.noise_floor,
            gain: tuning.gain,
            bands: [0; EQ_BANDS],
        }
    }

    /// Runs one full sample cycle and returns the freshly overwritten bands.
    pub fn sample(&mut self) -> &BandArray {
        // The two pin writes already outlast the 100ns minimum reset width.
        drive(&mut self.reset, PinState::High);
        drive(&mut self.reset, PinState::Low);

        for band in (0..EQ_BANDS).step_by(2) {
            drive(&mut self.strobe, PinState::Low);
            self.delay.delay_us(STROBE_SETTLE_US);

            let low = self.analog.read_channel(AnalogChannel::EqLow);
            let high = self.analog.read_channel(AnalogChannel::EqHigh);
            self.bands[band] = self.compensate(low);
            self.bands[band + 1] = self.compensate(high);

            drive(&mut self.strobe, PinState::High);
        }

        &self.bands
    }

    /// Raw smoothing potentiometer position.
    pub fn read_smoothing_control(&mut self) -> u16 {
        self.analog.read_channel(AnalogChannel::Smoothing).min(ADC_MAX)
    }

    /// Result of the most recent [`sample`](Self::sample).
    pub fn bands(&self) -> &BandArray {
        &self.bands
    }

    fn compensate(&self, raw: u16) -> u16 {
        let above_floor = raw.min(ADC_MAX).saturating_sub(self.noise_floor);
        (f32::from(above_floor) * self.gain) as u16
    }

    /// Gives the hardware handles back.
    pub fn release(self) -> (A, R, S, D) {
        (self.analog, self.reset, self.strobe, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GAIN, NOISE_FLOOR};
    use embedded_hal::digital::ErrorType;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Event {
        ResetHigh,
        ResetLow,
        StrobeHigh,
        StrobeLow,
        Delay(u32),
        Read(AnalogChannel),
    }

    // Every capability appends to one shared log so ordering can be checked.
    type Log = std::rc::Rc<std::cell::RefCell<Vec<Event>>>;

    struct FakeAdc {
        log: Log,
        low: u16,
        high: u16,
        pot: u16,
    }

    impl AnalogInput for FakeAdc {
        fn read_channel(&mut self, channel: AnalogChannel) -> u16 {
            self.log.borrow_mut().push(Event::Read(channel));
            match channel {
                AnalogChannel::EqLow => self.low,
                AnalogChannel::EqHigh => self.high,
                AnalogChannel::Smoothing => self.pot,
            }
        }
    }

    struct FakePin {
        log: Log,
        high: Event,
        low: Event,
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push(self.low);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push(self.high);
            Ok(())
        }
    }

    struct FakeDelay {
        log: Log,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.log.borrow_mut().push(Event::Delay(ns / 1_000));
        }

        fn delay_us(&mut self, us: u32) {
            self.log.borrow_mut().push(Event::Delay(us));
        }
    }

    fn sampler(low: u16, high: u16, pot: u16) -> (SpectrumSampler<FakeAdc, FakePin, FakePin, FakeDelay>, Log) {
        let log: Log = Default::default();
        let sampler = SpectrumSampler::new(
            FakeAdc { log: log.clone(), low, high, pot },
            FakePin { log: log.clone(), high: Event::ResetHigh, low: Event::ResetLow },
            FakePin { log: log.clone(), high: Event::StrobeHigh, low: Event::StrobeLow },
            FakeDelay { log: log.clone() },
            &Tuning::default(),
        );
        (sampler, log)
    }

    #[test]
    fn test_even_and_odd_bands_come_from_separate_lines() {
        let (mut sampler, _) = sampler(170, 570, 0);
        let bands = *sampler.sample();

        let expected_low = (100.0 * GAIN) as u16;
        let expected_high = (500.0 * GAIN) as u16;
        for (i, &value) in bands.iter().enumerate() {
            let expected = if i % 2 == 0 { expected_low } else { expected_high };
            assert_eq!(value, expected, "band {}", i);
        }
    }

    #[test]
    fn test_readings_below_noise_floor_are_zero() {
        let (mut sampler, _) = sampler(NOISE_FLOOR - 1, 0, 0);
        assert_eq!(sampler.sample(), &[0; EQ_BANDS]);
    }

    #[test]
    fn test_out_of_range_reading_is_clamped() {
        let (mut sampler, _) = sampler(u16::MAX, ADC_MAX, 0);
        let bands = *sampler.sample();
        assert_eq!(bands[0], bands[1]);
        assert_eq!(bands[0], (f32::from(ADC_MAX - NOISE_FLOOR) * GAIN) as u16);
    }

    #[test]
    fn test_pulse_sequence() {
        let (mut sampler, log) = sampler(0, 0, 0);
        sampler.sample();

        let log = log.borrow();
        assert_eq!(&log[..2], &[Event::ResetHigh, Event::ResetLow]);

        let cycle = [
            Event::StrobeLow,
            Event::Delay(STROBE_SETTLE_US),
            Event::Read(AnalogChannel::EqLow),
            Event::Read(AnalogChannel::EqHigh),
            Event::StrobeHigh,
        ];
        let cycles: Vec<_> = log[2..].chunks(cycle.len()).collect();
        assert_eq!(cycles.len(), EQ_BANDS / 2);
        for chunk in cycles {
            assert_eq!(chunk, &cycle);
        }
    }

    #[test]
    fn test_smoothing_control_is_clamped() {
        let (mut sampler, _) = sampler(0, 0, 4095);
        assert_eq!(sampler.read_smoothing_control(), ADC_MAX);
    }
}

use core::convert::Infallible;

use embedded_hal::digital::{OutputPin, PinState};

use crate::types::PixelBuffer;

/// The analog lines the visualizer reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalogChannel {
    /// Output of the first EQ IC, carries the even bands.
    EqLow,
    /// Output of the second EQ IC, carries the odd bands.
    EqHigh,
    /// Smoothing potentiometer.
    Smoothing,
}

/// Source of analog readings in `0..=ADC_MAX`.
///
/// Boards with a wider converter scale their readings down before returning them.
pub trait AnalogInput {
    fn read_channel(&mut self, channel: AnalogChannel) -> u16;
}

/// Sink for finished frames. Transmission errors are the driver's business.
pub trait LedDisplay {
    fn push(&mut self, pixels: &PixelBuffer);
    fn set_brightness(&mut self, level: u8);
}

impl<T: AnalogInput + ?Sized> AnalogInput for &mut T {
    fn read_channel(&mut self, channel: AnalogChannel) -> u16 {
        (**self).read_channel(channel)
    }
}

impl<T: LedDisplay + ?Sized> LedDisplay for &mut T {
    fn push(&mut self, pixels: &PixelBuffer) {
        (**self).push(pixels);
    }

    fn set_brightness(&mut self, level: u8) {
        (**self).set_brightness(level);
    }
}

pub(crate) fn drive<P>(pin: &mut P, state: PinState)
where
    P: OutputPin<Error = Infallible>,
{
    match pin.set_state(state) {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(feature = "logging")]
use defmt_rtt as _;

/// Diagnostic output: `defmt` on target, stderr on the host, nothing otherwise.
macro_rules! diag {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "logging")]
        defmt::info!($fmt $(, $arg)*);
        #[cfg(feature = "std")]
        std::eprintln!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "logging", feature = "std")))]
        {
            $(let _ = &$arg;)*
        }
    }};
}
pub(crate) use diag;

pub mod color_matrix;
pub mod column_mapper;
pub mod command;
pub mod compositor;
pub mod config;
pub mod hardware;
#[cfg(feature = "peak-indicator")]
pub mod peak_tracker;
pub mod spectrum_sampler;
pub mod types;

use core::convert::Infallible;

use embedded_hal::{delay::DelayNs, digital::OutputPin};

use crate::color_matrix::{rgb_from_u32, ColorEffect, ColorMatrix};
use crate::column_mapper::ColumnMapper;
use crate::command::{brightness_level, Ack, Command, CommandError};
use crate::config::{Tuning, DEFAULT_BRIGHTNESS, REPORT_INTERVAL};
use crate::hardware::{AnalogInput, LedDisplay};
#[cfg(feature = "peak-indicator")]
use crate::peak_tracker::PeakTracker;
use crate::spectrum_sampler::SpectrumSampler;
use crate::types::{BandArray, ColumnHeights, PixelBuffer};

/// Effect shown after power-up.
pub const BOOT_EFFECT: ColorEffect = ColorEffect::Inverted;

/// Counts frames and decides when the periodic report is due.
#[derive(Default)]
pub struct FrameCounter {
    frames: u32,
}

impl FrameCounter {
    pub fn is_report_frame(&self) -> bool {
        self.frames % REPORT_INTERVAL == 0
    }

    pub fn advance(&mut self) {
        self.frames = self.frames.wrapping_add(1);
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}

/// All state the visualizer keeps between frames.
///
/// One value of this type is owned by the main loop; commands and frames
/// both mutate it through `&mut self`, so there is a single writer per field.
pub struct Visualizer {
    mapper: ColumnMapper,
    #[cfg(feature = "peak-indicator")]
    peaks: PeakTracker,
    colors: ColorMatrix,
    effect: ColorEffect,
    brightness: u8,
    counter: FrameCounter,
}

impl Visualizer {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            mapper: ColumnMapper::new(tuning),
            #[cfg(feature = "peak-indicator")]
            peaks: PeakTracker::new(tuning.peak_timeout),
            colors: ColorMatrix::new(BOOT_EFFECT),
            effect: BOOT_EFFECT,
            brightness: DEFAULT_BRIGHTNESS,
            counter: FrameCounter::default(),
        }
    }

    /// Pushes the boot brightness to the display. Call once before the first frame.
    pub fn init<L: LedDisplay>(&self, display: &mut L) {
        display.set_brightness(self.brightness);
        diag!("init completed, brightness {}", self.brightness);
    }

    /// Turns one sample cycle into the pixels for this frame.
    pub fn render(&mut self, bands: &BandArray, smoothing_raw: u16) -> PixelBuffer {
        let alpha = self.mapper.smoothing_alpha(smoothing_raw);
        let heights = self.mapper.map_columns(bands, alpha);

        #[allow(unused_mut)]
        let mut mask = compositor::lit_mask(&heights);
        #[cfg(feature = "peak-indicator")]
        self.peaks.update(&heights, &mut mask);

        if self.counter.is_report_frame() {
            self.report(bands, &heights);
        }
        self.counter.advance();

        compositor::composite(&mask, &self.colors)
    }

    /// Runs one full iteration: sample, map, composite, push.
    pub fn run_frame<A, R, S, D, L>(
        &mut self,
        sampler: &mut SpectrumSampler<A, R, S, D>,
        display: &mut L,
    ) where
        A: AnalogInput,
        R: OutputPin<Error = Infallible>,
        S: OutputPin<Error = Infallible>,
        D: DelayNs,
        L: LedDisplay,
    {
        let smoothing_raw = sampler.read_smoothing_control();
        let bands = *sampler.sample();
        let pixels = self.render(&bands, smoothing_raw);
        display.push(&pixels);
    }

    /// Parses and applies one command line. Rejected lines change nothing.
    pub fn handle_line<L: LedDisplay>(
        &mut self,
        line: &str,
        display: &mut L,
    ) -> Result<Ack, CommandError> {
        diag!("got input: {}", line);
        let result = line
            .parse::<Command>()
            .map(|command| self.execute(command, display));
        if let Err(error) = &result {
            diag!("rejected command: {}", error);
        }
        result
    }

    /// Applies an already validated command.
    pub fn execute<L: LedDisplay>(&mut self, command: Command, display: &mut L) -> Ack {
        match command {
            Command::Brightness { percent } => {
                self.set_brightness(brightness_level(percent), display);
                Ack::Brightness(percent)
            }
            Command::Effect { index } => {
                self.select_effect(ColorEffect::from_index_or_default(index));
                Ack::Effect(index)
            }
            Command::CustomColors { low, mid, high } => {
                self.select_effect(ColorEffect::Custom {
                    low: rgb_from_u32(low),
                    mid: rgb_from_u32(mid),
                    high: rgb_from_u32(high),
                });
                Ack::CustomColors([low, mid, high])
            }
        }
    }

    pub fn set_brightness<L: LedDisplay>(&mut self, level: u8, display: &mut L) {
        self.brightness = level.min(config::MAX_BRIGHTNESS);
        display.set_brightness(self.brightness);
        diag!("Brightness updated to: {}", self.brightness);
    }

    /// Overwrites the color matrix with `effect`.
    pub fn select_effect(&mut self, effect: ColorEffect) {
        self.effect = effect;
        self.colors.apply(effect);
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn effect(&self) -> ColorEffect {
        self.effect
    }

    pub fn colors(&self) -> &ColorMatrix {
        &self.colors
    }

    pub fn smoothed_heights(&self) -> &[f32; config::COLUMNS] {
        self.mapper.smoothed_heights()
    }

    #[cfg(feature = "peak-indicator")]
    pub fn peaks(&self) -> &[peak_tracker::PeakState; config::COLUMNS] {
        self.peaks.peaks()
    }

    pub fn frames(&self) -> u32 {
        self.counter.frames()
    }

    fn report(&self, bands: &BandArray, heights: &ColumnHeights) {
        diag!("--{}--", self.counter.frames());
        for (band, value) in bands.iter().enumerate() {
            diag!("{}: {}", band, value);
        }
        for (column, height) in heights.iter().enumerate() {
            diag!("Column {} height: {}", column, height);
        }
    }
}

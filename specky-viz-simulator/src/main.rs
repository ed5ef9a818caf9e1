use std::convert::Infallible;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::{thread, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use embedded_graphics_simulator::{OutputSettings, OutputSettingsBuilder, SimulatorDisplay};
use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, OutputPin},
};
use micromath::F32Ext;
use specky_viz::color_matrix::ColorEffect;
use specky_viz::command::{brightness_level, format_reply, LineBuffer};
use specky_viz::compositor::{pixel_position, MatrixRenderer, Renderer};
use specky_viz::config::{Tuning, ADC_MAX, COLUMNS, EQ_BANDS, MAX_BRIGHTNESS, ROWS};
use specky_viz::hardware::{AnalogChannel, AnalogInput, LedDisplay};
use specky_viz::spectrum_sampler::SpectrumSampler;
use specky_viz::types::{PixelBuffer, DARK_BUFFER};
use specky_viz::Visualizer;

const CELL_SIZE: u32 = 8;
const CELL_SPACING: u32 = 2;
const TIME_STEP: f32 = 0.05;

/// Runs the visualizer pipeline on the host against a synthetic spectrum.
///
/// Command lines (`B 50`, `E 2`, `C FF0000 00FF00 0000FF`) are read from stdin.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Stop after this many frames; runs until interrupted otherwise.
    #[arg(long)]
    frames: Option<u64>,

    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Initial color effect index.
    #[arg(long)]
    effect: Option<usize>,

    /// Smoothing potentiometer position, 0 (fast) to 1023 (slow).
    #[arg(long, default_value_t = 512)]
    smoothing: u16,

    /// Initial brightness in percent.
    #[arg(long)]
    brightness: Option<u8>,

    /// Don't draw the matrix in the terminal.
    #[arg(long)]
    quiet: bool,

    /// Write the last frame to this PNG file on exit.
    #[arg(long)]
    png: Option<PathBuf>,
}

pub fn calculate_amplitude(x: f32, time: f32, frequency: f32) -> f32 {
    let phase = time + x * frequency * 2.0 * core::f32::consts::PI;
    F32Ext::sin(phase) * 0.5 + 0.5
}

/// Stands in for the two EQ chips: a slow sine sweep across the bands.
struct SyntheticEq {
    time: f32,
    next_band: usize,
    smoothing: u16,
}

impl SyntheticEq {
    fn new(smoothing: u16) -> Self {
        Self {
            time: 0.0,
            next_band: 0,
            smoothing,
        }
    }

    fn next_reading(&mut self) -> u16 {
        let x = self.next_band as f32 / EQ_BANDS as f32;
        let level = calculate_amplitude(x, self.time, 1.0);
        self.next_band += 1;
        if self.next_band == EQ_BANDS {
            self.next_band = 0;
            self.time += TIME_STEP;
        }
        (level * f32::from(ADC_MAX)) as u16
    }
}

impl AnalogInput for SyntheticEq {
    fn read_channel(&mut self, channel: AnalogChannel) -> u16 {
        match channel {
            AnalogChannel::EqLow | AnalogChannel::EqHigh => self.next_reading(),
            AnalogChannel::Smoothing => self.smoothing,
        }
    }
}

struct SimPin;

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// Keeps the latest frame with brightness applied, like the strip driver would.
struct SimulatedStrip {
    pixels: PixelBuffer,
    brightness: u8,
}

impl SimulatedStrip {
    fn new() -> Self {
        Self {
            pixels: DARK_BUFFER,
            brightness: 0,
        }
    }

    fn dim(&self, color: Rgb888) -> Rgb888 {
        let scale = |channel: u8| {
            (u16::from(channel) * u16::from(self.brightness) / u16::from(MAX_BRIGHTNESS)) as u8
        };
        Rgb888::new(scale(color.r()), scale(color.g()), scale(color.b()))
    }
}

impl LedDisplay for SimulatedStrip {
    fn push(&mut self, pixels: &PixelBuffer) {
        for (index, &color) in pixels.iter().enumerate() {
            self.pixels[index] = self.dim(color);
        }
    }

    fn set_brightness(&mut self, level: u8) {
        self.brightness = level;
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn print_matrix(out: &mut impl Write, pixels: &PixelBuffer) -> io::Result<()> {
    let mut grid = [[Rgb888::BLACK; COLUMNS]; ROWS];
    for (index, &color) in pixels.iter().enumerate() {
        if let Some((column, row)) = pixel_position(index) {
            grid[row][column] = color;
        }
    }

    // Move the cursor home so frames overwrite each other.
    write!(out, "\x1b[H")?;
    for row in grid.iter().rev() {
        for color in row {
            write!(out, "\x1b[38;2;{};{};{}m\u{25cf} ", color.r(), color.g(), color.b())?;
        }
        writeln!(out, "\x1b[0m")?;
    }
    out.flush()
}

fn output_settings() -> OutputSettings {
    OutputSettingsBuilder::new().scale(1).pixel_spacing(0).build()
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("--fps must be at least 1"));
    }
    let frame_delay = Duration::from_secs(1) / args.fps;

    let tuning = Tuning::default();
    let mut sampler = SpectrumSampler::new(
        SyntheticEq::new(args.smoothing.min(ADC_MAX)),
        SimPin,
        SimPin,
        SleepDelay,
        &tuning,
    );
    let mut strip = SimulatedStrip::new();
    let mut visualizer = Visualizer::new(&tuning);
    visualizer.init(&mut strip);

    if let Some(index) = args.effect {
        let effect = ColorEffect::from_index(index)
            .ok_or_else(|| anyhow!("no color effect with index {}", index))?;
        visualizer.select_effect(effect);
    }
    if let Some(percent) = args.brightness {
        if percent > 100 {
            return Err(anyhow!("brightness must be between 0 and 100"));
        }
        visualizer.set_brightness(brightness_level(percent), &mut strip);
    }

    let renderer = MatrixRenderer::new(CELL_SIZE, CELL_SPACING);
    let mut display: SimulatorDisplay<Rgb888> = SimulatorDisplay::new(renderer.size());
    #[cfg(feature = "window")]
    let mut window = embedded_graphics_simulator::Window::new("Specky Simulator", &output_settings());

    let commands = spawn_stdin_reader();
    let mut line_buffer = LineBuffer::new();
    let mut stdout = io::stdout();
    if !args.quiet {
        write!(stdout, "\x1b[2J")?;
    }

    let mut frame: u64 = 0;
    while args.frames.map_or(true, |limit| frame < limit) {
        while let Ok(line) = commands.try_recv() {
            for byte in line.bytes().chain(Some(b'\n')) {
                if let Some(assembled) = line_buffer.push_byte(byte) {
                    let result = assembled
                        .and_then(|line| visualizer.handle_line(&line, &mut strip));
                    writeln!(stdout, "{}", format_reply(&result))?;
                }
            }
        }

        visualizer.run_frame(&mut sampler, &mut strip);
        renderer.draw(&mut display, &strip.pixels)?;

        if !args.quiet {
            print_matrix(&mut stdout, &strip.pixels)?;
        }

        #[cfg(feature = "window")]
        {
            window.update(&display);
            if window
                .events()
                .any(|event| matches!(event, embedded_graphics_simulator::SimulatorEvent::Quit))
            {
                break;
            }
        }

        frame += 1;
        thread::sleep(frame_delay);
    }

    if let Some(path) = &args.png {
        display
            .to_rgb_output_image(&output_settings())
            .save_png(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_readings_stay_in_adc_range() {
        let mut eq = SyntheticEq::new(0);
        for _ in 0..EQ_BANDS * 20 {
            assert!(eq.read_channel(AnalogChannel::EqLow) <= ADC_MAX);
        }
        assert_eq!(eq.read_channel(AnalogChannel::Smoothing), 0);
    }

    #[test]
    fn test_time_advances_once_per_sweep() {
        let mut eq = SyntheticEq::new(0);
        for _ in 0..EQ_BANDS {
            eq.next_reading();
        }
        assert!((eq.time - TIME_STEP).abs() < 1e-6);
        assert_eq!(eq.next_band, 0);
    }

    #[test]
    fn test_matrix_frame_is_one_block_from_cursor_home() {
        let mut out = Vec::new();
        print_matrix(&mut out, &DARK_BUFFER).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("\x1b[H"));
        assert_eq!(text.lines().count(), ROWS);
        assert!(text.lines().all(|line| line.matches('\u{25cf}').count() == COLUMNS));
    }

    #[test]
    fn test_strip_applies_brightness() {
        let mut strip = SimulatedStrip::new();
        strip.set_brightness(MAX_BRIGHTNESS);
        let mut frame = DARK_BUFFER;
        frame[0] = Rgb888::new(200, 100, 0);
        strip.push(&frame);
        assert_eq!(strip.pixels[0], Rgb888::new(200, 100, 0));

        strip.set_brightness(0);
        strip.push(&frame);
        assert_eq!(strip.pixels[0], Rgb888::BLACK);
    }
}

//! Spectrum matrix firmware for the ESP32-S3.
//!
//! Two MSGEQ7 chips share reset and strobe lines and are read in lockstep.
//! Command lines arrive over UART0 at 115200 baud.
//!
//! The following wiring is assumed:
//! - EQ reset            =>  GPIO4
//! - EQ strobe           =>  GPIO5
//! - EQ out, even bands  =>  GPIO1
//! - EQ out, odd bands   =>  GPIO2
//! - Smoothing pot       =>  GPIO3
//! - LED strip data      =>  GPIO6
//! - UART0 TX / RX       =>  GPIO43 / GPIO44

#![no_std]
#![no_main]

use defmt::{info, warn, Debug2Format};
use embassy_executor::Spawner;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Ticker};
use embedded_graphics::pixelcolor::RgbColor;
use esp_backtrace as _;
use esp_hal::{
    analog::adc::{Adc, AdcConfig, Attenuation},
    delay::Delay,
    gpio::{Level, Output, OutputConfig},
    rmt::Rmt,
    time::Rate,
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart, UartRx, UartTx},
    Async,
};
use esp_hal_smartled::{smartLedBuffer, SmartLedsAdapter};
use heapless::String;
use smart_leds::{brightness, SmartLedsWrite, RGB8};
use specky_viz::command::{format_reply, CommandError, LineBuffer, MAX_LINE_LEN};
use specky_viz::config::{Tuning, PIXEL_COUNT};
use specky_viz::hardware::{AnalogChannel, AnalogInput, LedDisplay};
use specky_viz::spectrum_sampler::SpectrumSampler;
use specky_viz::types::PixelBuffer;
use specky_viz::Visualizer;
use static_cell::StaticCell;

const BAUD_RATE: u32 = 115_200;
const FRAME_PERIOD_MS: u64 = 10;
const LINE_QUEUE_DEPTH: usize = 4;
// ADC1 is 12 bits wide, the pipeline works on 10.
const ADC_SHIFT: u16 = 2;

type LineResult = Result<String<MAX_LINE_LEN>, CommandError>;
type LineQueue = Channel<CriticalSectionRawMutex, LineResult, LINE_QUEUE_DEPTH>;

static COMMAND_LINES: StaticCell<LineQueue> = StaticCell::new();

/// Analog reads through a closure that owns the ADC and its pins.
struct EqInputs<F>(F);

impl<F> AnalogInput for EqInputs<F>
where
    F: FnMut(AnalogChannel) -> u16,
{
    fn read_channel(&mut self, channel: AnalogChannel) -> u16 {
        (self.0)(channel)
    }
}

/// WS2812 strip behind the RMT peripheral.
struct Strip<W> {
    leds: W,
    level: u8,
}

impl<W> LedDisplay for Strip<W>
where
    W: SmartLedsWrite<Color = RGB8>,
{
    fn push(&mut self, pixels: &PixelBuffer) {
        let colors = pixels
            .iter()
            .map(|pixel| RGB8::new(pixel.r(), pixel.g(), pixel.b()));
        if self.leds.write(brightness(colors, self.level)).is_err() {
            warn!("LED strip write failed");
        }
    }

    fn set_brightness(&mut self, level: u8) {
        self.level = level;
    }
}

#[embassy_executor::task]
async fn serial_reader(mut rx: UartRx<'static, Async>, lines: &'static LineQueue) {
    info!("Starting serial_reader task");

    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; 16];

    loop {
        match rx.read_async(&mut chunk).await {
            Ok(count) => {
                for &byte in &chunk[..count] {
                    if let Some(line) = buffer.push_byte(byte) {
                        lines.send(line).await;
                    }
                }
            }
            Err(error) => warn!("UART read failed: {}", Debug2Format(&error)),
        }
    }
}

async fn write_reply(tx: &mut UartTx<'static, Async>, reply: &str) {
    for part in [reply.as_bytes(), b"\r\n"] {
        let mut pending = part;
        while !pending.is_empty() {
            match tx.write_async(pending).await {
                Ok(written) => pending = &pending[written..],
                Err(error) => {
                    warn!("UART write failed: {}", Debug2Format(&error));
                    return;
                }
            }
        }
    }
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    info!("Start of init");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timg0.timer0);

    let reset = Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default());
    let strobe = Output::new(peripherals.GPIO5, Level::High, OutputConfig::default());

    let mut adc_config = AdcConfig::new();
    let mut eq_low = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let mut eq_high = adc_config.enable_pin(peripherals.GPIO2, Attenuation::_11dB);
    let mut smoothing = adc_config.enable_pin(peripherals.GPIO3, Attenuation::_11dB);
    let mut adc = Adc::new(peripherals.ADC1, adc_config);
    let analog = EqInputs(move |channel| {
        let reading = match channel {
            AnalogChannel::EqLow => nb::block!(adc.read_oneshot(&mut eq_low)),
            AnalogChannel::EqHigh => nb::block!(adc.read_oneshot(&mut eq_high)),
            AnalogChannel::Smoothing => nb::block!(adc.read_oneshot(&mut smoothing)),
        };
        reading.map(|raw| raw >> ADC_SHIFT).unwrap_or(0)
    });

    let tuning = Tuning::default();
    let mut sampler = SpectrumSampler::new(analog, reset, strobe, Delay::new(), &tuning);

    let rmt = Rmt::new(peripherals.RMT, Rate::from_mhz(80)).expect("RMT init failed");
    let leds = SmartLedsAdapter::new(rmt.channel0, peripherals.GPIO6, smartLedBuffer!(PIXEL_COUNT));
    let mut strip = Strip { leds, level: 0 };

    let uart = Uart::new(peripherals.UART0, UartConfig::default().with_baudrate(BAUD_RATE))
        .expect("UART init failed")
        .with_rx(peripherals.GPIO44)
        .with_tx(peripherals.GPIO43)
        .into_async();
    let (rx, mut tx) = uart.split();

    let lines: &'static LineQueue = COMMAND_LINES.init(Channel::new());
    if spawner.spawn(serial_reader(rx, lines)).is_err() {
        warn!("serial_reader could not be spawned, commands are disabled");
    }

    let mut visualizer = Visualizer::new(&tuning);
    visualizer.init(&mut strip);

    let mut ticker = Ticker::every(Duration::from_millis(FRAME_PERIOD_MS));
    loop {
        while let Ok(line) = lines.try_receive() {
            let result = line.and_then(|line| visualizer.handle_line(&line, &mut strip));
            write_reply(&mut tx, &format_reply(&result)).await;
        }

        visualizer.run_frame(&mut sampler, &mut strip);
        ticker.next().await;
    }
}

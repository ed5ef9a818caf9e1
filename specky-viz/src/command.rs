//! Single-line text commands received over the serial port.
//!
//! Every line is `<code> <payload>`:
//!
//! * `B <0-100>` sets the brightness percentage,
//! * `E <index>` selects a color effect,
//! * `C RRGGBB RRGGBB RRGGBB` sets a custom low/mid/high split.
//!
//! Each line is answered with `ACK: <values>` or `ERROR: <reason>`.

use core::fmt::{self, Write};
use core::str::FromStr;

use heapless::String;
use thiserror::Error;

use crate::color_matrix::{ColorEffect, EFFECTS_COUNT};
use crate::config::MAX_BRIGHTNESS;

pub const BRIGHTNESS_COMMAND: char = 'B';
pub const EFFECT_COMMAND: char = 'E';
pub const CUSTOM_COLOR_COMMAND: char = 'C';

pub const SUCCESS_PREFIX: &str = "ACK";
pub const ERROR_PREFIX: &str = "ERROR";

pub const MAX_LINE_LEN: usize = 32;
pub const REPLY_CAPACITY: usize = 80;

const CUSTOM_PAYLOAD_LEN: usize = 20;
const COLOR_TOKEN_LEN: usize = 6;
const COLOR_TOKEN_OFFSETS: [usize; 3] = [0, 7, 14];
const COLOR_SEPARATOR_OFFSETS: [usize; 2] = [6, 13];

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum CommandError {
    #[error("invalid command format")]
    InvalidFormat,
    #[error("no command data received")]
    MissingPayload,
    #[error("unknown command code '{0}'")]
    UnknownCommand(char),
    #[error("command data is not a number")]
    NotANumber,
    #[error("brightness should be between 0 and 100 (got {0})")]
    BrightnessOutOfRange(i32),
    #[error("effect should be between 0 and {max} (got {0})", max = EFFECTS_COUNT - 1)]
    EffectOutOfRange(i32),
    #[error("custom colors need exactly 20 characters (got {0})")]
    CustomColorLength(usize),
    #[error("custom colors must be nonzero hex values")]
    InvalidColor,
    #[error("command line too long")]
    LineTooLong,
    #[error("command line contains non-ASCII bytes")]
    NonAscii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Brightness { percent: u8 },
    Effect { index: usize },
    CustomColors { low: u32, mid: u32, high: u32 },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut chars = line.char_indices();
        let (_, code) = chars.next().ok_or(CommandError::InvalidFormat)?;
        let payload = match chars.next() {
            Some((separator, ' ')) => line[separator + 1..].trim(),
            _ => return Err(CommandError::InvalidFormat),
        };
        if payload.is_empty() {
            return Err(CommandError::MissingPayload);
        }

        match code {
            BRIGHTNESS_COMMAND => parse_brightness(payload),
            EFFECT_COMMAND => parse_effect(payload),
            CUSTOM_COLOR_COMMAND => parse_custom_colors(payload),
            other => Err(CommandError::UnknownCommand(other)),
        }
    }
}

fn parse_number(payload: &str) -> Result<i32, CommandError> {
    payload.parse().map_err(|_| CommandError::NotANumber)
}

fn parse_brightness(payload: &str) -> Result<Command, CommandError> {
    let value = parse_number(payload)?;
    u8::try_from(value)
        .ok()
        .filter(|&percent| percent <= 100)
        .map(|percent| Command::Brightness { percent })
        .ok_or(CommandError::BrightnessOutOfRange(value))
}

fn parse_effect(payload: &str) -> Result<Command, CommandError> {
    let value = parse_number(payload)?;
    usize::try_from(value)
        .ok()
        .filter(|&index| index < EFFECTS_COUNT)
        .map(|index| Command::Effect { index })
        .ok_or(CommandError::EffectOutOfRange(value))
}

fn parse_custom_colors(payload: &str) -> Result<Command, CommandError> {
    if payload.len() != CUSTOM_PAYLOAD_LEN {
        return Err(CommandError::CustomColorLength(payload.len()));
    }
    // Separators may be a space or run straight into the next token.
    let bytes = payload.as_bytes();
    if !COLOR_SEPARATOR_OFFSETS
        .iter()
        .all(|&offset| bytes[offset] == b' ' || bytes[offset].is_ascii_hexdigit())
    {
        return Err(CommandError::InvalidColor);
    }
    let [low, mid, high] = COLOR_TOKEN_OFFSETS.map(|offset| parse_color_token(payload, offset));
    Ok(Command::CustomColors {
        low: low?,
        mid: mid?,
        high: high?,
    })
}

fn parse_color_token(payload: &str, offset: usize) -> Result<u32, CommandError> {
    let token = payload
        .get(offset..offset + COLOR_TOKEN_LEN)
        .filter(|token| token.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or(CommandError::InvalidColor)?;
    match u32::from_str_radix(token, 16) {
        Ok(0) | Err(_) => Err(CommandError::InvalidColor),
        Ok(value) => Ok(value),
    }
}

/// Brightness level for a percentage, rounded to nearest.
///
/// Any nonzero percentage keeps at least one level so "dim" never means "off".
pub fn brightness_level(percent: u8) -> u8 {
    let percent = u32::from(percent.min(100));
    let level = (percent * u32::from(MAX_BRIGHTNESS) + 50) / 100;
    if level == 0 && percent > 0 {
        1
    } else {
        level as u8
    }
}

/// What an accepted command did, echoed back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Brightness(u8),
    Effect(usize),
    CustomColors([u32; 3]),
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", SUCCESS_PREFIX)?;
        match self {
            Ack::Brightness(percent) => write!(f, "{}", percent),
            Ack::Effect(index) => write!(f, "{}", index),
            Ack::CustomColors([low, mid, high]) => write!(f, "{} {} {}", low, mid, high),
        }
    }
}

/// The reply line for a handled command, without the line terminator.
pub fn format_reply(result: &Result<Ack, CommandError>) -> String<REPLY_CAPACITY> {
    let mut reply = String::new();
    // REPLY_CAPACITY holds the longest reply, so the write cannot fail.
    let _ = match result {
        Ok(ack) => write!(reply, "{}", ack),
        Err(error) => write!(reply, "{}: {}", ERROR_PREFIX, error),
    };
    reply
}

impl Command {
    /// The effect an accepted `E`/`C` command selects.
    pub fn effect(&self) -> Option<ColorEffect> {
        match *self {
            Command::Brightness { .. } => None,
            Command::Effect { index } => Some(ColorEffect::from_index_or_default(index)),
            Command::CustomColors { low, mid, high } => Some(ColorEffect::Custom {
                low: crate::color_matrix::rgb_from_u32(low),
                mid: crate::color_matrix::rgb_from_u32(mid),
                high: crate::color_matrix::rgb_from_u32(high),
            }),
        }
    }
}

/// Assembles newline-terminated lines from a serial byte stream.
#[derive(Default)]
pub struct LineBuffer {
    line: String<MAX_LINE_LEN>,
    // First problem seen in the current line.
    rejected: Option<CommandError>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte; returns a finished line once `\n` arrives.
    ///
    /// Lines that overflow the buffer or carry non-ASCII bytes are dropped
    /// whole and reported as [`CommandError::LineTooLong`] or
    /// [`CommandError::NonAscii`], whichever happened first.
    pub fn push_byte(&mut self, byte: u8) -> Option<Result<String<MAX_LINE_LEN>, CommandError>> {
        match byte {
            b'\n' => {
                let line = core::mem::take(&mut self.line);
                match self.rejected.take() {
                    Some(error) => Some(Err(error)),
                    None => Some(Ok(line)),
                }
            }
            b'\r' => None,
            _ => {
                if self.rejected.is_none() {
                    if !byte.is_ascii() {
                        self.rejected = Some(CommandError::NonAscii);
                    } else if self.line.push(char::from(byte)).is_err() {
                        self.rejected = Some(CommandError::LineTooLong);
                    }
                }
                None
            }
        }
    }
}

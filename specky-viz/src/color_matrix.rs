use embedded_graphics::{pixelcolor::Rgb888, prelude::*};

use crate::config::{COLUMNS, LOW_BAND_END, MID_BAND_END, ROWS};
use crate::types::ColorGrid;

pub const CYAN: Rgb888 = Rgb888::CYAN;
pub const MAGENTA: Rgb888 = Rgb888::MAGENTA;
pub const YELLOW: Rgb888 = Rgb888::YELLOW;

// Hue endpoints on the 0..=255 wheel
const VERTICAL_HUES: (u8, u8) = (235, 5);
const HORIZONTAL_HUES: (u8, u8) = (240, 0);

/// Number of effects reachable by wire index.
pub const EFFECTS_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorEffect {
    /// Cyan / magenta / yellow, bottom to top.
    Default,
    /// Cyan / yellow / magenta, bottom to top.
    Inverted,
    VerticalGradient,
    HorizontalGradient,
    /// Three-band split with runtime colors.
    Custom { low: Rgb888, mid: Rgb888, high: Rgb888 },
}

impl ColorEffect {
    /// Effect for a wire index, `None` for anything past [`EFFECTS_COUNT`].
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Default),
            1 => Some(Self::Inverted),
            2 => Some(Self::VerticalGradient),
            3 => Some(Self::HorizontalGradient),
            _ => None,
        }
    }

    /// Like [`from_index`](Self::from_index), but substitutes the default split.
    pub fn from_index_or_default(index: usize) -> Self {
        Self::from_index(index).unwrap_or_else(|| {
            crate::diag!("ERROR: unknown color effect {}, using default", index);
            Self::Default
        })
    }

    /// Wire index, `None` for custom colors.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Default => Some(0),
            Self::Inverted => Some(1),
            Self::VerticalGradient => Some(2),
            Self::HorizontalGradient => Some(3),
            Self::Custom { .. } => None,
        }
    }
}

/// Target color of every cell, lit or not.
pub struct ColorMatrix {
    cells: ColorGrid,
}

impl ColorMatrix {
    pub fn new(effect: ColorEffect) -> Self {
        let mut matrix = Self {
            cells: [[Rgb888::BLACK; ROWS]; COLUMNS],
        };
        matrix.apply(effect);
        matrix
    }

    /// Overwrites the whole matrix with `effect`.
    pub fn apply(&mut self, effect: ColorEffect) {
        match effect {
            ColorEffect::Default => self.fill_split(CYAN, MAGENTA, YELLOW),
            ColorEffect::Inverted => self.fill_split(CYAN, YELLOW, MAGENTA),
            ColorEffect::VerticalGradient => self.fill_vertical_gradient(),
            ColorEffect::HorizontalGradient => self.fill_horizontal_gradient(),
            ColorEffect::Custom { low, mid, high } => self.fill_split(low, mid, high),
        }
    }

    pub fn cells(&self) -> &ColorGrid {
        &self.cells
    }

    pub fn color_at(&self, column: usize, row: usize) -> Option<Rgb888> {
        self.cells.get(column)?.get(row).copied()
    }

    fn fill_split(&mut self, low: Rgb888, mid: Rgb888, high: Rgb888) {
        for column in self.cells.iter_mut() {
            for (row, cell) in column.iter_mut().enumerate() {
                *cell = split_color(row, low, mid, high);
            }
        }
    }

    fn fill_vertical_gradient(&mut self) {
        for column in self.cells.iter_mut() {
            for (row, cell) in column.iter_mut().enumerate() {
                *cell = hue_to_rgb(gradient_hue(VERTICAL_HUES, row, ROWS));
            }
        }
    }

    fn fill_horizontal_gradient(&mut self) {
        for (index, column) in self.cells.iter_mut().enumerate() {
            column.fill(hue_to_rgb(gradient_hue(HORIZONTAL_HUES, index, COLUMNS)));
        }
    }
}

fn split_color(row: usize, low: Rgb888, mid: Rgb888, high: Rgb888) -> Rgb888 {
    if row < LOW_BAND_END {
        low
    } else if row < MID_BAND_END {
        mid
    } else {
        high
    }
}

/// Hue at `position` of `len` steps between the two endpoints.
fn gradient_hue((start, end): (u8, u8), position: usize, len: usize) -> u8 {
    let span = i32::from(end) - i32::from(start);
    let offset = span * position as i32 / len.max(1) as i32;
    (i32::from(start) + offset).rem_euclid(256) as u8
}

/// Fully saturated color for a hue on a 0..=255 wheel (0 red, 85 green, 170 blue).
pub fn hue_to_rgb(hue: u8) -> Rgb888 {
    if hue < 85 {
        let pos = hue.saturating_mul(3);
        Rgb888::new(255u8.saturating_sub(pos), pos, 0)
    } else if hue < 170 {
        let pos = (hue - 85).saturating_mul(3);
        Rgb888::new(0, 255u8.saturating_sub(pos), pos)
    } else {
        let pos = (hue - 170).saturating_mul(3);
        Rgb888::new(pos, 0, 255u8.saturating_sub(pos))
    }
}

/// Splits `0xRRGGBB` into a color; the top byte is ignored.
pub fn rgb_from_u32(value: u32) -> Rgb888 {
    let [_, r, g, b] = value.to_be_bytes();
    Rgb888::new(r, g, b)
}

use embedded_graphics::pixelcolor::Rgb888;

use crate::config::{COLUMNS, EQ_BANDS, PIXEL_COUNT, ROWS};

// Compensated energy per EQ band, one full sample cycle
pub type BandArray = [u16; EQ_BANDS];

// Integer row count per column, as used for lighting
pub type ColumnHeights = [u16; COLUMNS];

// Indexed [column][row], row 0 at the bottom
pub type LitMask = [[bool; ROWS]; COLUMNS];
pub type ColorGrid = [[Rgb888; ROWS]; COLUMNS];

// What the LED strip receives, trimmed ends excluded
pub type PixelBuffer = [Rgb888; PIXEL_COUNT];

pub const EMPTY_MASK: LitMask = [[false; ROWS]; COLUMNS];
pub const DARK_BUFFER: PixelBuffer = [Rgb888::new(0, 0, 0); PIXEL_COUNT];

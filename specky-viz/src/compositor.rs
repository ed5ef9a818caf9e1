use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Point, Size},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
};

use crate::color_matrix::ColorMatrix;
use crate::config::{AMOUNT_TRIMMED, COLUMNS, PIXEL_COUNT, ROWS};
use crate::types::{ColumnHeights, LitMask, PixelBuffer, DARK_BUFFER, EMPTY_MASK};

const OFF: Rgb888 = Rgb888::BLACK;

/// Lights rows `0..height` of every column.
pub fn lit_mask(heights: &ColumnHeights) -> LitMask {
    let mut mask = EMPTY_MASK;
    for (cells, &height) in mask.iter_mut().zip(heights) {
        let height = usize::from(height).min(ROWS);
        cells[..height].fill(true);
    }
    mask
}

/// Strip position of a grid cell, `None` for trimmed cells.
///
/// The strip runs up column 0, then up column 1, and so on.
pub fn strip_index(column: usize, row: usize) -> Option<usize> {
    if column >= COLUMNS || row >= ROWS {
        return None;
    }
    (column * ROWS + row)
        .checked_sub(AMOUNT_TRIMMED)
        .filter(|&index| index < PIXEL_COUNT)
}

/// Grid cell driven by strip position `index`.
pub fn pixel_position(index: usize) -> Option<(usize, usize)> {
    if index >= PIXEL_COUNT {
        return None;
    }
    let logical = index + AMOUNT_TRIMMED;
    Some((logical / ROWS, logical % ROWS))
}

/// Merges the lit cells with their target colors into the strip buffer.
pub fn composite(mask: &LitMask, colors: &ColorMatrix) -> PixelBuffer {
    let mut pixels = DARK_BUFFER;
    for (column, (lit_cells, color_cells)) in mask.iter().zip(colors.cells()).enumerate() {
        for (row, (&lit, &color)) in lit_cells.iter().zip(color_cells).enumerate() {
            if let Some(index) = strip_index(column, row) {
                pixels[index] = if lit { color } else { OFF };
            }
        }
    }
    pixels
}

pub trait Renderer {
    fn draw<D: DrawTarget<Color = Rgb888>>(
        &self,
        target: &mut D,
        pixels: &PixelBuffer,
    ) -> Result<(), D::Error>;
}

/// Draws a strip buffer back onto a 2D target, one square per LED.
///
/// Row 0 is drawn at the bottom, the way the matrix hangs.
pub struct MatrixRenderer {
    cell_size: u32,
    cell_spacing: u32,
}

impl MatrixRenderer {
    pub fn new(cell_size: u32, cell_spacing: u32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            cell_spacing,
        }
    }

    /// Target size needed to show the whole grid.
    pub fn size(&self) -> Size {
        let pitch = self.cell_size + self.cell_spacing;
        Size::new(COLUMNS as u32 * pitch, ROWS as u32 * pitch)
    }

    fn cell_origin(&self, column: usize, row: usize) -> Point {
        let pitch = (self.cell_size + self.cell_spacing) as i32;
        let flipped_row = (ROWS - 1 - row) as i32;
        Point::new(column as i32 * pitch, flipped_row * pitch)
    }
}

impl Renderer for MatrixRenderer {
    fn draw<D>(&self, target: &mut D, pixels: &PixelBuffer) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        target.clear(OFF)?;
        for (index, &color) in pixels.iter().enumerate() {
            let Some((column, row)) = pixel_position(index) else {
                continue;
            };
            Rectangle::new(
                self.cell_origin(column, row),
                Size::new_equal(self.cell_size),
            )
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(target)?;
        }
        Ok(())
    }
}

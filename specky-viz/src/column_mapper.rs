use crate::config::{Tuning, ADC_MAX, COLUMNS, ROWS};
use crate::types::{BandArray, ColumnHeights};

/// Folds the 14 EQ bands into 12 display columns and smooths them over time.
///
/// Each column keeps the previous frame's value in `f32` so the exponential
/// moving average does not lose precision, while callers receive the
/// truncated integer row count used for lighting.
pub struct ColumnMapper {
    /// EMA state per column, always within `0.0..=ROWS`.
    previous_heights: [f32; COLUMNS],
    /// Band energy that fills one row.
    eq_delta: f32,
    /// Alpha produced at the bottom of the smoothing control.
    alpha_min: f32,
    /// Alpha produced at the top of the smoothing control.
    alpha_max: f32,
}

impl ColumnMapper {
    /// Creates a mapper with every column at rest.
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            previous_heights: [0.0; COLUMNS],
            eq_delta: tuning.eq_delta,
            alpha_min: tuning.smoothing_alpha_min,
            alpha_max: tuning.smoothing_alpha_max,
        }
    }

    /// Maps a raw smoothing control reading linearly onto the configured alpha range.
    ///
    /// Readings above `ADC_MAX` are treated as `ADC_MAX`.
    pub fn smoothing_alpha(&self, raw: u16) -> f32 {
        let position = f32::from(raw.min(ADC_MAX)) / f32::from(ADC_MAX);
        self.alpha_min + position * (self.alpha_max - self.alpha_min)
    }

    /// Energy that column `column` reads from this frame's bands.
    ///
    /// Column `c` shows band `c + 1`. Column 0 also takes band 0 into account,
    /// otherwise the sub-bass band would never be displayed.
    pub fn column_energy(column: usize, bands: &BandArray) -> u16 {
        let own_band = bands.get(column + 1).copied().unwrap_or(0);
        if column == 0 {
            own_band.max(bands[0])
        } else {
            own_band
        }
    }

    /// Advances the EMA of one column and returns its lit row count.
    ///
    /// Out-of-range columns yield 0 and leave all state untouched.
    pub fn map_column(&mut self, column: usize, bands: &BandArray, alpha: f32) -> u16 {
        let Some(previous) = self.previous_heights.get(column).copied() else {
            return 0;
        };

        let current = f32::from(Self::column_energy(column, bands)) / self.eq_delta;
        let smoothed = (alpha * current + (1.0 - alpha) * previous).clamp(0.0, ROWS as f32);
        self.previous_heights[column] = smoothed;

        smoothed as u16
    }

    /// Maps every column for one frame with a shared alpha.
    pub fn map_columns(&mut self, bands: &BandArray, alpha: f32) -> ColumnHeights {
        let mut heights = [0; COLUMNS];
        for (column, height) in heights.iter_mut().enumerate() {
            *height = self.map_column(column, bands, alpha);
        }
        heights
    }

    /// The retained EMA state, one value per column.
    pub fn smoothed_heights(&self) -> &[f32; COLUMNS] {
        &self.previous_heights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EQ_BANDS, EQ_DELTA, SMOOTHING_ALPHA_MAX, SMOOTHING_ALPHA_MIN};
    use approx::assert_abs_diff_eq;

    fn mapper() -> ColumnMapper {
        ColumnMapper::new(&Tuning::default())
    }

    #[test]
    fn test_smoothing_alpha_endpoints() {
        let mapper = mapper();
        assert_abs_diff_eq!(mapper.smoothing_alpha(0), SMOOTHING_ALPHA_MIN, epsilon = 1e-6);
        assert_abs_diff_eq!(mapper.smoothing_alpha(ADC_MAX), SMOOTHING_ALPHA_MAX, epsilon = 1e-6);
        assert_abs_diff_eq!(mapper.smoothing_alpha(u16::MAX), SMOOTHING_ALPHA_MAX, epsilon = 1e-6);

        let middle = mapper.smoothing_alpha(ADC_MAX / 2);
        assert!(middle < SMOOTHING_ALPHA_MIN && middle > SMOOTHING_ALPHA_MAX);
    }

    #[test]
    fn test_band_to_column_mapping() {
        let mut bands = [0u16; EQ_BANDS];
        for (i, band) in bands.iter_mut().enumerate() {
            *band = i as u16 * 10;
        }
        for column in 1..COLUMNS {
            assert_eq!(ColumnMapper::column_energy(column, &bands), bands[column + 1]);
        }
        // Band 13 is never displayed.
        assert_eq!(ColumnMapper::column_energy(COLUMNS - 1, &bands), bands[EQ_BANDS - 2]);
    }

    #[test]
    fn test_first_column_folds_in_sub_bass() {
        let mut bands = [0u16; EQ_BANDS];
        bands[0] = 90;
        bands[1] = 40;
        assert_eq!(ColumnMapper::column_energy(0, &bands), 90);
        bands[1] = 120;
        assert_eq!(ColumnMapper::column_energy(0, &bands), 120);
    }

    #[test]
    fn test_alpha_one_snaps_to_current() {
        let mut mapper = mapper();
        let mut bands = [0u16; EQ_BANDS];
        bands[3] = 50; // column 2
        assert_eq!(mapper.map_column(2, &bands, 1.0), (50.0 / EQ_DELTA) as u16);
        assert_abs_diff_eq!(mapper.smoothed_heights()[2], 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_height_is_clamped_to_rows() {
        let mut mapper = mapper();
        let bands = [u16::MAX; EQ_BANDS];
        for _ in 0..50 {
            for height in mapper.map_columns(&bands, SMOOTHING_ALPHA_MIN) {
                assert!(height as usize <= ROWS);
            }
        }
        for &height in mapper.smoothed_heights() {
            assert!(height >= 0.0 && height <= ROWS as f32);
        }
        assert_eq!(mapper.map_column(0, &bands, 1.0) as usize, ROWS);
    }

    #[test]
    fn test_ema_converges_monotonically() {
        let mut mapper = mapper();
        let bands = [60u16; EQ_BANDS];
        let target = 60.0 / EQ_DELTA;
        let alpha = 0.5;

        let mut last = 0.0f32;
        for _ in 0..100 {
            mapper.map_column(4, &bands, alpha);
            let now = mapper.smoothed_heights()[4];
            assert!(now >= last, "EMA went backwards: {} -> {}", last, now);
            assert!(now <= target + 1e-4);
            last = now;
        }
        assert_abs_diff_eq!(last, target, epsilon = 1e-3);

        // And back down once the input drops out.
        let silent = [0u16; EQ_BANDS];
        for _ in 0..100 {
            mapper.map_column(4, &silent, alpha);
            let now = mapper.smoothed_heights()[4];
            assert!(now <= last);
            last = now;
        }
        assert_abs_diff_eq!(last, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_out_of_range_column_is_ignored() {
        let mut mapper = mapper();
        let bands = [500u16; EQ_BANDS];
        assert_eq!(mapper.map_column(COLUMNS, &bands, 1.0), 0);
        assert_eq!(mapper.smoothed_heights(), &[0.0; COLUMNS]);
    }
}

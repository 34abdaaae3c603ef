//! Discrete volume indicator ladder.
//!
//! Maps the current level scalar onto a fixed row of ten on/off indicator
//! cells. The thresholds are deliberately non-linear, denser around typical
//! speech levels, so the gauge does not sit fully lit during normal talking.

/// Number of indicator cells in the gauge.
pub const CELL_COUNT: usize = 10;

/// Ascending level cutoffs, one per indicator cell. Tuning constants.
pub const LEVEL_THRESHOLDS: [u8; CELL_COUNT] = [35, 45, 55, 65, 75, 95, 115, 145, 175, 205];

/// Returns the on/off state of every indicator cell for the given level.
///
/// Cell `i` is lit iff `level >= LEVEL_THRESHOLDS[i]`.
pub fn lit_cells(level: u8) -> [bool; CELL_COUNT] {
    let mut cells = [false; CELL_COUNT];
    for (cell, threshold) in cells.iter_mut().zip(LEVEL_THRESHOLDS.iter()) {
        *cell = level >= *threshold;
    }
    cells
}

/// Returns how many cells are lit for the given level.
pub fn lit_count(level: u8) -> usize {
    lit_cells(level).iter().filter(|lit| **lit).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_lights_nothing() {
        assert_eq!(lit_count(0), 0);
        assert_eq!(lit_count(34), 0);
    }

    #[test]
    fn exact_threshold_lights_cell_and_all_below() {
        for (i, threshold) in LEVEL_THRESHOLDS.iter().enumerate() {
            let cells = lit_cells(*threshold);
            for (j, lit) in cells.iter().enumerate() {
                assert_eq!(*lit, j <= i, "level {threshold} cell {j}");
            }
        }
    }

    #[test]
    fn one_below_threshold_leaves_cell_dark() {
        for (i, threshold) in LEVEL_THRESHOLDS.iter().enumerate() {
            let cells = lit_cells(threshold - 1);
            assert!(!cells[i], "level {} must not light cell {i}", threshold - 1);
        }
    }

    #[test]
    fn max_level_lights_everything() {
        assert_eq!(lit_count(255), CELL_COUNT);
        assert_eq!(lit_count(205), CELL_COUNT);
    }
}

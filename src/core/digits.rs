//! Digit Strips
//!
//! HUD and intermission numbers are drawn as fixed-width strips of digit
//! cells. Cells are ordered most-significant first; a `None` cell is blank.

/// One cell of a digit strip. `None` renders nothing.
pub type DigitCell = Option<u8>;

/// Lay out `value` into `width` cells, most-significant first.
///
/// Leading zeros are blank unless `zeros` is set. A zero value always shows a
/// single `0` in the last cell. Digits that do not fit are dropped from the
/// high end.
pub fn layout_digits(value: u32, width: usize, zeros: bool) -> Vec<DigitCell> {
    let mut cells = vec![None; width];
    let mut remaining = value;

    for i in 0..width {
        let digit = (remaining % 10) as u8;
        if remaining > 0 || zeros || (value == 0 && i == 0) {
            cells[width - 1 - i] = Some(digit);
        }
        remaining /= 10;
    }

    cells
}

//! Slot-to-cell arithmetic of the repeating block layout.
//!
//! Slot `s` (1-based) lands in block `(s - 1) / block_size`, at row
//! `start_row + (s - 1) % block_size` and column
//! `start_col_idx + block * col_step`. Only the lower bounds are checked here;
//! the number of blocks a document may use is bounded by the caller through
//! `max_per_form`.

use crate::spec::{FormError, SpecCellCoordinate};

/// Map a 1-based slot to its value cell.
pub fn map_slot_to_cell(
    slot: usize,
    start_row: u32,
    block_size: u32,
    start_col_idx: u32,
    col_step: u32,
) -> Result<SpecCellCoordinate, FormError> {
    if slot == 0 {
        return Err(FormError::InvalidLayout("slot is 1-based".to_string()));
    }
    if block_size == 0 {
        return Err(FormError::InvalidLayout("block_size must be >= 1".to_string()));
    }

    let n_block = (slot - 1) / block_size as usize;
    let n_pos = (slot - 1) % block_size as usize;
    let n_row = start_row as usize + n_pos;
    let n_col = start_col_idx as usize + n_block * col_step as usize;

    Ok(SpecCellCoordinate {
        col_idx: cast_coordinate(n_col, "column")?,
        row_idx: cast_coordinate(n_row, "row")?,
    })
}

/// Label cell: same row, `label_col_offset` columns away from `cell`.
pub fn map_slot_to_label_cell(
    cell: SpecCellCoordinate,
    label_col_offset: i32,
) -> Result<SpecCellCoordinate, FormError> {
    let n_col = i64::from(cell.col_idx) + i64::from(label_col_offset);
    if n_col < 1 {
        return Err(FormError::InvalidLayout(format!(
            "label offset {label_col_offset} from {cell} leaves the sheet"
        )));
    }
    Ok(SpecCellCoordinate {
        col_idx: u32::try_from(n_col)
            .map_err(|_| FormError::InvalidLayout(format!("label column overflow: {n_col}")))?,
        row_idx: cell.row_idx,
    })
}

fn cast_coordinate(value: usize, axis: &str) -> Result<u32, FormError> {
    u32::try_from(value).map_err(|_| FormError::InvalidLayout(format!("{axis} overflow: {value}")))
}

//! The weekly care matrix.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::shift::{Day, Shift, ShiftSet};

/// One (day, shift) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub day: Day,
    pub shift: Shift,
}

impl Cell {
    pub fn new(day: Day, shift: Shift) -> Self {
        Self { day, shift }
    }

    /// Legacy flat key, e.g. `TuesShift2Time`.
    pub fn flat_key(&self) -> String {
        format!("{}Shift{}Time", self.day.flat_prefix(), self.shift.flat_index())
    }
}

/// Occurrence counts per cell for one ADL question in one week.
///
/// Sparse: a key can be present with a count of 0, and the key set is kept
/// when counts are cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NestedCells", into = "NestedCells")]
pub struct CareMatrix {
    cells: BTreeMap<Cell, u32>,
}

/// Serialised form: `{ "Monday": { "Day": 2 } }`.
type NestedCells = BTreeMap<Day, BTreeMap<Shift, u32>>;

impl CareMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for a cell; absent cells read as 0.
    pub fn get(&self, cell: Cell) -> u32 {
        self.cells.get(&cell).copied().unwrap_or(0)
    }

    /// Set a cell, returning the previous count.
    pub fn set(&mut self, cell: Cell, count: u32) -> u32 {
        self.cells.insert(cell, count).unwrap_or(0)
    }

    /// Whether the cell key exists (even with a 0 count).
    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Present cells in day, shift order.
    pub fn iter(&self) -> impl Iterator<Item = (Cell, u32)> + '_ {
        self.cells.iter().map(|(cell, count)| (*cell, *count))
    }

    /// Present cell keys.
    pub fn keys(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.keys().copied()
    }

    /// Number of present keys.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.cells.values().map(|c| u64::from(*c)).sum()
    }

    /// Zero every present key without removing any.
    pub fn clear_counts(&mut self) {
        for count in self.cells.values_mut() {
            *count = 0;
        }
    }

    /// Every legal cell for a shift set, zero-filled where absent.
    pub fn filled(&self, shifts: &ShiftSet) -> CareMatrix {
        let mut out = CareMatrix::new();
        for day in Day::ALL {
            for shift in shifts.iter() {
                let cell = Cell::new(day, shift);
                out.set(cell, self.get(cell));
            }
        }
        out
    }

    /// Split into the cells a facility runs and the ones it does not.
    pub fn partition_by(&self, shifts: &ShiftSet) -> (CareMatrix, CareMatrix) {
        let (legal, outside): (BTreeMap<_, _>, BTreeMap<_, _>) = self
            .cells
            .iter()
            .map(|(cell, count)| (*cell, *count))
            .partition(|(cell, _)| shifts.contains(cell.shift));
        (CareMatrix { cells: legal }, CareMatrix { cells: outside })
    }

    /// Only the cells a facility runs.
    pub fn restricted_to(&self, shifts: &ShiftSet) -> CareMatrix {
        self.partition_by(shifts).0
    }
}

impl FromIterator<(Cell, u32)> for CareMatrix {
    fn from_iter<I: IntoIterator<Item = (Cell, u32)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl From<NestedCells> for CareMatrix {
    fn from(nested: NestedCells) -> Self {
        nested
            .into_iter()
            .flat_map(|(day, row)| {
                row.into_iter()
                    .map(move |(shift, count)| (Cell::new(day, shift), count))
            })
            .collect()
    }
}

impl From<CareMatrix> for NestedCells {
    fn from(matrix: CareMatrix) -> Self {
        let mut nested = NestedCells::new();
        for (cell, count) in matrix.cells {
            nested.entry(cell.day).or_default().insert(cell.shift, count);
        }
        nested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_and_total() {
        let mut matrix = CareMatrix::new();
        let mon_day = Cell::new(Day::Monday, Shift::Day);
        assert_eq!(matrix.get(mon_day), 0);
        assert_eq!(matrix.set(mon_day, 2), 0);
        assert_eq!(matrix.set(mon_day, 3), 2);
        matrix.set(Cell::new(Day::Friday, Shift::Noc), 4);
        assert_eq!(matrix.total(), 7);
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn test_clear_keeps_keys() {
        let mut matrix: CareMatrix = [
            (Cell::new(Day::Monday, Shift::Day), 1),
            (Cell::new(Day::Sunday, Shift::Swing), 5),
        ]
        .into_iter()
        .collect();
        matrix.clear_counts();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.total(), 0);
        assert!(matrix.contains(Cell::new(Day::Sunday, Shift::Swing)));
    }

    #[test]
    fn test_partition_by_shift_set() {
        let matrix: CareMatrix = [
            (Cell::new(Day::Wednesday, Shift::Swing), 4),
            (Cell::new(Day::Wednesday, Shift::Day), 1),
        ]
        .into_iter()
        .collect();
        let (legal, outside) = matrix.partition_by(&ShiftSet::two_shift());
        assert_eq!(legal.total(), 1);
        assert_eq!(outside.get(Cell::new(Day::Wednesday, Shift::Swing)), 4);
    }

    #[test]
    fn test_filled_has_every_legal_cell() {
        let matrix = CareMatrix::new().filled(&ShiftSet::two_shift());
        assert_eq!(matrix.len(), 14);
        assert_eq!(matrix.total(), 0);
    }

    #[test]
    fn test_nested_serde() {
        let mut matrix = CareMatrix::new();
        matrix.set(Cell::new(Day::Monday, Shift::Noc), 2);
        let json = serde_json::to_value(&matrix).unwrap();
        assert_eq!(json, serde_json::json!({"Monday": {"NOC": 2}}));
        let back: CareMatrix = serde_json::from_value(json).unwrap();
        assert_eq!(back, matrix);
    }

    #[test]
    fn test_flat_key() {
        assert_eq!(Cell::new(Day::Tuesday, Shift::Swing).flat_key(), "TuesShift2Time");
    }
}

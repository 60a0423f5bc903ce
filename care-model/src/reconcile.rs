//! Reconciles persisted `per_day_data` payloads into a [`CareMatrix`].
//!
//! Two historical shapes exist:
//!
//! - **Flat**: one key per slot, `"<DayPrefix>Shift<N>Time": count`
//!   (`MonShift1Time`, `TuesShift2Time`, ...)
//! - **Nested**: `{ "Monday": { "Day": n, "Swing": n, "NOC": n }, ... }`
//!
//! Decoding is tagged: [`decode`] classifies the payload once and each branch
//! goes through its own mapping table. If *any* top-level key is a flat key
//! the whole payload is flat. The conversion is total; anything unreadable
//! degrades to zero counts and is reported as a [`FormatIssue`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::trace;

use crate::error::FormatIssue;
use crate::matrix::{CareMatrix, Cell};
use crate::shift::{Day, Shift, ShiftSet};

/// Flat-key day prefixes. Longer aliases come first so `Thurs` is not read
/// as `Thu` + `rs`.
const FLAT_DAY_PREFIXES: [(&str, Day); 10] = [
    ("Thurs", Day::Thursday),
    ("Tues", Day::Tuesday),
    ("Thur", Day::Thursday),
    ("Mon", Day::Monday),
    ("Tue", Day::Tuesday),
    ("Wed", Day::Wednesday),
    ("Thu", Day::Thursday),
    ("Fri", Day::Friday),
    ("Sat", Day::Saturday),
    ("Sun", Day::Sunday),
];

/// Which shape a payload was read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    Flat,
    Nested,
    Empty,
}

/// Result of classifying a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PerDayPayload {
    Flat(BTreeMap<Cell, u32>),
    Nested(BTreeMap<Cell, u32>),
    Empty,
}

impl PerDayPayload {
    pub fn format(&self) -> PayloadFormat {
        match self {
            Self::Flat(_) => PayloadFormat::Flat,
            Self::Nested(_) => PayloadFormat::Nested,
            Self::Empty => PayloadFormat::Empty,
        }
    }

    /// Canonical matrix for this payload.
    pub fn into_matrix(self) -> CareMatrix {
        match self {
            Self::Flat(cells) | Self::Nested(cells) => cells.into_iter().collect(),
            Self::Empty => CareMatrix::new(),
        }
    }
}

/// A classified payload plus the issues found while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub payload: PerDayPayload,
    pub issues: Vec<FormatIssue>,
}

/// Canonical matrix plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub matrix: CareMatrix,
    pub format: PayloadFormat,
    pub issues: Vec<FormatIssue>,
}

impl Reconciled {
    /// Drop cells outside the facility's shifts, reporting non-zero ones.
    pub fn restrict_to(mut self, shifts: &ShiftSet) -> Self {
        let (legal, outside) = self.matrix.partition_by(shifts);
        for (cell, count) in outside.iter().filter(|(_, count)| *count > 0) {
            self.issues.push(FormatIssue::ShiftOutsideFacility {
                key: cell.flat_key(),
                shift: cell.shift,
                count,
            });
        }
        self.matrix = legal;
        self
    }
}

/// Decode any payload into a canonical matrix. Never fails.
pub fn reconcile(raw: &Value) -> Reconciled {
    let Decoded { payload, issues } = decode(raw);
    trace!(format = ?payload.format(), issues = issues.len(), "Reconciled per_day_data");
    Reconciled {
        format: payload.format(),
        matrix: payload.into_matrix(),
        issues,
    }
}

/// Classify a payload and read its cells.
pub fn decode(raw: &Value) -> Decoded {
    let object = match raw {
        Value::Object(object) => object,
        Value::Null => return empty(Vec::new()),
        other => {
            return empty(vec![FormatIssue::UnrecognizedShape {
                detail: format!("expected an object, found {}", value_kind(other)),
            }])
        }
    };

    if object.is_empty() {
        return empty(Vec::new());
    }

    if object.keys().any(|key| parse_flat_key(key).is_some()) {
        return decode_flat(object);
    }

    if object.keys().any(|key| Day::from_name(key).is_some()) {
        return decode_nested(object);
    }

    empty(vec![FormatIssue::UnrecognizedShape {
        detail: format!("no flat or day keys among {} key(s)", object.len()),
    }])
}

fn empty(issues: Vec<FormatIssue>) -> Decoded {
    Decoded {
        payload: PerDayPayload::Empty,
        issues,
    }
}

fn decode_flat(object: &Map<String, Value>) -> Decoded {
    let mut cells = BTreeMap::new();
    let mut issues = Vec::new();

    for (key, value) in object {
        let Some((day, index)) = parse_flat_key(key) else {
            issues.push(FormatIssue::UnknownKey { key: key.clone() });
            continue;
        };
        let Some(shift) = Shift::from_flat_index(index) else {
            issues.push(FormatIssue::ShiftIndexOutOfRange {
                key: key.clone(),
                index,
            });
            continue;
        };
        insert_cell(&mut cells, &mut issues, Cell::new(day, shift), key, value);
    }

    Decoded {
        payload: PerDayPayload::Flat(cells),
        issues,
    }
}

fn decode_nested(object: &Map<String, Value>) -> Decoded {
    let mut cells = BTreeMap::new();
    let mut issues = Vec::new();

    for (day_key, row) in object {
        let Some(day) = Day::from_name(day_key) else {
            issues.push(FormatIssue::UnknownKey { key: day_key.clone() });
            continue;
        };
        let Value::Object(row) = row else {
            if !row.is_null() {
                issues.push(FormatIssue::CoercedValue {
                    key: day_key.clone(),
                    raw: row.to_string(),
                });
            }
            continue;
        };
        for (shift_key, value) in row {
            let path = format!("{day_key}.{shift_key}");
            let Some(shift) = Shift::from_label(shift_key) else {
                issues.push(FormatIssue::UnknownKey { key: path });
                continue;
            };
            insert_cell(&mut cells, &mut issues, Cell::new(day, shift), &path, value);
        }
    }

    Decoded {
        payload: PerDayPayload::Nested(cells),
        issues,
    }
}

fn insert_cell(
    cells: &mut BTreeMap<Cell, u32>,
    issues: &mut Vec<FormatIssue>,
    cell: Cell,
    key: &str,
    value: &Value,
) {
    if cells.contains_key(&cell) {
        issues.push(FormatIssue::DuplicateCell {
            key: key.to_string(),
        });
        return;
    }
    let (count, coerced) = coerce_count(value);
    if coerced {
        issues.push(FormatIssue::CoercedValue {
            key: key.to_string(),
            raw: value.to_string(),
        });
    }
    cells.insert(cell, count);
}

/// `<DayPrefix>Shift<N>Time` -> (day, N).
fn parse_flat_key(key: &str) -> Option<(Day, u32)> {
    FLAT_DAY_PREFIXES.iter().find_map(|(prefix, day)| {
        let index = key
            .strip_prefix(prefix)?
            .strip_prefix("Shift")?
            .strip_suffix("Time")?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        index.parse().ok().map(|n| (*day, n))
    })
}

/// Read a stored count. Returns the count and whether it was coerced.
///
/// `null` reads as 0 without being reported.
pub fn coerce_count(value: &Value) -> (u32, bool) {
    match value {
        Value::Null => (0, false),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                (u32::try_from(u).unwrap_or(u32::MAX), u > u64::from(u32::MAX))
            } else if let Some(f) = n.as_f64() {
                coerce_float(f)
            } else {
                (0, true)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(u) = trimmed.parse::<u32>() {
                (u, false)
            } else if let Ok(f) = trimmed.parse::<f64>() {
                coerce_float(f)
            } else {
                (0, true)
            }
        }
        _ => (0, true),
    }
}

fn coerce_float(f: f64) -> (u32, bool) {
    if !f.is_finite() || f < 0.0 {
        return (0, true);
    }
    let truncated = f.trunc();
    if truncated > f64::from(u32::MAX) {
        return (u32::MAX, true);
    }
    (truncated as u32, truncated != f)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Canonical write shape: nested, every day, every shift of the set.
pub fn encode_nested(matrix: &CareMatrix, shifts: &ShiftSet) -> Value {
    let mut out = Map::new();
    for day in Day::ALL {
        let mut row = Map::new();
        for shift in shifts.iter() {
            row.insert(
                shift.label().to_string(),
                Value::from(matrix.get(Cell::new(day, shift))),
            );
        }
        out.insert(day.name().to_string(), Value::Object(row));
    }
    Value::Object(out)
}

/// Legacy flat shape, every day, every shift of the set.
pub fn encode_flat(matrix: &CareMatrix, shifts: &ShiftSet) -> Value {
    let mut out = Map::new();
    for day in Day::ALL {
        for shift in shifts.iter() {
            let cell = Cell::new(day, shift);
            out.insert(cell.flat_key(), Value::from(matrix.get(cell)));
        }
    }
    Value::Object(out)
}

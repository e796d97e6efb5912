//! Two-region sheet layout for a valuation.
//!
//! A payload is projected onto two columns: a header naming the valuation
//! and its version token, an editable `Assumptions` region built from the
//! flattened inputs, and a shaded, locked `Results` region built from the
//! flattened outputs. Reading back scans the rows between the two markers
//! and rebuilds the nested inputs.

use crate::{
    error::Result,
    flatten::{flatten, unflatten},
    ETag, Error, ValuationId, ValuationPayload,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::ops::Range;

/// Marker opening the editable region.
pub const ASSUMPTIONS_MARKER: &str = "Assumptions";
/// Marker closing the editable region and opening the read-only one.
pub const RESULTS_MARKER: &str = "Results";
/// Header label of the valuation id row.
pub const ID_LABEL: &str = "Valuation ID";
/// Header label of the version token row.
pub const VERSION_LABEL: &str = "Version";
/// Background of editable input cells.
pub const INPUT_FILL: &str = "#E6F3FF";
/// Background of read-only output cells.
pub const OUTPUT_FILL: &str = "#F2F2F2";

/// Blank rows between the last input and the `Results` marker.
const REGION_GAP: usize = 2;

/// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Value of a single cell as the spreadsheet host reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Shorthand for a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Project a JSON scalar onto a cell. Lists and objects become JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Empty),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Read a cell back as JSON. Integral numbers become integers.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                Value::Number(Number::from(*n as i64))
            }
            Self::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Text content, if this is a non-empty text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Check for a blank cell.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Cell content as a row key, exactly as typed. Blank text is no key.
    fn as_key(&self) -> Option<String> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.clone()),
            Self::Number(_) => self.as_label(),
            _ => None,
        }
    }

    fn as_label(&self) -> Option<String> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Self::Number(_) => match self.to_json() {
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Formatting applied to a cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStyle {
    #[serde(default)]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

impl CellStyle {
    fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    fn input() -> Self {
        Self {
            fill: Some(INPUT_FILL.to_string()),
            ..Self::default()
        }
    }

    fn output() -> Self {
        Self {
            fill: Some(OUTPUT_FILL.to_string()),
            locked: true,
            ..Self::default()
        }
    }
}

/// A value together with its formatting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    #[serde(default)]
    pub style: CellStyle,
}

impl Cell {
    fn new(value: CellValue, style: CellStyle) -> Self {
        Self { value, style }
    }

    fn plain(value: CellValue) -> Self {
        Self::new(value, CellStyle::default())
    }
}

/// The full projection of one payload, row by row from the top-left cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    rows: Vec<Vec<Cell>>,
    inputs: Range<usize>,
    outputs: Range<usize>,
}

impl SheetLayout {
    /// Lay out a payload.
    pub fn project(payload: &ValuationPayload) -> Self {
        let mut rows: Vec<Vec<Cell>> = Vec::new();

        let title = format!(
            "Valuation Report: {}",
            payload.company_name().unwrap_or(&payload.id)
        );
        rows.push(vec![Cell::new(CellValue::Text(title), CellStyle::bold())]);
        rows.push(vec![
            Cell::plain(CellValue::text(ID_LABEL)),
            Cell::plain(CellValue::text(payload.id.clone())),
        ]);
        rows.push(vec![
            Cell::plain(CellValue::text(VERSION_LABEL)),
            Cell::plain(
                payload
                    .etag
                    .as_ref()
                    .map(|etag| CellValue::text(etag.clone()))
                    .unwrap_or_default(),
            ),
        ]);
        rows.push(Vec::new());

        rows.push(vec![Cell::new(
            CellValue::text(ASSUMPTIONS_MARKER),
            CellStyle::bold(),
        )]);
        let input_start = rows.len();
        for (key, value) in flatten(&payload.inputs) {
            rows.push(vec![
                Cell::plain(CellValue::Text(key)),
                Cell::new(CellValue::from_json(&value), CellStyle::input()),
            ]);
        }
        let inputs = input_start..rows.len();

        rows.extend(std::iter::repeat_with(Vec::new).take(REGION_GAP));

        rows.push(vec![Cell::new(
            CellValue::text(RESULTS_MARKER),
            CellStyle::bold(),
        )]);
        let output_start = rows.len();
        for (key, value) in flatten(&payload.outputs) {
            rows.push(vec![
                Cell::plain(CellValue::Text(key)),
                Cell::new(CellValue::from_json(&value), CellStyle::output()),
            ]);
        }
        let outputs = output_start..rows.len();

        Self {
            rows,
            inputs,
            outputs,
        }
    }

    /// All rows, top to bottom.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Row indices of the editable input region.
    pub fn input_rows(&self) -> Range<usize> {
        self.inputs.clone()
    }

    /// Row indices of the read-only output region.
    pub fn output_rows(&self) -> Range<usize> {
        self.outputs.clone()
    }

    /// Find the row holding a dotted key in either region.
    pub fn find(&self, key: &str) -> Option<&[Cell]> {
        self.inputs
            .clone()
            .chain(self.outputs.clone())
            .map(|i| self.rows[i].as_slice())
            .find(|row| row.first().and_then(|c| c.value.as_text()) == Some(key))
    }

    /// Plain values, as a host would report them when reading the range.
    pub fn values(&self) -> Vec<Vec<CellValue>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|c| c.value.clone()).collect())
            .collect()
    }
}

/// What a scan of the sheet recovered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetReadback {
    pub id: Option<ValuationId>,
    pub etag: Option<ETag>,
    pub inputs: Map<String, Value>,
}

impl SheetReadback {
    /// Scan rows of `(key, value)` cells.
    ///
    /// Header rows before the `Assumptions` marker supply the id and version
    /// token. Input rows run until the `Results` marker or the end of the
    /// range. Rows with a blank key or no value column are skipped.
    pub fn scan(rows: &[Vec<CellValue>]) -> Result<Self> {
        #[derive(Clone, Copy, PartialEq)]
        enum Region {
            Header,
            Inputs,
            Done,
        }

        let mut readback = Self::default();
        let mut region = Region::Header;
        let mut pairs = Vec::new();

        for row in rows {
            // markers and header labels match trimmed; input keys stay verbatim
            let key = row.first().and_then(CellValue::as_key);
            let label = key.as_deref().map(str::trim);

            match (region, label) {
                (Region::Inputs, Some(RESULTS_MARKER)) => region = Region::Done,
                (_, Some(RESULTS_MARKER)) => {}
                (Region::Header, Some(ASSUMPTIONS_MARKER)) => region = Region::Inputs,
                (Region::Header, Some(ID_LABEL)) => {
                    readback.id = row.get(1).and_then(CellValue::as_label);
                }
                (Region::Header, Some(VERSION_LABEL)) => {
                    readback.etag = row.get(1).and_then(CellValue::as_label);
                }
                (Region::Inputs, Some(_)) => {
                    if let (Some(key), Some(value)) = (&key, row.get(1)) {
                        pairs.push((key.clone(), value.to_json()));
                    }
                }
                _ => {}
            }

            if region == Region::Done {
                break;
            }
        }

        if region == Region::Header {
            return Err(Error::MissingMarker(ASSUMPTIONS_MARKER));
        }

        readback.inputs = unflatten(pairs);
        Ok(readback)
    }

    /// Turn the scan into a payload for writing. Only inputs are carried.
    pub fn into_payload(self) -> Result<ValuationPayload> {
        let id = self.id.ok_or(Error::MissingValuationId)?;
        let mut payload = ValuationPayload::new(id).with_inputs(self.inputs);
        payload.etag = self.etag;
        payload.validate()?;
        Ok(payload)
    }
}

//! Worksheet hosts.
//!
//! The spreadsheet itself is an external collaborator: all the sync code
//! needs is "write these cells from A1" and "read the used range". This
//! module defines that contract and two hosts: an in-memory grid and a JSON
//! file on disk that the command-line tool edits.

use crate::error::SheetError;
use crate::storage::write_atomic;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use valsync_engine::sheet::{ASSUMPTIONS_MARKER, RESULTS_MARKER};
use valsync_engine::{Cell, CellValue};

/// A worksheet the sync flows can project onto and read back from.
#[async_trait]
pub trait Worksheet: Send + Sync {
    /// Replace the used range with `rows`, top-left at A1.
    async fn write_range(&self, rows: &[Vec<Cell>]) -> Result<(), SheetError>;

    /// Values of the used range, top-left at A1.
    async fn read_range(&self) -> Result<Vec<Vec<CellValue>>, SheetError>;
}

/// Set the value of the input row named `key`, as a user typing in the cell.
///
/// Only rows inside the `Assumptions` region can be edited, and locked cells
/// are refused.
pub fn edit_input(rows: &mut [Vec<Cell>], key: &str, value: CellValue) -> Result<(), SheetError> {
    let mut in_inputs = false;

    for row in rows.iter_mut() {
        let name = row
            .first()
            .and_then(|c| c.value.as_text())
            .map(str::to_string);
        match name.as_deref().map(str::trim) {
            Some(ASSUMPTIONS_MARKER) => in_inputs = true,
            Some(RESULTS_MARKER) => in_inputs = false,
            Some(_) if in_inputs && name.as_deref() == Some(key) => {
                if row.len() < 2 {
                    row.resize_with(2, Cell::default);
                }
                if row[1].style.locked {
                    return Err(SheetError::Host(format!("cell for '{}' is locked", key)));
                }
                row[1].value = value;
                return Ok(());
            }
            _ => {}
        }
    }

    Err(SheetError::Host(format!("no input named '{}'", key)))
}

fn values_of(rows: &[Vec<Cell>]) -> Vec<Vec<CellValue>> {
    rows.iter()
        .map(|row| row.iter().map(|c| c.value.clone()).collect())
        .collect()
}

/// Worksheet held in memory.
#[derive(Debug, Default)]
pub struct MemoryWorksheet {
    cells: Mutex<Vec<Vec<Cell>>>,
}

impl MemoryWorksheet {
    /// Create an empty sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every cell with its formatting.
    pub fn cells(&self) -> Vec<Vec<Cell>> {
        self.cells.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Edit an input value in place.
    pub fn set_input(&self, key: &str, value: CellValue) -> Result<(), SheetError> {
        let mut cells = self
            .cells
            .lock()
            .map_err(|_| SheetError::Host("sheet lock poisoned".into()))?;
        edit_input(&mut cells, key, value)
    }

    /// Edit any cell by zero-based position, honouring locks.
    pub fn set_value(&self, row: usize, col: usize, value: CellValue) -> Result<(), SheetError> {
        let mut cells = self
            .cells
            .lock()
            .map_err(|_| SheetError::Host("sheet lock poisoned".into()))?;
        if cells.len() <= row {
            cells.resize_with(row + 1, Vec::new);
        }
        let line = &mut cells[row];
        if line.len() <= col {
            line.resize_with(col + 1, Cell::default);
        }
        if line[col].style.locked {
            return Err(SheetError::Host(format!("cell ({}, {}) is locked", row, col)));
        }
        line[col].value = value;
        Ok(())
    }
}

#[async_trait]
impl Worksheet for MemoryWorksheet {
    async fn write_range(&self, rows: &[Vec<Cell>]) -> Result<(), SheetError> {
        let mut cells = self
            .cells
            .lock()
            .map_err(|_| SheetError::Host("sheet lock poisoned".into()))?;
        *cells = rows.to_vec();
        Ok(())
    }

    async fn read_range(&self) -> Result<Vec<Vec<CellValue>>, SheetError> {
        let cells = self
            .cells
            .lock()
            .map_err(|_| SheetError::Host("sheet lock poisoned".into()))?;
        Ok(values_of(&cells))
    }
}

/// Worksheet persisted as a JSON grid of cells.
#[derive(Debug, Clone)]
pub struct JsonFileWorksheet {
    path: PathBuf,
}

impl JsonFileWorksheet {
    /// Use the grid at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load every cell. A missing file is an empty sheet.
    pub async fn load(&self) -> Result<Vec<Vec<Cell>>, SheetError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| SheetError::Host(format!("unreadable sheet file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(SheetError::Host(e.to_string())),
        }
    }

    async fn store(&self, rows: &[Vec<Cell>]) -> Result<(), SheetError> {
        let raw = serde_json::to_vec_pretty(rows).map_err(|e| SheetError::Host(e.to_string()))?;
        write_atomic(self.path.clone(), raw)
            .await
            .map_err(|e| SheetError::Host(e.to_string()))
    }

    /// Edit an input value and save the file.
    pub async fn set_input(&self, key: &str, value: CellValue) -> Result<(), SheetError> {
        let mut rows = self.load().await?;
        edit_input(&mut rows, key, value)?;
        self.store(&rows).await
    }
}

#[async_trait]
impl Worksheet for JsonFileWorksheet {
    async fn write_range(&self, rows: &[Vec<Cell>]) -> Result<(), SheetError> {
        self.store(rows).await
    }

    async fn read_range(&self) -> Result<Vec<Vec<CellValue>>, SheetError> {
        Ok(values_of(&self.load().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use valsync_engine::{SheetLayout, ValuationPayload};

    fn layout() -> SheetLayout {
        SheetLayout::project(
            &ValuationPayload::from_value(json!({
                "id": "V1",
                "inputs": {"x": 1},
                "outputs": {"x": 7, "y": 2}
            }))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn memory_write_then_read() {
        let sheet = MemoryWorksheet::new();
        sheet.write_range(layout().rows()).await.unwrap();
        assert_eq!(sheet.read_range().await.unwrap(), layout().values());
    }

    #[tokio::test]
    async fn write_replaces_previous_range() {
        let sheet = MemoryWorksheet::new();
        sheet.set_value(40, 0, CellValue::text("stale")).unwrap();
        sheet.write_range(layout().rows()).await.unwrap();
        assert_eq!(sheet.cells().len(), layout().rows().len());
    }

    #[test]
    fn edit_input_only_in_assumptions() {
        let mut rows = layout().rows().to_vec();

        edit_input(&mut rows, "x", CellValue::Number(5.0)).unwrap();
        let x = layout().input_rows().start;
        assert_eq!(rows[x][1].value, CellValue::Number(5.0));

        // the output named "x" is untouched
        let out = layout().output_rows().start;
        assert_eq!(rows[out][1].value, CellValue::Number(7.0));

        assert!(edit_input(&mut rows, "y", CellValue::Number(9.0)).is_err());
    }

    #[tokio::test]
    async fn locked_cells_refuse_edits() {
        let sheet = MemoryWorksheet::new();
        let rows = layout();
        let out = rows.output_rows().start;
        sheet.write_range(rows.rows()).await.unwrap();

        assert!(sheet.set_value(out, 1, CellValue::Number(0.0)).is_err());
        assert!(sheet.set_value(out, 0, CellValue::text("renamed")).is_ok());
    }

    #[test]
    fn edit_input_matches_exact_key() {
        let payload = ValuationPayload::from_value(json!({
            "id": "V1",
            "inputs": {" rate ": 1, "rate": 2}
        }))
        .unwrap();
        let mut rows = SheetLayout::project(&payload).rows().to_vec();

        edit_input(&mut rows, " rate ", CellValue::Number(9.0)).unwrap();

        let values: Vec<_> = rows
            .iter()
            .filter(|row| row.len() > 1)
            .map(|row| (row[0].value.clone(), row[1].value.clone()))
            .collect();
        assert!(values.contains(&(CellValue::text(" rate "), CellValue::Number(9.0))));
        assert!(values.contains(&(CellValue::text("rate"), CellValue::Number(2.0))));
    }

    #[tokio::test]
    async fn file_sheet_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = JsonFileWorksheet::new(dir.path().join("sheet.json"));

        sheet.write_range(layout().rows()).await.unwrap();
        sheet.write_range(layout().rows()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["sheet.json".to_string()]);
    }

    #[tokio::test]
    async fn file_sheet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = JsonFileWorksheet::new(dir.path().join("nested").join("sheet.json"));

        assert!(sheet.read_range().await.unwrap().is_empty());

        sheet.write_range(layout().rows()).await.unwrap();
        sheet.set_input("x", CellValue::Number(5.0)).await.unwrap();

        let cells = sheet.load().await.unwrap();
        let x = layout().input_rows().start;
        assert_eq!(cells[x][1].value, CellValue::Number(5.0));
        assert!(cells[x][1].style.fill.is_some());
    }
}

//! Spreadsheet adapter - projects payloads onto a worksheet and reads edits back.

use crate::error::SheetError;
use crate::workbook::Worksheet;
use std::sync::Arc;
use valsync_engine::{SheetLayout, SheetReadback, ValuationPayload};

/// Boundary between the sync controller and the spreadsheet host.
#[derive(Clone)]
pub struct SpreadsheetAdapter {
    sheet: Arc<dyn Worksheet>,
}

impl SpreadsheetAdapter {
    pub fn new(sheet: Arc<dyn Worksheet>) -> Self {
        Self { sheet }
    }

    /// Replace the sheet with the two-region layout of `payload`.
    pub async fn write_valuation(&self, payload: &ValuationPayload) -> Result<(), SheetError> {
        let layout = SheetLayout::project(payload);
        self.sheet.write_range(layout.rows()).await?;

        tracing::debug!(
            valuation_id = %payload.id,
            rows = layout.rows().len(),
            "Wrote valuation to sheet"
        );
        Ok(())
    }

    /// Recover the id, version token and inputs from the sheet.
    ///
    /// Outputs are never read back.
    pub async fn read_valuation(&self) -> Result<ValuationPayload, SheetError> {
        let values = self.sheet.read_range().await?;
        let payload = SheetReadback::scan(&values)?.into_payload()?;

        tracing::debug!(
            valuation_id = %payload.id,
            inputs = payload.inputs.len(),
            "Read valuation from sheet"
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::MemoryWorksheet;
    use serde_json::json;
    use valsync_engine::CellValue;

    fn adapter() -> (Arc<MemoryWorksheet>, SpreadsheetAdapter) {
        let sheet = Arc::new(MemoryWorksheet::new());
        (sheet.clone(), SpreadsheetAdapter::new(sheet))
    }

    #[tokio::test]
    async fn reads_back_inputs_and_version() {
        let (_, adapter) = adapter();
        let payload = ValuationPayload::from_value(json!({
            "id": "V1",
            "inputs": {"growth": {"rate": 0.05, "years": 5}, "wacc": 0.1},
            "outputs": {"npv": 1200},
            "etag": "abc"
        }))
        .unwrap();

        adapter.write_valuation(&payload).await.unwrap();
        let back = adapter.read_valuation().await.unwrap();

        assert_eq!(back.id, "V1");
        assert_eq!(back.etag.as_deref(), Some("abc"));
        assert_eq!(back.inputs, payload.inputs);
        assert!(back.outputs.is_empty());
    }

    #[tokio::test]
    async fn picks_up_user_edits() {
        let (sheet, adapter) = adapter();
        let payload =
            ValuationPayload::from_value(json!({"id": "V1", "inputs": {"x": 1}})).unwrap();

        adapter.write_valuation(&payload).await.unwrap();
        sheet.set_input("x", CellValue::Number(5.0)).unwrap();

        let back = adapter.read_valuation().await.unwrap();
        assert_eq!(back.inputs["x"], json!(5));
    }

    #[tokio::test]
    async fn empty_sheet_is_an_error() {
        let (_, adapter) = adapter();
        assert!(matches!(
            adapter.read_valuation().await,
            Err(SheetError::Layout(_))
        ));
    }
}

//! Valuation payload - the unit of synchronization.

use crate::{error::Result, ETag, Error, ValuationId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One valuation run as exchanged with the platform.
///
/// `inputs` and `outputs` are nested mappings of scalars. Fields the server
/// sends that this crate does not interpret (company name, currency, meta,
/// validation lists) are kept in `extra` so a cached payload round-trips
/// without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationPayload {
    /// Stable identifier of the valuation run
    pub id: ValuationId,
    /// Editable assumptions
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Computed results, read-only on the client
    #[serde(default)]
    pub outputs: Map<String, Value>,
    /// Server revision token; `None` means writes are unconditional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<ETag>,
    /// Everything else the server sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ValuationPayload {
    /// Create an empty payload for a valuation id.
    pub fn new(id: impl Into<ValuationId>) -> Self {
        Self {
            id: id.into(),
            inputs: Map::new(),
            outputs: Map::new(),
            etag: None,
            extra: Map::new(),
        }
    }

    /// Parse a payload from a JSON value, rejecting anything without an id.
    pub fn from_value(value: Value) -> Result<Self> {
        let payload: Self =
            serde_json::from_value(value).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Builder: set the inputs mapping.
    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Builder: set the outputs mapping.
    pub fn with_outputs(mut self, outputs: Map<String, Value>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Builder: set the version token.
    pub fn with_etag(mut self, etag: impl Into<ETag>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Check the invariants the sync flows rely on.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::MissingValuationId);
        }
        Ok(())
    }

    /// Company name, if the server supplied one.
    pub fn company_name(&self) -> Option<&str> {
        self.extra.get("company_name").and_then(Value::as_str)
    }

    /// Server-side last update time from `meta.last_updated`, if present.
    pub fn last_updated(&self) -> Option<&str> {
        self.extra
            .get("meta")
            .and_then(|meta| meta.get("last_updated"))
            .and_then(Value::as_str)
    }

    /// Body of a write to the platform. Outputs are never written back.
    pub fn import_request(&self) -> ImportRequest {
        ImportRequest {
            id: self.id.clone(),
            inputs: self.inputs.clone(),
        }
    }
}

/// Body of `POST /import`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub id: ValuationId,
    pub inputs: Map<String, Value>,
}

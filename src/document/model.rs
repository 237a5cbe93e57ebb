//! Document records submitted to the registration service.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::wire_date;
use crate::error::Result;

/// A document registration request.
///
/// Absent fields are sent as JSON `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub description: Option<Description>,

    #[serde(default)]
    pub doc_id: Option<String>,

    #[serde(default)]
    pub doc_status: Option<String>,

    #[serde(default)]
    pub doc_type: Option<String>,

    #[serde(rename = "importRequest", default)]
    pub import_request: bool,

    #[serde(default)]
    pub owner_inn: Option<String>,

    #[serde(default)]
    pub participant_inn: Option<String>,

    #[serde(default)]
    pub producer_inn: Option<String>,

    #[serde(default, with = "wire_date")]
    pub production_date: Option<NaiveDate>,

    #[serde(default)]
    pub production_type: Option<String>,

    #[serde(default)]
    pub products: Option<Vec<Product>>,

    #[serde(default, with = "wire_date")]
    pub reg_date: Option<NaiveDate>,

    #[serde(default)]
    pub reg_number: Option<String>,
}

/// Participant description attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "participantInn", default)]
    pub participant_inn: Option<String>,
}

/// A single product entry of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub certificate_document: Option<String>,

    #[serde(default, with = "wire_date")]
    pub certificate_document_date: Option<NaiveDate>,

    #[serde(default)]
    pub certificate_document_number: Option<String>,

    #[serde(default)]
    pub owner_inn: Option<String>,

    #[serde(default)]
    pub producer_inn: Option<String>,

    #[serde(default, with = "wire_date")]
    pub production_date: Option<NaiveDate>,

    #[serde(default)]
    pub tnved_code: Option<String>,

    #[serde(default)]
    pub uit_code: Option<String>,

    #[serde(default)]
    pub uitu_code: Option<String>,
}

impl Document {
    /// Parse a document from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a document from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading document");

        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Render the document in its JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

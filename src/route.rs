//! Route types - the document switching record
//!
//! A route maps one logical document, identified by `(name, revision)`, to
//! the identity triples it carries on each side of the exchange:
//! - client: `client_uuid`, `client_projno`, `client_docno`
//! - contractor: `contractor_uuid`, `contractor_projno`, `contractor_docno`

use serde::{Deserialize, Serialize};

/// A document route - one row per document/revision pair.
///
/// All eight fields are required at write time; `(name, revision)` is
/// unique across the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRoute {
    /// Document name
    pub name: String,
    /// Revision label (unique together with name)
    pub revision: String,
    /// Client-side UUID
    pub client_uuid: String,
    /// Client-side project number
    pub client_projno: i64,
    /// Client-side document number
    pub client_docno: i64,
    /// Contractor-side UUID
    pub contractor_uuid: String,
    /// Contractor-side project number
    pub contractor_projno: i64,
    /// Contractor-side document number
    pub contractor_docno: i64,
}

impl DocumentRoute {
    /// Create a route with all fields supplied
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        revision: impl Into<String>,
        client_uuid: impl Into<String>,
        client_projno: i64,
        client_docno: i64,
        contractor_uuid: impl Into<String>,
        contractor_projno: i64,
        contractor_docno: i64,
    ) -> Self {
        Self {
            name: name.into(),
            revision: revision.into(),
            client_uuid: client_uuid.into(),
            client_projno,
            client_docno,
            contractor_uuid: contractor_uuid.into(),
            contractor_projno,
            contractor_docno,
        }
    }

    /// Synthesize a deterministic route from a row index.
    ///
    /// Field values are fully determined by `index`, so a load of `[0, n)`
    /// produces exactly one row per index and every row can be located
    /// afterwards by its derived UUIDs.
    pub fn synthetic(index: u64) -> Self {
        Self {
            name: format!("doc0{index}"),
            revision: "P01".to_string(),
            client_uuid: format!("doc{index}clientguid"),
            client_projno: 12345,
            client_docno: index as i64,
            contractor_uuid: format!("doc{index}contractguid"),
            contractor_projno: 543321,
            contractor_docno: index as i64,
        }
    }
}

use serde::Deserialize;
use serde_json::{Map, Value};

/// Data export request. Without a subject the whole tenant is exported.
#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    pub tenant_id: Option<String>,
    pub subject_id: Option<String>,
}

/// Erasure request. Without a subject the whole tenant is erased.
#[derive(Debug, Default, Deserialize)]
pub struct EraseRequest {
    pub tenant_id: Option<String>,
    pub subject_id: Option<String>,
}

/// Rectification request.
#[derive(Debug, Deserialize)]
pub struct RectifyRequest {
    pub tenant_id: Option<String>,
    pub subject_id: String,
    pub changes: Map<String, Value>,
}

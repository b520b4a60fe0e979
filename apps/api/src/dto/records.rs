use serde::Deserialize;
use serde_json::Value;

/// Incoming payload for record creation or replacement.
#[derive(Debug, Deserialize)]
pub struct PutRecordRequest {
    pub subject_id: Option<String>,
    pub data: Value,
}

/// Record listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct ListRecordsQuery {
    pub tenant_id: Option<String>,
    pub resource_type: Option<String>,
    pub subject_id: Option<String>,
}

/// Incoming payload for a cache write.
#[derive(Debug, Deserialize)]
pub struct PutCacheRequest {
    pub value: Value,
    pub subject_id: Option<String>,
    pub ttl_seconds: Option<u64>,
}

/// Object-storage path resolution input.
#[derive(Debug, Deserialize)]
pub struct StoragePathQuery {
    pub tenant_id: Option<String>,
    pub resource_path: String,
}

use chrono::{DateTime, Utc};
use civicvault_core::{AppError, AppResult, NonEmptyString, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest accepted data-subject identifier, in bytes.
pub const MAX_SUBJECT_ID_LENGTH: usize = 128;

/// Checks a data-subject identifier.
///
/// Any printable text is accepted so external ids such as `urn:user:7` can be
/// used verbatim.
pub fn validate_subject_id(subject_id: &str) -> AppResult<()> {
    if subject_id.trim().is_empty() {
        return Err(AppError::Validation(
            "subject id must not be empty".to_owned(),
        ));
    }

    if subject_id.len() > MAX_SUBJECT_ID_LENGTH {
        return Err(AppError::Validation(format!(
            "subject id must be at most {MAX_SUBJECT_ID_LENGTH} bytes"
        )));
    }

    if subject_id.chars().any(char::is_control) {
        return Err(AppError::Validation(
            "subject id must not contain control characters".to_owned(),
        ));
    }

    Ok(())
}

/// Durable business entity owned by exactly one tenant.
///
/// `tenant_id` is fixed at construction; there is no setter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    tenant_id: TenantId,
    resource_type: NonEmptyString,
    resource_id: NonEmptyString,
    subject_id: Option<String>,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRecord {
    /// Creates a validated record. `data` must be a JSON object.
    pub fn new(
        tenant_id: TenantId,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        subject_id: Option<String>,
        data: Value,
    ) -> AppResult<Self> {
        if let Some(subject_id) = subject_id.as_deref().filter(|value| !value.trim().is_empty()) {
            validate_subject_id(subject_id)?;
        }

        let now = Utc::now();
        Self::from_storage(
            tenant_id,
            resource_type.into(),
            resource_id.into(),
            subject_id,
            data,
            now,
            now,
        )
    }

    /// Rehydrates a record from storage.
    pub fn from_storage(
        tenant_id: TenantId,
        resource_type: String,
        resource_id: String,
        subject_id: Option<String>,
        data: Value,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if !data.is_object() {
            return Err(AppError::Validation(
                "record data must be a JSON object".to_owned(),
            ));
        }

        if data
            .get("tenant_id")
            .is_some_and(|embedded| embedded.as_str() != Some(tenant_id.as_str()))
        {
            return Err(AppError::TenantMismatch(
                "record data embeds a different tenant_id".to_owned(),
            ));
        }

        Ok(Self {
            tenant_id,
            resource_type: NonEmptyString::new(resource_type)?,
            resource_id: NonEmptyString::new(resource_id)?,
            subject_id: subject_id.filter(|value| !value.trim().is_empty()),
            data,
            created_at,
            updated_at,
        })
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the entity type, e.g. `content_item` or `session`.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.resource_type.as_str()
    }

    /// Returns the natural id within the tenant and type.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }

    /// Returns the data subject the record belongs to, if any.
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    /// Returns the JSON payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Merges top-level `changes` into the payload.
    ///
    /// `tenant_id` can never be changed this way.
    pub fn apply_changes(&mut self, changes: &serde_json::Map<String, Value>) -> AppResult<()> {
        if changes.contains_key("tenant_id") {
            return Err(AppError::TenantMismatch(
                "tenant_id is immutable after creation".to_owned(),
            ));
        }

        let Some(object) = self.data.as_object_mut() else {
            return Err(AppError::Internal(
                "record data lost its object shape".to_owned(),
            ));
        };

        for (field, value) in changes {
            object.insert(field.clone(), value.clone());
        }
        self.updated_at = Utc::now();

        Ok(())
    }

    /// Renders the record as a response payload with its tenant embedded.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "tenant_id": self.tenant_id.as_str(),
            "resource_type": self.resource_type.as_str(),
            "resource_id": self.resource_id.as_str(),
            "subject_id": self.subject_id,
            "data": self.data,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

/// Composite persisted key `(partition_index, tenant_id, resource_type, resource_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Storage partition of the owning tenant.
    pub partition_index: u32,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Entity type.
    pub resource_type: String,
    /// Natural id.
    pub resource_id: String,
}

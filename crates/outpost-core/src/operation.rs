//! Deferred operations: mutations captured offline and replayed later.
//!
//! Operations form a closed, versioned set. The HTTP triple used for replay
//! (method, path, body) is derived from the stored value alone, so a replay
//! always reproduces what was captured.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::ResourceKind;

/// Current schema version written into every new [`DeferredOperation`].
pub const OPERATION_SCHEMA_VERSION: u16 = 1;

/// HTTP-like method verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Uppercase verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(CoreError::InvalidMethod(s.to_string())),
        }
    }
}

/// The mutation to replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create a new entity in the collection.
    Create {
        /// Entity payload.
        body: Value,
    },
    /// Replace an existing entity.
    Update {
        /// Entity identifier.
        id: String,
        /// Entity payload.
        body: Value,
    },
    /// Delete an entity.
    Delete {
        /// Entity identifier.
        id: String,
    },
    /// Any other call into the resource, e.g. `POST /invoices/42/void`.
    Custom {
        /// Method verb.
        method: Method,
        /// Absolute path on the remote API.
        path: String,
        /// Optional payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
}

impl Operation {
    /// Short action name used by the capture policy.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Custom { .. } => "custom",
        }
    }
}

/// The exact request a replay sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRequest {
    /// Method verb.
    pub method: Method,
    /// Path relative to the API base URL.
    pub path: String,
    /// Request body, sent verbatim.
    pub body: Option<Value>,
}

/// A mutation captured locally for later replay against the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredOperation {
    /// Schema version of this record.
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    /// Target resource; also the operation's module tag.
    pub resource: ResourceKind,
    /// The mutation.
    pub operation: Operation,
}

fn default_schema_version() -> u16 {
    OPERATION_SCHEMA_VERSION
}

impl DeferredOperation {
    /// Wrap an operation for `resource`.
    #[must_use]
    pub fn new(resource: ResourceKind, operation: Operation) -> Self {
        Self {
            schema_version: OPERATION_SCHEMA_VERSION,
            resource,
            operation,
        }
    }

    /// `POST {collection}` with `body`.
    #[must_use]
    pub fn create(resource: ResourceKind, body: Value) -> Self {
        Self::new(resource, Operation::Create { body })
    }

    /// `PUT {collection}/{id}` with `body`.
    #[must_use]
    pub fn update(resource: ResourceKind, id: impl Into<String>, body: Value) -> Self {
        Self::new(
            resource,
            Operation::Update {
                id: id.into(),
                body,
            },
        )
    }

    /// `DELETE {collection}/{id}`.
    #[must_use]
    pub fn delete(resource: ResourceKind, id: impl Into<String>) -> Self {
        Self::new(resource, Operation::Delete { id: id.into() })
    }

    /// Arbitrary method and path within `resource`.
    #[must_use]
    pub fn custom(
        resource: ResourceKind,
        method: Method,
        path: impl Into<String>,
        body: Option<Value>,
    ) -> Self {
        Self::new(
            resource,
            Operation::Custom {
                method,
                path: path.into(),
                body,
            },
        )
    }

    /// Module tag, the resource name.
    #[must_use]
    pub fn module(&self) -> &'static str {
        self.resource.as_str()
    }

    /// Derive the replay request.
    #[must_use]
    pub fn request(&self) -> ReplayRequest {
        let collection = self.resource.collection_path();
        match &self.operation {
            Operation::Create { body } => ReplayRequest {
                method: Method::Post,
                path: collection.to_string(),
                body: Some(body.clone()),
            },
            Operation::Update { id, body } => ReplayRequest {
                method: Method::Put,
                path: format!("{collection}/{id}"),
                body: Some(body.clone()),
            },
            Operation::Delete { id } => ReplayRequest {
                method: Method::Delete,
                path: format!("{collection}/{id}"),
                body: None,
            },
            Operation::Custom { method, path, body } => ReplayRequest {
                method: *method,
                path: if path.starts_with('/') {
                    path.clone()
                } else {
                    format!("/{path}")
                },
                body: body.clone(),
            },
        }
    }
}

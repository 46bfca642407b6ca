use std::fmt;
use std::str::FromStr;

use crate::error::RpcError;

/// Routing target carried in `:path`.
///
/// Stateless operations are addressed as `namespace/operation`; stateful
/// ones embed the entity id: `namespace/id/operation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationPath {
    pub namespace: String,
    pub operation: String,
    pub entity_id: Option<String>,
}

impl OperationPath {
    pub fn new(namespace: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            operation: operation.into(),
            entity_id: None,
        }
    }

    pub fn stateful(
        namespace: impl Into<String>,
        entity_id: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            operation: operation.into(),
            entity_id: Some(entity_id.into()),
        }
    }

    /// Parse a `:path` value, stripping `base_path` (or a bare leading `/`).
    ///
    /// Returns `None` for anything that is not two or three non-empty
    /// segments.
    pub fn parse(path: &str, base_path: &str) -> Option<Self> {
        let rest = match path.strip_prefix(base_path) {
            Some(rest) if !base_path.is_empty() => rest,
            _ => path.strip_prefix('/').unwrap_or(path),
        };
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return None;
        }
        match parts.as_slice() {
            [namespace, operation] => Some(Self::new(*namespace, *operation)),
            [namespace, id, operation] => Some(Self::stateful(*namespace, *id, *operation)),
            _ => None,
        }
    }

    /// Handler lookup key: `namespace/operation`, never including the id.
    pub fn route_key(&self) -> String {
        route_key(&self.namespace, &self.operation)
    }

    /// Render as a `:path` value under `base_path`.
    pub fn to_path(&self, base_path: &str) -> String {
        format!("{base_path}{self}")
    }
}

pub(crate) fn route_key(namespace: &str, operation: &str) -> String {
    format!("{namespace}/{operation}")
}

impl fmt::Display for OperationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity_id {
            Some(id) => write!(f, "{}/{}/{}", self.namespace, id, self.operation),
            None => write!(f, "{}/{}", self.namespace, self.operation),
        }
    }
}

/// Parses `namespace/operation` or `namespace/id/operation`, with or without
/// a leading `/`.
impl FromStr for OperationPath {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, "/").ok_or_else(|| RpcError::InvalidPath(s.to_string()))
    }
}

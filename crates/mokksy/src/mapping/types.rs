//! Mapping types: a request specification bound to a responder.

use crate::request::{CapturedRequest, RequestSpecification};
use crate::response::ResponseDefinition;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identifier assigned at registration. Strictly increasing per server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MappingId(pub u64);

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Builds the response for a matched request.
pub type Responder = Arc<dyn Fn(&CapturedRequest) -> ResponseDefinition + Send + Sync>;

/// Per-mapping behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingOptions {
    /// Serve at most one request, then disappear.
    pub remove_after_match: bool,
    /// Log matches of this mapping at info level.
    pub verbose: bool,
}

impl MappingOptions {
    pub fn once() -> Self {
        Self {
            remove_after_match: true,
            ..Self::default()
        }
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

/// A registered mapping. Never mutated after registration.
pub struct Mapping {
    pub id: MappingId,
    pub specification: RequestSpecification,
    pub responder: Responder,
    pub options: MappingOptions,
    pub registered_at: DateTime<Utc>,
}

impl Mapping {
    pub fn priority(&self) -> i32 {
        self.specification.priority()
    }

    pub fn name(&self) -> Option<&str> {
        self.specification.name()
    }

    pub fn respond(&self, request: &CapturedRequest) -> ResponseDefinition {
        (self.responder)(request)
    }

    pub fn summary(&self) -> MappingSummary {
        MappingSummary {
            id: self.id,
            name: self.name().map(str::to_string),
            method: self
                .specification
                .method()
                .map_or_else(|| "*".to_string(), |m| m.to_string()),
            path: self.specification.path_description(),
            priority: self.priority(),
        }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.specification)
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("id", &self.id)
            .field("specification", &self.specification)
            .field("options", &self.options)
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// Handle returned by registration, used for match counts and removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MappingHandle {
    id: MappingId,
}

impl MappingHandle {
    pub(crate) fn new(id: MappingId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> MappingId {
        self.id
    }
}

/// Mapping description used in 404 diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSummary {
    pub id: MappingId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub method: String,
    pub path: String,
    pub priority: i32,
}

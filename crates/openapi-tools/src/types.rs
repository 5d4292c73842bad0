//! Descriptor types built from OpenAPI documents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Extra HTTP headers attached to every function of a document.
pub type HeaderPairs = BTreeMap<String, String>;

/// HTTP verbs an OpenAPI path item can declare operations for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    /// Parse a path-item key. Non-verb keys (`parameters`, `summary`, ...) yield `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "post" => Some(Self::Post),
            "delete" => Some(Self::Delete),
            "options" => Some(Self::Options),
            "head" => Some(Self::Head),
            "patch" => Some(Self::Patch),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared operation on a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMethod {
    pub method: HttpMethod,
    /// Function name exposed to the model.
    pub operation_id: String,
}

/// A path and its operations, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub methods: Vec<RouteMethod>,
}

/// Model-facing description of one callable function.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunctionSignature {
    /// Function name (the operationId).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: serde_json::Value,
}

/// Output of a [`crate::SchemaConverter`].
#[derive(Debug, Clone)]
pub struct ConvertedSchema {
    pub title: String,
    pub description: String,
    /// First server URL, without a trailing slash.
    pub url: String,
    pub routes: Vec<Route>,
    pub functions: Vec<FunctionSignature>,
}

/// Structured view of one tool source document.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    pub title: String,
    pub description: String,
    pub base_url: String,
    pub routes: Vec<Route>,
}

impl SchemaDescriptor {
    /// Flatten the route table into a path-keyed map.
    ///
    /// Every method of every route is inserted in declaration order, so when a
    /// path declares several methods only the last one stays addressable.
    pub fn route_map(&self) -> RouteMap {
        let mut map = RouteMap::default();
        for route in &self.routes {
            for method in &route.methods {
                map.insert(&route.path, method.method, &method.operation_id);
            }
        }
        map
    }
}

/// Entry of a [`RouteMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMapEntry {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: String,
}

/// Ordered path → operation map for a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMap {
    entries: Vec<RouteMapEntry>,
}

impl RouteMap {
    /// Insert a mapping. An existing entry for `path` is overwritten in place,
    /// keeping its original position.
    pub fn insert(&mut self, path: &str, method: HttpMethod, operation_id: &str) {
        let entry = RouteMapEntry {
            path: path.to_string(),
            method,
            operation_id: operation_id.to_string(),
        };
        match self.entries.iter_mut().find(|e| e.path == path) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteMapEntry> {
        self.entries.iter()
    }
}

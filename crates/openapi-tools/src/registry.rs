//! Aggregated function registry across all tool source documents.

use crate::converter::SchemaConverter;
use crate::error::SchemaError;
use crate::types::{FunctionSignature, HeaderPairs, HttpMethod, SchemaDescriptor};
use tracing::{debug, instrument};

/// Convert one raw document into its descriptor and function signatures.
///
/// Converter failures are returned unchanged.
pub fn build_descriptor(
    converter: &dyn SchemaConverter,
    raw: &str,
) -> Result<(SchemaDescriptor, Vec<FunctionSignature>), SchemaError> {
    let converted = converter.convert(raw)?;
    let descriptor = SchemaDescriptor {
        title: converted.title,
        description: converted.description,
        base_url: converted.url,
        routes: converted.routes,
    };
    Ok((descriptor, converted.functions))
}

/// A resolvable function: where and how to call it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub name: String,
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub headers: HeaderPairs,
    /// Index of the document that registered this function.
    pub source: usize,
}

impl FunctionEntry {
    /// Base URL joined with the route path.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

/// Name-addressable registry of every function exposed by a request's documents.
///
/// Rows are kept in registration order. When two documents expose the same
/// name, [`FunctionRegistry::resolve`] returns the row registered last.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    signatures: Vec<FunctionSignature>,
    entries: Vec<FunctionEntry>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from raw documents, in order.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn build<S: AsRef<str>>(
        converter: &dyn SchemaConverter,
        documents: &[S],
        headers: &HeaderPairs,
    ) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for (index, raw) in documents.iter().enumerate() {
            let (descriptor, signatures) = build_descriptor(converter, raw.as_ref())?;
            debug!(
                source = index,
                title = %descriptor.title,
                functions = signatures.len(),
                "Registering tool source"
            );
            registry.register(index, &descriptor, signatures, headers);
        }
        Ok(registry)
    }

    /// Add one document's functions and routes.
    pub fn register(
        &mut self,
        source: usize,
        descriptor: &SchemaDescriptor,
        signatures: Vec<FunctionSignature>,
        headers: &HeaderPairs,
    ) {
        self.signatures.extend(signatures);
        self.entries.extend(descriptor.route_map().iter().map(|route| FunctionEntry {
            name: route.operation_id.clone(),
            base_url: descriptor.base_url.clone(),
            path: route.path.clone(),
            method: route.method,
            headers: headers.clone(),
            source,
        }));
    }

    /// Look up a function by name. The latest registration wins.
    pub fn resolve(&self, name: &str) -> Result<&FunctionEntry, SchemaError> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.name == name)
            .ok_or_else(|| SchemaError::FunctionNotFound(name.to_string()))
    }

    /// All signatures in document order, duplicates included.
    pub fn signatures(&self) -> &[FunctionSignature] {
        &self.signatures
    }

    /// Names of all resolvable functions.
    pub fn function_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

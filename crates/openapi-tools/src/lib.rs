//! OpenAPI documents as model-callable tools.
//!
//! Each document is converted into a route table and a list of function
//! signatures; the [`FunctionRegistry`] aggregates them so a function name
//! chosen by the model can be mapped back to a concrete endpoint.

mod converter;
mod error;
mod registry;
mod types;

pub use converter::{OpenApiConverter, SchemaConverter};
pub use error::SchemaError;
pub use registry::{build_descriptor, FunctionEntry, FunctionRegistry};
pub use types::*;

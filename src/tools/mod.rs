//! External tool backend
//!
//! The orchestrator lists and invokes tools through [`ToolBackend`]. Two
//! backends exist: the in-process [`ToolRegistry`] and the HTTP
//! [`JsonRpcToolBackend`]. [`ToolCatalog`] sits in front of either and
//! caches the tool list.

pub mod backend;
pub mod cache;
pub mod error;
pub mod jsonrpc;
pub mod registry;
pub mod trait_def;

pub use backend::{ToolBackend, ToolOutput};
pub use cache::ToolCatalog;
pub use error::ToolExecutionError;
pub use jsonrpc::JsonRpcToolBackend;
pub use registry::ToolRegistry;
pub use trait_def::Tool;

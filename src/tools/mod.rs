//! Tool catalog and handlers exposed over the tool-calling protocol.

mod catalog;
mod handlers;

pub use catalog::{ParamDef, ParamType, ToolCatalog, ToolEntry};
pub use handlers::{builtin_catalog, ToolRouter};

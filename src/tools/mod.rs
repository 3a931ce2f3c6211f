//! Tool system for model tool use.

pub mod arguments;
pub mod builtin;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use builtin::{default_registry, LocationTool, WeatherTool};
pub use registry::ToolRegistry;
pub use tool::{FnTool, Tool, ToolOutput};
pub use types::{SchemaBuilder, ToolSpec};

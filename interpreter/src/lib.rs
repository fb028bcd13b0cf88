mod builtins;
mod interpreter;
mod variant;
mod vm;

// Walk a parsed document
pub use interpreter::Interpreter;

// The dynamically-typed runtime value
pub use variant::Variant;

// Scopes, console sinks and execution bounding
pub use vm::{BindError, VirtualMachine};

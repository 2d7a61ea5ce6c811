pub mod builtins;
pub mod environment;
pub mod error;
pub mod evaluator;

pub use builtins::declare_globals;
pub use environment::Environment;
pub use error::{ControlFlow, RuntimeError};
pub use evaluator::Interpreter;

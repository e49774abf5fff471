pub mod builtins;
pub mod environment;
pub mod eval;
pub mod frame;
pub mod vm;
pub mod vm_error;

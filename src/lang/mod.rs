pub mod ast;
pub mod object;

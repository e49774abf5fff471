use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::ir::CompiledFunction;
use crate::lang::ast::Block;
use crate::runtime::environment::Environment;

// =============================================================================
// OBJECT - Runtime values shared by the evaluator and the bytecode VM
// =============================================================================

pub const INTEGER: &str = "INTEGER";
pub const BOOLEAN: &str = "BOOLEAN";
pub const STRING: &str = "STRING";
pub const NULL: &str = "NULL";
pub const RETURN_VALUE: &str = "RETURN_VALUE";
pub const ERROR: &str = "ERROR";
pub const FUNCTION: &str = "FUNCTION";
pub const BUILTIN: &str = "BUILTIN";
pub const COMPILED_FUNCTION: &str = "COMPILED_FUNCTION";

#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    Str(String),
    Null,

    /// Wrapper the tree-walker uses to propagate `return` through nested
    /// blocks. Never constructed by the VM.
    ReturnValue(Box<Object>),

    /// Closure over an environment; tree-walker only.
    Function(Rc<Function>),

    Builtin(Builtin),

    /// Bytecode function; VM only.
    CompiledFunction(Rc<CompiledFunction>),

    /// Typed runtime failure flowing through the value channel.
    Error(RuntimeError),
}

#[derive(Debug)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Block,
    pub env: Rc<RefCell<Environment>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: fn(Vec<Object>) -> Object,
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => INTEGER,
            Object::Boolean(_) => BOOLEAN,
            Object::Str(_) => STRING,
            Object::Null => NULL,
            Object::ReturnValue(_) => RETURN_VALUE,
            Object::Function(_) => FUNCTION,
            Object::Builtin(_) => BUILTIN,
            Object::CompiledFunction(_) => COMPILED_FUNCTION,
            Object::Error(_) => ERROR,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::ReturnValue(a), Object::ReturnValue(b)) => a == b,
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => a.name == b.name,
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => a == b,
            (Object::Error(a), Object::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{}", value),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::Str(value) => write!(f, "\"{}\"", value),
            Object::Null => write!(f, "null"),
            Object::ReturnValue(value) => write!(f, "{}", value),
            Object::Function(func) => {
                write!(f, "fn({}) {{ ... }}", func.parameters.join(", "))
            }
            Object::Builtin(builtin) => write!(f, "builtin function {}", builtin.name),
            Object::CompiledFunction(_) => write!(f, "compiled function"),
            Object::Error(err) => write!(f, "ERROR: {}", err),
        }
    }
}

/// The runtime-error taxonomy. These are values, not host exceptions: a
/// partially evaluated program reports exactly what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    TypeMismatch {
        left: &'static str,
        right: &'static str,
    },
    UnknownOperator {
        operator: String,
        left: Option<&'static str>,
        right: &'static str,
    },
    UnknownIdentifier(String),
    NotAFunction(&'static str),
    ArgumentMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    ArgumentNumberMismatch {
        expected: usize,
        actual: usize,
    },
    DivisionByZero,
    Io(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::TypeMismatch { left, right } => {
                write!(f, "type mismatch: {} and {}", left, right)
            }
            RuntimeError::UnknownOperator {
                operator,
                left,
                right,
            } => match left {
                Some(left) => write!(f, "unknown operator: {} {} {}", left, operator, right),
                None => write!(f, "unknown operator: {}{}", operator, right),
            },
            RuntimeError::UnknownIdentifier(name) => {
                write!(f, "unknown identifier: {}", name)
            }
            RuntimeError::NotAFunction(type_name) => write!(f, "not a function: {}", type_name),
            RuntimeError::ArgumentMismatch { expected, actual } => {
                write!(f, "argument mismatch: expected {}, got {}", expected, actual)
            }
            RuntimeError::ArgumentNumberMismatch { expected, actual } => {
                write!(
                    f,
                    "wrong number of arguments: expected {}, got {}",
                    expected, actual
                )
            }
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::Io(message) => write!(f, "io error: {}", message),
        }
    }
}

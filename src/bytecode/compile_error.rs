use std::fmt;

/// One compile-time failure. The compiler accumulates these across the
/// whole traversal instead of short-circuiting, so a single pass reports
/// every independent problem.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Infix operator token the compiler has no lowering for.
    UnknownInfixOperator(String),
    /// Prefix operator token the compiler has no lowering for.
    UnknownPrefixOperator(String),
    /// Identifier that resolves in no table of the scope chain.
    UndefinedVariable(String),
    /// Placeholder node left behind by parser error recovery.
    InvalidExpression,
    /// Scope-stack underflow: something tried to pop the top-level scope.
    LeftGlobalScope,
    /// A peephole rewrite was asked for with no emitted instruction.
    NothingToTrim,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownInfixOperator(op) => {
                write!(f, "compile error: unknown infix operator '{}'", op)
            }
            CompileError::UnknownPrefixOperator(op) => {
                write!(f, "compile error: unknown prefix operator '{}'", op)
            }
            CompileError::UndefinedVariable(name) => {
                write!(f, "compile error: undefined variable '{}'", name)
            }
            CompileError::InvalidExpression => {
                write!(f, "compile error: cannot compile invalid expression")
            }
            CompileError::LeftGlobalScope => {
                write!(f, "compile error: internal error: left the global scope")
            }
            CompileError::NothingToTrim => {
                write!(
                    f,
                    "compile error: internal error: no instruction to rewrite"
                )
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Everything that went wrong in one compile pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CompileError::UndefinedVariable("x".to_string());
        assert_eq!(err.to_string(), "compile error: undefined variable 'x'");

        let err = CompileError::UnknownInfixOperator("%".to_string());
        assert!(err.to_string().contains("'%'"));
    }

    #[test]
    fn test_multiple_errors_render_one_per_line() {
        let errors = CompileErrors(vec![
            CompileError::UndefinedVariable("a".to_string()),
            CompileError::UndefinedVariable("b".to_string()),
        ]);

        let rendered = errors.to_string();
        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.contains("'a'"));
        assert!(rendered.contains("'b'"));
    }

    #[test]
    fn test_errors_implement_std_error() {
        let err = CompileError::InvalidExpression;
        let _: &dyn std::error::Error = &err;
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use crate::lang::ast::{Block, Expression, Program, Statement};
use crate::lang::object::{Function, Object, RuntimeError};
use crate::runtime::builtins;
use crate::runtime::environment::Environment;

// =============================================================================
// EVAL - Tree-walking evaluator
// =============================================================================
//
// The reference interpreter: it walks the AST directly, supports closures,
// and threads errors through the value channel exactly like the VM does.
// One deliberate divergence from the VM: `if` here treats integer zero as
// falsy.

pub fn eval_program(program: &Program, env: &Rc<RefCell<Environment>>) -> Object {
    let mut result = Object::Null;

    for statement in &program.statements {
        result = eval_statement(statement, env);
        match result {
            Object::ReturnValue(value) => return *value,
            Object::Error(_) => return result,
            _ => {}
        }
    }

    result
}

fn eval_statement(statement: &Statement, env: &Rc<RefCell<Environment>>) -> Object {
    match statement {
        Statement::Let { name, value } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            env.borrow_mut().set(name, value);
            Object::Null
        }
        Statement::Return(value) => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            Object::ReturnValue(Box::new(value))
        }
        Statement::Expr(expression) => eval_expression(expression, env),
    }
}

/// Blocks pass `ReturnValue` through unopened so that a nested return
/// unwinds to the function boundary, not just the nearest block.
fn eval_block(block: &Block, env: &Rc<RefCell<Environment>>) -> Object {
    let mut result = Object::Null;

    for statement in &block.statements {
        result = eval_statement(statement, env);
        if matches!(result, Object::ReturnValue(_) | Object::Error(_)) {
            return result;
        }
    }

    result
}

fn eval_expression(expression: &Expression, env: &Rc<RefCell<Environment>>) -> Object {
    match expression {
        Expression::Identifier(name) => match env.borrow().get(name) {
            Some(value) => value,
            None => match builtins::lookup(name) {
                Some(builtin) => Object::Builtin(builtin),
                None => Object::Error(RuntimeError::UnknownIdentifier(name.clone())),
            },
        },

        Expression::Integer(value) => Object::Integer(*value),
        Expression::Str(value) => Object::Str(value.clone()),
        Expression::Boolean(value) => Object::Boolean(*value),

        Expression::Prefix { operator, right } => {
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix(operator, right)
        }

        Expression::Infix {
            operator,
            left,
            right,
        } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_infix(operator, left, right)
        }

        Expression::If {
            condition,
            consequence,
            alternative,
        } => {
            let condition = eval_expression(condition, env);
            if condition.is_error() {
                return condition;
            }

            if is_truthy(&condition) {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Object::Null
            }
        }

        Expression::Function { parameters, body } => Object::Function(Rc::new(Function {
            parameters: parameters.clone(),
            body: body.clone(),
            env: Rc::clone(env),
        })),

        Expression::Call {
            function,
            arguments,
        } => {
            let function = eval_expression(function, env);
            if function.is_error() {
                return function;
            }

            let mut args = Vec::with_capacity(arguments.len());
            for argument in arguments {
                let arg = eval_expression(argument, env);
                if arg.is_error() {
                    return arg;
                }
                args.push(arg);
            }

            apply_function(function, args)
        }

        // Unreachable after a successful parse.
        Expression::Bad => Object::Null,
    }
}

fn apply_function(function: Object, args: Vec<Object>) -> Object {
    match function {
        Object::Function(func) => {
            if args.len() != func.parameters.len() {
                return Object::Error(RuntimeError::ArgumentNumberMismatch {
                    expected: func.parameters.len(),
                    actual: args.len(),
                });
            }

            let scope = Environment::new_enclosed(Rc::clone(&func.env));
            for (parameter, arg) in func.parameters.iter().zip(args) {
                scope.borrow_mut().set(parameter, arg);
            }

            match eval_block(&func.body, &scope) {
                Object::ReturnValue(value) => *value,
                other => other,
            }
        }

        Object::Builtin(builtin) => (builtin.func)(args),

        other => Object::Error(RuntimeError::NotAFunction(other.type_name())),
    }
}

/// Conditional truthiness for the tree-walker: false, null and integer
/// zero are falsy.
fn is_truthy(object: &Object) -> bool {
    match object {
        Object::Boolean(value) => *value,
        Object::Null => false,
        Object::Integer(0) => false,
        _ => true,
    }
}

fn eval_prefix(operator: &str, right: Object) -> Object {
    match operator {
        // Prefix bang never inspects integers: any non-boolean,
        // non-null operand negates to false, zero included.
        "!" => match right {
            Object::Boolean(value) => Object::Boolean(!value),
            Object::Null => Object::Boolean(true),
            _ => Object::Boolean(false),
        },
        "-" => match right {
            Object::Integer(value) => Object::Integer(value.wrapping_neg()),
            other => Object::Error(RuntimeError::UnknownOperator {
                operator: operator.to_string(),
                left: None,
                right: other.type_name(),
            }),
        },
        _ => Object::Error(RuntimeError::UnknownOperator {
            operator: operator.to_string(),
            left: None,
            right: right.type_name(),
        }),
    }
}

fn eval_infix(operator: &str, left: Object, right: Object) -> Object {
    match (left, right) {
        (Object::Integer(left), Object::Integer(right)) => {
            eval_integer_infix(operator, left, right)
        }

        (Object::Str(left), Object::Str(right)) => match operator {
            "+" => Object::Str(left + &right),
            "==" => Object::Boolean(left == right),
            "!=" => Object::Boolean(left != right),
            _ => Object::Error(RuntimeError::UnknownOperator {
                operator: operator.to_string(),
                left: Some(crate::lang::object::STRING),
                right: crate::lang::object::STRING,
            }),
        },

        (left, right) if left.type_name() == right.type_name() => match operator {
            "==" => Object::Boolean(left == right),
            "!=" => Object::Boolean(left != right),
            _ => Object::Error(RuntimeError::UnknownOperator {
                operator: operator.to_string(),
                left: Some(left.type_name()),
                right: right.type_name(),
            }),
        },

        (left, right) => Object::Error(RuntimeError::TypeMismatch {
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}

// Arithmetic wraps on overflow, like a two's-complement machine word;
// overflow is never a host panic.
fn eval_integer_infix(operator: &str, left: i64, right: i64) -> Object {
    match operator {
        "+" => Object::Integer(left.wrapping_add(right)),
        "-" => Object::Integer(left.wrapping_sub(right)),
        "*" => Object::Integer(left.wrapping_mul(right)),
        "/" => {
            if right == 0 {
                Object::Error(RuntimeError::DivisionByZero)
            } else {
                Object::Integer(left.wrapping_div(right))
            }
        }
        "<" => Object::Boolean(left < right),
        ">" => Object::Boolean(left > right),
        "<=" => Object::Boolean(left <= right),
        ">=" => Object::Boolean(left >= right),
        "==" => Object::Boolean(left == right),
        "!=" => Object::Boolean(left != right),
        _ => Object::Error(RuntimeError::UnknownOperator {
            operator: operator.to_string(),
            left: Some(crate::lang::object::INTEGER),
            right: crate::lang::object::INTEGER,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::lang::object::{BOOLEAN, INTEGER, STRING};

    fn eval(input: &str) -> Object {
        let tokens = Lexer::new(input).tokenize().expect("lexing failed");
        let program = Parser::new(tokens).parse().expect("parsing failed");
        eval_program(&program, &Environment::new())
    }

    fn expect_results(cases: &[(&str, Object)]) {
        for (input, expected) in cases {
            assert_eq!(eval(input), *expected, "input: {:?}", input);
        }
    }

    fn int(value: i64) -> Object {
        Object::Integer(value)
    }

    #[test]
    fn test_integer_expressions() {
        expect_results(&[
            ("5", int(5)),
            ("-5", int(-5)),
            ("5 + 5 + 5 + 5 - 10", int(10)),
            ("2 * 2 * 2 * 2 * 2", int(32)),
            ("50 / 2 * 2 + 10", int(60)),
            ("3 * (3 * 3) + 10", int(37)),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", int(50)),
        ]);
    }

    #[test]
    fn test_integer_overflow_wraps() {
        expect_results(&[
            ("9223372036854775806 + 9223372036854775806", int(-4)),
            ("9223372036854775807 * 2", int(-2)),
            ("0 - 9223372036854775807 - 2", int(i64::MAX)),
            ("-(0 - 9223372036854775807 - 1)", int(i64::MIN)),
        ]);
    }

    #[test]
    fn test_boolean_expressions() {
        expect_results(&[
            ("true", Object::Boolean(true)),
            ("1 < 2", Object::Boolean(true)),
            ("1 > 2", Object::Boolean(false)),
            ("1 <= 1", Object::Boolean(true)),
            ("1 >= 2", Object::Boolean(false)),
            ("1 == 1", Object::Boolean(true)),
            ("1 != 2", Object::Boolean(true)),
            ("true != false", Object::Boolean(true)),
            ("(1 < 2) == true", Object::Boolean(true)),
            ("!true", Object::Boolean(false)),
            ("!5", Object::Boolean(false)),
            ("!!5", Object::Boolean(true)),
            ("!0", Object::Boolean(false)),
        ]);
    }

    #[test]
    fn test_conditionals() {
        expect_results(&[
            ("if (true) { 10 }", int(10)),
            ("if (false) { 10 }", Object::Null),
            ("if (1) { 10 }", int(10)),
            ("if (1 < 2) { 10 } else { 20 }", int(10)),
            ("if (1 > 2) { 10 } else { 20 }", int(20)),
        ]);
    }

    #[test]
    fn test_zero_is_falsy_in_conditions() {
        // The bytecode engine disagrees: its conditional jump only treats
        // false and null as falsy.
        expect_results(&[
            ("if (0) { 10 } else { 20 }", int(20)),
            ("if (0) { 10 }", Object::Null),
            ("if (0 + 1) { 10 } else { 20 }", int(10)),
        ]);
    }

    #[test]
    fn test_return_statements() {
        expect_results(&[
            ("return 10;", int(10)),
            ("return 10; 9;", int(10)),
            ("return 2 * 5; 9;", int(10)),
            ("9; return 10; 9;", int(10)),
            (
                "if (10 > 1) { if (10 > 1) { return 10; } return 1; }",
                int(10),
            ),
        ]);
    }

    #[test]
    fn test_let_statements() {
        expect_results(&[
            ("let a = 5; a;", int(5)),
            ("let a = 5 * 5; a;", int(25)),
            ("let a = 5; let b = a; b;", int(5)),
            ("let a = 5; let b = a; let c = a + b + 5; c;", int(15)),
        ]);
    }

    #[test]
    fn test_functions_and_closures() {
        expect_results(&[
            ("let identity = fn(x) { x; }; identity(5);", int(5)),
            ("let identity = fn(x) { return x; }; identity(5);", int(5)),
            ("let double = fn(x) { x * 2; }; double(5);", int(10)),
            ("let add = fn(x, y) { x + y; }; add(5, add(5, 5));", int(15)),
            ("fn(x) { x; }(5)", int(5)),
            (
                "let newAdder = fn(x) { fn(y) { x + y }; };
                 let addTwo = newAdder(2);
                 addTwo(3);",
                int(5),
            ),
            (
                "let counter = fn(x) { if (x >= 3) { x } else { counter(x + 1) } };
                 counter(0);",
                int(3),
            ),
        ]);
    }

    #[test]
    fn test_string_expressions() {
        expect_results(&[
            ("\"hello\"", Object::Str("hello".to_string())),
            (
                "\"hello\" + \" \" + \"world\"",
                Object::Str("hello world".to_string()),
            ),
            ("\"a\" == \"a\"", Object::Boolean(true)),
            ("len(\"cinder\")", int(6)),
        ]);
    }

    #[test]
    fn test_error_handling() {
        let cases: &[(&str, RuntimeError)] = &[
            (
                "5 + true;",
                RuntimeError::TypeMismatch {
                    left: INTEGER,
                    right: BOOLEAN,
                },
            ),
            (
                "5 + true; 5;",
                RuntimeError::TypeMismatch {
                    left: INTEGER,
                    right: BOOLEAN,
                },
            ),
            (
                "-true",
                RuntimeError::UnknownOperator {
                    operator: "-".to_string(),
                    left: None,
                    right: BOOLEAN,
                },
            ),
            (
                "true + false;",
                RuntimeError::UnknownOperator {
                    operator: "+".to_string(),
                    left: Some(BOOLEAN),
                    right: BOOLEAN,
                },
            ),
            (
                "\"a\" - \"b\"",
                RuntimeError::UnknownOperator {
                    operator: "-".to_string(),
                    left: Some(STRING),
                    right: STRING,
                },
            ),
            (
                "if (10 > 1) { true + false; }",
                RuntimeError::UnknownOperator {
                    operator: "+".to_string(),
                    left: Some(BOOLEAN),
                    right: BOOLEAN,
                },
            ),
            ("foobar", RuntimeError::UnknownIdentifier("foobar".to_string())),
            ("5 / 0", RuntimeError::DivisionByZero),
            ("let x = 5; x();", RuntimeError::NotAFunction(INTEGER)),
            (
                "let f = fn(a, b) { a }; f(1);",
                RuntimeError::ArgumentNumberMismatch {
                    expected: 2,
                    actual: 1,
                },
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(
                eval(input),
                Object::Error(expected.clone()),
                "input: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_errors_stop_evaluation_of_later_statements() {
        let result = eval("let a = 5 + true; let b = 10; b;");
        assert!(result.is_error());
    }
}

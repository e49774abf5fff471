use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::token::Token;
use crate::lang::ast::{Block, Expression, Program, Statement};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Binding power of infix operators, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
}

fn token_precedence(token: &Token) -> Precedence {
    match token {
        Token::Eq | Token::NotEq => Precedence::Equals,
        Token::Lt | Token::Gt | Token::LtEq | Token::GtEq => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Asterisk | Token::Slash => Precedence::Product,
        Token::LParen => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

/// Pratt parser over a pre-lexed token stream.
///
/// Errors accumulate instead of aborting: recovery substitutes
/// `Expression::Bad` and keeps going so one parse reports every problem.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Program, Vec<ParseError>> {
        let mut statements = Vec::new();

        while *self.current() != Token::Eof {
            statements.push(self.parse_statement());
            self.advance();
        }

        if self.errors.is_empty() {
            Ok(Program { statements })
        } else {
            Err(self.errors)
        }
    }

    // Token cursor

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|s| s.span)
            .unwrap_or(Span { line: 0, col: 0 })
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos + 1)
            .map(|s| s.span)
            .unwrap_or(Span { line: 0, col: 0 })
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn error_at(&mut self, span: Span, message: String) {
        self.errors.push(ParseError {
            message,
            line: span.line,
            col: span.col,
        });
    }

    /// Advance past the next token if it matches, otherwise record an
    /// error and stay put so the caller can recover.
    fn expect_peek(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            let span = self.peek_span();
            let message = format!(
                "expected '{}', but got '{}'",
                expected.literal(),
                self.peek().literal()
            );
            self.error_at(span, message);
            false
        }
    }

    // Statements

    fn parse_statement(&mut self) -> Statement {
        match self.current() {
            Token::Let => self.parse_let_statement(),
            Token::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Statement {
        let name = if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            let span = self.peek_span();
            let message = format!("expected identifier, but got '{}'", self.peek().literal());
            self.error_at(span, message);
            None
        };

        self.expect_peek(&Token::Assign);
        self.advance();

        let value = self.parse_expression(Precedence::Lowest);
        if *self.peek() == Token::Semicolon {
            self.advance();
        }

        match name {
            Some(name) => Statement::Let { name, value },
            // Recovery: keep the statement so later errors still surface.
            None => Statement::Expr(Expression::Bad),
        }
    }

    fn parse_return_statement(&mut self) -> Statement {
        self.advance();

        let value = self.parse_expression(Precedence::Lowest);
        if *self.peek() == Token::Semicolon {
            self.advance();
        }

        Statement::Return(value)
    }

    fn parse_expression_statement(&mut self) -> Statement {
        let expression = self.parse_expression(Precedence::Lowest);
        if *self.peek() == Token::Semicolon {
            self.advance();
        }

        Statement::Expr(expression)
    }

    fn parse_block(&mut self) -> Block {
        let mut statements = Vec::new();

        self.advance();
        while *self.current() != Token::RBrace && *self.current() != Token::Eof {
            statements.push(self.parse_statement());
            self.advance();
        }

        Block { statements }
    }

    // Expressions

    fn parse_expression(&mut self, precedence: Precedence) -> Expression {
        let Some(mut left) = self.parse_prefix() else {
            let span = self.current_span();
            let message = format!("unexpected '{}' in expression", self.current().literal());
            self.error_at(span, message);
            return Expression::Bad;
        };

        while *self.peek() != Token::Semicolon && precedence < token_precedence(self.peek()) {
            left = match self.peek() {
                Token::LParen => {
                    self.advance();
                    self.parse_call_expression(left)
                }
                Token::Plus
                | Token::Minus
                | Token::Asterisk
                | Token::Slash
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::Gt
                | Token::LtEq
                | Token::GtEq => {
                    self.advance();
                    self.parse_infix_expression(left)
                }
                _ => return left,
            };
        }

        left
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        let expr = match self.current().clone() {
            Token::Ident(name) => Expression::Identifier(name),
            Token::Int(value) => Expression::Integer(value),
            Token::Str(value) => Expression::Str(value),
            Token::True => Expression::Boolean(true),
            Token::False => Expression::Boolean(false),
            Token::Bang | Token::Minus => self.parse_prefix_expression(),
            Token::LParen => self.parse_grouped_expression(),
            Token::If => self.parse_if_expression(),
            Token::Function => self.parse_function_literal(),
            _ => return None,
        };

        Some(expr)
    }

    fn parse_prefix_expression(&mut self) -> Expression {
        let operator = self.current().literal();
        self.advance();

        Expression::Prefix {
            operator,
            right: Box::new(self.parse_expression(Precedence::Prefix)),
        }
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Expression {
        let operator = self.current().literal();
        let prec = token_precedence(self.current());
        self.advance();

        Expression::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(self.parse_expression(prec)),
        }
    }

    fn parse_grouped_expression(&mut self) -> Expression {
        self.advance();
        let expr = self.parse_expression(Precedence::Lowest);
        self.expect_peek(&Token::RParen);
        expr
    }

    fn parse_if_expression(&mut self) -> Expression {
        self.expect_peek(&Token::LParen);
        self.advance();

        let condition = self.parse_expression(Precedence::Lowest);

        self.expect_peek(&Token::RParen);
        self.expect_peek(&Token::LBrace);

        let consequence = self.parse_block();

        let alternative = if *self.peek() == Token::Else {
            self.advance();
            self.expect_peek(&Token::LBrace);
            Some(self.parse_block())
        } else {
            None
        };

        Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        }
    }

    fn parse_function_literal(&mut self) -> Expression {
        self.expect_peek(&Token::LParen);
        let parameters = self.parse_function_parameters();
        self.expect_peek(&Token::LBrace);
        let body = self.parse_block();

        Expression::Function { parameters, body }
    }

    fn parse_function_parameters(&mut self) -> Vec<String> {
        let mut parameters = Vec::new();

        if *self.peek() == Token::RParen {
            self.advance();
            return parameters;
        }

        loop {
            self.advance();
            if let Token::Ident(name) = self.current() {
                parameters.push(name.clone());
            } else {
                let span = self.current_span();
                let message = format!(
                    "expected parameter name, but got '{}'",
                    self.current().literal()
                );
                self.error_at(span, message);
            }

            if *self.peek() != Token::Comma {
                break;
            }
            self.advance();
        }

        self.expect_peek(&Token::RParen);
        parameters
    }

    fn parse_call_expression(&mut self, function: Expression) -> Expression {
        let mut arguments = Vec::new();

        if *self.peek() == Token::RParen {
            self.advance();
        } else {
            loop {
                self.advance();
                arguments.push(self.parse_expression(Precedence::Lowest));

                if *self.peek() != Token::Comma {
                    break;
                }
                self.advance();
            }
            self.expect_peek(&Token::RParen);
        }

        Expression::Call {
            function: Box::new(function),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn parse(source: &str) -> Program {
        let tokens = Lexer::new(source).tokenize().expect("lexing failed");
        Parser::new(tokens).parse().expect("parsing failed")
    }

    fn parse_errors(source: &str) -> Vec<ParseError> {
        let tokens = Lexer::new(source).tokenize().expect("lexing failed");
        Parser::new(tokens).parse().expect_err("expected parse errors")
    }

    #[test]
    fn test_let_statements() {
        let program = parse("let x = 5; let y = x;");
        assert_eq!(program.statements.len(), 2);
        assert_eq!(
            program.statements[0],
            Statement::Let {
                name: "x".to_string(),
                value: Expression::Integer(5),
            }
        );
        assert_eq!(program.to_string(), "let x = 5;let y = x;");
    }

    #[test]
    fn test_return_statement() {
        let program = parse("return 10;");
        assert_eq!(
            program.statements[0],
            Statement::Return(Expression::Integer(10))
        );
    }

    #[test]
    fn test_operator_precedence() {
        let cases = [
            ("1 + 2 * 3 - 4", "((1 + (2 * 3)) - 4)"),
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b / c", "(a + (b / c))"),
            ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
            ("1 <= 2 == true", "((1 <= 2) == true)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            ("add(a, b, 1, 2 * 3)", "add(a, b, 1, (2 * 3))"),
        ];

        for (input, expected) in cases {
            assert_eq!(parse(input).to_string(), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_if_expression() {
        let program = parse("if (x < y) { x } else { y }");
        let Statement::Expr(Expression::If {
            condition,
            consequence,
            alternative,
        }) = &program.statements[0]
        else {
            panic!("expected if expression, got {:?}", program.statements[0]);
        };

        assert_eq!(condition.to_string(), "(x < y)");
        assert_eq!(consequence.statements.len(), 1);
        assert_eq!(alternative.as_ref().map(|b| b.statements.len()), Some(1));
    }

    #[test]
    fn test_function_literal() {
        let program = parse("fn(x, y) { x + y; }");
        let Statement::Expr(Expression::Function { parameters, body }) = &program.statements[0]
        else {
            panic!("expected function literal");
        };

        assert_eq!(parameters, &["x".to_string(), "y".to_string()]);
        assert_eq!(body.statements.len(), 1);
    }

    #[test]
    fn test_function_without_parameters() {
        let program = parse("fn() { 1 }");
        let Statement::Expr(Expression::Function { parameters, .. }) = &program.statements[0]
        else {
            panic!("expected function literal");
        };

        assert!(parameters.is_empty());
    }

    #[test]
    fn test_call_expression() {
        let program = parse("add(1, 2 * 3)");
        assert_eq!(program.to_string(), "add(1, (2 * 3))");
    }

    #[test]
    fn test_string_literal() {
        let program = parse("\"hello\";");
        assert_eq!(
            program.statements[0],
            Statement::Expr(Expression::Str("hello".to_string()))
        );
    }

    #[test]
    fn test_recovery_collects_multiple_errors() {
        let errors = parse_errors("let = 5; let y 10;");
        assert!(errors.len() >= 2, "got: {:?}", errors);
        assert!(errors[0].message.contains("expected identifier"));
    }

    #[test]
    fn test_error_positions() {
        let errors = parse_errors("let x 5;");
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].col, 7);
    }
}

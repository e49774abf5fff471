use crate::frontend::token::Token;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

/// A token together with the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for LexerError {}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Lex the whole input. The returned stream always ends with `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            let span = self.span();

            let Some(ch) = self.current() else {
                tokens.push(Spanned {
                    token: Token::Eof,
                    span,
                });
                return Ok(tokens);
            };

            let token = match ch {
                '=' => self.two_char('=', Token::Eq, Token::Assign),
                '!' => self.two_char('=', Token::NotEq, Token::Bang),
                '<' => self.two_char('=', Token::LtEq, Token::Lt),
                '>' => self.two_char('=', Token::GtEq, Token::Gt),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '*' => self.single(Token::Asterisk),
                '/' => self.single(Token::Slash),
                ',' => self.single(Token::Comma),
                ';' => self.single(Token::Semicolon),
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '{' => self.single(Token::LBrace),
                '}' => self.single(Token::RBrace),
                '"' => self.read_string()?,
                c if c.is_ascii_digit() => self.read_number()?,
                c if is_ident_start(c) => self.read_identifier(),
                c => {
                    return Err(LexerError {
                        message: format!("unexpected character '{}'", c),
                        line: span.line,
                        col: span.col,
                    });
                }
            };

            tokens.push(Spanned { token, span });
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek() == Some('/') {
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Consume one char; if the next one is `follow`, consume it too and
    /// produce `long`, otherwise produce `short`.
    fn two_char(&mut self, follow: char, long: Token, short: Token) -> Token {
        self.advance();
        if self.current() == Some(follow) {
            self.advance();
            long
        } else {
            short
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let span = self.span();
        let mut digits = String::new();

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        digits.parse::<i64>().map(Token::Int).map_err(|_| LexerError {
            message: format!("integer literal out of range: {}", digits),
            line: span.line,
            col: span.col,
        })
    }

    fn read_identifier(&mut self) -> Token {
        let mut word = String::new();

        while let Some(ch) = self.current() {
            if is_ident_start(ch) || ch.is_ascii_digit() {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::keyword(&word).unwrap_or(Token::Ident(word))
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance();

        let mut string = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(Token::Str(string));
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => string.push('\n'),
                        Some('t') => string.push('\t'),
                        Some('r') => string.push('\r'),
                        Some('\\') => string.push('\\'),
                        Some('"') => string.push('"'),
                        Some('0') => string.push('\0'),
                        Some(ch) => {
                            return Err(LexerError {
                                message: format!("unknown escape sequence: \\{}", ch),
                                line: self.line,
                                col: self.col,
                            });
                        }
                        None => {
                            return Err(LexerError {
                                message: "unexpected EOF in escape sequence".to_string(),
                                line: self.line,
                                col: self.col,
                            });
                        }
                    }
                    self.advance();
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
                None => {
                    return Err(LexerError {
                        message: "unterminated string literal".to_string(),
                        line: start_line,
                        col: start_col,
                    });
                }
            }
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .expect("lexing failed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_operators_and_delimiters() {
        assert_eq!(
            tokens("=+-*/!<><=>===!=,;(){}"),
            vec![
                Token::Assign,
                Token::Plus,
                Token::Minus,
                Token::Asterisk,
                Token::Slash,
                Token::Bang,
                Token::Lt,
                Token::Gt,
                Token::LtEq,
                Token::GtEq,
                Token::Eq,
                Token::NotEq,
                Token::Comma,
                Token::Semicolon,
                Token::LParen,
                Token::RParen,
                Token::LBrace,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_let_statement() {
        assert_eq!(
            tokens("let five = 5;"),
            vec![
                Token::Let,
                Token::Ident("five".to_string()),
                Token::Assign,
                Token::Int(5),
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_function_literal() {
        assert_eq!(
            tokens("fn(x, y) { x + y }"),
            vec![
                Token::Function,
                Token::LParen,
                Token::Ident("x".to_string()),
                Token::Comma,
                Token::Ident("y".to_string()),
                Token::RParen,
                Token::LBrace,
                Token::Ident("x".to_string()),
                Token::Plus,
                Token::Ident("y".to_string()),
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""hello\n\"world\"""#),
            vec![Token::Str("hello\n\"world\"".to_string()), Token::Eof]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("1 // one\n2"),
            vec![Token::Int(1), Token::Int(2), Token::Eof]
        );
    }

    #[test]
    fn test_spans_track_lines() {
        let spanned = Lexer::new("1\n  2").tokenize().expect("lexing failed");
        assert_eq!(spanned[0].span, Span { line: 1, col: 1 });
        assert_eq!(spanned[1].span, Span { line: 2, col: 3 });
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"oops").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("1 @ 2").tokenize().unwrap_err();
        assert!(err.message.contains("'@'"));
        assert_eq!(err.col, 3);
    }
}

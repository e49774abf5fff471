// =============================================================================
// TOKEN - Lexical tokens of the Cinder language
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Str(String),

    // operators
    Assign,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Bang,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,

    // delimiters
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,

    // keywords
    Let,
    Function,
    True,
    False,
    If,
    Else,
    Return,

    Eof,
}

impl Token {
    /// Map an identifier-shaped word to its keyword token, if it is one.
    pub fn keyword(word: &str) -> Option<Token> {
        match word {
            "let" => Some(Token::Let),
            "fn" => Some(Token::Function),
            "true" => Some(Token::True),
            "false" => Some(Token::False),
            "if" => Some(Token::If),
            "else" => Some(Token::Else),
            "return" => Some(Token::Return),
            _ => None,
        }
    }

    /// The source text this token stands for. Used in diagnostics and as
    /// the operator string carried by prefix/infix AST nodes.
    pub fn literal(&self) -> String {
        match self {
            Token::Ident(name) => name.clone(),
            Token::Int(value) => value.to_string(),
            Token::Str(value) => value.clone(),
            Token::Assign => "=".to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Asterisk => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::Bang => "!".to_string(),
            Token::Lt => "<".to_string(),
            Token::Gt => ">".to_string(),
            Token::LtEq => "<=".to_string(),
            Token::GtEq => ">=".to_string(),
            Token::Eq => "==".to_string(),
            Token::NotEq => "!=".to_string(),
            Token::Comma => ",".to_string(),
            Token::Semicolon => ";".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::LBrace => "{".to_string(),
            Token::RBrace => "}".to_string(),
            Token::Let => "let".to_string(),
            Token::Function => "fn".to_string(),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::If => "if".to_string(),
            Token::Else => "else".to_string(),
            Token::Return => "return".to_string(),
            Token::Eof => "<eof>".to_string(),
        }
    }
}

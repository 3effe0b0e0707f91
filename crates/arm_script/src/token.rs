#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Boolean(bool),
    String(String),
    Identifier(String),
    None,

    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,

    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    And,
    Or,
    Not,

    Assign,
    Dot,
    Comma,
    Semicolon,
    Newline,

    If,
    Else,
    While,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
}

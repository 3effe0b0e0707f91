use crate::error::{Result, ScriptError};
use crate::token::Token;

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    variable_sigil: char,
    // Newlines inside (...) or [...] do not terminate a statement.
    nesting: usize,
}

impl Lexer {
    #[must_use]
    pub fn new(input: &str, variable_sigil: char) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            variable_sigil,
            nesting: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos + 1).copied()
    }

    const fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '#' {
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch == '\n' && self.nesting == 0 {
                break;
            } else if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<f64> {
        let start = self.pos;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }
        let num_str: String = self.input[start..self.pos].iter().collect();
        num_str
            .parse::<f64>()
            .map_err(|_| ScriptError::syntax(format!("Invalid number: {num_str}")))
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].iter().collect()
    }

    fn read_string(&mut self, quote: char) -> Result<String> {
        self.advance();
        let start = self.pos;
        while let Some(ch) = self.current() {
            if ch == quote {
                let result: String = self.input[start..self.pos].iter().collect();
                self.advance();
                return Ok(result);
            }
            self.advance();
        }
        Err(ScriptError::syntax("Unterminated string"))
    }

    fn read_variable(&mut self) -> Result<String> {
        let sigil = self.variable_sigil;
        self.advance();

        match self.current() {
            Some(ch) if is_alpha(ch) => {}
            _ => {
                return Err(ScriptError::syntax(format!(
                    "Invalid variable name after '{sigil}'"
                )));
            }
        }

        Ok(self.read_identifier())
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();

        let Some(ch) = self.current() else {
            return Ok(None);
        };

        let token = match ch {
            c if c == self.variable_sigil => Token::Identifier(self.read_variable()?),
            '\n' => self.single(Token::Newline),
            '"' => Token::String(self.read_string(ch)?),
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => self.single(Token::Multiply),
            '/' => self.single(Token::Divide),
            '%' => self.single(Token::Modulo),
            ',' => self.single(Token::Comma),
            ';' => self.single(Token::Semicolon),
            '.' => self.single(Token::Dot),
            '{' => self.single(Token::LeftBrace),
            '}' => self.single(Token::RightBrace),
            '(' => {
                self.nesting += 1;
                self.single(Token::LeftParen)
            }
            ')' => {
                self.nesting = self.nesting.saturating_sub(1);
                self.single(Token::RightParen)
            }
            '[' => {
                self.nesting += 1;
                self.single(Token::LeftBracket)
            }
            ']' => {
                self.nesting = self.nesting.saturating_sub(1);
                self.single(Token::RightBracket)
            }
            '=' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    Token::Equal
                } else {
                    Token::Assign
                }
            }
            '!' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::Not
                }
            }
            '>' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            '<' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    Token::LessEqual
                } else {
                    Token::Less
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    self.single(Token::And)
                } else {
                    return Err(ScriptError::syntax(
                        "Invalid operator '&', use '&&' for logical AND",
                    ));
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    self.single(Token::Or)
                } else {
                    return Err(ScriptError::syntax(
                        "Invalid operator '|', use '||' for logical OR",
                    ));
                }
            }
            _ if ch.is_ascii_digit() => Token::Number(self.read_number()?),
            _ if is_alpha(ch) => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" | "True" => Token::Boolean(true),
                    "false" | "False" => Token::Boolean(false),
                    "none" | "None" => Token::None,
                    "and" | "AND" => Token::And,
                    "or" | "OR" => Token::Or,
                    "not" | "NOT" => Token::Not,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "while" => Token::While,
                    _ => Token::Identifier(ident),
                }
            }
            '\'' => {
                return Err(ScriptError::syntax(
                    "Single-quoted strings are not allowed. Use double quotes.",
                ));
            }
            _ => return Err(ScriptError::syntax(format!("Unexpected character: {ch}"))),
        };

        Ok(Some(token))
    }

    /// Splits the whole input into tokens.
    ///
    /// # Errors
    ///
    /// Returns a syntax error on the first character that cannot start a token.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn is_alpha(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

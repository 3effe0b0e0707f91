use crate::ast::{Expr, InterpolationSegment, Script, Stmt};
use crate::error::{Result, ScriptError};
use crate::lexer::Lexer;
use crate::token::Token;
use crate::value::Value;

const VARIABLE_SIGIL: char = '@';

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    const fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    const fn advance(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.current() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(ScriptError::syntax(format!(
                "Expected {:?}, found {:?}",
                expected,
                self.current()
            )))
        }
    }

    fn at_separator(&self) -> bool {
        matches!(self.current(), Some(Token::Newline | Token::Semicolon))
    }

    fn skip_separators(&mut self) {
        while self.at_separator() {
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.current() == Some(&Token::Newline) {
            self.advance();
        }
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        let result = self.parse_or()?;
        match self.current() {
            None => Ok(result),
            Some(Token::Assign) => Err(ScriptError::syntax(
                "Invalid operator '=', use '==' for equality",
            )),
            Some(token) => Err(ScriptError::syntax(format!("Unexpected token: {token:?}"))),
        }
    }

    fn parse_statements(&mut self, in_block: bool) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            match self.current() {
                None if in_block => return Err(ScriptError::syntax("Unclosed block, missing '}'")),
                None => break,
                Some(Token::RightBrace) if in_block => break,
                Some(Token::RightBrace) => return Err(ScriptError::syntax("Unmatched '}'")),
                Some(_) => {}
            }

            statements.push(self.parse_statement()?);

            match self.current() {
                None | Some(Token::Newline | Token::Semicolon) => {}
                Some(Token::RightBrace) if in_block => {}
                Some(token) => {
                    return Err(ScriptError::syntax(format!(
                        "Expected end of statement, found {token:?}"
                    )));
                }
            }
        }
        Ok(statements)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Token::LeftBrace)?;
        let body = self.parse_statements(true)?;
        self.expect(&Token::RightBrace)?;
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        match (self.current(), self.peek()) {
            (Some(Token::If), _) => self.parse_if(),
            (Some(Token::While), _) => {
                self.advance();
                let condition = self.parse_or()?;
                let body = self.parse_block()?;
                Ok(Stmt::While { condition, body })
            }
            (Some(Token::Identifier(name)), Some(Token::Assign)) => {
                let name = name.clone();
                self.advance();
                self.advance();
                let value = self.parse_or()?;
                Ok(Stmt::Assign(name, value))
            }
            _ => {
                let expr = self.parse_or()?;
                if self.current() == Some(&Token::Assign) {
                    return Err(ScriptError::syntax("Invalid assignment target"));
                }
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect(&Token::If)?;
        let condition = self.parse_or()?;
        let then_branch = self.parse_block()?;

        let resume = self.pos;
        self.skip_newlines();
        let else_branch = if self.current() == Some(&Token::Else) {
            self.advance();
            if self.current() == Some(&Token::If) {
                vec![self.parse_if()?]
            } else {
                self.parse_block()?
            }
        } else {
            self.pos = resume;
            Vec::new()
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.current() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.current() == Some(&Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;

        let build: fn(Box<Expr>, Box<Expr>) -> Expr = match self.current() {
            Some(Token::Equal) => Expr::Eq,
            Some(Token::NotEqual) => Expr::Ne,
            Some(Token::Greater) => Expr::Gt,
            Some(Token::GreaterEqual) => Expr::Ge,
            Some(Token::Less) => Expr::Lt,
            Some(Token::LessEqual) => Expr::Le,
            _ => return Ok(left),
        };

        self.advance();
        let right = self.parse_additive()?;
        Ok(build(Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            match self.current() {
                Some(Token::Plus) => {
                    self.advance();
                    let right = self.parse_multiplicative()?;
                    left = Expr::Add(Box::new(left), Box::new(right));
                }
                Some(Token::Minus) => {
                    self.advance();
                    let right = self.parse_multiplicative()?;
                    left = Expr::Sub(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            match self.current() {
                Some(Token::Multiply) => {
                    self.advance();
                    let right = self.parse_unary()?;
                    left = Expr::Mul(Box::new(left), Box::new(right));
                }
                Some(Token::Divide) => {
                    self.advance();
                    let right = self.parse_unary()?;
                    left = Expr::Div(Box::new(left), Box::new(right));
                }
                Some(Token::Modulo) => {
                    self.advance();
                    let right = self.parse_unary()?;
                    left = Expr::Mod(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.current() {
            Some(Token::Not) => {
                self.advance();
                let value = self.parse_unary()?;
                Ok(Expr::Not(Box::new(value)))
            }
            Some(Token::Minus) => {
                self.advance();
                let value = self.parse_unary()?;
                Ok(Expr::Neg(Box::new(value)))
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        while self.current() == Some(&Token::LeftBracket) {
            self.advance();
            let index = self.parse_or()?;
            self.expect(&Token::RightBracket)?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn parse_list_items(&mut self, close: &Token) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while self.current() != Some(close) {
            items.push(self.parse_or()?);
            if self.current() == Some(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_string_content(raw_string: &str) -> Result<Vec<InterpolationSegment>> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let chars: Vec<char> = raw_string.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '{' => {
                    if i + 1 < chars.len() && chars[i + 1] == '{' {
                        literal.push('{');
                        i += 2;
                    } else {
                        if !literal.is_empty() {
                            segments.push(InterpolationSegment::Literal(literal.clone()));
                            literal.clear();
                        }

                        i += 1;
                        let expr_start = i;
                        let mut brace_count = 1;

                        while i < chars.len() && brace_count > 0 {
                            match chars[i] {
                                '{' => brace_count += 1,
                                '}' => brace_count -= 1,
                                _ => {}
                            }
                            if brace_count > 0 {
                                i += 1;
                            }
                        }

                        if brace_count != 0 {
                            return Err(ScriptError::syntax(
                                "Unclosed brace in interpolated string",
                            ));
                        }

                        let expr_str = chars[expr_start..i].iter().collect::<String>();

                        if expr_str.trim().is_empty() {
                            return Err(ScriptError::syntax(
                                "Empty expression in interpolated string",
                            ));
                        }

                        let expr = parse_expr(&expr_str)?;
                        segments.push(InterpolationSegment::Expression(Box::new(expr)));

                        i += 1;
                    }
                }
                '}' => {
                    if i + 1 < chars.len() && chars[i + 1] == '}' {
                        literal.push('}');
                        i += 2;
                    } else {
                        return Err(ScriptError::syntax(
                            "Unmatched closing brace in interpolated string",
                        ));
                    }
                }
                ch => {
                    literal.push(ch);
                    i += 1;
                }
            }
        }

        if !literal.is_empty() {
            segments.push(InterpolationSegment::Literal(literal));
        }

        if segments.is_empty() {
            segments.push(InterpolationSegment::Literal(String::new()));
        }

        Ok(segments)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.current() {
            Some(Token::Number(n)) => {
                let value = *n;
                self.advance();
                Ok(Expr::Const(Value::Number(value)))
            }
            Some(Token::Boolean(b)) => {
                let value = *b;
                self.advance();
                Ok(Expr::Const(Value::Boolean(value)))
            }
            Some(Token::None) => {
                self.advance();
                Ok(Expr::Const(Value::None))
            }
            Some(Token::String(s)) => {
                let value = s.clone();
                self.advance();

                if !value.contains('{') && !value.contains('}') {
                    return Ok(Expr::Const(Value::String(value)));
                }

                let mut segments = Self::parse_string_content(&value)?;
                if segments.len() == 1 {
                    if let InterpolationSegment::Literal(lit) = &mut segments[0] {
                        return Ok(Expr::Const(Value::String(std::mem::take(lit))));
                    }
                }
                Ok(Expr::InterpolatedString(segments))
            }
            Some(Token::Identifier(name)) => {
                let mut name = name.clone();
                self.advance();

                while self.current() == Some(&Token::Dot) {
                    let Some(Token::Identifier(member)) = self.peek() else {
                        return Err(ScriptError::syntax("Expected name after '.'"));
                    };
                    name.push('.');
                    name.push_str(member);
                    self.advance();
                    self.advance();
                }

                if self.current() == Some(&Token::LeftParen) {
                    self.advance();
                    let args = self.parse_list_items(&Token::RightParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Load(name))
                }
            }
            Some(Token::LeftBracket) => {
                self.advance();
                let items = self.parse_list_items(&Token::RightBracket)?;
                Ok(Expr::List(items))
            }
            Some(Token::LeftParen) => {
                self.advance();
                let value = self.parse_or()?;
                self.expect(&Token::RightParen)?;
                Ok(value)
            }
            Some(token) => Err(ScriptError::syntax(format!("Unexpected token: {token:?}"))),
            None => Err(ScriptError::syntax("Unexpected end of expression")),
        }
    }
}

/// Parses a single expression, e.g. the value of a `SetVariable` command.
///
/// # Errors
///
/// Returns a syntax error if the expression is invalid.
pub fn parse_expr(expr: &str) -> Result<Expr> {
    if expr.trim().is_empty() {
        return Err(ScriptError::syntax("Empty expression"));
    }

    let mut lexer = Lexer::new(expr, VARIABLE_SIGIL);
    let tokens: Vec<Token> = lexer
        .tokenize()?
        .into_iter()
        .filter(|t| *t != Token::Newline)
        .collect();

    if tokens.is_empty() {
        return Err(ScriptError::syntax("Empty expression"));
    }

    let mut parser = Parser::new(tokens);
    parser.parse_expression()
}

/// Parses a script: a sequence of statements separated by newlines or `;`.
///
/// # Errors
///
/// Returns a syntax error if any statement is invalid.
pub fn parse_script(code: &str) -> Result<Script> {
    let mut lexer = Lexer::new(code, VARIABLE_SIGIL);
    let tokens = lexer.tokenize()?;
    let mut parser = Parser::new(tokens);
    parser.parse_statements(false)
}

/// Parses free text with `{expression}` placeholders, e.g. a `Log` message.
/// `{{` and `}}` produce literal braces.
///
/// # Errors
///
/// Returns a syntax error if a placeholder is empty, unclosed or invalid.
pub fn parse_template(text: &str) -> Result<Expr> {
    Parser::parse_string_content(text).map(Expr::InterpolatedString)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_keeps_plain_text() {
        let expr = parse_template("it's {1 + 1} o'clock").unwrap();
        let Expr::InterpolatedString(segments) = expr else {
            panic!("expected template");
        };
        assert_eq!(segments.len(), 3);
        assert!(parse_template("broken {").is_err());
    }

    #[test]
    fn test_dotted_call() {
        let expr = parse_expr("robot.move_to(1, 2, 3)").unwrap();
        match expr {
            Expr::Call(name, args) => {
                assert_eq!(name, "robot.move_to");
                assert_eq!(args.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_single_equals_in_expression_rejected() {
        let err = parse_expr("x = 1").unwrap_err();
        assert!(err.to_string().contains("=="));
    }

    #[test]
    fn test_index_chain() {
        let expr = parse_expr("grid[1][0]").unwrap();
        assert!(matches!(expr, Expr::Index(_, _)));
    }

    #[test]
    fn test_script_statements() {
        let script = parse_script("x = 1; y = 2\nz = x + y").unwrap();
        assert_eq!(script.len(), 3);
        assert!(matches!(&script[2], Stmt::Assign(name, _) if name == "z"));
    }

    #[test]
    fn test_else_on_next_line() {
        let script = parse_script("if a {\n  b = 1\n}\nelse {\n  b = 2\n}").unwrap();
        match &script[0] {
            Stmt::If { else_branch, .. } => assert_eq!(else_branch.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_else_if_chain() {
        let script = parse_script("if a { b = 1 } else if c { b = 2 } else { b = 3 }").unwrap();
        match &script[0] {
            Stmt::If { else_branch, .. } => {
                assert!(matches!(&else_branch[0], Stmt::If { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_block() {
        assert!(parse_script("while true { x = 1").is_err());
        assert!(parse_script("}").is_err());
    }

    #[test]
    fn test_empty_script_is_valid() {
        assert!(parse_script("  # nothing here\n").unwrap().is_empty());
    }
}

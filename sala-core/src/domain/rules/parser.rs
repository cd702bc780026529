// sala-core/src/domain/rules/parser.rs
//
// Lexer + recursive descent parser for rule conditions and expressions.
//
//   or      := and (OR and)*
//   and     := not (AND not)*
//   not     := NOT not | atom
//   atom    := TRUE | FALSE | '(' or ')' | arith (IS [NOT] NULL | cmp arith)
//   arith   := term (('+' | '-') term)*
//   term    := unary (('*' | '/') unary)*
//   unary   := '-' unary | primary
//   primary := number | string | NULL | TRUE | FALSE | ident '(' ident ')' | ident | '(' arith ')'

use crate::domain::dataset::Value;
use crate::domain::error::DomainError;
use crate::domain::rules::expr::{Aggregate, ArithOp, CmpOp, Expr, Predicate};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    Is,
    Null,
    True,
    False,
}

impl Token {
    fn continues_comparison(&self) -> bool {
        matches!(
            self,
            Token::Cmp(_) | Token::Is | Token::Plus | Token::Minus | Token::Star | Token::Slash
        )
    }
}

/// Parses a rule condition. Blank input is the always-true predicate.
pub fn parse_condition(input: &str) -> Result<Predicate, DomainError> {
    if input.trim().is_empty() {
        return Ok(Predicate::Const(true));
    }
    let mut parser = Parser::new(input)?;
    let predicate = parser.parse_or()?;
    parser.expect_end()?;
    Ok(predicate)
}

/// Parses a value expression (the right-hand side of a rule).
pub fn parse_expression(input: &str) -> Result<Expr, DomainError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse_arith()?;
    parser.expect_end()?;
    Ok(expr)
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, DomainError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let error = |position: usize, reason: &str| DomainError::ExpressionParse {
        input: input.to_string(),
        position,
        reason: reason.to_string(),
    };

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '(' => tokens.push((Token::LParen, start)),
            ')' => tokens.push((Token::RParen, start)),
            '+' => tokens.push((Token::Plus, start)),
            '-' => tokens.push((Token::Minus, start)),
            '*' => tokens.push((Token::Star, start)),
            '/' => tokens.push((Token::Slash, start)),
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 1;
                }
                tokens.push((Token::Cmp(CmpOp::Eq), start));
            }
            '!' => {
                if bytes.get(i + 1) != Some(&b'=') {
                    return Err(error(start, "expected '!='"));
                }
                i += 1;
                tokens.push((Token::Cmp(CmpOp::NotEq), start));
            }
            '<' => match bytes.get(i + 1) {
                Some(b'=') => {
                    i += 1;
                    tokens.push((Token::Cmp(CmpOp::LtEq), start));
                }
                Some(b'>') => {
                    i += 1;
                    tokens.push((Token::Cmp(CmpOp::NotEq), start));
                }
                _ => tokens.push((Token::Cmp(CmpOp::Lt), start)),
            },
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 1;
                    tokens.push((Token::Cmp(CmpOp::GtEq), start));
                } else {
                    tokens.push((Token::Cmp(CmpOp::Gt), start));
                }
            }
            '\'' | '"' => {
                let quote = bytes[i];
                let mut text = Vec::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(error(start, "unterminated string literal")),
                        Some(&b) if b == quote => {
                            if bytes.get(i + 1) == Some(&quote) {
                                text.push(quote);
                                i += 2;
                            } else {
                                break;
                            }
                        }
                        Some(&b) => {
                            text.push(b);
                            i += 1;
                        }
                    }
                }
                let text = String::from_utf8(text)
                    .map_err(|_| error(start, "string literal is not valid UTF-8"))?;
                tokens.push((Token::Str(text), start));
            }
            c if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let literal = &input[start..i];
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| error(start, "invalid number"))?;
                tokens.push((Token::Number(number), start));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &input[start..i];
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "is" => Token::Is,
                    "null" => Token::Null,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push((token, start));
                continue;
            }
            _ => return Err(error(start, &format!("unexpected character '{}'", c))),
        }
        i += 1;
    }
    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, DomainError> {
        Ok(Self {
            input,
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, reason: impl Into<String>) -> DomainError {
        let position = self
            .tokens
            .get(self.pos)
            .map_or(self.input.len(), |(_, p)| *p);
        DomainError::ExpressionParse {
            input: self.input.to_string(),
            position,
            reason: reason.into(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), DomainError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expect_end(&self) -> Result<(), DomainError> {
        if self.pos < self.tokens.len() {
            Err(self.error("unexpected trailing input"))
        } else {
            Ok(())
        }
    }

    fn parse_or(&mut self) -> Result<Predicate, DomainError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate, DomainError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Predicate, DomainError> {
        if self.eat(&Token::Not) {
            return Ok(Predicate::Not(Box::new(self.parse_not()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Predicate, DomainError> {
        match self.peek() {
            Some(Token::True | Token::False)
                if !self.peek_at(1).is_some_and(Token::continues_comparison) =>
            {
                let value = self.next() == Some(Token::True);
                return Ok(Predicate::Const(value));
            }
            Some(Token::LParen) => {
                // A parenthesis may open a nested predicate or an arithmetic group.
                let saved = self.pos;
                self.pos += 1;
                let grouped = self.parse_or().and_then(|p| {
                    self.expect(&Token::RParen, "')'")?;
                    Ok(p)
                });
                match grouped {
                    Ok(p) if !self.peek().is_some_and(Token::continues_comparison) => return Ok(p),
                    _ => self.pos = saved,
                }
            }
            _ => {}
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Predicate, DomainError> {
        let left = self.parse_arith()?;
        if self.eat(&Token::Is) {
            let negated = self.eat(&Token::Not);
            self.expect(&Token::Null, "NULL after IS")?;
            return Ok(Predicate::IsNull {
                expr: left,
                negated,
            });
        }
        match self.peek() {
            Some(Token::Cmp(op)) => {
                let op = *op;
                self.pos += 1;
                let right = self.parse_arith()?;
                Ok(Predicate::Compare { op, left, right })
            }
            _ => Err(self.error("expected a comparison operator or IS [NOT] NULL")),
        }
    }

    fn parse_arith(&mut self) -> Result<Expr, DomainError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, DomainError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, DomainError> {
        if self.eat(&Token::Minus) {
            // Fold negative literals so `-5` prints and re-parses identically.
            if let Some(Token::Number(n)) = self.peek() {
                let n = *n;
                self.pos += 1;
                return Ok(Expr::Literal(Value::number(-n)));
            }
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, DomainError> {
        let Some(token) = self.next() else {
            return Err(self.error("unexpected end of input"));
        };
        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Text(s))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Ident(name) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Field(name));
                }
                let func = Aggregate::from_name(&name).ok_or_else(|| {
                    self.pos -= 1;
                    self.error(format!("unknown function '{}'", name))
                })?;
                let field = match self.next() {
                    Some(Token::Ident(field)) => field,
                    _ => return Err(self.error("expected a column name")),
                };
                self.expect(&Token::RParen, "')'")?;
                Ok(Expr::Aggregate { func, field })
            }
            Token::LParen => {
                let inner = self.parse_arith()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            _ => {
                self.pos -= 1;
                Err(self.error("expected a value"))
            }
        }
    }
}

//! Lexer and precedence-climbing parser for script expressions.

use crate::types::{BinOp, Expr, Program, ScriptError, UnOp, Value};

/// Parses a script source string into a [`Program`].
pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let root = parser.expression(0)?;
    parser.expect_end()?;
    Ok(Program { root })
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    at: usize,
}

fn lex(source: &str) -> Result<Vec<Token>, ScriptError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let at = i;
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
            }
            b'(' => {
                tokens.push(Token { tok: Tok::LParen, at });
                i += 1;
            }
            b')' => {
                tokens.push(Token { tok: Tok::RParen, at });
                i += 1;
            }
            b'[' => {
                tokens.push(Token { tok: Tok::LBracket, at });
                i += 1;
            }
            b']' => {
                tokens.push(Token { tok: Tok::RBracket, at });
                i += 1;
            }
            b',' => {
                tokens.push(Token { tok: Tok::Comma, at });
                i += 1;
            }
            b'+' => {
                tokens.push(Token { tok: Tok::Plus, at });
                i += 1;
            }
            b'-' => {
                tokens.push(Token { tok: Tok::Minus, at });
                i += 1;
            }
            b'*' => {
                tokens.push(Token { tok: Tok::Star, at });
                i += 1;
            }
            b'/' => {
                tokens.push(Token { tok: Tok::Slash, at });
                i += 1;
            }
            b'%' => {
                tokens.push(Token { tok: Tok::Percent, at });
                i += 1;
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { tok: Tok::EqEq, at });
                    i += 2;
                } else {
                    return Err(ScriptError::parse(at, "expected '==' (assignment is not supported)"));
                }
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { tok: Tok::NotEq, at });
                    i += 2;
                } else {
                    tokens.push(Token { tok: Tok::Bang, at });
                    i += 1;
                }
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { tok: Tok::Le, at });
                    i += 2;
                } else {
                    tokens.push(Token { tok: Tok::Lt, at });
                    i += 1;
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { tok: Tok::Ge, at });
                    i += 2;
                } else {
                    tokens.push(Token { tok: Tok::Gt, at });
                    i += 1;
                }
            }
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token { tok: Tok::AndAnd, at });
                    i += 2;
                } else {
                    return Err(ScriptError::parse(at, "expected '&&'"));
                }
            }
            b'|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token { tok: Tok::OrOr, at });
                    i += 2;
                } else {
                    return Err(ScriptError::parse(at, "expected '||'"));
                }
            }
            b'\'' | b'"' => {
                let quote = b;
                let mut s = String::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(ScriptError::parse(at, "unterminated string literal")),
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') => {
                            let escaped = bytes.get(i + 1).ok_or_else(|| {
                                ScriptError::parse(i, "unterminated escape sequence")
                            })?;
                            s.push(match escaped {
                                b'n' => '\n',
                                b't' => '\t',
                                b'\\' => '\\',
                                b'\'' => '\'',
                                b'"' => '"',
                                other => *other as char,
                            });
                            i += 2;
                        }
                        Some(&c) if c < 0x80 => {
                            s.push(c as char);
                            i += 1;
                        }
                        Some(_) => {
                            // Multi-byte UTF-8 content passes through intact.
                            let ch = source[i..].chars().next().ok_or_else(|| {
                                ScriptError::parse(i, "invalid UTF-8 in string literal")
                            })?;
                            s.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push(Token { tok: Tok::Str(s), at });
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let mut is_float = false;
                if i < bytes.len()
                    && bytes[i] == b'.'
                    && bytes.get(i + 1).is_some_and(|c| c.is_ascii_digit())
                {
                    is_float = true;
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &source[start..i];
                let tok = if is_float {
                    Tok::Float(text.parse().map_err(|_| {
                        ScriptError::parse(start, format!("invalid number '{text}'"))
                    })?)
                } else {
                    Tok::Int(text.parse().map_err(|_| {
                        ScriptError::parse(start, format!("invalid number '{text}'"))
                    })?)
                };
                tokens.push(Token { tok, at: start });
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Ident(source[start..i].to_string()),
                    at: start,
                });
            }
            other => {
                return Err(ScriptError::parse(
                    at,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn at(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.at)
            .unwrap_or(0)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|t| t.tok.clone());
        self.pos += 1;
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ScriptError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(ScriptError::parse(self.at(), format!("expected {what}")))
        }
    }

    fn expect_end(&self) -> Result<(), ScriptError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(ScriptError::parse(self.at(), "unexpected trailing input"))
        }
    }

    /// Binding power of an infix operator, or `None` if the token is not one.
    fn infix_power(tok: &Tok) -> Option<(u8, BinOp)> {
        Some(match tok {
            Tok::OrOr => (1, BinOp::Or),
            Tok::AndAnd => (2, BinOp::And),
            Tok::EqEq => (3, BinOp::Eq),
            Tok::NotEq => (3, BinOp::Ne),
            Tok::Lt => (4, BinOp::Lt),
            Tok::Le => (4, BinOp::Le),
            Tok::Gt => (4, BinOp::Gt),
            Tok::Ge => (4, BinOp::Ge),
            Tok::Plus => (5, BinOp::Add),
            Tok::Minus => (5, BinOp::Sub),
            Tok::Star => (6, BinOp::Mul),
            Tok::Slash => (6, BinOp::Div),
            Tok::Percent => (6, BinOp::Rem),
            _ => return None,
        })
    }

    fn expression(&mut self, min_power: u8) -> Result<Expr, ScriptError> {
        let mut lhs = self.unary()?;

        while let Some(tok) = self.peek() {
            let Some((power, op)) = Self::infix_power(tok) else {
                break;
            };
            if power < min_power {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(power + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Unary(UnOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat(&Tok::Bang) {
            return Ok(Expr::Unary(UnOp::Not, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        while self.eat(&Tok::LBracket) {
            let index = self.expression(0)?;
            self.expect(Tok::RBracket, "']'")?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let at = self.at();
        match self.bump() {
            Some(Tok::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Tok::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ => {
                    if self.eat(&Tok::LParen) {
                        let mut args = Vec::new();
                        if !self.eat(&Tok::RParen) {
                            loop {
                                args.push(self.expression(0)?);
                                if self.eat(&Tok::Comma) {
                                    continue;
                                }
                                self.expect(Tok::RParen, "')'")?;
                                break;
                            }
                        }
                        Ok(Expr::Call(name, args))
                    } else {
                        Ok(Expr::Ident(name))
                    }
                }
            },
            Some(Tok::LParen) => {
                let expr = self.expression(0)?;
                self.expect(Tok::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(ScriptError::parse(at, "expected an expression")),
        }
    }
}

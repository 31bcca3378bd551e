//! The restricted approval-gate condition evaluator per §9.
//!
//! Conditions are expression strings such as `annual_revenue > 1000000`
//! evaluated over a submission's field map. This is deliberately NOT a
//! general expression interpreter: it supports numeric comparison,
//! equality, boolean composition (`&&`, `||`, `!`), and dotted field
//! access into the submission's own fields — nothing else. Any identifier
//! that does not resolve to a submission field is a [`ConditionError`],
//! not a silent `false`.

use serde_json::Value;
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("unexpected character {0:?} in condition")]
    UnexpectedChar(char),
    #[error("unexpected end of condition")]
    UnexpectedEnd,
    #[error("expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: String },
    #[error("field {0:?} is not present on this submission")]
    UnknownField(String),
    #[error("cannot compare non-numeric field {0:?} with {1}")]
    NotNumeric(String, String),
    #[error("trailing input after condition: {0:?}")]
    TrailingInput(String),
}

/// Evaluate `condition` against `fields`. Returns `Ok(true)` if the gate
/// matches and submit should route to `needs_review`.
pub fn evaluate(condition: &str, fields: &HashMap<String, Value>) -> Result<bool, ConditionError> {
    let tokens = tokenize(condition)?;
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
    };
    let ast = parser.parse_or()?;
    if let Some(remaining) = parser.tokens.next() {
        return Err(ConditionError::TrailingInput(format!("{remaining:?}")));
    }
    ast.eval(fields)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
    Not,
    And,
    Or,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let mut chars: Peekable<Chars> = input.chars().peekable();
    let mut tokens = Vec::new();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op("!="));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op("=="));
                } else {
                    return Err(ConditionError::UnexpectedChar('='));
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(">="));
                } else {
                    tokens.push(Token::Op(">"));
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op("<="));
                } else {
                    tokens.push(Token::Op("<"));
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::And);
                } else {
                    return Err(ConditionError::UnexpectedChar('&'));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::Or);
                } else {
                    return Err(ConditionError::UnexpectedChar('|'));
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err(ConditionError::UnexpectedEnd),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut s = String::new();
                s.push(c);
                chars.next();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = s
                    .parse::<f64>()
                    .map_err(|_| ConditionError::Expected {
                        expected: "number",
                        found: s.clone(),
                    })?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match s.as_str() {
                    "true" => tokens.push(Token::Number(1.0)),
                    "false" => tokens.push(Token::Number(0.0)),
                    _ => tokens.push(Token::Ident(s)),
                }
            }
            other => return Err(ConditionError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

#[derive(Debug)]
enum Expr {
    Field(String),
    Number(f64),
    Str(String),
    Compare(Box<Expr>, &'static str, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

enum Resolved {
    Number(f64),
    Str(String),
    Bool(bool),
}

impl Expr {
    fn eval(&self, fields: &HashMap<String, Value>) -> Result<bool, ConditionError> {
        match self {
            Expr::And(a, b) => Ok(a.eval(fields)? && b.eval(fields)?),
            Expr::Or(a, b) => Ok(a.eval(fields)? || b.eval(fields)?),
            Expr::Not(a) => Ok(!a.eval(fields)?),
            Expr::Compare(a, op, b) => {
                let lhs = resolve(a, fields)?;
                let rhs = resolve(b, fields)?;
                compare(&lhs, op, &rhs)
            }
            // A bare field/number/string used as a full condition is truthy
            // comparison against a nonzero/non-empty value.
            Expr::Field(_) | Expr::Number(_) | Expr::Str(_) => match resolve(self, fields)? {
                Resolved::Number(n) => Ok(n != 0.0),
                Resolved::Bool(b) => Ok(b),
                Resolved::Str(s) => Ok(!s.is_empty()),
            },
        }
    }
}

fn resolve(expr: &Expr, fields: &HashMap<String, Value>) -> Result<Resolved, ConditionError> {
    match expr {
        Expr::Number(n) => Ok(Resolved::Number(*n)),
        Expr::Str(s) => Ok(Resolved::Str(s.clone())),
        Expr::Field(path) => {
            let value = lookup(fields, path).ok_or_else(|| ConditionError::UnknownField(path.clone()))?;
            match value {
                Value::Number(n) => Ok(Resolved::Number(n.as_f64().unwrap_or(0.0))),
                Value::Bool(b) => Ok(Resolved::Bool(*b)),
                Value::String(s) => Ok(Resolved::Str(s.clone())),
                other => Err(ConditionError::NotNumeric(path.clone(), format!("{other:?}"))),
            }
        }
        other => Err(ConditionError::Expected {
            expected: "value",
            found: format!("{other:?}"),
        }),
    }
}

fn lookup<'a>(fields: &'a HashMap<String, Value>, dot_path: &str) -> Option<&'a Value> {
    let mut segments = dot_path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn compare(lhs: &Resolved, op: &str, rhs: &Resolved) -> Result<bool, ConditionError> {
    match (lhs, rhs) {
        (Resolved::Number(a), Resolved::Number(b)) => Ok(match op {
            ">" => a > b,
            ">=" => a >= b,
            "<" => a < b,
            "<=" => a <= b,
            "==" => a == b,
            "!=" => a != b,
            _ => unreachable!("tokenizer only emits known comparison operators"),
        }),
        (Resolved::Str(a), Resolved::Str(b)) => Ok(match op {
            "==" => a == b,
            "!=" => a != b,
            _ => return Err(ConditionError::NotNumeric(a.clone(), op.to_string())),
        }),
        (Resolved::Bool(a), Resolved::Bool(b)) => Ok(match op {
            "==" => a == b,
            "!=" => a != b,
            _ => return Err(ConditionError::NotNumeric(a.to_string(), op.to_string())),
        }),
        _ => Err(ConditionError::NotNumeric("<mixed types>".to_string(), op.to_string())),
    }
}

struct Parser<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.tokens.peek(), Some(Token::Or)) {
            self.tokens.next();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.tokens.peek(), Some(Token::And)) {
            self.tokens.next();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        if matches!(self.tokens.peek(), Some(Token::Not)) {
            self.tokens.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let lhs = self.parse_atom()?;
        if let Some(Token::Op(op)) = self.tokens.peek().cloned() {
            self.tokens.next();
            let rhs = self.parse_atom()?;
            return Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Expr, ConditionError> {
        match self.tokens.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.tokens.next() {
                    Some(Token::RParen) => Ok(inner),
                    other => Err(ConditionError::Expected {
                        expected: ")",
                        found: format!("{other:?}"),
                    }),
                }
            }
            Some(Token::Ident(name)) => Ok(Expr::Field(name)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(other) => Err(ConditionError::Expected {
                expected: "value",
                found: format!("{other:?}"),
            }),
            None => Err(ConditionError::UnexpectedEnd),
        }
    }
}

//! Parametric question templates
//!
//! Templates declare integer variables and embed `{{ expr }}` placeholders in
//! their text and options. Expressions are evaluated by a small arithmetic
//! parser over numbers, variable names, `+ - * /` and parentheses. Nothing
//! else is accepted.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Variable value type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    #[default]
    Integer,
}

/// Range for one template variable (inclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    #[serde(rename = "type", default)]
    pub kind: VariableKind,
    pub min: i64,
    pub max: i64,
}

pub type Bindings = HashMap<String, f64>;

/// Draw a value for each variable
pub fn sample_variables<R: Rng>(
    definitions: &BTreeMap<String, VariableDefinition>,
    rng: &mut R,
) -> Bindings {
    definitions
        .iter()
        .map(|(name, def)| {
            let (lo, hi) = if def.min <= def.max {
                (def.min, def.max)
            } else {
                (def.max, def.min)
            };
            let value = match def.kind {
                VariableKind::Integer => rng.gen_range(lo..=hi),
            };
            (name.clone(), value as f64)
        })
        .collect()
}

/// Replace every `{{ expr }}` in `text` with its value.
///
/// Placeholders that fail to evaluate are left as written.
pub fn render(text: &str, bindings: &Bindings) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let expression = &after_open[..end];
        match evaluate(expression, bindings) {
            Ok(value) => out.push_str(&format_number(value)),
            Err(e) => {
                warn!(expression, error = %e, "Template expression skipped");
                out.push_str("{{");
                out.push_str(expression);
                out.push_str("}}");
            }
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Format like a script number: integers without a fractional part
fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Avoid "-0"
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

/// Evaluate an arithmetic expression against `bindings`
pub fn evaluate(expression: &str, bindings: &Bindings) -> Result<f64, TemplateError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        bindings,
    };
    let value = parser.expr()?;
    if parser.pos != tokens.len() {
        return Err(TemplateError::TrailingInput);
    }
    if !value.is_finite() {
        return Err(TemplateError::NotFinite);
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| TemplateError::BadNumber(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(TemplateError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

/// Recursive descent over
/// `expr := term (('+' | '-') term)*`,
/// `term := factor (('*' | '/') factor)*`,
/// `factor := ('+' | '-') factor | number | ident | '(' expr ')'`
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    bindings: &'a Bindings,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<f64, TemplateError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, TemplateError> {
        let mut value = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(TemplateError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, TemplateError> {
        match self.next().cloned() {
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::Plus) => self.factor(),
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(name)) => self
                .bindings
                .get(&name)
                .copied()
                .ok_or(TemplateError::UnknownVariable(name)),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(TemplateError::UnclosedParen),
                }
            }
            Some(token) => Err(TemplateError::UnexpectedToken(format!("{:?}", token))),
            None => Err(TemplateError::UnexpectedEnd),
        }
    }
}

/// Template evaluation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("Invalid number literal '{0}'")]
    BadNumber(String),

    #[error("Unexpected token {0}")]
    UnexpectedToken(String),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Missing closing parenthesis")]
    UnclosedParen,

    #[error("Unexpected input after expression")]
    TrailingInput,

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Result is not a finite number")]
    NotFinite,
}

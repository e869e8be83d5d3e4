//! Unit string parsing.
//!
//! Accepted syntax, with `*`/`/` and juxtaposition binding left to right:
//!
//! ```text
//! expr    = power (op? power)*
//! op      = '*' | '·' | '/' | 'per'
//! power   = atom (('^' | '**') exponent)?
//! atom    = symbol digits? | '1' | '(' expr ')'
//! exponent = ['+' | '-'] digits | '(' ['+' | '-'] digits ')'
//! ```
//!
//! Digits directly attached to a symbol are an exponent (`nm2` is `nm^2`).
//! Symbols are resolved through the registry and stored under their canonical
//! name, so `1/sec`, `s^-1` and `per second` parse to the same terms.

use super::registry::REGISTRY;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty unit string")]
    Empty,
    #[error("unknown unit: '{0}'")]
    UnknownUnit(String),
    #[error("invalid exponent in '{0}'")]
    InvalidExponent(String),
    #[error("unexpected character '{0}' in unit string")]
    UnexpectedChar(char),
    #[error("numeric factor {0} is not allowed in a unit")]
    NumericFactor(i64),
    #[error("unit string '{0}' is incomplete")]
    Incomplete(String),
    #[error("unbalanced parentheses in '{0}'")]
    Unbalanced(String),
}

/// Canonical symbol to exponent. Zero exponents are never stored.
pub type Terms = BTreeMap<String, i32>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Symbol(String),
    Int(i64),
    Mul,
    Div,
    Pow,
    Minus,
    Plus,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if is_symbol_char(c) {
            let mut symbol = String::new();
            while let Some(&c) = chars.peek() {
                if !is_symbol_char(c) {
                    break;
                }
                symbol.push(c);
                chars.next();
            }
            if symbol == "per" {
                tokens.push(Token::Div);
                continue;
            }
            tokens.push(Token::Symbol(symbol));
            // Attached digits form an implicit exponent
            if chars.peek().is_some_and(char::is_ascii_digit) {
                tokens.push(Token::Pow);
            }
        } else if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(&c) = chars.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                digits.push(c);
                chars.next();
            }
            let value = digits
                .parse()
                .map_err(|_| ParseError::InvalidExponent(digits.clone()))?;
            tokens.push(Token::Int(value));
        } else {
            chars.next();
            let token = match c {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    Token::Pow
                }
                '*' | '\u{00B7}' => Token::Mul,
                '/' => Token::Div,
                '^' => Token::Pow,
                '-' => Token::Minus,
                '+' => Token::Plus,
                '(' => Token::Open,
                ')' => Token::Close,
                other => return Err(ParseError::UnexpectedChar(other)),
            };
            tokens.push(token);
        }
    }
    Ok(tokens)
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Terms, ParseError> {
        let mut result = self.power()?;
        loop {
            let divide = match self.peek() {
                Some(Token::Mul) => {
                    self.pos += 1;
                    false
                }
                Some(Token::Div) => {
                    self.pos += 1;
                    true
                }
                Some(Token::Symbol(_)) | Some(Token::Open) => false,
                _ => break,
            };
            let rhs = self.power()?;
            combine(&mut result, &rhs, if divide { -1 } else { 1 })
                .ok_or_else(|| ParseError::InvalidExponent(self.input.to_string()))?;
        }
        Ok(result)
    }

    fn power(&mut self) -> Result<Terms, ParseError> {
        let base = self.atom()?;
        if self.peek() != Some(&Token::Pow) {
            return Ok(base);
        }
        self.pos += 1;
        let exp = self.exponent()?;
        base.into_iter()
            .filter(|_| exp != 0)
            .map(|(symbol, e)| {
                e.checked_mul(exp)
                    .map(|e| (symbol, e))
                    .ok_or_else(|| ParseError::InvalidExponent(self.input.to_string()))
            })
            .collect()
    }

    fn exponent(&mut self) -> Result<i32, ParseError> {
        let bracketed = self.peek() == Some(&Token::Open);
        if bracketed {
            self.pos += 1;
        }
        let sign = match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                -1
            }
            Some(Token::Plus) => {
                self.pos += 1;
                1
            }
            _ => 1,
        };
        let value = match self.next() {
            Some(Token::Int(v)) => i32::try_from(v)
                .map_err(|_| ParseError::InvalidExponent(self.input.to_string()))?,
            _ => return Err(ParseError::InvalidExponent(self.input.to_string())),
        };
        if bracketed && self.next() != Some(Token::Close) {
            return Err(ParseError::Unbalanced(self.input.to_string()));
        }
        Ok(sign * value)
    }

    fn atom(&mut self) -> Result<Terms, ParseError> {
        match self.next() {
            Some(Token::Symbol(symbol)) => {
                let def = REGISTRY
                    .lookup(&symbol)
                    .ok_or(ParseError::UnknownUnit(symbol))?;
                let mut terms = Terms::new();
                if def.symbol != "1" {
                    terms.insert(def.symbol, 1);
                }
                Ok(terms)
            }
            Some(Token::Int(1)) => Ok(Terms::new()),
            Some(Token::Int(n)) => Err(ParseError::NumericFactor(n)),
            Some(Token::Open) => {
                let inner = self.expr()?;
                if self.next() != Some(Token::Close) {
                    return Err(ParseError::Unbalanced(self.input.to_string()));
                }
                Ok(inner)
            }
            _ => Err(ParseError::Incomplete(self.input.to_string())),
        }
    }
}

/// Adds `sign * rhs` exponents into `lhs`, dropping cancelled symbols.
/// `None` on exponent overflow, leaving `lhs` partly combined.
pub(crate) fn combine(lhs: &mut Terms, rhs: &Terms, sign: i32) -> Option<()> {
    for (symbol, exp) in rhs {
        let entry = lhs.entry(symbol.clone()).or_insert(0);
        *entry = entry.checked_add(sign.checked_mul(*exp)?)?;
        if *entry == 0 {
            lhs.remove(symbol);
        }
    }
    Some(())
}

/// Parses a unit string into canonical terms.
pub fn parse_terms(input: &str) -> Result<Terms, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        input: trimmed,
        tokens: tokenize(trimmed)?,
        pos: 0,
    };
    let terms = parser.expr()?;
    match parser.peek() {
        None => Ok(terms),
        Some(Token::Close) => Err(ParseError::Unbalanced(trimmed.to_string())),
        Some(_) => Err(ParseError::Incomplete(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(pairs: &[(&str, i32)]) -> Terms {
        pairs.iter().map(|(s, e)| (s.to_string(), *e)).collect()
    }

    #[test]
    fn equivalent_spellings() {
        let expected = terms(&[("nm", 2), ("s", -1)]);
        for input in ["nm^2/s", "nm**2/s", "nm2/s", "nm^2 s^-1", "nm^2 per second", "nanometer^2/sec"] {
            assert_eq!(parse_terms(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn reciprocal_forms() {
        let expected = terms(&[("M", -1), ("s", -1)]);
        assert_eq!(parse_terms("1/M/s").unwrap(), expected);
        assert_eq!(parse_terms("1/(M s)").unwrap(), expected);
        assert_eq!(parse_terms("M^-1 s^-1").unwrap(), expected);
        assert_eq!(parse_terms("M^(-1)*s^(-1)").unwrap(), expected);
    }

    #[test]
    fn left_to_right_division() {
        // a / b c means (a / b) c
        assert_eq!(parse_terms("mol/L s").unwrap(), terms(&[("L", -1), ("mol", 1), ("s", 1)]));
    }

    #[test]
    fn dimensionless_forms() {
        assert!(parse_terms("1").unwrap().is_empty());
        assert!(parse_terms("dimensionless").unwrap().is_empty());
        assert!(parse_terms("count").unwrap().is_empty());
        assert!(parse_terms("s/s").unwrap().is_empty());
    }

    #[test]
    fn errors() {
        assert_eq!(parse_terms("  "), Err(ParseError::Empty));
        assert_eq!(parse_terms("parsec"), Err(ParseError::UnknownUnit("parsec".into())));
        assert_eq!(parse_terms("2/s"), Err(ParseError::NumericFactor(2)));
        assert!(matches!(parse_terms("(nm/s"), Err(ParseError::Unbalanced(_))));
        assert!(matches!(parse_terms("nm/"), Err(ParseError::Incomplete(_))));
        assert!(matches!(parse_terms("nm^"), Err(ParseError::InvalidExponent(_))));
        assert_eq!(parse_terms("nm$"), Err(ParseError::UnexpectedChar('$')));
    }

    #[test]
    fn exponent_overflow() {
        assert!(matches!(
            parse_terms("(nm^99999)^99999"),
            Err(ParseError::InvalidExponent(_))
        ));
        assert!(matches!(
            parse_terms("nm^2147483647 nm"),
            Err(ParseError::InvalidExponent(_))
        ));
        assert!(matches!(
            parse_terms("nm^99999999999"),
            Err(ParseError::InvalidExponent(_))
        ));
        assert_eq!(parse_terms("(nm^3)^0 s").unwrap(), terms(&[("s", 1)]));
    }
}

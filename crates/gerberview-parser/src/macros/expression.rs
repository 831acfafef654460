//! Macro aperture arithmetic.
//!
//! Expressions are a flat list of terms joined by `+`, `-`, `x`/`X` and
//! `/`, folded strictly left to right. A term is a signed number or a
//! modifier reference `$n`. Parsing happens once per macro definition;
//! the resulting [`Expression`] is evaluated against each aperture's
//! modifier bindings.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ParseError;

/// Modifier bindings keyed by variable number (`$1` is key `1`).
pub type Modifiers = HashMap<u32, f64>;

/// Builds bindings from positional aperture parameters.
pub fn modifiers_from_params(params: &[f64]) -> Modifiers {
    (1u32..).zip(params.iter().copied()).collect()
}

/// Binary operator between two terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    /// Addition.
    #[serde(rename = "+")]
    Add,
    /// Subtraction.
    #[serde(rename = "-")]
    Subtract,
    /// Multiplication (`x` or `X`).
    #[serde(rename = "x")]
    Multiply,
    /// Division.
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    const fn from_char(ch: char) -> Option<Self> {
        match ch {
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            'x' | 'X' => Some(Self::Multiply),
            '/' => Some(Self::Divide),
            _ => None,
        }
    }

    fn fold(self, left: f64, right: f64) -> f64 {
        match self {
            Self::Add => left + right,
            Self::Subtract => left - right,
            Self::Multiply => left * right,
            Self::Divide => left / right,
        }
    }
}

/// A single operand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Term {
    /// Literal number, sign included.
    Number(f64),
    /// Modifier reference, optionally negated.
    Variable {
        /// Variable number.
        index: u32,
        /// Whether a unary minus preceded the reference.
        negated: bool,
    },
}

impl Term {
    fn value(self, modifiers: &Modifiers) -> Result<f64, ParseError> {
        match self {
            Self::Number(value) => Ok(value),
            Self::Variable { index, negated } => {
                let value = modifiers
                    .get(&index)
                    .copied()
                    .ok_or(ParseError::UnboundVariable(index))?;
                Ok(if negated { -value } else { value })
            }
        }
    }
}

/// A parsed, reusable macro expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    first: Term,
    rest: Vec<(Operator, Term)>,
}

impl Expression {
    /// Evaluates the expression against the given bindings.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnboundVariable`] when a referenced modifier
    /// has no binding.
    pub fn evaluate(&self, modifiers: &Modifiers) -> Result<f64, ParseError> {
        self.rest
            .iter()
            .try_fold(self.first.value(modifiers)?, |acc, (op, term)| {
                Ok(op.fold(acc, term.value(modifiers)?))
            })
    }
}

/// Parses macro arithmetic such as `$1x2+0.5`.
///
/// # Errors
///
/// Returns [`ParseError::MalformedExpression`] for anything outside the
/// grammar: stray characters, dangling operators, bad numbers.
pub fn parse_expression(text: &str) -> Result<Expression, ParseError> {
    let mut chars = text.chars().filter(|ch| !ch.is_whitespace()).peekable();

    let first = parse_term(text, &mut chars)?;
    let mut rest = Vec::new();

    while let Some(ch) = chars.next() {
        let op = Operator::from_char(ch)
            .ok_or_else(|| ParseError::malformed(text, format!("unexpected `{ch}`")))?;
        rest.push((op, parse_term(text, &mut chars)?));
    }

    Ok(Expression { first, rest })
}

fn parse_term<I>(text: &str, chars: &mut std::iter::Peekable<I>) -> Result<Term, ParseError>
where
    I: Iterator<Item = char>,
{
    let mut negated = false;
    while let Some(&sign) = chars.peek() {
        match sign {
            '-' => negated = !negated,
            '+' => {}
            _ => break,
        }
        chars.next();
    }

    match chars.next() {
        Some('$') => {
            let digits = take_while(chars, |ch| ch.is_ascii_digit());
            let index = digits
                .parse::<u32>()
                .map_err(|_| ParseError::malformed(text, "expected variable number after `$`"))?;
            Ok(Term::Variable { index, negated })
        }
        Some(ch) if ch.is_ascii_digit() || ch == '.' => {
            let mut literal = String::from(ch);
            literal.push_str(&take_while(chars, |ch| ch.is_ascii_digit() || ch == '.'));
            let value = literal
                .parse::<f64>()
                .map_err(|_| ParseError::malformed(text, format!("invalid number `{literal}`")))?;
            Ok(Term::Number(if negated { -value } else { value }))
        }
        Some(ch) => Err(ParseError::malformed(
            text,
            format!("expected number or variable, found `{ch}`"),
        )),
        None => Err(ParseError::malformed(text, "unexpected end of expression")),
    }
}

fn take_while<I>(chars: &mut std::iter::Peekable<I>, keep: impl Fn(char) -> bool) -> String
where
    I: Iterator<Item = char>,
{
    let mut taken = String::new();
    while let Some(ch) = chars.next_if(|&ch| keep(ch)) {
        taken.push(ch);
    }
    taken
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn eval(text: &str, params: &[f64]) -> Result<f64, ParseError> {
        parse_expression(text)?.evaluate(&modifiers_from_params(params))
    }

    fn close(actual: Result<f64, ParseError>, expected: f64) -> bool {
        actual.is_ok_and(|value| (value - expected).abs() < EPSILON)
    }

    #[test]
    fn ut_expr_001_literals_and_variables() {
        assert!(close(eval("0.5", &[]), 0.5));
        assert!(close(eval("-0.5", &[]), -0.5));
        assert!(close(eval("$2", &[1.0, 7.0]), 7.0));
        assert!(close(eval("-$1", &[3.0]), -3.0));
    }

    #[test]
    fn ut_expr_002_folds_left_to_right_without_precedence() {
        assert!(close(eval("1+2x3", &[]), 9.0));
        assert!(close(eval("2X3-1", &[]), 5.0));
        assert!(close(eval("$1+$2/2", &[2.0, 4.0]), 3.0));
        assert!(close(eval("$1x-2", &[1.5]), -3.0));
    }

    #[test]
    fn ut_expr_003_reusable_across_bindings() {
        let parsed = parse_expression("$2+1");
        assert!(parsed.is_ok());
        if let Ok(expression) = parsed {
            assert!(close(expression.evaluate(&modifiers_from_params(&[0.0, 1.0])), 2.0));
            assert!(close(expression.evaluate(&modifiers_from_params(&[0.0, 4.0])), 5.0));
        }
    }

    #[test]
    fn ut_expr_004_whitespace_is_ignored() {
        assert!(close(eval(" $1 x 2 ", &[0.25]), 0.5));
    }

    #[test]
    fn bc_expr_001_unbound_variable_is_fatal() {
        assert_eq!(eval("$3+1", &[1.0]), Err(ParseError::UnboundVariable(3)));
    }

    #[test]
    fn bc_expr_002_malformed_text_is_rejected() {
        for text in ["", "1+", "$", "2**3", "1..2", "(1)", "$1 y"] {
            assert!(
                matches!(
                    parse_expression(text),
                    Err(ParseError::MalformedExpression { .. })
                ),
                "expected `{text}` to be rejected"
            );
        }
    }
}

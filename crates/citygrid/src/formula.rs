//! Arithmetic formulas over named row fields.
//!
//! Formulas support `+ - * /`, parentheses, unary sign, numeric literals
//! and field identifiers. They are parsed once into an [`Expr`] tree and
//! evaluated per row with the zero-clamping and safe-division rules in
//! [`eval`]. Evaluation never fails: problems are reported as
//! [`Diagnostic`]s and the value degrades to 0.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::{Evaluation, FieldLookup};
pub use parser::parse_expr;

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    /// Field reference, resolved against the row at evaluation time
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Fully parenthesized infix form
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Negate(inner) => write!(f, "-{}", inner),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("empty formula")]
    Empty,

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid number '{text}' at {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("unexpected '{token}' at {pos}")]
    UnexpectedToken { token: String, pos: usize },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("unclosed '(' at {pos}")]
    UnclosedParen { pos: usize },

    #[error("unmatched ')' at {pos}")]
    UnmatchedParen { pos: usize },
}

/// Recoverable evaluation problem. The affected value is 0.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    UnresolvedField {
        formula: String,
        field: String,
    },
    DivisionByZero {
        formula: String,
        divisor: String,
    },
    NonFinite {
        formula: String,
    },
    Malformed {
        formula: String,
        substituted: String,
        error: FormulaError,
    },
}

impl Diagnostic {
    pub fn formula(&self) -> &str {
        match self {
            Diagnostic::UnresolvedField { formula, .. }
            | Diagnostic::DivisionByZero { formula, .. }
            | Diagnostic::NonFinite { formula }
            | Diagnostic::Malformed { formula, .. } => formula,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedField { formula, field } => {
                write!(f, "field '{}' not found in '{}', using 0", field, formula)
            }
            Diagnostic::DivisionByZero { formula, divisor } => {
                write!(f, "division by zero ({}) in '{}', using 0", divisor, formula)
            }
            Diagnostic::NonFinite { formula } => {
                write!(f, "non-finite result for '{}', using 0", formula)
            }
            Diagnostic::Malformed {
                formula,
                substituted,
                error,
            } => write!(
                f,
                "cannot evaluate '{}' (substituted: '{}'): {}",
                formula, substituted, error
            ),
        }
    }
}

/// A formula parsed once and evaluated against many rows.
///
/// A formula that fails to parse is kept; every evaluation of it
/// yields 0 with a [`Diagnostic::Malformed`].
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    parsed: Result<Expr, FormulaError>,
}

impl Formula {
    pub fn parse(source: &str) -> Self {
        Self {
            source: source.to_string(),
            parsed: parse_expr(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> Result<&Expr, &FormulaError> {
        self.parsed.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_ok()
    }

    pub fn evaluate<R: FieldLookup + ?Sized>(&self, row: &R) -> Evaluation {
        match &self.parsed {
            Ok(expr) => eval::evaluate_expr(&self.source, expr, row),
            Err(error) => Evaluation {
                value: 0.0,
                diagnostics: vec![Diagnostic::Malformed {
                    formula: self.source.clone(),
                    substituted: substitute(&self.source, row),
                    error: error.clone(),
                }],
            },
        }
    }
}

/// Parses and evaluates `formula` against `row` in one step
pub fn evaluate<R: FieldLookup + ?Sized>(formula: &str, row: &R) -> Evaluation {
    Formula::parse(formula).evaluate(row)
}

/// Replaces every identifier in `formula` by the value it resolves to.
///
/// Works on malformed input too; everything that is not an identifier
/// is copied verbatim.
pub fn substitute<R: FieldLookup + ?Sized>(formula: &str, row: &R) -> String {
    let mut out = String::with_capacity(formula.len());
    let mut pos = 0;

    while let Some(ch) = formula[pos..].chars().next() {
        let end = if lexer::starts_number(formula, pos) {
            let end = lexer::number_end(formula, pos);
            out.push_str(&formula[pos..end]);
            end
        } else if lexer::is_ident_start(ch) {
            let end = lexer::ident_end(formula, pos);
            let value = eval::resolve(row, &formula[pos..end]).unwrap_or(0.0);
            out.push_str(&value.to_string());
            end
        } else {
            out.push(ch);
            pos + ch.len_utf8()
        };
        pos = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(values: &[(&str, f64)]) -> HashMap<String, f64> {
        values.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_safe_division() {
        let result = evaluate("A/B", &row(&[("A", 10.0), ("B", 0.0)]));
        assert_eq!(result.value, 0.0);
        assert!(matches!(
            result.diagnostics.as_slice(),
            [Diagnostic::DivisionByZero { .. }]
        ));
    }

    #[test]
    fn test_missing_field_is_zero() {
        let result = evaluate("A+B", &row(&[("A", 5.0)]));
        assert_eq!(result.value, 5.0);
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::UnresolvedField {
                formula: "A+B".to_string(),
                field: "B".to_string(),
            }]
        );
    }

    #[test]
    fn test_grouping() {
        let result = evaluate("(A+B)/C", &row(&[("A", 1.0), ("B", 1.0), ("C", 2.0)]));
        assert_eq!(result.value, 1.0);
        assert!(result.is_clean());
    }

    #[test]
    fn test_sub_tolerance_operand_is_clamped() {
        let result = evaluate("A*B", &row(&[("A", 1e-12), ("B", 5.0)]));
        assert_eq!(result.value, 0.0);
        assert!(result.is_clean());
    }

    #[test]
    fn test_malformed_formula_reports_substitution() {
        let result = evaluate("(A + B", &row(&[("A", 2.0), ("B", 3.5)]));
        assert_eq!(result.value, 0.0);
        match result.diagnostics.as_slice() {
            [Diagnostic::Malformed {
                formula,
                substituted,
                error,
            }] => {
                assert_eq!(formula, "(A + B");
                assert_eq!(substituted, "(2 + 3.5");
                assert_eq!(*error, FormulaError::UnclosedParen { pos: 0 });
            }
            other => panic!("unexpected diagnostics: {other:?}"),
        }
    }

    #[test]
    fn test_substitute_keeps_literals_and_unknown_text() {
        let values = row(&[("Pop", 120.0)]);
        assert_eq!(substitute("Pop % 1e3 + Missing", &values), "120 % 1e3 + 0");
    }

    #[test]
    fn test_parsed_formula_is_reusable() {
        let formula = Formula::parse("Households / Population");
        assert!(formula.is_valid());

        let a = formula.evaluate(&row(&[("Households", 50.0), ("Population", 200.0)]));
        let b = formula.evaluate(&row(&[("Households", 30.0), ("Population", 60.0)]));
        assert_eq!(a.value, 0.25);
        assert_eq!(b.value, 0.5);
    }

    #[test]
    fn test_expr_display() {
        let formula = Formula::parse("A - B / -2");
        assert_eq!(formula.expr().unwrap().to_string(), "(A - (B / -2))");
    }

    #[test]
    fn test_diagnostic_messages() {
        let diag = Diagnostic::UnresolvedField {
            formula: "A+B".to_string(),
            field: "B".to_string(),
        };
        assert_eq!(diag.to_string(), "field 'B' not found in 'A+B', using 0");
        assert_eq!(diag.formula(), "A+B");
    }
}

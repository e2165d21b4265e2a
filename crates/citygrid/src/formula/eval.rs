use super::{BinaryOperator, Diagnostic, Expr};
use crate::constants::ZERO_EPSILON;
use crate::csv_reader::RawFields;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Row values visible to a formula.
///
/// `None` means the field does not exist, `Some(None)` means it exists
/// but the value is missing.
pub trait FieldLookup {
    fn lookup(&self, name: &str) -> Option<Option<f64>>;
}

impl FieldLookup for RawFields {
    fn lookup(&self, name: &str) -> Option<Option<f64>> {
        self.get(name)
    }
}

impl<K: Borrow<str> + Eq + Hash> FieldLookup for HashMap<K, f64> {
    fn lookup(&self, name: &str) -> Option<Option<f64>> {
        self.get(name).map(|v| Some(*v))
    }
}

impl<K: Borrow<str> + Eq + Hash> FieldLookup for HashMap<K, Option<f64>> {
    fn lookup(&self, name: &str) -> Option<Option<f64>> {
        self.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    pub diagnostics: Vec<Diagnostic>,
}

impl Evaluation {
    /// True if nothing was reported
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[inline]
pub(crate) fn clamp_zero(value: f64) -> f64 {
    if value.abs() < ZERO_EPSILON { 0.0 } else { value }
}

/// Value substituted for `name`: missing and NaN become 0, tiny values are clamped.
/// `None` if the field does not exist.
pub(crate) fn resolve<R: FieldLookup + ?Sized>(row: &R, name: &str) -> Option<f64> {
    row.lookup(name)
        .map(|value| clamp_zero(value.filter(|v| !v.is_nan()).unwrap_or(0.0)))
}

pub(crate) fn evaluate_expr<R: FieldLookup + ?Sized>(
    formula: &str,
    expr: &Expr,
    row: &R,
) -> Evaluation {
    let mut evaluator = Evaluator {
        formula,
        row,
        diagnostics: Vec::new(),
    };
    let raw = evaluator.eval(expr);

    let value = if raw.is_finite() {
        clamp_zero(raw)
    } else {
        evaluator.diagnostics.push(Diagnostic::NonFinite {
            formula: formula.to_string(),
        });
        0.0
    };

    Evaluation {
        value,
        diagnostics: evaluator.diagnostics,
    }
}

struct Evaluator<'a, R: ?Sized> {
    formula: &'a str,
    row: &'a R,
    diagnostics: Vec<Diagnostic>,
}

impl<R: FieldLookup + ?Sized> Evaluator<'_, R> {
    fn eval(&mut self, expr: &Expr) -> f64 {
        match expr {
            Expr::Literal(value) => *value,
            Expr::Variable(name) => match resolve(self.row, name) {
                Some(value) => value,
                None => {
                    self.diagnostics.push(Diagnostic::UnresolvedField {
                        formula: self.formula.to_string(),
                        field: name.clone(),
                    });
                    0.0
                }
            },
            Expr::Negate(inner) => -self.eval(inner),
            Expr::Binary { op, left, right } => {
                let lhs = self.eval(left);
                let rhs = self.eval(right);
                match op {
                    BinaryOperator::Add => lhs + rhs,
                    BinaryOperator::Subtract => lhs - rhs,
                    BinaryOperator::Multiply => lhs * rhs,
                    BinaryOperator::Divide => self.divide(lhs, rhs, right),
                }
            }
        }
    }

    fn divide(&mut self, lhs: f64, rhs: f64, divisor: &Expr) -> f64 {
        if rhs.abs() < ZERO_EPSILON {
            self.diagnostics.push(Diagnostic::DivisionByZero {
                formula: self.formula.to_string(),
                divisor: divisor.to_string(),
            });
            return 0.0;
        }
        clamp_zero(lhs / rhs)
    }
}

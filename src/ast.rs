use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::EvalError;
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A parsed time expression (e.g. `bar - 1/2`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    Variable {
        name: String,
        span: Span,
    },
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        /// Span of the operator token.
        span: Span,
    },
}

/// Named values visible to an expression.
pub type Bindings = HashMap<String, f64>;

impl Expr {
    /// Evaluate the expression against `bindings`.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<f64, EvalError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Variable { name, span } => {
                bindings
                    .get(name)
                    .copied()
                    .ok_or_else(|| EvalError::UnknownVariable {
                        name: name.clone(),
                        span: *span,
                    })
            }
            Expr::Neg(inner) => Ok(-inner.evaluate(bindings)?),
            Expr::Binary { op, lhs, rhs, span } => {
                let l = lhs.evaluate(bindings)?;
                let r = rhs.evaluate(bindings)?;
                let value = match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div if r == 0.0 => {
                        return Err(EvalError::DivisionByZero { span: *span });
                    }
                    BinaryOp::Div => l / r,
                };
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(EvalError::Overflow { span: *span })
                }
            }
        }
    }
}

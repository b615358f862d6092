mod parser;
mod token;

use crate::error::Result;
use crate::result::CounterResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide => lhs / rhs,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    /// Sum of all arguments.
    Sum,
    /// `a / b`, or 0 when `b` is 0.
    DRatio,
}

impl Function {
    fn apply(&self, args: &[f64]) -> f64 {
        match self {
            Self::Sum => args.iter().sum(),
            Self::DRatio => match args {
                [_, b] if *b == 0.0 => 0.0,
                [a, b] => a / b,
                _ => f64::NAN,
            },
        }
    }
}

/// Parsed metric formula.
///
/// Identifiers are resolved against a [`CounterResult`] when the expression is
/// evaluated, so one expression can be evaluated against many measurements.
///
/// # Examples
///
/// ```rust
/// use perf_counters::definition::Expression;
/// use perf_counters::result::CounterResult;
///
/// let ipc = Expression::parse("instructions / cycles").unwrap();
///
/// let mut result = CounterResult::default();
/// result.push("instructions", 300.0);
/// result.push("cycles", 100.0);
///
/// assert_eq!(ipc.evaluate(&result), Some(3.0));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Constant(f64),
    Identifier(String),
    Binary {
        op: Operator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Function {
        func: Function,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn parse(formula: &str) -> Result<Self> {
        parser::parse(formula)
    }

    /// Evaluates the expression, `None` if any referenced value is missing.
    pub fn evaluate(&self, result: &CounterResult) -> Option<f64> {
        match self {
            Self::Constant(value) => Some(*value),
            Self::Identifier(name) => result.get(name),
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.evaluate(result)?;
                let rhs = rhs.evaluate(result)?;
                Some(op.apply(lhs, rhs))
            }
            Self::Function { func, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(result))
                    .collect::<Option<Vec<_>>>()?;
                Some(func.apply(&args))
            }
        }
    }

    /// Appends every identifier of the expression to `out`, skipping duplicates.
    pub fn add_required_hardware_counter(&self, out: &mut Vec<String>) {
        match self {
            Self::Constant(_) => (),
            Self::Identifier(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Self::Binary { lhs, rhs, .. } => {
                lhs.add_required_hardware_counter(out);
                rhs.add_required_hardware_counter(out);
            }
            Self::Function { args, .. } => {
                for arg in args {
                    arg.add_required_hardware_counter(out);
                }
            }
        }
    }
}

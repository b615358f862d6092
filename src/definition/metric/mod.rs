mod expression;

pub use expression::*;

use crate::error::Result;
use crate::result::CounterResult;

/// Value derived from other events after a measurement.
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    /// Events and metrics this metric reads, each listed once.
    fn required_counter_names(&self) -> Vec<String>;

    /// `None` when a required value is missing from `result`.
    fn calculate(&self, result: &CounterResult) -> Option<f64>;
}

/// Metric computed from a formula such as `instructions / cycles`.
///
/// # Examples
///
/// ```rust
/// use perf_counters::definition::{FormulaMetric, Metric};
///
/// let metric = FormulaMetric::new("stalls-per-cycle", "sum(stalled-cycles-frontend, stalled-cycles-backend) / cycles").unwrap();
///
/// assert_eq!(
///     metric.required_counter_names(),
///     ["stalled-cycles-frontend", "stalled-cycles-backend", "cycles"]
/// );
/// ```
#[derive(Clone, Debug)]
pub struct FormulaMetric {
    name: String,
    expression: Expression,
}

impl FormulaMetric {
    pub fn new(name: impl Into<String>, formula: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            expression: Expression::parse(formula)?,
        })
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

impl Metric for FormulaMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_counter_names(&self) -> Vec<String> {
        let mut names = vec![];
        self.expression.add_required_hardware_counter(&mut names);
        names
    }

    fn calculate(&self, result: &CounterResult) -> Option<f64> {
        self.expression.evaluate(result)
    }
}

pub(super) const BUILTIN_METRICS: &[(&str, &str)] = &[
    ("gigahertz", "cycles / nanoseconds"),
    ("cycles-per-instruction", "cycles / instructions"),
    ("instructions-per-cycle", "instructions / cycles"),
    (
        "cache-hit-ratio",
        "(cache-references - cache-misses) / cache-references",
    ),
    ("cache-miss-ratio", "cache-misses / cache-references"),
    ("dTLB-miss-ratio", "dTLB-load-misses / dTLB-loads"),
    ("iTLB-miss-ratio", "iTLB-load-misses / iTLB-loads"),
    (
        "L1-data-miss-ratio",
        "L1-dcache-load-misses / L1-dcache-loads",
    ),
    ("branch-miss-ratio", "branch-misses / branches"),
];

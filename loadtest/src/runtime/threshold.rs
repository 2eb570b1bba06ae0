//! Threshold expressions evaluated against the metric registry at run end
//!
//! Grammar: `<aggregation> <op> <number>`, for example `p(95)<500`,
//! `rate<0.01`, `avg<=200` or `count>100`.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::metrics::{MetricValues, MetricsRegistry};
use super::types::LoadTestError;

/// Aggregate a threshold compares against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
    Rate,
    Count,
    Value,
}

impl Aggregation {
    /// Resolve this aggregate from a series. `None` if it does not apply
    /// to the series kind or the series has no samples.
    pub fn resolve(&self, values: &MetricValues, elapsed: Duration) -> Option<f64> {
        match (self, values) {
            (Aggregation::Avg, MetricValues::Trend(t)) => t.avg(),
            (Aggregation::Min, MetricValues::Trend(t)) => t.min(),
            (Aggregation::Max, MetricValues::Trend(t)) => t.max(),
            (Aggregation::Med, MetricValues::Trend(t)) => t.med(),
            (Aggregation::Percentile(p), MetricValues::Trend(t)) => t.percentile(*p),
            (Aggregation::Count, MetricValues::Trend(t)) => Some(t.count() as f64),
            (Aggregation::Rate, MetricValues::Rate { .. }) => values.rate(),
            (Aggregation::Count, MetricValues::Counter { count }) => Some(*count),
            (Aggregation::Rate, MetricValues::Counter { count }) => {
                let secs = elapsed.as_secs_f64();
                Some(if secs > 0.0 { count / secs } else { 0.0 })
            }
            (Aggregation::Value, MetricValues::Gauge { value, .. }) => Some(*value),
            (Aggregation::Min, MetricValues::Gauge { min, .. }) => Some(*min),
            (Aggregation::Max, MetricValues::Gauge { max, .. }) => Some(*max),
            _ => None,
        }
    }
}

impl FromStr for Aggregation {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            "value" => Ok(Aggregation::Value),
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| {
                        LoadTestError::InvalidThreshold(format!("unknown aggregation '{}'", s))
                    })?;
                let p: f64 = inner.trim().parse().map_err(|_| {
                    LoadTestError::InvalidThreshold(format!("invalid percentile '{}'", s))
                })?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(LoadTestError::InvalidThreshold(format!(
                        "percentile out of range: '{}'",
                        s
                    )));
                }
                Ok(Aggregation::Percentile(p))
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Percentile(p) => write!(f, "p({})", p),
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Count => write!(f, "count"),
            Aggregation::Value => write!(f, "value"),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    // Two-character operators first so `<=` is not read as `<`
    const TOKENS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }

    fn symbol(&self) -> &'static str {
        Self::TOKENS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(sym, _)| *sym)
            .unwrap_or("?")
    }
}

/// Parsed `<aggregation> <op> <number>` expression
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

impl FromStr for ThresholdExpr {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op_start = s.find(['<', '>', '=', '!']).ok_or_else(|| {
            LoadTestError::InvalidThreshold(format!("missing comparison operator in '{}'", s))
        })?;
        let (lhs, rest) = s.split_at(op_start);

        let (symbol, comparison) = Comparison::TOKENS
            .iter()
            .find(|(sym, _)| rest.starts_with(sym))
            .copied()
            .ok_or_else(|| {
                LoadTestError::InvalidThreshold(format!("invalid comparison operator in '{}'", s))
            })?;

        let aggregation: Aggregation = lhs.trim().parse()?;
        let rhs = rest[symbol.len()..].trim();
        let bound: f64 = rhs.parse().map_err(|_| {
            LoadTestError::InvalidThreshold(format!("invalid bound '{}' in '{}'", rhs, s))
        })?;

        Ok(Self {
            aggregation,
            comparison,
            bound,
        })
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.aggregation,
            self.comparison.symbol(),
            self.bound
        )
    }
}

/// A named metric paired with a pass/fail expression
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expr: ThresholdExpr,
}

impl Threshold {
    pub fn parse(metric: &str, expr: &str) -> Result<Self, LoadTestError> {
        Ok(Self {
            metric: metric.to_string(),
            expr: expr.parse()?,
        })
    }

    /// Evaluate against the registry.
    ///
    /// A metric with no samples passes. A metric whose kind does not support
    /// the aggregation fails.
    pub fn evaluate(&self, registry: &MetricsRegistry, elapsed: Duration) -> ThresholdResult {
        let (observed, passed) = match registry.get(&self.metric) {
            None => (None, true),
            Some(values) => match self.expr.aggregation.resolve(&values, elapsed) {
                Some(observed) => (
                    Some(observed),
                    self.expr.comparison.holds(observed, self.expr.bound),
                ),
                None => (None, is_empty(&values)),
            },
        };

        ThresholdResult {
            metric: self.metric.clone(),
            expression: self.expr.to_string(),
            observed,
            passed,
        }
    }
}

fn is_empty(values: &MetricValues) -> bool {
    match values {
        MetricValues::Trend(t) => t.count() == 0,
        MetricValues::Rate { passes, fails } => passes + fails == 0,
        _ => false,
    }
}

/// Outcome of one threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

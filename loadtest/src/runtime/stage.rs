//! Stage definitions and the virtual-user ramp profile
//!
//! A profile is an ordered list of `(duration, target)` stages. The executor
//! samples [`StageProfile::target_at`] on every tick to decide how many VUs
//! should be running.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::types::LoadTestError;

/// Parse a duration such as `30s`, `1m`, `1m30s`, `500ms`, `1.5s` or `2h`.
///
/// A bare `0` is accepted as zero.
pub fn parse_duration(input: &str) -> Result<Duration, LoadTestError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(LoadTestError::InvalidStage(
            "duration cannot be empty".to_string(),
        ));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let is_numeric = |c: char| c.is_ascii_digit() || c == '.';
    let mut total_secs = 0.0f64;
    let mut rest = s;

    while !rest.is_empty() {
        let num_end = rest.find(|c: char| !is_numeric(c)).unwrap_or(rest.len());
        if num_end == 0 {
            return Err(LoadTestError::InvalidStage(format!(
                "expected a number in duration '{}'",
                input
            )));
        }
        let value: f64 = rest[..num_end].parse().map_err(|_| {
            LoadTestError::InvalidStage(format!("invalid number in duration '{}'", input))
        })?;
        rest = &rest[num_end..];

        let unit_end = rest.find(is_numeric).unwrap_or(rest.len());
        let secs_per_unit = match &rest[..unit_end] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 60.0 * 60.0,
            "" => {
                return Err(LoadTestError::InvalidStage(format!(
                    "missing unit in duration '{}'",
                    input
                )));
            }
            unit => {
                return Err(LoadTestError::InvalidStage(format!(
                    "unknown unit '{}' in duration '{}'. Use 'ms', 's', 'm' or 'h'",
                    unit, input
                )));
            }
        };
        total_secs += value * secs_per_unit;
        rest = &rest[unit_end..];
    }

    Duration::try_from_secs_f64(total_secs).map_err(|_| {
        LoadTestError::InvalidStage(format!("duration '{}' is out of range", input))
    })
}

/// Format a duration compactly (`1m30s`, `10s`, `500ms`)
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis == 0 {
        return "0s".to_string();
    }
    if millis % 1000 != 0 {
        return format!("{}ms", millis);
    }

    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 {
        out.push_str(&format!("{}s", s));
    }
    out
}

/// One segment of a ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stage {
    /// How long this stage lasts
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    /// VU count reached by the end of the stage
    pub target: u32,
}

fn serialize_duration<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_duration(*d))
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }

    /// Build a stage from a duration string
    pub fn parse(duration: &str, target: u32) -> Result<Self, LoadTestError> {
        Ok(Self::new(parse_duration(duration)?, target))
    }
}

/// Parses `DURATION:TARGET`, e.g. `30s:50`
impl FromStr for Stage {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s.split_once(':').ok_or_else(|| {
            LoadTestError::InvalidStage(format!("expected DURATION:TARGET, got '{}'", s))
        })?;
        let target = target.trim().parse::<u32>().map_err(|_| {
            LoadTestError::InvalidStage(format!(
                "target must be a non-negative integer, got '{}'",
                target
            ))
        })?;
        Stage::parse(duration, target)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", format_duration(self.duration), self.target)
    }
}

/// How the target moves between stage boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Ramp linearly from the previous target to the stage target
    #[default]
    Linear,
    /// Jump to the stage target at the start of the stage and hold it
    Step,
}

impl FromStr for Interpolation {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Interpolation::Linear),
            "step" => Ok(Interpolation::Step),
            other => Err(LoadTestError::InvalidStage(format!(
                "unknown interpolation '{}'. Use 'linear' or 'step'",
                other
            ))),
        }
    }
}

/// Ordered stage sequence with an interpolation policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageProfile {
    stages: Vec<Stage>,
    start_vus: u32,
    interpolation: Interpolation,
}

impl StageProfile {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            start_vus: 0,
            interpolation: Interpolation::Linear,
        }
    }

    /// Parse a list of `(duration, target)` pairs
    pub fn parse(stages: &[(&str, u32)]) -> Result<Self, LoadTestError> {
        let stages = stages
            .iter()
            .map(|(duration, target)| Stage::parse(duration, *target))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(stages))
    }

    /// VU count the first stage ramps from
    pub fn with_start_vus(mut self, start_vus: u32) -> Self {
        self.start_vus = start_vus;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn start_vus(&self) -> u32 {
        self.start_vus
    }

    /// Reject profiles whose total length does not fit in a `Duration`
    pub fn validate(&self) -> Result<(), LoadTestError> {
        self.stages
            .iter()
            .try_fold(Duration::ZERO, |total, stage| total.checked_add(stage.duration))
            .map(|_| ())
            .ok_or_else(|| {
                LoadTestError::InvalidStage(format!("profile '{}' is too long", self))
            })
    }

    /// Sum of all stage durations, saturating for profiles that fail [`Self::validate`]
    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |total, s| total.saturating_add(s.duration))
    }

    /// Highest VU count the profile ever asks for
    pub fn max_target(&self) -> u32 {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start_vus, u32::max)
    }

    /// Offsets at which each stage begins
    pub fn stage_starts(&self) -> Vec<Duration> {
        let mut offset = Duration::ZERO;
        self.stages
            .iter()
            .map(|stage| {
                let start = offset;
                offset = offset.saturating_add(stage.duration);
                start
            })
            .collect()
    }

    /// Target VU count at `offset` from the start of the run.
    ///
    /// At the exact end of the profile the last stage's target is returned;
    /// beyond it the target is zero.
    pub fn target_at(&self, offset: Duration) -> u32 {
        let mut from = self.start_vus;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start.saturating_add(stage.duration);
            if offset < stage_end {
                return match self.interpolation {
                    Interpolation::Step => stage.target,
                    Interpolation::Linear => {
                        let progress = (offset - stage_start).as_secs_f64()
                            / stage.duration.as_secs_f64();
                        let delta = stage.target as f64 - from as f64;
                        (from as f64 + delta * progress).round() as u32
                    }
                };
            }
            from = stage.target;
            stage_start = stage_end;
        }

        if offset == stage_start { from } else { 0 }
    }
}

impl fmt::Display for StageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.stages.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

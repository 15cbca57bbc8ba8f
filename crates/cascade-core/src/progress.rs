//! Derived-state calculations: progress percentage, confidence band, and
//! schedule risk. All functions are pure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::goal::GoalStatus;

/// Confidence bucket of an author-supplied 0–10 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfidenceLevel {
  Green,
  Yellow,
  Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
  OnTrack,
  AtRisk,
  HighRisk,
}

/// Percentage of `target` reached by `current`, rounded and clamped to
/// `0..=100`. Absent, non-positive, or non-finite targets yield 0.
pub fn progress(current: f64, target: Option<f64>) -> u8 {
  let Some(target) = target else { return 0 };
  if !target.is_finite() || target <= 0.0 {
    return 0;
  }
  let pct = (current / target * 100.0).round();
  if !pct.is_finite() {
    return 0;
  }
  pct.clamp(0.0, 100.0) as u8
}

/// Lower bounds are inclusive: 7 is green, 4 is yellow.
pub fn confidence_level(confidence: u8) -> ConfidenceLevel {
  match confidence {
    7..=u8::MAX => ConfidenceLevel::Green,
    4..=6 => ConfidenceLevel::Yellow,
    _ => ConfidenceLevel::Red,
  }
}

/// Everything [`risk_level`] looks at.
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs {
  pub progress:         u8,
  pub confidence_level: ConfidenceLevel,
  pub status:           GoalStatus,
  pub start_date:       Option<NaiveDate>,
  pub end_date:         Option<NaiveDate>,
  pub today:            NaiveDate,
}

/// Gap (in percentage points) between elapsed schedule and progress at which
/// a goal becomes high risk.
const HIGH_RISK_GAP: f64 = 40.0;
/// Gap at which a goal is flagged at risk.
const AT_RISK_GAP: f64 = 15.0;

/// Fraction of the `[start, end]` window that has elapsed by `today`, in
/// `0.0..=1.0`. `None` when the window is unknown or empty.
pub fn elapsed_fraction(
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
  today: NaiveDate,
) -> Option<f64> {
  let (start, end) = (start?, end?);
  let total = (end - start).num_days();
  if total <= 0 {
    return None;
  }
  let elapsed = (today - start).num_days() as f64 / total as f64;
  Some(elapsed.clamp(0.0, 1.0))
}

pub fn risk_level(inputs: &RiskInputs) -> RiskLevel {
  if inputs.status == GoalStatus::Completed {
    return RiskLevel::OnTrack;
  }
  if inputs.end_date.is_some_and(|end| end < inputs.today) {
    return RiskLevel::HighRisk;
  }

  let expected = elapsed_fraction(inputs.start_date, inputs.end_date, inputs.today)
    .map(|f| f * 100.0)
    .unwrap_or(0.0);
  let gap = expected - f64::from(inputs.progress);
  let behind = gap > 0.0;

  match inputs.confidence_level {
    _ if gap >= HIGH_RISK_GAP => RiskLevel::HighRisk,
    ConfidenceLevel::Red if behind => RiskLevel::HighRisk,
    ConfidenceLevel::Red => RiskLevel::AtRisk,
    ConfidenceLevel::Yellow if behind => RiskLevel::AtRisk,
    _ if gap >= AT_RISK_GAP => RiskLevel::AtRisk,
    _ => RiskLevel::OnTrack,
  }
}

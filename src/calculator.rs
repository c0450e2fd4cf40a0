use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics;
use crate::models::{CalculationEntry, Tier};

pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("value required")]
    Required,
    #[error("must be a valid non-negative number")]
    InvalidNonNegative,
    #[error("must be greater than zero")]
    NotPositive,
    #[error("cannot exceed total")]
    ExceedsTotal,
}

/// Validation failures keyed by input field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub attended: Option<FieldError>,
    pub total: Option<FieldError>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationOutcome {
    pub percentage: f64,
    pub tier: Tier,
}

/// Most-recent-first log of successful calculations, capped at
/// [`HISTORY_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CalculationEntry>", into = "Vec<CalculationEntry>")]
pub struct History {
    entries: Vec<CalculationEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CalculationEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, entry: CalculationEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl From<Vec<CalculationEntry>> for History {
    fn from(mut entries: Vec<CalculationEntry>) -> Self {
        entries.truncate(HISTORY_CAPACITY);
        Self { entries }
    }
}

impl From<History> for Vec<CalculationEntry> {
    fn from(history: History) -> Self {
        history.entries
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Validates both fields, reporting every failure at once. On success the
/// calculation is pushed onto `history`.
pub fn evaluate(
    history: &mut History,
    attended_raw: &str,
    total_raw: &str,
) -> Result<CalculationOutcome, FieldErrors> {
    evaluate_at(history, attended_raw, total_raw, Utc::now())
}

pub fn evaluate_at(
    history: &mut History,
    attended_raw: &str,
    total_raw: &str,
    timestamp: DateTime<Utc>,
) -> Result<CalculationOutcome, FieldErrors> {
    let attended_raw = attended_raw.trim();
    let total_raw = total_raw.trim();
    let mut errors = FieldErrors::default();

    let attended = if attended_raw.is_empty() {
        errors.attended = Some(FieldError::Required);
        None
    } else {
        match parse_number(attended_raw) {
            Some(value) if value >= 0.0 => Some(value),
            _ => {
                errors.attended = Some(FieldError::InvalidNonNegative);
                None
            }
        }
    };

    let total = if total_raw.is_empty() {
        errors.total = Some(FieldError::Required);
        None
    } else {
        match parse_number(total_raw) {
            Some(value) if value > 0.0 => Some(value),
            _ => {
                errors.total = Some(FieldError::NotPositive);
                None
            }
        }
    };

    let (attended, total) = match (attended, total) {
        (Some(attended), Some(total)) if attended > total => {
            errors.attended = Some(FieldError::ExceedsTotal);
            return Err(errors);
        }
        (Some(attended), Some(total)) => (attended, total),
        _ => return Err(errors),
    };

    let percentage = attended / total * 100.0;
    history.record(CalculationEntry {
        attended,
        total,
        percentage,
        timestamp,
    });

    Ok(CalculationOutcome {
        percentage,
        tier: metrics::classify(percentage),
    })
}

/// As-you-type check: `None` for any invalid input, the raw percentage
/// otherwise. Never touches the history.
pub fn preview_percentage(attended_raw: &str, total_raw: &str) -> Option<f64> {
    let attended = parse_number(attended_raw.trim())?;
    let total = parse_number(total_raw.trim())?;

    if total <= 0.0 || attended < 0.0 || attended > total {
        return None;
    }

    Some(attended / total * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn missing_attended_flags_only_that_field() {
        let mut history = History::new();
        let errors = evaluate(&mut history, "", "10").unwrap_err();
        assert_eq!(errors.attended, Some(FieldError::Required));
        assert_eq!(errors.total, None);
        assert_eq!(errors.attended.unwrap().to_string(), "value required");
        assert!(history.is_empty());
    }

    #[test]
    fn zero_total_is_rejected() {
        let mut history = History::new();
        let errors = evaluate(&mut history, "5", "0").unwrap_err();
        assert_eq!(errors.total, Some(FieldError::NotPositive));
        assert_eq!(errors.attended, None);
        assert_eq!(errors.total.unwrap().to_string(), "must be greater than zero");
    }

    #[test]
    fn attended_cannot_exceed_total() {
        let mut history = History::new();
        let errors = evaluate(&mut history, "8", "5").unwrap_err();
        assert_eq!(errors.attended, Some(FieldError::ExceedsTotal));
        assert_eq!(errors.total, None);
        assert!(history.is_empty());
    }

    #[test]
    fn every_field_error_is_reported() {
        let mut history = History::new();
        let errors = evaluate(&mut history, "-3", "").unwrap_err();
        assert_eq!(errors.attended, Some(FieldError::InvalidNonNegative));
        assert_eq!(errors.total, Some(FieldError::Required));

        let errors = evaluate(&mut history, "abc", "-1").unwrap_err();
        assert_eq!(errors.attended, Some(FieldError::InvalidNonNegative));
        assert_eq!(errors.total, Some(FieldError::NotPositive));
    }

    #[test]
    fn non_finite_input_is_invalid() {
        let mut history = History::new();
        let errors = evaluate(&mut history, "NaN", "inf").unwrap_err();
        assert_eq!(errors.attended, Some(FieldError::InvalidNonNegative));
        assert_eq!(errors.total, Some(FieldError::NotPositive));
    }

    #[test]
    fn valid_input_is_classified_and_recorded() {
        let mut history = History::new();
        let outcome = evaluate(&mut history, "5", "10").unwrap();
        assert_eq!(outcome.percentage, 50.0);
        assert_eq!(outcome.tier, Tier::Critical);
        assert_eq!(history.entries().len(), 1);
        assert_eq!(history.entries()[0].attended, 5.0);
        assert_eq!(history.entries()[0].total, 10.0);
    }

    #[test]
    fn history_keeps_ten_most_recent() {
        let mut history = History::new();
        let start = Utc::now();
        for attended in 0..11 {
            evaluate_at(
                &mut history,
                &attended.to_string(),
                "20",
                start + Duration::seconds(attended),
            )
            .unwrap();
        }

        assert_eq!(history.entries().len(), HISTORY_CAPACITY);
        let attended: Vec<f64> = history.entries().iter().map(|e| e.attended).collect();
        let expected: Vec<f64> = (1..11).rev().map(|v| v as f64).collect();
        assert_eq!(attended, expected);
    }

    #[test]
    fn clear_empties_history() {
        let mut history = History::new();
        evaluate(&mut history, "9", "10").unwrap();
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn loaded_history_is_capped() {
        let entries: Vec<CalculationEntry> = (0..15)
            .map(|i| CalculationEntry {
                attended: i as f64,
                total: 20.0,
                percentage: i as f64 * 5.0,
                timestamp: Utc::now(),
            })
            .collect();
        let json = serde_json::to_string(&entries).unwrap();
        let history: History = serde_json::from_str(&json).unwrap();
        assert_eq!(history.entries().len(), HISTORY_CAPACITY);
        assert_eq!(history.entries()[0].attended, 0.0);
    }

    #[test]
    fn preview_signals_valid_or_invalid() {
        assert_eq!(preview_percentage("15", "20"), Some(75.0));
        assert_eq!(preview_percentage("0", "20"), Some(0.0));
        assert_eq!(preview_percentage("", "20"), None);
        assert_eq!(preview_percentage("5", "0"), None);
        assert_eq!(preview_percentage("-1", "20"), None);
        assert_eq!(preview_percentage("21", "20"), None);
        assert_eq!(preview_percentage("x", "20"), None);
    }
}

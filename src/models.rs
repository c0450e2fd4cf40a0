use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
    Late,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
            Status::Late => "late",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Status::Present),
            "absent" => Ok(Status::Absent),
            "late" => Ok(Status::Late),
            other => anyhow::bail!("unknown attendance status '{other}' (expected present, absent or late)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub status: Status,
}

/// A roster entry. `external_id` is the human-facing identifier shown in
/// reports; `id` is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(rename = "studentId")]
    pub external_id: String,
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(rename = "attendanceRecords", default)]
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Critical,
    Poor,
    Good,
    Excellent,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Excellent => "Excellent",
            Tier::Good => "Good",
            Tier::Poor => "Poor",
            Tier::Critical => "Critical",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationEntry {
    pub attended: f64,
    pub total: f64,
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
}

/// A record flattened together with the student it belongs to.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub student_name: String,
    pub external_id: String,
    pub class_name: String,
    pub date: NaiveDate,
    pub status: Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Present".parse::<Status>().unwrap(), Status::Present);
        assert_eq!(" late ".parse::<Status>().unwrap(), Status::Late);
        assert!("excused".parse::<Status>().is_err());
    }

    #[test]
    fn student_uses_stored_field_names() {
        let json = r#"{
            "id": "1",
            "name": "Alice Johnson",
            "studentId": "STU001",
            "class": "10A",
            "attendanceRecords": [{"date": "2025-09-01", "status": "late"}]
        }"#;
        let student: Student = serde_json::from_str(json).unwrap();
        assert_eq!(student.external_id, "STU001");
        assert_eq!(student.class_name, "10A");
        assert_eq!(student.records[0].status, Status::Late);
    }

    #[test]
    fn unknown_status_is_rejected_on_load() {
        let json = r#"{"date": "2025-09-01", "status": "excused"}"#;
        assert!(serde_json::from_str::<AttendanceRecord>(json).is_err());
    }
}

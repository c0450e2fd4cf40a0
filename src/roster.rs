use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::calculator::History;
use crate::models::{AttendanceRecord, Status, Student};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("student ID {0} already exists")]
    DuplicateExternalId(String),
}

/// Everything the CLI mutates between loads and saves. The metrics engine
/// only ever sees slices borrowed from here.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub students: Vec<Student>,
    pub history: History,
}

/// Trimmed, non-empty student details.
pub(crate) struct StudentFields {
    pub(crate) name: String,
    pub(crate) external_id: String,
    pub(crate) class_name: String,
}

pub(crate) fn validate_fields(name: &str, external_id: &str, class_name: &str) -> Result<StudentFields, RosterError> {
    let name = name.trim();
    let external_id = external_id.trim();
    let class_name = class_name.trim();

    if name.is_empty() {
        return Err(RosterError::MissingField("name"));
    }
    if external_id.is_empty() {
        return Err(RosterError::MissingField("student ID"));
    }
    if class_name.is_empty() {
        return Err(RosterError::MissingField("class"));
    }

    Ok(StudentFields {
        name: name.to_string(),
        external_id: external_id.to_string(),
        class_name: class_name.to_string(),
    })
}

/// Inserts or overwrites the record for `date`.
pub fn upsert_record(student: &mut Student, date: NaiveDate, status: Status) {
    match student.records.iter_mut().find(|r| r.date == date) {
        Some(record) => record.status = status,
        None => student.records.push(AttendanceRecord { date, status }),
    }
}

pub fn record_for(student: &Student, date: NaiveDate) -> Option<Status> {
    student
        .records
        .iter()
        .find(|r| r.date == date)
        .map(|r| r.status)
}

impl AppState {
    pub fn new(students: Vec<Student>, history: History) -> Self {
        Self { students, history }
    }

    pub fn find(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn find_by_external_id(&self, external_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.external_id == external_id)
    }

    /// Accepts either the opaque roster id or the human-facing student ID.
    pub fn resolve_id(&self, key: &str) -> Option<String> {
        self.find(key)
            .or_else(|| self.find_by_external_id(key.trim()))
            .map(|s| s.id.clone())
    }

    fn ensure_unique(&self, external_id: &str, editing: Option<&str>) -> Result<(), RosterError> {
        let clash = self
            .students
            .iter()
            .any(|s| s.external_id == external_id && Some(s.id.as_str()) != editing);
        if clash {
            return Err(RosterError::DuplicateExternalId(external_id.to_string()));
        }
        Ok(())
    }

    pub fn add_student(
        &mut self,
        name: &str,
        external_id: &str,
        class_name: &str,
    ) -> Result<&Student, RosterError> {
        let fields = validate_fields(name, external_id, class_name)?;
        self.ensure_unique(&fields.external_id, None)?;

        self.students.push(Student {
            id: Uuid::new_v4().to_string(),
            name: fields.name,
            external_id: fields.external_id,
            class_name: fields.class_name,
            records: Vec::new(),
        });
        log::debug!("added student, roster size now {}", self.students.len());

        Ok(&self.students[self.students.len() - 1])
    }

    /// Returns `Ok(false)` when no student has `id`.
    pub fn update_student(
        &mut self,
        id: &str,
        name: &str,
        external_id: &str,
        class_name: &str,
    ) -> Result<bool, RosterError> {
        let fields = validate_fields(name, external_id, class_name)?;
        self.ensure_unique(&fields.external_id, Some(id))?;

        let Some(student) = self.students.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        student.name = fields.name;
        student.external_id = fields.external_id;
        student.class_name = fields.class_name;
        Ok(true)
    }

    pub fn delete_student(&mut self, id: &str) -> bool {
        let before = self.students.len();
        self.students.retain(|s| s.id != id);
        self.students.len() != before
    }

    pub fn mark_attendance(&mut self, id: &str, date: NaiveDate, status: Status) -> bool {
        match self.students.iter_mut().find(|s| s.id == id) {
            Some(student) => {
                upsert_record(student, date, status);
                true
            }
            None => false,
        }
    }

    pub fn mark_all_present(&mut self, date: NaiveDate) -> usize {
        for student in self.students.iter_mut() {
            upsert_record(student, date, Status::Present);
        }
        self.students.len()
    }

    /// Case-insensitive substring match over name, student ID and class.
    pub fn search(&self, term: &str) -> Vec<&Student> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.students.iter().collect();
        }

        self.students
            .iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&term)
                    || s.external_id.to_lowercase().contains(&term)
                    || s.class_name.to_lowercase().contains(&term)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
    }

    fn state_with_two() -> AppState {
        let mut state = AppState::default();
        state.add_student("Alice Johnson", "STU001", "10A").unwrap();
        state.add_student("Bob Smith", "STU002", "10B").unwrap();
        state
    }

    #[test]
    fn add_requires_every_field() {
        let mut state = AppState::default();
        assert_eq!(
            state.add_student("  ", "STU001", "10A").unwrap_err(),
            RosterError::MissingField("name")
        );
        assert_eq!(
            state.add_student("Alice", "", "10A").unwrap_err(),
            RosterError::MissingField("student ID")
        );
        assert!(state.students.is_empty());
    }

    #[test]
    fn add_trims_and_rejects_duplicate_ids() {
        let mut state = state_with_two();
        assert_eq!(state.students[0].name, "Alice Johnson");
        let err = state.add_student("Carol Davis", " STU001 ", "10B").unwrap_err();
        assert_eq!(err, RosterError::DuplicateExternalId("STU001".to_string()));
        assert_eq!(state.students.len(), 2);
    }

    #[test]
    fn update_allows_keeping_own_id() {
        let mut state = state_with_two();
        let id = state.students[0].id.clone();
        assert!(state.update_student(&id, "Alice J.", "STU001", "11A").unwrap());
        assert_eq!(state.students[0].class_name, "11A");

        let err = state.update_student(&id, "Alice J.", "STU002", "11A").unwrap_err();
        assert_eq!(err, RosterError::DuplicateExternalId("STU002".to_string()));
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut state = state_with_two();
        assert!(!state.update_student("missing", "X", "STU009", "10A").unwrap());
        assert!(!state.delete_student("missing"));
        assert!(!state.mark_attendance("missing", date(1), Status::Present));
        assert_eq!(state.students.len(), 2);
    }

    #[test]
    fn marking_replaces_existing_date() {
        let mut state = state_with_two();
        let id = state.students[0].id.clone();
        assert!(state.mark_attendance(&id, date(1), Status::Absent));
        assert!(state.mark_attendance(&id, date(1), Status::Late));
        assert!(state.mark_attendance(&id, date(2), Status::Present));

        let student = state.find(&id).unwrap();
        assert_eq!(student.records.len(), 2);
        assert_eq!(record_for(student, date(1)), Some(Status::Late));
        assert_eq!(record_for(student, date(3)), None);
    }

    #[test]
    fn mark_all_present_overwrites_for_everyone() {
        let mut state = state_with_two();
        let id = state.students[1].id.clone();
        state.mark_attendance(&id, date(4), Status::Absent);
        assert_eq!(state.mark_all_present(date(4)), 2);
        for student in &state.students {
            assert_eq!(student.records.len(), 1);
            assert_eq!(record_for(student, date(4)), Some(Status::Present));
        }
    }

    #[test]
    fn delete_removes_student() {
        let mut state = state_with_two();
        let id = state.students[0].id.clone();
        assert!(state.delete_student(&id));
        assert!(state.find(&id).is_none());
        assert!(state.find_by_external_id("STU002").is_some());
    }

    #[test]
    fn resolve_accepts_either_identifier() {
        let state = state_with_two();
        let id = state.students[1].id.clone();
        assert_eq!(state.resolve_id(&id), Some(id.clone()));
        assert_eq!(state.resolve_id(" STU002"), Some(id));
        assert_eq!(state.resolve_id("STU404"), None);
    }

    #[test]
    fn search_matches_any_column() {
        let state = state_with_two();
        assert_eq!(state.search("").len(), 2);
        assert_eq!(state.search("bob")[0].external_id, "STU002");
        assert_eq!(state.search("stu00").len(), 2);
        assert_eq!(state.search("10a")[0].name, "Alice Johnson");
        assert!(state.search("zed").is_empty());
    }
}

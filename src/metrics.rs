use crate::models::{ActivityRecord, AttendanceRecord, AttendanceStats, Status, Student, Tier};

pub const LOW_ATTENDANCE_THRESHOLD: f64 = 75.0;
pub const LATE_WEIGHT: f64 = 0.5;

/// Weighted attendance percentage: present counts fully, late counts half,
/// absent counts nothing. An empty sequence yields 0.
pub fn percentage(records: &[AttendanceRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }

    let stats = stats(records);
    let effective = stats.present as f64 + LATE_WEIGHT * stats.late as f64;
    effective / records.len() as f64 * 100.0
}

pub fn stats(records: &[AttendanceRecord]) -> AttendanceStats {
    let mut stats = AttendanceStats {
        total: records.len(),
        ..AttendanceStats::default()
    };

    for record in records {
        match record.status {
            Status::Present => stats.present += 1,
            Status::Absent => stats.absent += 1,
            Status::Late => stats.late += 1,
        }
    }

    stats
}

pub fn classify(percentage: f64) -> Tier {
    if percentage >= 90.0 {
        Tier::Excellent
    } else if percentage >= 75.0 {
        Tier::Good
    } else if percentage >= 60.0 {
        Tier::Poor
    } else {
        Tier::Critical
    }
}

/// Unweighted mean of per-student percentages.
pub fn average_percentage(students: &[Student]) -> f64 {
    if students.is_empty() {
        return 0.0;
    }

    let sum: f64 = students.iter().map(|s| percentage(&s.records)).sum();
    sum / students.len() as f64
}

pub fn low_attendance_count(students: &[Student], threshold: f64) -> usize {
    students
        .iter()
        .filter(|s| percentage(&s.records) < threshold)
        .count()
}

pub fn total_records(students: &[Student]) -> usize {
    students.iter().map(|s| s.records.len()).sum()
}

pub fn recent_attendance(students: &[Student], limit: usize) -> Vec<ActivityRecord> {
    let mut activity: Vec<ActivityRecord> = students
        .iter()
        .flat_map(|student| {
            student.records.iter().map(move |record| ActivityRecord {
                student_name: student.name.clone(),
                external_id: student.external_id.clone(),
                class_name: student.class_name.clone(),
                date: record.date,
                status: record.status,
            })
        })
        .collect();

    activity.sort_by(|a, b| b.date.cmp(&a.date));
    activity.truncate(limit);
    activity
}

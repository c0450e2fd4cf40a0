use std::cmp::Ordering;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::metrics::{self, LOW_ATTENDANCE_THRESHOLD};
use crate::models::{AttendanceStats, Student, Tier};

pub const EXPORT_HEADERS: [&str; 8] = [
    "Student Name",
    "Student ID",
    "Class",
    "Total Days",
    "Present",
    "Absent",
    "Late",
    "Attendance Percentage",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardSummary {
    pub total_students: usize,
    pub average_percentage: f64,
    pub low_attendance_count: usize,
    pub total_records: usize,
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub name: String,
    pub external_id: String,
    pub class_name: String,
    pub stats: AttendanceStats,
    pub percentage: f64,
    pub tier: Tier,
    pub low_attendance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortColumn {
    Name,
    StudentId,
    Class,
    Total,
    Present,
    Absent,
    Late,
    Percentage,
}

pub fn dashboard(students: &[Student]) -> DashboardSummary {
    DashboardSummary {
        total_students: students.len(),
        average_percentage: metrics::average_percentage(students),
        low_attendance_count: metrics::low_attendance_count(students, LOW_ATTENDANCE_THRESHOLD),
        total_records: metrics::total_records(students),
    }
}

pub fn report_row(student: &Student) -> ReportRow {
    let percentage = metrics::percentage(&student.records);
    ReportRow {
        name: student.name.clone(),
        external_id: student.external_id.clone(),
        class_name: student.class_name.clone(),
        stats: metrics::stats(&student.records),
        percentage,
        tier: metrics::classify(percentage),
        low_attendance: percentage < LOW_ATTENDANCE_THRESHOLD,
    }
}

fn compare_rows(a: &ReportRow, b: &ReportRow, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortColumn::StudentId => a.external_id.to_lowercase().cmp(&b.external_id.to_lowercase()),
        SortColumn::Class => a.class_name.to_lowercase().cmp(&b.class_name.to_lowercase()),
        SortColumn::Total => a.stats.total.cmp(&b.stats.total),
        SortColumn::Present => a.stats.present.cmp(&b.stats.present),
        SortColumn::Absent => a.stats.absent.cmp(&b.stats.absent),
        SortColumn::Late => a.stats.late.cmp(&b.stats.late),
        SortColumn::Percentage => a.percentage.partial_cmp(&b.percentage).unwrap_or(Ordering::Equal),
    }
}

/// Roster order unless a column is given; equal keys keep roster order.
pub fn report_rows(students: &[Student], sort: Option<SortColumn>, ascending: bool) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = students.iter().map(report_row).collect();

    if let Some(column) = sort {
        rows.sort_by(|a, b| {
            let ordering = compare_rows(a, b, column);
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }

    rows
}

pub fn format_percentage(percentage: f64) -> String {
    format!("{percentage:.1}%")
}

pub fn build_report(
    generated_on: NaiveDate,
    students: &[Student],
    sort: Option<SortColumn>,
    ascending: bool,
) -> String {
    let summary = dashboard(students);
    let rows = report_rows(students, sort, ascending);
    let recent = metrics::recent_attendance(students, 5);

    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(output, "Generated on {}", generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Students: {}", summary.total_students);
    let _ = writeln!(
        output,
        "- Average attendance: {}",
        format_percentage(summary.average_percentage)
    );
    let _ = writeln!(
        output,
        "- Below {}%: {}",
        LOW_ATTENDANCE_THRESHOLD, summary.low_attendance_count
    );
    let _ = writeln!(output, "- Records: {}", summary.total_records);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");

    if rows.is_empty() {
        let _ = writeln!(output, "No students on the roster.");
    } else {
        let _ = writeln!(output, "| {} |", EXPORT_HEADERS.join(" | "));
        let _ = writeln!(output, "|{}", "---|".repeat(EXPORT_HEADERS.len()));
        for row in rows.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} | {} |",
                row.name,
                row.external_id,
                row.class_name,
                row.stats.total,
                row.stats.present,
                row.stats.absent,
                row.stats.late,
                format_percentage(row.percentage)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Low Attendance");

    let low: Vec<&ReportRow> = rows.iter().filter(|row| row.low_attendance).collect();
    if low.is_empty() {
        let _ = writeln!(output, "Every student is at or above {}%.", LOW_ATTENDANCE_THRESHOLD);
    } else {
        for row in low {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {} ({})",
                row.name,
                row.external_id,
                row.class_name,
                format_percentage(row.percentage),
                row.tier
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Activity");

    if recent.is_empty() {
        let _ = writeln!(output, "No recent attendance records.");
    } else {
        for activity in recent.iter() {
            let _ = writeln!(
                output,
                "- {} ({}, {}) on {}: {}",
                activity.student_name,
                activity.external_id,
                activity.class_name,
                activity.date,
                activity.status
            );
        }
    }

    output
}

/// Writes the roster as a fully quoted CSV table.
pub fn export_csv<W: std::io::Write>(students: &[Student], writer: W) -> anyhow::Result<()> {
    anyhow::ensure!(!students.is_empty(), "no data to export");

    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    csv_writer.write_record(EXPORT_HEADERS)?;
    for row in report_rows(students, None, true) {
        csv_writer.write_record([
            row.name,
            row.external_id,
            row.class_name,
            row.stats.total.to_string(),
            row.stats.present.to_string(),
            row.stats.absent.to_string(),
            row.stats.late.to_string(),
            format_percentage(row.percentage),
        ])?;
    }
    csv_writer.flush()?;

    Ok(())
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("attendance_report_{}.csv", date.format("%Y-%m-%d"))
}

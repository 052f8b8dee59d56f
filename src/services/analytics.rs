//! Per-student, per-class and fleet aggregation over graded worksheets.
//!
//! Every multi-worksheet average is an additive [`Rollup`].

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use time::{Duration, PrimitiveDateTime};

use crate::core::time::format_primitive;
use crate::db::models::{ClassRecord, StudentRecord, Worksheet};
use crate::db::types::{ClassId, StudentId, WorksheetId, WorksheetStatus};
use crate::services::scoring::{normalize, LetterGrade, NormalizedScore, Rollup};

const TOP_PERFORMERS: usize = 5;
const TOP_MISTAKES: usize = 10;
const SUPPORT_THRESHOLD: u32 = 80;

/// Letter grade, or "N/A" for a student without graded work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GradeLabel {
    Letter(LetterGrade),
    NotAvailable,
}

impl GradeLabel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Letter(grade) => grade.as_str(),
            Self::NotAvailable => "N/A",
        }
    }
}

impl Serialize for GradeLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SupportPriority {
    High,
    Medium,
    Low,
}

impl SupportPriority {
    fn for_percentage(percentage: u32) -> Self {
        if percentage < 60 {
            Self::High
        } else if percentage < 70 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentPerformance {
    pub(crate) student_id: StudentId,
    pub(crate) student_name: String,
    pub(crate) total_worksheets: usize,
    pub(crate) total_points: f64,
    pub(crate) total_points_earned: f64,
    pub(crate) percentage: u32,
    pub(crate) grade: GradeLabel,
    pub(crate) needs_support: bool,
    pub(crate) priority: SupportPriority,
    pub(crate) last_activity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RankedStudent {
    pub(crate) rank: usize,
    pub(crate) student_id: StudentId,
    pub(crate) student_name: String,
    pub(crate) percentage: u32,
    pub(crate) grade: GradeLabel,
    pub(crate) total_worksheets: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct GradeDistribution {
    #[serde(rename = "A")]
    pub(crate) a: usize,
    #[serde(rename = "B")]
    pub(crate) b: usize,
    #[serde(rename = "C")]
    pub(crate) c: usize,
    #[serde(rename = "D")]
    pub(crate) d: usize,
    #[serde(rename = "F")]
    pub(crate) f: usize,
}

impl GradeDistribution {
    fn record(&mut self, grade: LetterGrade) {
        match grade {
            LetterGrade::A => self.a += 1,
            LetterGrade::B => self.b += 1,
            LetterGrade::C => self.c += 1,
            LetterGrade::D => self.d += 1,
            LetterGrade::F => self.f += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct MistakeCount {
    pub(crate) mistake: String,
    pub(crate) count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassMetrics {
    pub(crate) total_students: usize,
    pub(crate) total_worksheets: usize,
    pub(crate) total_points: f64,
    pub(crate) total_points_earned: f64,
    pub(crate) average_score: u32,
    pub(crate) completion_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassReport {
    pub(crate) class_id: ClassId,
    pub(crate) class_name: String,
    pub(crate) subject: String,
    pub(crate) grade_level: String,
    pub(crate) metrics: ClassMetrics,
    pub(crate) student_performance: Vec<StudentPerformance>,
    pub(crate) top_performers: Vec<RankedStudent>,
    pub(crate) students_needing_support: Vec<StudentPerformance>,
    pub(crate) grade_distribution: GradeDistribution,
    pub(crate) common_mistakes: Vec<MistakeCount>,
}

/// Score a graded worksheet contributes, recomputed from the raw result
/// when the stored normalized value is absent.
pub(crate) fn worksheet_score(worksheet: &Worksheet) -> Option<NormalizedScore> {
    worksheet
        .normalized_score
        .clone()
        .or_else(|| worksheet.grading_result.as_ref().map(normalize))
}

pub(crate) fn class_report(
    class: &ClassRecord,
    students: &[StudentRecord],
    worksheets: &[Worksheet],
) -> ClassReport {
    let performance = student_performance(students, worksheets);

    let mut class_rollup = Rollup::default();
    for student in &performance {
        class_rollup.merge(&Rollup {
            earned: student.total_points_earned,
            possible: student.total_points,
            count: student.total_worksheets,
        });
    }

    let active = performance.iter().filter(|student| student.total_worksheets > 0).count();
    let completion_rate = if performance.is_empty() {
        0
    } else {
        ((active as f64 / performance.len() as f64) * 100.0).round() as u32
    };

    let mut distribution = GradeDistribution::default();
    for student in &performance {
        distribution.record(LetterGrade::from_percentage(student.percentage));
    }

    ClassReport {
        class_id: class.id,
        class_name: class.name.clone(),
        subject: class.subject.clone().unwrap_or_else(|| "General".to_string()),
        grade_level: class.grade_level.clone().unwrap_or_else(|| "All".to_string()),
        metrics: ClassMetrics {
            total_students: performance.len(),
            total_worksheets: class_rollup.count,
            total_points: class_rollup.possible,
            total_points_earned: class_rollup.earned,
            average_score: class_rollup.percentage(),
            completion_rate,
        },
        top_performers: top_performers(&performance),
        students_needing_support: students_needing_support(&performance),
        grade_distribution: distribution,
        common_mistakes: common_mistakes(worksheets),
        student_performance: performance,
    }
}

/// One row per roster student, in roster order.
pub(crate) fn student_performance(
    students: &[StudentRecord],
    worksheets: &[Worksheet],
) -> Vec<StudentPerformance> {
    let mut by_student: HashMap<StudentId, Vec<&Worksheet>> = HashMap::new();
    for worksheet in worksheets {
        by_student.entry(worksheet.student_id).or_default().push(worksheet);
    }

    students
        .iter()
        .map(|student| {
            let own = by_student.get(&student.id).map(Vec::as_slice).unwrap_or_default();
            let mut rollup = Rollup::default();
            for score in own.iter().filter_map(|worksheet| worksheet_score(worksheet)) {
                rollup.add(&score);
            }

            let (percentage, grade) = match rollup.score() {
                Some(score) => (score.percentage, GradeLabel::Letter(score.letter_grade)),
                None => (0, GradeLabel::NotAvailable),
            };
            let last_activity = own
                .iter()
                .filter_map(|worksheet| worksheet.completed_at)
                .max()
                .map(format_primitive);

            StudentPerformance {
                student_id: student.id,
                student_name: student.name.clone(),
                total_worksheets: rollup.count,
                total_points: rollup.possible,
                total_points_earned: rollup.earned,
                percentage,
                grade,
                needs_support: percentage < SUPPORT_THRESHOLD,
                priority: SupportPriority::for_percentage(percentage),
                last_activity,
            }
        })
        .collect()
}

/// Per-student grade rows sorted by name.
pub(crate) fn student_grades(
    students: &[StudentRecord],
    worksheets: &[Worksheet],
) -> Vec<StudentPerformance> {
    let mut rows = student_performance(students, worksheets);
    rows.sort_by(|a, b| a.student_name.cmp(&b.student_name));
    rows
}

fn top_performers(performance: &[StudentPerformance]) -> Vec<RankedStudent> {
    let mut ranked: Vec<&StudentPerformance> =
        performance.iter().filter(|student| student.total_worksheets > 0).collect();
    ranked.sort_by(|a, b| {
        b.percentage.cmp(&a.percentage).then_with(|| a.student_name.cmp(&b.student_name))
    });

    ranked
        .into_iter()
        .take(TOP_PERFORMERS)
        .enumerate()
        .map(|(index, student)| RankedStudent {
            rank: index + 1,
            student_id: student.student_id,
            student_name: student.student_name.clone(),
            percentage: student.percentage,
            grade: student.grade,
            total_worksheets: student.total_worksheets,
        })
        .collect()
}

fn students_needing_support(performance: &[StudentPerformance]) -> Vec<StudentPerformance> {
    let mut flagged: Vec<StudentPerformance> =
        performance.iter().filter(|student| student.needs_support).cloned().collect();
    flagged.sort_by(|a, b| {
        a.percentage.cmp(&b.percentage).then_with(|| a.student_name.cmp(&b.student_name))
    });
    flagged
}

/// Frequency of recorded common-error tags, most frequent first, top 10.
pub(crate) fn common_mistakes(worksheets: &[Worksheet]) -> Vec<MistakeCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for worksheet in worksheets {
        let Some(result) = worksheet.grading_result.as_ref() else {
            continue;
        };
        for mistake in &result.common_errors {
            *counts.entry(mistake.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<MistakeCount> = counts
        .into_iter()
        .map(|(mistake, count)| MistakeCount { mistake: mistake.to_string(), count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.mistake.cmp(&b.mistake)));
    ranked.truncate(TOP_MISTAKES);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassReports {
    pub(crate) total_classes: usize,
    pub(crate) generated_at: String,
    pub(crate) classes: Vec<ClassReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecentWorksheet {
    pub(crate) id: WorksheetId,
    pub(crate) student_name: String,
    pub(crate) class_name: String,
    pub(crate) status: WorksheetStatus,
    pub(crate) progress: u8,
    pub(crate) percentage: Option<u32>,
    pub(crate) created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusCounts {
    pub(crate) total: u64,
    pub(crate) uploaded: u64,
    pub(crate) processing: u64,
    pub(crate) grading: u64,
    pub(crate) graded: u64,
    pub(crate) error: u64,
}

/// Start points of the summary's activity windows: the calendar month
/// containing `now` and the seven days before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReportingWindows {
    pub(crate) month_start: PrimitiveDateTime,
    pub(crate) week_start: PrimitiveDateTime,
}

impl ReportingWindows {
    pub(crate) fn ending_at(now: PrimitiveDateTime) -> Self {
        let today = now.date();
        let first_of_month = today - Duration::days(i64::from(today.day()) - 1);
        Self { month_start: first_of_month.midnight(), week_start: now - Duration::days(7) }
    }

    /// Worksheets created from here on cover both windows.
    pub(crate) fn earliest(&self) -> PrimitiveDateTime {
        self.month_start.min(self.week_start)
    }
}

/// Uploads in a window by creation time; `graded` counts the ones whose
/// current status is graded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActivityWindow {
    pub(crate) since: String,
    pub(crate) uploaded: usize,
    pub(crate) graded: usize,
    pub(crate) average_score: Option<u32>,
}

fn activity_window(since: PrimitiveDateTime, worksheets: &[Worksheet]) -> ActivityWindow {
    let mut uploaded = 0;
    let mut graded = 0;
    let mut rollup = Rollup::default();
    for worksheet in worksheets.iter().filter(|worksheet| worksheet.created_at >= since) {
        uploaded += 1;
        if worksheet.status != WorksheetStatus::Graded {
            continue;
        }
        graded += 1;
        if let Some(score) = worksheet_score(worksheet) {
            rollup.add(&score);
        }
    }

    ActivityWindow {
        since: format_primitive(since),
        uploaded,
        graded,
        average_score: rollup.score().map(|score| score.percentage),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FleetSummary {
    pub(crate) counts: StatusCounts,
    pub(crate) average_score: Option<u32>,
    pub(crate) average_grade: GradeLabel,
    pub(crate) grade_distribution: GradeDistribution,
    pub(crate) this_month: ActivityWindow,
    pub(crate) this_week: ActivityWindow,
    pub(crate) recent_worksheets: Vec<RecentWorksheet>,
}

/// `windowed` must hold every worksheet created since `windows.earliest()`.
pub(crate) fn fleet_summary(
    counts: &[(WorksheetStatus, u64)],
    graded: &[Worksheet],
    recent: &[Worksheet],
    windows: &ReportingWindows,
    windowed: &[Worksheet],
) -> FleetSummary {
    let mut status_counts = StatusCounts::default();
    for (status, count) in counts {
        status_counts.total += count;
        match status {
            WorksheetStatus::Uploaded => status_counts.uploaded += count,
            WorksheetStatus::Processing => status_counts.processing += count,
            WorksheetStatus::Grading => status_counts.grading += count,
            WorksheetStatus::Graded => status_counts.graded += count,
            WorksheetStatus::Error => status_counts.error += count,
        }
    }

    let mut rollup = Rollup::default();
    let mut distribution = GradeDistribution::default();
    for score in graded.iter().filter_map(worksheet_score) {
        distribution.record(score.letter_grade);
        rollup.add(&score);
    }
    let overall = rollup.score();

    FleetSummary {
        counts: status_counts,
        average_score: overall.as_ref().map(|score| score.percentage),
        average_grade: overall
            .map(|score| GradeLabel::Letter(score.letter_grade))
            .unwrap_or(GradeLabel::NotAvailable),
        grade_distribution: distribution,
        this_month: activity_window(windows.month_start, windowed),
        this_week: activity_window(windows.week_start, windowed),
        recent_worksheets: recent
            .iter()
            .map(|worksheet| RecentWorksheet {
                id: worksheet.id,
                student_name: worksheet.student_name.clone(),
                class_name: worksheet.class_name.clone(),
                status: worksheet.status,
                progress: worksheet.progress,
                percentage: worksheet.normalized_score.as_ref().map(|score| score.percentage),
                created_at: format_primitive(worksheet.created_at),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::db::models::{NewWorksheet, WorksheetMetadata};
    use crate::services::scoring::RawGradingResult;
    use time::macros::datetime;

    fn class() -> ClassRecord {
        ClassRecord {
            id: ClassId::new(),
            name: "Period 3".into(),
            subject: None,
            grade_level: Some("8".into()),
        }
    }

    fn student(name: &str) -> StudentRecord {
        StudentRecord { id: StudentId::new(), name: name.into(), email: None }
    }

    fn graded(
        class: &ClassRecord,
        student: &StudentRecord,
        earned: f64,
        possible: f64,
        errors: &[&str],
    ) -> Worksheet {
        let now = primitive_now_utc();
        let mut worksheet = Worksheet::uploaded(
            NewWorksheet {
                student_id: student.id,
                class_id: class.id,
                student_name: student.name.clone(),
                class_name: class.name.clone(),
                file_ref: "uploads/w.png".into(),
                mime_type: "image/png".into(),
                metadata: WorksheetMetadata::default(),
            },
            now,
        );
        let raw = RawGradingResult::aggregate(earned, possible)
            .with_common_errors(errors.iter().map(|item| item.to_string()).collect());
        worksheet.normalized_score = Some(normalize(&raw));
        worksheet.grading_result = Some(raw);
        worksheet.status = WorksheetStatus::Graded;
        worksheet.completed_at = Some(now);
        worksheet
    }

    #[test]
    fn class_average_is_additive_not_mean_of_percentages() {
        let class = class();
        let a = student("Ada");
        let b = student("Ben");
        let worksheets = vec![graded(&class, &a, 45.0, 50.0, &[]), graded(&class, &b, 40.0, 100.0, &[])];

        let report = class_report(&class, &[a, b], &worksheets);

        assert_eq!(report.metrics.average_score, 57);
        assert_ne!(report.metrics.average_score, 65);
        assert_eq!(report.metrics.total_points, 150.0);
        assert_eq!(report.metrics.total_points_earned, 85.0);
    }

    #[test]
    fn student_rollup_sums_points_across_worksheets() {
        let class = class();
        let a = student("Ada");
        let worksheets =
            vec![graded(&class, &a, 45.0, 50.0, &[]), graded(&class, &a, 40.0, 100.0, &[])];

        let rows = student_performance(&[a], &worksheets);
        assert_eq!(rows[0].percentage, 57);
        assert_eq!(rows[0].grade, GradeLabel::Letter(LetterGrade::F));
        assert_eq!(rows[0].total_worksheets, 2);
        assert!(rows[0].last_activity.is_some());
    }

    #[test]
    fn students_without_work_are_listed_as_not_available() {
        let class = class();
        let a = student("Ada");
        let idle = student("Zed");
        let worksheets = vec![graded(&class, &a, 9.0, 10.0, &[])];

        let report = class_report(&class, &[a, idle.clone()], &worksheets);
        let row = report
            .student_performance
            .iter()
            .find(|row| row.student_id == idle.id)
            .expect("idle student");

        assert_eq!(row.percentage, 0);
        assert_eq!(row.grade, GradeLabel::NotAvailable);
        assert!(row.needs_support);
        assert_eq!(row.last_activity, None);
        assert_eq!(report.metrics.completion_rate, 50);
        assert_eq!(report.top_performers.len(), 1);
        assert_eq!(serde_json::to_value(row.grade).expect("grade"), "N/A");
    }

    #[test]
    fn support_priority_tiers() {
        let class = class();
        let low = student("Low");
        let mid = student("Mid");
        let near = student("Near");
        let fine = student("Fine");
        let worksheets = vec![
            graded(&class, &low, 50.0, 100.0, &[]),
            graded(&class, &mid, 65.0, 100.0, &[]),
            graded(&class, &near, 75.0, 100.0, &[]),
            graded(&class, &fine, 80.0, 100.0, &[]),
        ];

        let report = class_report(&class, &[low, mid, near, fine], &worksheets);
        let flagged: Vec<(&str, SupportPriority)> = report
            .students_needing_support
            .iter()
            .map(|row| (row.student_name.as_str(), row.priority))
            .collect();

        assert_eq!(
            flagged,
            vec![
                ("Low", SupportPriority::High),
                ("Mid", SupportPriority::Medium),
                ("Near", SupportPriority::Low),
            ]
        );
    }

    #[test]
    fn top_performers_are_ranked_and_capped() {
        let class = class();
        let roster: Vec<StudentRecord> =
            ["A", "B", "C", "D", "E", "F"].iter().map(|name| student(name)).collect();
        let worksheets: Vec<Worksheet> = roster
            .iter()
            .enumerate()
            .map(|(index, student)| graded(&class, student, 50.0 + index as f64 * 10.0, 100.0, &[]))
            .collect();

        let report = class_report(&class, &roster, &worksheets);
        assert_eq!(report.top_performers.len(), 5);
        assert_eq!(report.top_performers[0].rank, 1);
        assert_eq!(report.top_performers[0].student_name, "F");
        assert_eq!(report.top_performers[0].percentage, 100);
        assert_eq!(report.top_performers[4].student_name, "B");
    }

    #[test]
    fn grade_distribution_counts_each_student_once() {
        let class = class();
        let a = student("Ada");
        let b = student("Ben");
        let idle = student("Cy");
        let worksheets =
            vec![graded(&class, &a, 95.0, 100.0, &[]), graded(&class, &b, 85.0, 100.0, &[])];

        let report = class_report(&class, &[a, b, idle], &worksheets);
        assert_eq!(
            report.grade_distribution,
            GradeDistribution { a: 1, b: 1, c: 0, d: 0, f: 1 }
        );
        assert_eq!(report.subject, "General");
    }

    #[test]
    fn common_mistakes_are_counted_and_truncated() {
        let class = class();
        let a = student("Ada");
        let mut worksheets = vec![
            graded(&class, &a, 1.0, 2.0, &["sign error", "units"]),
            graded(&class, &a, 1.0, 2.0, &["units"]),
        ];
        let many: Vec<String> = (0..12).map(|index| format!("m{index:02}")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        worksheets.push(graded(&class, &a, 1.0, 2.0, &refs));

        let mistakes = common_mistakes(&worksheets);
        assert_eq!(mistakes.len(), 10);
        assert_eq!(mistakes[0], MistakeCount { mistake: "units".into(), count: 2 });
        assert_eq!(mistakes[1].count, 1);
        assert_eq!(mistakes[1].mistake, "m00");
    }

    #[test]
    fn student_grades_are_sorted_by_name() {
        let rows = student_grades(&[student("Zoe"), student("Amy")], &[]);
        let names: Vec<&str> = rows.iter().map(|row| row.student_name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Zoe"]);
    }

    #[test]
    fn fleet_summary_rolls_up_graded_worksheets() {
        let class = class();
        let a = student("Ada");
        let graded_sheets =
            vec![graded(&class, &a, 45.0, 50.0, &[]), graded(&class, &a, 40.0, 100.0, &[])];
        let counts = vec![(WorksheetStatus::Graded, 2), (WorksheetStatus::Error, 1)];

        let windows = ReportingWindows::ending_at(primitive_now_utc());
        let summary =
            fleet_summary(&counts, &graded_sheets, &graded_sheets[..1], &windows, &graded_sheets);
        assert_eq!(summary.counts.total, 3);
        assert_eq!(summary.counts.graded, 2);
        assert_eq!(summary.counts.error, 1);
        assert_eq!(summary.average_score, Some(57));
        assert_eq!(summary.grade_distribution.a, 1);
        assert_eq!(summary.grade_distribution.f, 1);
        assert_eq!(summary.recent_worksheets.len(), 1);
    }

    #[test]
    fn empty_fleet_has_no_average() {
        let windows = ReportingWindows::ending_at(primitive_now_utc());
        let summary = fleet_summary(&[], &[], &[], &windows, &[]);
        assert_eq!(summary.average_score, None);
        assert_eq!(summary.average_grade, GradeLabel::NotAvailable);
        assert_eq!(summary.this_month.uploaded, 0);
        assert_eq!(summary.this_week.average_score, None);
    }

    #[test]
    fn reporting_windows_start_at_month_and_seven_days_back() {
        let windows = ReportingWindows::ending_at(datetime!(2024-03-03 15:30:00));
        assert_eq!(windows.month_start, datetime!(2024-03-01 00:00:00));
        assert_eq!(windows.week_start, datetime!(2024-02-25 15:30:00));
        assert_eq!(windows.earliest(), datetime!(2024-02-25 15:30:00));

        let mid_month = ReportingWindows::ending_at(datetime!(2024-03-20 09:00:00));
        assert_eq!(mid_month.earliest(), datetime!(2024-03-01 00:00:00));
    }

    #[test]
    fn activity_windows_count_uploads_and_add_scores() {
        let class = class();
        let a = student("Ada");
        let windows = ReportingWindows::ending_at(datetime!(2024-03-20 09:00:00));

        let mut last_month = graded(&class, &a, 10.0, 10.0, &[]);
        last_month.created_at = datetime!(2024-02-28 12:00:00);
        let mut early_month = graded(&class, &a, 45.0, 50.0, &[]);
        early_month.created_at = datetime!(2024-03-02 08:00:00);
        let mut this_week = graded(&class, &a, 40.0, 100.0, &[]);
        this_week.created_at = datetime!(2024-03-18 10:00:00);
        let mut failed = graded(&class, &a, 0.0, 100.0, &[]);
        failed.status = WorksheetStatus::Error;
        failed.created_at = datetime!(2024-03-19 10:00:00);
        let windowed = vec![last_month, early_month, this_week, failed];

        let summary = fleet_summary(&[], &[], &[], &windows, &windowed);

        assert_eq!(summary.this_month.uploaded, 3);
        assert_eq!(summary.this_month.graded, 2);
        assert_eq!(summary.this_month.average_score, Some(57));
        assert_eq!(summary.this_month.since, "2024-03-01T00:00:00Z");
        assert_eq!(summary.this_week.uploaded, 2);
        assert_eq!(summary.this_week.graded, 1);
        assert_eq!(summary.this_week.average_score, Some(40));
    }
}

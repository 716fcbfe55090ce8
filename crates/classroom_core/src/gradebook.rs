//! crates/classroom_core/src/gradebook.rs
//!
//! Builds a class gradebook and the teacher dashboard summary from students,
//! assignments and quiz attempts.

use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{AttemptStatus, Class, ClassAssignment, QuizAttempt, User};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GradeCell {
    Missing,
    InProgress,
    Graded { best_percentage: f64, attempts: u32, passed: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradebookColumn {
    pub assignment_id: Uuid,
    pub title: String,
    pub quiz_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradebookRow {
    pub student_id: Uuid,
    pub student_name: String,
    pub cells: Vec<GradeCell>,
    /// Mean of the graded cells, if any.
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gradebook {
    pub class_id: Uuid,
    pub columns: Vec<GradebookColumn>,
    pub rows: Vec<GradebookRow>,
}

fn is_finished(attempt: &QuizAttempt) -> bool {
    matches!(attempt.status, AttemptStatus::Completed | AttemptStatus::Reviewing)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn cell_for(attempts: &[&QuizAttempt]) -> GradeCell {
    let finished: Vec<&&QuizAttempt> = attempts.iter().filter(|a| is_finished(a)).collect();
    if let Some(best) = finished
        .iter()
        .max_by(|a, b| a.percentage.total_cmp(&b.percentage))
    {
        return GradeCell::Graded {
            best_percentage: best.percentage,
            attempts: finished.len() as u32,
            passed: finished.iter().any(|a| a.passed),
        };
    }
    if attempts.is_empty() {
        GradeCell::Missing
    } else {
        GradeCell::InProgress
    }
}

/// One row per enrolled student, one column per quiz assignment.
pub fn build_gradebook(
    class_id: Uuid,
    students: &[User],
    assignments: &[ClassAssignment],
    attempts: &[QuizAttempt],
) -> Gradebook {
    let columns: Vec<GradebookColumn> = assignments
        .iter()
        .filter(|a| a.class_id == class_id)
        .filter_map(|a| {
            a.quiz_id.map(|quiz_id| GradebookColumn {
                assignment_id: a.id,
                title: a.title.clone(),
                quiz_id,
            })
        })
        .collect();

    let mut by_student_quiz: HashMap<(Uuid, Uuid), Vec<&QuizAttempt>> = HashMap::new();
    for attempt in attempts {
        by_student_quiz
            .entry((attempt.student_id, attempt.quiz_id))
            .or_default()
            .push(attempt);
    }

    let mut enrolled: Vec<&User> = students.iter().filter(|s| s.is_enrolled_in(class_id)).collect();
    enrolled.sort_by(|a, b| {
        (a.last_name.to_lowercase(), a.first_name.to_lowercase())
            .cmp(&(b.last_name.to_lowercase(), b.first_name.to_lowercase()))
    });

    let rows = enrolled
        .into_iter()
        .map(|student| {
            let cells: Vec<GradeCell> = columns
                .iter()
                .map(|column| {
                    let attempts = by_student_quiz
                        .get(&(student.id, column.quiz_id))
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    cell_for(attempts)
                })
                .collect();
            let graded: Vec<f64> = cells
                .iter()
                .filter_map(|c| match c {
                    GradeCell::Graded { best_percentage, .. } => Some(*best_percentage),
                    _ => None,
                })
                .collect();
            let average = if graded.is_empty() {
                None
            } else {
                Some(round2(graded.iter().sum::<f64>() / graded.len() as f64))
            };
            GradebookRow {
                student_id: student.id,
                student_name: student.display_name(),
                cells,
                average,
            }
        })
        .collect();

    Gradebook {
        class_id,
        columns,
        rows,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub class_count: usize,
    pub assignment_count: usize,
    pub completed_attempts: usize,
    pub average_percentage: Option<f64>,
}

/// Totals across a teacher's classes.
pub fn summarize_dashboard(
    classes: &[Class],
    assignments: &[ClassAssignment],
    attempts: &[QuizAttempt],
) -> DashboardSummary {
    let finished: Vec<&QuizAttempt> = attempts.iter().filter(|a| is_finished(a)).collect();
    let average_percentage = if finished.is_empty() {
        None
    } else {
        Some(round2(
            finished.iter().map(|a| a.percentage).sum::<f64>() / finished.len() as f64,
        ))
    };
    DashboardSummary {
        class_count: classes.len(),
        assignment_count: assignments.len(),
        completed_attempts: finished.len(),
        average_percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoleProfile, UserStatus};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn student(first: &str, last: &str, class_ids: Vec<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", first.to_lowercase()),
            first_name: first.to_string(),
            last_name: last.to_string(),
            status: UserStatus::Active,
            profile: RoleProfile::Student {
                grade_level: Some("6".to_string()),
                class_ids,
            },
            created_at: Utc::now(),
        }
    }

    fn assignment(class_id: Uuid, quiz_id: Option<Uuid>) -> ClassAssignment {
        ClassAssignment {
            id: Uuid::new_v4(),
            class_id,
            title: "Quiz".to_string(),
            lesson_id: None,
            quiz_id,
            due_at: None,
            created_at: Utc::now(),
        }
    }

    fn attempt(student_id: Uuid, quiz_id: Uuid, status: AttemptStatus, percentage: f64) -> QuizAttempt {
        QuizAttempt {
            id: Uuid::new_v4(),
            quiz_id,
            student_id,
            status,
            answers: BTreeMap::new(),
            question_order: Vec::new(),
            results: Vec::new(),
            score: 0,
            max_score: 0,
            percentage,
            passed: percentage >= 70.0,
            started_at: Utc::now(),
            submitted_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn gradebook_takes_best_attempt_and_marks_missing() {
        let class_id = Uuid::new_v4();
        let quiz_a = Uuid::new_v4();
        let quiz_b = Uuid::new_v4();
        let grace = student("Grace", "Hopper", vec![class_id]);
        let alan = student("Alan", "Turing", vec![class_id]);
        let outsider = student("Linus", "Torvalds", vec![]);
        let assignments = vec![
            assignment(class_id, Some(quiz_a)),
            assignment(class_id, Some(quiz_b)),
            assignment(class_id, None),
        ];
        let attempts = vec![
            attempt(grace.id, quiz_a, AttemptStatus::Completed, 60.0),
            attempt(grace.id, quiz_a, AttemptStatus::Completed, 90.0),
            attempt(grace.id, quiz_b, AttemptStatus::InProgress, 0.0),
            attempt(alan.id, quiz_b, AttemptStatus::Reviewing, 50.0),
        ];

        let book = build_gradebook(
            class_id,
            &[alan.clone(), grace.clone(), outsider],
            &assignments,
            &attempts,
        );
        assert_eq!(book.columns.len(), 2);
        assert_eq!(book.rows.len(), 2);

        let grace_row = &book.rows[0];
        assert_eq!(grace_row.student_name, "Grace Hopper");
        assert_eq!(
            grace_row.cells[0],
            GradeCell::Graded {
                best_percentage: 90.0,
                attempts: 2,
                passed: true
            }
        );
        assert_eq!(grace_row.cells[1], GradeCell::InProgress);
        assert_eq!(grace_row.average, Some(90.0));

        let alan_row = &book.rows[1];
        assert_eq!(alan_row.cells[0], GradeCell::Missing);
        assert_eq!(alan_row.average, Some(50.0));
    }

    #[test]
    fn dashboard_averages_finished_attempts() {
        let quiz = Uuid::new_v4();
        let attempts = vec![
            attempt(Uuid::new_v4(), quiz, AttemptStatus::Completed, 80.0),
            attempt(Uuid::new_v4(), quiz, AttemptStatus::Completed, 65.0),
            attempt(Uuid::new_v4(), quiz, AttemptStatus::InProgress, 0.0),
        ];
        let summary = summarize_dashboard(&[], &[assignment(Uuid::new_v4(), Some(quiz))], &attempts);
        assert_eq!(summary.completed_attempts, 2);
        assert_eq!(summary.assignment_count, 1);
        assert_eq!(summary.average_percentage, Some(72.5));
    }
}

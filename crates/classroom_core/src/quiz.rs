//! crates/classroom_core/src/quiz.rs
//!
//! Quiz answers, scoring and the attempt state machine
//! (not started -> in progress -> completed -> reviewing).

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::domain::{
    AttemptStatus, QuestionResult, QuestionType, Quiz, QuizAttempt, QuizQuestion,
};
use crate::ports::ShortAnswerGrader;

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuizError {
    #[error("The quiz has already been started")]
    AlreadyStarted,
    #[error("The quiz is not in progress")]
    NotInProgress,
    #[error("The attempt has not been completed")]
    NotCompleted,
    #[error("All {allowed} allowed attempts have been used")]
    AttemptsExhausted { allowed: u32 },
    #[error("Question {0} is not part of this quiz")]
    UnknownQuestion(Uuid),
    #[error("Time is up for this attempt")]
    TimeExpired,
    #[error("The quiz has no questions")]
    NoQuestions,
    #[error("Invalid quiz: {0}")]
    InvalidQuiz(String),
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),
}

//=========================================================================================
// Answers
//=========================================================================================

/// A submitted answer. Single-choice questions take the option id as text,
/// multiple-select takes a list of option ids, fill-blank a list of strings
/// and short-answer free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    List(Vec<String>),
}

/// Result of checking an answer locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Correct,
    Incorrect,
    /// Short answers go to the grading function.
    NeedsGrading {
        expected: Vec<String>,
        response: String,
    },
}

impl Check {
    fn from_bool(correct: bool) -> Self {
        if correct {
            Check::Correct
        } else {
            Check::Incorrect
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Case-insensitive, whitespace-trimmed exact match against any accepted answer.
pub fn exact_match(expected: &[String], response: &str) -> bool {
    let response = normalize(response);
    !response.is_empty() && expected.iter().any(|e| normalize(e) == response)
}

fn correct_texts(question: &QuizQuestion) -> Vec<String> {
    let mut options: Vec<_> = question.correct_options().collect();
    options.sort_by_key(|o| o.position);
    options.into_iter().map(|o| o.text.clone()).collect()
}

/// Compares an answer with the question's correct options. An answer whose
/// shape does not fit the question type is incorrect.
pub fn check_answer(question: &QuizQuestion, answer: Option<&Answer>) -> Check {
    let Some(answer) = answer else {
        return Check::Incorrect;
    };

    match (question.question_type, answer) {
        (QuestionType::MultipleChoice | QuestionType::TrueFalse, Answer::Text(selected)) => {
            let Ok(selected) = Uuid::parse_str(selected.trim()) else {
                return Check::Incorrect;
            };
            Check::from_bool(question.correct_options().any(|o| o.id == selected))
        }
        (QuestionType::MultipleSelect, Answer::List(selected)) => {
            let parsed: Result<HashSet<Uuid>, _> =
                selected.iter().map(|s| Uuid::parse_str(s.trim())).collect();
            let Ok(parsed) = parsed else {
                return Check::Incorrect;
            };
            let correct: HashSet<Uuid> = question.correct_options().map(|o| o.id).collect();
            Check::from_bool(parsed == correct)
        }
        (QuestionType::FillBlank, Answer::List(blanks)) => {
            let expected = correct_texts(question);
            Check::from_bool(
                blanks.len() == expected.len()
                    && blanks
                        .iter()
                        .zip(expected.iter())
                        .all(|(given, wanted)| normalize(given) == normalize(wanted)),
            )
        }
        (QuestionType::ShortAnswer, Answer::Text(response)) => {
            if response.trim().is_empty() {
                Check::Incorrect
            } else {
                Check::NeedsGrading {
                    expected: correct_texts(question),
                    response: response.clone(),
                }
            }
        }
        _ => Check::Incorrect,
    }
}

//=========================================================================================
// Grading
//=========================================================================================

/// Per-question results plus how many short answers fell back to exact match.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeReport {
    pub results: Vec<QuestionResult>,
    pub fallbacks: usize,
}

/// Grades every question. Short answers are judged by `grader`; when that call
/// fails the answer is compared by exact match instead.
pub async fn grade_answers(
    questions: &[QuizQuestion],
    answers: &BTreeMap<Uuid, Answer>,
    grader: &dyn ShortAnswerGrader,
) -> GradeReport {
    let mut results = Vec::with_capacity(questions.len());
    let mut fallbacks = 0;

    for question in questions {
        let is_correct = match check_answer(question, answers.get(&question.id)) {
            Check::Correct => true,
            Check::Incorrect => false,
            Check::NeedsGrading { expected, response } => {
                match grader
                    .grade_short_answer(&question.prompt, &expected, &response)
                    .await
                {
                    Ok(verdict) => verdict,
                    Err(_) => {
                        fallbacks += 1;
                        exact_match(&expected, &response)
                    }
                }
            }
        };
        results.push(QuestionResult {
            question_id: question.id,
            is_correct,
            points_earned: if is_correct { question.points } else { 0 },
        });
    }

    GradeReport { results, fallbacks }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub passed: bool,
}

pub fn summarize(questions: &[QuizQuestion], results: &[QuestionResult], pass_threshold: f64) -> Score {
    let max_score: u32 = questions.iter().map(|q| q.points).sum();
    let score: u32 = results.iter().map(|r| r.points_earned).sum();
    let percentage = if max_score == 0 {
        0.0
    } else {
        (f64::from(score) * 10_000.0 / f64::from(max_score)).round() / 100.0
    };
    Score {
        score,
        max_score,
        percentage,
        passed: max_score > 0 && percentage >= pass_threshold,
    }
}

//=========================================================================================
// Authoring Validation
//=========================================================================================

pub fn validate_quiz(quiz: &Quiz) -> Result<(), QuizError> {
    if quiz.title.trim().is_empty() {
        return Err(QuizError::InvalidQuiz("title is required".to_string()));
    }
    if !(0.0..=100.0).contains(&quiz.pass_threshold) {
        return Err(QuizError::InvalidQuiz(
            "pass threshold must be between 0 and 100".to_string(),
        ));
    }
    if quiz.time_limit_minutes == Some(0) {
        return Err(QuizError::InvalidQuiz("time limit must be positive".to_string()));
    }
    if quiz.attempts_allowed == Some(0) {
        return Err(QuizError::InvalidQuiz("attempts allowed must be positive".to_string()));
    }
    Ok(())
}

pub fn validate_question(question: &QuizQuestion) -> Result<(), QuizError> {
    let invalid = |reason: &str| Err(QuizError::InvalidQuestion(reason.to_string()));

    if question.prompt.trim().is_empty() {
        return invalid("prompt is required");
    }
    if question.points == 0 {
        return invalid("points must be at least 1");
    }
    let correct = question.correct_options().count();
    match question.question_type {
        QuestionType::MultipleChoice if question.options.len() < 2 || correct != 1 => {
            invalid("multiple choice needs at least two options and exactly one correct option")
        }
        QuestionType::TrueFalse if question.options.len() != 2 || correct != 1 => {
            invalid("true/false needs two options and exactly one correct option")
        }
        QuestionType::MultipleSelect if question.options.len() < 2 || correct == 0 => {
            invalid("multiple select needs at least two options and one correct option")
        }
        QuestionType::ShortAnswer if correct == 0 => invalid("short answer needs an accepted answer"),
        QuestionType::FillBlank if correct == 0 || correct != question.options.len() => {
            invalid("every fill-in-the-blank option is the answer for one blank")
        }
        _ => Ok(()),
    }
}

//=========================================================================================
// Student-Facing Question View
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentOption {
    pub id: Uuid,
    pub text: String,
}

/// A question as sent to a student: correct flags and accepted answers removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentQuestion {
    pub id: Uuid,
    pub question_type: QuestionType,
    pub prompt: String,
    pub points: u32,
    pub options: Vec<StudentOption>,
    pub blank_count: usize,
}

impl From<&QuizQuestion> for StudentQuestion {
    fn from(question: &QuizQuestion) -> Self {
        let reveals_answers = matches!(
            question.question_type,
            QuestionType::ShortAnswer | QuestionType::FillBlank
        );
        let options = if reveals_answers {
            Vec::new()
        } else {
            question
                .options
                .iter()
                .map(|o| StudentOption {
                    id: o.id,
                    text: o.text.clone(),
                })
                .collect()
        };
        Self {
            id: question.id,
            question_type: question.question_type,
            prompt: question.prompt.clone(),
            points: question.points,
            options,
            blank_count: if question.question_type == QuestionType::FillBlank {
                question.options.len()
            } else {
                0
            },
        }
    }
}

//=========================================================================================
// Attempt State Machine
//=========================================================================================

/// The live state of one student's quiz attempt.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: Quiz,
    questions: Vec<QuizQuestion>,
    attempt: Option<QuizAttempt>,
    status: AttemptStatus,
    deadline: Option<DateTime<Utc>>,
    online: bool,
    /// Answers changed since the last remote save.
    dirty: bool,
    /// Answers changed while offline; flushed on reconnect.
    pending_save: bool,
}

impl QuizSession {
    pub fn new(quiz: Quiz, mut questions: Vec<QuizQuestion>) -> Self {
        questions.sort_by_key(|q| q.position);
        Self {
            quiz,
            questions,
            attempt: None,
            status: AttemptStatus::NotStarted,
            deadline: None,
            online: true,
            dirty: false,
            pending_save: false,
        }
    }

    /// Rebuilds the session for an attempt loaded from the store.
    pub fn resume(quiz: Quiz, questions: Vec<QuizQuestion>, attempt: QuizAttempt) -> Self {
        let mut session = Self::new(quiz, questions);
        if !attempt.question_order.is_empty() {
            let order = &attempt.question_order;
            session
                .questions
                .sort_by_key(|q| order.iter().position(|id| *id == q.id).unwrap_or(usize::MAX));
        }
        session.deadline = session.deadline_from(attempt.started_at);
        session.status = attempt.status;
        session.attempt = Some(attempt);
        session
    }

    fn deadline_from(&self, started_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.quiz
            .time_limit_minutes
            .map(|minutes| started_at + Duration::minutes(i64::from(minutes)))
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// Questions in the order presented to the student.
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn attempt(&self) -> Option<&QuizAttempt> {
        self.attempt.as_ref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn has_pending_save(&self) -> bool {
        self.pending_save
    }

    pub fn answers(&self) -> BTreeMap<Uuid, Answer> {
        self.attempt
            .as_ref()
            .map(|a| a.answers.clone())
            .unwrap_or_default()
    }

    /// Starts a new attempt. Shuffles questions and options when the quiz asks for it.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        student_id: Uuid,
        prior_attempts: u32,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<&QuizAttempt, QuizError> {
        if self.status != AttemptStatus::NotStarted {
            return Err(QuizError::AlreadyStarted);
        }
        if let Some(allowed) = self.quiz.attempts_allowed {
            if prior_attempts >= allowed {
                return Err(QuizError::AttemptsExhausted { allowed });
            }
        }
        if self.questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }

        if self.quiz.shuffle_questions {
            self.questions.shuffle(rng);
        }
        if self.quiz.shuffle_options {
            for question in self
                .questions
                .iter_mut()
                .filter(|q| q.question_type != QuestionType::FillBlank)
            {
                question.options.shuffle(rng);
            }
        }

        self.deadline = self.deadline_from(now);
        self.status = AttemptStatus::InProgress;
        let attempt = self.attempt.insert(QuizAttempt {
            id: Uuid::new_v4(),
            quiz_id: self.quiz.id,
            student_id,
            status: AttemptStatus::InProgress,
            answers: BTreeMap::new(),
            question_order: self.questions.iter().map(|q| q.id).collect(),
            results: Vec::new(),
            score: 0,
            max_score: self.questions.iter().map(|q| q.points).sum(),
            percentage: 0.0,
            passed: false,
            started_at: now,
            submitted_at: None,
            updated_at: now,
        });
        Ok(attempt)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Records an answer for one question.
    pub fn answer(
        &mut self,
        question_id: Uuid,
        answer: Answer,
        now: DateTime<Utc>,
    ) -> Result<(), QuizError> {
        if self.status != AttemptStatus::InProgress {
            return Err(QuizError::NotInProgress);
        }
        if self.is_expired(now) {
            return Err(QuizError::TimeExpired);
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(QuizError::UnknownQuestion(question_id));
        }
        let attempt = self.attempt.as_mut().ok_or(QuizError::NotInProgress)?;
        attempt.answers.insert(question_id, answer);
        attempt.updated_at = now;
        self.dirty = true;
        if !self.online {
            self.pending_save = true;
        }
        Ok(())
    }

    /// Replaces in-progress answers with a restored draft, ignoring answers
    /// for questions that are no longer part of the quiz.
    pub fn restore_answers(&mut self, answers: BTreeMap<Uuid, Answer>) -> Result<usize, QuizError> {
        if self.status != AttemptStatus::InProgress {
            return Err(QuizError::NotInProgress);
        }
        let known: HashSet<Uuid> = self.questions.iter().map(|q| q.id).collect();
        let attempt = self.attempt.as_mut().ok_or(QuizError::NotInProgress)?;
        let mut restored = 0;
        for (question_id, answer) in answers {
            if known.contains(&question_id) {
                attempt.answers.insert(question_id, answer);
                restored += 1;
            }
        }
        if restored > 0 {
            self.dirty = true;
        }
        Ok(restored)
    }

    pub fn go_offline(&mut self) {
        self.online = false;
        if self.dirty {
            self.pending_save = true;
        }
    }

    /// Returns whether answers need flushing to the store now.
    pub fn go_online(&mut self) -> bool {
        self.online = true;
        let flush = self.pending_save || self.dirty;
        self.pending_save = false;
        flush && self.status == AttemptStatus::InProgress
    }

    /// Whether the periodic autosave should write to the store.
    pub fn needs_autosave(&self) -> bool {
        self.online && self.dirty && self.status == AttemptStatus::InProgress
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
        self.pending_save = false;
    }

    /// Applies grading results and moves the attempt to `Completed`.
    pub fn complete(&mut self, report: &GradeReport, now: DateTime<Utc>) -> Result<&QuizAttempt, QuizError> {
        if self.status != AttemptStatus::InProgress {
            return Err(QuizError::NotInProgress);
        }
        let score = summarize(&self.questions, &report.results, self.quiz.pass_threshold);
        let attempt = self.attempt.as_mut().ok_or(QuizError::NotInProgress)?;
        attempt.results = report.results.clone();
        attempt.score = score.score;
        attempt.max_score = score.max_score;
        attempt.percentage = score.percentage;
        attempt.passed = score.passed;
        attempt.status = AttemptStatus::Completed;
        attempt.submitted_at = Some(now);
        attempt.updated_at = now;
        self.status = AttemptStatus::Completed;
        self.dirty = false;
        self.pending_save = false;
        Ok(attempt)
    }

    pub fn begin_review(&mut self) -> Result<(), QuizError> {
        match self.status {
            AttemptStatus::Completed | AttemptStatus::Reviewing => {
                self.status = AttemptStatus::Reviewing;
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.status = AttemptStatus::Reviewing;
                }
                Ok(())
            }
            _ => Err(QuizError::NotCompleted),
        }
    }
}

/// Grades the session's answers and completes the attempt.
pub async fn submit(
    session: &mut QuizSession,
    grader: &dyn ShortAnswerGrader,
    now: DateTime<Utc>,
) -> Result<(QuizAttempt, GradeReport), QuizError> {
    if session.status() != AttemptStatus::InProgress {
        return Err(QuizError::NotInProgress);
    }
    let answers = session.answers();
    let report = grade_answers(session.questions(), &answers, grader).await;
    let attempt = session.complete(&report, now)?.clone();
    Ok((attempt, report))
}

//=========================================================================================
// Review
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionReview {
    pub question_id: Uuid,
    pub question_type: QuestionType,
    pub prompt: String,
    pub answer: Option<Answer>,
    pub correct_answers: Vec<String>,
    pub is_correct: bool,
    pub points: u32,
    pub points_earned: u32,
}

/// Recomputes correctness for display. Deterministic question types are
/// re-checked; short answers keep the stored grading result.
pub fn review(questions: &[QuizQuestion], attempt: &QuizAttempt) -> Vec<QuestionReview> {
    let mut ordered: Vec<&QuizQuestion> = questions.iter().collect();
    ordered.sort_by_key(|q| {
        let presented = attempt.question_order.iter().position(|id| *id == q.id);
        (presented.unwrap_or(usize::MAX), q.position)
    });

    ordered
        .into_iter()
        .map(|question| {
            let answer = attempt.answers.get(&question.id);
            let is_correct = match check_answer(question, answer) {
                Check::Correct => true,
                Check::Incorrect => false,
                Check::NeedsGrading { expected, response } => attempt
                    .results
                    .iter()
                    .find(|r| r.question_id == question.id)
                    .map_or_else(|| exact_match(&expected, &response), |r| r.is_correct),
            };
            QuestionReview {
                question_id: question.id,
                question_type: question.question_type,
                prompt: question.prompt.clone(),
                answer: answer.cloned(),
                correct_answers: correct_texts(question),
                is_correct,
                points: question.points,
                points_earned: if is_correct { question.points } else { 0 },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuizOption;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingGrader;

    #[async_trait]
    impl ShortAnswerGrader for FailingGrader {
        async fn grade_short_answer(&self, _: &str, _: &[String], _: &str) -> PortResult<bool> {
            Err(PortError::Unexpected("grading function unavailable".to_string()))
        }
    }

    struct GenerousGrader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ShortAnswerGrader for GenerousGrader {
        async fn grade_short_answer(&self, _: &str, _: &[String], _: &str) -> PortResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    fn option(text: &str, is_correct: bool, position: i32) -> QuizOption {
        QuizOption {
            id: Uuid::new_v4(),
            text: text.to_string(),
            is_correct,
            position,
        }
    }

    fn question(question_type: QuestionType, options: Vec<QuizOption>, position: i32) -> QuizQuestion {
        QuizQuestion {
            id: Uuid::new_v4(),
            quiz_id: Uuid::nil(),
            question_type,
            prompt: format!("Question {}", position),
            points: 1,
            position,
            options,
        }
    }

    fn quiz() -> Quiz {
        Quiz {
            id: Uuid::new_v4(),
            lesson_component_id: None,
            title: "Cells".to_string(),
            time_limit_minutes: Some(1),
            attempts_allowed: Some(2),
            shuffle_questions: false,
            shuffle_options: false,
            pass_threshold: 60.0,
            created_by: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    fn ids(question: &QuizQuestion, correct: bool) -> Vec<String> {
        question
            .options
            .iter()
            .filter(|o| o.is_correct == correct)
            .map(|o| o.id.to_string())
            .collect()
    }

    #[test]
    fn multiple_choice_matches_the_correct_option() {
        let q = question(
            QuestionType::MultipleChoice,
            vec![option("Mitochondria", true, 0), option("Ribosome", false, 1)],
            0,
        );
        let right = Answer::Text(ids(&q, true)[0].clone());
        let wrong = Answer::Text(ids(&q, false)[0].clone());
        assert_eq!(check_answer(&q, Some(&right)), Check::Correct);
        assert_eq!(check_answer(&q, Some(&wrong)), Check::Incorrect);
        assert_eq!(check_answer(&q, None), Check::Incorrect);
    }

    #[test]
    fn multiple_select_is_order_independent_and_exact() {
        let q = question(
            QuestionType::MultipleSelect,
            vec![
                option("Hydrogen", true, 0),
                option("Oxygen", true, 1),
                option("Gold", false, 2),
            ],
            0,
        );
        let mut correct = ids(&q, true);
        correct.reverse();
        assert_eq!(check_answer(&q, Some(&Answer::List(correct.clone()))), Check::Correct);

        let subset = Answer::List(correct[..1].to_vec());
        assert_eq!(check_answer(&q, Some(&subset)), Check::Incorrect);

        let mut superset = correct.clone();
        superset.extend(ids(&q, false));
        assert_eq!(check_answer(&q, Some(&Answer::List(superset))), Check::Incorrect);
    }

    #[test]
    fn wrong_answer_shape_is_incorrect() {
        let select = question(
            QuestionType::MultipleSelect,
            vec![option("A", true, 0), option("B", false, 1)],
            0,
        );
        let single = Answer::Text(ids(&select, true)[0].clone());
        assert_eq!(check_answer(&select, Some(&single)), Check::Incorrect);

        let choice = question(
            QuestionType::TrueFalse,
            vec![option("True", true, 0), option("False", false, 1)],
            1,
        );
        let list = Answer::List(ids(&choice, true));
        assert_eq!(check_answer(&choice, Some(&list)), Check::Incorrect);
        assert_eq!(check_answer(&choice, Some(&Answer::Text("true".into()))), Check::Incorrect);

        let short = question(QuestionType::ShortAnswer, vec![option("photosynthesis", true, 0)], 2);
        assert_eq!(
            check_answer(&short, Some(&Answer::List(vec!["photosynthesis".into()]))),
            Check::Incorrect
        );
    }

    #[test]
    fn fill_blank_compares_each_blank_in_order() {
        let q = question(
            QuestionType::FillBlank,
            vec![option("H2O", true, 1), option("water", true, 0)],
            0,
        );
        let answer = Answer::List(vec![" Water ".into(), "h2o".into()]);
        assert_eq!(check_answer(&q, Some(&answer)), Check::Correct);
        let swapped = Answer::List(vec!["h2o".into(), "water".into()]);
        assert_eq!(check_answer(&q, Some(&swapped)), Check::Incorrect);
        let short = Answer::List(vec!["water".into()]);
        assert_eq!(check_answer(&q, Some(&short)), Check::Incorrect);
    }

    #[tokio::test]
    async fn short_answer_falls_back_to_exact_match_when_grader_fails() {
        let q = question(QuestionType::ShortAnswer, vec![option("Photosynthesis", true, 0)], 0);
        let mut answers = BTreeMap::new();
        answers.insert(q.id, Answer::Text("  photosynthesis ".into()));

        let report = grade_answers(std::slice::from_ref(&q), &answers, &FailingGrader).await;
        assert_eq!(report.fallbacks, 1);
        assert!(report.results[0].is_correct);

        answers.insert(q.id, Answer::Text("respiration".into()));
        let report = grade_answers(std::slice::from_ref(&q), &answers, &FailingGrader).await;
        assert!(!report.results[0].is_correct);
    }

    #[tokio::test]
    async fn short_answer_uses_grader_verdict() {
        let q = question(QuestionType::ShortAnswer, vec![option("evaporation", true, 0)], 0);
        let mut answers = BTreeMap::new();
        answers.insert(q.id, Answer::Text("water turns into vapour".into()));
        let grader = GenerousGrader {
            calls: AtomicUsize::new(0),
        };

        let report = grade_answers(std::slice::from_ref(&q), &answers, &grader).await;
        assert_eq!(grader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.fallbacks, 0);
        assert!(report.results[0].is_correct);
    }

    #[test]
    fn summarize_computes_percentage_and_pass() {
        let questions = vec![
            question(QuestionType::ShortAnswer, vec![option("a", true, 0)], 0),
            question(QuestionType::ShortAnswer, vec![option("b", true, 0)], 1),
            question(QuestionType::ShortAnswer, vec![option("c", true, 0)], 2),
        ];
        let results: Vec<QuestionResult> = questions
            .iter()
            .enumerate()
            .map(|(i, q)| QuestionResult {
                question_id: q.id,
                is_correct: i < 2,
                points_earned: u32::from(i < 2),
            })
            .collect();
        let score = summarize(&questions, &results, 60.0);
        assert_eq!(score.score, 2);
        assert_eq!(score.max_score, 3);
        assert!((score.percentage - 66.67).abs() < 1e-9);
        assert!(score.passed);
        assert!(!summarize(&[], &[], 0.0).passed);
    }

    #[test]
    fn question_validation_checks_correct_options() {
        let bad = question(
            QuestionType::MultipleChoice,
            vec![option("A", true, 0), option("B", true, 1)],
            0,
        );
        assert!(matches!(validate_question(&bad), Err(QuizError::InvalidQuestion(_))));
        let good = question(
            QuestionType::TrueFalse,
            vec![option("True", false, 0), option("False", true, 1)],
            0,
        );
        assert!(validate_question(&good).is_ok());
        let mut bad_quiz = quiz();
        bad_quiz.pass_threshold = 120.0;
        assert!(validate_quiz(&bad_quiz).is_err());
    }

    #[test]
    fn student_view_hides_answers() {
        let fill = question(QuestionType::FillBlank, vec![option("water", true, 0)], 0);
        let view = StudentQuestion::from(&fill);
        assert!(view.options.is_empty());
        assert_eq!(view.blank_count, 1);

        let choice = question(
            QuestionType::MultipleChoice,
            vec![option("A", true, 0), option("B", false, 1)],
            1,
        );
        let json = serde_json::to_value(StudentQuestion::from(&choice)).unwrap();
        assert!(json.to_string().find("is_correct").is_none());
        assert_eq!(json["options"].as_array().map(Vec::len), Some(2));
    }

    fn started_session(now: DateTime<Utc>) -> QuizSession {
        let questions = vec![
            question(
                QuestionType::MultipleChoice,
                vec![option("A", true, 0), option("B", false, 1)],
                0,
            ),
            question(QuestionType::ShortAnswer, vec![option("cell", true, 0)], 1),
        ];
        let mut session = QuizSession::new(quiz(), questions);
        let mut rng = StdRng::seed_from_u64(7);
        session.start(Uuid::new_v4(), 0, now, &mut rng).unwrap();
        session
    }

    #[test]
    fn start_respects_attempt_limit_and_sets_deadline() {
        let now = Utc::now();
        let mut session = QuizSession::new(quiz(), vec![question(
            QuestionType::ShortAnswer,
            vec![option("x", true, 0)],
            0,
        )]);
        let mut rng = StdRng::seed_from_u64(1);
        let err = session.start(Uuid::new_v4(), 2, now, &mut rng).unwrap_err();
        assert_eq!(err, QuizError::AttemptsExhausted { allowed: 2 });

        session.start(Uuid::new_v4(), 1, now, &mut rng).unwrap();
        assert_eq!(session.status(), AttemptStatus::InProgress);
        assert_eq!(session.deadline(), Some(now + Duration::minutes(1)));
        assert_eq!(session.start(Uuid::new_v4(), 0, now, &mut rng).unwrap_err(), QuizError::AlreadyStarted);
    }

    #[test]
    fn shuffling_keeps_every_question() {
        let mut settings = quiz();
        settings.shuffle_questions = true;
        settings.shuffle_options = true;
        let questions: Vec<QuizQuestion> = (0..6)
            .map(|i| question(QuestionType::MultipleChoice, vec![option("A", true, 0), option("B", false, 1)], i))
            .collect();
        let mut expected: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let mut session = QuizSession::new(settings, questions);
        let mut rng = StdRng::seed_from_u64(42);
        let attempt = session.start(Uuid::new_v4(), 0, Utc::now(), &mut rng).unwrap();
        let mut order = attempt.question_order.clone();
        order.sort();
        expected.sort();
        assert_eq!(order, expected);
    }

    #[test]
    fn answers_rejected_after_deadline_or_for_unknown_questions() {
        let now = Utc::now();
        let mut session = started_session(now);
        let first = session.questions()[0].id;

        let stranger = Uuid::new_v4();
        assert_eq!(
            session.answer(stranger, Answer::Text("x".into()), now),
            Err(QuizError::UnknownQuestion(stranger))
        );
        assert!(session.answer(first, Answer::Text("x".into()), now).is_ok());
        let later = now + Duration::seconds(61);
        assert!(session.is_expired(later));
        assert_eq!(session.answer(first, Answer::Text("y".into()), later), Err(QuizError::TimeExpired));
    }

    #[test]
    fn offline_answers_are_flushed_on_reconnect() {
        let now = Utc::now();
        let mut session = started_session(now);
        let first = session.questions()[0].id;

        session.go_offline();
        assert!(!session.has_pending_save());
        session.answer(first, Answer::Text("x".into()), now).unwrap();
        assert!(session.has_pending_save());
        assert!(!session.needs_autosave());

        assert!(session.go_online());
        assert!(!session.has_pending_save());
        assert!(session.needs_autosave());
        session.mark_saved();
        assert!(!session.needs_autosave());
        assert!(!session.go_online());
    }

    #[tokio::test]
    async fn submit_completes_once_and_allows_review() {
        let now = Utc::now();
        let mut session = started_session(now);
        let choice = session
            .questions()
            .iter()
            .find(|q| q.question_type == QuestionType::MultipleChoice)
            .unwrap()
            .clone();
        let correct = ids(&choice, true)[0].clone();
        session.answer(choice.id, Answer::Text(correct), now).unwrap();

        let (attempt, report) = submit(&mut session, &FailingGrader, now).await.unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(attempt.status, AttemptStatus::Completed);
        assert_eq!(attempt.score, 1);
        assert!((attempt.percentage - 50.0).abs() < 1e-9);
        assert!(!attempt.passed);

        let again = submit(&mut session, &FailingGrader, now).await;
        assert_eq!(again.unwrap_err(), QuizError::NotInProgress);

        session.begin_review().unwrap();
        assert_eq!(session.status(), AttemptStatus::Reviewing);

        let reviewed = review(session.questions(), session.attempt().unwrap());
        let choice_review = reviewed.iter().find(|r| r.question_id == choice.id).unwrap();
        assert!(choice_review.is_correct);
        assert_eq!(choice_review.correct_answers, vec!["A".to_string()]);
    }

    #[test]
    fn review_requires_completion() {
        let mut session = started_session(Utc::now());
        assert_eq!(session.begin_review(), Err(QuizError::NotCompleted));
    }

    #[test]
    fn restore_ignores_unknown_questions() {
        let now = Utc::now();
        let mut session = started_session(now);
        let mut draft = BTreeMap::new();
        draft.insert(session.questions()[1].id, Answer::Text("cell".into()));
        draft.insert(Uuid::new_v4(), Answer::Text("stale".into()));
        assert_eq!(session.restore_answers(draft), Ok(1));
        assert_eq!(session.answers().len(), 1);
    }
}

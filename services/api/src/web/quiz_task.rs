//! services/api/src/web/quiz_task.rs
//!
//! The live side of a quiz attempt: applies client messages to the
//! `QuizSession`, keeps local drafts, autosaves to the store and runs the
//! countdown that submits the attempt when time runs out.

use chrono::{DateTime, Utc};
use classroom_core::domain::AttemptStatus;
use classroom_core::drafts::{restorable, AnswerDraft};
use classroom_core::ports::{DraftStore, PortError, QuizRepository, ShortAnswerGrader};
use classroom_core::quiz::{self, Answer, QuizError, QuizSession, StudentQuestion};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::web::protocol::{QuizClientMessage, QuizServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum QuizTaskError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Port(#[from] PortError),
    #[error("No quiz attempt is open on this connection")]
    NoAttempt,
    #[error("This attempt belongs to another student")]
    NotYourAttempt,
}

/// What the connection loop should do after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// An attempt is now in progress; start the clock.
    Started,
    /// The attempt was submitted; stop the clock.
    Finished,
}

pub struct QuizRuntime {
    student_id: Uuid,
    session: Mutex<Option<QuizSession>>,
    quizzes: Arc<dyn QuizRepository>,
    drafts: Arc<dyn DraftStore>,
    grader: Arc<dyn ShortAnswerGrader>,
    outbox: mpsc::UnboundedSender<QuizServerMessage>,
}

fn attempt_started(session: &QuizSession, attempt_id: Uuid) -> QuizServerMessage {
    QuizServerMessage::AttemptStarted {
        attempt_id,
        questions: session.questions().iter().map(StudentQuestion::from).collect(),
        deadline: session.deadline(),
        answers: session.answers(),
    }
}

impl QuizRuntime {
    pub fn new(
        student_id: Uuid,
        quizzes: Arc<dyn QuizRepository>,
        drafts: Arc<dyn DraftStore>,
        grader: Arc<dyn ShortAnswerGrader>,
        outbox: mpsc::UnboundedSender<QuizServerMessage>,
    ) -> Self {
        Self {
            student_id,
            session: Mutex::new(None),
            quizzes,
            drafts,
            grader,
            outbox,
        }
    }

    fn send(&self, message: QuizServerMessage) {
        if self.outbox.send(message).is_err() {
            warn!("Quiz socket for student {} is gone; dropping message", self.student_id);
        }
    }

    /// Applies one client message. Failures are reported to the client and
    /// leave the session as it was.
    pub async fn handle_message(&self, message: QuizClientMessage) -> Flow {
        let result = match message {
            QuizClientMessage::Start { quiz_id } => self.start(quiz_id).await,
            QuizClientMessage::Resume { attempt_id } => self.resume(attempt_id).await,
            QuizClientMessage::Answer {
                question_id,
                answer,
            } => self.answer(question_id, answer).await,
            QuizClientMessage::Offline => self.go_offline().await,
            QuizClientMessage::Online => self.go_online().await,
            QuizClientMessage::Submit => self.finish(false).await,
            QuizClientMessage::Review => self.review().await,
        };
        match result {
            Ok(flow) => flow,
            Err(e) => {
                warn!("Quiz message rejected for student {}: {}", self.student_id, e);
                self.send(QuizServerMessage::Error {
                    message: e.to_string(),
                });
                Flow::Continue
            }
        }
    }

    async fn start(&self, quiz_id: Uuid) -> Result<Flow, QuizTaskError> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return Err(QuizError::AlreadyStarted.into());
        }
        let quiz = self.quizzes.get_quiz(quiz_id).await?;
        let questions = self.quizzes.list_questions(quiz_id).await?;
        let prior_attempts = self.quizzes.count_attempts(quiz_id, self.student_id).await?;

        let mut session = QuizSession::new(quiz, questions);
        let attempt = {
            let mut rng = rand::rng();
            session
                .start(self.student_id, prior_attempts, Utc::now(), &mut rng)?
                .clone()
        };
        self.quizzes.create_attempt(&attempt).await?;
        info!(
            "Student {} started attempt {} on quiz {}",
            self.student_id, attempt.id, quiz_id
        );

        self.send(attempt_started(&session, attempt.id));
        *guard = Some(session);
        Ok(Flow::Started)
    }

    async fn resume(&self, attempt_id: Uuid) -> Result<Flow, QuizTaskError> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return Err(QuizError::AlreadyStarted.into());
        }
        let attempt = self.quizzes.get_attempt(attempt_id).await?;
        if attempt.student_id != self.student_id {
            return Err(QuizTaskError::NotYourAttempt);
        }
        if attempt.status != AttemptStatus::InProgress {
            return Err(QuizError::NotInProgress.into());
        }
        let quiz = self.quizzes.get_quiz(attempt.quiz_id).await?;
        let questions = self.quizzes.list_questions(attempt.quiz_id).await?;
        let mut session = QuizSession::resume(quiz, questions, attempt);

        let draft = self.drafts.load_draft(attempt_id).await?;
        let restored = match restorable(draft, Utc::now()) {
            Some(answers) => session.restore_answers(answers)?,
            None => 0,
        };
        info!(
            "Student {} resumed attempt {} ({} answers restored)",
            self.student_id, attempt_id, restored
        );

        self.send(attempt_started(&session, attempt_id));
        if restored > 0 {
            self.send(QuizServerMessage::DraftRestored { restored });
            let flushed = session.go_online();
            if flushed {
                self.write_answers(&mut session).await?;
            }
            self.send(QuizServerMessage::ConnectionRestored { flushed });
        }
        *guard = Some(session);
        Ok(Flow::Started)
    }

    async fn answer(&self, question_id: Uuid, answer: Answer) -> Result<Flow, QuizTaskError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(QuizTaskError::NoAttempt)?;
        let now = Utc::now();
        session.answer(question_id, answer, now)?;

        let attempt_id = session.attempt().map(|a| a.id).ok_or(QuizTaskError::NoAttempt)?;
        let draft = AnswerDraft::new(attempt_id, session.answers(), now);
        if let Err(e) = self.drafts.save_draft(draft).await {
            warn!("Failed to write draft for attempt {}: {}", attempt_id, e);
        }

        self.send(QuizServerMessage::AnswerRecorded { question_id });
        if !session.is_online() {
            self.send(QuizServerMessage::SavePending);
        }
        Ok(Flow::Continue)
    }

    async fn go_offline(&self) -> Result<Flow, QuizTaskError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(QuizTaskError::NoAttempt)?;
        session.go_offline();
        self.send(QuizServerMessage::SavePending);
        Ok(Flow::Continue)
    }

    async fn go_online(&self) -> Result<Flow, QuizTaskError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(QuizTaskError::NoAttempt)?;
        let flushed = session.go_online();
        if flushed {
            self.write_answers(session).await?;
        }
        self.send(QuizServerMessage::ConnectionRestored { flushed });
        Ok(Flow::Continue)
    }

    async fn write_answers(&self, session: &mut QuizSession) -> Result<DateTime<Utc>, QuizTaskError> {
        let attempt_id = session.attempt().map(|a| a.id).ok_or(QuizTaskError::NoAttempt)?;
        let now = Utc::now();
        self.quizzes
            .save_attempt_answers(attempt_id, &session.answers(), now)
            .await?;
        session.mark_saved();
        Ok(now)
    }

    /// Writes changed answers to the store if the session is online.
    pub async fn autosave(&self) -> Result<(), QuizTaskError> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Ok(());
        };
        if session.needs_autosave() {
            let at = self.write_answers(session).await?;
            self.send(QuizServerMessage::Saved { at });
        }
        Ok(())
    }

    /// Grades and stores the attempt. Only the first stored submit succeeds;
    /// if the store write fails the session stays in progress.
    pub async fn finish(&self, auto: bool) -> Result<Flow, QuizTaskError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(QuizTaskError::NoAttempt)?;
        let mut graded = session.clone();
        let (attempt, report) = quiz::submit(&mut graded, self.grader.as_ref(), Utc::now()).await?;

        self.quizzes.finalize_attempt(&attempt).await?;
        *session = graded;
        if let Err(e) = self.drafts.clear_draft(attempt.id).await {
            warn!("Failed to clear draft for attempt {}: {}", attempt.id, e);
        }
        if report.fallbacks > 0 {
            warn!(
                "Attempt {}: {} short answers graded by exact match",
                attempt.id, report.fallbacks
            );
        }
        info!(
            "Attempt {} submitted{}: {}/{}",
            attempt.id,
            if auto { " at the time limit" } else { "" },
            attempt.score,
            attempt.max_score
        );

        self.send(QuizServerMessage::Submitted {
            attempt_id: attempt.id,
            score: attempt.score,
            max_score: attempt.max_score,
            percentage: attempt.percentage,
            passed: attempt.passed,
            auto,
            fallbacks: report.fallbacks,
        });
        Ok(Flow::Finished)
    }

    async fn review(&self) -> Result<Flow, QuizTaskError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(QuizTaskError::NoAttempt)?;
        let mut reviewing = session.clone();
        reviewing.begin_review()?;
        let attempt = reviewing.attempt().ok_or(QuizTaskError::NoAttempt)?;
        self.quizzes.finalize_attempt(attempt).await?;
        self.send(QuizServerMessage::Review {
            questions: quiz::review(reviewing.questions(), attempt),
        });
        *session = reviewing;
        Ok(Flow::Continue)
    }

    /// Time left on the attempt, if it has a limit.
    pub async fn remaining(&self) -> Option<Duration> {
        let guard = self.session.lock().await;
        guard
            .as_ref()
            .and_then(|s| s.remaining(Utc::now()))
            .and_then(|d| d.to_std().ok())
    }
}

//=========================================================================================
// Clock
//=========================================================================================

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Runs the autosave tick and, for timed quizzes, submits the attempt when the
/// countdown reaches zero. Ends on cancellation or after the timed submit.
/// A timed submit the store rejects is retried every `autosave_every`.
pub async fn run_clock(runtime: Arc<QuizRuntime>, token: CancellationToken, autosave_every: Duration) {
    let mut deadline = runtime.remaining().await.map(|left| Instant::now() + left);
    let mut ticker = tokio::time::interval_at(Instant::now() + autosave_every, autosave_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = runtime.autosave().await {
                    error!("Autosave failed: {}", e);
                }
            }
            _ = sleep_until_deadline(deadline) => {
                info!("Time limit reached; submitting");
                match runtime.finish(true).await {
                    Ok(_) => break,
                    Err(QuizTaskError::Port(e)) => {
                        error!("Timed submit not stored, retrying: {}", e);
                        deadline = Some(Instant::now() + autosave_every);
                    }
                    Err(e) => {
                        warn!("Timed submit skipped: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::drafts::InMemoryDraftStore;
    use async_trait::async_trait;
    use classroom_core::domain::{QuestionType, Quiz, QuizAttempt, QuizOption, QuizQuestion};
    use classroom_core::ports::PortResult;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeQuizzes {
        quiz: Quiz,
        questions: Vec<QuizQuestion>,
        attempt: std::sync::Mutex<Option<QuizAttempt>>,
        saves: AtomicUsize,
        finalized: AtomicUsize,
        /// Number of upcoming `finalize_attempt` calls that fail.
        finalize_failures: AtomicUsize,
    }

    #[async_trait]
    impl QuizRepository for FakeQuizzes {
        async fn create_quiz(&self, quiz: Quiz) -> PortResult<Quiz> {
            Ok(quiz)
        }
        async fn get_quiz(&self, quiz_id: Uuid) -> PortResult<Quiz> {
            if quiz_id == self.quiz.id {
                Ok(self.quiz.clone())
            } else {
                Err(PortError::NotFound(format!("Quiz {} not found", quiz_id)))
            }
        }
        async fn add_question(&self, question: QuizQuestion) -> PortResult<QuizQuestion> {
            Ok(question)
        }
        async fn list_questions(&self, _quiz_id: Uuid) -> PortResult<Vec<QuizQuestion>> {
            Ok(self.questions.clone())
        }
        async fn count_attempts(&self, _quiz_id: Uuid, _student_id: Uuid) -> PortResult<u32> {
            Ok(0)
        }
        async fn create_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
            *self.attempt.lock().unwrap() = Some(attempt.clone());
            Ok(())
        }
        async fn get_attempt(&self, attempt_id: Uuid) -> PortResult<QuizAttempt> {
            self.attempt
                .lock()
                .unwrap()
                .clone()
                .filter(|a| a.id == attempt_id)
                .ok_or_else(|| PortError::NotFound(format!("Attempt {} not found", attempt_id)))
        }
        async fn save_attempt_answers(
            &self,
            _attempt_id: Uuid,
            _answers: &BTreeMap<Uuid, Answer>,
            _updated_at: DateTime<Utc>,
        ) -> PortResult<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn finalize_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
            let failing = self
                .finalize_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(PortError::Unexpected("database unavailable".into()));
            }
            self.finalized.fetch_add(1, Ordering::SeqCst);
            *self.attempt.lock().unwrap() = Some(attempt.clone());
            Ok(())
        }
        async fn list_attempts_for_quizzes(&self, _quiz_ids: &[Uuid]) -> PortResult<Vec<QuizAttempt>> {
            Ok(self.attempt.lock().unwrap().clone().into_iter().collect())
        }
    }

    struct ExactGrader;

    #[async_trait]
    impl ShortAnswerGrader for ExactGrader {
        async fn grade_short_answer(&self, _prompt: &str, expected: &[String], answer: &str) -> PortResult<bool> {
            Ok(quiz::exact_match(expected, answer))
        }
    }

    fn fake_quizzes(time_limit_minutes: Option<u32>) -> Arc<FakeQuizzes> {
        let quiz = Quiz {
            id: Uuid::new_v4(),
            lesson_component_id: None,
            title: "Cell biology".into(),
            time_limit_minutes,
            attempts_allowed: None,
            shuffle_questions: false,
            shuffle_options: false,
            pass_threshold: 70.0,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let question = QuizQuestion {
            id: Uuid::new_v4(),
            quiz_id: quiz.id,
            question_type: QuestionType::ShortAnswer,
            prompt: "Which organelle produces most of a cell's ATP?".into(),
            points: 1,
            position: 0,
            options: vec![QuizOption {
                id: Uuid::new_v4(),
                text: "mitochondria".into(),
                is_correct: true,
                position: 0,
            }],
        };
        Arc::new(FakeQuizzes {
            quiz,
            questions: vec![question],
            attempt: std::sync::Mutex::new(None),
            saves: AtomicUsize::new(0),
            finalized: AtomicUsize::new(0),
            finalize_failures: AtomicUsize::new(0),
        })
    }

    fn runtime(
        student_id: Uuid,
        repo: &Arc<FakeQuizzes>,
        drafts: &Arc<InMemoryDraftStore>,
    ) -> (Arc<QuizRuntime>, mpsc::UnboundedReceiver<QuizServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = QuizRuntime::new(student_id, repo.clone(), drafts.clone(), Arc::new(ExactGrader), tx);
        (Arc::new(runtime), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<QuizServerMessage>) -> Vec<QuizServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn question_id(repo: &FakeQuizzes) -> Uuid {
        repo.questions[0].id
    }

    #[tokio::test(start_paused = true)]
    async fn time_limit_submits_exactly_once() {
        let repo = fake_quizzes(Some(1));
        let drafts = Arc::new(InMemoryDraftStore::new());
        let (runtime, mut rx) = runtime(Uuid::new_v4(), &repo, &drafts);

        let flow = runtime
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;
        assert_eq!(flow, Flow::Started);

        let token = CancellationToken::new();
        let clock = tokio::spawn(run_clock(runtime.clone(), token.clone(), Duration::from_secs(30)));
        tokio::time::sleep(Duration::from_secs(61)).await;
        clock.await.unwrap();

        assert_eq!(repo.finalized.load(Ordering::SeqCst), 1);
        let submitted = drain(&mut rx)
            .into_iter()
            .filter(|m| matches!(m, QuizServerMessage::Submitted { auto: true, .. }))
            .count();
        assert_eq!(submitted, 1);

        // A late manual submit is rejected.
        assert_eq!(runtime.handle_message(QuizClientMessage::Submit).await, Flow::Continue);
        assert_eq!(repo.finalized.load(Ordering::SeqCst), 1);
        assert!(matches!(drain(&mut rx).as_slice(), [QuizServerMessage::Error { .. }]));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_clock_never_submits() {
        let repo = fake_quizzes(Some(1));
        let drafts = Arc::new(InMemoryDraftStore::new());
        let (runtime, _rx) = runtime(Uuid::new_v4(), &repo, &drafts);
        runtime
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;

        let token = CancellationToken::new();
        let clock = tokio::spawn(run_clock(runtime.clone(), token.clone(), Duration::from_secs(30)));
        tokio::time::sleep(Duration::from_secs(10)).await;
        token.cancel();
        clock.await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(repo.finalized.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn offline_answers_flush_on_reconnect() {
        let repo = fake_quizzes(None);
        let drafts = Arc::new(InMemoryDraftStore::new());
        let (runtime, mut rx) = runtime(Uuid::new_v4(), &repo, &drafts);
        runtime
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;

        runtime.handle_message(QuizClientMessage::Offline).await;
        runtime
            .handle_message(QuizClientMessage::Answer {
                question_id: question_id(&repo),
                answer: Answer::Text("Mitochondria".into()),
            })
            .await;
        runtime.autosave().await.unwrap();
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);

        runtime.handle_message(QuizClientMessage::Online).await;
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);

        let messages = drain(&mut rx);
        assert!(messages.contains(&QuizServerMessage::SavePending));
        assert!(messages.contains(&QuizServerMessage::ConnectionRestored { flushed: true }));
    }

    #[tokio::test]
    async fn autosave_writes_only_changed_answers() {
        let repo = fake_quizzes(None);
        let drafts = Arc::new(InMemoryDraftStore::new());
        let (runtime, _rx) = runtime(Uuid::new_v4(), &repo, &drafts);
        runtime
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;

        runtime.autosave().await.unwrap();
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);

        runtime
            .handle_message(QuizClientMessage::Answer {
                question_id: question_id(&repo),
                answer: Answer::Text("ribosome".into()),
            })
            .await;
        runtime.autosave().await.unwrap();
        runtime.autosave().await.unwrap();
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resume_restores_the_local_draft() {
        let repo = fake_quizzes(None);
        let drafts = Arc::new(InMemoryDraftStore::new());
        let student_id = Uuid::new_v4();

        let (first, mut first_rx) = runtime(student_id, &repo, &drafts);
        first
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;
        first
            .handle_message(QuizClientMessage::Answer {
                question_id: question_id(&repo),
                answer: Answer::Text("mitochondria".into()),
            })
            .await;
        let attempt_id = match drain(&mut first_rx).first() {
            Some(QuizServerMessage::AttemptStarted { attempt_id, .. }) => *attempt_id,
            other => panic!("expected attempt_started, got {:?}", other),
        };
        drop(first);

        let (second, mut second_rx) = runtime(student_id, &repo, &drafts);
        let flow = second
            .handle_message(QuizClientMessage::Resume { attempt_id })
            .await;
        assert_eq!(flow, Flow::Started);

        let messages = drain(&mut second_rx);
        assert!(messages.contains(&QuizServerMessage::DraftRestored { restored: 1 }));
        assert!(messages.contains(&QuizServerMessage::ConnectionRestored { flushed: true }));
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn another_students_attempt_cannot_be_resumed() {
        let repo = fake_quizzes(None);
        let drafts = Arc::new(InMemoryDraftStore::new());
        let (owner, mut owner_rx) = runtime(Uuid::new_v4(), &repo, &drafts);
        owner
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;
        let attempt_id = match drain(&mut owner_rx).first() {
            Some(QuizServerMessage::AttemptStarted { attempt_id, .. }) => *attempt_id,
            other => panic!("expected attempt_started, got {:?}", other),
        };

        let (intruder, mut intruder_rx) = runtime(Uuid::new_v4(), &repo, &drafts);
        let flow = intruder
            .handle_message(QuizClientMessage::Resume { attempt_id })
            .await;
        assert_eq!(flow, Flow::Continue);
        assert!(matches!(
            drain(&mut intruder_rx).as_slice(),
            [QuizServerMessage::Error { .. }]
        ));
    }

    #[tokio::test]
    async fn submit_grades_then_review_follows() {
        let repo = fake_quizzes(None);
        let drafts = Arc::new(InMemoryDraftStore::new());
        let (runtime, mut rx) = runtime(Uuid::new_v4(), &repo, &drafts);
        runtime
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;
        runtime
            .handle_message(QuizClientMessage::Answer {
                question_id: question_id(&repo),
                answer: Answer::Text("  Mitochondria ".into()),
            })
            .await;
        drain(&mut rx);

        assert_eq!(runtime.handle_message(QuizClientMessage::Submit).await, Flow::Finished);
        match drain(&mut rx).as_slice() {
            [QuizServerMessage::Submitted {
                score,
                max_score,
                passed,
                auto,
                ..
            }] => {
                assert_eq!((*score, *max_score), (1, 1));
                assert!(*passed);
                assert!(!*auto);
            }
            other => panic!("expected a single submitted message, got {:?}", other),
        }

        runtime.handle_message(QuizClientMessage::Review).await;
        match drain(&mut rx).as_slice() {
            [QuizServerMessage::Review { questions }] => {
                assert_eq!(questions.len(), 1);
                assert!(questions[0].is_correct);
            }
            other => panic!("expected a review, got {:?}", other),
        }
        // Submit plus the move to review.
        assert_eq!(repo.finalized.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_store_write_leaves_submit_retryable() {
        let repo = fake_quizzes(None);
        repo.finalize_failures.store(1, Ordering::SeqCst);
        let drafts = Arc::new(InMemoryDraftStore::new());
        let (runtime, mut rx) = runtime(Uuid::new_v4(), &repo, &drafts);
        runtime
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;
        runtime
            .handle_message(QuizClientMessage::Answer {
                question_id: question_id(&repo),
                answer: Answer::Text("mitochondria".into()),
            })
            .await;
        drain(&mut rx);

        assert_eq!(runtime.handle_message(QuizClientMessage::Submit).await, Flow::Continue);
        assert!(matches!(drain(&mut rx).as_slice(), [QuizServerMessage::Error { .. }]));
        assert_eq!(repo.finalized.load(Ordering::SeqCst), 0);

        // Answers can still change before the retry.
        runtime
            .handle_message(QuizClientMessage::Answer {
                question_id: question_id(&repo),
                answer: Answer::Text("Mitochondria".into()),
            })
            .await;
        drain(&mut rx);

        assert_eq!(runtime.handle_message(QuizClientMessage::Submit).await, Flow::Finished);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [QuizServerMessage::Submitted { score: 1, .. }]
        ));
        assert_eq!(repo.finalized.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_submit_is_retried_after_a_store_failure() {
        let repo = fake_quizzes(Some(1));
        repo.finalize_failures.store(1, Ordering::SeqCst);
        let drafts = Arc::new(InMemoryDraftStore::new());
        let (runtime, mut rx) = runtime(Uuid::new_v4(), &repo, &drafts);
        runtime
            .handle_message(QuizClientMessage::Start { quiz_id: repo.quiz.id })
            .await;

        let token = CancellationToken::new();
        let clock = tokio::spawn(run_clock(runtime.clone(), token.clone(), Duration::from_secs(30)));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(repo.finalized.load(Ordering::SeqCst), 0);
        assert!(!clock.is_finished());

        tokio::time::sleep(Duration::from_secs(30)).await;
        clock.await.unwrap();

        assert_eq!(repo.finalized.load(Ordering::SeqCst), 1);
        let submitted = drain(&mut rx)
            .into_iter()
            .filter(|m| matches!(m, QuizServerMessage::Submitted { auto: true, .. }))
            .count();
        assert_eq!(submitted, 1);
    }
}

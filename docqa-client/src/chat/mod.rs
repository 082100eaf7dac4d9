//! Chat session: an ordered transcript with at most one outstanding question.
//!
//! Starting a new chat bumps an epoch. An answer that arrives for an older
//! epoch is dropped without touching the transcript or the busy flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ChatSettings;
use crate::models::{ChatTurn, Question, TurnId};
use crate::services::metrics::record_answer;
use crate::services::AnswerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    AwaitingAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyQuestion,
    AwaitingAnswer,
}

pub enum SubmitOutcome {
    Accepted(PendingAnswer),
    Ignored(IgnoreReason),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Answered,
    /// The call failed and the failure reply was appended.
    Failed,
    /// The chat was reset before the answer arrived.
    Discarded,
}

/// An accepted question whose answer is still on its way.
pub struct PendingAnswer {
    pub turn_id: TurnId,
    task: JoinHandle<AnswerOutcome>,
}

impl PendingAnswer {
    pub async fn settled(self) -> AnswerOutcome {
        self.task.await.unwrap_or(AnswerOutcome::Discarded)
    }
}

struct ChatState {
    transcript: Vec<ChatTurn>,
    phase: ChatPhase,
    epoch: u64,
    next_turn_id: u64,
}

impl ChatState {
    fn next_id(&mut self) -> TurnId {
        let id = TurnId(self.next_turn_id);
        self.next_turn_id += 1;
        id
    }
}

struct ChatInner {
    state: Mutex<ChatState>,
    answers: Arc<dyn AnswerService>,
    settings: ChatSettings,
    transcript_len: watch::Sender<usize>,
}

#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<ChatInner>,
}

impl ChatSession {
    pub fn new(answers: Arc<dyn AnswerService>, settings: ChatSettings) -> Self {
        let mut state = ChatState {
            transcript: Vec::new(),
            phase: ChatPhase::Idle,
            epoch: 0,
            next_turn_id: 1,
        };
        let greeting = ChatTurn::assistant(state.next_id(), settings.greeting.clone(), Vec::new());
        state.transcript.push(greeting);

        let (transcript_len, _) = watch::channel(state.transcript.len());
        Self {
            inner: Arc::new(ChatInner {
                state: Mutex::new(state),
                answers,
                settings,
                transcript_len,
            }),
        }
    }

    /// Append the question and ask the answering service. Blank questions,
    /// and questions sent while an answer is pending, are ignored.
    pub fn submit(&self, question: Question) -> SubmitOutcome {
        if question.text.trim().is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::EmptyQuestion);
        }

        let (epoch, turn_id) = {
            let mut state = self.lock();
            if state.phase == ChatPhase::AwaitingAnswer {
                tracing::debug!("Ignoring question while an answer is pending");
                return SubmitOutcome::Ignored(IgnoreReason::AwaitingAnswer);
            }

            let turn_id = state.next_id();
            state.transcript.push(ChatTurn::user(turn_id, question.text.clone()));
            state.phase = ChatPhase::AwaitingAnswer;
            self.publish(&state);
            (state.epoch, turn_id)
        };

        let this = self.clone();
        let task = tokio::spawn(async move { this.await_answer(epoch, question).await });

        SubmitOutcome::Accepted(PendingAnswer { turn_id, task })
    }

    /// Reset to a transcript holding only the greeting. An answer still in
    /// flight is abandoned.
    pub fn new_chat(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.phase = ChatPhase::Idle;
        let greeting = ChatTurn::assistant(
            state.next_id(),
            self.inner.settings.greeting.clone(),
            Vec::new(),
        );
        state.transcript = vec![greeting];
        self.publish(&state);
        tracing::info!(epoch = state.epoch, "Started new chat");
    }

    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.lock().transcript.clone()
    }

    pub fn phase(&self) -> ChatPhase {
        self.lock().phase
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.phase() == ChatPhase::AwaitingAnswer
    }

    /// Transcript length, published after every append or reset.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.inner.transcript_len.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ChatState) {
        self.inner.transcript_len.send_replace(state.transcript.len());
    }

    async fn await_answer(&self, epoch: u64, question: Question) -> AnswerOutcome {
        let result = self.inner.answers.ask(&question).await;

        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!(epoch, current = state.epoch, "Discarding answer for a previous chat");
            record_answer("discarded");
            return AnswerOutcome::Discarded;
        }

        let id = state.next_id();
        let outcome = match result {
            Ok(answer) => {
                state
                    .transcript
                    .push(ChatTurn::assistant(id, answer.text, answer.sources));
                record_answer("answered");
                AnswerOutcome::Answered
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to get an answer");
                state.transcript.push(ChatTurn::assistant(
                    id,
                    self.inner.settings.failure_reply.clone(),
                    Vec::new(),
                ));
                record_answer("failed");
                AnswerOutcome::Failed
            }
        };
        state.phase = ChatPhase::Idle;
        self.publish(&state);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, Role, SourceRef};
    use crate::services::fakes::FakeAnswerService;
    use std::time::Duration;

    fn session(answers: FakeAnswerService) -> (ChatSession, Arc<FakeAnswerService>) {
        let answers = Arc::new(answers);
        (ChatSession::new(answers.clone(), ChatSettings::default()), answers)
    }

    fn accepted(outcome: SubmitOutcome) -> PendingAnswer {
        match outcome {
            SubmitOutcome::Accepted(pending) => pending,
            SubmitOutcome::Ignored(reason) => panic!("question ignored: {:?}", reason),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn starts_with_greeting() {
        let (chat, _) = session(FakeAnswerService::new());
        let transcript = chat.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, Role::Assistant);
        assert!(transcript[0].content.starts_with("Hello! I'm ready"));
        assert_eq!(chat.phase(), ChatPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn question_and_answer_round_trip() {
        let (chat, answers) =
            session(FakeAnswerService::new().reply(Duration::from_millis(200), "Revenue was $4M."));

        let pending = accepted(chat.submit(Question::new("What was revenue?")));
        assert!(chat.is_awaiting_answer());
        let transcript = chat.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].role, Role::User);
        assert_eq!(transcript[1].content, "What was revenue?");
        assert_eq!(transcript[1].id, pending.turn_id);

        assert_eq!(pending.settled().await, AnswerOutcome::Answered);
        let transcript = chat.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2].content, "Revenue was $4M.");
        assert!(transcript[2].sources.is_none());
        assert_eq!(chat.phase(), ChatPhase::Idle);

        assert_eq!(answers.questions()[0].text, "What was revenue?");
        assert!(transcript.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test(start_paused = true)]
    async fn question_is_kept_as_typed() {
        let (chat, answers) = session(FakeAnswerService::new().reply(Duration::ZERO, "ok"));

        let pending = accepted(chat.submit(Question::new("  What was revenue?\n")));
        assert_eq!(chat.transcript()[1].content, "  What was revenue?\n");

        pending.settled().await;
        assert_eq!(answers.questions()[0].text, "  What was revenue?\n");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_question_is_ignored() {
        let (chat, answers) = session(FakeAnswerService::new());
        let outcome = chat.submit(Question::new("   "));

        assert!(matches!(outcome, SubmitOutcome::Ignored(IgnoreReason::EmptyQuestion)));
        assert_eq!(chat.transcript().len(), 1);
        assert_eq!(chat.phase(), ChatPhase::Idle);
        assert!(answers.questions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_question_while_pending_is_ignored() {
        let (chat, answers) =
            session(FakeAnswerService::new().reply(Duration::from_secs(1), "First answer"));

        let pending = accepted(chat.submit(Question::new("First?")));
        let second = chat.submit(Question::new("Second?"));
        assert!(matches!(second, SubmitOutcome::Ignored(IgnoreReason::AwaitingAnswer)));
        assert_eq!(chat.transcript().len(), 2);

        pending.settled().await;
        assert_eq!(answers.questions().len(), 1);
        assert_eq!(chat.transcript().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_appends_fixed_reply() {
        let (chat, _) = session(FakeAnswerService::new().fail(Duration::from_millis(50)));

        let pending = accepted(chat.submit(Question::new("Anything?")));
        assert_eq!(pending.settled().await, AnswerOutcome::Failed);

        let transcript = chat.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2].role, Role::Assistant);
        assert_eq!(transcript[2].content, "Failed to get response from backend.");
        assert_eq!(chat.phase(), ChatPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_sources_are_kept_in_order() {
        let sources = vec![
            SourceRef {
                excerpt: "Net income rose".into(),
                page: 4,
                relevance_score: 0.93,
            },
            SourceRef {
                excerpt: "Costs fell".into(),
                page: 9,
                relevance_score: 0.71,
            },
        ];
        let (chat, _) = session(FakeAnswerService::new().reply_with(
            Duration::ZERO,
            Answer {
                text: "Income rose while costs fell.".into(),
                sources: sources.clone(),
            },
        ));

        accepted(chat.submit(Question::new("Why did margin improve?")))
            .settled()
            .await;
        assert_eq!(chat.transcript()[2].sources, Some(sources));
    }

    #[tokio::test(start_paused = true)]
    async fn new_chat_discards_late_answer() {
        let (chat, _) = session(
            FakeAnswerService::new()
                .reply(Duration::from_millis(500), "Late answer")
                .reply(Duration::from_millis(100), "Fresh answer"),
        );

        let stale = accepted(chat.submit(Question::new("Old question")));
        chat.new_chat();

        let transcript = chat.transcript();
        assert_eq!(transcript.len(), 1);
        assert!(transcript[0].content.starts_with("Hello!"));
        assert_eq!(chat.phase(), ChatPhase::Idle);

        let fresh = accepted(chat.submit(Question::new("New question")));
        assert_eq!(fresh.settled().await, AnswerOutcome::Answered);
        assert_eq!(stale.settled().await, AnswerOutcome::Discarded);

        let contents: Vec<String> = chat.transcript().into_iter().map(|t| t.content).collect();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1], "New question");
        assert_eq!(contents[2], "Fresh answer");
        assert_eq!(chat.phase(), ChatPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn new_chat_is_idempotent_on_fresh_session() {
        let (chat, _) = session(FakeAnswerService::new());
        chat.new_chat();
        chat.new_chat();

        let transcript = chat.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, Role::Assistant);
        assert_eq!(chat.phase(), ChatPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn turn_ids_keep_increasing_across_resets() {
        let (chat, _) = session(FakeAnswerService::new().reply(Duration::ZERO, "ok"));
        let first_greeting = chat.transcript()[0].id;

        accepted(chat.submit(Question::new("q"))).settled().await;
        let last_before_reset = chat.transcript()[2].id;
        chat.new_chat();

        let greeting = chat.transcript()[0].id;
        assert!(greeting > last_before_reset);
        assert!(last_before_reset > first_greeting);
    }

    #[tokio::test(start_paused = true)]
    async fn transcript_signal_follows_appends_and_resets() {
        let (chat, _) = session(FakeAnswerService::new().reply(Duration::from_millis(10), "ok"));
        let mut lengths = chat.subscribe();
        assert_eq!(*lengths.borrow_and_update(), 1);

        let pending = accepted(chat.submit(Question::new("q")));
        assert!(lengths.has_changed().unwrap());
        assert_eq!(*lengths.borrow_and_update(), 2);

        pending.settled().await;
        assert_eq!(*lengths.borrow_and_update(), 3);

        chat.new_chat();
        assert_eq!(*lengths.borrow_and_update(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scoped_question_reaches_service() {
        let (chat, answers) = session(FakeAnswerService::new().reply(Duration::ZERO, "ok"));
        accepted(chat.submit(Question::new("Summarize").scoped_to("doc-2")))
            .settled()
            .await;
        assert_eq!(answers.questions()[0].document_id.as_deref(), Some("doc-2"));
    }
}

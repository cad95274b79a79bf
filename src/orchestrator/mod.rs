//! Conversation orchestrator - drives the two-agent dialogue
//!
//! START → (SPEAK → RECORD → DELIVER → PACE)* → STOP
//!
//! A producer task advances the turn loop and pushes each completed turn
//! onto a bounded channel; the caller drains it as a [`TurnStream`].
//! Cancellation is cooperative: `stop()` flips a flag that the loop checks
//! between turns, so an in-flight turn still completes and is delivered.

use crate::agent::Agent;
use crate::error::DialogueError;
use crate::models::{ConversationState, ConversationStatus, FailurePolicy, StopReason, Turn};
use crate::Result;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify, OwnedMutexGuard, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod roster;
pub use roster::Roster;

pub const DEFAULT_MAX_TURNS: usize = 10;
pub const DEFAULT_TURN_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Upper bound on transcript length per conversation
    pub max_turns: usize,
    /// Pause after each delivered turn; zero disables pacing
    pub turn_delay: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            turn_delay: DEFAULT_TURN_DELAY,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    agents: Vec<String>,
    conversation_id: Option<Uuid>,
    stop_reason: Option<StopReason>,
}

struct Shared {
    config: ConversationConfig,
    roster: Arc<Mutex<Roster>>,
    transcript: RwLock<Vec<Turn>>,
    lifecycle: RwLock<Lifecycle>,
    active: AtomicBool,
    stop_requested: Notify,
    turn_index: AtomicUsize,
    conversations_started: AtomicU64,
}

/// Orchestrates one conversation at a time between the first two agents
/// of its roster. Cheap to clone; clones share the same conversation.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    inner: Arc<Shared>,
}

impl ConversationOrchestrator {
    pub fn new(config: ConversationConfig) -> Self {
        Self::from_roster(config, Roster::new())
    }

    pub fn with_agents(config: ConversationConfig, agents: impl IntoIterator<Item = Agent>) -> Self {
        let mut roster = Roster::new();
        for agent in agents {
            roster.add(agent);
        }
        Self::from_roster(config, roster)
    }

    fn from_roster(config: ConversationConfig, roster: Roster) -> Self {
        let lifecycle = Lifecycle {
            agents: roster.names(),
            ..Lifecycle::default()
        };

        Self {
            inner: Arc::new(Shared {
                config,
                roster: Arc::new(Mutex::new(roster)),
                transcript: RwLock::new(Vec::new()),
                lifecycle: RwLock::new(lifecycle),
                active: AtomicBool::new(false),
                stop_requested: Notify::new(),
                turn_index: AtomicUsize::new(0),
                conversations_started: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.inner.config
    }

    /// Register an agent. Fails while a conversation holds the roster.
    pub async fn add_agent(&self, agent: Agent) -> Result<()> {
        let mut roster = self.inner.roster.try_lock().map_err(|_| {
            DialogueError::ConversationInProgress(
                "cannot change the roster while a conversation is running".to_string(),
            )
        })?;

        let name = agent.name().to_string();
        if roster.add(agent).is_some() {
            warn!(agent = %name, "Replaced existing agent with the same name");
        } else {
            info!(agent = %name, roster_size = roster.len(), "Agent registered");
        }
        self.inner.lifecycle.write().await.agents = roster.names();

        Ok(())
    }

    /// Start a new conversation seeded with `initial_prompt`.
    ///
    /// Fails with a configuration error when fewer than two agents are
    /// registered, and with `ConversationInProgress` while another
    /// conversation is running. Neither failure touches the transcript.
    pub async fn start(&self, initial_prompt: impl Into<String>) -> Result<TurnStream> {
        let initial_prompt = initial_prompt.into();
        let shared = &self.inner;

        if shared.active.load(Ordering::SeqCst) {
            return Err(DialogueError::ConversationInProgress(
                "stop the current conversation first".to_string(),
            ));
        }

        let epoch = shared.conversations_started.load(Ordering::SeqCst);
        let roster = match Arc::clone(&shared.roster).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                // A stopped conversation is still finishing its in-flight turn
                debug!("Waiting for the previous conversation to release the roster");
                Arc::clone(&shared.roster).lock_owned().await
            }
        };

        if shared.conversations_started.load(Ordering::SeqCst) != epoch
            || shared.active.load(Ordering::SeqCst)
        {
            return Err(DialogueError::ConversationInProgress(
                "another conversation started first".to_string(),
            ));
        }

        if roster.len() < 2 {
            return Err(DialogueError::ConfigurationError(format!(
                "Need at least 2 agents for a conversation, {} registered",
                roster.len()
            )));
        }

        if roster.len() > 2 {
            warn!(
                agents = ?roster.names(),
                "More than two agents registered; only the first two will speak"
            );
        }

        let conversation_id = Uuid::new_v4();

        shared.transcript.write().await.clear();
        {
            let mut lifecycle = shared.lifecycle.write().await;
            lifecycle.conversation_id = Some(conversation_id);
            lifecycle.stop_reason = None;
        }
        shared.turn_index.store(0, Ordering::SeqCst);
        shared.conversations_started.fetch_add(1, Ordering::SeqCst);
        shared.active.store(true, Ordering::SeqCst);

        info!(
            %conversation_id,
            agents = ?roster.names(),
            max_turns = shared.config.max_turns,
            "Conversation started"
        );

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(run_conversation(
            Arc::clone(shared),
            roster,
            initial_prompt,
            tx,
            conversation_id,
        ));

        Ok(TurnStream {
            conversation_id,
            inner: ReceiverStream::new(rx),
        })
    }

    /// Request a cooperative stop; takes effect before the next turn begins
    pub fn stop(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            info!(
                turn_index = self.turn_index(),
                "Stop requested; conversation ends after the current turn"
            );
        }
        // Wakes a producer that is pacing or waiting for the consumer
        self.inner.stop_requested.notify_waiters();
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn turn_index(&self) -> usize {
        self.inner.turn_index.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConversationState {
        if self.is_active() {
            ConversationState::Running
        } else if self.inner.conversations_started.load(Ordering::SeqCst) == 0 {
            ConversationState::Idle
        } else {
            ConversationState::Stopped
        }
    }

    /// Snapshot of the transcript so far
    pub async fn history(&self) -> Vec<Turn> {
        self.inner.transcript.read().await.clone()
    }

    /// Transcript as `[timestamp] agent_name: message` lines
    pub async fn export(&self) -> String {
        self.inner
            .transcript
            .read()
            .await
            .iter()
            .map(Turn::export_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn status(&self) -> ConversationStatus {
        let lifecycle = self.inner.lifecycle.read().await;

        ConversationStatus {
            state: self.state(),
            conversation_id: lifecycle.conversation_id,
            turn_index: self.turn_index(),
            max_turns: self.inner.config.max_turns,
            agents: lifecycle.agents.clone(),
            stop_reason: lifecycle.stop_reason,
        }
    }

    /// Why the most recent conversation ended, if it has
    pub async fn stop_reason(&self) -> Option<StopReason> {
        self.inner.lifecycle.read().await.stop_reason
    }
}

/// Producer loop. Owns the roster for the whole conversation.
async fn run_conversation(
    shared: Arc<Shared>,
    mut roster: OwnedMutexGuard<Roster>,
    initial_prompt: String,
    tx: mpsc::Sender<Turn>,
    conversation_id: Uuid,
) {
    let config = &shared.config;
    let mut current_message = initial_prompt;

    let reason = loop {
        if !shared.active.load(Ordering::SeqCst) {
            break StopReason::Stopped;
        }

        let turn_index = shared.turn_index.load(Ordering::SeqCst);
        if turn_index >= config.max_turns {
            break StopReason::Completed;
        }

        let speaker = roster.speaker_mut(turn_index);
        let turn = speaker.respond(&current_message).await;
        let failed = turn.failed;

        info!(
            %conversation_id,
            turn = turn_index,
            agent = %turn.agent_name,
            failed,
            "Turn produced"
        );

        shared.transcript.write().await.push(turn.clone());
        current_message = turn.message.clone();
        shared.turn_index.store(turn_index + 1, Ordering::SeqCst);

        if tx.send(turn).await.is_err() {
            warn!(%conversation_id, "Turn consumer went away; stopping conversation");
            break StopReason::Abandoned;
        }

        if failed && config.failure_policy == FailurePolicy::Halt {
            warn!(%conversation_id, turn = turn_index, "Generation failed; halting conversation");
            break StopReason::GenerationFailed;
        }

        if turn_index + 1 >= config.max_turns {
            break StopReason::Completed;
        }

        let stop_requested = shared.stop_requested.notified();
        tokio::pin!(stop_requested);
        stop_requested.as_mut().enable();

        if !shared.active.load(Ordering::SeqCst) {
            break StopReason::Stopped;
        }

        // Do not begin the next turn until the consumer has taken this one
        let paced = async {
            if !config.turn_delay.is_zero() {
                tokio::time::sleep(config.turn_delay).await;
            }
            tx.reserve().await.map(drop)
        };

        tokio::select! {
            ready = paced => {
                if ready.is_err() {
                    warn!(%conversation_id, "Turn consumer went away; stopping conversation");
                    break StopReason::Abandoned;
                }
            }
            _ = &mut stop_requested => break StopReason::Stopped,
        }
    };

    shared.active.store(false, Ordering::SeqCst);
    shared.lifecycle.write().await.stop_reason = Some(reason);

    info!(
        %conversation_id,
        turns = shared.turn_index.load(Ordering::SeqCst),
        reason = ?reason,
        "Conversation finished"
    );
}

/// Lazily delivered turns of one conversation, in turn order.
/// Ends after the conversation stops. Dropping it stops the conversation.
#[derive(Debug)]
pub struct TurnStream {
    conversation_id: Uuid,
    inner: ReceiverStream<Turn>,
}

impl TurnStream {
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }
}

impl Stream for TurnStream {
    type Item = Turn;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Turn>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

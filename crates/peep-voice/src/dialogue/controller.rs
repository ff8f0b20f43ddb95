//! Async driver for the reminder dialogue.
//!
//! `DialogueController::start` takes exclusive ownership of the speech-input
//! capability and spawns one tokio task per session. The task feeds inputs
//! (recognition events, the silence timer, cancellation, save results) into a
//! [`DialogueSession`] one at a time and executes the resulting effects in
//! order, so a session never has two turns in flight.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use peep_core::config::VoiceConfig;
use peep_core::types::ReminderRecord;
use peep_schedule::ReminderStore;

use super::machine::{DialogueInput, DialogueOutcome, DialogueSession, Effect};
use crate::error::VoiceError;
use crate::navigation::Navigator;
use crate::speech::{RecognitionEvent, SpeechInput, Speaker, TtsEngine};

type CompleteFn = Box<dyn FnOnce(ReminderRecord) + Send>;
type CancelFn = Box<dyn FnOnce() + Send>;

/// Cooperative cancellation flag shared by a handle and its session task.
#[derive(Debug, Default)]
struct CancelSignal {
    requested: AtomicBool,
    /// Set when a newer session took over the speech capabilities.
    superseded: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    /// Returns true for the first request only.
    fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::AcqRel);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Mark the session as replaced, then cancel it.
    fn supersede(&self) -> bool {
        self.superseded.store(true, Ordering::Release);
        self.request()
    }

    fn is_superseded(&self) -> bool {
        self.superseded.load(Ordering::Acquire)
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle to a running dialogue session.
#[derive(Debug)]
pub struct DialogueHandle {
    session_id: Uuid,
    cancel: Arc<CancelSignal>,
    task: JoinHandle<DialogueOutcome>,
}

impl DialogueHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Cancel the session. Safe to call any number of times; `on_cancel`
    /// fires at most once and never after the session already finished.
    pub fn cancel(&self) {
        request_cancel(&self.cancel, self.session_id);
    }

    /// Owned cancel trigger that can be moved into another task while the
    /// handle itself is being waited on.
    pub fn canceller(&self) -> impl Fn() + Send + Sync + 'static {
        let cancel = Arc::clone(&self.cancel);
        let session_id = self.session_id;
        move || request_cancel(&cancel, session_id)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end.
    pub async fn wait(self) -> Result<DialogueOutcome, VoiceError> {
        self.task.await.map_err(|e| {
            tracing::error!(session_id = %self.session_id, error = %e, "Dialogue task failed");
            VoiceError::SessionClosed
        })
    }
}

fn request_cancel(cancel: &CancelSignal, session_id: Uuid) {
    if cancel.request() {
        tracing::info!(session_id = %session_id, "Dialogue cancel requested");
    }
}

/// Runs reminder dialogues over injected speech, navigation and storage
/// collaborators.
pub struct DialogueController<E, I> {
    speaker: Arc<Speaker<E>>,
    input: Arc<I>,
    navigator: Arc<dyn Navigator>,
    store: Arc<dyn ReminderStore>,
    config: VoiceConfig,
    /// Cancel signal of the most recently started session.
    active: Mutex<Option<Arc<CancelSignal>>>,
}

impl<E, I> DialogueController<E, I>
where
    E: TtsEngine + 'static,
    I: SpeechInput + 'static,
{
    pub fn new(
        speaker: Arc<Speaker<E>>,
        input: Arc<I>,
        navigator: Arc<dyn Navigator>,
        store: Arc<dyn ReminderStore>,
        config: VoiceConfig,
    ) -> Self {
        Self {
            speaker,
            input,
            navigator,
            store,
            config,
            active: Mutex::new(None),
        }
    }

    /// Start a session.
    ///
    /// A session still running from an earlier `start` is cancelled and loses
    /// the speech capabilities: it stops speaking and listening at once and
    /// ends as [`DialogueOutcome::Cancelled`]. Any earlier registration on the
    /// speech input is torn down before this session registers.
    ///
    /// The first prompt is spoken after the configured initial delay. Exactly
    /// one of `on_complete` (record saved) or `on_cancel` fires, unless the
    /// user switches to text entry, in which case neither does.
    pub async fn start<C, X>(
        &self,
        on_complete: C,
        on_cancel: X,
    ) -> Result<DialogueHandle, VoiceError>
    where
        C: FnOnce(ReminderRecord) + Send + 'static,
        X: FnOnce() + Send + 'static,
    {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            if previous.supersede() {
                tracing::info!("Running dialogue superseded by a new session");
            }
        }

        if let Err(e) = self.input.destroy().await {
            tracing::warn!(error = %e, "Failed to release previous speech input");
        }
        self.input.remove_all_listeners();

        let (sink, events) = mpsc::unbounded_channel();
        self.input.register(sink)?;

        let session = DialogueSession::new(self.config.clone());
        let session_id = session.id();
        let cancel = Arc::new(CancelSignal::default());
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&cancel));

        let runner = SessionRunner {
            speaker: Arc::clone(&self.speaker),
            input: Arc::clone(&self.input),
            navigator: Arc::clone(&self.navigator),
            store: Arc::clone(&self.store),
            locale: self.config.locale.clone(),
            listen_timeout: self.config.listen_timeout(),
            deadline: None,
            owns_input: true,
            signal: Arc::clone(&cancel),
            on_complete: Some(Box::new(on_complete)),
            on_cancel: Some(Box::new(on_cancel)),
        };
        let task = tokio::spawn(runner.run(session, events));

        Ok(DialogueHandle {
            session_id,
            cancel,
            task,
        })
    }
}

/// Per-session executor owned by the spawned task.
struct SessionRunner<E, I> {
    speaker: Arc<Speaker<E>>,
    input: Arc<I>,
    navigator: Arc<dyn Navigator>,
    store: Arc<dyn ReminderStore>,
    locale: String,
    listen_timeout: std::time::Duration,
    /// Silence deadline of the open listening turn.
    deadline: Option<Instant>,
    /// Cleared when another session took the speech input away.
    owns_input: bool,
    signal: Arc<CancelSignal>,
    on_complete: Option<CompleteFn>,
    on_cancel: Option<CancelFn>,
}

impl<E, I> SessionRunner<E, I>
where
    E: TtsEngine + 'static,
    I: SpeechInput + 'static,
{
    async fn run(
        mut self,
        mut session: DialogueSession,
        mut events: mpsc::UnboundedReceiver<RecognitionEvent>,
    ) -> DialogueOutcome {
        let session_id = session.id();
        let cancel = Arc::clone(&self.signal);
        let mut pending: VecDeque<Effect> = session.handle(DialogueInput::Begin).into();

        loop {
            while let Some(effect) = pending.pop_front() {
                if let Effect::Finish(outcome) = effect {
                    self.finish(session_id, &outcome);
                    return outcome;
                }

                // Once finished, the closing effects run to completion.
                let feedback = if session.is_finished() {
                    self.execute(effect, &mut events).await
                } else {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            pending.clear();
                            pending.extend(session.handle(DialogueInput::Cancel));
                            continue;
                        }
                        feedback = self.execute(effect, &mut events) => feedback,
                    }
                };
                if let Some(input) = feedback {
                    pending.extend(session.handle(input));
                }
            }

            let deadline = self.deadline;
            let input = tokio::select! {
                biased;
                _ = cancel.cancelled() => DialogueInput::Cancel,
                event = events.recv() => match event {
                    Some(event) => DialogueInput::Recognition(event),
                    None => {
                        tracing::warn!(%session_id, "Speech input taken by another session");
                        self.owns_input = false;
                        DialogueInput::Cancel
                    }
                },
                _ = sleep_until(deadline) => {
                    self.deadline = None;
                    DialogueInput::Timeout
                }
            };
            pending.extend(session.handle(input));
        }
    }

    /// Carry out one effect. Returns an input to feed back, if any.
    async fn execute(
        &mut self,
        effect: Effect,
        events: &mut mpsc::UnboundedReceiver<RecognitionEvent>,
    ) -> Option<DialogueInput> {
        if !self.still_owns_input(events) {
            self.owns_input = false;
            if is_device_effect(&effect) || matches!(effect, Effect::Pause(_)) {
                tracing::debug!(?effect, "Speech capabilities taken over, skipping");
                return None;
            }
        }
        match effect {
            Effect::Speak(text) => {
                if let Err(e) = self.speaker.speak(&text).await {
                    tracing::warn!(error = %e, "Prompt not spoken, continuing");
                }
            }
            Effect::Pause(duration) => tokio::time::sleep(duration).await,
            Effect::StartListening => {
                while let Ok(stale) = events.try_recv() {
                    tracing::debug!(event = ?stale, "Dropping event from before this turn");
                }
                if let Err(e) = self.input.start_listening(&self.locale).await {
                    tracing::warn!(error = %e, "Failed to start listening");
                }
            }
            Effect::StopListening => {
                if self.owns_input {
                    if let Err(e) = self.input.stop_listening().await {
                        tracing::warn!(error = %e, "Failed to stop listening");
                    }
                }
            }
            Effect::ArmTimeout => self.deadline = Some(Instant::now() + self.listen_timeout),
            Effect::ClearTimeout => self.deadline = None,
            Effect::Notify(message) => self.navigator.notify(&message),
            Effect::Navigate(destination) => self.navigator.navigate(destination),
            Effect::Save(record) => {
                let result = self.store.save(&record).await.map_err(|e| e.to_string());
                return Some(DialogueInput::SaveResult(result));
            }
            Effect::Teardown => self.teardown().await,
            Effect::Finish(_) => {}
        }
        None
    }

    /// False once a newer session superseded this one or the event sink was
    /// dropped.
    fn still_owns_input(&self, events: &mpsc::UnboundedReceiver<RecognitionEvent>) -> bool {
        self.owns_input && !self.signal.is_superseded() && !events.is_closed()
    }

    async fn teardown(&mut self) {
        self.deadline = None;
        if !self.owns_input {
            return;
        }
        self.speaker.stop_all();
        if let Err(e) = self.input.destroy().await {
            tracing::warn!(error = %e, "Failed to release speech input");
        }
        self.input.remove_all_listeners();
        self.owns_input = false;
    }

    fn finish(&mut self, session_id: Uuid, outcome: &DialogueOutcome) {
        match outcome {
            DialogueOutcome::Saved(record) => {
                tracing::info!(%session_id, name = %record.name, "Dialogue completed");
                if let Some(on_complete) = self.on_complete.take() {
                    on_complete(record.clone());
                }
            }
            DialogueOutcome::Cancelled => {
                tracing::info!(%session_id, "Dialogue cancelled");
                if let Some(on_cancel) = self.on_cancel.take() {
                    on_cancel();
                }
            }
            DialogueOutcome::TextEntry => {
                tracing::info!(%session_id, "Dialogue handed off to text entry");
            }
        }
    }
}

/// Effects that touch the shared speech capabilities or the screen.
fn is_device_effect(effect: &Effect) -> bool {
    matches!(
        effect,
        Effect::Speak(_)
            | Effect::StartListening
            | Effect::StopListening
            | Effect::Teardown
            | Effect::Notify(_)
            | Effect::Navigate(_)
    )
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// Tests
// =============================================================================

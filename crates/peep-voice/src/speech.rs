//! Speech capability contracts.
//!
//! The dialogue never talks to a platform TTS/STT service directly. It goes
//! through two injected capabilities:
//! - [`TtsEngine`], wrapped by [`Speaker`] which adds the single-slot guard,
//!   empty-text short circuit and lifecycle events.
//! - [`SpeechInput`], which delivers [`RecognitionEvent`]s through the one sink
//!   registered with it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, mpsc};

use crate::error::VoiceError;

// =============================================================================
// Events
// =============================================================================

/// Event delivered asynchronously by the speech-input capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The recognizer detected the start of speech.
    Start,
    /// The recognizer detected the end of speech.
    End,
    /// Final recognition alternatives, best first. May be empty.
    Results(Vec<String>),
    /// Recognizer failure with the platform error code.
    Error(String),
}

/// Lifecycle event published by a [`Speaker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Started(String),
    Finished(String),
    Error(String),
    Cancelled(String),
}

/// Channel end a speech-input capability delivers its events into.
pub type EventSink = mpsc::UnboundedSender<RecognitionEvent>;

// =============================================================================
// Traits
// =============================================================================

/// Raw text-to-speech primitive.
///
/// `speak` resolves once the utterance has finished playing.
pub trait TtsEngine: Send + Sync {
    fn speak(&self, text: &str) -> impl Future<Output = Result<(), VoiceError>> + Send;

    /// Halt any utterance currently playing.
    fn stop(&self);
}

/// Speech-to-text capability with exclusive event registration.
///
/// Only one sink may be registered at a time. A new owner must call
/// `destroy` and `remove_all_listeners` before `register`, otherwise
/// registration fails with [`VoiceError::AlreadyRegistered`].
pub trait SpeechInput: Send + Sync {
    /// Route all future recognition events into `sink`.
    fn register(&self, sink: EventSink) -> Result<(), VoiceError>;

    fn start_listening(&self, locale: &str)
        -> impl Future<Output = Result<(), VoiceError>> + Send;

    fn stop_listening(&self) -> impl Future<Output = Result<(), VoiceError>> + Send;

    /// Release the native recognizer.
    fn destroy(&self) -> impl Future<Output = Result<(), VoiceError>> + Send;

    /// Drop the registered sink, if any.
    fn remove_all_listeners(&self);
}

// =============================================================================
// Speaker
// =============================================================================

/// Single-slot speech output.
///
/// At most one utterance is in flight; `speak` calls made while busy are
/// dropped rather than queued. Blank text resolves immediately without
/// reaching the engine.
///
/// The slot holds the ticket of the request that owns it (0 when idle), so a
/// request released by `stop_all` can never free a later request's slot.
pub struct Speaker<E> {
    engine: E,
    slot: AtomicU64,
    tickets: AtomicU64,
    events: broadcast::Sender<OutputEvent>,
}

impl<E: TtsEngine> Speaker<E> {
    pub fn new(engine: E) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            engine,
            slot: AtomicU64::new(IDLE),
            tickets: AtomicU64::new(IDLE),
            events,
        }
    }

    /// Subscribe to `Started`/`Finished`/`Error`/`Cancelled` events.
    pub fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }

    pub fn is_speaking(&self) -> bool {
        self.slot.load(Ordering::Acquire) != IDLE
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Speak `text` and wait until it has been played.
    pub async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        if text.trim().is_empty() {
            tracing::warn!("Attempted to speak empty text");
            return Ok(());
        }
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;
        if self
            .slot
            .compare_exchange(IDLE, ticket, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(text = %text, "Speech output busy, dropping request");
            return Ok(());
        }

        let mut guard = InFlight {
            slot: &self.slot,
            ticket,
            events: &self.events,
            text,
            released: false,
        };
        let _ = self.events.send(OutputEvent::Started(text.to_string()));

        let result = self.engine.speak(text).await;
        if !guard.release() {
            tracing::debug!(text = %text, "Speech output was stopped");
            return Ok(());
        }

        match &result {
            Ok(()) => {
                let _ = self.events.send(OutputEvent::Finished(text.to_string()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech output failed");
                let _ = self.events.send(OutputEvent::Error(e.to_string()));
            }
        }
        result
    }

    /// Halt all speech output and free the slot for the next request.
    pub fn stop_all(&self) {
        self.engine.stop();
        if self.slot.swap(IDLE, Ordering::AcqRel) != IDLE {
            let _ = self.events.send(OutputEvent::Cancelled(String::new()));
        }
    }
}

const IDLE: u64 = 0;

/// Frees the slot when a `speak` future completes or is dropped, unless
/// `stop_all` already took it away.
struct InFlight<'a> {
    slot: &'a AtomicU64,
    ticket: u64,
    events: &'a broadcast::Sender<OutputEvent>,
    text: &'a str,
    released: bool,
}

impl InFlight<'_> {
    /// Free the slot. Returns false if it no longer belonged to this request.
    fn release(&mut self) -> bool {
        self.released = true;
        self.slot
            .compare_exchange(self.ticket, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.released && self.release() {
            let _ = self.events.send(OutputEvent::Cancelled(self.text.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTtsEngine;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_speak_reaches_engine() {
        let speaker = Speaker::new(MockTtsEngine::new());
        speaker.speak("안녕하세요").await.unwrap();
        assert_eq!(speaker.engine().spoken(), vec!["안녕하세요"]);
        assert!(!speaker.is_speaking());
    }

    #[tokio::test]
    async fn test_blank_text_never_reaches_engine() {
        let speaker = Speaker::new(MockTtsEngine::new());
        speaker.speak("").await.unwrap();
        speaker.speak("   \n\t").await.unwrap();
        assert!(speaker.engine().spoken().is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let speaker = Speaker::new(MockTtsEngine::new());
        let mut rx = speaker.subscribe();
        speaker.speak("하나").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Started("하나".into()));
        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Finished("하나".into()));
    }

    #[tokio::test]
    async fn test_engine_error_is_reported_and_clears_busy() {
        let speaker = Speaker::new(MockTtsEngine::failing());
        let mut rx = speaker.subscribe();
        assert!(speaker.speak("실패").await.is_err());
        assert!(!speaker.is_speaking());
        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Started("실패".into()));
        assert!(matches!(rx.recv().await.unwrap(), OutputEvent::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_speak_is_dropped() {
        let speaker = Arc::new(Speaker::new(MockTtsEngine::with_duration(
            Duration::from_secs(2),
        )));

        let first = {
            let speaker = Arc::clone(&speaker);
            tokio::spawn(async move { speaker.speak("첫번째").await })
        };
        // Let the first request take the slot.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(speaker.is_speaking());

        speaker.speak("두번째").await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(speaker.engine().spoken(), vec!["첫번째"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_speak_emits_cancelled() {
        let speaker = Speaker::new(MockTtsEngine::with_duration(Duration::from_secs(5)));
        let mut rx = speaker.subscribe();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), speaker.speak("길게")).await;
        assert!(timed_out.is_err());
        assert!(!speaker.is_speaking());

        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Started("길게".into()));
        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Cancelled("길게".into()));
    }

    #[tokio::test]
    async fn test_stop_all_halts_engine() {
        let speaker = Speaker::new(MockTtsEngine::new());
        speaker.stop_all();
        assert_eq!(speaker.engine().stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_request_never_frees_next_request() {
        let speaker = Arc::new(Speaker::new(MockTtsEngine::with_duration(
            Duration::from_millis(100),
        )));
        let mut rx = speaker.subscribe();

        // The engine ignores stop, so the first request keeps running.
        let first = {
            let speaker = Arc::clone(&speaker);
            tokio::spawn(async move { speaker.speak("첫번째").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        speaker.stop_all();
        assert!(!speaker.is_speaking());

        tokio::time::sleep(Duration::from_millis(40)).await;
        let second = {
            let speaker = Arc::clone(&speaker);
            tokio::spawn(async move { speaker.speak("두번째").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(speaker.is_speaking());

        // First request returns at t=100 while the second runs until t=150.
        first.await.unwrap().unwrap();
        assert!(speaker.is_speaking());
        speaker.speak("세번째").await.unwrap();

        second.await.unwrap().unwrap();
        assert!(!speaker.is_speaking());
        assert_eq!(speaker.engine().spoken(), vec!["첫번째", "두번째"]);

        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Started("첫번째".into()));
        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Cancelled(String::new()));
        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Started("두번째".into()));
        assert_eq!(rx.recv().await.unwrap(), OutputEvent::Finished("두번째".into()));
    }
}

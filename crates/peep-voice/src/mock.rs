//! Mock speech capabilities for tests and headless runs.
//!
//! Both mocks record what the dialogue asked of them so tests can assert on
//! the exact prompts spoken and listening turns opened.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::VoiceError;
use crate::speech::{EventSink, RecognitionEvent, SpeechInput, TtsEngine};

// =============================================================================
// TTS
// =============================================================================

/// Mock TTS engine that records every utterance.
#[derive(Debug, Default)]
pub struct MockTtsEngine {
    spoken: Mutex<Vec<String>>,
    duration: Option<Duration>,
    fail: bool,
    stops: AtomicUsize,
}

impl MockTtsEngine {
    /// Engine whose utterances finish immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose utterances take `duration` to play.
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    /// Engine that rejects every utterance.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Utterances handed to the engine, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }
}

impl TtsEngine for MockTtsEngine {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(VoiceError::OutputFailed("mock engine failure".to_string()));
        }
        if let Some(d) = self.duration {
            tokio::time::sleep(d).await;
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// STT
// =============================================================================

/// Calls made against a [`MockSpeechInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCall {
    Start(String),
    Stop,
    Destroy,
    RemoveAllListeners,
    Register,
}

/// Mock speech recognizer driven by the test through [`MockSpeechInput::emit`].
#[derive(Debug)]
pub struct MockSpeechInput {
    sink: Mutex<Option<EventSink>>,
    listening: AtomicBool,
    calls: Mutex<Vec<InputCall>>,
    starts: watch::Sender<usize>,
}

impl Default for MockSpeechInput {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpeechInput {
    pub fn new() -> Self {
        let (starts, _) = watch::channel(0);
        Self {
            sink: Mutex::new(None),
            listening: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            starts,
        }
    }

    /// Deliver an event to the registered sink.
    ///
    /// Returns `false` when nobody is registered or the owner has gone away.
    /// Final events (`Results`, `Error`, `End`) stop listening, as a real
    /// recognizer does.
    pub fn emit(&self, event: RecognitionEvent) -> bool {
        if matches!(
            event,
            RecognitionEvent::Results(_) | RecognitionEvent::Error(_) | RecognitionEvent::End
        ) {
            self.listening.store(false, Ordering::Relaxed);
        }
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    /// Shorthand for a single-alternative `Results` event.
    pub fn say(&self, text: &str) -> bool {
        self.emit(RecognitionEvent::Results(vec![text.to_string()]))
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    /// Whether an open sink is currently registered.
    pub fn is_registered(&self) -> bool {
        self.sink
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|s| !s.is_closed())
    }

    pub fn calls(&self) -> Vec<InputCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of listening turns opened so far.
    pub fn start_count(&self) -> usize {
        *self.starts.borrow()
    }

    /// Wait until at least `n` listening turns have been opened.
    pub async fn wait_for_listen(&self, n: usize) {
        let mut rx = self.starts.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    fn record(&self, call: InputCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SpeechInput for MockSpeechInput {
    fn register(&self, sink: EventSink) -> Result<(), VoiceError> {
        let mut guard = self.sink.lock().unwrap();
        if guard.as_ref().is_some_and(|s| !s.is_closed()) {
            return Err(VoiceError::AlreadyRegistered);
        }
        *guard = Some(sink);
        drop(guard);
        self.record(InputCall::Register);
        Ok(())
    }

    async fn start_listening(&self, locale: &str) -> Result<(), VoiceError> {
        self.record(InputCall::Start(locale.to_string()));
        self.listening.store(true, Ordering::Relaxed);
        self.starts.send_modify(|count| *count += 1);
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), VoiceError> {
        self.record(InputCall::Stop);
        self.listening.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), VoiceError> {
        self.record(InputCall::Destroy);
        self.listening.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn remove_all_listeners(&self) {
        self.record(InputCall::RemoveAllListeners);
        *self.sink.lock().unwrap() = None;
    }
}

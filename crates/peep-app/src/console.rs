//! Terminal stand-ins for the platform speech and navigation services.
//!
//! Prompts are printed instead of spoken and every line typed on stdin is
//! treated as one recognition result. Line conventions:
//! - empty line: recognizer heard nothing
//! - `a | b`: several alternatives, best first
//! - `!error <code>`: recognizer error with that code

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use peep_voice::speech::EventSink;
use peep_voice::{Destination, Navigator, RecognitionEvent, SpeechInput, TtsEngine, VoiceError};

const ERROR_PREFIX: &str = "!error";

/// Map one typed line to a recognition event.
pub fn parse_line(line: &str) -> RecognitionEvent {
    let line = line.trim();
    if let Some(code) = line.strip_prefix(ERROR_PREFIX) {
        return RecognitionEvent::Error(code.trim().to_string());
    }
    let alternatives = line
        .split('|')
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .map(str::to_string)
        .collect();
    RecognitionEvent::Results(alternatives)
}

// =============================================================================
// Output
// =============================================================================

/// Prints every prompt on stdout.
#[derive(Debug, Default)]
pub struct ConsoleTts;

impl TtsEngine for ConsoleTts {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        println!("> {}", text);
        Ok(())
    }

    fn stop(&self) {}
}

#[derive(Debug, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, destination: Destination) {
        tracing::info!(?destination, "Navigate");
    }

    fn notify(&self, message: &str) {
        println!("({})", message);
    }
}

// =============================================================================
// Input
// =============================================================================

#[derive(Default)]
struct InputState {
    sink: Mutex<Option<EventSink>>,
    listening: AtomicBool,
}

impl InputState {
    /// The slot only holds a sender, so a poisoned lock is still usable.
    fn sink(&self) -> MutexGuard<'_, Option<EventSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Speech input fed from lines of text.
pub struct ConsoleSpeechInput {
    state: Arc<InputState>,
    closed: watch::Receiver<bool>,
    reader: JoinHandle<()>,
}

impl ConsoleSpeechInput {
    /// Read from the process's stdin. Must be called inside a tokio runtime.
    ///
    /// Stdin is read on a plain thread so a pending read never holds up
    /// runtime shutdown.
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        });
        Self::from_lines(rx)
    }

    /// Feed from a channel of lines. The input closes when every sender is
    /// dropped.
    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        let state = Arc::new(InputState::default());
        let (closed_tx, closed) = watch::channel(false);
        let reader = tokio::spawn(forward_lines(lines, Arc::clone(&state), closed_tx));
        Self {
            state,
            closed,
            reader,
        }
    }

    /// Resolves once the line source is exhausted.
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        // An Err means the reader task is gone, which is also closed.
        let _ = closed.wait_for(|c| *c).await;
    }
}

impl Drop for ConsoleSpeechInput {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn forward_lines(
    mut lines: mpsc::UnboundedReceiver<String>,
    state: Arc<InputState>,
    closed: watch::Sender<bool>,
) {
    while let Some(line) = lines.recv().await {
        if !state.listening.swap(false, Ordering::AcqRel) {
            tracing::debug!(line = %line, "Input while not listening, dropped");
            continue;
        }
        let event = parse_line(&line);
        let sink = state.sink();
        match sink.as_ref() {
            Some(sink) => {
                let _ = sink.send(RecognitionEvent::Start);
                let _ = sink.send(RecognitionEvent::End);
                let _ = sink.send(event);
            }
            None => tracing::debug!("No listener registered, input dropped"),
        }
    }
    tracing::debug!("Console input closed");
    closed.send_replace(true);
}

impl SpeechInput for ConsoleSpeechInput {
    fn register(&self, sink: EventSink) -> Result<(), VoiceError> {
        let mut guard = self.state.sink();
        if guard.as_ref().is_some_and(|s| !s.is_closed()) {
            return Err(VoiceError::AlreadyRegistered);
        }
        *guard = Some(sink);
        Ok(())
    }

    async fn start_listening(&self, locale: &str) -> Result<(), VoiceError> {
        if *self.closed.borrow() {
            return Err(VoiceError::Unavailable("console input closed".to_string()));
        }
        tracing::debug!(locale, "Listening");
        self.state.listening.store(true, Ordering::Release);
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), VoiceError> {
        self.state.listening.store(false, Ordering::Release);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), VoiceError> {
        self.state.listening.store(false, Ordering::Release);
        Ok(())
    }

    fn remove_all_listeners(&self) {
        *self.state.sink() = None;
    }
}

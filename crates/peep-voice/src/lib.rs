//! Peep Voice crate - voice-driven reminder dialogue.
//!
//! Drives the user through a fixed sequence of spoken prompts (input method,
//! drug name, dosage, days, times, notes, confirmation) over an injected
//! speech-output and speech-input capability. The turn logic lives in a pure
//! state machine (`dialogue::machine`); `DialogueController` runs it on a tokio
//! task, executing speech, listening and timer effects one at a time.

pub mod dialogue;
pub mod error;
pub mod interpret;
pub mod mock;
pub mod navigation;
pub mod speech;

pub use dialogue::{DialogueController, DialogueHandle, DialogueOutcome, DialogueStep};
pub use error::VoiceError;
pub use navigation::{Destination, Navigator};
pub use speech::{OutputEvent, RecognitionEvent, SpeechInput, Speaker, TtsEngine};

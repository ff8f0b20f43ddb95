//! Turn-taking logic of the reminder dialogue.
//!
//! `DialogueSession` is a plain state machine: it consumes one
//! [`DialogueInput`] at a time and answers with the ordered list of
//! [`Effect`]s the controller must carry out (speak, pause, listen, arm the
//! silence timer, navigate, persist). It never touches a speech adapter or a
//! clock itself, which keeps every turn deterministic and testable.

use std::collections::BTreeSet;
use std::time::Duration;

use uuid::Uuid;

use peep_core::config::VoiceConfig;
use peep_core::types::{DayOfWeek, DoseTime, ReminderRecord};

use super::step::DialogueStep;
use crate::interpret::{self, Confirmation, InputMethodChoice, MoreTimes};
use crate::navigation::Destination;
use crate::speech::RecognitionEvent;

pub const MSG_NO_MATCH: &str = "잘못 들었습니다. 다시 말씀해 주세요.";
pub const MSG_NO_SPEECH: &str = "음성이 인식되지 않았습니다. 다시 말씀해 주세요.";
pub const MSG_NO_RESPONSE: &str = "응답이 없습니다. 다시 한 번 말씀해 주세요.";
pub const MSG_RECOVERABLE: &str = "음성 인식 중 문제가 발생했습니다. 다시 시도합니다.";
pub const MSG_FATAL: &str = "음성 인식에 문제가 발생했습니다. 다시 시도합니다.";
pub const MSG_CANCEL: &str = "알림 설정을 취소합니다";
pub const MSG_REJECTED: &str = "입력이 취소되었습니다. 일정 페이지로 돌아갑니다.";
pub const MSG_SAVED: &str = "약 정보가 저장되었습니다. 일정 페이지로 돌아갑니다.";
pub const MSG_SAVE_FAILED: &str = "저장 중 오류가 발생했습니다. 다시 시도해 주세요.";
pub const MSG_GIVE_UP: &str = "응답을 인식하지 못해 알림 설정을 취소합니다.";

/// How a dialogue ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueOutcome {
    /// The record was persisted.
    Saved(ReminderRecord),
    Cancelled,
    /// Control passed to the typed name-entry screen.
    TextEntry,
}

/// Something that happened to the dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueInput {
    /// Session start.
    Begin,
    Recognition(RecognitionEvent),
    /// The silence timer armed for the current listening turn fired.
    Timeout,
    /// Caller-requested cancellation.
    Cancel,
    /// Outcome of a requested [`Effect::Save`].
    SaveResult(Result<(), String>),
}

/// Side effect requested by the session, executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Speak(String),
    Pause(Duration),
    StartListening,
    StopListening,
    /// Start the silence timer for the listening turn just opened.
    ArmTimeout,
    ClearTimeout,
    /// Toast-style notice that is shown, not spoken.
    Notify(String),
    Navigate(Destination),
    /// Persist the record and report back with [`DialogueInput::SaveResult`].
    Save(ReminderRecord),
    /// Halt speech and release the speech-input registration.
    Teardown,
    /// Hand the outcome to the caller. Always the last effect of a session.
    Finish(DialogueOutcome),
}

/// Answers collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderDraft {
    pub name: Option<String>,
    pub dosage: Option<u32>,
    pub days: BTreeSet<DayOfWeek>,
    pub times: Vec<DoseTime>,
    pub notes: String,
}

impl ReminderDraft {
    /// Build the record once name and dosage are known.
    pub fn to_record(&self) -> Option<ReminderRecord> {
        Some(ReminderRecord {
            name: self.name.clone()?,
            dosage: self.dosage?,
            days: self.days.clone(),
            times: self.times.clone(),
            notes: self.notes.clone(),
        })
    }

    fn add_times(&mut self, times: Vec<DoseTime>) {
        for time in times {
            if !self.times.contains(&time) {
                self.times.push(time);
            }
        }
    }
}

/// State of one dialogue invocation.
#[derive(Debug)]
pub struct DialogueSession {
    id: Uuid,
    step: DialogueStep,
    config: VoiceConfig,
    started: bool,
    cancelled: bool,
    listening: bool,
    timeout_armed: bool,
    voice_mode: bool,
    last_utterance: Option<String>,
    last_prompt: Option<String>,
    retries: u32,
    pending_save: Option<ReminderRecord>,
    draft: ReminderDraft,
}

impl DialogueSession {
    pub fn new(config: VoiceConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            step: DialogueStep::InputMethod,
            config,
            started: false,
            cancelled: false,
            listening: false,
            timeout_armed: false,
            voice_mode: false,
            last_utterance: None,
            last_prompt: None,
            retries: 0,
            pending_save: None,
            draft: ReminderDraft::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> DialogueStep {
        self.step
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.step.is_terminal()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn timeout_armed(&self) -> bool {
        self.timeout_armed
    }

    pub fn voice_mode(&self) -> bool {
        self.voice_mode
    }

    pub fn last_utterance(&self) -> Option<&str> {
        self.last_utterance.as_deref()
    }

    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    /// Consecutive failed turns at the current step.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn draft(&self) -> &ReminderDraft {
        &self.draft
    }

    /// Feed one input and collect the effects it causes.
    ///
    /// Inputs arriving after the session finished are discarded.
    pub fn handle(&mut self, input: DialogueInput) -> Vec<Effect> {
        if self.is_finished() {
            tracing::debug!(session_id = %self.id, ?input, "Session finished, discarding input");
            return Vec::new();
        }
        match input {
            DialogueInput::Begin => self.begin(),
            DialogueInput::Recognition(event) => self.on_recognition(event),
            DialogueInput::Timeout => self.on_timeout(),
            DialogueInput::Cancel => self.cancel(),
            DialogueInput::SaveResult(result) => self.on_save_result(result),
        }
    }

    // =========================================================================
    // Turn plumbing
    // =========================================================================

    fn begin(&mut self) -> Vec<Effect> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        tracing::info!(session_id = %self.id, "Dialogue started");
        let mut effects = vec![Effect::Pause(self.config.initial_delay())];
        effects.extend(self.ask());
        effects
    }

    fn say(&mut self, text: impl Into<String>) -> Effect {
        let text = text.into();
        self.last_prompt = Some(text.clone());
        Effect::Speak(text)
    }

    fn listen(&mut self) -> Vec<Effect> {
        self.listening = true;
        self.timeout_armed = true;
        vec![Effect::StartListening, Effect::ArmTimeout]
    }

    /// Prompt the current step and open a listening turn.
    fn ask(&mut self) -> Vec<Effect> {
        let prompt = self.prompt_text();
        let mut effects = vec![self.say(prompt)];
        effects.extend(self.listen());
        effects
    }

    fn prompt_text(&self) -> String {
        let question = self.step.prompt().unwrap_or_default();
        if self.step != DialogueStep::Confirmation {
            return question.to_string();
        }
        match self.draft.to_record() {
            Some(record) => {
                let mut read_back = format!(
                    "입력된 정보를 확인해 주세요. 약 이름은 {}, 복용량은 {}, 복용 요일은 {}, 복용 시간은 {}입니다.",
                    record.name,
                    record.dosage_label(),
                    record.days_label(),
                    record.times_label()
                );
                if !record.notes.is_empty() {
                    read_back.push_str(&format!(" 추가 정보는 {}입니다.", record.notes));
                }
                format!("{} {}", read_back, question)
            }
            None => question.to_string(),
        }
    }

    /// Close the listening turn and drop its timer.
    fn end_turn(&mut self) -> Vec<Effect> {
        self.listening = false;
        if self.timeout_armed {
            self.timeout_armed = false;
            vec![Effect::ClearTimeout]
        } else {
            Vec::new()
        }
    }

    fn transition(&mut self, next: DialogueStep) {
        if !self.step.can_transition_to(&next) {
            tracing::warn!(session_id = %self.id, from = %self.step, to = %next, "Unexpected step transition");
        }
        tracing::info!(session_id = %self.id, from = %self.step, to = %next, "Dialogue step");
        self.step = next;
    }

    fn advance(&mut self, next: DialogueStep) -> Vec<Effect> {
        self.transition(next);
        self.retries = 0;
        self.ask()
    }

    /// Count a failed turn. Returns true once the retry ceiling is reached.
    fn exhausted(&mut self) -> bool {
        self.retries += 1;
        let max = self.config.max_consecutive_retries;
        max > 0 && self.retries >= max
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    fn on_recognition(&mut self, event: RecognitionEvent) -> Vec<Effect> {
        match event {
            RecognitionEvent::Start | RecognitionEvent::End => {
                tracing::debug!(session_id = %self.id, ?event, "Recognizer lifecycle event");
                Vec::new()
            }
            RecognitionEvent::Results(alternatives) => {
                if !self.listening {
                    tracing::debug!(session_id = %self.id, "Result outside a listening turn, discarding");
                    return Vec::new();
                }
                let mut effects = self.end_turn();
                let heard = alternatives
                    .iter()
                    .map(|a| a.trim())
                    .find(|a| !a.is_empty())
                    .map(str::to_string);
                match heard {
                    Some(text) => effects.extend(self.on_utterance(text)),
                    None => effects.extend(self.on_no_speech()),
                }
                effects
            }
            RecognitionEvent::Error(code) => {
                if !self.listening {
                    tracing::debug!(session_id = %self.id, code = %code, "Error outside a listening turn, discarding");
                    return Vec::new();
                }
                let mut effects = self.end_turn();
                if self.config.is_recoverable(&code) {
                    effects.extend(self.on_recoverable_error(&code));
                } else {
                    effects.extend(self.on_fatal_error(&code));
                }
                effects
            }
        }
    }

    fn on_no_speech(&mut self) -> Vec<Effect> {
        tracing::info!(session_id = %self.id, step = %self.step, "No speech recognized");
        if self.exhausted() {
            return self.give_up();
        }
        let mut effects = vec![self.say(MSG_NO_SPEECH)];
        effects.extend(self.ask());
        effects
    }

    fn on_recoverable_error(&mut self, code: &str) -> Vec<Effect> {
        tracing::warn!(session_id = %self.id, code = %code, "Recoverable recognizer error, listening again");
        if self.exhausted() {
            return self.give_up();
        }
        let mut effects = vec![
            Effect::Notify(MSG_RECOVERABLE.to_string()),
            Effect::Pause(self.config.recoverable_restart_delay()),
        ];
        effects.extend(self.listen());
        effects
    }

    fn on_fatal_error(&mut self, code: &str) -> Vec<Effect> {
        tracing::warn!(session_id = %self.id, code = %code, step = %self.step, "Recognizer error");
        let mut effects = vec![Effect::StopListening];
        if self.exhausted() {
            effects.extend(self.give_up());
            return effects;
        }
        effects.push(self.say(MSG_FATAL));
        effects.push(Effect::Pause(self.config.retry_delay()));
        effects.extend(self.ask());
        effects
    }

    fn on_timeout(&mut self) -> Vec<Effect> {
        if !self.timeout_armed {
            tracing::debug!(session_id = %self.id, "Stale timeout, discarding");
            return Vec::new();
        }
        self.timeout_armed = false;
        self.listening = false;
        tracing::info!(session_id = %self.id, step = %self.step, "No response before timeout");

        let mut effects = vec![Effect::StopListening];
        if self.exhausted() {
            effects.extend(self.give_up());
            return effects;
        }
        effects.push(self.say(MSG_NO_RESPONSE));
        effects.push(Effect::Pause(self.config.retry_delay()));
        effects.extend(self.ask());
        effects
    }

    fn on_utterance(&mut self, text: String) -> Vec<Effect> {
        tracing::info!(session_id = %self.id, step = %self.step, utterance = %text, "Recognized");
        self.last_utterance = Some(text.clone());

        if interpret::is_echo(&text, self.last_prompt.as_deref(), &self.config.echo_markers) {
            tracing::debug!(session_id = %self.id, utterance = %text, "Echo of our own prompt, listening again");
            return self.listen();
        }

        let step = self.step;
        if step != DialogueStep::InputMethod && interpret::is_cancel(&text, step.is_free_text()) {
            return self.cancel_by_user();
        }

        match step {
            DialogueStep::InputMethod => match interpret::input_method(&text) {
                Some(InputMethodChoice::Voice) => {
                    self.voice_mode = true;
                    self.advance(DialogueStep::Name)
                }
                Some(InputMethodChoice::Text) => self.hand_off_to_text(),
                Some(InputMethodChoice::Cancel) => self.cancel_by_user(),
                None => self.no_match(),
            },
            DialogueStep::Name => {
                self.draft.name = Some(text);
                self.advance(DialogueStep::Dosage)
            }
            DialogueStep::Dosage => match interpret::parse_dosage(&text) {
                Some(dosage) => {
                    self.draft.dosage = Some(dosage);
                    self.advance(DialogueStep::Days)
                }
                None => self.no_match(),
            },
            DialogueStep::Days => {
                let days = interpret::parse_days(&text);
                if days.is_empty() {
                    return self.no_match();
                }
                self.draft.days = days;
                self.advance(DialogueStep::Times)
            }
            DialogueStep::Times => {
                let times = interpret::parse_times(&text);
                if times.is_empty() {
                    return self.no_match();
                }
                self.draft.add_times(times);
                self.advance(DialogueStep::AdditionalTime)
            }
            DialogueStep::AdditionalTime => match interpret::additional_time(&text) {
                Some(MoreTimes::Add) => self.advance(DialogueStep::Times),
                Some(MoreTimes::Done) => self.advance(DialogueStep::AdditionalInfo),
                None => self.no_match(),
            },
            DialogueStep::AdditionalInfo => {
                self.draft.notes = if interpret::is_none_answer(&text) {
                    String::new()
                } else {
                    text
                };
                self.advance(DialogueStep::Confirmation)
            }
            DialogueStep::Confirmation => match interpret::confirmation(&text) {
                Some(Confirmation::Reject) => self.reject(),
                Some(Confirmation::Save) => self.request_save(),
                None => self.no_match(),
            },
            DialogueStep::Saved | DialogueStep::Cancelled | DialogueStep::TextEntry => Vec::new(),
        }
    }

    fn no_match(&mut self) -> Vec<Effect> {
        tracing::info!(session_id = %self.id, step = %self.step, "Utterance did not match");
        if self.exhausted() {
            return self.give_up();
        }
        let mut effects = vec![self.say(MSG_NO_MATCH)];
        effects.extend(self.listen());
        effects
    }

    // =========================================================================
    // Endings
    // =========================================================================

    fn request_save(&mut self) -> Vec<Effect> {
        match self.draft.to_record() {
            Some(record) => {
                self.pending_save = Some(record.clone());
                vec![Effect::Save(record)]
            }
            None => {
                tracing::warn!(session_id = %self.id, "Draft incomplete at confirmation");
                let mut effects = vec![self.say(MSG_SAVE_FAILED)];
                effects.extend(self.ask());
                effects
            }
        }
    }

    fn on_save_result(&mut self, result: Result<(), String>) -> Vec<Effect> {
        let Some(record) = self.pending_save.take() else {
            tracing::debug!(session_id = %self.id, "Save result without a pending save, discarding");
            return Vec::new();
        };
        match result {
            Ok(()) => {
                self.transition(DialogueStep::Saved);
                vec![
                    self.say(MSG_SAVED),
                    Effect::Teardown,
                    Effect::Navigate(Destination::Schedule {
                        reset_inputs: true,
                        restart_voice: false,
                    }),
                    Effect::Finish(DialogueOutcome::Saved(record)),
                ]
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Saving reminder failed");
                let mut effects = vec![self.say(MSG_SAVE_FAILED)];
                effects.extend(self.ask());
                effects
            }
        }
    }

    fn hand_off_to_text(&mut self) -> Vec<Effect> {
        self.voice_mode = false;
        self.listening = false;
        self.timeout_armed = false;
        self.transition(DialogueStep::TextEntry);
        vec![
            Effect::Teardown,
            Effect::Navigate(Destination::NameEntry { voice_mode: false }),
            Effect::Finish(DialogueOutcome::TextEntry),
        ]
    }

    fn cancel_by_user(&mut self) -> Vec<Effect> {
        tracing::info!(session_id = %self.id, step = %self.step, "User cancelled");
        self.farewell(
            MSG_CANCEL,
            Destination::Home {
                cancelled_from_schedule: true,
            },
        )
    }

    fn reject(&mut self) -> Vec<Effect> {
        tracing::info!(session_id = %self.id, "Confirmation rejected");
        self.farewell(
            MSG_REJECTED,
            Destination::Schedule {
                reset_inputs: false,
                restart_voice: true,
            },
        )
    }

    fn give_up(&mut self) -> Vec<Effect> {
        tracing::warn!(session_id = %self.id, step = %self.step, retries = self.retries, "Retry limit reached");
        self.farewell(
            MSG_GIVE_UP,
            Destination::Home {
                cancelled_from_schedule: true,
            },
        )
    }

    /// Announce, wait, navigate away, then cancel.
    fn farewell(&mut self, message: &str, destination: Destination) -> Vec<Effect> {
        let mut effects = vec![
            self.say(message),
            Effect::Pause(self.config.cancel_delay()),
            Effect::Navigate(destination),
        ];
        effects.extend(self.cancel());
        effects
    }

    fn cancel(&mut self) -> Vec<Effect> {
        self.cancelled = true;
        self.listening = false;
        self.timeout_armed = false;
        self.pending_save = None;
        self.transition(DialogueStep::Cancelled);
        vec![
            Effect::StopListening,
            Effect::ClearTimeout,
            Effect::Teardown,
            Effect::Finish(DialogueOutcome::Cancelled),
        ]
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> DialogueSession {
        DialogueSession::new(VoiceConfig::default())
    }

    fn heard(text: &str) -> DialogueInput {
        DialogueInput::Recognition(RecognitionEvent::Results(vec![text.to_string()]))
    }

    fn spoken(effects: &[Effect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Speak(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn count(effects: &[Effect], target: &Effect) -> usize {
        effects.iter().filter(|e| *e == target).count()
    }

    /// Drive a fresh session to `step` with well-formed answers.
    fn at_step(step: DialogueStep) -> DialogueSession {
        let mut s = session();
        s.handle(DialogueInput::Begin);
        let answers = [
            (DialogueStep::InputMethod, "음성"),
            (DialogueStep::Name, "타이레놀"),
            (DialogueStep::Dosage, "두 알"),
            (DialogueStep::Days, "월수금"),
            (DialogueStep::Times, "저녁 7시"),
            (DialogueStep::AdditionalTime, "다음"),
            (DialogueStep::AdditionalInfo, "식후 복용"),
        ];
        for (at, answer) in answers {
            if s.step() == step {
                break;
            }
            assert_eq!(s.step(), at);
            s.handle(heard(answer));
        }
        assert_eq!(s.step(), step);
        s
    }

    #[test]
    fn test_begin_prompts_input_method() {
        let mut s = session();
        let effects = s.handle(DialogueInput::Begin);
        assert_eq!(
            effects,
            vec![
                Effect::Pause(Duration::from_millis(1000)),
                Effect::Speak(DialogueStep::InputMethod.prompt().unwrap().to_string()),
                Effect::StartListening,
                Effect::ArmTimeout,
            ]
        );
        assert!(s.is_listening());
        assert!(s.timeout_armed());
        // A second Begin is ignored
        assert!(s.handle(DialogueInput::Begin).is_empty());
    }

    #[test]
    fn test_voice_choice_advances_to_name() {
        let mut s = at_step(DialogueStep::InputMethod);
        let effects = s.handle(heard("음성으로 할게요"));
        assert_eq!(s.step(), DialogueStep::Name);
        assert!(s.voice_mode());
        assert_eq!(effects[0], Effect::ClearTimeout);
        assert_eq!(spoken(&effects), vec![DialogueStep::Name.prompt().unwrap()]);
        assert_eq!(count(&effects, &Effect::StartListening), 1);
    }

    #[test]
    fn test_text_choice_hands_off() {
        let mut s = at_step(DialogueStep::InputMethod);
        let effects = s.handle(heard("텍스트로 할래요"));
        assert_eq!(s.step(), DialogueStep::TextEntry);
        assert!(!s.voice_mode());
        assert!(!s.is_cancelled());
        assert_eq!(count(&effects, &Effect::StartListening), 0);
        assert!(effects.contains(&Effect::Navigate(Destination::NameEntry { voice_mode: false })));
        assert_eq!(
            effects.last(),
            Some(&Effect::Finish(DialogueOutcome::TextEntry))
        );
    }

    #[test]
    fn test_days_accept_many_and_advance_once() {
        let mut s = at_step(DialogueStep::Days);
        let effects = s.handle(heard("월요일 수요일 금요일에 먹어요"));
        assert_eq!(s.step(), DialogueStep::Times);
        assert_eq!(
            s.draft().days,
            [DayOfWeek::Mon, DayOfWeek::Wed, DayOfWeek::Fri]
                .into_iter()
                .collect::<BTreeSet<_>>()
        );
        assert_eq!(spoken(&effects), vec![DialogueStep::Times.prompt().unwrap()]);
        assert_eq!(count(&effects, &Effect::StartListening), 1);
    }

    #[test]
    fn test_additional_time_loops_back_and_merges() {
        let mut s = at_step(DialogueStep::AdditionalTime);
        s.handle(heard("추가"));
        assert_eq!(s.step(), DialogueStep::Times);
        s.handle(heard("아침 8시, 저녁 7시"));
        assert_eq!(s.step(), DialogueStep::AdditionalTime);
        let times: Vec<String> = s.draft().times.iter().map(|t| t.to_string()).collect();
        assert_eq!(times, vec!["19:00", "08:00"]);
    }

    #[test]
    fn test_no_match_reprompts_without_advancing() {
        let mut s = at_step(DialogueStep::Dosage);
        let effects = s.handle(heard("잘 모르겠어요"));
        assert_eq!(s.step(), DialogueStep::Dosage);
        assert_eq!(spoken(&effects), vec![MSG_NO_MATCH]);
        assert_eq!(count(&effects, &Effect::StartListening), 1);
        assert_eq!(s.retries(), 1);
    }

    #[test]
    fn test_empty_results_reask_step() {
        let mut s = at_step(DialogueStep::Days);
        let effects = s.handle(DialogueInput::Recognition(RecognitionEvent::Results(vec![
            "  ".to_string(),
        ])));
        assert_eq!(s.step(), DialogueStep::Days);
        assert_eq!(
            spoken(&effects),
            vec![MSG_NO_SPEECH, DialogueStep::Days.prompt().unwrap()]
        );

        let mut s = at_step(DialogueStep::Days);
        let effects = s.handle(DialogueInput::Recognition(RecognitionEvent::Results(vec![])));
        assert_eq!(spoken(&effects)[0], MSG_NO_SPEECH);
    }

    #[test]
    fn test_echo_restarts_listening_silently() {
        let mut s = at_step(DialogueStep::Name);
        let prompt = s.last_prompt().unwrap().to_string();
        let effects = s.handle(heard(&prompt));
        assert_eq!(s.step(), DialogueStep::Name);
        assert!(spoken(&effects).is_empty());
        assert_eq!(
            effects,
            vec![Effect::ClearTimeout, Effect::StartListening, Effect::ArmTimeout]
        );
        assert_eq!(s.retries(), 0);
        assert!(s.draft().name.is_none());
    }

    #[test]
    fn test_timeout_reasks_once() {
        let mut s = at_step(DialogueStep::Days);
        let effects = s.handle(DialogueInput::Timeout);
        assert_eq!(
            effects,
            vec![
                Effect::StopListening,
                Effect::Speak(MSG_NO_RESPONSE.to_string()),
                Effect::Pause(Duration::from_millis(2000)),
                Effect::Speak(DialogueStep::Days.prompt().unwrap().to_string()),
                Effect::StartListening,
                Effect::ArmTimeout,
            ]
        );
    }

    #[test]
    fn test_result_clears_pending_timeout() {
        let mut s = at_step(DialogueStep::Name);
        let effects = s.handle(heard("타이레놀"));
        assert_eq!(effects[0], Effect::ClearTimeout);
        // Exactly one fresh timer for the next turn
        assert_eq!(count(&effects, &Effect::ArmTimeout), 1);
    }

    #[test]
    fn test_timeout_without_listening_turn_is_ignored() {
        let mut s = session();
        assert!(s.handle(DialogueInput::Timeout).is_empty());

        let mut s = at_step(DialogueStep::Confirmation);
        s.handle(heard("저장"));
        // Waiting on the store, no turn open
        assert!(s.handle(DialogueInput::Timeout).is_empty());
    }

    #[test]
    fn test_start_and_end_events_do_not_end_turn() {
        let mut s = at_step(DialogueStep::Name);
        assert!(s
            .handle(DialogueInput::Recognition(RecognitionEvent::Start))
            .is_empty());
        assert!(s
            .handle(DialogueInput::Recognition(RecognitionEvent::End))
            .is_empty());
        assert!(s.timeout_armed());
    }

    #[test]
    fn test_recoverable_error_retries_silently() {
        let mut s = at_step(DialogueStep::InputMethod);
        let effects = s.handle(DialogueInput::Recognition(RecognitionEvent::Error("5".into())));
        assert_eq!(
            effects,
            vec![
                Effect::ClearTimeout,
                Effect::Notify(MSG_RECOVERABLE.to_string()),
                Effect::Pause(Duration::from_millis(1000)),
                Effect::StartListening,
                Effect::ArmTimeout,
            ]
        );
        assert_eq!(s.step(), DialogueStep::InputMethod);
    }

    #[test]
    fn test_fatal_error_speaks_and_reasks() {
        let mut s = at_step(DialogueStep::Times);
        let effects = s.handle(DialogueInput::Recognition(RecognitionEvent::Error("9".into())));
        assert_eq!(
            spoken(&effects),
            vec![MSG_FATAL, DialogueStep::Times.prompt().unwrap()]
        );
        assert_eq!(effects[1], Effect::StopListening);
        assert!(effects.contains(&Effect::Pause(Duration::from_millis(2000))));
    }

    #[test]
    fn test_events_outside_listening_turn_are_dropped() {
        let mut s = session();
        assert!(s.handle(heard("음성")).is_empty());
        assert!(s
            .handle(DialogueInput::Recognition(RecognitionEvent::Error("5".into())))
            .is_empty());
        assert_eq!(s.step(), DialogueStep::InputMethod);
    }

    #[test]
    fn test_spoken_cancel_navigates_home() {
        let mut s = at_step(DialogueStep::Days);
        let effects = s.handle(heard("취소할게요"));
        assert!(s.is_cancelled());
        assert_eq!(s.step(), DialogueStep::Cancelled);
        assert_eq!(
            effects[1..],
            [
                Effect::Speak(MSG_CANCEL.to_string()),
                Effect::Pause(Duration::from_millis(2000)),
                Effect::Navigate(Destination::Home {
                    cancelled_from_schedule: true
                }),
                Effect::StopListening,
                Effect::ClearTimeout,
                Effect::Teardown,
                Effect::Finish(DialogueOutcome::Cancelled),
            ]
        );
    }

    #[test]
    fn test_free_text_steps_keep_mentions_of_cancel() {
        let mut s = at_step(DialogueStep::AdditionalInfo);
        s.handle(heard("취소 시 의사와 상담"));
        assert_eq!(s.step(), DialogueStep::Confirmation);
        assert_eq!(s.draft().notes, "취소 시 의사와 상담");

        let mut s = at_step(DialogueStep::Name);
        s.handle(heard("취소"));
        assert!(s.is_cancelled());
    }

    #[test]
    fn test_none_answer_clears_notes() {
        let mut s = at_step(DialogueStep::AdditionalInfo);
        s.handle(heard("없어요"));
        assert_eq!(s.draft().notes, "");
    }

    #[test]
    fn test_confirmation_reads_back_draft() {
        let s = at_step(DialogueStep::Confirmation);
        let prompt = s.last_prompt().unwrap();
        assert!(prompt.contains("타이레놀"));
        assert!(prompt.contains("1회 2알"));
        assert!(prompt.contains("월, 수, 금"));
        assert!(prompt.contains("19:00"));
        assert!(prompt.contains("식후 복용"));
        assert!(prompt.ends_with(DialogueStep::Confirmation.prompt().unwrap()));
    }

    #[test]
    fn test_confirmation_save_flow() {
        let mut s = at_step(DialogueStep::Confirmation);
        let effects = s.handle(heard("저장"));
        let record = match effects.last() {
            Some(Effect::Save(record)) => record.clone(),
            other => panic!("expected save effect, got {:?}", other),
        };
        assert_eq!(record.name, "타이레놀");
        assert_eq!(record.dosage, 2);
        assert_eq!(s.step(), DialogueStep::Confirmation);

        let effects = s.handle(DialogueInput::SaveResult(Ok(())));
        assert_eq!(s.step(), DialogueStep::Saved);
        assert_eq!(
            effects,
            vec![
                Effect::Speak(MSG_SAVED.to_string()),
                Effect::Teardown,
                Effect::Navigate(Destination::Schedule {
                    reset_inputs: true,
                    restart_voice: false
                }),
                Effect::Finish(DialogueOutcome::Saved(record)),
            ]
        );
    }

    #[test]
    fn test_save_failure_reasks_confirmation() {
        let mut s = at_step(DialogueStep::Confirmation);
        s.handle(heard("네"));
        let effects = s.handle(DialogueInput::SaveResult(Err("disk full".into())));
        assert_eq!(s.step(), DialogueStep::Confirmation);
        assert_eq!(spoken(&effects)[0], MSG_SAVE_FAILED);
        assert_eq!(count(&effects, &Effect::StartListening), 1);
        // Stray second result is ignored
        assert!(s.handle(DialogueInput::SaveResult(Ok(()))).is_empty());
    }

    #[test]
    fn test_confirmation_reject_returns_to_schedule() {
        let mut s = at_step(DialogueStep::Confirmation);
        let effects = s.handle(heard("아니오"));
        assert!(s.is_cancelled());
        assert_eq!(spoken(&effects), vec![MSG_REJECTED]);
        assert!(effects.contains(&Effect::Navigate(Destination::Schedule {
            reset_inputs: false,
            restart_voice: true
        })));
        assert_eq!(
            effects.last(),
            Some(&Effect::Finish(DialogueOutcome::Cancelled))
        );
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut s = at_step(DialogueStep::Times);
        let first = s.handle(DialogueInput::Cancel);
        assert_eq!(count(&first, &Effect::Finish(DialogueOutcome::Cancelled)), 1);
        assert!(!s.is_listening());
        assert!(!s.timeout_armed());

        assert!(s.handle(DialogueInput::Cancel).is_empty());
        assert!(s.handle(heard("저녁 7시")).is_empty());
        assert!(s.handle(DialogueInput::Timeout).is_empty());
    }

    #[test]
    fn test_retry_ceiling_gives_up() {
        let mut config = VoiceConfig::default();
        config.max_consecutive_retries = 3;
        let mut s = DialogueSession::new(config);
        s.handle(DialogueInput::Begin);

        s.handle(DialogueInput::Timeout);
        s.handle(heard("글쎄요"));
        let effects = s.handle(DialogueInput::Recognition(RecognitionEvent::Error("5".into())));
        assert!(s.is_cancelled());
        assert_eq!(spoken(&effects), vec![MSG_GIVE_UP]);
        assert_eq!(
            effects.last(),
            Some(&Effect::Finish(DialogueOutcome::Cancelled))
        );
    }

    #[test]
    fn test_advancing_resets_retries() {
        let mut s = at_step(DialogueStep::InputMethod);
        s.handle(heard("글쎄요"));
        assert_eq!(s.retries(), 1);
        s.handle(heard("음성"));
        assert_eq!(s.retries(), 0);
    }

    #[test]
    fn test_unlimited_retries_when_ceiling_disabled() {
        let mut config = VoiceConfig::default();
        config.max_consecutive_retries = 0;
        let mut s = DialogueSession::new(config);
        s.handle(DialogueInput::Begin);
        for _ in 0..20 {
            s.handle(DialogueInput::Timeout);
        }
        assert!(!s.is_finished());
        assert_eq!(s.retries(), 20);
    }
}

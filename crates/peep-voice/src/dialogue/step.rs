//! Dialogue steps and their allowed transitions.
//!
//! - InputMethod -> Name (voice) | TextEntry (text)
//! - Name -> Dosage -> Days -> Times -> AdditionalTime
//! - AdditionalTime -> Times (add another) | AdditionalInfo
//! - AdditionalInfo -> Confirmation
//! - Confirmation -> Saved | Confirmation (save failed, ask again)
//! - any non-terminal step -> Cancelled

use std::fmt;

/// Current position in the reminder dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogueStep {
    /// Voice or text?
    InputMethod,
    Name,
    Dosage,
    Days,
    Times,
    /// Add another dose time?
    AdditionalTime,
    /// Free-text notes.
    AdditionalInfo,
    /// Read-back and save.
    Confirmation,
    /// Record handed to the store.
    Saved,
    Cancelled,
    /// User chose typed input; the name-entry screen takes over.
    TextEntry,
}

impl fmt::Display for DialogueStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialogueStep::InputMethod => "InputMethod",
            DialogueStep::Name => "Name",
            DialogueStep::Dosage => "Dosage",
            DialogueStep::Days => "Days",
            DialogueStep::Times => "Times",
            DialogueStep::AdditionalTime => "AdditionalTime",
            DialogueStep::AdditionalInfo => "AdditionalInfo",
            DialogueStep::Confirmation => "Confirmation",
            DialogueStep::Saved => "Saved",
            DialogueStep::Cancelled => "Cancelled",
            DialogueStep::TextEntry => "TextEntry",
        };
        write!(f, "{}", name)
    }
}

impl DialogueStep {
    /// Prompt spoken when entering or re-asking this step.
    ///
    /// For `Confirmation` this is only the closing question; the read-back of
    /// the draft is prepended by the session.
    pub fn prompt(&self) -> Option<&'static str> {
        match self {
            DialogueStep::InputMethod => Some(
                "음성으로 입력하시려면 음성, 텍스트로 입력하시려면 텍스트, 취소하시려면 취소를 말씀하세요",
            ),
            DialogueStep::Name => Some("복용할 약의 이름을 말씀해 주세요."),
            DialogueStep::Dosage => Some("한 번에 복용하는 약의 양을 말씀해 주세요."),
            DialogueStep::Days => {
                Some("어떤 요일에 약을 복용하는지 말씀해 주세요. 예를 들어, 월수금, 일주일")
            }
            DialogueStep::Times => {
                Some("약을 복용하는 시간을 말씀해 주세요. 예를 들어 23시, 저녁 7시")
            }
            DialogueStep::AdditionalTime => {
                Some("예약 시간을 추가하시려면 추가, 없으시면 다음을 말씀해주세요")
            }
            DialogueStep::AdditionalInfo => Some(
                "추가로 필요한 정보를 말씀해 주세요. 알레르기 정보나 주의 사항, 복용 주기 등",
            ),
            DialogueStep::Confirmation => {
                Some("저장하시겠습니까? 저장 또는 아니오로 대답해 주세요.")
            }
            DialogueStep::Saved | DialogueStep::Cancelled | DialogueStep::TextEntry => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DialogueStep::Saved | DialogueStep::Cancelled | DialogueStep::TextEntry
        )
    }

    /// Steps whose answer is kept verbatim rather than matched against keywords.
    pub fn is_free_text(&self) -> bool {
        matches!(self, DialogueStep::Name | DialogueStep::AdditionalInfo)
    }

    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &DialogueStep) -> bool {
        if !self.is_terminal() && *target == DialogueStep::Cancelled {
            return true;
        }
        matches!(
            (self, target),
            (DialogueStep::InputMethod, DialogueStep::Name)
                | (DialogueStep::InputMethod, DialogueStep::TextEntry)
                | (DialogueStep::Name, DialogueStep::Dosage)
                | (DialogueStep::Dosage, DialogueStep::Days)
                | (DialogueStep::Days, DialogueStep::Times)
                | (DialogueStep::Times, DialogueStep::AdditionalTime)
                | (DialogueStep::AdditionalTime, DialogueStep::Times)
                | (DialogueStep::AdditionalTime, DialogueStep::AdditionalInfo)
                | (DialogueStep::AdditionalInfo, DialogueStep::Confirmation)
                | (DialogueStep::Confirmation, DialogueStep::Saved)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

//! The single user-visible status slot.
//!
//! Every failure the user should know about ends up here as one message.
//! `Success` and `Warning` messages dismiss themselves after a delay (the
//! session arms the timer); `Error` messages stay until dismissed.

use serde::{Deserialize, Serialize};

/// Severity of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Success,
    Warning,
    Error,
}

impl StatusKind {
    /// Whether messages of this kind clear themselves after the dismiss delay.
    pub fn auto_dismisses(self) -> bool {
        !matches!(self, StatusKind::Error)
    }
}

/// A message in the status slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Monotonic id; lets a dismiss timer tell its own message from a newer one.
    pub id: u64,
    pub kind: StatusKind,
    pub message: String,
}

/// Holds at most one [`StatusMessage`].
#[derive(Debug, Default)]
pub struct StatusSlot {
    current: Option<StatusMessage>,
    next_id: u64,
}

impl StatusSlot {
    /// Replace the current message. Returns the stored message.
    pub fn raise(&mut self, kind: StatusKind, message: impl Into<String>) -> &StatusMessage {
        self.next_id += 1;
        self.current.insert(StatusMessage {
            id: self.next_id,
            kind,
            message: message.into(),
        })
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }

    /// Clear whatever message is showing. Returns `true` if one was cleared.
    pub fn dismiss(&mut self) -> bool {
        self.current.take().is_some()
    }

    /// Clear message `id` if it is still showing and auto-dismisses.
    ///
    /// A timer armed for an older message finds a different id and leaves
    /// the newer message alone.
    pub fn expire(&mut self, id: u64) -> bool {
        match &self.current {
            Some(msg) if msg.id == id && msg.kind.auto_dismisses() => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_only_clears_matching_auto_dismiss_message() {
        let mut slot = StatusSlot::default();
        let first = slot.raise(StatusKind::Success, "uploaded").id;
        let second = slot.raise(StatusKind::Warning, "some rejected").id;

        assert!(!slot.expire(first));
        assert_eq!(slot.current().map(|m| m.id), Some(second));
        assert!(slot.expire(second));
        assert!(slot.current().is_none());
    }

    #[test]
    fn errors_need_explicit_dismissal() {
        let mut slot = StatusSlot::default();
        let id = slot.raise(StatusKind::Error, "Failed to fetch PDFs.").id;
        assert!(!slot.expire(id));
        assert!(slot.dismiss());
        assert!(!slot.dismiss());
    }

    #[test]
    fn kind_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&StatusKind::Warning).unwrap(),
            "\"warning\""
        );
    }
}

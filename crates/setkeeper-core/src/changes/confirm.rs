//! Modal confirmation state machine: `{save, discard, navigate} × {shown, resolved}`.

use std::fmt;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::{Error, Result};

/// What the user is being asked to confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationKind {
    Save,
    Discard,
    Navigate,
}

impl ConfirmationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Discard => "discard",
            Self::Navigate => "navigate",
        }
    }
}

impl fmt::Display for ConfirmationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationPhase {
    Shown,
    Resolved,
}

/// Observable view of the current (or last) confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfirmationState {
    pub kind: ConfirmationKind,
    pub phase: ConfirmationPhase,
    /// Set once resolved
    pub accepted: Option<bool>,
}

/// Pending answer for a shown confirmation.
///
/// Resolves to `false` if the dialog is dismissed without an answer.
#[derive(Debug)]
pub struct ConfirmationPrompt {
    kind: ConfirmationKind,
    answer: oneshot::Receiver<bool>,
}

impl ConfirmationPrompt {
    pub const fn kind(&self) -> ConfirmationKind {
        self.kind
    }

    pub async fn answer(self) -> bool {
        self.answer.await.unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Confirmation {
    shown: Option<(ConfirmationKind, oneshot::Sender<bool>)>,
    last: Option<ConfirmationState>,
}

impl Confirmation {
    pub fn open(&mut self, kind: ConfirmationKind) -> Result<ConfirmationPrompt> {
        if let Some((shown, _)) = &self.shown {
            return Err(Error::ConfirmationPending(shown.to_string()));
        }
        let (sender, answer) = oneshot::channel();
        self.shown = Some((kind, sender));
        self.last = Some(ConfirmationState {
            kind,
            phase: ConfirmationPhase::Shown,
            accepted: None,
        });
        Ok(ConfirmationPrompt { kind, answer })
    }

    pub fn resolve(&mut self, accepted: bool) -> Result<ConfirmationKind> {
        let (kind, sender) = self.shown.take().ok_or(Error::NoConfirmation)?;
        // The prompt may have been dropped; the state still advances.
        let _ = sender.send(accepted);
        self.last = Some(ConfirmationState {
            kind,
            phase: ConfirmationPhase::Resolved,
            accepted: Some(accepted),
        });
        Ok(kind)
    }

    pub const fn state(&self) -> Option<ConfirmationState> {
        self.last
    }
}

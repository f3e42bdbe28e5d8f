//! The passphrase prompt flow.
//!
//! A two-state machine deciding whether a passphrase is being waited for and
//! what it will be used for. It does not collect the passphrase and it does
//! not run the cipher; [`crate::credentials::CredentialSession`] does both.

use crate::credentials::CredentialDraft;
use crate::error::{DossierError, Result};
use crate::models::Ciphertext;
use crate::security::SecretString;

/// What a submitted passphrase will be used for.
#[derive(Debug, Clone)]
pub enum PendingRequest {
    /// Reveal the secret of an existing credential.
    Decrypt { id: String, ciphertext: Ciphertext },
    /// Seal the secret of a new credential, then create it.
    Encrypt { draft: CredentialDraft },
    /// Seal a replacement secret for an existing credential, then update it.
    Reseal { id: String, secret: SecretString },
}

impl PendingRequest {
    /// Short description for prompts, never containing secret material.
    pub fn describe(&self) -> String {
        match self {
            Self::Decrypt { id, .. } => format!("reveal credential {id}"),
            Self::Encrypt { draft } => format!("save credential '{}'", draft.title),
            Self::Reseal { id, .. } => format!("rotate the secret of credential {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Idle,
    AwaitingPassphrase,
}

/// Holds at most one outstanding passphrase request.
#[derive(Debug, Default)]
pub struct PassphrasePrompt {
    pending: Option<PendingRequest>,
}

impl PassphrasePrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PromptState {
        match self.pending {
            Some(_) => PromptState::AwaitingPassphrase,
            None => PromptState::Idle,
        }
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// Start waiting for a passphrase.
    ///
    /// Fails with [`DossierError::PromptBusy`] if a request is already
    /// pending; that request is kept.
    pub fn request(&mut self, request: PendingRequest) -> Result<()> {
        if self.pending.is_some() {
            return Err(DossierError::PromptBusy);
        }
        self.pending = Some(request);
        Ok(())
    }

    /// Return to `Idle` and hand back the request the passphrase is for.
    ///
    /// The machine is `Idle` as soon as this returns, whatever the caller
    /// then does with the request.
    pub fn submit(&mut self) -> Result<PendingRequest> {
        self.pending.take().ok_or(DossierError::NoPendingRequest)
    }

    /// Discard the pending request.
    pub fn cancel(&mut self) -> Result<()> {
        self.pending
            .take()
            .map(drop)
            .ok_or(DossierError::NoPendingRequest)
    }
}

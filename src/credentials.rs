//! Credential viewing and sealing.
//!
//! A [`CredentialSession`] is the viewing context for credentials. It owns
//! the passphrase prompt and the map of secrets revealed so far. Revealed
//! secrets live only here, never in the store, and are zeroed when hidden or
//! when the session is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::coordinator::SyncCoordinator;
use crate::crypto::SecretCipher;
use crate::error::{DossierError, Result};
use crate::models::{Credential, Record, RecordBody, ResourceKind};
use crate::patch::{CredentialPatch, RecordPatch};
use crate::prompt::{PassphrasePrompt, PendingRequest};
use crate::security::SecretString;

/// A credential as typed by the user, secret still in the clear.
#[derive(Debug, Clone)]
pub struct CredentialDraft {
    pub title: String,
    pub username: String,
    pub secret: SecretString,
    pub url: Option<String>,
    pub notes: Option<String>,
}

/// Result of a successful passphrase submission.
#[derive(Debug)]
pub enum Submitted {
    /// The secret of credential `id` is now revealed.
    Revealed { id: String },
    /// A new credential was sealed and stored.
    Created(Record),
    /// An existing credential got a new sealed secret.
    Resealed(Record),
}

/// Result of toggling a credential's visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Hidden,
    NeedsPassphrase,
}

pub struct CredentialSession {
    coordinator: Arc<SyncCoordinator>,
    cipher: SecretCipher,
    prompt: PassphrasePrompt,
    revealed: HashMap<String, SecretString>,
}

impl CredentialSession {
    pub fn new(coordinator: Arc<SyncCoordinator>, cipher: SecretCipher) -> Self {
        Self {
            coordinator,
            cipher,
            prompt: PassphrasePrompt::new(),
            revealed: HashMap::new(),
        }
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn prompt(&self) -> &PassphrasePrompt {
        &self.prompt
    }

    /// Ask for the passphrase needed to reveal credential `id`.
    ///
    /// The credential must be in the local cache.
    pub fn request_reveal(&mut self, id: &str) -> Result<()> {
        let ciphertext = self
            .coordinator
            .find(ResourceKind::Credential, id)
            .and_then(|record| record.as_credential().map(|c| c.secret.clone()))
            .ok_or_else(|| DossierError::NotFound {
                kind: ResourceKind::Credential,
                id: id.to_string(),
            })?;
        self.prompt.request(PendingRequest::Decrypt {
            id: id.to_string(),
            ciphertext,
        })
    }

    /// Ask for the passphrase that will seal and create `draft`.
    pub fn request_create(&mut self, draft: CredentialDraft) -> Result<()> {
        self.prompt.request(PendingRequest::Encrypt { draft })
    }

    /// Ask for the passphrase that will seal `secret` as the new secret of
    /// credential `id`.
    pub fn request_reseal(&mut self, id: &str, secret: SecretString) -> Result<()> {
        self.prompt.request(PendingRequest::Reseal {
            id: id.to_string(),
            secret,
        })
    }

    /// Hide `id` if revealed, otherwise ask for the passphrase to reveal it.
    pub fn toggle(&mut self, id: &str) -> Result<Toggle> {
        if self.hide(id) {
            return Ok(Toggle::Hidden);
        }
        self.request_reveal(id)?;
        Ok(Toggle::NeedsPassphrase)
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.prompt.cancel()
    }

    /// Run the pending request with `passphrase`.
    ///
    /// The prompt is back to idle before the cipher runs, so a failed
    /// attempt needs a fresh request.
    pub async fn submit(&mut self, passphrase: &SecretString) -> Result<Submitted> {
        let request = self.prompt.submit()?;
        let passphrase = passphrase.expose_secret();

        match request {
            PendingRequest::Decrypt { id, ciphertext } => {
                let plaintext = self.cipher.decrypt(&ciphertext, passphrase)?;
                debug!(id = %id, "revealed credential secret");
                self.revealed.insert(id.clone(), SecretString::new(plaintext));
                Ok(Submitted::Revealed { id })
            }
            PendingRequest::Encrypt { draft } => {
                let secret = self.cipher.encrypt(draft.secret.expose_secret(), passphrase)?;
                let body = RecordBody::Credential(Credential {
                    title: draft.title,
                    username: draft.username,
                    secret,
                    url: draft.url,
                    notes: draft.notes,
                });
                let record = self.coordinator.create(ResourceKind::Credential, body).await?;
                Ok(Submitted::Created(record))
            }
            PendingRequest::Reseal { id, secret } => {
                let sealed = self.cipher.encrypt(secret.expose_secret(), passphrase)?;
                let patch = RecordPatch::Credential(CredentialPatch {
                    secret: Some(sealed),
                    ..CredentialPatch::default()
                });
                let record = self
                    .coordinator
                    .update(ResourceKind::Credential, &id, patch)
                    .await?;
                self.revealed.remove(&id);
                Ok(Submitted::Resealed(record))
            }
        }
    }

    /// Reload `kind` from the backend. After a credential reload, secrets of
    /// credentials that no longer exist are forgotten.
    pub async fn refresh(&mut self, kind: ResourceKind) -> Result<()> {
        self.coordinator.refresh(kind).await?;
        if kind == ResourceKind::Credential {
            let coordinator = &self.coordinator;
            let before = self.revealed.len();
            self.revealed
                .retain(|id, _| coordinator.find(ResourceKind::Credential, id).is_some());
            if self.revealed.len() != before {
                debug!(
                    dropped = before - self.revealed.len(),
                    "forgot secrets of removed credentials"
                );
            }
        }
        Ok(())
    }

    /// The revealed secret of `id`, if any.
    pub fn revealed(&self, id: &str) -> Option<&SecretString> {
        self.revealed.get(id)
    }

    pub fn is_revealed(&self, id: &str) -> bool {
        self.revealed.contains_key(id)
    }

    /// Forget the revealed secret of `id`. Returns whether one was shown.
    pub fn hide(&mut self, id: &str) -> bool {
        self.revealed.remove(id).is_some()
    }

    pub fn hide_all(&mut self) {
        self.revealed.clear();
    }
}

//! dossier: a personal tracker for credentials, message templates, profile
//! descriptions, tasks, outreach drafts and social post drafts.
//!
//! The library keeps per-kind caches in step with a persistence backend
//! through [`SyncCoordinator`], seals credential secrets with a passphrase
//! through [`SecretCipher`] and gates every passphrase use behind the
//! [`PassphrasePrompt`] state machine owned by a [`CredentialSession`].

pub mod backend;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod file_store;
pub mod filter;
pub mod identity;
pub mod interactive;
pub mod logging;
pub mod models;
pub mod patch;
pub mod prompt;
pub mod security;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use backend::{MemoryBackend, RecordBackend};
pub use coordinator::SyncCoordinator;
pub use credentials::{CredentialDraft, CredentialSession};
pub use crypto::{CipherParams, SecretCipher};
pub use error::{DossierError, Result};
pub use file_store::FileBackend;
pub use identity::{IdentityProvider, StaticIdentity};
pub use models::{Ciphertext, Record, RecordBody, ResourceKind};
pub use patch::RecordPatch;
pub use prompt::PassphrasePrompt;
pub use security::SecretString;
pub use store::ResourceStore;

//! Data models for the six tracked resource kinds.

use crate::error::{DossierError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of record categories a user keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "credentials")]
    Credential,
    #[serde(rename = "templates")]
    MessageTemplate,
    #[serde(rename = "descriptions")]
    ProfileDescription,
    #[serde(rename = "tasks")]
    Task,
    #[serde(rename = "outreach")]
    OutreachDraft,
    #[serde(rename = "posts")]
    SocialPostDraft,
}

impl ResourceKind {
    /// Every kind, in display order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Credential,
        ResourceKind::MessageTemplate,
        ResourceKind::ProfileDescription,
        ResourceKind::Task,
        ResourceKind::OutreachDraft,
        ResourceKind::SocialPostDraft,
    ];

    /// Stable plural name used on the wire and on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Credential => "credentials",
            Self::MessageTemplate => "templates",
            Self::ProfileDescription => "descriptions",
            Self::Task => "tasks",
            Self::OutreachDraft => "outreach",
            Self::SocialPostDraft => "posts",
        }
    }

    /// Human readable singular name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::MessageTemplate => "message template",
            Self::ProfileDescription => "profile description",
            Self::Task => "task",
            Self::OutreachDraft => "outreach draft",
            Self::SocialPostDraft => "social post draft",
        }
    }

    /// Position of this kind inside per-kind arrays.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Credential => 0,
            Self::MessageTemplate => 1,
            Self::ProfileDescription => 2,
            Self::Task => 3,
            Self::OutreachDraft => 4,
            Self::SocialPostDraft => 5,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResourceKind {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self> {
        // Legacy collection names are accepted too
        let kind = match s.trim().to_lowercase().as_str() {
            "credential" | "credentials" | "creds" => Self::Credential,
            "template" | "templates" | "email" | "emails" => Self::MessageTemplate,
            "description" | "descriptions" | "bio" => Self::ProfileDescription,
            "task" | "tasks" => Self::Task,
            "outreach" | "coldemail" | "coldemails" | "cold-emails" => Self::OutreachDraft,
            "post" | "posts" | "twitterbanger" | "twitterbangers" | "twitter-bangers" => {
                Self::SocialPostDraft
            }
            other => {
                return Err(DossierError::InvalidInput(format!(
                    "unknown resource kind: {other}"
                )))
            }
        };
        Ok(kind)
    }
}

/// Encrypted form of a credential secret.
///
/// Values of this type only come out of [`crate::crypto::SecretCipher::encrypt`]
/// or from deserializing a string with the sealed framing, so a cleartext
/// secret can never end up in a draft or in the store.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ciphertext(String);

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        crate::crypto::unframe(&encoded).map_err(|_| {
            serde::de::Error::custom("credential secret is not a sealed ciphertext")
        })?;
        Ok(Self(encoded))
    }
}

impl Ciphertext {
    pub(crate) fn sealed(encoded: String) -> Self {
        Self(encoded)
    }

    /// The encoded ciphertext.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({} bytes)", self.0.len())
    }
}

/// Task urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        })
    }
}

impl FromStr for Priority {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "med" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(DossierError::InvalidInput(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}

/// Task progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        })
    }
}

impl FromStr for TaskStatus {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" | "inprogress" | "doing" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(DossierError::InvalidInput(format!(
                "unknown task status: {other}"
            ))),
        }
    }
}

/// A stored login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub title: String,
    pub username: String,
    pub secret: Ciphertext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A reusable email/message template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub title: String,
    pub content: String,
    pub category: String,
}

/// Profile or bio text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDescription {
    pub title: String,
    pub content: String,
    pub category: String,
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

/// A cold outreach email draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachDraft {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<String>,
}

/// A social media post draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPostDraft {
    pub content: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Kind-specific fields of a record. Doubles as the draft sent to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fields")]
pub enum RecordBody {
    #[serde(rename = "credentials")]
    Credential(Credential),
    #[serde(rename = "templates")]
    MessageTemplate(MessageTemplate),
    #[serde(rename = "descriptions")]
    ProfileDescription(ProfileDescription),
    #[serde(rename = "tasks")]
    Task(Task),
    #[serde(rename = "outreach")]
    OutreachDraft(OutreachDraft),
    #[serde(rename = "posts")]
    SocialPostDraft(SocialPostDraft),
}

impl RecordBody {
    /// The kind this body belongs to.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Credential(_) => ResourceKind::Credential,
            Self::MessageTemplate(_) => ResourceKind::MessageTemplate,
            Self::ProfileDescription(_) => ResourceKind::ProfileDescription,
            Self::Task(_) => ResourceKind::Task,
            Self::OutreachDraft(_) => ResourceKind::OutreachDraft,
            Self::SocialPostDraft(_) => ResourceKind::SocialPostDraft,
        }
    }

    /// Short line used when listing records.
    pub fn headline(&self) -> &str {
        match self {
            Self::Credential(c) => &c.title,
            Self::MessageTemplate(t) => &t.title,
            Self::ProfileDescription(d) => &d.title,
            Self::Task(t) => &t.title,
            Self::OutreachDraft(o) => &o.title,
            Self::SocialPostDraft(p) => &p.content,
        }
    }
}

/// One persisted entity of some kind, owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: RecordBody,
}

impl Record {
    pub fn kind(&self) -> ResourceKind {
        self.body.kind()
    }

    /// Borrow the credential fields, if this is a credential.
    pub fn as_credential(&self) -> Option<&Credential> {
        match &self.body {
            RecordBody::Credential(c) => Some(c),
            _ => None,
        }
    }

    /// Borrow the task fields, if this is a task.
    pub fn as_task(&self) -> Option<&Task> {
        match &self.body {
            RecordBody::Task(t) => Some(t),
            _ => None,
        }
    }
}

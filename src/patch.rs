//! Partial updates for records.
//!
//! A [`RecordPatch`] names one kind and carries only the fields to replace.
//! Optional fields use a nested `Option`: `Some(None)` clears the field.

use crate::error::{DossierError, Result};
use crate::models::{Ciphertext, Priority, RecordBody, ResourceKind, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialPatch {
    pub title: Option<String>,
    pub username: Option<String>,
    pub secret: Option<Ciphertext>,
    pub url: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// Patch shared by message templates and profile descriptions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutreachPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Option<String>>,
    pub industry: Option<Option<String>>,
    pub company_size: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialPostPatch {
    pub content: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

/// A kind-tagged set of field replacements.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPatch {
    Credential(CredentialPatch),
    MessageTemplate(TextPatch),
    ProfileDescription(TextPatch),
    Task(TaskPatch),
    OutreachDraft(OutreachPatch),
    SocialPostDraft(SocialPostPatch),
}

fn set<T>(slot: &mut T, value: &Option<T>)
where
    T: Clone,
{
    if let Some(v) = value {
        *slot = v.clone();
    }
}

impl RecordPatch {
    /// An empty patch for `kind`.
    pub fn empty(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Credential => Self::Credential(CredentialPatch::default()),
            ResourceKind::MessageTemplate => Self::MessageTemplate(TextPatch::default()),
            ResourceKind::ProfileDescription => Self::ProfileDescription(TextPatch::default()),
            ResourceKind::Task => Self::Task(TaskPatch::default()),
            ResourceKind::OutreachDraft => Self::OutreachDraft(OutreachPatch::default()),
            ResourceKind::SocialPostDraft => Self::SocialPostDraft(SocialPostPatch::default()),
        }
    }

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

    /// Whether the patch replaces nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::empty(self.kind())
    }

    /// Apply the patch to `body` in place.
    ///
    /// Fails with `InvalidInput` when the patch and body kinds differ; the
    /// body is left untouched in that case.
    pub fn apply_to(&self, body: &mut RecordBody) -> Result<()> {
        match (self, body) {
            (Self::Credential(p), RecordBody::Credential(c)) => {
                set(&mut c.title, &p.title);
                set(&mut c.username, &p.username);
                set(&mut c.secret, &p.secret);
                set(&mut c.url, &p.url);
                set(&mut c.notes, &p.notes);
            }
            (Self::MessageTemplate(p), RecordBody::MessageTemplate(t)) => {
                set(&mut t.title, &p.title);
                set(&mut t.content, &p.content);
                set(&mut t.category, &p.category);
            }
            (Self::ProfileDescription(p), RecordBody::ProfileDescription(d)) => {
                set(&mut d.title, &p.title);
                set(&mut d.content, &p.content);
                set(&mut d.category, &p.category);
            }
            (Self::Task(p), RecordBody::Task(t)) => {
                set(&mut t.title, &p.title);
                set(&mut t.description, &p.description);
                set(&mut t.priority, &p.priority);
                set(&mut t.status, &p.status);
                set(&mut t.due_date, &p.due_date);
            }
            (Self::OutreachDraft(p), RecordBody::OutreachDraft(o)) => {
                set(&mut o.title, &p.title);
                set(&mut o.content, &p.content);
                set(&mut o.category, &p.category);
                set(&mut o.industry, &p.industry);
                set(&mut o.company_size, &p.company_size);
            }
            (Self::SocialPostDraft(p), RecordBody::SocialPostDraft(s)) => {
                set(&mut s.content, &p.content);
                set(&mut s.category, &p.category);
                set(&mut s.image_url, &p.image_url);
                set(&mut s.tags, &p.tags);
            }
            (patch, body) => {
                return Err(DossierError::InvalidInput(format!(
                    "cannot apply a {} patch to a {} record",
                    patch.kind(),
                    body.kind()
                )))
            }
        }
        Ok(())
    }

    /// Build a patch from `field=value` assignments.
    ///
    /// An empty value clears optional fields. Credential secrets cannot be
    /// assigned this way since they must be sealed first.
    pub fn from_assignments<S: AsRef<str>>(kind: ResourceKind, assignments: &[S]) -> Result<Self> {
        let mut patch = Self::empty(kind);
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (field, value) = assignment.split_once('=').ok_or_else(|| {
                DossierError::InvalidInput(format!("expected field=value, got '{assignment}'"))
            })?;
            patch.assign(field.trim(), value.trim())?;
        }
        Ok(patch)
    }

    fn assign(&mut self, field: &str, value: &str) -> Result<()> {
        let kind = self.kind();
        let unknown =
            || DossierError::InvalidInput(format!("unknown field '{field}' for {kind}"));
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match self {
            Self::Credential(p) => match field {
                "title" => p.title = Some(required(field, value)?),
                "username" => p.username = Some(required(field, value)?),
                "url" => p.url = Some(optional(value)),
                "notes" => p.notes = Some(optional(value)),
                "secret" | "password" => {
                    return Err(DossierError::InvalidInput(
                        "credential secrets must be sealed with a passphrase; use rotate"
                            .to_string(),
                    ))
                }
                _ => return Err(unknown()),
            },
            Self::MessageTemplate(p) | Self::ProfileDescription(p) => match field {
                "title" => p.title = Some(required(field, value)?),
                "content" => p.content = Some(required(field, value)?),
                "category" => p.category = Some(required(field, value)?),
                _ => return Err(unknown()),
            },
            Self::Task(p) => match field {
                "title" => p.title = Some(required(field, value)?),
                "description" => p.description = Some(value.to_string()),
                "priority" => p.priority = Some(value.parse()?),
                "status" => p.status = Some(value.parse()?),
                "due" | "due_date" => {
                    p.due_date = Some(if value.is_empty() {
                        None
                    } else {
                        Some(parse_due_date(value)?)
                    })
                }
                _ => return Err(unknown()),
            },
            Self::OutreachDraft(p) => match field {
                "title" => p.title = Some(required(field, value)?),
                "content" => p.content = Some(required(field, value)?),
                "category" => p.category = Some(optional(value)),
                "industry" => p.industry = Some(optional(value)),
                "company_size" => p.company_size = Some(optional(value)),
                _ => return Err(unknown()),
            },
            Self::SocialPostDraft(p) => match field {
                "content" => p.content = Some(required(field, value)?),
                "category" => p.category = Some(required(field, value)?),
                "image_url" => p.image_url = Some(optional(value)),
                "tags" => p.tags = Some(parse_tags(value)),
                _ => return Err(unknown()),
            },
        }
        Ok(())
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(DossierError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

/// Split a comma separated tag list, dropping blanks.
pub fn parse_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an RFC 3339 instant or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_due_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| DossierError::InvalidInput(format!("invalid due date: {value}")))
}

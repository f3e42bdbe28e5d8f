//! Pure filtering over cached collections.
//!
//! Nothing here touches the network or the store; callers hand in a slice
//! (usually [`crate::store::ResourceStore::collection`]) and get back the
//! matching subsequence in the original order.

use crate::error::{DossierError, Result};
use crate::models::{Priority, Record, RecordBody, ResourceKind, TaskStatus};
use chrono::{DateTime, Datelike, Utc};
use std::str::FromStr;

/// Fields that the free-text search looks at for each kind.
pub fn searchable_fields(body: &RecordBody) -> Vec<&str> {
    match body {
        RecordBody::Credential(c) => {
            let mut fields = vec![c.title.as_str(), c.username.as_str()];
            fields.extend(c.notes.as_deref());
            fields
        }
        RecordBody::MessageTemplate(t) => vec![&t.title, &t.content, &t.category],
        RecordBody::ProfileDescription(d) => vec![&d.title, &d.content, &d.category],
        RecordBody::Task(t) => vec![&t.title, &t.description],
        RecordBody::OutreachDraft(o) => {
            let mut fields = vec![o.title.as_str(), o.content.as_str()];
            fields.extend(o.category.as_deref());
            fields.extend(o.industry.as_deref());
            fields
        }
        RecordBody::SocialPostDraft(p) => {
            let mut fields = vec![p.content.as_str(), p.category.as_str()];
            fields.extend(p.tags.iter().map(String::as_str));
            fields
        }
    }
}

// `needle` must already be lowercased
fn contains_needle(record: &Record, needle: &str) -> bool {
    searchable_fields(&record.body)
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Case-insensitive substring match of `term` against a record.
pub fn matches(record: &Record, term: &str) -> bool {
    term.is_empty() || contains_needle(record, &term.to_lowercase())
}

/// Keep the records matching `term`. An empty term keeps everything.
pub fn filter<'a>(records: &'a [Record], term: &str) -> Vec<&'a Record> {
    if term.is_empty() {
        return records.iter().collect();
    }
    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|record| contains_needle(record, &needle))
        .collect()
}

/// The current search term of every kind, empty by default.
#[derive(Debug, Clone, Default)]
pub struct SearchTerms {
    terms: [String; 6],
}

impl SearchTerms {
    pub fn get(&self, kind: ResourceKind) -> &str {
        &self.terms[kind.index()]
    }

    pub fn set(&mut self, kind: ResourceKind, term: impl Into<String>) {
        self.terms[kind.index()] = term.into();
    }
}

/// Due date window for the task filter bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DueWindow {
    #[default]
    All,
    Today,
    ThisWeek,
    ThisMonth,
}

impl DueWindow {
    /// Whether a task with `due` falls in this window as seen at `now`.
    /// Tasks without a due date only belong to [`DueWindow::All`].
    pub fn contains(self, due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(due) = due else {
            return self == Self::All;
        };
        let (due, today) = (due.date_naive(), now.date_naive());
        match self {
            Self::All => true,
            Self::Today => due == today,
            Self::ThisWeek => due.iso_week() == today.iso_week(),
            Self::ThisMonth => due.year() == today.year() && due.month() == today.month(),
        }
    }
}

impl FromStr for DueWindow {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "today" => Ok(Self::Today),
            "week" | "this-week" => Ok(Self::ThisWeek),
            "month" | "this-month" => Ok(Self::ThisMonth),
            other => Err(DossierError::InvalidInput(format!(
                "unknown due window: {other} (expected all, today, week or month)"
            ))),
        }
    }
}

/// Structured task filter: optional priority plus a due window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub priority: Option<Priority>,
    pub due: DueWindow,
}

impl TaskFilter {
    /// Keep the tasks matching this filter. Non-task records are dropped.
    pub fn apply<'a>(&self, records: &[&'a Record], now: DateTime<Utc>) -> Vec<&'a Record> {
        records
            .iter()
            .copied()
            .filter(|record| match record.as_task() {
                Some(task) => {
                    self.priority.map_or(true, |p| task.priority == p)
                        && self.due.contains(task.due_date, now)
                }
                None => false,
            })
            .collect()
    }
}

/// Tasks split into board columns.
#[derive(Debug, Default)]
pub struct TaskBoard<'a> {
    pub todo: Vec<&'a Record>,
    pub in_progress: Vec<&'a Record>,
    pub done: Vec<&'a Record>,
}

/// Group task records by status, keeping their relative order.
pub fn group_by_status<'a>(records: &[&'a Record]) -> TaskBoard<'a> {
    let mut board = TaskBoard::default();
    for record in records.iter().copied() {
        if let Some(task) = record.as_task() {
            match task.status {
                TaskStatus::Todo => board.todo.push(record),
                TaskStatus::InProgress => board.in_progress.push(record),
                TaskStatus::Done => board.done.push(record),
            }
        }
    }
    board
}

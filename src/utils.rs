//! Terminal helpers shared by the CLI and the interactive shell.

use crate::error::Result;
use crate::models::{Record, RecordBody};
use crate::security::SecretString;
use chrono::{DateTime, Local, Utc};
use colored::*;

const MASK: &str = "••••••••";

/// Print an error message and exit.
pub fn error_exit(message: &str, code: i32) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message);
    std::process::exit(code);
}

/// Print a success message.
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print a warning message on stderr.
pub fn warning(message: &str) {
    eprintln!("{} {}", "Warning:".yellow(), message);
}

/// Clear the terminal screen.
pub fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
    use std::io::{self, Write};
    let _ = io::stdout().flush();
}

/// Prompt user with a yes/no question, with default value
pub fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    use std::io::{self, Write};

    let default_hint = if default { "Y/n" } else { "y/N" };
    print!("{prompt} [{default_hint}]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    if input.is_empty() {
        Ok(default)
    } else {
        Ok(input == "y" || input == "yes")
    }
}

/// Local time, minute precision.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max && first_line.len() == text.len() {
        return first_line.to_string();
    }
    let kept: String = first_line.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// One line per record for list output.
pub fn render_summary(record: &Record) -> String {
    let extra = match &record.body {
        RecordBody::Credential(c) => c.username.clone(),
        RecordBody::MessageTemplate(t) => format!("[{}]", t.category),
        RecordBody::ProfileDescription(d) => format!("[{}]", d.category),
        RecordBody::Task(t) => {
            let mut line = format!("{} {}", t.priority, t.status);
            if let Some(due) = t.due_date {
                line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
            }
            line
        }
        RecordBody::OutreachDraft(o) => o
            .industry
            .as_deref()
            .or(o.category.as_deref())
            .map(|s| format!("[{s}]"))
            .unwrap_or_default(),
        RecordBody::SocialPostDraft(p) => p
            .tags
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect::<Vec<_>>()
            .join(" "),
    };

    format!(
        "{}  {}  {}",
        record.id.dimmed(),
        truncate(record.body.headline(), 48).bold(),
        extra.cyan()
    )
}

/// Labelled fields of a record for detail output. The credential secret is
/// masked unless `revealed` is given.
pub fn render_details(record: &Record, revealed: Option<&SecretString>) -> Vec<(&'static str, String)> {
    let mut fields = vec![("id", record.id.clone()), ("kind", record.kind().to_string())];

    match &record.body {
        RecordBody::Credential(c) => {
            fields.push(("title", c.title.clone()));
            fields.push(("username", c.username.clone()));
            let secret = revealed
                .map(|s| s.expose_secret().to_string())
                .unwrap_or_else(|| MASK.to_string());
            fields.push(("secret", secret));
            if let Some(url) = &c.url {
                fields.push(("url", url.clone()));
            }
            if let Some(notes) = &c.notes {
                fields.push(("notes", notes.clone()));
            }
        }
        RecordBody::MessageTemplate(t) => {
            fields.push(("title", t.title.clone()));
            fields.push(("category", t.category.clone()));
            fields.push(("content", t.content.clone()));
        }
        RecordBody::ProfileDescription(d) => {
            fields.push(("title", d.title.clone()));
            fields.push(("category", d.category.clone()));
            fields.push(("content", d.content.clone()));
        }
        RecordBody::Task(t) => {
            fields.push(("title", t.title.clone()));
            fields.push(("priority", t.priority.to_string()));
            fields.push(("status", t.status.to_string()));
            if let Some(due) = t.due_date {
                fields.push(("due", format_timestamp(due)));
            }
            if !t.description.is_empty() {
                fields.push(("description", t.description.clone()));
            }
        }
        RecordBody::OutreachDraft(o) => {
            fields.push(("title", o.title.clone()));
            for (label, value) in [
                ("category", &o.category),
                ("industry", &o.industry),
                ("company_size", &o.company_size),
            ] {
                if let Some(value) = value {
                    fields.push((label, value.clone()));
                }
            }
            fields.push(("content", o.content.clone()));
        }
        RecordBody::SocialPostDraft(p) => {
            fields.push(("category", p.category.clone()));
            if !p.tags.is_empty() {
                fields.push(("tags", p.tags.join(", ")));
            }
            if let Some(url) = &p.image_url {
                fields.push(("image_url", url.clone()));
            }
            fields.push(("content", p.content.clone()));
        }
    }

    fields.push(("updated", format_timestamp(record.updated_at)));
    fields
}

/// Print [`render_details`] as aligned `label: value` lines.
pub fn print_details(record: &Record, revealed: Option<&SecretString>) {
    for (label, value) in render_details(record, revealed) {
        println!("{:>12}: {}", label.bold(), value);
    }
}

//! Command-line interface implementation.

use crate::config::Settings;
use crate::coordinator::SyncCoordinator;
use crate::credentials::{CredentialDraft, CredentialSession, Submitted};
use crate::crypto::SecretCipher;
use crate::error::{DossierError, Result};
use crate::file_store::FileBackend;
use crate::filter::{self, DueWindow, TaskFilter};
use crate::identity::StaticIdentity;
use crate::interactive::InteractiveShell;
use crate::models::{
    MessageTemplate, OutreachDraft, Priority, ProfileDescription, Record, RecordBody,
    ResourceKind, SocialPostDraft, Task, TaskStatus,
};
use crate::patch::{self, RecordPatch};
use crate::security::{self, SecretString};
use crate::utils::{self, success, warning};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable consulted before prompting for a passphrase.
pub const PASSPHRASE_ENV: &str = "DOSSIER_PASSPHRASE";

/// Personal tracker for credentials, templates, tasks and drafts.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON data file
    #[arg(short = 'f', long, global = true, env = "DOSSIER_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Owner id to act as
    #[arg(long, global = true, env = "DOSSIER_OWNER")]
    pub owner: Option<String>,

    /// Path to the settings file
    #[arg(long, global = true, env = "DOSSIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        short = 'o',
        long,
        global = true,
        value_enum,
        default_value = "text",
        help = "Output format"
    )]
    pub output: OutputFormat,

    /// Command to run; starts the interactive shell when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List records of one kind
    List {
        /// Kind to list (credentials, templates, descriptions, tasks, outreach, posts)
        kind: ResourceKind,

        /// Only show records containing this text
        #[arg(short, long)]
        search: Option<String>,

        /// Only show tasks with this priority
        #[arg(long)]
        priority: Option<Priority>,

        /// Only show tasks due in this window (all, today, week, month)
        #[arg(long)]
        due: Option<DueWindow>,

        /// Group tasks by status
        #[arg(long)]
        board: bool,
    },

    /// Add a new record
    #[command(subcommand)]
    Add(AddCommand),

    /// Change fields of a record
    Update {
        kind: ResourceKind,
        id: String,

        /// Field assignment, e.g. --set title="New title"
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        assignments: Vec<String>,
    },

    /// Decrypt and display a credential secret
    Reveal {
        /// Credential id
        id: String,
    },

    /// Replace the secret of a credential
    Rotate {
        /// Credential id
        id: String,

        /// Read the new secret from stdin
        #[arg(short = 'i', long)]
        stdin: bool,
    },

    /// Delete a record
    Delete {
        kind: ResourceKind,
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Start the interactive shell
    Shell,
}

#[derive(Subcommand, Debug)]
pub enum AddCommand {
    /// Store a login; the secret is sealed with a passphrase
    Credential {
        #[arg(long)]
        title: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        notes: Option<String>,

        /// Read the secret from stdin
        #[arg(short = 'i', long)]
        stdin: bool,
    },

    /// Save a message template
    Template(TextArgs),

    /// Save a profile description
    Description(TextArgs),

    /// Add a task
    Task {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        #[arg(long, default_value = "todo")]
        status: TaskStatus,

        /// Due date, YYYY-MM-DD or RFC 3339
        #[arg(long)]
        due: Option<String>,
    },

    /// Save an outreach draft
    Outreach {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        industry: Option<String>,
        #[arg(long)]
        company_size: Option<String>,
    },

    /// Save a social post draft
    Post {
        #[arg(long)]
        content: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        image_url: Option<String>,

        /// Comma separated tags
        #[arg(long, default_value = "")]
        tags: String,
    },
}

#[derive(Args, Debug)]
pub struct TextArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub content: String,
    #[arg(long, default_value = "general")]
    pub category: String,
}

impl AddCommand {
    fn kind(&self) -> ResourceKind {
        match self {
            Self::Credential { .. } => ResourceKind::Credential,
            Self::Template(_) => ResourceKind::MessageTemplate,
            Self::Description(_) => ResourceKind::ProfileDescription,
            Self::Task { .. } => ResourceKind::Task,
            Self::Outreach { .. } => ResourceKind::OutreachDraft,
            Self::Post { .. } => ResourceKind::SocialPostDraft,
        }
    }

    /// The draft for every kind except credentials, whose secret needs a
    /// passphrase first.
    fn plain_draft(&self) -> Result<Option<RecordBody>> {
        let body = match self {
            Self::Credential { .. } => return Ok(None),
            Self::Template(args) => RecordBody::MessageTemplate(MessageTemplate {
                title: args.title.clone(),
                content: args.content.clone(),
                category: args.category.clone(),
            }),
            Self::Description(args) => RecordBody::ProfileDescription(ProfileDescription {
                title: args.title.clone(),
                content: args.content.clone(),
                category: args.category.clone(),
            }),
            Self::Task {
                title,
                description,
                priority,
                status,
                due,
            } => RecordBody::Task(Task {
                title: title.clone(),
                description: description.clone(),
                priority: *priority,
                status: *status,
                due_date: due.as_deref().map(patch::parse_due_date).transpose()?,
            }),
            Self::Outreach {
                title,
                content,
                category,
                industry,
                company_size,
            } => RecordBody::OutreachDraft(OutreachDraft {
                title: title.clone(),
                content: content.clone(),
                category: category.clone(),
                industry: industry.clone(),
                company_size: company_size.clone(),
            }),
            Self::Post {
                content,
                category,
                image_url,
                tags,
            } => RecordBody::SocialPostDraft(SocialPostDraft {
                content: content.clone(),
                category: category.clone(),
                image_url: image_url.clone(),
                tags: patch::parse_tags(tags),
            }),
        };
        Ok(Some(body))
    }
}

impl Cli {
    /// Wire the file backend and the configured identity into a coordinator.
    pub fn connect(&self, settings: &Settings) -> Result<Arc<SyncCoordinator>> {
        let data_file = settings.resolve_data_file(self.data_file.clone())?;
        for warn in security::check_file_permissions(&data_file) {
            warning(&warn);
        }

        let identity = match settings.resolve_owner(self.owner.clone()) {
            Some(owner) => StaticIdentity::new(owner),
            None => StaticIdentity::anonymous(),
        };
        Ok(Arc::new(SyncCoordinator::new(
            Arc::new(FileBackend::new(data_file)),
            Arc::new(identity),
        )))
    }

    /// Execute the CLI command.
    pub async fn execute(&self, settings: Settings) -> Result<()> {
        let coordinator = self.connect(&settings)?;
        let cipher = SecretCipher::with_params(settings.cipher);

        let Some(command) = &self.command else {
            return InteractiveShell::new(coordinator, cipher)?.run().await;
        };

        match command {
            Commands::List {
                kind,
                search,
                priority,
                due,
                board,
            } => {
                let task_filter = (priority.is_some() || due.is_some()).then(|| TaskFilter {
                    priority: *priority,
                    due: due.unwrap_or_default(),
                });
                self.list_records(&coordinator, *kind, search.as_deref(), task_filter, *board)
                    .await
            }
            Commands::Add(add) => self.add_record(coordinator, cipher, add).await,
            Commands::Update {
                kind,
                id,
                assignments,
            } => self.update_record(&coordinator, *kind, id, assignments).await,
            Commands::Reveal { id } => self.reveal_secret(coordinator, cipher, id).await,
            Commands::Rotate { id, stdin } => {
                self.rotate_secret(coordinator, cipher, id, *stdin).await
            }
            Commands::Delete { kind, id, yes } => {
                self.delete_record(&coordinator, *kind, id, *yes).await
            }
            Commands::Shell => InteractiveShell::new(coordinator, cipher)?.run().await,
        }
    }

    /// List records of one kind.
    async fn list_records(
        &self,
        coordinator: &SyncCoordinator,
        kind: ResourceKind,
        search: Option<&str>,
        task_filter: Option<TaskFilter>,
        board: bool,
    ) -> Result<()> {
        if kind != ResourceKind::Task && (task_filter.is_some() || board) {
            return Err(DossierError::InvalidInput(
                "--priority, --due and --board only apply to tasks".to_string(),
            ));
        }

        coordinator.refresh(kind).await?;
        coordinator.set_search_term(kind, search.unwrap_or_default());
        let matching = coordinator.filtered(kind);

        let mut shown: Vec<&Record> = matching.iter().collect();
        if let Some(task_filter) = task_filter {
            shown = task_filter.apply(&shown, Utc::now());
        }

        if self.output == OutputFormat::Json {
            let json = serde_json::json!({
                "kind": kind.slug(),
                "records": shown,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
            return Ok(());
        }

        if shown.is_empty() {
            println!("No {} found", kind.slug());
            return Ok(());
        }

        if board {
            let columns = filter::group_by_status(&shown);
            for (status, records) in [
                (TaskStatus::Todo, columns.todo),
                (TaskStatus::InProgress, columns.in_progress),
                (TaskStatus::Done, columns.done),
            ] {
                println!("{} ({})", status.to_string().bold(), records.len());
                for record in records {
                    println!("  {}", utils::render_summary(record));
                }
            }
        } else {
            for record in shown {
                println!("{}", utils::render_summary(record));
            }
        }
        Ok(())
    }

    /// Add a new record.
    async fn add_record(
        &self,
        coordinator: Arc<SyncCoordinator>,
        cipher: SecretCipher,
        add: &AddCommand,
    ) -> Result<()> {
        let record = match add.plain_draft()? {
            Some(draft) => coordinator.create(add.kind(), draft).await?,
            None => {
                let AddCommand::Credential {
                    title,
                    username,
                    url,
                    notes,
                    stdin,
                } = add
                else {
                    return Err(DossierError::InvalidInput(
                        "expected a credential".to_string(),
                    ));
                };

                let secret = read_secret(*stdin, "Secret")?;
                let mut session = CredentialSession::new(coordinator, cipher);
                session.request_create(CredentialDraft {
                    title: title.clone(),
                    username: username.clone(),
                    secret,
                    url: url.clone(),
                    notes: notes.clone(),
                })?;

                let passphrase = read_passphrase(true)?;
                match session.submit(&passphrase).await? {
                    Submitted::Created(record) => record,
                    other => {
                        return Err(DossierError::InvalidInput(format!(
                            "unexpected outcome {other:?}"
                        )))
                    }
                }
            }
        };

        self.report(&record, &format!("Added {}: {}", record.kind(), record.id))
    }

    /// Change fields of a record.
    async fn update_record(
        &self,
        coordinator: &SyncCoordinator,
        kind: ResourceKind,
        id: &str,
        assignments: &[String],
    ) -> Result<()> {
        let patch = RecordPatch::from_assignments(kind, assignments)?;
        if patch.is_empty() {
            return Err(DossierError::InvalidInput("nothing to update".to_string()));
        }
        let record = coordinator.update(kind, id, patch).await?;
        self.report(&record, &format!("Updated {}: {}", kind, record.id))
    }

    /// Decrypt and display a credential secret.
    async fn reveal_secret(
        &self,
        coordinator: Arc<SyncCoordinator>,
        cipher: SecretCipher,
        id: &str,
    ) -> Result<()> {
        coordinator.refresh(ResourceKind::Credential).await?;
        let mut session = CredentialSession::new(coordinator, cipher);
        session.request_reveal(id)?;

        let passphrase = read_passphrase(false)?;
        session.submit(&passphrase).await?;

        let record = session
            .coordinator()
            .find(ResourceKind::Credential, id)
            .ok_or_else(|| DossierError::NotFound {
                kind: ResourceKind::Credential,
                id: id.to_string(),
            })?;
        let secret = session.revealed(id);

        match self.output {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "id": id,
                    "secret": secret.map(SecretString::expose_secret),
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Text => utils::print_details(&record, secret),
        }
        Ok(())
    }

    /// Replace the secret of a credential.
    async fn rotate_secret(
        &self,
        coordinator: Arc<SyncCoordinator>,
        cipher: SecretCipher,
        id: &str,
        stdin: bool,
    ) -> Result<()> {
        let secret = read_secret(stdin, "New secret")?;
        let mut session = CredentialSession::new(coordinator, cipher);
        session.request_reseal(id, secret)?;

        let passphrase = read_passphrase(true)?;
        match session.submit(&passphrase).await? {
            Submitted::Resealed(record) => {
                self.report(&record, &format!("Rotated secret of credential {id}"))
            }
            other => Err(DossierError::InvalidInput(format!(
                "unexpected outcome {other:?}"
            ))),
        }
    }

    /// Delete a record.
    async fn delete_record(
        &self,
        coordinator: &SyncCoordinator,
        kind: ResourceKind,
        id: &str,
        yes: bool,
    ) -> Result<()> {
        if !yes && !utils::prompt_yes_no(&format!("Delete {kind} {id}?"), false)? {
            return Err(DossierError::Cancelled);
        }
        coordinator.remove(kind, id).await?;

        match self.output {
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "deleted": id, "kind": kind.slug() }));
            }
            OutputFormat::Text => success(&format!("Deleted {kind}: {id}")),
        }
        Ok(())
    }

    fn report(&self, record: &Record, message: &str) -> Result<()> {
        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(record)?),
            OutputFormat::Text => success(message),
        }
        Ok(())
    }
}

fn prompt_error(err: dialoguer::Error) -> DossierError {
    DossierError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        err.to_string(),
    ))
}

/// Passphrase from `DOSSIER_PASSPHRASE`, else a masked prompt.
pub fn read_passphrase(confirm: bool) -> Result<SecretString> {
    if let Ok(passphrase) = std::env::var(PASSPHRASE_ENV) {
        return Ok(SecretString::new(passphrase));
    }

    use dialoguer::Password;
    let mut prompt = Password::new().with_prompt("Passphrase");
    if confirm {
        prompt = prompt.with_confirmation("Confirm passphrase", "Passphrases do not match");
    }
    let passphrase = prompt.interact().map_err(prompt_error)?;

    if passphrase.is_empty() {
        return Err(DossierError::Cancelled);
    }
    Ok(SecretString::new(passphrase))
}

/// Secret from stdin when `stdin` is set, else a masked prompt.
pub fn read_secret(stdin: bool, label: &str) -> Result<SecretString> {
    let secret = if stdin {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        let secret = SecretString::new(buffer.trim_end_matches(['\r', '\n']));
        zeroize::Zeroize::zeroize(&mut buffer);
        secret
    } else {
        use dialoguer::Password;
        Password::new()
            .with_prompt(label)
            .interact()
            .map(SecretString::new)
            .map_err(prompt_error)?
    };

    if secret.is_empty() {
        return Err(DossierError::InvalidInput("secret must not be empty".to_string()));
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_with_task_filters() {
        let cli = Cli::try_parse_from([
            "dossier", "list", "tasks", "--priority", "high", "--due", "week",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::List {
                kind,
                priority,
                due,
                ..
            }) => {
                assert_eq!(kind, ResourceKind::Task);
                assert_eq!(priority, Some(Priority::High));
                assert_eq!(due, Some(DueWindow::ThisWeek));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_kind_aliases() {
        let cli = Cli::try_parse_from(["dossier", "list", "coldEmails"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::List {
                kind: ResourceKind::OutreachDraft,
                ..
            })
        ));
        assert!(Cli::try_parse_from(["dossier", "list", "recipes"]).is_err());
    }

    #[test]
    fn test_update_requires_assignment() {
        assert!(Cli::try_parse_from(["dossier", "update", "tasks", "abc"]).is_err());
        let cli = Cli::try_parse_from([
            "dossier", "update", "tasks", "abc", "--set", "status=done",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Update { .. })));
    }

    #[test]
    fn test_no_subcommand_means_shell() {
        let cli = Cli::try_parse_from(["dossier", "--owner", "alice"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.owner.as_deref(), Some("alice"));
    }

    #[test]
    fn test_add_task_draft() {
        let cli = Cli::try_parse_from([
            "dossier", "add", "task", "--title", "Ship report", "--priority", "high", "--due",
            "2024-05-01",
        ])
        .unwrap();
        let Some(Commands::Add(add)) = cli.command else {
            panic!("expected add");
        };
        let draft = add.plain_draft().unwrap().unwrap();
        match draft {
            RecordBody::Task(task) => {
                assert_eq!(task.title, "Ship report");
                assert_eq!(task.priority, Priority::High);
                assert_eq!(task.status, TaskStatus::Todo);
                assert!(task.due_date.is_some());
            }
            other => panic!("unexpected draft: {other:?}"),
        }
    }

    #[test]
    fn test_add_credential_has_no_plain_draft() {
        let cli = Cli::try_parse_from([
            "dossier", "add", "credential", "--title", "Mail", "--username", "alice",
        ])
        .unwrap();
        let Some(Commands::Add(add)) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(add.kind(), ResourceKind::Credential);
        assert!(add.plain_draft().unwrap().is_none());
    }
}

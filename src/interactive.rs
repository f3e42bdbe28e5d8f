//! Interactive shell.
//!
//! Keeps one [`CredentialSession`] alive for the whole run so revealed
//! secrets can be toggled on and off without reloading.

use crate::cli::read_passphrase;
use crate::coordinator::SyncCoordinator;
use crate::credentials::{CredentialSession, Submitted, Toggle};
use crate::crypto::SecretCipher;
use crate::error::{DossierError, Result};
use crate::filter;
use crate::models::{ResourceKind, TaskStatus};
use crate::utils::{self, success, warning};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

/// Interactive tracker shell.
pub struct InteractiveShell {
    session: CredentialSession,
    editor: DefaultEditor,
    current: ResourceKind,
}

impl InteractiveShell {
    pub fn new(coordinator: Arc<SyncCoordinator>, cipher: SecretCipher) -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|err| {
            DossierError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("failed to create line editor: {err}"),
            ))
        })?;

        Ok(Self {
            session: CredentialSession::new(coordinator, cipher),
            editor,
            current: ResourceKind::Task,
        })
    }

    fn coordinator(&self) -> &SyncCoordinator {
        self.session.coordinator()
    }

    /// Run the interactive loop.
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        for kind in ResourceKind::ALL {
            // Unauthorized is fatal; anything else leaves an empty cache
            match self.session.refresh(kind).await {
                Ok(()) => {}
                Err(DossierError::Unauthorized) => return Err(DossierError::Unauthorized),
                Err(err) => warning(&format!("could not load {}: {err}", kind.slug())),
            }
        }

        loop {
            let prompt = format!("{} ", format!("dossier:{}>", self.current.slug()).cyan());
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    match self.execute_command(line).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => eprintln!("{} {}", "Error:".red(), e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("\nUse 'exit' to quit");
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {err:?}");
                    break;
                }
            }
        }

        self.session.hide_all();
        Ok(())
    }

    /// Execute one command. Returns `false` when the shell should exit.
    async fn execute_command(&mut self, input: &str) -> Result<bool> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            return Ok(true);
        };

        match command {
            "help" | "?" => self.show_help(),
            "use" => match args.first() {
                Some(kind) => {
                    self.current = kind.parse()?;
                    self.list_records();
                }
                None => eprintln!("Usage: use <kind>"),
            },
            "list" | "ls" => {
                if let Some(kind) = args.first() {
                    self.current = kind.parse()?;
                }
                self.list_records();
            }
            "search" => {
                let term = args.join(" ");
                self.coordinator().set_search_term(self.current, term);
                self.list_records();
            }
            "refresh" => {
                let kind = match args.first() {
                    Some(kind) => kind.parse()?,
                    None => self.current,
                };
                self.session.refresh(kind).await?;
                success(&format!(
                    "Loaded {} {}",
                    self.coordinator().snapshot(kind).len(),
                    kind.slug()
                ));
            }
            "board" => self.show_board(),
            "show" => match args.first() {
                Some(id) => self.show_record(id)?,
                None => eprintln!("Usage: show <id>"),
            },
            "reveal" => match args.first() {
                Some(id) => self.toggle_secret(id).await?,
                None => eprintln!("Usage: reveal <id>"),
            },
            "hide" => match args.first() {
                Some(id) => {
                    if !self.session.hide(id) {
                        println!("Credential {id} is not revealed");
                    }
                }
                None => self.session.hide_all(),
            },
            "delete" | "rm" => match args.first() {
                Some(id) => self.delete_record(id).await?,
                None => eprintln!("Usage: delete <id>"),
            },
            "clear" => utils::clear_screen(),
            "exit" | "quit" => return Ok(false),
            _ => eprintln!("Unknown command: {command}. Type 'help' for available commands."),
        }
        Ok(true)
    }

    fn list_records(&self) {
        let kind = self.current;
        let records = self.coordinator().filtered(kind);
        let term = self.coordinator().search_term(kind);

        if records.is_empty() {
            if term.is_empty() {
                println!("No {} yet", kind.slug());
            } else {
                println!("No {} matching '{term}'", kind.slug());
            }
            return;
        }
        for record in &records {
            let marker = if self.session.is_revealed(&record.id) {
                "*".yellow().to_string()
            } else {
                " ".to_string()
            };
            println!("{marker} {}", utils::render_summary(record));
        }
    }

    fn show_board(&self) {
        let tasks = self.coordinator().filtered(ResourceKind::Task);
        let refs: Vec<_> = tasks.iter().collect();
        let board = filter::group_by_status(&refs);
        for (status, column) in [
            (TaskStatus::Todo, board.todo),
            (TaskStatus::InProgress, board.in_progress),
            (TaskStatus::Done, board.done),
        ] {
            println!("{} ({})", status.to_string().bold(), column.len());
            for record in column {
                println!("  {}", utils::render_summary(record));
            }
        }
    }

    fn show_record(&self, id: &str) -> Result<()> {
        let record = self
            .coordinator()
            .find_any(id)
            .ok_or_else(|| DossierError::InvalidInput(format!("no cached record with id {id}")))?;
        utils::print_details(&record, self.session.revealed(id));
        Ok(())
    }

    /// Reveal a credential secret, or hide it if already shown.
    async fn toggle_secret(&mut self, id: &str) -> Result<()> {
        if self.session.toggle(id)? == Toggle::Hidden {
            success(&format!("Hid secret of {id}"));
            return Ok(());
        }

        let passphrase = match read_passphrase(false) {
            Ok(passphrase) => passphrase,
            Err(err) => {
                self.session.cancel()?;
                return Err(err);
            }
        };

        if let Submitted::Revealed { id } = self.session.submit(&passphrase).await? {
            self.show_record(&id)?;
        }
        Ok(())
    }

    async fn delete_record(&mut self, id: &str) -> Result<()> {
        let record = self
            .coordinator()
            .find_any(id)
            .ok_or_else(|| DossierError::InvalidInput(format!("no cached record with id {id}")))?;
        let kind = record.kind();

        if !utils::prompt_yes_no(
            &format!("Delete {kind} '{}'?", record.body.headline()),
            false,
        )? {
            return Err(DossierError::Cancelled);
        }

        self.coordinator().remove(kind, id).await?;
        self.session.hide(id);
        success(&format!("Deleted {kind}: {id}"));
        Ok(())
    }

    fn print_welcome(&self) {
        println!("{}", "dossier interactive shell".bold());
        println!("Type 'help' for available commands\n");
    }

    /// Show help message.
    fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold());
        println!("  {}            - Show this help", "help".cyan());
        println!("  {} <kind>      - Switch to a kind and list it", "use".cyan());
        println!("  {} [kind]     - List records", "list".cyan());
        println!("  {} [text]   - Filter the current kind", "search".cyan());
        println!("  {} [kind]  - Reload from storage", "refresh".cyan());
        println!("  {}           - Tasks grouped by status", "board".cyan());
        println!("  {} <id>       - Show a record", "show".cyan());
        println!("  {} <id>     - Reveal or hide a credential secret", "reveal".cyan());
        println!("  {} [id]       - Hide one or all revealed secrets", "hide".cyan());
        println!("  {} <id>     - Delete a record", "delete".cyan());
        println!("  {}           - Clear screen", "clear".cyan());
        println!("  {}            - Exit the shell", "exit".cyan());
        println!();
        println!(
            "Kinds: {}",
            ResourceKind::ALL
                .iter()
                .map(|k| k.slug())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
    }
}

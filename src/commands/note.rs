use clap::{Args, Subcommand};
use coursenotes_core::{PageKey, Patch, ResourceAddress};
use serde_json::Value;

use super::{confirm, expect_note, expect_topic, CommandError};
use crate::client::Client;

#[derive(Args)]
pub struct NoteCommand {
    #[command(subcommand)]
    pub command: NoteSubcommand,
}

#[derive(Subcommand)]
pub enum NoteSubcommand {
    /// Add a note to a topic
    Create {
        /// Topic address (COURSE/TOPIC)
        topic: ResourceAddress,

        /// Note text
        #[arg(long)]
        content: String,

        /// Optional title
        #[arg(long)]
        name: Option<String>,

        /// Optional category (e.g. definition, example)
        #[arg(long)]
        category: Option<String>,
    },

    /// Change a note's text, title or category
    Edit {
        /// Note address (COURSE/TOPIC/NOTE)
        note: ResourceAddress,

        /// New text
        #[arg(long)]
        content: Option<String>,

        /// New title
        #[arg(long)]
        name: Option<String>,

        /// New category
        #[arg(long)]
        category: Option<String>,
    },

    /// Delete a note
    Delete {
        /// Note address (COURSE/TOPIC/NOTE)
        note: ResourceAddress,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

/// Collects the note fields that were given on the command line.
fn note_fields(content: Option<&str>, name: Option<&str>, category: Option<&str>) -> Patch {
    let mut fields = Patch::new();
    for (key, value) in [("content", content), ("name", name), ("category", category)] {
        if let Some(value) = value {
            fields.insert(key.to_string(), Value::from(value));
        }
    }
    fields
}

impl NoteCommand {
    pub async fn run(&self, client: &Client) -> Result<(), CommandError> {
        client.user()?;
        client.open(PageKey::Courses).await?;
        let controller = &client.controller;

        match &self.command {
            NoteSubcommand::Create {
                topic,
                content,
                name,
                category,
            } => {
                let parent = expect_topic(*topic)?;
                let payload =
                    note_fields(Some(content.as_str()), name.as_deref(), category.as_deref());
                let note = controller
                    .create(&PageKey::Courses, payload, &parent)
                    .await?;
                println!("Created note {}/{}", parent, note["id"]);
                Ok(())
            }

            NoteSubcommand::Edit {
                note,
                content,
                name,
                category,
            } => {
                let address = expect_note(*note)?;
                let patch = note_fields(content.as_deref(), name.as_deref(), category.as_deref());
                if patch.is_empty() {
                    return Err(CommandError::Input(
                        "Nothing to change: pass --content, --name or --category".to_string(),
                    ));
                }
                controller.update(&address, patch).await?;
                Ok(())
            }

            NoteSubcommand::Delete { note, force } => {
                let address = expect_note(*note)?;
                if !*force && !confirm(&format!("Delete note {}?", address))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
                controller.remove(&address).await?;
                Ok(())
            }
        }
    }
}

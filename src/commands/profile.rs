use clap::{Args, Subcommand};
use coursenotes_core::{Patch, ResourceAddress};
use serde_json::Value;

use super::{confirm, prompt_password, CommandError, OutputFormat};
use crate::client::Client;

#[derive(Args)]
pub struct ProfileCommand {
    #[command(subcommand)]
    pub command: ProfileSubcommand,
}

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// Show your profile
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change username or email (asks for your current password)
    Update {
        /// New username
        #[arg(long)]
        username: Option<String>,

        /// New email
        #[arg(long)]
        email: Option<String>,
    },

    /// Change your password
    Password,

    /// Delete your account and sign out
    Delete {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl ProfileCommand {
    pub async fn run(&self, client: &Client) -> Result<(), CommandError> {
        client.open_profile().await?;
        let controller = &client.controller;

        match &self.command {
            ProfileSubcommand::Show { format } => {
                let snapshot = controller.snapshot();
                let Some(profile) = snapshot.profile() else {
                    return Ok(());
                };
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(profile)?),
                    OutputFormat::Text => print!("{}", profile),
                }
                Ok(())
            }

            ProfileSubcommand::Update { username, email } => {
                let mut patch = Patch::new();
                if let Some(username) = username {
                    patch.insert("username".to_string(), Value::from(username.trim()));
                }
                if let Some(email) = email {
                    patch.insert("email".to_string(), Value::from(email.trim()));
                }
                if patch.is_empty() {
                    return Err(CommandError::Input(
                        "Nothing to change: pass --username or --email".to_string(),
                    ));
                }
                let current = prompt_password("Current password")?;
                patch.insert("current_password".to_string(), Value::from(current));

                controller.update(&ResourceAddress::Flat, patch).await?;
                Ok(())
            }

            ProfileSubcommand::Password => {
                let current = prompt_password("Current password")?;
                let new_password = prompt_password("New password")?;
                if prompt_password("Repeat new password")? != new_password {
                    return Err(CommandError::Input("Passwords do not match".to_string()));
                }

                let mut patch = Patch::new();
                patch.insert("current_password".to_string(), Value::from(current));
                patch.insert("new_password".to_string(), Value::from(new_password));
                controller.update(&ResourceAddress::Flat, patch).await?;
                Ok(())
            }

            ProfileSubcommand::Delete { force } => {
                if !*force
                    && !confirm("Delete your account? This removes all your courses and notes.")?
                {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
                controller.remove(&ResourceAddress::Flat).await?;
                Ok(())
            }
        }
    }
}

//! Authentication commands for the course notes CLI.
//!
//! Login posts the credentials once and keeps the session cookies the
//! server sets; later commands restore them from `session.yaml`.

use clap::{Args, Subcommand};
use coursenotes_core::{ApiError, AuthProvider, EntityId};
use serde_json::Value;

use super::{prompt, prompt_password, CommandError};
use crate::client::Client;
use crate::config::Config;
use crate::session::SessionData;

/// Authentication commands
#[derive(Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand)]
enum AuthSubcommand {
    /// Log in with username and password
    Login {
        /// Username (prompted for if omitted)
        #[arg(long, short)]
        username: Option<String>,
    },
    /// Log out (remove the saved session)
    Logout,
    /// Show authentication status
    Status,
}

impl AuthCommand {
    pub async fn run(&self, client: &Client, config: &Config) -> Result<(), CommandError> {
        match &self.command {
            AuthSubcommand::Login { username } => login(client, username.clone()).await,
            AuthSubcommand::Logout => logout(client),
            AuthSubcommand::Status => status(client, config),
        }
    }
}

async fn login(client: &Client, username: Option<String>) -> Result<(), CommandError> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    if username.is_empty() {
        return Err(CommandError::Input("Username cannot be empty".to_string()));
    }
    let password = prompt_password("Password")?;

    let user = client.transport.login(&username, &password).await?;
    let (user_id, username) = session_identity(&user, username)?;

    client.session.save(SessionData {
        user_id,
        username: username.clone(),
        cookies: client.transport.cookies(),
    })?;
    println!("✓ Logged in as {}", username);
    Ok(())
}

/// Reads the user id (and canonical username) from the login response.
fn session_identity(user: &Value, typed: String) -> Result<(EntityId, String), CommandError> {
    let id = user
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::Decode("login response has no user id".to_string()))?;
    let username = user
        .get("username")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(typed);
    Ok((id, username))
}

fn logout(client: &Client) -> Result<(), CommandError> {
    if client.session.clear()? {
        println!("Logged out.");
    } else {
        println!("Already logged out (no saved session).");
    }
    Ok(())
}

fn status(client: &Client, config: &Config) -> Result<(), CommandError> {
    match client.session.current_user() {
        Some(user) => println!("Logged in as {} (id {})", user.username, user.id),
        None => println!("Not logged in. Run 'notes auth login' to authenticate."),
    }
    println!("Server: {}", config.server_url.value);
    println!("Session file: {}", client.session.path().display());
    Ok(())
}

use coursenotes_core::{
    AuthProvider, Capabilities, CurrentUser, HttpTransport, PageKey, SyncController,
};
use std::sync::Arc;

use crate::commands::CommandError;
use crate::config::Config;
use crate::console::{CliNavigator, ConsoleNotifier};
use crate::session::SessionAuth;

/// Everything a command needs to talk to the backend.
pub struct Client {
    pub transport: Arc<HttpTransport>,
    pub session: Arc<SessionAuth>,
    pub controller: SyncController,
}

impl Client {
    /// Builds the transport from config and restores the saved session cookies.
    pub fn connect(config: &Config) -> Result<Self, CommandError> {
        let session = Arc::new(SessionAuth::load(config.session_path())?);

        let transport = HttpTransport::new(&config.server_url.value)?
            .with_csrf_cookie(config.csrf_cookie.value.as_str());
        transport.restore_cookies(session.cookies());
        let transport = Arc::new(transport);

        let capabilities = Capabilities::new(
            session.clone(),
            Arc::new(ConsoleNotifier),
            Arc::new(CliNavigator),
        );
        let controller = SyncController::new(transport.clone(), capabilities)
            .with_flat_delete(config.flat_delete.value);

        tracing::debug!(server = %config.server_url.value, "client ready");
        Ok(Self {
            transport,
            session,
            controller,
        })
    }

    pub fn user(&self) -> Result<CurrentUser, CommandError> {
        self.session.current_user().ok_or(CommandError::NotLoggedIn)
    }

    /// Loads `page` into the controller.
    pub async fn open(&self, page: PageKey) -> Result<(), CommandError> {
        self.controller.load(page).await?;
        Ok(())
    }

    /// Loads the signed-in user's profile page and returns its key.
    pub async fn open_profile(&self) -> Result<PageKey, CommandError> {
        let page = PageKey::Profile(self.user()?.id);
        self.open(page).await?;
        Ok(page)
    }
}

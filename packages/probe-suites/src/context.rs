use std::path::PathBuf;

use probe_core::{ProbeConfig, Result, Session};

/// What every suite receives.
#[derive(Debug, Clone, Default)]
pub struct SuiteContext {
    pub config: ProbeConfig,
    /// Server-side file the copy suite writes to
    pub copy_path: Option<PathBuf>,
}

impl SuiteContext {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            copy_path: None,
        }
    }

    pub fn with_copy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.copy_path = Some(path.into());
        self
    }

    /// Opens a new autocommit session.
    pub async fn connect(&self) -> Result<Session> {
        Session::connect(&self.config).await
    }

    /// Opens a new session with autocommit off.
    pub async fn connect_manual(&self) -> Result<Session> {
        let mut session = self.connect().await?;
        session.set_autocommit(false).await?;
        Ok(session)
    }
}

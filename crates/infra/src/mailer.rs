//! Outbound email boundary.
//!
//! Delivery mechanics live behind [`Mailer`]. Orchestrators never await a
//! send: [`send_detached`] hands the email to a background task and failures
//! are logged.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Email {
    Welcome { to: String, first_name: String },
    PasswordReset { to: String, reset_token: String, reset_url: String },
    PasswordChanged { to: String },
}

impl Email {
    pub fn recipient(&self) -> &str {
        match self {
            Self::Welcome { to, .. } | Self::PasswordReset { to, .. } | Self::PasswordChanged { to } => to,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::PasswordReset { .. } => "password_reset",
            Self::PasswordChanged { .. } => "password_changed",
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

/// Fire-and-forget delivery.
pub fn send_detached(mailer: Arc<dyn Mailer>, email: Email) {
    tokio::spawn(async move {
        let kind = email.kind();
        let to = email.recipient().to_string();
        if let Err(err) = mailer.send(email).await {
            warn!(kind, to = %to, error = %format!("{err:#}"), "email delivery failed");
        }
    });
}

/// Logs emails instead of delivering them (dev default).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        info!(kind = email.kind(), to = %email.recipient(), "email sent");
        Ok(())
    }
}

/// Keeps every email in memory.
#[derive(Debug)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    count: watch::Sender<usize>,
}

impl Default for RecordingMailer {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            count: watch::channel(0).0,
        }
    }
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Wait until at least `n` emails were recorded.
    pub async fn wait_for(&self, n: usize) {
        let mut count = self.count.subscribe();
        let _ = count.wait_for(|sent| *sent >= n).await;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        let len = {
            let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
            sent.push(email);
            sent.len()
        };
        self.count.send_replace(len);
        Ok(())
    }
}

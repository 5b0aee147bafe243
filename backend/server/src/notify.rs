//! # Notifications
//!
//! Best-effort transactional email over the Resend HTTP API.
//!
//! By the time an email is sent the waitlist row has already been written, and the store is the source of
//! truth. So [`Notifier::send`] returns its own `Result`, which callers log and drop. Nothing here can fail
//! a request.
//!
//! ## Limits
//!
//! - No retry and no queue, a failed send is lost
//! - Every send is bounded by the email timeout so a hanging provider cannot stall the response
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::templates::Template;

pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Email sending is not configured")]
    NotConfigured,

    #[error("Email provider rejected the message with {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Email request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Email send timed out after {0:?}")]
    Timeout(Duration),
}

/// Provider payload, `{from, to, subject, html, text}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), NotifyError>;
}

pub struct ResendMailer {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(api_key: &str) -> Result<Self, NotifyError> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key: api_key.to_string(),
            endpoint: RESEND_ENDPOINT.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        Ok(())
    }
}

pub struct Notifier {
    mailer: Option<Arc<dyn Mailer>>,
    from: String,
    timeout: Duration,
}

impl Notifier {
    pub fn new(mailer: Option<Arc<dyn Mailer>>, from: &str, timeout: Duration) -> Self {
        Self {
            mailer,
            from: from.to_string(),
            timeout,
        }
    }

    pub async fn send(&self, to: &str, template: Template) -> Result<(), NotifyError> {
        let Some(mailer) = &self.mailer else {
            debug!("Skipping {} email, no mailer configured", template.name());
            return Err(NotifyError::NotConfigured);
        };

        let rendered = template.render();
        let email = OutgoingEmail {
            from: self.from.clone(),
            to: to.to_string(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        };

        timeout(self.timeout, mailer.deliver(&email))
            .await
            .map_err(|_| NotifyError::Timeout(self.timeout))??;

        info!("Sent {} email", template.name());
        Ok(())
    }
}

use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::utils::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnpaidNotice {
    pub student_name: String,
    pub to_email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email delivery not configured")]
    NotConfigured,
    #[error("email service returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_unpaid_notice(&self, notice: &UnpaidNotice) -> Result<(), NotifyError>;
}

/// Used when no email credentials are configured. Every send fails, so the
/// throttle is never consumed.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send_unpaid_notice(&self, _notice: &UnpaidNotice) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

/// Template variables; names must match the EmailJS template.
#[derive(Serialize)]
struct TemplateParams<'a> {
    student_name: &'a str,
    to_email: &'a str,
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: TemplateParams<'a>,
}

pub struct EmailJsNotifier {
    endpoint: String,
    service_id: String,
    template_id: String,
    public_key: String,
    private_key: Option<String>,
    sender_name: String,
    reply_email: String,
    client: Client,
}

impl EmailJsNotifier {
    pub fn new(cfg: &EmailConfig, public_key: String) -> Result<Self> {
        Ok(Self {
            endpoint: format!("{}/api/v1.0/email/send", cfg.api_url.trim_end_matches('/')),
            service_id: cfg.service_id.clone(),
            template_id: cfg.template_id.clone(),
            public_key,
            private_key: cfg.private_key.clone(),
            sender_name: cfg.sender_name.clone(),
            reply_email: cfg.reply_email.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()
                .context("failed to build HTTP client")?,
        })
    }
}

#[async_trait]
impl Notifier for EmailJsNotifier {
    async fn send_unpaid_notice(&self, notice: &UnpaidNotice) -> Result<(), NotifyError> {
        let payload = SendRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            access_token: self.private_key.as_deref(),
            template_params: TemplateParams {
                student_name: &notice.student_name,
                to_email: &notice.to_email,
                name: &self.sender_name,
                email: &self.reply_email,
            },
        };
        let resp = self.client.post(&self.endpoint).json(&payload).send().await?;
        let status = resp.status();
        if status.is_success() {
            debug!(to = %notice.to_email, "EmailJS accepted notice");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(NotifyError::Rejected { status: status.as_u16(), body })
    }
}

pub fn from_config(cfg: &EmailConfig) -> Result<Arc<dyn Notifier>> {
    match cfg.public_key.clone() {
        Some(key) if !cfg.service_id.is_empty() && !cfg.template_id.is_empty() => {
            Ok(Arc::new(EmailJsNotifier::new(cfg, key)?))
        }
        _ => {
            warn!("EmailJS credentials missing; unpaid notices will not be delivered");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}

//! Sends rendered emails through the transactional mail provider's http api.
use anyhow::{Context, Result};
use http::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use url::Url;

use crate::{error::DispatchError, metrics::Metrics, settings::MailerSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    fn new(email: impl Into<String>) -> Self {
        Self { email: email.into(), name: None }
    }
}

/// request body of the provider's send endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: &'a Address,
    to: &'a [Address],
    subject: &'a str,
    html_content: &'a str,
}

/// Parses a comma separated recipient list, dropping empty entries.
pub fn parse_recipients(raw: &str) -> Vec<Address> {
    raw.split(',').map(str::trim).filter(|email| !email.is_empty()).map(Address::new).collect()
}

#[derive(Debug, Clone)]
pub struct Mailer {
    client: reqwest::Client,
    url: Url,
    api_key: String,
    sender: Address,
    recipients: Vec<Address>,
    metrics: Metrics,
}

impl Mailer {
    pub fn new(settings: &MailerSettings, metrics: Metrics) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build http client")?;

        let recipients = parse_recipients(&settings.recipients);
        if recipients.is_empty() {
            tracing::warn!("no email recipients configured, alerts can't be delivered");
        }

        Ok(Self {
            client,
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
            sender: Address {
                email: settings.sender_email.clone(),
                name: Some(settings.sender_name.clone()),
            },
            recipients,
            metrics,
        })
    }

    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Sends one email to all configured recipients.
    ///
    /// # Arguments
    ///
    /// * `subject` - subject line of the email
    ///
    /// * `html` - html body of the email
    pub async fn send(&self, subject: &str, html: &str) -> Result<(), DispatchError> {
        if self.recipients.is_empty() {
            self.metrics.record_mail_failure(DispatchError::NoRecipients.reason(), None);
            return Err(DispatchError::NoRecipients);
        }

        let body = SendRequest {
            sender: &self.sender,
            to: &self.recipients,
            subject,
            html_content: html,
        };

        self.metrics.mail_requests.inc();
        let _timer = self.metrics.mail_duration.start_timer();

        let response = self
            .client
            .post(self.url.clone())
            .header("api-key", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                let err = DispatchError::from(err);
                self.metrics.record_mail_failure(err.reason(), None);
                err
            })?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().await.unwrap_or_default();
            let err = DispatchError::Rejected { status: status.as_u16(), body };
            self.metrics.record_mail_failure(err.reason(), Some(status.as_u16()));
            return Err(err);
        }

        tracing::debug!("mail provider accepted email with status {status}");

        Ok(())
    }
}

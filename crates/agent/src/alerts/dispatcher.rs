use itertools::Itertools;
use serde::Serialize;

use notifications::{DigestEmail, FleetDigest, Recipient, Renderer};

/// Failures of a single channel call, classified the way the pipeline needs
/// them: authentication kills the whole pass, a rejection or transport
/// error only fails the one recipient.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel authentication failed: {0}")]
    Auth(String),
    #[error("recipient rejected by channel: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

pub trait EmailSender: std::fmt::Debug + Send + Sync + 'static {
    /// Delivers one email, returning the channel's message identifier.
    fn send<'s>(
        &'s self,
        email: &'s DigestEmail,
    ) -> impl std::future::Future<Output = Result<String, ChannelError>> + Send + 's;
}

/// Sends via the Resend transactional-email REST API.
pub struct ResendSender {
    api_base: url::Url,
    api_key: String,
    from_address: String,
    reply_to_address: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for ResendSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendSender")
            .field("api_base", &self.api_base)
            .field("from_address", &self.from_address)
            .field("reply_to_address", &self.reply_to_address)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl ResendSender {
    pub fn new(
        api_key: String,
        from_address: String,
        reply_to_address: Option<String>,
        send_timeout: std::time::Duration,
    ) -> anyhow::Result<ResendSender> {
        let client = reqwest::Client::builder()
            .timeout(send_timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("building http client: {err}"))?;
        Ok(ResendSender {
            api_base: url::Url::parse("https://api.resend.com/").expect("static url parses"),
            api_key,
            from_address,
            reply_to_address,
            client,
        })
    }

    async fn send(&self, email: &DigestEmail) -> Result<String, ChannelError> {
        let to = match &email.recipient.full_name {
            Some(name) => format!("{name} <{}>", email.recipient.email),
            None => email.recipient.email.clone(),
        };
        let request = SendEmailRequest {
            from: &self.from_address,
            to: [to.as_str()],
            subject: &email.subject,
            html: &email.body,
            reply_to: self.reply_to_address.as_deref(),
        };
        let url = self
            .api_base
            .join("emails")
            .expect("static path joins cleanly");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", &email.idempotency_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ChannelError::Transport(format!("{err:#}")))?;

        let status = response.status();
        if status.is_success() {
            let parsed: SendEmailResponse = response
                .json()
                .await
                .map_err(|err| ChannelError::Transport(format!("reading send response: {err:#}")))?;
            tracing::debug!(
                to = %email.recipient.email,
                message_id = %parsed.id,
                "sent digest email"
            );
            return Ok(parsed.id);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = format!("{status}: {body}");
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(ChannelError::Auth(detail))
            }
            s if s.is_client_error() => Err(ChannelError::Rejected(detail)),
            _ => Err(ChannelError::Transport(detail)),
        }
    }
}

/// The configured channel. `Disabled` keeps local stacks from emailing
/// anyone while still exercising the whole pipeline.
#[derive(Debug)]
pub enum Sender {
    Disabled,
    Resend(ResendSender),
}

impl Sender {
    pub fn resend(
        api_key: String,
        from_address: String,
        reply_to_address: Option<String>,
        send_timeout: std::time::Duration,
    ) -> anyhow::Result<Sender> {
        Ok(Sender::Resend(ResendSender::new(
            api_key,
            from_address,
            reply_to_address,
            send_timeout,
        )?))
    }
}

impl EmailSender for Sender {
    async fn send<'s>(&'s self, email: &'s DigestEmail) -> Result<String, ChannelError> {
        match self {
            Sender::Disabled => {
                tracing::warn!(
                    to = %email.recipient.email,
                    subject = %email.subject,
                    "skipping digest email (sending disabled)"
                );
                Ok(format!("skipped/{}", email.idempotency_key))
            }
            Sender::Resend(resend) => resend.send(email).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReceipt {
    pub email: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryFailure {
    pub email: String,
    pub error: String,
}

/// Per-recipient results of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub accepted: Vec<DeliveryReceipt>,
    pub rejected: Vec<DeliveryFailure>,
}

impl DispatchOutcome {
    /// Whether suppression state may advance: every recipient accepted.
    pub fn fully_delivered(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no recipients are configured")]
    NoRecipients,
    #[error("rendering digest")]
    Render(#[source] anyhow::Error),
    /// Authentication is a configuration problem, not a per-recipient one;
    /// the whole pass aborts without touching suppression state.
    #[error("channel authentication failed")]
    Auth(#[source] ChannelError),
}

/// Renders one digest and fans it out to the fixed distribution list.
#[derive(Debug)]
pub struct Dispatcher<S: EmailSender> {
    renderer: Renderer,
    sender: S,
    recipients: Vec<Recipient>,
}

impl<S: EmailSender> Dispatcher<S> {
    pub fn new(sender: S, recipients: Vec<Recipient>) -> anyhow::Result<Dispatcher<S>> {
        Ok(Dispatcher {
            renderer: Renderer::try_new()?,
            sender,
            recipients,
        })
    }

    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    /// Sends the digest to every recipient, collecting per-recipient
    /// outcomes. A failed recipient never blocks the others; sends run
    /// concurrently and are aggregated once all have settled.
    #[tracing::instrument(skip_all, fields(vehicles = digest.vehicle_count))]
    pub async fn dispatch(&self, digest: &FleetDigest) -> Result<DispatchOutcome, DispatchError> {
        if digest.is_empty() {
            tracing::debug!("empty digest, nothing to send");
            return Ok(DispatchOutcome::default());
        }
        if self.recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }
        let emails = self
            .renderer
            .render_emails(digest, &self.recipients)
            .map_err(DispatchError::Render)?;

        let sends = emails.iter().map(|email| async move {
            let result = self.sender.send(email).await;
            (email, result)
        });
        let settled = futures::future::join_all(sends).await;

        let mut outcome = DispatchOutcome::default();
        let mut auth_failure = None;
        for (email, result) in settled {
            match result {
                Ok(message_id) => outcome.accepted.push(DeliveryReceipt {
                    email: email.recipient.email.clone(),
                    message_id,
                }),
                Err(error) => {
                    tracing::warn!(
                        to = %email.recipient.email,
                        error = %error,
                        "digest delivery failed for recipient"
                    );
                    if matches!(error, ChannelError::Auth(_)) {
                        auth_failure = Some(error.clone());
                    }
                    outcome.rejected.push(DeliveryFailure {
                        email: email.recipient.email.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }

        if let Some(error) = auth_failure {
            return Err(DispatchError::Auth(error));
        }

        tracing::info!(
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            rejected_recipients = %outcome.rejected.iter().map(|f| f.email.as_str()).join(", "),
            "digest fan-out settled"
        );
        Ok(outcome)
    }
}

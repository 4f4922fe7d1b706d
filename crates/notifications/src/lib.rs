//! Rendering of the fleet maintenance digest.
//!
//! One evaluation pass produces at most one digest document, which is then
//! fanned out verbatim to every configured recipient. The `Renderer` owns a
//! handlebars registry whose templates are registered once at startup, so a
//! malformed template fails the daemon immediately rather than the first
//! send.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use models::{Alert, AlertSeverity, VehicleId, VehicleSnapshot};

mod digest;

/// A member of the fixed distribution list. Recipients are configuration
/// data, not code: the list is parsed from the daemon's configuration and
/// handed to the dispatcher as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl Recipient {
    /// Parses a single `email` or `Full Name <email>` entry.
    fn parse(entry: &str) -> anyhow::Result<Recipient> {
        if let Some((name, rest)) = entry.split_once('<') {
            let email = rest
                .trim()
                .strip_suffix('>')
                .with_context(|| format!("malformed recipient '{entry}': missing closing '>'"))?
                .trim();
            anyhow::ensure!(
                email.contains('@'),
                "malformed recipient '{entry}': '{email}' is not an email address"
            );
            let name = name.trim();
            Ok(Recipient {
                email: email.to_string(),
                full_name: (!name.is_empty()).then(|| name.to_string()),
            })
        } else {
            anyhow::ensure!(
                entry.contains('@'),
                "malformed recipient '{entry}': not an email address"
            );
            Ok(Recipient {
                email: entry.to_string(),
                full_name: None,
            })
        }
    }
}

/// Parses a comma-separated distribution list, e.g.
/// `Ops Desk <ops@fleet.example>, mechanic@fleet.example`.
pub fn parse_recipient_list(input: &str) -> anyhow::Result<Vec<Recipient>> {
    let mut recipients = Vec::new();
    for entry in input.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        recipients.push(Recipient::parse(entry)?);
    }
    anyhow::ensure!(!recipients.is_empty(), "recipient list is empty");
    Ok(recipients)
}

/// One alert row within a vehicle's digest section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertLine {
    pub label: String,
    pub severity_class: String,
    pub overdue: bool,
    pub message: String,
}

impl AlertLine {
    fn new(alert: &Alert) -> AlertLine {
        let overdue = alert.severity == AlertSeverity::Overdue;
        AlertLine {
            label: alert.alert_type.label().to_string(),
            severity_class: if overdue { "overdue" } else { "due-soon" }.to_string(),
            overdue,
            message: alert.message.clone(),
        }
    }
}

/// One vehicle's section of the digest: identity, odometer, last-updated
/// date, an out-of-service banner when applicable, and the alert rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSection {
    pub vehicle_id: VehicleId,
    pub unit_label: String,
    pub odometer: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    pub out_of_service: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_of_service_reason: Option<String>,
    pub has_alerts: bool,
    pub alerts: Vec<AlertLine>,
}

impl VehicleSection {
    pub fn new(snapshot: &VehicleSnapshot, alerts: &[Alert]) -> VehicleSection {
        VehicleSection {
            vehicle_id: snapshot.id.clone(),
            unit_label: snapshot.unit_label.clone(),
            odometer: snapshot.odometer,
            last_updated: snapshot
                .last_updated
                .map(|ts| ts.format("%Y-%m-%d").to_string()),
            out_of_service: snapshot.is_out_of_service(),
            out_of_service_reason: snapshot
                .is_out_of_service()
                .then(|| snapshot.out_of_service_reason.clone())
                .flatten(),
            has_alerts: !alerts.is_empty(),
            alerts: alerts.iter().map(AlertLine::new).collect(),
        }
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }
}

/// The full render context for one digest document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetDigest {
    /// Identifies this batch; recipient idempotency keys derive from it.
    pub batch_id: uuid::Uuid,
    pub generated_at: String,
    pub vehicle_count: usize,
    pub alert_count: usize,
    pub out_of_service_count: usize,
    pub summary: String,
    pub vehicles: Vec<VehicleSection>,
}

impl FleetDigest {
    pub fn new(generated_at: DateTime<Utc>, vehicles: Vec<VehicleSection>) -> FleetDigest {
        let alert_count = vehicles.iter().map(VehicleSection::alert_count).sum();
        let out_of_service_count = vehicles.iter().filter(|v| v.out_of_service).count();
        let summary = summary_line(vehicles.len(), alert_count, out_of_service_count);
        FleetDigest {
            batch_id: uuid::Uuid::new_v4(),
            generated_at: generated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            vehicle_count: vehicles.len(),
            alert_count,
            out_of_service_count,
            summary,
            vehicles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

fn summary_line(vehicle_count: usize, alert_count: usize, out_of_service_count: usize) -> String {
    let mut line = if vehicle_count == 1 {
        "1 vehicle needs attention".to_string()
    } else {
        format!("{vehicle_count} vehicles need attention")
    };
    let mut details = Vec::new();
    if alert_count > 0 {
        details.push(format!(
            "{alert_count} open alert{}",
            if alert_count == 1 { "" } else { "s" }
        ));
    }
    if out_of_service_count > 0 {
        details.push(format!("{out_of_service_count} out of service"));
    }
    if !details.is_empty() {
        line.push_str(&format!(" ({})", details.join(", ")));
    }
    line
}

/// A rendered digest, before fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDigest {
    pub subject: String,
    pub body: String,
}

/// One email ready to hand to the notification channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestEmail {
    /// Stable per-(batch, recipient) key, so that a retried pass does not
    /// double-deliver to recipients the channel already accepted.
    pub idempotency_key: String,
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
}

pub struct Renderer {
    registry: handlebars::Handlebars<'static>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}

impl Renderer {
    pub fn try_new() -> anyhow::Result<Renderer> {
        let mut registry = handlebars::Handlebars::new();
        digest::register_templates(&mut registry)?;
        Ok(Renderer { registry })
    }

    pub fn render_digest(&self, digest: &FleetDigest) -> anyhow::Result<RenderedDigest> {
        let subject = self
            .registry
            .render(digest::DIGEST_SUBJECT, digest)
            .context("rendering digest subject")?;
        let body = self
            .registry
            .render(digest::DIGEST_BODY, digest)
            .context("rendering digest body")?;
        Ok(RenderedDigest { subject, body })
    }

    /// Renders the digest once and pairs it with every recipient.
    pub fn render_emails(
        &self,
        digest: &FleetDigest,
        recipients: &[Recipient],
    ) -> anyhow::Result<Vec<DigestEmail>> {
        let rendered = self.render_digest(digest)?;
        tracing::debug!(
            batch_id = %digest.batch_id,
            vehicles = digest.vehicle_count,
            recipients = recipients.len(),
            "rendered fleet digest"
        );
        Ok(recipients
            .iter()
            .map(|recipient| DigestEmail {
                idempotency_key: format!("{}/{}", digest.batch_id, recipient.email),
                recipient: recipient.clone(),
                subject: rendered.subject.clone(),
                body: rendered.body.clone(),
            })
            .collect())
    }
}

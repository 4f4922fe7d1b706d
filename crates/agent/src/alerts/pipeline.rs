use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use models::{AlertType, VehicleId};
use notifications::{FleetDigest, VehicleSection};

use super::dispatcher::{Dispatcher, EmailSender};
use super::evaluator::{evaluate, AlertThresholds};
use super::suppression::{batch_decision, BatchDecision};
use crate::store::VehicleStore;

/// What started this pass. Purely informational; both triggers run the
/// identical pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl Default for Trigger {
    fn default() -> Trigger {
        Trigger::Scheduled
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Scheduled => f.write_str("scheduled"),
            Trigger::Manual => f.write_str("manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassOptions {
    pub trigger: Trigger,
    /// Skips the 7-day batch gate. The clearance gate still applies: this
    /// is a verification escape hatch, not a different rule set.
    pub bypass_batch_gate: bool,
}

/// The result of one evaluate → suppress → dispatch pass, surfaced by both
/// trigger layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassSummary {
    pub vehicles_evaluated: usize,
    pub vehicles_alerting: usize,
    pub out_of_service: usize,
    pub vehicles_suppressed: usize,
    pub vehicles_included: usize,
    /// Counts of alerts firing per kind, across the whole fleet.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alerts_fired: BTreeMap<AlertType, usize>,
    /// True when a digest went out and every recipient accepted it.
    pub digest_sent: bool,
    pub recipients_accepted: usize,
    pub recipients_rejected: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delivery_failures: Vec<String>,
}

fn count(map: &mut BTreeMap<AlertType, usize>, alert_type: AlertType) {
    let n = map.entry(alert_type).or_default();
    *n += 1;
}

/// One shared pipeline instance serves both triggers. Passes are serialized
/// behind an in-process lock so a manual run cannot interleave with the
/// scheduled one against the same suppression state.
#[derive(Debug)]
pub struct AlertPipeline<V: VehicleStore, S: EmailSender> {
    store: Arc<V>,
    dispatcher: Dispatcher<S>,
    thresholds: AlertThresholds,
    store_timeout: std::time::Duration,
    pass_lock: tokio::sync::Mutex<()>,
}

impl<V: VehicleStore, S: EmailSender> AlertPipeline<V, S> {
    pub fn new(
        store: Arc<V>,
        dispatcher: Dispatcher<S>,
        thresholds: AlertThresholds,
    ) -> AlertPipeline<V, S> {
        AlertPipeline {
            store,
            dispatcher,
            thresholds,
            store_timeout: std::time::Duration::from_secs(10),
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub async fn run(&self, options: PassOptions) -> anyhow::Result<PassSummary> {
        self.run_at(options, Utc::now()).await
    }

    #[tracing::instrument(skip_all, fields(trigger = %options.trigger, bypass = options.bypass_batch_gate))]
    pub(crate) async fn run_at(
        &self,
        options: PassOptions,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PassSummary> {
        let _guard = self.pass_lock.lock().await;
        let start_time = std::time::Instant::now();
        let result = self.run_locked(&options, now).await;
        let duration = start_time.elapsed();

        match &result {
            Ok(summary) => {
                tracing::info!(?summary, duration_ms = %duration.as_millis(), "alert pass finished");
            }
            Err(error) => {
                tracing::error!(?error, duration_ms = %duration.as_millis(), "alert pass failed");
            }
        }
        result
    }

    async fn run_locked(
        &self,
        options: &PassOptions,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PassSummary> {
        let vehicles = self
            .bounded(self.store.load_vehicles())
            .await
            .context("loading vehicle snapshots")?;

        let mut summary = PassSummary::default();
        let mut sections: Vec<VehicleSection> = Vec::new();
        let mut included: Vec<VehicleId> = Vec::new();

        for snapshot in &vehicles {
            summary.vehicles_evaluated += 1;

            let state = self
                .bounded(self.store.alert_state(&snapshot.id))
                .await
                .with_context(|| format!("loading alert state for {}", snapshot.id))?;

            let alerts = evaluate(snapshot, &state.clearances, &self.thresholds, now);
            if !alerts.is_empty() {
                summary.vehicles_alerting += 1;
                for alert in &alerts {
                    count(&mut summary.alerts_fired, alert.alert_type);
                }
            }
            if snapshot.is_out_of_service() {
                summary.out_of_service += 1;
            }

            match batch_decision(
                snapshot,
                &alerts,
                &state.suppression,
                now,
                options.bypass_batch_gate,
            ) {
                BatchDecision::Include => {
                    sections.push(VehicleSection::new(snapshot, &alerts));
                    included.push(snapshot.id.clone());
                }
                BatchDecision::SuppressedRecentBatch => {
                    summary.vehicles_suppressed += 1;
                    tracing::debug!(
                        vehicle = %snapshot.id,
                        last_batch_sent_at = ?state.suppression.last_batch_sent_at,
                        "vehicle suppressed: batched within the rebatch window"
                    );
                }
                BatchDecision::NothingToReport => {}
            }
        }

        summary.vehicles_included = included.len();
        if sections.is_empty() {
            tracing::info!("no vehicles qualify for a digest");
            return Ok(summary);
        }

        let digest = FleetDigest::new(now, sections);
        let outcome = self
            .dispatcher
            .dispatch(&digest)
            .await
            .context("dispatching digest")?;

        summary.recipients_accepted = outcome.accepted.len();
        summary.recipients_rejected = outcome.rejected.len();
        summary.delivery_failures = outcome
            .rejected
            .iter()
            .map(|failure| format!("{}: {}", failure.email, failure.error))
            .collect();

        if outcome.fully_delivered() {
            self.bounded(self.store.record_batch_sent(&included, now))
                .await
                .context("recording batch send")?;
            summary.digest_sent = true;
        } else {
            // Some recipients already have the digest, but re-delivery on
            // the next pass beats silently dropping these vehicles.
            tracing::warn!(
                rejected = outcome.rejected.len(),
                "digest delivery incomplete; suppression state left unchanged"
            );
        }

        Ok(summary)
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("store call timed out after {:?}", self.store_timeout),
        }
    }
}

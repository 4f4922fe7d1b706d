use chrono::{DateTime, Duration, Utc};

use models::{Alert, SuppressionRecord, VehicleSnapshot};

/// How long a vehicle stays out of new digests after it was included in a
/// successfully delivered one.
pub const REBATCH_WINDOW_DAYS: i64 = 7;

/// Per-vehicle outcome of the batch gate for one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDecision {
    /// The vehicle goes into this pass's digest.
    Include,
    /// The vehicle has something to report but was batched too recently.
    SuppressedRecentBatch,
    /// Nothing to report: no alerts and the vehicle is in service.
    NothingToReport,
}

/// Decides whether one vehicle belongs in this pass's digest.
///
/// A vehicle qualifies if it has at least one alert or is out of service,
/// and was not included in a successful batch within the rebatch window.
/// The window check is per vehicle and independent of the rest of the
/// fleet. `bypass` skips the window (the manual trigger's escape hatch);
/// it never skips the per-kind clearance gate, which ran during evaluation.
pub fn batch_decision(
    snapshot: &VehicleSnapshot,
    alerts: &[Alert],
    suppression: &SuppressionRecord,
    now: DateTime<Utc>,
    bypass: bool,
) -> BatchDecision {
    if alerts.is_empty() && !snapshot.is_out_of_service() {
        return BatchDecision::NothingToReport;
    }
    if bypass {
        return BatchDecision::Include;
    }
    match suppression.last_batch_sent_at {
        Some(sent_at) if now - sent_at <= Duration::days(REBATCH_WINDOW_DAYS) => {
            BatchDecision::SuppressedRecentBatch
        }
        _ => BatchDecision::Include,
    }
}

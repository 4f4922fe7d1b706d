use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use models::{Alert, AlertSeverity, AlertType, ClearanceSet, VehicleSnapshot};

/// How long a mechanic's dismissal keeps an alert kind quiet. After this
/// window elapses the kind re-activates lazily on the next evaluation.
pub const CLEARANCE_WINDOW_DAYS: i64 = 7;

/// Thresholds for one mileage-based maintenance item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MileageRule {
    /// Miles between services.
    pub interval: i64,
    /// A due-soon alert fires once the vehicle is within this many miles of
    /// the next due point.
    pub warn_within: i64,
}

/// Threshold for one date-based compliance document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRule {
    /// A due-soon alert fires once the expiry is this many days out.
    pub warn_within_days: i64,
}

/// The full rule parameter set. The defaults are the fixed business
/// thresholds; deployments may override them through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub oil_change: MileageRule,
    pub brake_service: MileageRule,
    pub tire_replacement: MileageRule,
    pub registration_expiry: DateRule,
    pub insurance_expiry: DateRule,
}

impl Default for AlertThresholds {
    fn default() -> AlertThresholds {
        AlertThresholds {
            oil_change: MileageRule {
                interval: 5_000,
                warn_within: 500,
            },
            brake_service: MileageRule {
                interval: 25_000,
                warn_within: 2_500,
            },
            tire_replacement: MileageRule {
                interval: 40_000,
                warn_within: 4_000,
            },
            registration_expiry: DateRule {
                warn_within_days: 30,
            },
            insurance_expiry: DateRule {
                warn_within_days: 30,
            },
        }
    }
}

impl AlertThresholds {
    fn mileage_rule(&self, kind: AlertType) -> Option<MileageRule> {
        match kind {
            AlertType::OilChange => Some(self.oil_change),
            AlertType::BrakeService => Some(self.brake_service),
            AlertType::TireReplacement => Some(self.tire_replacement),
            AlertType::RegistrationExpiry | AlertType::InsuranceExpiry => None,
        }
    }

    fn date_rule(&self, kind: AlertType) -> Option<DateRule> {
        match kind {
            AlertType::RegistrationExpiry => Some(self.registration_expiry),
            AlertType::InsuranceExpiry => Some(self.insurance_expiry),
            AlertType::OilChange | AlertType::BrakeService | AlertType::TireReplacement => None,
        }
    }
}

/// Computes the alerts currently firing for one vehicle. Pure: the same
/// inputs always produce the same alert set, and the clearance map is an
/// input rather than something read from a store.
///
/// Alerts come back in the fixed kind order of `AlertType::all()` so that
/// rendered digests are deterministic.
pub fn evaluate(
    snapshot: &VehicleSnapshot,
    clearances: &ClearanceSet,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let today = now.date_naive();
    let mut alerts = Vec::new();

    for kind in AlertType::all() {
        if clearances.cleared_within(*kind, now, Duration::days(CLEARANCE_WINDOW_DAYS)) {
            continue;
        }
        let alert = if let Some(rule) = thresholds.mileage_rule(*kind) {
            evaluate_mileage(snapshot, *kind, rule)
        } else if let Some(rule) = thresholds.date_rule(*kind) {
            evaluate_expiry(snapshot, *kind, rule, today)
        } else {
            None
        };
        alerts.extend(alert);
    }

    alerts
}

fn evaluate_mileage(
    snapshot: &VehicleSnapshot,
    kind: AlertType,
    rule: MileageRule,
) -> Option<Alert> {
    // A vehicle with no recorded service is maximally overdue, not an error.
    let last_serviced = snapshot
        .service_history(kind)
        .and_then(|history| history.last_service_odometer)
        .unwrap_or(0);
    let next_due = last_serviced + rule.interval;

    if snapshot.odometer >= next_due {
        Some(Alert {
            vehicle_id: snapshot.id.clone(),
            alert_type: kind,
            severity: AlertSeverity::Overdue,
            message: format!(
                "{} overdue by {} miles (last serviced at {} mi, due at {} mi)",
                kind.label(),
                snapshot.odometer - next_due,
                last_serviced,
                next_due,
            ),
        })
    } else if snapshot.odometer >= next_due - rule.warn_within {
        Some(Alert {
            vehicle_id: snapshot.id.clone(),
            alert_type: kind,
            severity: AlertSeverity::DueSoon,
            message: format!(
                "{} due in {} miles (due at {} mi)",
                kind.label(),
                next_due - snapshot.odometer,
                next_due,
            ),
        })
    } else {
        None
    }
}

fn evaluate_expiry(
    snapshot: &VehicleSnapshot,
    kind: AlertType,
    rule: DateRule,
    today: NaiveDate,
) -> Option<Alert> {
    // A document with no recorded expiry is not yet configured; skip it.
    let expiry = snapshot.document_expiry(kind)?;
    let days_until = (expiry - today).num_days();

    if days_until <= 0 {
        let message = if days_until == 0 {
            format!("{} expires today ({})", kind.label(), expiry)
        } else {
            format!(
                "{} expired {} day{} ago (on {})",
                kind.label(),
                -days_until,
                if days_until == -1 { "" } else { "s" },
                expiry,
            )
        };
        Some(Alert {
            vehicle_id: snapshot.id.clone(),
            alert_type: kind,
            severity: AlertSeverity::Overdue,
            message,
        })
    } else if days_until <= rule.warn_within_days {
        Some(Alert {
            vehicle_id: snapshot.id.clone(),
            alert_type: kind,
            severity: AlertSeverity::DueSoon,
            message: format!(
                "{} expires in {} day{} (on {})",
                kind.label(),
                days_until,
                if days_until == 1 { "" } else { "s" },
                expiry,
            ),
        })
    } else {
        None
    }
}

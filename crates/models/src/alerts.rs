use serde::{Deserialize, Serialize};

use crate::VehicleId;

/// The fixed set of maintenance warnings the engine knows how to raise.
/// Variant order is the order alerts are reported in for a vehicle, so that
/// rendered digests are deterministic.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    OilChange,
    RegistrationExpiry,
    InsuranceExpiry,
    BrakeService,
    TireReplacement,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl AlertType {
    pub fn name(&self) -> &'static str {
        match self {
            AlertType::OilChange => "oil_change",
            AlertType::RegistrationExpiry => "registration_expiry",
            AlertType::InsuranceExpiry => "insurance_expiry",
            AlertType::BrakeService => "brake_service",
            AlertType::TireReplacement => "tire_replacement",
        }
    }

    /// Human-readable label used in rendered digests.
    pub fn label(&self) -> &'static str {
        match self {
            AlertType::OilChange => "Oil change",
            AlertType::RegistrationExpiry => "Registration",
            AlertType::InsuranceExpiry => "Insurance",
            AlertType::BrakeService => "Brake service",
            AlertType::TireReplacement => "Tire replacement",
        }
    }

    pub fn all() -> &'static [AlertType] {
        &[
            AlertType::OilChange,
            AlertType::RegistrationExpiry,
            AlertType::InsuranceExpiry,
            AlertType::BrakeService,
            AlertType::TireReplacement,
        ]
    }

    /// Whether this kind is driven by accumulated mileage, as opposed to a
    /// document expiry date.
    pub fn is_mileage_based(&self) -> bool {
        matches!(
            self,
            AlertType::OilChange | AlertType::BrakeService | AlertType::TireReplacement
        )
    }

    pub fn from_str(name: &str) -> Option<AlertType> {
        for alert_type in AlertType::all() {
            if name.eq_ignore_ascii_case(alert_type.name()) {
                return Some(*alert_type);
            }
        }
        None
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    DueSoon,
    Overdue,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::DueSoon => f.write_str("due_soon"),
            AlertSeverity::Overdue => f.write_str("overdue"),
        }
    }
}

/// A single maintenance warning for one vehicle at one instant. Alerts are
/// computed per evaluation pass and rendered into a digest; they are never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Alert {
    pub vehicle_id: VehicleId,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    /// Pre-formatted description, e.g. "Oil change overdue by 1200 miles".
    pub message: String,
}

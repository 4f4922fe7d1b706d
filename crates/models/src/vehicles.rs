use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::AlertType;

/// Opaque vehicle identifier, assigned by the vehicle store.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(transparent)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> VehicleId {
        VehicleId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> VehicleId {
        VehicleId(id.to_string())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceStatus {
    InService,
    OutOfService,
}

impl Default for ServiceStatus {
    fn default() -> ServiceStatus {
        ServiceStatus::InService
    }
}

/// The last completed service of one mileage-based maintenance item.
/// Both fields are optional: a vehicle freshly added to the fleet may not
/// have any recorded history yet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
pub struct ServiceHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_service_odometer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::option_date_schema")]
    pub last_service_date: Option<NaiveDate>,
}

/// Read-only view of one vehicle's maintenance state, as supplied by the
/// vehicle store. The evaluator assumes `last_service_odometer <= odometer`
/// but does not enforce it; a violation only skews the reported overdue
/// magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    /// Display name, e.g. "Unit 12".
    pub unit_label: String,
    pub odometer: i64,
    #[serde(default)]
    pub service_status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_of_service_reason: Option<String>,
    #[serde(default)]
    pub oil_change: ServiceHistory,
    #[serde(default)]
    pub brake_service: ServiceHistory,
    #[serde(default)]
    pub tire_replacement: ServiceHistory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::option_date_schema")]
    pub registration_expires: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::option_date_schema")]
    pub insurance_expires: Option<NaiveDate>,
    /// When the vehicle record itself was last edited, shown in digests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::option_datetime_schema")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl VehicleSnapshot {
    pub fn is_out_of_service(&self) -> bool {
        self.service_status == ServiceStatus::OutOfService
    }

    /// The service history backing a mileage-based alert kind, or None for
    /// date-based kinds.
    pub fn service_history(&self, kind: AlertType) -> Option<&ServiceHistory> {
        match kind {
            AlertType::OilChange => Some(&self.oil_change),
            AlertType::BrakeService => Some(&self.brake_service),
            AlertType::TireReplacement => Some(&self.tire_replacement),
            AlertType::RegistrationExpiry | AlertType::InsuranceExpiry => None,
        }
    }

    /// The expiry date backing a date-based alert kind, or None for mileage
    /// kinds and for documents that have no recorded expiry yet.
    pub fn document_expiry(&self, kind: AlertType) -> Option<NaiveDate> {
        match kind {
            AlertType::RegistrationExpiry => self.registration_expires,
            AlertType::InsuranceExpiry => self.insurance_expires,
            AlertType::OilChange | AlertType::BrakeService | AlertType::TireReplacement => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshot_deserializes_with_minimal_fields() {
        let snapshot: VehicleSnapshot = serde_json::from_value(serde_json::json!({
            "id": "veh-01",
            "unit_label": "Unit 1",
            "odometer": 120000,
        }))
        .unwrap();

        assert_eq!(snapshot.service_status, ServiceStatus::InService);
        assert_eq!(snapshot.oil_change, ServiceHistory::default());
        assert_eq!(snapshot.registration_expires, None);
        assert!(!snapshot.is_out_of_service());
    }

    #[test]
    fn service_status_uses_kebab_case() {
        let status: ServiceStatus = serde_json::from_str("\"out-of-service\"").unwrap();
        assert_eq!(status, ServiceStatus::OutOfService);
    }

    #[test]
    fn history_accessors_cover_every_kind() {
        let snapshot: VehicleSnapshot = serde_json::from_value(serde_json::json!({
            "id": "veh-01",
            "unit_label": "Unit 1",
            "odometer": 50000,
            "registration_expires": "2026-10-01",
        }))
        .unwrap();

        for kind in AlertType::all() {
            if kind.is_mileage_based() {
                assert!(snapshot.service_history(*kind).is_some());
                assert_eq!(snapshot.document_expiry(*kind), None);
            } else {
                assert!(snapshot.service_history(*kind).is_none());
            }
        }
        assert_eq!(
            snapshot.document_expiry(AlertType::RegistrationExpiry),
            Some(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap())
        );
    }
}

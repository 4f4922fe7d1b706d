mod alerts;
mod clearance;
mod vehicles;

pub use alerts::{Alert, AlertSeverity, AlertType};
pub use clearance::{
    ClearanceRecord, ClearanceSet, ClearedReading, SuppressionRecord, VehicleAlertState,
};
pub use vehicles::{ServiceHistory, ServiceStatus, VehicleId, VehicleSnapshot};

/// JSON schema for `chrono::DateTime<Utc>` fields, which schemars cannot
/// derive on its own.
pub fn datetime_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "string",
        "format": "date-time"
    })
}

pub fn option_datetime_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": ["string", "null"],
        "format": "date-time"
    })
}

/// JSON schema for `chrono::NaiveDate` fields.
pub fn date_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "string",
        "format": "date"
    })
}

pub fn option_date_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": ["string", "null"],
        "format": "date"
    })
}

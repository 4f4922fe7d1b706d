use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{AlertType, VehicleId};

/// Per-vehicle record of when each alert kind was last dismissed by a
/// mechanic. Created lazily on first clearance. Entries are never eagerly
/// deleted: one that has aged past the clearance window simply stops
/// mattering to the evaluator's gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearanceSet(BTreeMap<AlertType, DateTime<Utc>>);

impl ClearanceSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn cleared_at(&self, kind: AlertType) -> Option<DateTime<Utc>> {
        self.0.get(&kind).copied()
    }

    pub fn record(&mut self, kind: AlertType, cleared_at: DateTime<Utc>) {
        self.0.insert(kind, cleared_at);
    }

    /// Removes the entry for `kind`, but only if it still carries the given
    /// timestamp. A compensating rollback must not clobber a clearance that
    /// was re-recorded in the meantime.
    pub fn revoke(&mut self, kind: AlertType, as_of: DateTime<Utc>) {
        if self.0.get(&kind) == Some(&as_of) {
            self.0.remove(&kind);
        }
    }

    /// Whether `kind` was cleared recently enough that its rule must not be
    /// evaluated. The gate holds through the full window: a clearance
    /// exactly `window` old still suppresses.
    pub fn cleared_within(
        &self,
        kind: AlertType,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> bool {
        self.cleared_at(kind)
            .is_some_and(|cleared| now - cleared <= window)
    }
}

/// Per-vehicle dispatch throttle: when the vehicle was last included in a
/// successfully delivered digest. Advanced only after every recipient
/// accepted the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SuppressionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_batch_sent_at: Option<DateTime<Utc>>,
}

/// The mutable alerting state the store keeps per vehicle: the dispatch
/// throttle plus the per-kind clearance map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleAlertState {
    #[serde(default)]
    pub suppression: SuppressionRecord,
    #[serde(default, skip_serializing_if = "ClearanceSet::is_empty")]
    pub clearances: ClearanceSet,
}

/// The vehicle reading captured at the moment of a clearance: the odometer
/// for mileage-based kinds, the document expiry for date-based kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClearedReading {
    Odometer { miles: i64 },
    Expiry {
        #[schemars(schema_with = "crate::date_schema")]
        date: NaiveDate,
    },
}

/// Immutable accountability entry appended for every successful clearance.
/// The append is the retried effect of the clearance workflow; a dismissal
/// is never reported as successful without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ClearanceRecord {
    pub vehicle_id: VehicleId,
    pub alert_type: AlertType,
    #[schemars(schema_with = "crate::datetime_schema")]
    pub cleared_at: DateTime<Utc>,
    /// None when a date-based kind is cleared before its document has any
    /// recorded expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<ClearedReading>,
    pub justification: String,
    pub author: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn cleared_within_holds_through_the_full_window() {
        let mut clearances = ClearanceSet::default();
        clearances.record(AlertType::OilChange, ts(0));

        let window = chrono::Duration::days(7);
        assert!(clearances.cleared_within(AlertType::OilChange, ts(0), window));
        assert!(clearances.cleared_within(
            AlertType::OilChange,
            ts(0) + chrono::Duration::days(7),
            window
        ));
        assert!(!clearances.cleared_within(
            AlertType::OilChange,
            ts(0) + chrono::Duration::days(7) + chrono::Duration::seconds(1),
            window
        ));
        assert!(!clearances.cleared_within(AlertType::BrakeService, ts(1), window));
    }

    #[test]
    fn revoke_only_removes_the_matching_timestamp() {
        let mut clearances = ClearanceSet::default();
        clearances.record(AlertType::OilChange, ts(0));

        // A later re-clearance must survive a rollback of the earlier one.
        clearances.record(AlertType::OilChange, ts(2));
        clearances.revoke(AlertType::OilChange, ts(0));
        assert_eq!(clearances.cleared_at(AlertType::OilChange), Some(ts(2)));

        clearances.revoke(AlertType::OilChange, ts(2));
        assert_eq!(clearances.cleared_at(AlertType::OilChange), None);
    }

    #[test]
    fn alert_state_serde_round_trips() {
        let mut state = VehicleAlertState::default();
        state.suppression.last_batch_sent_at = Some(ts(6));
        state.clearances.record(AlertType::InsuranceExpiry, ts(3));

        let json = serde_json::to_string(&state).unwrap();
        let restored: VehicleAlertState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, restored);
    }
}

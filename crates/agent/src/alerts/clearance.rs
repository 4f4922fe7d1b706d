use chrono::{DateTime, Utc};
use exponential_backoff::Backoff;

use models::{AlertType, ClearanceRecord, ClearedReading, VehicleId};

use crate::store::{AccountabilityLog, VehicleStore};

#[derive(Debug, thiserror::Error)]
pub enum ClearanceError {
    #[error("justification must not be empty")]
    EmptyJustification,

    #[error("unknown vehicle '{0}'")]
    UnknownVehicle(VehicleId),

    #[error("writing clearance state for {vehicle}/{kind}")]
    StateWrite {
        vehicle: VehicleId,
        kind: AlertType,
        #[source]
        source: anyhow::Error,
    },

    /// The dismissal did NOT take effect: the accountability record could
    /// not be appended and the clearance state was rolled back. Callers
    /// must surface this to the user — an unaccountable dismissal defeats
    /// the purpose of the feature.
    #[error(
        "dismissal of {kind} for {vehicle} was not recorded: \
         accountability append failed after {attempts} attempts"
    )]
    Unaccounted {
        vehicle: VehicleId,
        kind: AlertType,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Store(anyhow::Error),
}

/// The dismissal workflow. Two sequenced effects: the clearance-state
/// write, then the accountability append. The append is retried with
/// backoff; if it cannot be made to stick, the state write is compensated
/// and the whole operation fails with `ClearanceError::Unaccounted`.
#[derive(Debug, Clone)]
pub struct ClearanceWorkflow {
    pub max_attempts: u32,
    pub min_backoff: std::time::Duration,
    pub max_backoff: std::time::Duration,
    /// Bound on every store and log call made by the workflow.
    pub write_timeout: std::time::Duration,
}

impl Default for ClearanceWorkflow {
    fn default() -> ClearanceWorkflow {
        ClearanceWorkflow {
            max_attempts: 3,
            min_backoff: std::time::Duration::from_millis(250),
            max_backoff: std::time::Duration::from_secs(5),
            write_timeout: std::time::Duration::from_secs(10),
        }
    }
}

impl ClearanceWorkflow {
    /// Dismisses `kind` for one vehicle. Re-clearing inside the clearance
    /// window is permitted: it resets the window and appends a fresh
    /// accountability record.
    #[tracing::instrument(skip_all, fields(vehicle = %vehicle, kind = %kind, author = %author))]
    pub async fn clear<S: VehicleStore, L: AccountabilityLog>(
        &self,
        store: &S,
        log: &L,
        vehicle: &VehicleId,
        kind: AlertType,
        justification: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<ClearanceRecord, ClearanceError> {
        let justification = justification.trim();
        if justification.is_empty() {
            return Err(ClearanceError::EmptyJustification);
        }

        let snapshot = self
            .bounded("loading vehicle", store.load_vehicle(vehicle))
            .await
            .map_err(ClearanceError::Store)?
            .ok_or_else(|| ClearanceError::UnknownVehicle(vehicle.clone()))?;

        // Capture the reading the mechanic dismissed against.
        let reading = if kind.is_mileage_based() {
            Some(ClearedReading::Odometer {
                miles: snapshot.odometer,
            })
        } else {
            snapshot
                .document_expiry(kind)
                .map(|date| ClearedReading::Expiry { date })
        };

        self.bounded(
            "writing clearance state",
            store.record_clearance(vehicle, kind, now),
        )
        .await
        .map_err(|source| ClearanceError::StateWrite {
            vehicle: vehicle.clone(),
            kind,
            source,
        })?;

        let record = ClearanceRecord {
            vehicle_id: vehicle.clone(),
            alert_type: kind,
            cleared_at: now,
            reading,
            justification: justification.to_string(),
            author: author.to_string(),
        };

        let backoff = Backoff::new(self.max_attempts, self.min_backoff, Some(self.max_backoff));
        let mut attempt = 0;
        let append_err = loop {
            attempt += 1;
            match self
                .bounded("appending accountability record", log.append(&record))
                .await
            {
                Ok(()) => {
                    tracing::info!(attempt, "alert clearance recorded");
                    return Ok(record);
                }
                Err(error) => match backoff.next(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            ?delay,
                            error = %format!("{error:#}"),
                            "accountability append failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => break error,
                },
            }
        };

        // The dismissal must not stand without its record.
        if let Err(revoke_error) = self
            .bounded(
                "rolling back clearance state",
                store.revoke_clearance(vehicle, kind, now),
            )
            .await
        {
            tracing::error!(
                error = %format!("{revoke_error:#}"),
                "failed to roll back clearance state after accountability append failure"
            );
        }

        Err(ClearanceError::Unaccounted {
            vehicle: vehicle.clone(),
            kind,
            attempts: attempt,
            source: append_err,
        })
    }

    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl std::future::Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.write_timeout, fut).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("{what} timed out after {:?}", self.write_timeout),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::{MemoryLog, MemoryStore};
    use chrono::TimeZone;
    use models::VehicleSnapshot;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 2, 9, 30, 0).unwrap()
    }

    fn fleet() -> Vec<VehicleSnapshot> {
        serde_json::from_value(serde_json::json!([{
            "id": "veh-01",
            "unit_label": "Unit 1",
            "odometer": 107000,
            "oil_change": { "last_service_odometer": 100000 },
            "insurance_expires": "2026-08-15",
        }]))
        .unwrap()
    }

    fn workflow() -> ClearanceWorkflow {
        ClearanceWorkflow {
            max_attempts: 3,
            min_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(5),
            write_timeout: std::time::Duration::from_secs(1),
        }
    }

    /// An accountability log that fails its first `fail_first` appends.
    #[derive(Debug)]
    struct FlakyLog {
        fail_first: u32,
        attempts: AtomicU32,
        inner: MemoryLog,
    }

    impl FlakyLog {
        fn new(fail_first: u32) -> FlakyLog {
            FlakyLog {
                fail_first,
                attempts: AtomicU32::new(0),
                inner: MemoryLog::new(),
            }
        }
    }

    impl crate::store::AccountabilityLog for FlakyLog {
        async fn append(&self, record: &ClearanceRecord) -> anyhow::Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_first {
                anyhow::bail!("log unavailable (attempt {attempt})");
            }
            self.inner.append(record).await
        }
    }

    #[tokio::test]
    async fn clear_writes_state_and_appends_record() {
        let store = MemoryStore::new(fleet());
        let log = MemoryLog::new();

        let record = workflow()
            .clear(
                &store,
                &log,
                &"veh-01".into(),
                AlertType::OilChange,
                "serviced off the books",
                "pat",
                now(),
            )
            .await
            .unwrap();

        assert_eq!(
            record.reading,
            Some(ClearedReading::Odometer { miles: 107000 })
        );
        assert_eq!(log.records().await, vec![record]);

        let state = store.alert_state(&"veh-01".into()).await.unwrap();
        assert_eq!(state.clearances.cleared_at(AlertType::OilChange), Some(now()));
    }

    #[tokio::test]
    async fn date_based_clearance_captures_the_expiry() {
        let store = MemoryStore::new(fleet());
        let log = MemoryLog::new();

        let record = workflow()
            .clear(
                &store,
                &log,
                &"veh-01".into(),
                AlertType::InsuranceExpiry,
                "renewal is in the mail",
                "pat",
                now(),
            )
            .await
            .unwrap();

        assert_eq!(
            record.reading,
            Some(ClearedReading::Expiry {
                date: chrono::NaiveDate::from_ymd_opt(2026, 8, 15).unwrap()
            })
        );
    }

    #[tokio::test]
    async fn blank_justification_is_rejected() {
        let store = MemoryStore::new(fleet());
        let log = MemoryLog::new();

        let err = workflow()
            .clear(
                &store,
                &log,
                &"veh-01".into(),
                AlertType::OilChange,
                "   ",
                "pat",
                now(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClearanceError::EmptyJustification));
        // Neither effect happened.
        assert!(log.records().await.is_empty());
        let state = store.alert_state(&"veh-01".into()).await.unwrap();
        assert_eq!(state.clearances.cleared_at(AlertType::OilChange), None);
    }

    #[tokio::test]
    async fn unknown_vehicle_is_rejected() {
        let store = MemoryStore::new(fleet());
        let log = MemoryLog::new();

        let err = workflow()
            .clear(
                &store,
                &log,
                &"veh-99".into(),
                AlertType::OilChange,
                "why not",
                "pat",
                now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClearanceError::UnknownVehicle(_)));
    }

    #[tokio::test]
    async fn transient_append_failures_are_retried() {
        let store = MemoryStore::new(fleet());
        let log = FlakyLog::new(2);

        let record = workflow()
            .clear(
                &store,
                &log,
                &"veh-01".into(),
                AlertType::OilChange,
                "serviced off the books",
                "pat",
                now(),
            )
            .await
            .unwrap();

        assert_eq!(log.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(log.inner.records().await, vec![record]);
    }

    #[tokio::test]
    async fn exhausted_retries_roll_the_clearance_back() {
        let store = MemoryStore::new(fleet());
        let log = FlakyLog::new(u32::MAX);

        let err = workflow()
            .clear(
                &store,
                &log,
                &"veh-01".into(),
                AlertType::OilChange,
                "serviced off the books",
                "pat",
                now(),
            )
            .await
            .unwrap_err();

        match &err {
            ClearanceError::Unaccounted { attempts, .. } => assert!(*attempts >= 3),
            other => panic!("expected Unaccounted, got {other:?}"),
        }
        assert!(log.inner.records().await.is_empty());

        // As if the call never happened: no clearance state remains, and a
        // later clear starts from scratch.
        let state = store.alert_state(&"veh-01".into()).await.unwrap();
        assert_eq!(state.clearances.cleared_at(AlertType::OilChange), None);

        let good_log = MemoryLog::new();
        let retry_at = now() + chrono::Duration::minutes(5);
        let record = workflow()
            .clear(
                &store,
                &good_log,
                &"veh-01".into(),
                AlertType::OilChange,
                "serviced off the books",
                "pat",
                retry_at,
            )
            .await
            .unwrap();
        assert_eq!(record.cleared_at, retry_at);
    }

    #[tokio::test]
    async fn reclearing_resets_the_window_and_appends_again() {
        let store = MemoryStore::new(fleet());
        let log = MemoryLog::new();
        let flow = workflow();

        flow.clear(
            &store,
            &log,
            &"veh-01".into(),
            AlertType::OilChange,
            "first dismissal",
            "pat",
            now(),
        )
        .await
        .unwrap();

        let later = now() + chrono::Duration::days(1);
        flow.clear(
            &store,
            &log,
            &"veh-01".into(),
            AlertType::OilChange,
            "still waiting on parts",
            "sam",
            later,
        )
        .await
        .unwrap();

        assert_eq!(log.records().await.len(), 2);
        let state = store.alert_state(&"veh-01".into()).await.unwrap();
        assert_eq!(state.clearances.cleared_at(AlertType::OilChange), Some(later));
    }
}

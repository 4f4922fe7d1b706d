//! JSON-file-backed reference store, sized for a small fixed fleet.
//!
//! The fleet file is read on every pass so that edits made by the
//! record-keeping application are picked up without a restart. Alerting
//! state is held in memory and flushed to a sidecar file on every write,
//! via a temp-file rename so a crash mid-write cannot truncate it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use models::{AlertType, ClearanceRecord, VehicleAlertState, VehicleId, VehicleSnapshot};

use super::{AccountabilityLog, VehicleStore};

#[derive(Debug)]
pub struct FsStore {
    fleet_path: PathBuf,
    state_path: PathBuf,
    states: RwLock<BTreeMap<VehicleId, VehicleAlertState>>,
}

impl FsStore {
    /// Opens the store, loading any previously persisted alerting state.
    /// The fleet file must exist; the state file is created on first write.
    pub async fn open(
        fleet_path: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
    ) -> anyhow::Result<FsStore> {
        let fleet_path = fleet_path.into();
        let state_path = state_path.into();

        let states = match tokio::fs::read(&state_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing alert state file {}", state_path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("reading alert state file {}", state_path.display())
                })
            }
        };

        let store = FsStore {
            fleet_path,
            state_path,
            states: RwLock::new(states),
        };
        // Fail fast on an unreadable or malformed fleet file.
        let vehicles = store.read_fleet().await?;
        tracing::info!(
            fleet = %store.fleet_path.display(),
            vehicles = vehicles.len(),
            "opened vehicle store"
        );
        Ok(store)
    }

    async fn read_fleet(&self) -> anyhow::Result<Vec<VehicleSnapshot>> {
        let bytes = tokio::fs::read(&self.fleet_path)
            .await
            .with_context(|| format!("reading fleet file {}", self.fleet_path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing fleet file {}", self.fleet_path.display()))
    }

    async fn persist(
        &self,
        states: &BTreeMap<VehicleId, VehicleAlertState>,
    ) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(states).context("serializing alert state")?;
        let tmp_path = self.state_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.state_path)
            .await
            .with_context(|| format!("replacing {}", self.state_path.display()))?;
        Ok(())
    }
}

impl VehicleStore for FsStore {
    async fn load_vehicles(&self) -> anyhow::Result<Vec<VehicleSnapshot>> {
        self.read_fleet().await
    }

    async fn load_vehicle(&self, vehicle: &VehicleId) -> anyhow::Result<Option<VehicleSnapshot>> {
        let fleet = self.read_fleet().await?;
        Ok(fleet.into_iter().find(|v| &v.id == vehicle))
    }

    async fn alert_state(&self, vehicle: &VehicleId) -> anyhow::Result<VehicleAlertState> {
        let states = self.states.read().await;
        Ok(states.get(vehicle).cloned().unwrap_or_default())
    }

    async fn record_batch_sent(
        &self,
        vehicles: &[VehicleId],
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut states = self.states.write().await;
        for vehicle in vehicles {
            states
                .entry(vehicle.clone())
                .or_default()
                .suppression
                .last_batch_sent_at = Some(sent_at);
        }
        self.persist(&states).await
    }

    async fn record_clearance(
        &self,
        vehicle: &VehicleId,
        kind: AlertType,
        cleared_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut states = self.states.write().await;
        states
            .entry(vehicle.clone())
            .or_default()
            .clearances
            .record(kind, cleared_at);
        self.persist(&states).await
    }

    async fn revoke_clearance(
        &self,
        vehicle: &VehicleId,
        kind: AlertType,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(vehicle) {
            state.clearances.revoke(kind, as_of);
            self.persist(&states).await?;
        }
        Ok(())
    }
}

/// Newline-delimited JSON accountability log. Append-only by construction:
/// the file is opened in append mode for every write.
#[derive(Debug)]
pub struct FsAccountabilityLog {
    path: PathBuf,
}

impl FsAccountabilityLog {
    pub fn new(path: impl Into<PathBuf>) -> FsAccountabilityLog {
        FsAccountabilityLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AccountabilityLog for FsAccountabilityLog {
    async fn append(&self, record: &ClearanceRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(record).context("serializing clearance record")?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening accountability log {}", self.path.display()))?;
        file.write_all(&line)
            .await
            .with_context(|| format!("appending to {}", self.path.display()))?;
        file.flush().await.context("flushing accountability log")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn fleet_json() -> serde_json::Value {
        serde_json::json!([
            {
                "id": "veh-01",
                "unit_label": "Unit 1",
                "odometer": 105000,
                "oil_change": { "last_service_odometer": 100000 },
            },
            {
                "id": "veh-02",
                "unit_label": "Unit 2",
                "odometer": 52000,
            },
        ])
    }

    #[tokio::test]
    async fn state_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let fleet_path = dir.path().join("fleet.json");
        let state_path = dir.path().join("alert-state.json");
        std::fs::write(&fleet_path, fleet_json().to_string()).unwrap();

        let sent_at = Utc.with_ymd_and_hms(2026, 8, 1, 7, 0, 0).unwrap();
        let cleared_at = Utc.with_ymd_and_hms(2026, 8, 2, 9, 30, 0).unwrap();
        {
            let store = FsStore::open(&fleet_path, &state_path).await.unwrap();
            store
                .record_batch_sent(&["veh-01".into()], sent_at)
                .await
                .unwrap();
            store
                .record_clearance(&"veh-01".into(), AlertType::OilChange, cleared_at)
                .await
                .unwrap();
        }

        let store = FsStore::open(&fleet_path, &state_path).await.unwrap();
        let state = store.alert_state(&"veh-01".into()).await.unwrap();
        assert_eq!(state.suppression.last_batch_sent_at, Some(sent_at));
        assert_eq!(
            state.clearances.cleared_at(AlertType::OilChange),
            Some(cleared_at)
        );

        // Untouched vehicles report a default state.
        let state = store.alert_state(&"veh-02".into()).await.unwrap();
        assert_eq!(state, VehicleAlertState::default());
    }

    #[tokio::test]
    async fn load_vehicle_finds_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let fleet_path = dir.path().join("fleet.json");
        std::fs::write(&fleet_path, fleet_json().to_string()).unwrap();

        let store = FsStore::open(&fleet_path, dir.path().join("state.json"))
            .await
            .unwrap();
        let found = store.load_vehicle(&"veh-02".into()).await.unwrap();
        assert_eq!(found.unwrap().unit_label, "Unit 2");
        assert!(store.load_vehicle(&"veh-99".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn accountability_log_appends_ndjson_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = FsAccountabilityLog::new(dir.path().join("clearances.ndjson"));

        let record = ClearanceRecord {
            vehicle_id: "veh-01".into(),
            alert_type: AlertType::OilChange,
            cleared_at: Utc.with_ymd_and_hms(2026, 8, 2, 9, 30, 0).unwrap(),
            reading: Some(models::ClearedReading::Odometer { miles: 105000 }),
            justification: "serviced off the books".to_string(),
            author: "pat".to_string(),
        };
        log.append(&record).await.unwrap();
        log.append(&record).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: ClearanceRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, record);
    }
}

//! In-memory store, used by the test suites and usable for local
//! development with `--no-persist`-style setups.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use models::{AlertType, ClearanceRecord, VehicleAlertState, VehicleId, VehicleSnapshot};

use super::{AccountabilityLog, VehicleStore};

#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    vehicles: Vec<VehicleSnapshot>,
    states: BTreeMap<VehicleId, VehicleAlertState>,
}

impl MemoryStore {
    pub fn new(vehicles: Vec<VehicleSnapshot>) -> MemoryStore {
        MemoryStore {
            inner: Arc::new(RwLock::new(MemoryStoreInner {
                vehicles,
                states: BTreeMap::new(),
            })),
        }
    }

    /// Swaps the fleet out from under the store, as an external record
    /// editor would.
    pub async fn replace_vehicles(&self, vehicles: Vec<VehicleSnapshot>) {
        self.inner.write().await.vehicles = vehicles;
    }
}

impl VehicleStore for MemoryStore {
    async fn load_vehicles(&self) -> anyhow::Result<Vec<VehicleSnapshot>> {
        Ok(self.inner.read().await.vehicles.clone())
    }

    async fn load_vehicle(&self, vehicle: &VehicleId) -> anyhow::Result<Option<VehicleSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner.vehicles.iter().find(|v| &v.id == vehicle).cloned())
    }

    async fn alert_state(&self, vehicle: &VehicleId) -> anyhow::Result<VehicleAlertState> {
        let inner = self.inner.read().await;
        Ok(inner.states.get(vehicle).cloned().unwrap_or_default())
    }

    async fn record_batch_sent(
        &self,
        vehicles: &[VehicleId],
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        for vehicle in vehicles {
            inner
                .states
                .entry(vehicle.clone())
                .or_default()
                .suppression
                .last_batch_sent_at = Some(sent_at);
        }
        Ok(())
    }

    async fn record_clearance(
        &self,
        vehicle: &VehicleId,
        kind: AlertType,
        cleared_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .states
            .entry(vehicle.clone())
            .or_default()
            .clearances
            .record(kind, cleared_at);
        Ok(())
    }

    async fn revoke_clearance(
        &self,
        vehicle: &VehicleId,
        kind: AlertType,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(state) = inner.states.get_mut(vehicle) {
            state.clearances.revoke(kind, as_of);
        }
        Ok(())
    }
}

/// In-memory accountability log.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    records: Arc<Mutex<Vec<ClearanceRecord>>>,
}

impl MemoryLog {
    pub fn new() -> MemoryLog {
        MemoryLog::default()
    }

    pub async fn records(&self) -> Vec<ClearanceRecord> {
        self.records.lock().await.clone()
    }
}

impl AccountabilityLog for MemoryLog {
    async fn append(&self, record: &ClearanceRecord) -> anyhow::Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

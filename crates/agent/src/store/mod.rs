//! Collaborator seams for persistence.
//!
//! The engine owns no storage format of its own: vehicle records and the
//! accountability history belong to the surrounding application. These
//! traits are the narrow write API the alerting core needs — suppression
//! and clearance state are only ever mutated through `record_batch_sent`,
//! `record_clearance`, and `revoke_clearance`, never by ad-hoc field
//! writes.

use std::future::Future;

use chrono::{DateTime, Utc};

use models::{AlertType, ClearanceRecord, VehicleAlertState, VehicleId, VehicleSnapshot};

mod fs;
mod memory;

pub use fs::{FsAccountabilityLog, FsStore};
pub use memory::{MemoryLog, MemoryStore};

pub trait VehicleStore: std::fmt::Debug + Send + Sync + 'static {
    /// All vehicle snapshots, in stable order.
    fn load_vehicles(&self) -> impl Future<Output = anyhow::Result<Vec<VehicleSnapshot>>> + Send;

    fn load_vehicle(
        &self,
        vehicle: &VehicleId,
    ) -> impl Future<Output = anyhow::Result<Option<VehicleSnapshot>>> + Send;

    /// The vehicle's suppression record and clearance map. Vehicles that
    /// were never batched or cleared have a default state.
    fn alert_state(
        &self,
        vehicle: &VehicleId,
    ) -> impl Future<Output = anyhow::Result<VehicleAlertState>> + Send;

    /// Marks every listed vehicle as included in a successfully delivered
    /// batch. Called only after all recipients accepted the digest.
    fn record_batch_sent(
        &self,
        vehicles: &[VehicleId],
        sent_at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn record_clearance(
        &self,
        vehicle: &VehicleId,
        kind: AlertType,
        cleared_at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Compensating write: removes a clearance previously recorded at
    /// `as_of`, leaving any newer clearance of the same kind untouched.
    fn revoke_clearance(
        &self,
        vehicle: &VehicleId,
        kind: AlertType,
        as_of: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Append-only sink for clearance accountability records. The engine never
/// reads it back; the surrounding application renders it as history.
pub trait AccountabilityLog: std::fmt::Debug + Send + Sync + 'static {
    fn append(
        &self,
        record: &ClearanceRecord,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

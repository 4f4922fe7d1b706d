use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};

use models::{Alert, VehicleId};

use crate::alerts::{evaluate, EmailSender};
use crate::store::{AccountabilityLog, VehicleStore};

use super::{App, Rejection};

#[derive(Debug, serde::Serialize)]
pub struct VehicleAlertsResponse {
    pub vehicle_id: VehicleId,
    pub evaluated_at: DateTime<Utc>,
    pub out_of_service: bool,
    pub alerts: Vec<Alert>,
}

/// Evaluates one vehicle with the same rules and clearance gate the
/// pipeline uses, so on-screen alerts can never drift from what gets
/// emailed.
pub async fn handler<V, L, S>(
    State(app): State<Arc<App<V, L, S>>>,
    Path(vehicle): Path<String>,
) -> Result<Json<VehicleAlertsResponse>, Rejection>
where
    V: VehicleStore,
    L: AccountabilityLog,
    S: EmailSender,
{
    let vehicle_id = VehicleId::new(vehicle);
    let snapshot = app
        .store
        .load_vehicle(&vehicle_id)
        .await?
        .ok_or_else(|| Rejection::UnknownVehicle(vehicle_id.to_string()))?;
    let state = app.store.alert_state(&vehicle_id).await?;

    let evaluated_at = Utc::now();
    let alerts = evaluate(
        &snapshot,
        &state.clearances,
        app.pipeline.thresholds(),
        evaluated_at,
    );

    Ok(Json(VehicleAlertsResponse {
        vehicle_id,
        evaluated_at,
        out_of_service: snapshot.is_out_of_service(),
        alerts,
    }))
}

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;

use models::{AlertType, ClearanceRecord, VehicleId};

use crate::alerts::EmailSender;
use crate::store::{AccountabilityLog, VehicleStore};

use super::{App, Rejection};

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClearRequest {
    pub justification: String,
    pub author: String,
}

pub async fn handler<V, L, S>(
    State(app): State<Arc<App<V, L, S>>>,
    Path((vehicle, kind)): Path<(String, String)>,
    Json(request): Json<ClearRequest>,
) -> Result<Json<ClearanceRecord>, Rejection>
where
    V: VehicleStore,
    L: AccountabilityLog,
    S: EmailSender,
{
    let Some(kind) = AlertType::from_str(&kind) else {
        return Err(Rejection::UnknownAlertKind(kind));
    };
    let vehicle_id = VehicleId::new(vehicle);

    let record = app
        .clearances
        .clear(
            app.store.as_ref(),
            app.accountability.as_ref(),
            &vehicle_id,
            kind,
            &request.justification,
            &request.author,
            Utc::now(),
        )
        .await?;
    Ok(Json(record))
}

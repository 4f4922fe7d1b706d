use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::alerts::{EmailSender, PassOptions, PassSummary, Trigger};
use crate::store::{AccountabilityLog, VehicleStore};

use super::{App, Rejection};

#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunRequest {
    /// Skip the 7-day batch gate for this run. For on-demand verification;
    /// the per-kind clearance gate still applies.
    pub bypass_batch_gate: bool,
}

pub async fn handler<V, L, S>(
    State(app): State<Arc<App<V, L, S>>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<PassSummary>, Rejection>
where
    V: VehicleStore,
    L: AccountabilityLog,
    S: EmailSender,
{
    let summary = app
        .pipeline
        .run(PassOptions {
            trigger: Trigger::Manual,
            bypass_batch_gate: request.bypass_batch_gate,
        })
        .await?;
    Ok(Json(summary))
}

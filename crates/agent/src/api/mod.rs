//! On-demand trigger surface.
//!
//! Three endpoints, all thin wrappers over the same engine the daily timer
//! drives:
//! - `POST /api/alerts/run` runs a pass now, optionally bypassing the
//!   batch gate.
//! - `GET /api/vehicles/{vehicle}/alerts` evaluates one vehicle on demand,
//!   so the UI renders exactly what the pipeline would send.
//! - `POST /api/vehicles/{vehicle}/alerts/{kind}/clear` dismisses an alert
//!   kind with a justification.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::alerts::{AlertPipeline, ClearanceWorkflow, EmailSender};
use crate::store::{AccountabilityLog, VehicleStore};

mod clear_alert;
mod error;
mod run_alerts;
mod vehicle_alerts;

pub use error::Rejection;

pub struct App<V: VehicleStore, L: AccountabilityLog, S: EmailSender> {
    pub pipeline: Arc<AlertPipeline<V, S>>,
    pub store: Arc<V>,
    pub accountability: Arc<L>,
    pub clearances: ClearanceWorkflow,
}

pub fn build_router<V, L, S>(app: Arc<App<V, L, S>>) -> Router<()>
where
    V: VehicleStore,
    L: AccountabilityLog,
    S: EmailSender,
{
    Router::new()
        .route("/api/alerts/run", post(run_alerts::handler::<V, L, S>))
        .route(
            "/api/vehicles/{vehicle}/alerts",
            get(vehicle_alerts::handler::<V, L, S>),
        )
        .route(
            "/api/vehicles/{vehicle}/alerts/{kind}/clear",
            post(clear_alert::handler::<V, L, S>),
        )
        .with_state(app)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alerts::harness::TestSender;
    use crate::alerts::{AlertThresholds, Dispatcher};
    use crate::store::{MemoryLog, MemoryStore};
    use axum::extract::{Path, State};
    use axum::Json;
    use models::{AlertSeverity, AlertType, VehicleSnapshot};

    fn fixture() -> (
        Arc<App<MemoryStore, MemoryLog, TestSender>>,
        TestSender,
        MemoryLog,
    ) {
        let vehicles: Vec<VehicleSnapshot> = serde_json::from_value(serde_json::json!([{
            "id": "veh-01",
            "unit_label": "Unit 1",
            "odometer": 106000,
            "oil_change": { "last_service_odometer": 100000 },
            "brake_service": { "last_service_odometer": 100000 },
            "tire_replacement": { "last_service_odometer": 100000 },
        }]))
        .unwrap();

        let store = Arc::new(MemoryStore::new(vehicles));
        let log = MemoryLog::new();
        let sender = TestSender::new();
        let dispatcher = Dispatcher::new(
            sender.clone(),
            notifications::parse_recipient_list("ops@fleet.example").unwrap(),
        )
        .unwrap();
        let app = Arc::new(App {
            pipeline: Arc::new(AlertPipeline::new(
                store.clone(),
                dispatcher,
                AlertThresholds::default(),
            )),
            store,
            accountability: Arc::new(log.clone()),
            clearances: ClearanceWorkflow {
                min_backoff: std::time::Duration::from_millis(1),
                max_backoff: std::time::Duration::from_millis(5),
                ..ClearanceWorkflow::default()
            },
        });
        (app, sender, log)
    }

    #[tokio::test]
    async fn run_endpoint_reports_the_pass_summary() {
        let (app, sender, _log) = fixture();

        let Json(summary) = run_alerts::handler(
            State(app.clone()),
            Json(run_alerts::RunRequest::default()),
        )
        .await
        .unwrap();

        assert!(summary.digest_sent);
        assert_eq!(summary.vehicles_included, 1);
        assert_eq!(sender.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn vehicle_alerts_endpoint_evaluates_on_demand() {
        let (app, _sender, _log) = fixture();

        let Json(response) = vehicle_alerts::handler(
            State(app.clone()),
            Path("veh-01".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(response.alerts.len(), 1);
        assert_eq!(response.alerts[0].alert_type, AlertType::OilChange);
        assert_eq!(response.alerts[0].severity, AlertSeverity::Overdue);

        let err = vehicle_alerts::handler(State(app), Path("veh-99".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Rejection::UnknownVehicle(_)));
    }

    #[tokio::test]
    async fn clear_endpoint_records_and_gates_future_evaluations() {
        let (app, _sender, log) = fixture();

        let Json(record) = clear_alert::handler(
            State(app.clone()),
            Path(("veh-01".to_string(), "oil_change".to_string())),
            Json(clear_alert::ClearRequest {
                justification: "serviced off the books".to_string(),
                author: "pat".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(record.alert_type, AlertType::OilChange);
        assert_eq!(log.records().await.len(), 1);

        // The cleared kind no longer fires on the read endpoint.
        let Json(response) = vehicle_alerts::handler(
            State(app.clone()),
            Path("veh-01".to_string()),
        )
        .await
        .unwrap();
        assert!(response.alerts.is_empty());
    }

    #[tokio::test]
    async fn clear_endpoint_rejects_bad_input() {
        let (app, _sender, _log) = fixture();

        let err = clear_alert::handler(
            State(app.clone()),
            Path(("veh-01".to_string(), "wiper_fluid".to_string())),
            Json(clear_alert::ClearRequest {
                justification: "x".to_string(),
                author: "pat".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Rejection::UnknownAlertKind(_)));

        let err = clear_alert::handler(
            State(app),
            Path(("veh-01".to_string(), "oil_change".to_string())),
            Json(clear_alert::ClearRequest {
                justification: "  ".to_string(),
                author: "pat".to_string(),
            }),
        )
        .await
        .unwrap_err();
        let (status, code) = err.status_and_code();
        assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(code, "empty_justification");
    }
}

// HTTP inspection API and manual fire injection

use crate::agent::AgentId;
use crate::grid::{Coordinate, GridBounds};
use crate::message::{Envelope, IgnitePayload, MessageKind};
use crate::monitor::{SimulationMonitor, SnapshotEntry};
use crate::simulation::Simulation;
use crate::transport::MessageRouter;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Sender name of envelopes injected through the API
pub const API_SENDER: &str = "api";

/// Shared state for the API
pub struct ApiState {
    pub monitor: Arc<SimulationMonitor>,
    pub router: MessageRouter,
    pub world: AgentId,
    pub bounds: GridBounds,
}

impl ApiState {
    pub fn from_simulation(simulation: &Simulation) -> Self {
        Self {
            monitor: simulation.monitor(),
            router: simulation.router(),
            world: simulation.world_id(),
            bounds: simulation.bounds(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agents: usize,
}

/// POST /api/fires body
#[derive(Debug, Deserialize)]
pub struct FireRequest {
    pub row: i32,
    pub col: i32,
    pub intensity: u32,
    #[serde(default)]
    pub casualties: u32,
}

#[derive(Serialize)]
pub struct FireResponse {
    pub coordinate: Coordinate,
    #[serde(rename = "messageId")]
    pub message_id: String,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/agents", get(list_agents))
        // Unit ids contain a slash ("station/unit-00")
        .route("/api/agents/*id", get(get_agent))
        .route("/api/fires", post(ignite_fire))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/health
async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agents: state.router.len(),
    })
}

/// GET /api/agents - Last snapshot of every agent, sorted by id
async fn list_agents(State(state): State<Arc<ApiState>>) -> Json<Vec<SnapshotEntry>> {
    Json(state.monitor.all())
}

/// GET /api/agents/*id
async fn get_agent(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<SnapshotEntry>, ApiError> {
    state
        .monitor
        .get(&AgentId::new(id))
        .map(Json)
        .ok_or(ApiError::AgentNotFound)
}

/// POST /api/fires - Start a fire at a cell
///
/// The environment alerts the brokers like for any spawned fire. Returns
/// 202 once the request is queued; a cell that is already burning is
/// refused by the environment, not here.
async fn ignite_fire(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<FireRequest>,
) -> Result<(StatusCode, Json<FireResponse>), ApiError> {
    let coordinate = Coordinate::new(request.row, request.col);
    if !state.bounds.contains(&coordinate) {
        return Err(ApiError::OutOfBounds(coordinate));
    }
    if request.intensity == 0 && request.casualties == 0 {
        return Err(ApiError::NothingToBurn);
    }

    let envelope = Envelope::new(
        &AgentId::from(API_SENDER),
        &state.world,
        MessageKind::Ignite,
        &IgnitePayload {
            coordinate,
            intensity: request.intensity,
            casualties: request.casualties,
        },
    );
    let message_id = envelope.id.to_string();
    if !state.router.send(envelope) {
        return Err(ApiError::EnvironmentUnavailable);
    }

    info!(coordinate = %coordinate, intensity = request.intensity, casualties = request.casualties, "Fire requested via API");
    Ok((
        StatusCode::ACCEPTED,
        Json(FireResponse {
            coordinate,
            message_id,
        }),
    ))
}

#[derive(Debug)]
pub enum ApiError {
    AgentNotFound,
    OutOfBounds(Coordinate),
    NothingToBurn,
    EnvironmentUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::AgentNotFound => (StatusCode::NOT_FOUND, "Agent not found".to_string()),
            ApiError::OutOfBounds(c) => (
                StatusCode::BAD_REQUEST,
                format!("Coordinate {} is outside the grid", c),
            ),
            ApiError::NothingToBurn => (
                StatusCode::BAD_REQUEST,
                "intensity or casualties must be positive".to_string(),
            ),
            ApiError::EnvironmentUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Environment is not running".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Mailbox;
    use crate::unit::UnitStatus;
    use crate::monitor::AgentSnapshot;

    fn create_test_state() -> (Arc<ApiState>, Mailbox) {
        let router = MessageRouter::new();
        let world = AgentId::from("world");
        let mailbox = router.register(&world);
        let state = Arc::new(ApiState {
            monitor: Arc::new(SimulationMonitor::new()),
            router,
            world,
            bounds: GridBounds::new(10, 10),
        });
        (state, mailbox)
    }

    fn fire(row: i32, col: i32, intensity: u32) -> FireRequest {
        FireRequest {
            row,
            col,
            intensity,
            casualties: 1,
        }
    }

    #[tokio::test]
    async fn test_ignite_fire_queues_envelope() {
        let (state, mut mailbox) = create_test_state();

        let (status, response) = ignite_fire(State(state), Json(fire(2, 3, 4))).await.unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(response.0.coordinate, Coordinate::new(2, 3));
        let envelope = mailbox.try_recv().unwrap();
        assert_eq!(envelope.kind, MessageKind::Ignite);
        assert_eq!(envelope.sender, AgentId::from(API_SENDER));
        let payload: IgnitePayload = envelope.decode().unwrap();
        assert_eq!(payload.intensity, 4);
    }

    #[tokio::test]
    async fn test_ignite_fire_out_of_bounds() {
        let (state, mut mailbox) = create_test_state();

        let result = ignite_fire(State(state), Json(fire(10, 0, 1))).await;

        assert!(matches!(result, Err(ApiError::OutOfBounds(_))));
        assert!(mailbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ignite_fire_nothing_to_burn() {
        let (state, _mailbox) = create_test_state();
        let request = FireRequest {
            row: 1,
            col: 1,
            intensity: 0,
            casualties: 0,
        };
        let result = ignite_fire(State(state), Json(request)).await;
        assert!(matches!(result, Err(ApiError::NothingToBurn)));
    }

    #[tokio::test]
    async fn test_ignite_fire_without_environment() {
        let (state, mailbox) = create_test_state();
        drop(mailbox);

        let result = ignite_fire(State(state), Json(fire(1, 1, 1))).await;
        assert!(matches!(result, Err(ApiError::EnvironmentUnavailable)));
    }

    #[tokio::test]
    async fn test_get_agent() {
        let (state, _mailbox) = create_test_state();
        let id = AgentId::from("north/unit-00");
        state.monitor.publish(
            &id,
            AgentSnapshot::Unit(UnitStatus::at_home(id.clone(), Coordinate::new(0, 0))),
        );

        let found = get_agent(State(state.clone()), Path("north/unit-00".to_string()))
            .await
            .unwrap();
        assert_eq!(found.0.id, id);

        let missing = get_agent(State(state), Path("nobody".to_string())).await;
        assert!(matches!(missing, Err(ApiError::AgentNotFound)));
    }

    #[tokio::test]
    async fn test_health_counts_mailboxes() {
        let (state, _mailbox) = create_test_state();
        let response = health(State(state)).await;
        assert_eq!(response.0.status, "ok");
        assert_eq!(response.0.agents, 1);
    }
}

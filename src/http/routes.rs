//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::entities::Team;
use crate::util::time::uptime_secs;
use crate::ws::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origins);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/scoreboard", get(scoreboard_handler))
        .route("/ws", get(ws_handler));

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// Explicit origins when configured, any origin otherwise
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();
    layer.allow_origin(allowed)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    tick: u64,
    active_players: usize,
    measured_tick_rate: Option<f32>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.session.status();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        tick: status.tick,
        active_players: state.session.player_count(),
        measured_tick_rate: status.measured_tick_rate,
    })
}

// ============================================================================
// Scoreboard endpoint
// ============================================================================

#[derive(Serialize)]
struct TeamBoard {
    team: Team,
    color: &'static str,
    score: u32,
    players: Vec<Uuid>,
}

#[derive(Serialize)]
struct ScoreboardResponse {
    tick: u64,
    ball_in_play: bool,
    teams: Vec<TeamBoard>,
}

async fn scoreboard_handler(State(state): State<AppState>) -> Json<ScoreboardResponse> {
    let status = state.session.status();

    let teams = Team::ALL
        .iter()
        .map(|&team| {
            let entry = status.meta.team(team);
            TeamBoard {
                team,
                color: team.color(),
                score: entry.score,
                players: entry.players.clone(),
            }
        })
        .collect();

    Json(ScoreboardResponse {
        tick: status.tick,
        ball_in_play: status.ball_in_play,
        teams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::{GameSession, SessionConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn build_test_app() -> (Router, GameSession) {
        let config = Config::from_lookup(|_| None::<String>).expect("default config");
        let (session, handle) = GameSession::new(SessionConfig {
            tick_rate: config.tick_rate,
            snapshot_interval: config.snapshot_interval,
            seed: 1,
        });
        (build_router(AppState::new(config, handle)), session)
    }

    async fn get_json(app: Router, uri: &str) -> Value {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request should build");
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _session) = build_test_app();
        let payload = get_json(app, "/health").await;
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["active_players"], 0);
    }

    #[tokio::test]
    async fn scoreboard_lists_both_teams() {
        let (app, _session) = build_test_app();
        let payload = get_json(app, "/scoreboard").await;

        let teams = payload["teams"].as_array().expect("teams array");
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0]["team"], "red");
        assert_eq!(teams[0]["score"], 0);
        assert_eq!(teams[1]["team"], "blue");
        assert_eq!(payload["ball_in_play"], false);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found_without_static_dir() {
        let (app, _session) = build_test_app();
        let request = Request::builder()
            .uri("/index.html")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::AppConfig;

mod payload;

use payload::{
    AllocationResponse, ErrorResponse, NormalizePayload, ProfilesQuery, QuestionnairePayload,
    RebalancePayload, SimulatePayload, build_profiles_response, build_simulate_response,
    normalize_from_payload, questionnaire_from_payload, rebalance_from_payload,
    simulate_request_from_payload,
};

pub async fn run_http_server(port: u16, config: AppConfig) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(config));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "projection HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/profiles");

    axum::serve(listener, app).await
}

fn router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/api/normalize", post(normalize_handler))
        .route("/api/rebalance", post(rebalance_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/profiles", get(profiles_handler))
        .route("/api/questionnaire", post(questionnaire_handler))
        .fallback(not_found_handler)
        .with_state(config)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn normalize_handler(Json(payload): Json<NormalizePayload>) -> Response {
    match normalize_from_payload(payload) {
        Ok(allocation) => json_response(StatusCode::OK, AllocationResponse::from(allocation)),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn rebalance_handler(Json(payload): Json<RebalancePayload>) -> Response {
    match rebalance_from_payload(payload) {
        Ok(allocation) => json_response(StatusCode::OK, AllocationResponse::from(allocation)),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn profiles_handler(Query(query): Query<ProfilesQuery>) -> Response {
    json_response(StatusCode::OK, build_profiles_response(query.years))
}

async fn questionnaire_handler(Json(payload): Json<QuestionnairePayload>) -> Response {
    match questionnaire_from_payload(payload) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn simulate_handler(
    State(config): State<Arc<AppConfig>>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    let request = match simulate_request_from_payload(payload, &config) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    info!(
        horizon_years = request.params.horizon_years,
        asset_classes = request.params.allocation.len(),
        "simulation requested"
    );

    // Projections are CPU-bound; keep them off the async workers.
    let outcome = tokio::task::spawn_blocking(move || {
        let result = request.run();
        (request, result)
    })
    .await;

    match outcome {
        Ok((request, Ok(result))) => {
            json_response(StatusCode::OK, build_simulate_response(&request, &result))
        }
        Ok((_, Err(e))) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => {
            error!(error = %e, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error running simulation")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

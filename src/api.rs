use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::engine::{predict_all, predict_race, RaceOutcome};
use crate::metrics::Metrics;
use crate::race::RaceInput;
use crate::report::{build_venue_reports, now_jst_iso, VenueReport};
use crate::settlement::{settle_venue, RaceResult, VenueResult};
use crate::store::{validate_date, PredictInput};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metrics: Option<Metrics>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/config", get(get_config))
        .route("/predict", post(predict))
        .route("/predict/card", post(predict_card))
        .route("/settle", post(settle));

    if let Some(m) = &state.metrics {
        app = app.merge(m.router::<AppState>());
    }

    app.layer(CorsLayer::very_permissive()).with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Json<AppConfig> {
    Json(state.config.as_ref().clone())
}

async fn predict(
    State(state): State<AppState>,
    Json(input): Json<RaceInput>,
) -> Result<Json<RaceOutcome>, ApiError> {
    if input.card.race_id.trim().is_empty() {
        return Err(ApiError::bad_request("race_id must not be empty"));
    }
    Ok(Json(predict_race(&input, &state.config.pipeline)))
}

async fn predict_card(
    State(state): State<AppState>,
    Json(day): Json<PredictInput>,
) -> Result<Json<Vec<VenueReport>>, ApiError> {
    validate_date(&day.date).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let cfg = &state.config.pipeline;
    let predictions: Vec<_> = predict_all(&day.races, cfg)
        .into_iter()
        .filter_map(RaceOutcome::into_prediction)
        .collect();
    info!(date = %day.date, races = day.races.len(), scored = predictions.len(), "card scored");
    Ok(Json(build_venue_reports(
        &day.date,
        &day.venues(),
        &predictions,
        cfg,
        &now_jst_iso(),
    )))
}

#[derive(Debug, Deserialize)]
struct SettleRequest {
    report: VenueReport,
    #[serde(default)]
    results: Vec<RaceResult>,
}

async fn settle(
    State(state): State<AppState>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<VenueResult>, ApiError> {
    if req.results.is_empty() {
        warn!(venue = %req.report.venue, "settle called without results");
    }
    Ok(Json(settle_venue(
        &req.report,
        &req.results,
        &state.config.settlement,
        &now_jst_iso(),
    )))
}

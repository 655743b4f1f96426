use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{experiments, health};
use crate::services::experiment_etl::DerivedSummary;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Experiment ETL API",
        description = "Derives per-user experiment summaries from CSV drops and writes them to Postgres."
    ),
    paths(health::healthz_handler, experiments::run_experiments),
    components(schemas(
        health::HealthResponse,
        experiments::RunExperimentsRequest,
        experiments::RunExperimentsResponse,
        DerivedSummary
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "experiments", description = "Experiment summary pipeline")
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_handler))
}

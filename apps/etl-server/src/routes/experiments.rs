use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::map_etl_error;
use crate::services::experiment_etl;
use crate::state::AppState;

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct RunExperimentsRequest {
    /// Directory holding `users.csv`, `user_experiments.csv` and `compounds.csv`.
    path_to_data: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct RunExperimentsResponse {
    #[serde(rename = "Success")]
    success: bool,
    rows_written: u64,
    users: usize,
    experiments: usize,
    /// `upsert` or `append`.
    sink_mode: String,
}

#[utoipa::path(
    post,
    path = "/experiments",
    tag = "experiments",
    request_body = RunExperimentsRequest,
    responses(
        (status = 200, description = "Summary derived and written", body = RunExperimentsResponse),
        (status = 403, description = "Path outside the configured data root"),
        (status = 404, description = "Bad path to data"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn run_experiments(
    State(state): State<AppState>,
    Json(payload): Json<RunExperimentsRequest>,
) -> Result<Json<RunExperimentsResponse>, (StatusCode, String)> {
    let report = experiment_etl::run_pipeline(&state.db, &state.config, &payload.path_to_data)
        .await
        .map_err(map_etl_error)?;

    Ok(Json(RunExperimentsResponse {
        success: true,
        rows_written: report.rows_written,
        users: report.users,
        experiments: report.experiments,
        sink_mode: report.sink_mode.to_string(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/experiments", post(run_experiments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::experiment_etl::SinkMode;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn app() -> Router {
        router().with_state(crate::test_support::test_state())
    }

    fn post_json(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/experiments")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_data_directory_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope");
        let resp = app()
            .oneshot(post_json(
                serde_json::json!({ "path_to_data": missing.display().to_string() }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_compound_token_is_internal_error() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("users.csv"), "user_id\n1\n").unwrap();
        std::fs::write(
            temp.path().join("user_experiments.csv"),
            "user_id,experiment_compound_ids,experiment_run_time\n1,1;abc;3,4.0\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("compounds.csv"),
            "compound_id,compound_name\n1,Aspirin\n",
        )
        .unwrap();

        let resp = app()
            .oneshot(post_json(
                serde_json::json!({ "path_to_data": temp.path().display().to_string() }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }

    #[tokio::test]
    async fn parent_segments_are_rejected_before_loading() {
        let resp = app()
            .oneshot(post_json(serde_json::json!({ "path_to_data": "../data" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_body_field_is_rejected() {
        let resp = app()
            .oneshot(post_json(serde_json::json!({ "path": "data" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn response_uses_success_key() {
        let body = serde_json::to_value(RunExperimentsResponse {
            success: true,
            rows_written: 2,
            users: 2,
            experiments: 3,
            sink_mode: SinkMode::Append.to_string(),
        })
        .unwrap();
        assert_eq!(body["Success"], serde_json::json!(true));
        assert_eq!(body["rows_written"], serde_json::json!(2));
        assert_eq!(body["sink_mode"], serde_json::json!("append"));
    }
}

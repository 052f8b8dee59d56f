use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::types::WorksheetId;
use crate::schemas::worksheet::{
    ListWorksheetsQuery, ManualGradeRequest, RegradeWorksheetRequest, SubmitWorksheetRequest,
    WorksheetListResponse, WorksheetResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_worksheet).get(list_worksheets))
        .route("/:worksheet_id", axum::routing::delete(delete_worksheet))
        .route("/:worksheet_id/status", get(worksheet_status))
        .route("/:worksheet_id/grade", post(regrade_worksheet))
        .route("/:worksheet_id/results", put(manual_grade))
}

pub(crate) fn parse_worksheet_id(raw: &str) -> Result<WorksheetId, ApiError> {
    raw.parse().map_err(|_| ApiError::BadRequest("Invalid worksheet ID".to_string()))
}

async fn submit_worksheet(
    State(state): State<AppState>,
    Json(payload): Json<SubmitWorksheetRequest>,
) -> Result<(StatusCode, Json<WorksheetResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let submission = payload.into_submission().map_err(ApiError::BadRequest)?;

    let worksheet = state.worksheets().submit(submission).await?;
    Ok((StatusCode::ACCEPTED, Json(worksheet.into())))
}

async fn list_worksheets(
    State(state): State<AppState>,
    Query(params): Query<ListWorksheetsQuery>,
) -> Result<Json<WorksheetListResponse>, ApiError> {
    let worksheets = state.worksheets().list(params.limit).await?;
    let items: Vec<WorksheetResponse> = worksheets.into_iter().map(Into::into).collect();
    Ok(Json(WorksheetListResponse { count: items.len(), items }))
}

async fn worksheet_status(
    State(state): State<AppState>,
    Path(worksheet_id): Path<String>,
) -> Result<Json<WorksheetResponse>, ApiError> {
    let id = parse_worksheet_id(&worksheet_id)?;
    let worksheet = state.worksheets().status(id).await?;
    Ok(Json(worksheet.into()))
}

async fn delete_worksheet(
    State(state): State<AppState>,
    Path(worksheet_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_worksheet_id(&worksheet_id)?;
    state.worksheets().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn regrade_worksheet(
    State(state): State<AppState>,
    Path(worksheet_id): Path<String>,
    payload: Option<Json<RegradeWorksheetRequest>>,
) -> Result<(StatusCode, Json<WorksheetResponse>), ApiError> {
    let id = parse_worksheet_id(&worksheet_id)?;
    let request = payload.map(|Json(body)| body).unwrap_or_default();

    let worksheet = state.worksheets().regrade(id, request.into()).await?;
    Ok((StatusCode::ACCEPTED, Json(worksheet.into())))
}

async fn manual_grade(
    State(state): State<AppState>,
    Path(worksheet_id): Path<String>,
    Json(payload): Json<ManualGradeRequest>,
) -> Result<Json<WorksheetResponse>, ApiError> {
    let id = parse_worksheet_id(&worksheet_id)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let grade = payload.into_manual_grade().map_err(ApiError::BadRequest)?;

    let worksheet = state.worksheets().manual_grade(id, grade).await?;
    Ok(Json(worksheet.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support::{self, happy_collaborators, json_request, read_json};

    #[tokio::test]
    async fn submit_then_poll_status_until_graded() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;
        let (class_id, student_id) = ctx.enroll("7B", "Ada Lovelace").await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/worksheets",
                Some(json!({
                    "fileRef": "/tmp/worksheets/ada.pdf",
                    "mimeType": "application/pdf",
                    "studentId": student_id.to_string(),
                    "classId": class_id.to_string(),
                    "assignment": "Fractions 1"
                })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = read_json(response).await;
        assert_eq!(body["status"], "uploaded");
        assert_eq!(body["metadata"]["assignment"], "Fractions 1");
        let id = body["id"].as_str().expect("id").to_string();

        ctx.wait_for_terminal(id.parse().expect("uuid")).await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, &format!("/api/v1/worksheets/{id}/status"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "graded");
        assert_eq!(body["progress"], 100);
        assert_eq!(body["normalizedScore"]["percentage"], 82);
        assert_eq!(body["normalizedScore"]["letterGrade"], "B");
        assert!(body["completedAt"].as_str().is_some_and(|value| value.ends_with('Z')));
    }

    #[tokio::test]
    async fn invalid_and_unknown_ids_are_rejected() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/worksheets/not-a-uuid/status", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["detail"], "Invalid worksheet ID");

        let unknown = uuid::Uuid::new_v4();
        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::DELETE, &format!("/api/v1/worksheets/{unknown}"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_upload_is_bad_request() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;
        let (class_id, student_id) = ctx.enroll("7B", "Ada Lovelace").await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/worksheets",
                Some(json!({
                    "fileRef": "notes.txt",
                    "mimeType": "text/plain",
                    "studentId": student_id.to_string(),
                    "classId": class_id.to_string()
                })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manual_results_lock_worksheet() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;
        let worksheet = ctx.seed_worksheet().await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::PUT,
                &format!("/api/v1/worksheets/{}/results", worksheet.id),
                Some(json!({"finalScore": 95, "feedback": "Excellent"})),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "graded");
        assert_eq!(body["locked"], true);
        assert_eq!(body["manuallyEdited"], true);
        assert_eq!(body["normalizedScore"]["letterGrade"], "A");
        assert_eq!(body["feedback"], "Excellent");

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::PUT,
                &format!("/api/v1/worksheets/{}/results", worksheet.id),
                Some(json!({"finalScore": 150})),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn regrade_without_body_restarts_pipeline() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;
        let worksheet = ctx.seed_worksheet().await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("/api/v1/worksheets/{}/grade", worksheet.id),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let done = ctx.wait_for_terminal(worksheet.id).await;
        assert_eq!(done.normalized_score.map(|score| score.percentage), Some(82));

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/worksheets?limit=5", None))
            .await
            .expect("response");
        let body = read_json(response).await;
        assert_eq!(body["count"], 1);
    }
}

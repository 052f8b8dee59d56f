use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::types::ClassId;
use crate::services::analytics::{ClassReport, ClassReports, FleetSummary};
use crate::services::worksheets::StudentGradesReport;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(fleet_summary))
        .route("/classes", get(all_class_analytics))
        .route("/classes/:class_id", get(class_analytics))
        .route("/classes/:class_id/student-grades", get(student_grades))
}

fn parse_class_id(raw: &str) -> Result<ClassId, ApiError> {
    raw.parse().map_err(|_| ApiError::BadRequest("Invalid class ID".to_string()))
}

async fn all_class_analytics(
    State(state): State<AppState>,
) -> Result<Json<ClassReports>, ApiError> {
    Ok(Json(state.worksheets().all_class_analytics().await?))
}

async fn class_analytics(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<ClassReport>, ApiError> {
    let class_id = parse_class_id(&class_id)?;
    Ok(Json(state.worksheets().class_analytics(class_id).await?))
}

async fn student_grades(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<StudentGradesReport>, ApiError> {
    let class_id = parse_class_id(&class_id)?;
    Ok(Json(state.worksheets().student_grades(class_id).await?))
}

async fn fleet_summary(State(state): State<AppState>) -> Result<Json<FleetSummary>, ApiError> {
    Ok(Json(state.worksheets().fleet_summary().await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::services::worksheets::{ManualGrade, ManualScore, SubmitWorksheet};
    use crate::test_support::{self, happy_collaborators, json_request, read_json};

    #[tokio::test]
    async fn class_report_over_http() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;
        let class_id = ctx.roster.add_class("Period 3", Some("Science")).await;
        let ada = ctx.roster.add_student(class_id, "Ada").await;
        let bob = ctx.roster.add_student(class_id, "Bob").await;

        for (student, score) in [(ada, 90.0), (bob, 40.0)] {
            let worksheet = ctx
                .service()
                .submit(SubmitWorksheet {
                    file_ref: "/tmp/worksheets/w.pdf".into(),
                    mime_type: "application/pdf".into(),
                    student_id: Some(student),
                    class_id: Some(class_id),
                    metadata: Default::default(),
                })
                .await
                .expect("submit");
            ctx.wait_for_terminal(worksheet.id).await;
            ctx.service()
                .manual_grade(worksheet.id, ManualGrade { score: ManualScore::Final(score), feedback: None })
                .await
                .expect("manual grade");
        }

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, &format!("/api/v1/analytics/classes/{class_id}"), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["subject"], "Science");
        assert_eq!(body["metrics"]["averageScore"], 65);
        assert_eq!(body["metrics"]["completionRate"], 100);
        assert_eq!(body["topPerformers"][0]["studentName"], "Ada");
        assert_eq!(body["studentsNeedingSupport"][0]["studentName"], "Bob");
        assert_eq!(body["gradeDistribution"]["A"], 1);
        assert_eq!(body["gradeDistribution"]["F"], 1);
    }

    #[tokio::test]
    async fn unknown_class_is_not_found() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;
        let unknown = uuid::Uuid::new_v4();

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/analytics/classes/{unknown}/student-grades"),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/analytics/classes/abc", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn summary_is_empty_without_worksheets() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/analytics/summary", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["counts"]["total"], 0);
        assert_eq!(body["averageGrade"], "N/A");
        assert!(body["averageScore"].is_null());
        assert_eq!(body["thisMonth"]["uploaded"], 0);
        assert_eq!(body["thisWeek"]["graded"], 0);
    }

    #[tokio::test]
    async fn every_class_is_reported() {
        let ctx = test_support::setup_test_context(happy_collaborators()).await;
        let science = ctx.roster.add_class("Period 3", Some("Science")).await;
        ctx.roster.add_class("Period 1", None).await;
        let ada = ctx.roster.add_student(science, "Ada").await;

        let worksheet = ctx
            .service()
            .submit(SubmitWorksheet {
                file_ref: "/tmp/worksheets/w.pdf".into(),
                mime_type: "application/pdf".into(),
                student_id: Some(ada),
                class_id: Some(science),
                metadata: Default::default(),
            })
            .await
            .expect("submit");
        ctx.wait_for_terminal(worksheet.id).await;
        ctx.service()
            .manual_grade(worksheet.id, ManualGrade { score: ManualScore::Final(70.0), feedback: None })
            .await
            .expect("manual grade");

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/analytics/classes", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["totalClasses"], 2);
        assert!(body["generatedAt"].as_str().is_some_and(|at| at.ends_with('Z')));
        assert_eq!(body["classes"][0]["className"], "Period 1");
        assert_eq!(body["classes"][0]["metrics"]["totalWorksheets"], 0);
        assert_eq!(body["classes"][1]["className"], "Period 3");
        assert_eq!(body["classes"][1]["metrics"]["averageScore"], 70);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/analytics/summary", None))
            .await
            .expect("response");
        let body = read_json(response).await;
        assert_eq!(body["thisMonth"]["uploaded"], 1);
        assert_eq!(body["thisWeek"]["graded"], 1);
        assert_eq!(body["thisWeek"]["averageScore"], 70);
    }
}

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use survey_dashboard::app::{AppState, router};
use survey_dashboard::store::SurveyStore;
use tower::ServiceExt;

fn app() -> Router {
    router(Arc::new(AppState::new(SurveyStore::new())))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn sample_batch() -> Value {
    json!([
        { "gender": "Female", "ageGroup": "21-30", "soughtTreatment": 1, "year": "2014", "location": "USA" },
        { "gender": "Male", "ageGroup": "21-30", "soughtTreatment": 0, "year": "2014", "location": "USA" },
        { "gender": "Male", "ageGroup": "31-40", "soughtTreatment": true, "year": "2016", "location": "Canada" }
    ])
}

#[tokio::test]
async fn bulk_upload_then_list() {
    let app = app();
    let (status, body) = post_json(&app, "/api/survey-data/bulk", sample_batch()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Bulk upload successful");
    assert_eq!(body["count"], 3);

    let (status, list) = get_json(&app, "/api/survey-data").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(list[0]["soughtTreatment"], true);
}

#[tokio::test]
async fn empty_bulk_upload_is_rejected() {
    let app = app();
    let (status, body) = post_json(&app, "/api/survey-data/bulk", json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No data provided or invalid format");

    let (_, list) = get_json(&app, "/api/survey-data").await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn single_insert_and_clear() {
    let app = app();
    let (status, record) = post_json(&app, "/api/survey-data", json!({ "gender": "Undecided" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["id"], 1);
    assert_eq!(record["gender"], "Undecided");

    let request = Request::delete("/api/survey-data").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["message"], "All survey data cleared");

    let (_, list) = get_json(&app, "/api/survey-data").await;
    assert_eq!(list, json!([]));

    // ids start over after a clear
    let (_, record) = post_json(&app, "/api/survey-data", json!({})).await;
    assert_eq!(record["id"], 1);
}

#[tokio::test]
async fn malformed_records_get_a_json_error() {
    let app = app();
    let (status, body) = post_json(&app, "/api/survey-data", json!({ "companySize": "huge" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("companySize"));

    let (status, body) = post_json(&app, "/api/survey-data/bulk", json!({ "gender": "Male" })).await;
    assert!(status.is_client_error());
    assert!(body["message"].is_string());

    let request = Request::post("/api/survey-data")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["message"].is_string());

    let (_, list) = get_json(&app, "/api/survey-data").await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn malformed_queries_get_a_json_error() {
    let app = app();
    let (status, body) = get_json(&app, "/api/charts/network?zoom=closer").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = post_json(&app, "/api/survey-data/bulk?clear=maybe", sample_batch()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn bulk_clear_replaces_existing_records() {
    let app = app();
    post_json(&app, "/api/survey-data/bulk", sample_batch()).await;
    let (status, body) = post_json(
        &app,
        "/api/survey-data/bulk?clear=true",
        json!([{ "gender": "Female" }]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["count"], 1);

    let (_, list) = get_json(&app, "/api/survey-data").await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

fn multipart(field: &str, content: &str) -> Request<Body> {
    let boundary = "X-SURVEY-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"survey.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{content}\r\n--{b}--\r\n",
        b = boundary,
        field = field,
        content = content
    );
    Request::post("/api/survey-data/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn csv_upload_stores_rows() {
    let app = app();
    let csv = "Gender,Age-Group,Sought Treatment,year\nFemale,21-30,1,2014\nMale,31-40,0,2015\n";
    let (status, body) = send(&app, multipart("file", csv)).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["count"], 2);

    let (_, options) = get_json(&app, "/api/filters").await;
    assert_eq!(options["years"], json!(["2014", "2015"]));
    assert_eq!(options["genders"], json!(["Female", "Male"]));
}

#[tokio::test]
async fn csv_upload_without_rows_or_file_is_rejected() {
    let app = app();
    let (status, body) = send(&app, multipart("file", "Gender,Age-Group\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["message"], "The CSV file is empty");

    let (status, body) = send(&app, multipart("attachment", "Gender\nMale\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["message"], "No file data received");
}

#[tokio::test]
async fn summary_respects_filters() {
    let app = app();
    post_json(&app, "/api/survey-data/bulk", sample_batch()).await;

    let (status, summary) = get_json(&app, "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["totalRespondents"], 3);
    assert_eq!(summary["countries"], 2);

    let (_, summary) = get_json(&app, "/api/summary?gender=Male&year=2014").await;
    assert_eq!(summary["totalRespondents"], 1);
    assert_eq!(summary["soughtTreatmentPercentage"], 0.0);

    // an empty selection behaves like no filter
    let (_, summary) = get_json(&app, "/api/summary?gender=").await;
    assert_eq!(summary["totalRespondents"], 3);
}

#[tokio::test]
async fn chart_catalogue_lists_every_chart() {
    let (status, charts) = get_json(&app(), "/api/charts").await;
    assert_eq!(status, StatusCode::OK);
    let charts = charts.as_array().unwrap();
    assert_eq!(charts.len(), 8);
    assert_eq!(charts[0]["id"], "gender-factors");
}

#[tokio::test]
async fn chart_view_with_mode_and_filters() {
    let app = app();
    post_json(&app, "/api/survey-data/bulk", sample_batch()).await;

    let (status, view) = get_json(&app, "/api/charts/age-groups?mode=donut&year=2014").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["mode"], "donut");
    assert_eq!(view["records"], 2);
    assert_eq!(view["layout"]["status"], "ready");
    assert_eq!(view["layout"]["geometry"]["kind"], "pie");

    let (_, view) = get_json(&app, "/api/charts/geography?year=1999").await;
    assert_eq!(view["records"], 0);
    assert_eq!(view["layout"]["status"], "noData");
    assert_eq!(view["layout"]["message"], "No data available");
}

#[tokio::test]
async fn chart_errors_map_to_status_codes() {
    let app = app();
    let (status, body) = get_json(&app, "/api/charts/sunburst").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Unknown chart: sunburst");

    let (status, _) = get_json(&app, "/api/charts/network?mode=pie").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_json(&app, "/api/charts/network?mode=radar").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unknown chart mode: radar");
}

#[tokio::test]
async fn csv_export_downloads_everything() {
    let app = app();
    post_json(&app, "/api/survey-data/bulk", sample_batch()).await;

    let request = Request::get("/api/survey-data/export.csv")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("mental_health_tech_data.csv"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("id,familyHistory,companySize,year"));
    assert_eq!(lines.count(), 3);
}

#[tokio::test]
async fn xlsx_export_is_a_zip_archive() {
    let app = app();
    post_json(&app, "/api/survey-data/bulk", sample_batch()).await;
    let request = Request::get("/api/survey-data/export.xlsx")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..2], b"PK");
}

#[tokio::test]
async fn svg_preview_is_served_as_svg() {
    let app = app();
    post_json(&app, "/api/survey-data/bulk", sample_batch()).await;

    let request = Request::get("/api/charts/company-size/svg?mode=line")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let svg = String::from_utf8(body.to_vec()).unwrap();
    assert!(svg.contains("<svg"));
}

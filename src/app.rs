#![cfg(feature = "web")]

use axum::{
    Json, Router,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::aggregate::{Summary, summarize};
use crate::charts::{ChartId, ChartInfo, ChartMode, ChartRequest, ChartView, build_chart, catalogue};
use crate::config::ServerConfig;
use crate::error::DashboardError;
use crate::export::{self, CSV_FILE_NAME, XLSX_FILE_NAME};
use crate::filter::{self, FilterOptions, FilterState};
use crate::ingest;
use crate::layout::DisplayOptions;
use crate::record::{NewSurveyRecord, SurveyRecord};
use crate::render::render_svg;
use crate::store::SurveyStore;

pub struct AppState {
    store: Mutex<SurveyStore>,
    display: DisplayOptions,
}

impl AppState {
    pub fn new(store: SurveyStore) -> Self {
        AppState {
            store: Mutex::new(store),
            display: DisplayOptions::default(),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, SurveyStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::internal("survey store is unavailable"))
    }
}

/// JSON error body: `{ "message": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        let status = match &err {
            DashboardError::EmptyUpload
            | DashboardError::EmptyBatch
            | DashboardError::Csv(_)
            | DashboardError::UnsupportedMode { .. } => StatusCode::BAD_REQUEST,
            DashboardError::UnknownChart(_) => StatusCode::NOT_FOUND,
            DashboardError::Io(_) | DashboardError::Xlsx(_) | DashboardError::Render(_) => {
                error!("request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

// Extractor failures keep axum's status but use the JSON error body.
macro_rules! impl_from_rejection {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    warn!("rejected request: {}", rejection.body_text());
                    ApiError {
                        status: rejection.status(),
                        message: rejection.body_text(),
                    }
                }
            }
        )*
    };
}

impl_from_rejection!(JsonRejection, QueryRejection, MultipartRejection);

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(MessageBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct BulkResponse {
    message: String,
    count: usize,
}

#[derive(Deserialize)]
struct ClearQuery {
    #[serde(default)]
    clear: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartQuery {
    year: Option<String>,
    gender: Option<String>,
    company_size: Option<String>,
    age_group: Option<String>,
    mode: Option<String>,
    zoom: Option<f64>,
}

impl ChartQuery {
    fn filter(&self) -> FilterState {
        FilterState {
            year: self.year.clone(),
            gender: self.gender.clone(),
            company_size: self.company_size.clone(),
            age_group: self.age_group.clone(),
        }
        .normalized()
    }

    fn request(&self) -> Result<ChartRequest, ApiError> {
        let mode = match self.mode.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<ChartMode>()
                    .map_err(|m| ApiError::bad_request(format!("Unknown chart mode: {}", m)))?,
            ),
        };
        Ok(ChartRequest {
            mode,
            zoom: self.zoom,
        })
    }
}

/// The JSON API, without static files or CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/survey-data",
            get(list_records).post(insert_record).delete(clear_records),
        )
        .route("/api/survey-data/bulk", post(insert_bulk))
        .route("/api/survey-data/upload", post(upload_csv))
        .route("/api/survey-data/export.csv", get(export_csv))
        .route("/api/survey-data/export.xlsx", get(export_xlsx))
        .route("/api/filters", get(filter_options))
        .route("/api/summary", get(summary))
        .route("/api/charts", get(list_charts))
        .route("/api/charts/:chart", get(chart_view))
        .route("/api/charts/:chart/svg", get(chart_svg))
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let store = match &config.seed {
        Some(path) => {
            let records = ingest::from_path(path)?;
            info!("seeded {} survey records from {}", records.len(), path.display());
            SurveyStore::with_records(records)
        }
        None => SurveyStore::new(),
    };
    let state = Arc::new(AppState::new(store));

    if !config.static_dir.is_dir() {
        warn!(
            "static directory {} not found; serving the API only",
            config.static_dir.display()
        );
    }
    let app = router(state)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive());

    let address = config.bind_address()?;
    let listener = TcpListener::bind(address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn list_records(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SurveyRecord>>, ApiError> {
    let store = state.store()?;
    Ok(Json(store.all().to_vec()))
}

async fn insert_record(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewSurveyRecord>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let record = state.store()?.insert_one(payload);
    info!("stored survey record {}", record.id);
    Ok((StatusCode::CREATED, Json(record)))
}

fn store_batch(
    state: &AppState,
    batch: Vec<NewSurveyRecord>,
    clear: bool,
) -> Result<BulkResponse, ApiError> {
    if batch.is_empty() {
        return Err(DashboardError::EmptyBatch.into());
    }
    let mut store = state.store()?;
    if clear {
        store.clear();
    }
    let count = store.insert_many(batch).len();
    info!("bulk upload stored {} records (total {})", count, store.len());
    Ok(BulkResponse {
        message: "Bulk upload successful".to_string(),
        count,
    })
}

async fn insert_bulk(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ClearQuery>, QueryRejection>,
    batch: Result<Json<Vec<NewSurveyRecord>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let Json(batch) = batch?;
    let body = store_batch(&state, batch, params.clear)?;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn upload_csv(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ClearQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let mut multipart = multipart?;
    let mut file_data = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() == Some("file") {
            file_data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?
                .to_vec();
        }
    }

    if file_data.is_empty() {
        return Err(ApiError::bad_request("No file data received"));
    }

    // parse fully before touching the store
    let batch = ingest::from_reader(file_data.as_slice())?;
    let body = store_batch(&state, batch, params.clear)?;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn clear_records(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state.store()?.clear();
    info!("survey store cleared");
    Ok(Json(MessageBody {
        message: "All survey data cleared".to_string(),
    }))
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let csv = export::to_csv(state.store()?.all())?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", CSV_FILE_NAME),
            ),
        ],
        csv,
    ))
}

async fn export_xlsx(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let bytes = export::to_xlsx(state.store()?.all())?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", XLSX_FILE_NAME),
            ),
        ],
        bytes,
    ))
}

async fn filter_options(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FilterOptions>, ApiError> {
    let store = state.store()?;
    Ok(Json(FilterOptions::from_records(store.all())))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<FilterState>, QueryRejection>,
) -> Result<Json<Summary>, ApiError> {
    let Query(filter) = filter?;
    let store = state.store()?;
    let records = filter::apply(store.all(), &filter.normalized());
    Ok(Json(summarize(&records)))
}

async fn list_charts() -> Json<Vec<ChartInfo>> {
    Json(catalogue())
}

fn build_view(state: &AppState, chart: &str, query: &ChartQuery) -> Result<ChartView, ApiError> {
    let chart: ChartId = chart.parse()?;
    let request = query.request()?;
    let store = state.store()?;
    let records = filter::apply(store.all(), &query.filter());
    Ok(build_chart(chart, &records, &request, &state.display)?)
}

async fn chart_view(
    State(state): State<Arc<AppState>>,
    Path(chart): Path<String>,
    query: Result<Query<ChartQuery>, QueryRejection>,
) -> Result<Json<ChartView>, ApiError> {
    let Query(query) = query?;
    Ok(Json(build_view(&state, &chart, &query)?))
}

async fn chart_svg(
    State(state): State<Arc<AppState>>,
    Path(chart): Path<String>,
    query: Result<Query<ChartQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let view = build_view(&state, &chart, &query)?;
    let svg = render_svg(&view)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

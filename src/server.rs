//! HTTP transport: upload a workbook, then query its facets and filtered rows.
//!
//! | Route                                | Response                    |
//! |--------------------------------------|-----------------------------|
//! | `POST /api/upload` (multipart `file`)| `{"uploadId": "..."}`       |
//! | `GET /api/filters/all?uploadId=ID`   | `{"Column": ["value", ..]}` |
//! | `GET /api/data?uploadId=ID&Col=v`    | `{"rows": [{..}, ..]}`      |
//! | `GET /health`                        | `ok`                        |

use crate::config::Config;
use crate::store::UploadId;
use crate::store::UploadStore;
use crate::table::facets;
use crate::table::filter;
use crate::table::FilterSpec;
use crate::table::Row;
use crate::table::Table;
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::extract::Multipart;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use log::debug;
use log::error;
use log::info;
use log::warn;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;

/// Multipart field carrying the workbook
const FILE_FIELD: &str = "file";
/// Query key selecting the upload; every other key is a column constraint
const UPLOAD_ID_KEY: &str = "uploadId";
const UPLOAD_FAILED: &str = "Failed to read the uploaded file.";
const MISSING_UPLOAD_ID: &str = "Missing uploadId";

/// Shared by every handler.
pub struct AppState {
    pub store: UploadStore,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            store: UploadStore::new(),
            config,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    upload_id: UploadId,
}

#[derive(Serialize)]
struct DataResponse {
    rows: Vec<Row>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

fn error_response(status: StatusCode, message: &'static str) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

/// Routes of the service, with permissive CORS and the configured body limit.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/filters/all", get(all_filters))
        .route("/api/data", get(data))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(state.config.upload_limit))
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until the process ends.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    info!(
        "Listening on {} (upload limit {} bytes)",
        listener.local_addr()?,
        config.upload_limit
    );
    let state = Arc::new(AppState::new(config));
    axum::serve(listener, router(state))
        .await
        .context("Server terminated")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut bytes = None::<Vec<u8>>;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                warn!("Rejected upload: {}", error.body_text());
                return error_response(error.status(), UPLOAD_FAILED);
            }
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        match field.bytes().await {
            Ok(data) => {
                debug!("Received '{}' ({} bytes)", file_name, data.len());
                bytes = Some(data.to_vec());
            }
            Err(error) => {
                warn!("Rejected upload '{}': {}", file_name, error.body_text());
                return error_response(error.status(), UPLOAD_FAILED);
            }
        }
    }
    let Some(bytes) = bytes else {
        warn!("Rejected upload: no '{}' field", FILE_FIELD);
        return error_response(StatusCode::BAD_REQUEST, UPLOAD_FAILED);
    };

    match tokio::task::spawn_blocking(move || Table::from_workbook(bytes)).await {
        Ok(Ok(table)) => {
            let rows = table.len();
            let upload_id = state.store.put(table);
            info!("Accepted upload {} ({} rows)", upload_id, rows);
            Json(UploadResponse { upload_id }).into_response()
        }
        Ok(Err(error)) => {
            warn!("Rejected upload: {}", error);
            error_response(StatusCode::BAD_REQUEST, UPLOAD_FAILED)
        }
        Err(error) => {
            error!("Decoding task failed: {}", error);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, UPLOAD_FAILED)
        }
    }
}

/// Splits a raw query into the upload id and the column constraints.
/// Repeated column keys accumulate into one set.
fn parse_query(query: Option<&str>) -> (Option<UploadId>, FilterSpec) {
    let mut upload_id = None;
    let mut spec = FilterSpec::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        if key == UPLOAD_ID_KEY {
            upload_id = Some(UploadId::from(value.into_owned()));
        } else {
            spec.entry(key.into_owned()).or_default().insert(value.into_owned());
        }
    }
    (upload_id, spec)
}

async fn all_filters(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    let (Some(upload_id), _) = parse_query(query.as_deref()) else {
        return error_response(StatusCode::BAD_REQUEST, MISSING_UPLOAD_ID);
    };
    let table = state.store.get(&upload_id);
    let facets = facets(table.as_deref());
    debug!("Facets for {}: {} columns", upload_id, facets.len());
    Json(facets).into_response()
}

async fn data(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    let (Some(upload_id), spec) = parse_query(query.as_deref()) else {
        return error_response(StatusCode::BAD_REQUEST, MISSING_UPLOAD_ID);
    };
    let table = state.store.get(&upload_id);
    let rows = filter(table.as_deref(), &spec);
    debug!(
        "Data for {}: {} constrained columns, {} rows",
        upload_id,
        spec.len(),
        rows.len()
    );
    Json(DataResponse { rows }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::fixtures;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use serde_json::json;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "facets-test-boundary";

    fn state(upload_limit: usize) -> Arc<AppState> {
        Arc::new(AppState::new(Config {
            upload_limit,
            ..Config::default()
        }))
    }

    fn names_and_cities() -> Vec<u8> {
        let strings = fixtures::worksheet(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
               <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2" t="s"><v>3</v></c></row>
               <row r="3"><c r="A3" t="s"><v>4</v></c><c r="B3" t="s"><v>5</v></c></row>
               <row r="4"><c r="A4" t="s"><v>6</v></c><c r="B4" t="s"><v>3</v></c></row>"#,
        );
        fixtures::xlsx_with(&strings, &["Name", "City", "Ana", "Paris", "Bo", "Tunis", "Cy"], false)
    }

    fn multipart_request(field: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"data.xlsx\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(Arc::clone(state)).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn upload_id(state: &Arc<AppState>) -> String {
        let (status, body) = send(state, multipart_request("file", &names_and_cities())).await;
        assert_eq!(status, StatusCode::OK);
        body["uploadId"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn upload_then_query() {
        let state = state(1024 * 1024);
        let id = upload_id(&state).await;
        assert_eq!(state.store.len(), 1);

        let (status, body) = send(&state, get_request(&format!("/api/filters/all?uploadId={id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"Name": ["Ana", "Bo", "Cy"], "City": ["Paris", "Tunis"]}));

        let (status, body) = send(&state, get_request(&format!("/api/data?uploadId={id}&City=Paris"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"rows": [{"Name": "Ana", "City": "Paris"}, {"Name": "Cy", "City": "Paris"}]})
        );
    }

    #[tokio::test]
    async fn repeated_keys_accumulate() {
        let state = state(1024 * 1024);
        let id = upload_id(&state).await;

        let (_, body) = send(&state, get_request(&format!("/api/data?City=Paris&uploadId={id}&City=Tunis&Name=Bo"))).await;
        assert_eq!(body, json!({"rows": [{"Name": "Bo", "City": "Tunis"}]}));

        let (_, body) = send(&state, get_request(&format!("/api/data?uploadId={id}"))).await;
        assert_eq!(body["rows"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn column_order_survives_serialization() {
        let state = state(1024 * 1024);
        let id = upload_id(&state).await;

        let response = router(Arc::clone(&state))
            .oneshot(get_request(&format!("/api/data?uploadId={id}&Name=Ana")))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"rows":[{"Name":"Ana","City":"Paris"}]}"#);
    }

    #[tokio::test]
    async fn unknown_upload_is_empty() {
        let state = state(1024 * 1024);

        let (status, body) = send(&state, get_request("/api/filters/all?uploadId=nonexistent-id")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));

        let (status, body) = send(&state, get_request("/api/data?uploadId=nonexistent-id&City=Paris")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"rows": []}));
    }

    #[tokio::test]
    async fn missing_upload_id_is_rejected() {
        let state = state(1024 * 1024);
        for uri in ["/api/filters/all", "/api/data?City=Paris"] {
            let (status, body) = send(&state, get_request(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({"error": "Missing uploadId"}));
        }
    }

    #[tokio::test]
    async fn undecodable_upload_is_rejected() {
        let state = state(1024 * 1024);
        let (status, body) = send(&state, multipart_request("file", b"Name,City\nAna,Paris\n")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Failed to read the uploaded file."}));
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let state = state(1024 * 1024);
        let (status, body) = send(&state, multipart_request("attachment", &names_and_cities())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Failed to read the uploaded file."}));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let state = state(64);
        let (status, _) = send(&state, multipart_request("file", &names_and_cities())).await;

        assert!(status.is_client_error());
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn empty_sheet_uploads_as_empty_table() {
        let state = state(1024 * 1024);
        let bytes = fixtures::xlsx(&fixtures::worksheet(""));
        let (status, body) = send(&state, multipart_request("file", &bytes)).await;
        assert_eq!(status, StatusCode::OK);
        let id = body["uploadId"].as_str().unwrap().to_owned();

        let (_, body) = send(&state, get_request(&format!("/api/filters/all?uploadId={id}"))).await;
        assert_eq!(body, json!({}));
        let (_, body) = send(&state, get_request(&format!("/api/data?uploadId={id}&City=Paris"))).await;
        assert_eq!(body, json!({"rows": []}));
    }

    #[tokio::test]
    async fn health_check() {
        let response = router(state(1024)).oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[test]
    fn query_parsing() {
        let (upload_id, spec) = parse_query(Some("uploadId=abc&City=Paris&City=Tunis&Note=&Name=Ana%20Maria"));
        assert_eq!(upload_id, Some(UploadId::from("abc")));
        assert_eq!(spec.len(), 3);
        assert_eq!(spec["City"].len(), 2);
        assert!(spec["Note"].contains(""));
        assert!(spec["Name"].contains("Ana Maria"));

        let (upload_id, spec) = parse_query(None);
        assert!(upload_id.is_none());
        assert!(spec.is_empty());
    }
}

//! REST API for the grouping service.
//!
//! Provides HTTP endpoints for communication with the frontend.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, GrouperConfig};
use crate::filter::{DropStats, RawRow, filter_rows};
use crate::grouper::{
    ceiling_for, classify_leftover, group_items, group_items_with_progress, validate_target,
};
use crate::model::{Item, RunResult};
use crate::report::{CategoryGroup, ComboSection, ExportDocument, ExportRow, render_text};

#[derive(Clone)]
struct ApiState {
    grouper_config: GrouperConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>combo-batch API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded Web Assets (HTML, CSS, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// Request structure for the grouping endpoints.
///
/// `rows` carries the raw extracted rows including their marking booleans;
/// `target` optionally overrides the configured default target weight.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "rows": [
            { "category": "Category_A", "id": "WOOD_CHIP_001", "weight": 700.0 },
            { "category": "Category_B", "id": "WOOD_CHIP_002", "weight": "650.5" },
            { "id": "WOOD_CHIP_003", "weight": 120.0, "id_marked": true }
        ],
        "target": 1300.0
    })
)]
pub struct GroupRequest {
    pub rows: Vec<RawRow>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub target: Option<f64>,
}

/// Response structure with the full grouping outcome.
#[derive(Serialize, ToSchema)]
pub struct GroupResponse {
    pub target: f64,
    pub ceiling: f64,
    pub combos: Vec<GroupedCombo>,
    pub leftovers: Vec<LeftoverItem>,
    pub is_complete: bool,
    pub eligible_count: usize,
    pub dropped: DropStats,
    pub export: ExportDocument,
}

/// Single committed combo in the response.
#[derive(Serialize, ToSchema)]
pub struct GroupedCombo {
    pub index: usize,
    pub total_weight: f64,
    pub item_count: usize,
    pub items: Vec<Item>,
}

/// Single leftover item in the response, with its classification.
#[derive(Serialize, ToSchema)]
pub struct LeftoverItem {
    pub id: String,
    pub category: Option<String>,
    pub weight: f64,
    pub reason_code: String,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn target_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid target weight",
        details,
    )
}

/// Unwraps the JSON payload and resolves the effective target weight.
fn parse_group_request(
    payload: Result<Json<GroupRequest>, JsonRejection>,
    config: &GrouperConfig,
) -> Result<(Vec<RawRow>, f64), Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    let target = payload.target.unwrap_or_else(|| config.default_target());
    if let Err(err) = validate_target(target) {
        return Err(target_error(err.to_string()));
    }

    Ok((payload.rows, target))
}

impl GroupResponse {
    /// Creates a GroupResponse from a run result plus filter diagnostics.
    pub fn from_run(
        result: RunResult,
        target: f64,
        eligible_count: usize,
        dropped: DropStats,
    ) -> Self {
        let export = ExportDocument::from_result(&result);
        let is_complete = result.is_complete();

        let combos = result
            .combos
            .iter()
            .enumerate()
            .map(|(i, combo)| GroupedCombo {
                index: i + 1,
                total_weight: combo.total_weight,
                item_count: combo.item_count(),
                items: combo.items.clone(),
            })
            .collect();

        let leftovers = result
            .leftovers
            .iter()
            .map(|item| {
                let reason = classify_leftover(item, target);
                LeftoverItem {
                    id: item.id.clone(),
                    category: item.category.clone(),
                    weight: item.weight,
                    reason_code: reason.code().to_string(),
                    reason: reason.to_string(),
                }
            })
            .collect();

        Self {
            target,
            ceiling: ceiling_for(target),
            combos,
            leftovers,
            is_complete,
            eligible_count,
            dropped,
            export,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_group, handle_group_stream, handle_group_report),
    components(
        schemas(
            GroupRequest,
            RawRow,
            GroupResponse,
            GroupedCombo,
            LeftoverItem,
            ErrorResponse,
            Item,
            DropStats,
            ExportDocument,
            ComboSection,
            ExportRow,
            CategoryGroup
        )
    ),
    tags((name = "grouping", description = "Endpoints for combo grouping"))
)]
struct ApiDoc;

/// Starts the API server.
///
/// Configures CORS for cross-origin requests from the frontend.
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, grouper_config: GrouperConfig) {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState { grouper_config };

    let app = Router::new()
        // API endpoints
        .route("/group", post(handle_group))
        .route("/group_stream", post(handle_group_stream))
        .route("/group_report", post(handle_group_report))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        // Web-UI (embedded)
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(cors)
        .with_state(state);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            panic!("❌ Could not bind API server to {}: {}", addr, err);
        }
    };

    let display_host = config.display_host().to_string();
    println!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        println!("💡 Local access: http://localhost:{}", config.port());
    }
    println!("📦 API Endpoints:");
    println!("   - POST /group");
    println!("   - POST /group_stream");
    println!("   - POST /group_report");
    println!("📑 Documentation:");
    println!("   - GET /docs");
    println!("   - GET /docs/openapi.json");
    println!("🌐 Web-UI: http://{}:{}", display_host, config.port());

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for POST /group endpoint.
///
/// Filters the submitted rows for eligibility and groups the candidates
/// into combos against the target weight.
#[utoipa::path(
    post,
    path = "/group",
    request_body = GroupRequest,
    responses(
        (status = 200, description = "Successfully grouped items", body = GroupResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or target weight",
            body = ErrorResponse
        )
    ),
    tag = "grouping"
)]
async fn handle_group(
    State(state): State<ApiState>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (rows, target) = match parse_group_request(payload, &state.grouper_config) {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let row_count = rows.len();
    let outcome = filter_rows(rows);
    println!(
        "📥 New group request: {} rows, {} eligible, {} dropped, target {}",
        row_count,
        outcome.items.len(),
        outcome.dropped.total(),
        target
    );

    let eligible_count = outcome.items.len();
    let result = match group_items(outcome.items, target) {
        Ok(result) => result,
        Err(err) => return target_error(err.to_string()),
    };
    println!(
        "📦 Result: {} combos, {} leftover items",
        result.combo_count(),
        result.leftover_count()
    );

    let response = GroupResponse::from_run(result, target, eligible_count, outcome.dropped);
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /group_stream endpoint (SSE).
///
/// Streams grouping events in real-time as Server-Sent Events
/// (text/event-stream). The frontend can visualize combos as they are
/// committed without waiting for the complete result.
#[utoipa::path(
    post,
    path = "/group_stream",
    request_body = GroupRequest,
    responses(
        (
            status = 200,
            description = "Streams grouping events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or target weight",
            body = ErrorResponse
        )
    ),
    tag = "grouping"
)]
async fn handle_group_stream(
    State(state): State<ApiState>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (rows, target) = match parse_group_request(payload, &state.grouper_config) {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let outcome = filter_rows(rows);
        let run = group_items_with_progress(outcome.items, target, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                if tx.blocking_send(json).is_err() {
                    // Receiver has closed the stream; remaining events are discarded.
                    return;
                }
            }
        });
        if let Err(err) = run {
            eprintln!("⚠️ Grouping aborted: {err}");
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /group_report endpoint.
///
/// Runs the same pipeline as /group but answers with the plain-text summary.
#[utoipa::path(
    post,
    path = "/group_report",
    request_body = GroupRequest,
    responses(
        (
            status = 200,
            description = "Plain-text run summary",
            content_type = "text/plain",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or target weight",
            body = ErrorResponse
        )
    ),
    tag = "grouping"
)]
async fn handle_group_report(
    State(state): State<ApiState>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (rows, target) = match parse_group_request(payload, &state.grouper_config) {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let outcome = filter_rows(rows);
    let result = match group_items(outcome.items, target) {
        Ok(result) => result,
        Err(err) => return target_error(err.to_string()),
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_text(&result),
    )
        .into_response()
}

/// Serves the index.html main page
async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Serves static assets (JS, CSS, etc.)
async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in ["/group", "/group_stream", "/group_report"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        let schemas = &components.schemas;
        for name in ["GroupRequest", "GroupResponse", "RawRow", "ErrorResponse"] {
            assert!(
                schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn group_request_parses_target_when_present() {
        let json = r#"{
            "rows": [{"id": "A", "weight": 700.0}],
            "target": 1500.0
        }"#;
        let request: GroupRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert_eq!(request.target, Some(1500.0));
    }

    #[test]
    fn group_request_target_defaults_to_none_when_absent() {
        let json = r#"{ "rows": [{"id": "A", "weight": 700.0}] }"#;
        let request: GroupRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert_eq!(request.target, None);
    }

    #[test]
    fn group_request_target_defaults_to_none_when_null() {
        let json = r#"{ "rows": [], "target": null }"#;
        let request: GroupRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert_eq!(request.target, None);
    }

    #[test]
    fn group_request_accepts_string_weights_and_marks() {
        let json = r#"{
            "rows": [
                {"category": "Birch", "id": "A", "weight": "700.5"},
                {"id": "B", "weight": 120.0, "weight_marked": true}
            ]
        }"#;
        let request: GroupRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert_eq!(request.rows.len(), 2);
        assert!(request.rows[1].weight_marked);
        assert!(!request.rows[0].id_marked);
    }

    #[test]
    fn group_response_classifies_leftovers() {
        let items = vec![
            crate::model::Item::new(None, "A", 700.0).unwrap(),
            crate::model::Item::new(None, "B", 700.0).unwrap(),
            crate::model::Item::new(None, "C", 2000.0).unwrap(),
            crate::model::Item::new(None, "D", 10.0).unwrap(),
        ];
        let result = group_items(items, 1300.0).unwrap();

        let response = GroupResponse::from_run(result, 1300.0, 4, DropStats::default());
        assert_eq!(response.combos.len(), 1);
        assert_eq!(response.combos[0].index, 1);
        assert!(!response.is_complete);
        assert_eq!(response.ceiling, 1950.0);

        let by_id: std::collections::HashMap<&str, &str> = response
            .leftovers
            .iter()
            .map(|l| (l.id.as_str(), l.reason_code.as_str()))
            .collect();
        assert_eq!(by_id["C"], "exceeds_ceiling");
        assert_eq!(by_id["D"], "no_fitting_combo");
    }

    #[test]
    fn group_response_reports_completion() {
        let items = vec![
            crate::model::Item::new(None, "A", 700.0).unwrap(),
            crate::model::Item::new(None, "B", 700.0).unwrap(),
        ];
        let result = group_items(items, 1300.0).unwrap();

        let response = GroupResponse::from_run(result, 1300.0, 2, DropStats::default());
        assert!(response.is_complete);
        assert!(response.leftovers.is_empty());
        assert_eq!(response.export.sections.len(), 1);
    }
}

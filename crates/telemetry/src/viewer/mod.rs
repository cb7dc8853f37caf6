//! Read-only HTML viewer for the `raw_data` and `avg_data` tables.
//!
//! - `GET /db-viewer` - index
//! - `GET /db-viewer/raw-data` - newest raw readings
//! - `GET /db-viewer/avg-data` - newest averages

pub mod html;

use crate::store::ReadingStore;
use crate::types::StoredTable;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use config::ViewerConfig;
use std::sync::Arc;
use tracing::error;

/// Shared state for viewer handlers.
pub struct ViewerState {
    pub store: Arc<dyn ReadingStore>,
    pub row_limit: usize,
    pub refresh_seconds: u64,
}

impl ViewerState {
    pub fn new(store: Arc<dyn ReadingStore>, config: &ViewerConfig) -> Self {
        Self {
            store,
            row_limit: config.row_limit.max(1),
            refresh_seconds: config.refresh_seconds,
        }
    }
}

type ViewerResult = Result<Html<String>, (StatusCode, String)>;

fn fetch_error(err: impl std::fmt::Display) -> (StatusCode, String) {
    error!(error = %err, "Viewer query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Error fetching data: {}", err),
    )
}

async fn index() -> Html<String> {
    Html(html::render_index(&[
        (StoredTable::RawData.name(), "/db-viewer/raw-data"),
        (StoredTable::AvgData.name(), "/db-viewer/avg-data"),
    ]))
}

/// Newest rows of `table`, rendered as stored.
async fn table_page(state: &ViewerState, table: StoredTable) -> ViewerResult {
    let dump = state
        .store
        .dump_table(table, state.row_limit)
        .await
        .map_err(fetch_error)?;

    let columns: Vec<&str> = dump.columns.iter().map(String::as_str).collect();
    let cells: Vec<Vec<String>> = dump
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(html::nullable).collect())
        .collect();

    Ok(Html(html::render_table(
        table.name(),
        &columns,
        &cells,
        state.row_limit,
        state.refresh_seconds,
    )))
}

async fn raw_data(State(state): State<Arc<ViewerState>>) -> ViewerResult {
    table_page(&state, StoredTable::RawData).await
}

async fn avg_data(State(state): State<Arc<ViewerState>>) -> ViewerResult {
    table_page(&state, StoredTable::AvgData).await
}

/// Create the viewer routes.
pub fn viewer_routes(state: Arc<ViewerState>) -> Router {
    Router::new()
        .route("/db-viewer", get(index))
        .route("/db-viewer/raw-data", get(raw_data))
        .route("/db-viewer/avg-data", get(avg_data))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteReadingStore;
    use crate::store::failing::{FailingStore, FAILURE};
    use crate::store::InMemoryReadingStore;
    use crate::types::{AverageRecord, NewReading, ReadingKind};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    async fn fetch(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn router_with(store: Arc<dyn ReadingStore>) -> Router {
        viewer_routes(Arc::new(ViewerState::new(store, &ViewerConfig::default())))
    }

    #[tokio::test]
    async fn test_index_lists_tables() {
        let (status, body) = fetch(router_with(Arc::new(InMemoryReadingStore::new())), "/db-viewer").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("href=\"/db-viewer/raw-data\""));
        assert!(body.contains("href=\"/db-viewer/avg-data\""));
    }

    #[tokio::test]
    async fn test_tables_render_rows() {
        let store = Arc::new(InMemoryReadingStore::new());
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store
            .insert_reading(NewReading::new(ReadingKind::Temperature, 21.5, ts).unwrap())
            .await
            .unwrap();
        store
            .insert_average(AverageRecord {
                avg_temperature: Some(21.5),
                avg_humidity: None,
                timestamp: ts,
            })
            .await
            .unwrap();
        let router = router_with(store);

        let (status, body) = fetch(router.clone(), "/db-viewer/raw-data").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<td>temperature</td><td>21.5</td><td>2024-05-01T12:00:00.000Z</td>"));
        assert!(body.contains("content=\"30\""));

        let (_, body) = fetch(router, "/db-viewer/avg-data").await;
        assert!(body.contains("<td>21.5</td><td>null</td>"));
    }

    #[tokio::test]
    async fn test_empty_table() {
        let (_, body) = fetch(router_with(Arc::new(InMemoryReadingStore::new())), "/db-viewer/avg-data").await;
        assert!(body.contains("No data found in this table."));
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let router = router_with(Arc::new(FailingStore));
        for uri in ["/db-viewer/raw-data", "/db-viewer/avg-data"] {
            let (status, body) = fetch(router.clone(), uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body.starts_with("Error fetching data: "));
            assert!(body.contains(FAILURE));
        }
    }

    #[tokio::test]
    async fn test_sqlite_rows_shown_as_stored() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store
            .insert_reading(NewReading::new(ReadingKind::Humidity, 55.0, ts).unwrap())
            .await
            .unwrap();
        store
            .insert_average(AverageRecord {
                avg_temperature: None,
                avg_humidity: Some(55.0),
                timestamp: ts,
            })
            .await
            .unwrap();
        let router = router_with(Arc::new(store));

        let (status, body) = fetch(router.clone(), "/db-viewer/raw-data").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<th>id</th><th>type</th><th>value</th><th>timestamp</th>"));
        assert!(body.contains("<td>humidity</td><td>55.0</td><td>2024-05-01T12:00:00.000Z</td>"));

        let (_, body) = fetch(router, "/db-viewer/avg-data").await;
        assert!(body.contains("<td>null</td><td>55.0</td>"));
    }

    #[tokio::test]
    async fn test_legacy_rows_listed() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        store.insert_raw_text("temperature", 19.0, "5/1/2024, 12:00:05 PM").await;
        store.insert_raw_text("pressure", 1013.0, "2024-05-01T12:00:10.000Z").await;

        let (status, body) = fetch(router_with(Arc::new(store)), "/db-viewer/raw-data").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<td>5/1/2024, 12:00:05 PM</td>"));
        assert!(body.contains("<td>pressure</td><td>1013.0</td>"));
    }
}

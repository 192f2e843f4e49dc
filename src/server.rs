//! HTTP service boundary exposing the data-point query endpoint.

use crate::store::DataPointStore;
use crate::stream;
use crate::types::QueryRange;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn DataPointStore>,
}

/// JSON error envelope returned on 4xx/5xx.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    start: Option<String>,
    until: Option<String>,
}

/// Build the service router.
pub fn router(store: Arc<dyn DataPointStore>) -> Router {
    Router::new()
        .route("/data-point", get(data_point_query))
        .with_state(AppState { store })
}

/// `GET /data-point?start=<RFC3339>&until=<RFC3339>`, both parameters
/// optional. The response body is streamed; once streaming has begun,
/// undecodable rows are skipped and a cursor failure closes the array
/// early rather than surfacing as an error status.
async fn data_point_query(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Response {
    let start = match parse_time("start", params.start.as_deref()) {
        Ok(t) => t,
        Err(response) => return response,
    };
    let until = match parse_time("until", params.until.as_deref()) {
        Ok(t) => t,
        Err(response) => return response,
    };

    let rows = match state.store.query(QueryRange { start, until }).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "data point query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    message: format!("failed to query data points: {e}"),
                }),
            )
                .into_response();
        }
    };

    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream::encode_array(rows)),
    )
        .into_response()
}

fn parse_time(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, Response> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Ok(Some(t.with_timezone(&Utc))),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                message: format!("failed to parse {name} time: {e}"),
            }),
        )
            .into_response()),
    }
}

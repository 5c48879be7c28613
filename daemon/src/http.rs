//! Read-only status endpoint

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use js5watch_monitor::LastReset;

pub fn router(last_reset: LastReset) -> Router {
    Router::new()
        .route("/lastreset", get(get_last_reset))
        .with_state(last_reset)
}

async fn get_last_reset(State(last_reset): State<LastReset>) -> Response {
    let record = match last_reset.get() {
        Some(x) => x,
        None => {
            return json(
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({ "error": "no reset history loaded yet" }).to_string(),
            )
        }
    };
    match serde_json::to_string(&*record) {
        Ok(body) => json(StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode reset record");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn json(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

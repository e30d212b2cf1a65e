use std::sync::atomic::Ordering;

use axum::{extract::State, Json};
use jf_common::db::PgPool;
use serde_json::json;
use tokio::time::{timeout, Duration};

use crate::error::ApiError;
use crate::SharedState;

const READINESS_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn livez() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ping_database(pool: &PgPool) -> Result<(), ApiError> {
    let client = match timeout(READINESS_TIMEOUT, pool.get()).await {
        Err(_) => return Err(ApiError::ServiceUnavailable("db_pool_timeout".into())),
        Ok(Err(err)) => {
            return Err(ApiError::ServiceUnavailable(format!(
                "failed to check out pool connection: {err}"
            )))
        }
        Ok(Ok(client)) => client,
    };

    match timeout(READINESS_TIMEOUT, client.simple_query("SELECT 1")).await {
        Err(_) => Err(ApiError::ServiceUnavailable("db_ping_timeout".into())),
        Ok(Err(err)) => Err(ApiError::ServiceUnavailable(format!(
            "health check failed: {err}"
        ))),
        Ok(Ok(_)) => Ok(()),
    }
}

/// Ready while not draining and the database answers. Also reports the
/// countries whose reference tables are already loaded.
pub async fn readyz(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.readiness.load(Ordering::SeqCst) {
        return Err(ApiError::ServiceUnavailable("shutting_down".into()));
    }

    ping_database(&state.pool).await?;

    Ok(Json(json!({
        "status": "ok",
        "database": "ok",
        "application": env!("CARGO_PKG_NAME"),
        "loaded_countries": state.catalog.loaded_countries(),
        "row_cache_ttl_secs": state.rows.ttl().as_secs(),
    })))
}

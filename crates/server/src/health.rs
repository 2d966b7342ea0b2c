use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use payflow_db::{migrations, DbPool};
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }
}

/// `database` says whether the pool answers; `schema` says whether the approval
/// tables are at the version this build expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, schema) = storage_checks(&state.db_pool).await;
    let ready = database.status == "ready" && schema.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck::ready("payflow-server accepting requests"),
        database,
        schema,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn storage_checks(pool: &DbPool) -> (HealthCheck, HealthCheck) {
    match migrations::pending_versions(pool).await {
        Ok(pending) if pending.is_empty() => (
            HealthCheck::ready("database reachable"),
            HealthCheck::ready("approval schema up to date"),
        ),
        Ok(pending) => {
            let versions =
                pending.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
            warn!(
                event_name = "system.health.schema_behind",
                correlation_id = "health",
                pending = %versions,
                "approval schema has unapplied migrations"
            );
            (
                HealthCheck::ready("database reachable"),
                HealthCheck::degraded(format!("pending migrations: {versions}")),
            )
        }
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                correlation_id = "health",
                error = %error,
                "health probe could not reach the database"
            );
            (
                HealthCheck::degraded("database unavailable"),
                HealthCheck::degraded("schema state unknown"),
            )
        }
    }
}

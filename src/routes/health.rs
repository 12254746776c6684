use std::{collections::BTreeMap, time::Duration};

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{instrument, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: BTreeMap<&'static str, String>,
}

impl HealthReport {
    fn from_checks(
        checks: impl IntoIterator<Item = (&'static str, Result<(), String>)>,
    ) -> (StatusCode, Self) {
        let mut healthy = true;
        let checks = checks
            .into_iter()
            .map(|(name, res)| match res {
                Ok(()) => (name, "ok".to_string()),
                Err(e) => {
                    healthy = false;
                    (name, e)
                }
            })
            .collect();

        let (code, status) = if healthy {
            (StatusCode::OK, "ok")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        };
        (
            code,
            Self {
                status,
                version: version(),
                checks,
            },
        )
    }
}

fn version() -> &'static str {
    option_env!("BUILD_COMMIT").unwrap_or(env!("CARGO_PKG_VERSION"))
}

async fn ping(db: &PgPool, timeout: Duration) -> Result<(), String> {
    match tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(db)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {timeout:?}")),
    }
}

#[instrument(skip(state))]
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let postgres = ping(&state.db, state.config.query_timeout).await;
    if let Err(e) = &postgres {
        warn!(error = %e, "postgres health check failed");
    }
    let (code, report) = HealthReport::from_checks([("postgres", postgres)]);
    (code, Json(report))
}

use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Upper bound for a single store operation, and for acquiring a pooled connection.
    pub query_timeout: Duration,
    /// Header carrying the client address when running behind a proxy.
    pub ip_header: Option<String>,
    pub tracing: TracingConfig,
}

/// OpenTelemetry export settings. Export is off unless an endpoint is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub service_name: String,
    pub host_name: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = get("DATABASE_URL")
            .or_else(|| get("POSTGRES_DSN"))
            .context("DATABASE_URL (or POSTGRES_DSN) must be set")?;

        Ok(Self {
            database_url,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: get("APP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8000),
            db_max_connections: get("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            query_timeout: Duration::from_secs(
                get("DB_QUERY_TIMEOUT_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(10),
            ),
            ip_header: get("IP_HEADER").filter(|h| !h.trim().is_empty()),
            tracing: TracingConfig::from_lookup(&get),
        })
    }
}

impl TracingConfig {
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        Self {
            endpoint: non_empty("TRACING_ENDPOINT"),
            token: non_empty("TRACING_TOKEN"),
            service_name: non_empty("TRACING_SERVICE_NAME")
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").into()),
            host_name: non_empty("HOSTNAME"),
        }
    }

    /// Collector URL for the gRPC exporter. Bare `host:port` means plaintext.
    pub fn otlp_endpoint(&self) -> Option<String> {
        self.endpoint.as_deref().map(|endpoint| {
            if endpoint.contains("://") {
                endpoint.to_string()
            } else {
                format!("http://{endpoint}")
            }
        })
    }
}

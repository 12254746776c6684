use std::time::Duration;

use anyhow::Context;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{MeterProvider as SdkMeterProvider, PeriodicReader},
    propagation::{BaggagePropagator, TextMapCompositePropagator, TraceContextPropagator},
    runtime,
    trace::{self, Sampler},
    Resource,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TracingConfig;

const DEFAULT_FILTER: &str = "userbase=debug,axum=info,tower_http=info";
const METRICS_INTERVAL: Duration = Duration::from_secs(3);

/// Handle for the exporters installed by [`init`]. Call [`Telemetry::shutdown`]
/// before exit so buffered spans reach the collector.
pub struct Telemetry {
    meter_provider: Option<SdkMeterProvider>,
}

/// Installs the global subscriber: fmt logs (plain, or JSON with `LOG_FORMAT=json`),
/// plus an OTLP span exporter when `TRACING_ENDPOINT` is configured.
pub fn init(config: &TracingConfig) -> anyhow::Result<Telemetry> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    let (plain, json) = if json_logs {
        (None, Some(tracing_subscriber::fmt::layer().with_target(false).json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    let (otel, meter_provider) = match config.otlp_endpoint() {
        Some(endpoint) => {
            let resource = resource(config);
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(
                    trace::config()
                        .with_sampler(Sampler::AlwaysOn)
                        .with_resource(resource.clone()),
                )
                .install_batch(runtime::Tokio)
                .context("install OTLP trace pipeline")?;

            global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
                Box::new(TraceContextPropagator::new()),
                Box::new(BaggagePropagator::new()),
            ]));

            let reader = PeriodicReader::builder(
                opentelemetry_stdout::MetricsExporter::default(),
                runtime::Tokio,
            )
            .with_interval(METRICS_INTERVAL)
            .build();
            let meter_provider = SdkMeterProvider::builder()
                .with_reader(reader)
                .with_resource(resource)
                .build();
            global::set_meter_provider(meter_provider.clone());

            (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Some(meter_provider),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(plain)
        .with(json)
        .with(otel)
        .try_init()
        .context("install tracing subscriber")?;

    if let Some(endpoint) = config.otlp_endpoint() {
        info!(%endpoint, service = %config.service_name, "exporting traces");
    }
    Ok(Telemetry { meter_provider })
}

impl Telemetry {
    /// Flushes and stops the exporters. A no-op when export is disabled.
    pub fn shutdown(self) {
        let Some(meter_provider) = self.meter_provider else {
            return;
        };
        global::shutdown_tracer_provider();
        if let Err(e) = meter_provider.shutdown() {
            warn!(error = %e, "meter provider shutdown failed");
        }
    }
}

fn resource(config: &TracingConfig) -> Resource {
    let mut attributes = vec![KeyValue::new("service.name", config.service_name.clone())];
    if let Some(host_name) = &config.host_name {
        attributes.push(KeyValue::new("host.name", host_name.clone()));
    }
    if let Some(token) = &config.token {
        attributes.push(KeyValue::new("token", token.clone()));
    }
    Resource::new(attributes)
}

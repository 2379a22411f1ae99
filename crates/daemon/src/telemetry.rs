//! Telemetry setup for OpenTelemetry integration

use anyhow::Result;
use tracing_subscriber::{Layer, Registry};

use crate::config::TelemetryConfig;

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the OTLP export layer if an endpoint is configured
///
/// # Configuration
///
/// - `telemetry.otlp_endpoint` / `DHFWK__TELEMETRY__OTLP_ENDPOINT`
/// - `telemetry.service_name` / `DHFWK__TELEMETRY__SERVICE_NAME`
///
/// ```text
/// DHFWK__TELEMETRY__OTLP_ENDPOINT=http://localhost:4317 ./dhfwk-daemon
/// ```
///
/// Runs before the subscriber is installed, so problems are reported back
/// to the caller instead of logged.
pub fn layer(config: &TelemetryConfig) -> Result<Option<BoxedLayer>> {
    let Some(endpoint) = config.otlp_endpoint.as_deref() else {
        return Ok(None);
    };

    #[cfg(feature = "telemetry")]
    {
        init_impl(endpoint, &config.service_name).map(Some)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        anyhow::bail!(
            "OTLP endpoint {} configured but feature 'telemetry' is not enabled \
             (rebuild with --features telemetry)",
            endpoint
        )
    }
}

/// Flush pending spans
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(feature = "telemetry")]
fn init_impl(endpoint: &str, service_name: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{SpanExporter, WithExportConfig};
    use opentelemetry_sdk::trace::TracerProvider;
    use opentelemetry_sdk::{runtime, Resource};

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
        .build();

    let tracer = provider.tracer(service_name.to_string());
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

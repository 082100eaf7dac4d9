use crate::config::LoggingSettings;
use crate::error::AppError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: env filter, optional OTLP export, fmt output.
///
/// `RUST_LOG` takes precedence over `settings.level`. An OTLP endpoint that
/// cannot be reached at install time only costs the export layer. Must run
/// inside a tokio runtime when an endpoint is configured.
pub fn init_tracing(service_name: &str, settings: &LoggingSettings) -> Result<(), AppError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.level));

    let telemetry = match settings.otlp_endpoint.as_deref() {
        Some(endpoint) => match build_tracer(service_name, endpoint) {
            Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Err(e) => {
                eprintln!(
                    "Failed to initialize OTLP tracer for '{}' at endpoint '{}': {}",
                    service_name, endpoint, e
                );
                None
            }
        },
        None => None,
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(telemetry);

    let installed = if settings.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .flatten_event(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    };

    installed.map_err(|e| AppError::ObservabilityError(e.to_string()))
}

fn build_tracer(
    service_name: &str,
    endpoint: &str,
) -> Result<sdktrace::Tracer, opentelemetry::trace::TraceError> {
    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ])))
        .install_batch(runtime::Tokio)
}

//! Logging and trace export for the arbiter.
//!
//! Call [`init_tracing`] once at process startup.
//!
//! The console shows mode transitions, override events and tick failures.
//! What goes over OTLP is one `tick` span per control-loop iteration (from
//! [`ControlLoop::tick`](crate::ControlLoop::tick), at debug level) with the
//! events logged inside it: transitions, stale-tracker losses and dispatch
//! failures.  When an exporter is active and `RUST_LOG` is unset, the default
//! filter enables those spans; otherwise they must be allowed explicitly,
//! e.g. `RUST_LOG=info,arbiter_runtime::control_loop=debug`.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set, tick spans are exported over OTLP/HTTP. |
//! | `RUST_LOG` | Log filter (default `"info"`, plus tick spans when exporting). |
//! | `ARBITER_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = arbiter_runtime::telemetry::init_tracing("arbiter");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `tracing` subscriber.
///
/// Without `OTEL_EXPORTER_OTLP_ENDPOINT` only the console formatter is
/// installed.  The returned [`TracerProviderGuard`] must be held until exit;
/// dropping it flushes pending spans.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let use_json = std::env::var("ARBITER_LOG_FORMAT").as_deref() == Ok("json");

    let provider = build_provider(service_name);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(provider.is_some())));
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.to_string())));

    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);
    if use_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(true))
            .init();
    }

    TracerProviderGuard(provider)
}

/// Filter used when `RUST_LOG` is unset.  Tick spans are debug-level, so
/// they are only switched on when something will export them.
fn default_directives(exporting: bool) -> &'static str {
    if exporting {
        "info,arbiter_runtime::control_loop=debug"
    } else {
        "info"
    }
}

/// Shuts the OTel [`SdkTracerProvider`] down on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// `true` if spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[arbiter] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// Build an [`SdkTracerProvider`] when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// Exporter failures are printed to stderr and yield `None`; the subscriber
/// is not installed yet at that point.
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[arbiter] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // Simple exporter: tracing is initialised before the Tokio runtime exists.
            .with_simple_exporter(exporter)
            .build(),
    )
}

use std::io::IsTerminal;

use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::{
    Resource,
    metrics::SdkMeterProvider,
    trace::{Sampler, SdkTracerProvider},
};
use tracing::{Subscriber, debug};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, MakeWriter, format::DefaultFields, format::Format},
    prelude::*,
};

/// OTLP export is only set up when this is present in the environment.
const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Providers that must be flushed before the process exits.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

// Initialize logging to stderr, plus OTLP export of traces & metrics when configured.
// Must run outside the Tokio runtime: the exporters use a blocking HTTP client.
pub fn init(service_name: &str, default_directive: &str) -> Telemetry {
    let (tracer_provider, meter_provider) = match std::env::var(OTLP_ENDPOINT_ENV) {
        Ok(endpoint) if !endpoint.is_empty() => otlp_providers(service_name, &endpoint),
        _ => (None, None),
    };

    install_subscriber(service_name, default_directive, tracer_provider.as_ref());
    debug!(
        otlp_traces = tracer_provider.is_some(),
        otlp_metrics = meter_provider.is_some(),
        "telemetry initialised"
    );

    Telemetry {
        tracer_provider,
        meter_provider,
    }
}

fn otlp_providers(
    service_name: &str,
    endpoint: &str,
) -> (Option<SdkTracerProvider>, Option<SdkMeterProvider>) {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Failures to build an exporter are non-fatal; the check still runs.
    let tracer_provider = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(format!("{}/v1/traces", endpoint.trim_end_matches('/')))
        .build()
    {
        Ok(exporter) => {
            let provider = SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_resource(resource.clone())
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    1.0,
                ))))
                .build();
            global::set_tracer_provider(provider.clone());
            Some(provider)
        }
        Err(_e) => None,
    };

    let meter_provider = match opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_endpoint(format!("{}/v1/metrics", endpoint.trim_end_matches('/')))
        .build()
    {
        Ok(exporter) => {
            let provider = SdkMeterProvider::builder()
                .with_periodic_exporter(exporter)
                .with_resource(resource)
                .build();
            global::set_meter_provider(provider.clone());
            Some(provider)
        }
        Err(_e) => None,
    };

    (tracer_provider, meter_provider)
}

fn install_subscriber(
    service_name: &str,
    default_directive: &str,
    tracer_provider: Option<&SdkTracerProvider>,
) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // stdout carries the plugin status line only.
    let fmt_layer = log_layer(std::io::stderr, std::io::stderr().is_terminal());

    let otel_layer = tracer_provider.map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
    });

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer);

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}

// Escape codes only when writing to a terminal.
fn log_layer<S, W>(writer: W, ansi: bool) -> fmt::Layer<S, DefaultFields, Format, W>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
}

impl Telemetry {
    pub fn shutdown(self) {
        if let Some(provider) = self.tracer_provider
            && let Err(err) = provider.shutdown()
        {
            debug!(error = %err, "tracer provider shutdown failed");
        }
        if let Some(provider) = self.meter_provider
            && let Err(err) = provider.shutdown()
        {
            debug!(error = %err, "meter provider shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(ansi: bool) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = Registry::default().with(log_layer(move || writer.clone(), ansi));
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(status = 503, "Stats request failed");
        });
        String::from_utf8(captured.0.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn plain_output_has_no_escape_sequences() {
        let out = render(false);
        assert!(out.contains("ERROR"));
        assert!(out.contains("Stats request failed"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn terminal_output_is_coloured() {
        assert!(render(true).contains('\u{1b}'));
    }
}

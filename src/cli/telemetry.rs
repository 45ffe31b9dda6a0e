//! Log output and optional OTLP span export.
//!
//! Logs go through a pretty fmt layer filtered by `RUST_LOG`, falling back to
//! the CLI verbosity. Setting `OTEL_EXPORTER_OTLP_ENDPOINT` adds a gRPC span
//! exporter: `https://` endpoints are dialed over TLS with the system roots,
//! while `http://` and bare `host:port` endpoints are plaintext, which is what
//! a collector sidecar listens on.

use anyhow::{Context, Result, bail};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    trace::{SdkTracerProvider, Tracer},
};
use std::{env::var, time::Duration};
use tonic::transport::ClientTlsConfig;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;
use url::Url;

const ENV_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const ENV_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_PROTOCOL";
const ENV_INSTANCE_ID: &str = "OTEL_SERVICE_INSTANCE_ID";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

// Crates that are chatty below warn and drown out request logs.
const QUIET_TARGETS: [&str; 5] = [
    "hyper=error",
    "tokio=error",
    "h2=error",
    "sqlx=warn",
    "opentelemetry_sdk=warn",
];

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Where and how spans are shipped.
#[derive(Debug, PartialEq, Eq)]
struct Exporter {
    endpoint: String,
    tls_domain: Option<String>,
    instance_id: String,
}

impl Exporter {
    /// `None` when no endpoint is configured.
    fn from_env() -> Result<Option<Self>> {
        let Some(raw) = var(ENV_ENDPOINT).ok().filter(|value| !value.trim().is_empty()) else {
            return Ok(None);
        };
        if let Ok(protocol) = var(ENV_PROTOCOL) {
            if protocol != "grpc" {
                debug!("{ENV_PROTOCOL}='{protocol}' ignored: spans are exported over gRPC");
            }
        }
        let instance_id = var(ENV_INSTANCE_ID).unwrap_or_else(|_| Ulid::new().to_string());
        Self::parse(&raw, instance_id).map(Some)
    }

    fn parse(raw: &str, instance_id: String) -> Result<Self> {
        let raw = raw.trim();
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{raw}")
        };
        let url = Url::parse(&with_scheme)
            .with_context(|| format!("invalid {ENV_ENDPOINT}: {raw}"))?;
        let host = url
            .host_str()
            .with_context(|| format!("{ENV_ENDPOINT} has no host: {raw}"))?;

        let tls_domain = match url.scheme() {
            "http" => None,
            "https" => Some(host.to_string()),
            other => bail!("{ENV_ENDPOINT} scheme must be http or https, got {other}"),
        };

        Ok(Self {
            endpoint: url.as_str().trim_end_matches('/').to_string(),
            tls_domain,
            instance_id,
        })
    }

    fn tracer(&self) -> Result<Tracer> {
        let mut builder = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(self.endpoint.as_str())
            .with_timeout(EXPORT_TIMEOUT);
        if let Some(domain) = &self.tls_domain {
            builder = builder.with_tls_config(
                ClientTlsConfig::new()
                    .domain_name(domain.clone())
                    .with_native_roots(),
            );
        }
        let exporter = builder
            .build()
            .context("failed to build OTLP span exporter")?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(
                Resource::builder_empty()
                    .with_attributes(vec![
                        KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                        KeyValue::new("service.instance.id", self.instance_id.clone()),
                    ])
                    .build(),
            )
            .build();

        let _ = TRACER_PROVIDER.set(provider.clone());
        global::set_tracer_provider(provider.clone());
        global::set_text_map_propagator(TraceContextPropagator::new());

        debug!(endpoint = %self.endpoint, tls = self.tls_domain.is_some(), "exporting spans");
        Ok(provider.tracer(env!("CARGO_PKG_NAME")))
    }
}

fn filter(verbosity_level: Option<Level>) -> Result<EnvFilter> {
    let mut filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(Level::ERROR).into())
        .from_env_lossy();
    for directive in QUIET_TARGETS {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Install the global subscriber.
///
/// # Errors
/// Returns an error if the OTLP endpoint is malformed, the exporter cannot be
/// built, or a subscriber is already installed.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .pretty();

    let otel_layer = match Exporter::from_env()? {
        Some(exporter) => Some(tracing_opentelemetry::layer().with_tracer(exporter.tracer()?)),
        None => None,
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter(verbosity_level)?);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Flush and stop the span exporter, if one was started.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Exporter> {
        Exporter::parse(raw, "instance".to_string())
    }

    #[test]
    fn bare_host_port_is_plaintext() -> Result<()> {
        let exporter = parse("otel-collector:4317")?;
        assert_eq!(exporter.endpoint, "http://otel-collector:4317");
        assert_eq!(exporter.tls_domain, None);
        Ok(())
    }

    #[test]
    fn https_endpoint_dials_tls_for_its_host() -> Result<()> {
        let exporter = parse("https://collector.vidtube.dev:4317/")?;
        assert_eq!(exporter.endpoint, "https://collector.vidtube.dev:4317");
        assert_eq!(exporter.tls_domain.as_deref(), Some("collector.vidtube.dev"));
        Ok(())
    }

    #[test]
    fn http_endpoint_keeps_its_path() -> Result<()> {
        let exporter = parse(" http://localhost:4317/v1/traces ")?;
        assert_eq!(exporter.endpoint, "http://localhost:4317/v1/traces");
        assert!(exporter.tls_domain.is_none());
        Ok(())
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(parse("grpc://localhost:4317").is_err());
        assert!(parse("http://").is_err());
    }

    #[test]
    fn exporter_is_off_without_endpoint() -> Result<()> {
        let unset = temp_env::with_var_unset(ENV_ENDPOINT, Exporter::from_env)?;
        assert!(unset.is_none());
        let blank = temp_env::with_var(ENV_ENDPOINT, Some("  "), Exporter::from_env)?;
        assert!(blank.is_none());
        Ok(())
    }

    #[test]
    fn exporter_reads_instance_id_from_env() -> Result<()> {
        let exporter = temp_env::with_vars(
            [
                (ENV_ENDPOINT, Some("localhost:4317")),
                (ENV_INSTANCE_ID, Some("vidtube-1")),
            ],
            Exporter::from_env,
        )?;
        assert_eq!(
            exporter.map(|exporter| exporter.instance_id).as_deref(),
            Some("vidtube-1")
        );
        Ok(())
    }

    #[test]
    fn quiet_targets_are_valid_directives() {
        assert!(filter(Some(Level::DEBUG)).is_ok());
        assert!(filter(None).is_ok());
    }

    #[test]
    fn shutdown_without_exporter_is_a_noop() {
        shutdown_tracer();
    }
}

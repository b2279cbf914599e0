use std::sync::Arc;

use reqwest::Client;
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::debug;

use crate::config::DownloaderConfig;
use crate::error::{RecorderError, Result};

/// Create the reqwest Client shared by the resolver, fetcher and collaborators.
///
/// Timeouts are applied here once so that no request issued by the engine can
/// block indefinitely.
pub fn create_client(config: &DownloaderConfig) -> Result<Client> {
    let provider = Arc::new(aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| RecorderError::Config(format!("TLS protocol versions: {e}")))?
        .with_platform_verifier()
        .map_err(|e| RecorderError::Config(format!("TLS platform verifier: {e}")))?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config);

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.keep_alive.is_zero() {
        client_builder = client_builder.tcp_keepalive(config.keep_alive);
    }

    if !config.pool_idle_timeout.is_zero() {
        client_builder = client_builder.pool_idle_timeout(config.pool_idle_timeout);
    }

    if !config.use_system_proxy {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(RecorderError::from)
}

/// Client for tests talking to a local mock server.
#[cfg(test)]
pub(crate) fn local_client() -> Client {
    create_client(&DownloaderConfig {
        use_system_proxy: false,
        ..DownloaderConfig::default()
    })
    .unwrap()
}

//! TLS connector setup for the hyper transport.
//!
//! # Feature Flags
//!
//! TLS support requires both a crypto provider and root certificates:
//!
//! - **Crypto providers** (choose one):
//!   - `tls-ring` - Use ring crypto (default with `tls` feature)
//!   - `tls-aws-lc` - Use AWS LC crypto
//!
//! - **Root certificates** (choose one):
//!   - `tls-native-roots` - Use system root certificates (default with `tls` feature)
//!   - `tls-webpki-roots` - Use bundled Mozilla root certificates
//!
//! Without a provider feature, a process-wide default installed through
//! `rustls::crypto::CryptoProvider::install_default` is used.

use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::ClientConfig;

use crate::ClientError;

/// Check if TLS features are properly configured.
///
/// Returns true if both a crypto provider AND root certificates are available.
#[inline]
pub const fn has_tls_support() -> bool {
    cfg!(any(feature = "tls-ring", feature = "tls-aws-lc"))
        && cfg!(any(
            feature = "tls-native-roots",
            feature = "tls-webpki-roots"
        ))
}

/// Pick a crypto provider.
///
/// Priority:
/// 1. Feature-gated provider (tls-ring, then tls-aws-lc)
/// 2. User-installed global default provider
fn crypto_provider() -> Option<Arc<rustls::crypto::CryptoProvider>> {
    #[cfg(feature = "tls-ring")]
    return Some(Arc::new(rustls::crypto::ring::default_provider()));

    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    return Some(Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    rustls::crypto::CryptoProvider::get_default().cloned()
}

/// Build the default TLS configuration from the enabled features.
pub fn default_tls_config() -> Result<ClientConfig, ClientError> {
    let provider = crypto_provider().ok_or_else(|| {
        ClientError::Config(
            "HTTPS requires a crypto provider: enable `tls-ring` or `tls-aws-lc`, \
             or install a global default provider"
                .into(),
        )
    })?;

    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ClientError::Config(format!("TLS protocol versions: {}", e)))?;

    Ok(builder
        .with_root_certificates(build_root_store()?)
        .with_no_client_auth())
}

/// Build the root certificate store from enabled features.
#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
fn build_root_store() -> Result<rustls::RootCertStore, ClientError> {
    let mut roots = rustls::RootCertStore::empty();

    // Prefer native over webpki if both are enabled.
    #[cfg(feature = "tls-native-roots")]
    {
        let native_certs = rustls_native_certs::load_native_certs();
        if !native_certs.errors.is_empty() {
            // Some certs may still have loaded.
            #[cfg(feature = "tracing")]
            tracing::debug!("errors loading native certs: {:?}", native_certs.errors);
        }
        roots.add_parsable_certificates(native_certs.certs);
    }

    #[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
    {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    Ok(roots)
}

#[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
fn build_root_store() -> Result<rustls::RootCertStore, ClientError> {
    Err(ClientError::Config(
        "HTTPS requires TLS root certificates: enable `tls-native-roots` or `tls-webpki-roots`, \
         or pass a TLS config"
            .into(),
    ))
}

/// Build a connector that speaks both `http://` and `https://`.
///
/// Without a custom config the default from [`default_tls_config`] is used.
pub fn build_https_connector(
    tls_config: Option<ClientConfig>,
) -> Result<HttpsConnector<HttpConnector>, ClientError> {
    let config = match tls_config {
        Some(config) => config,
        None => default_tls_config()?,
    };

    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_all_versions()
        .build())
}

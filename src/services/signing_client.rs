//! HTTP client for the certificate signing service

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::time::Duration;
use tracing::debug;

use crate::config::SigningServiceConfig;
use crate::models::{AuthorityRef, SignedChain, SigningOptions, Thumbprint};
use crate::services::signing::SigningService;
use crate::utils::error::{CertError, CertResult};

const CERTIFICATE_PEM_LABEL: &str = "CERTIFICATE";

#[derive(Debug, Serialize)]
struct SignBody<'a> {
    csr: String,
    validity_seconds: u64,
    source_tag: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_name: Option<&'a str>,
    key_usages: Vec<String>,
    extended_key_usages: Vec<String>,
    dns_names: &'a [String],
    email_addresses: &'a [String],
    ip_addresses: Vec<String>,
    uris: Vec<String>,
}

impl<'a> SignBody<'a> {
    fn new(csr_der: &[u8], options: &'a SigningOptions) -> Self {
        Self {
            csr: STANDARD.encode(csr_der),
            validity_seconds: options.duration.as_secs(),
            source_tag: &options.source_tag,
            subject_name: options.subject_name.as_deref(),
            key_usages: options.key_usages.iter().map(ToString::to_string).collect(),
            extended_key_usages: options
                .extended_key_usages
                .iter()
                .map(ToString::to_string)
                .collect(),
            dns_names: &options.dns_names,
            email_addresses: &options.email_addresses,
            ip_addresses: options.ip_addresses.iter().map(ToString::to_string).collect(),
            uris: options.uris.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(default)]
    certificates: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RevokeBody {
    thumbprint: String,
}

/// Decode the PEM chain returned by the service into DER, leaf first
fn decode_chain(response: SignResponse) -> CertResult<SignedChain> {
    let mut certificates = Vec::new();
    for entry in &response.certificates {
        let blocks = pem::parse_many(entry).map_err(|e| {
            CertError::Signing(format!("Signing service returned invalid PEM: {}", e))
        })?;
        certificates.extend(
            blocks
                .into_iter()
                .filter(|block| block.tag() == CERTIFICATE_PEM_LABEL)
                .map(|block| block.into_contents()),
        );
    }
    Ok(SignedChain { certificates })
}

/// Signing service reached over HTTPS
#[derive(Clone)]
pub struct HttpSigningClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSigningClient {
    /// Create a new client from configuration
    pub fn new(config: &SigningServiceConfig) -> CertResult<Self> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .use_rustls_tls();

        if let Some(ca_path) = &config.ssl_ca {
            let ca_file = std::fs::File::open(ca_path)
                .map_err(|e| CertError::Config(format!("Failed to read CA bundle: {}", e)))?;
            let mut reader = BufReader::new(ca_file);
            let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
                .filter_map(|r| r.ok())
                .collect();

            if certs.is_empty() {
                return Err(CertError::Config(format!(
                    "No certificates found in {:?}",
                    ca_path
                )));
            }

            for cert in certs {
                let ca_cert = reqwest::Certificate::from_der(cert.as_ref()).map_err(|e| {
                    CertError::Config(format!("Failed to parse CA certificate: {}", e))
                })?;
                client_builder = client_builder.add_root_certificate(ca_cert);
            }
        }

        if !config.ssl_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| CertError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, authority: &AuthorityRef, action: &str) -> String {
        format!(
            "{}/api/v1/authorities/{}/templates/{}/{}",
            self.base_url, authority.authority_id, authority.template_id, action
        )
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn status_message(status: StatusCode, response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    if body.trim().is_empty() {
        format!("signing service returned status: {}", status)
    } else {
        format!("signing service returned status: {}: {}", status, body.trim())
    }
}

#[async_trait]
impl SigningService for HttpSigningClient {
    async fn sign(
        &self,
        authority: &AuthorityRef,
        csr_der: &[u8],
        options: &SigningOptions,
    ) -> CertResult<SignedChain> {
        let url = self.endpoint(authority, "sign");
        debug!(%authority, source = %options.source_tag, "Requesting certificate");

        let response = self
            .post(&url)
            .json(&SignBody::new(csr_der, options))
            .send()
            .await
            .map_err(|e| CertError::Signing(format!("signing service error: {}", e)))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body: SignResponse = response.json().await.map_err(|e| {
                    CertError::Signing(format!("Failed to parse signing response: {}", e))
                })?;
                decode_chain(body)
            }
            status => Err(CertError::Signing(status_message(status, response).await)),
        }
    }

    async fn revoke(&self, authority: &AuthorityRef, thumbprint: &Thumbprint) -> CertResult<()> {
        let url = self.endpoint(authority, "revoke");
        debug!(%authority, %thumbprint, "Requesting revocation");

        let response = self
            .post(&url)
            .json(&RevokeBody {
                thumbprint: thumbprint.to_hex(),
            })
            .send()
            .await
            .map_err(|e| CertError::Revocation(format!("signing service error: {}", e)))?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(CertError::Revocation(status_message(status, response).await)),
        }
    }
}

//! HTTP signing client tests against a mock signing service

use rcgen::{CertificateParams, KeyPair};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use leafcert_reconciler::config::SigningServiceConfig;
use leafcert_reconciler::models::{
    AuthorityRef, ExtendedKeyUsage, KeyUsage, SigningOptions, Thumbprint,
};
use leafcert_reconciler::services::{HttpSigningClient, OperationContext, Reconciler, SigningService};
use leafcert_reconciler::CertError;

use crate::common::*;

const TOKEN: &str = "test-token";

fn authority() -> AuthorityRef {
    AuthorityRef {
        authority_id: Uuid::parse_str(ids::AUTHORITY_ID).unwrap(),
        template_id: Uuid::parse_str(ids::TEMPLATE_ID).unwrap(),
    }
}

fn sign_path() -> String {
    format!(
        "/api/v1/authorities/{}/templates/{}/sign",
        ids::AUTHORITY_ID,
        ids::TEMPLATE_ID
    )
}

fn revoke_path() -> String {
    format!(
        "/api/v1/authorities/{}/templates/{}/revoke",
        ids::AUTHORITY_ID,
        ids::TEMPLATE_ID
    )
}

fn client(server: &MockServer) -> HttpSigningClient {
    HttpSigningClient::new(&SigningServiceConfig {
        url: server.uri(),
        token: Some(TOKEN.to_string()),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

fn options() -> SigningOptions {
    SigningOptions {
        source_tag: TEST_SOURCE_TAG.to_string(),
        duration: Duration::from_secs(86_400),
        key_usages: KeyUsage::defaults(),
        extended_key_usages: ExtendedKeyUsage::defaults(),
        subject_name: Some("CN=leaf.example.com".to_string()),
        dns_names: vec!["test.com".to_string()],
        email_addresses: vec![],
        ip_addresses: vec![],
        uris: vec![],
    }
}

fn certificate_pem(name: &str) -> String {
    let key = KeyPair::generate().unwrap();
    CertificateParams::new(vec![name.to_string()])
        .unwrap()
        .self_signed(&key)
        .unwrap()
        .pem()
}

#[tokio::test]
async fn test_sign_posts_request_and_decodes_chain() {
    let server = MockServer::start().await;
    let leaf = certificate_pem("test.com");
    let issuer = certificate_pem("issuing-ca.example.test");

    Mock::given(method("POST"))
        .and(path(sign_path()))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(body_partial_json(json!({
            "csr": "AQIDBA==",
            "validity_seconds": 86400,
            "source_tag": TEST_SOURCE_TAG,
            "subject_name": "CN=leaf.example.com",
            "key_usages": ["KeyEncipherment", "DigitalSignature"],
            "extended_key_usages": ["ServerAuth", "ClientAuth"],
            "dns_names": ["test.com"]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "certificates": [leaf, issuer] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let chain = client(&server)
        .sign(&authority(), &[1, 2, 3, 4], &options())
        .await
        .unwrap();

    assert_eq!(chain.certificates.len(), 2);
    assert_eq!(
        chain.leaf(),
        Some(pem::parse(&leaf).unwrap().contents())
    );
}

#[tokio::test]
async fn test_sign_failure_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(sign_path()))
        .respond_with(ResponseTemplate::new(500).set_body_string("template disabled"))
        .mount(&server)
        .await;

    let err = client(&server)
        .sign(&authority(), &[1, 2, 3, 4], &options())
        .await
        .unwrap_err();

    match err {
        CertError::Signing(msg) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("template disabled"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_revoke_posts_thumbprint() {
    let server = MockServer::start().await;
    let thumbprint: Thumbprint = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3".parse().unwrap();

    Mock::given(method("POST"))
        .and(path(revoke_path()))
        .and(body_json(json!({ "thumbprint": "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).revoke(&authority(), &thumbprint).await.unwrap();
}

#[tokio::test]
async fn test_revoke_failure_status() {
    let server = MockServer::start().await;
    let thumbprint: Thumbprint = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3".parse().unwrap();

    Mock::given(method("POST"))
        .and(path(revoke_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server)
        .revoke(&authority(), &thumbprint)
        .await
        .unwrap_err();
    assert!(matches!(err, CertError::Revocation(ref msg) if msg.contains("404")));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_reconciler_over_http() {
    let server = MockServer::start().await;
    let leaf = certificate_pem("test.com");

    Mock::given(method("POST"))
        .and(path(sign_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "certificates": [leaf] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(revoke_path()))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = Reconciler::new(Arc::new(client(&server)));
    let ctx = OperationContext::new();
    let outcome = reconciler
        .create(&ctx, desired(ConfigFixtures::with_dns_san("test.com")))
        .await
        .unwrap();

    let der = pem::parse(&leaf).unwrap().into_contents();
    assert_eq!(
        outcome.state.certificate.cert_thumbprint_hex,
        leafcert_reconciler::services::materializer::thumbprint(&der).to_hex()
    );

    let diagnostics = reconciler.delete(&ctx, &outcome.state).await.unwrap();
    assert_eq!(diagnostics.len(), 1);
}

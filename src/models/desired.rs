//! Desired leaf certificate configuration
//!
//! [`LeafCertificateConfig`] is the flat, user-facing form with one field per
//! configuration attribute. [`DesiredConfig`] is the validated form the
//! reconciler works with: UUIDs parsed, usages typed and the two subject-name
//! override attributes folded into a single [`SubjectNameOverride`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::signing::AuthorityRef;
use crate::utils::error::{CertError, CertResult};

/// Early renewal period applied when none is configured
pub const DEFAULT_EARLY_RENEWAL_PERIOD: &str = "0";

/// X.509 key usage bits requestable from the signing service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyUsage {
    DigitalSignature,
    NonRepudiation,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    CertSign,
    CrlSign,
    EncipherOnly,
    DecipherOnly,
}

impl KeyUsage {
    /// Usages requested when the configuration leaves the list unset
    pub fn defaults() -> Vec<KeyUsage> {
        vec![KeyUsage::KeyEncipherment, KeyUsage::DigitalSignature]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyUsage::DigitalSignature => "DigitalSignature",
            KeyUsage::NonRepudiation => "NonRepudiation",
            KeyUsage::KeyEncipherment => "KeyEncipherment",
            KeyUsage::DataEncipherment => "DataEncipherment",
            KeyUsage::KeyAgreement => "KeyAgreement",
            KeyUsage::CertSign => "CertSign",
            KeyUsage::CrlSign => "CrlSign",
            KeyUsage::EncipherOnly => "EncipherOnly",
            KeyUsage::DecipherOnly => "DecipherOnly",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyUsage {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DigitalSignature" => Ok(KeyUsage::DigitalSignature),
            "NonRepudiation" => Ok(KeyUsage::NonRepudiation),
            "KeyEncipherment" => Ok(KeyUsage::KeyEncipherment),
            "DataEncipherment" => Ok(KeyUsage::DataEncipherment),
            "KeyAgreement" => Ok(KeyUsage::KeyAgreement),
            "CertSign" => Ok(KeyUsage::CertSign),
            "CrlSign" => Ok(KeyUsage::CrlSign),
            "EncipherOnly" => Ok(KeyUsage::EncipherOnly),
            "DecipherOnly" => Ok(KeyUsage::DecipherOnly),
            other => Err(CertError::Validation(format!(
                "Unknown key usage: {:?}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for KeyUsage {
    type Error = CertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyUsage> for String {
    fn from(value: KeyUsage) -> Self {
        value.as_str().to_string()
    }
}

/// Extended key usage purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExtendedKeyUsage {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
    /// Any other purpose, given as a dotted OID
    Oid(String),
}

impl ExtendedKeyUsage {
    /// Purposes requested when the configuration leaves the list unset
    pub fn defaults() -> Vec<ExtendedKeyUsage> {
        vec![ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth]
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExtendedKeyUsage::ServerAuth => "ServerAuth",
            ExtendedKeyUsage::ClientAuth => "ClientAuth",
            ExtendedKeyUsage::CodeSigning => "CodeSigning",
            ExtendedKeyUsage::EmailProtection => "EmailProtection",
            ExtendedKeyUsage::TimeStamping => "TimeStamping",
            ExtendedKeyUsage::OcspSigning => "OcspSigning",
            ExtendedKeyUsage::Oid(oid) => oid,
        }
    }
}

impl fmt::Display for ExtendedKeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_dotted_oid(s: &str) -> bool {
    let arcs: Vec<&str> = s.split('.').collect();
    arcs.len() >= 2
        && arcs
            .iter()
            .all(|arc| !arc.is_empty() && arc.chars().all(|c| c.is_ascii_digit()))
}

impl FromStr for ExtendedKeyUsage {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ServerAuth" => Ok(ExtendedKeyUsage::ServerAuth),
            "ClientAuth" => Ok(ExtendedKeyUsage::ClientAuth),
            "CodeSigning" => Ok(ExtendedKeyUsage::CodeSigning),
            "EmailProtection" => Ok(ExtendedKeyUsage::EmailProtection),
            "TimeStamping" => Ok(ExtendedKeyUsage::TimeStamping),
            "OcspSigning" => Ok(ExtendedKeyUsage::OcspSigning),
            oid if is_dotted_oid(oid) => Ok(ExtendedKeyUsage::Oid(oid.to_string())),
            other => Err(CertError::Validation(format!(
                "Unknown extended key usage: {:?}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ExtendedKeyUsage {
    type Error = CertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExtendedKeyUsage> for String {
    fn from(value: ExtendedKeyUsage) -> Self {
        value.as_str().to_string()
    }
}

/// Structural subject name override
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSubjectName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub country: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organization: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organizational_unit: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locality: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub province: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub street_address: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postal_code: Vec<String>,
}

/// Subject name the signing service should stamp on the certificate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubjectNameOverride {
    /// Signing service default subject applies
    #[default]
    Unset,
    /// Assembled from individual attributes
    Structural(StructuredSubjectName),
    /// Used verbatim
    Literal(String),
}

impl SubjectNameOverride {
    /// Fold the two mutually exclusive configuration attributes into one value
    pub fn from_fields(
        structural: Option<StructuredSubjectName>,
        literal: Option<String>,
    ) -> CertResult<Self> {
        match (structural, literal) {
            (Some(_), Some(_)) => Err(CertError::Validation(
                "Only one of \"overwrite_subject_name\" or \"overwrite_subject_name_str\" can be defined"
                    .to_string(),
            )),
            (Some(s), None) => Ok(SubjectNameOverride::Structural(s)),
            (None, Some(l)) => Ok(SubjectNameOverride::Literal(l)),
            (None, None) => Ok(SubjectNameOverride::Unset),
        }
    }

    pub fn structural(&self) -> Option<&StructuredSubjectName> {
        match self {
            SubjectNameOverride::Structural(s) => Some(s),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&str> {
        match self {
            SubjectNameOverride::Literal(l) => Some(l),
            _ => None,
        }
    }
}

/// Subject alternative names added on top of those in the CSR
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalSans {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_addresses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_addresses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
}

/// Leaf certificate configuration as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafCertificateConfig {
    pub authority_id: String,
    pub template_id: String,
    pub cert_request_pem: String,
    pub validity_period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_usages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_key_usages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_subject_name: Option<StructuredSubjectName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_subject_name_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_subject_alternative_names: Option<AdditionalSans>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_renewal_period: Option<String>,
}

/// Validated desired configuration for one managed certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LeafCertificateConfig", into = "LeafCertificateConfig")]
pub struct DesiredConfig {
    pub authority_id: Uuid,
    pub template_id: Uuid,
    pub cert_request_pem: String,
    pub validity_period: String,
    pub key_usages: Option<Vec<KeyUsage>>,
    pub extended_key_usages: Option<Vec<ExtendedKeyUsage>>,
    pub subject_name: SubjectNameOverride,
    pub additional_sans: Option<AdditionalSans>,
    pub early_renewal_period: Option<String>,
}

/// The configuration fields whose change requires a brand new certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateIdentity {
    pub authority_id: Uuid,
    pub template_id: Uuid,
    pub cert_request_pem: String,
    pub validity_period: String,
    pub key_usages: Option<Vec<KeyUsage>>,
    pub extended_key_usages: Option<Vec<ExtendedKeyUsage>>,
    pub subject_name: SubjectNameOverride,
    pub additional_sans: Option<AdditionalSans>,
}

impl DesiredConfig {
    /// Signing authority this configuration targets
    pub fn authority(&self) -> AuthorityRef {
        AuthorityRef {
            authority_id: self.authority_id,
            template_id: self.template_id,
        }
    }

    /// Early renewal period string, falling back to the default
    pub fn early_renewal_period_str(&self) -> &str {
        self.early_renewal_period
            .as_deref()
            .unwrap_or(DEFAULT_EARLY_RENEWAL_PERIOD)
    }

    /// Fill unset computed attributes with their defaults
    ///
    /// Explicit empty usage lists are kept as they are.
    pub fn resolved(mut self) -> Self {
        if self.key_usages.is_none() {
            self.key_usages = Some(KeyUsage::defaults());
        }
        if self.extended_key_usages.is_none() {
            self.extended_key_usages = Some(ExtendedKeyUsage::defaults());
        }
        if self.early_renewal_period.is_none() {
            self.early_renewal_period = Some(DEFAULT_EARLY_RENEWAL_PERIOD.to_string());
        }
        self
    }

    /// Project the identity-affecting fields
    pub fn identity(&self) -> CertificateIdentity {
        CertificateIdentity {
            authority_id: self.authority_id,
            template_id: self.template_id,
            cert_request_pem: self.cert_request_pem.clone(),
            validity_period: self.validity_period.clone(),
            key_usages: self.key_usages.clone(),
            extended_key_usages: self.extended_key_usages.clone(),
            subject_name: self.subject_name.clone(),
            additional_sans: self.additional_sans.clone(),
        }
    }

    /// Whether moving from `previous` to `self` requires replacing the certificate
    pub fn requires_new_certificate(&self, previous: &DesiredConfig) -> bool {
        self.clone().resolved().identity() != previous.clone().resolved().identity()
    }
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value)
        .map_err(|e| format!("expected a valid UUID for {}, got {:?}: {}", field, value, e))
}

fn parse_list<T>(values: Option<Vec<String>>) -> CertResult<Option<Vec<T>>>
where
    T: FromStr<Err = CertError>,
{
    values
        .map(|list| list.iter().map(|v| v.parse()).collect::<CertResult<Vec<T>>>())
        .transpose()
}

impl TryFrom<LeafCertificateConfig> for DesiredConfig {
    type Error = CertError;

    fn try_from(config: LeafCertificateConfig) -> Result<Self, Self::Error> {
        let authority_id = parse_uuid("Authority ID", &config.authority_id);
        let template_id = parse_uuid("Template ID", &config.template_id);
        let (authority_id, template_id) = match (authority_id, template_id) {
            (Ok(a), Ok(t)) => (a, t),
            (a, t) => {
                let errors = [a.err(), t.err()].into_iter().flatten().collect();
                return Err(CertError::ValidationErrors(errors));
            }
        };

        let subject_name = SubjectNameOverride::from_fields(
            config.overwrite_subject_name,
            config.overwrite_subject_name_str,
        )?;

        Ok(DesiredConfig {
            authority_id,
            template_id,
            cert_request_pem: config.cert_request_pem,
            validity_period: config.validity_period,
            key_usages: parse_list(config.key_usages)?,
            extended_key_usages: parse_list(config.extended_key_usages)?,
            subject_name,
            additional_sans: config.additional_subject_alternative_names,
            early_renewal_period: config.early_renewal_period,
        })
    }
}

impl From<DesiredConfig> for LeafCertificateConfig {
    fn from(config: DesiredConfig) -> Self {
        let (overwrite_subject_name, overwrite_subject_name_str) = match config.subject_name {
            SubjectNameOverride::Unset => (None, None),
            SubjectNameOverride::Structural(s) => (Some(s), None),
            SubjectNameOverride::Literal(l) => (None, Some(l)),
        };

        LeafCertificateConfig {
            authority_id: config.authority_id.to_string(),
            template_id: config.template_id.to_string(),
            cert_request_pem: config.cert_request_pem,
            validity_period: config.validity_period,
            key_usages: config
                .key_usages
                .map(|v| v.into_iter().map(String::from).collect()),
            extended_key_usages: config
                .extended_key_usages
                .map(|v| v.into_iter().map(String::from).collect()),
            overwrite_subject_name,
            overwrite_subject_name_str,
            additional_subject_alternative_names: config.additional_sans,
            early_renewal_period: config.early_renewal_period,
        }
    }
}

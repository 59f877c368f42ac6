//! Managed certificate repository - SQLite operations for certificate state

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Sqlite};
use tracing::warn;

use crate::db::StateStore;
use crate::models::{CertificateRecord, DesiredConfig, ManagedCertificate};
use crate::utils::error::{CertError, CertResult};

#[derive(Debug, FromRow)]
struct ManagedCertificateRow {
    id: String,
    desired_config: String,
    cert_pem: String,
    cert_thumbprint_hex: String,
    cert_serial_number: String,
    ready_for_renewal: bool,
    validity_not_before: String,
    validity_not_after: String,
}

impl TryFrom<ManagedCertificateRow> for ManagedCertificate {
    type Error = CertError;

    fn try_from(row: ManagedCertificateRow) -> Result<Self, Self::Error> {
        let config: DesiredConfig = serde_json::from_str(&row.desired_config).map_err(|e| {
            CertError::CorruptedState(format!(
                "Stored configuration for {:?} is unreadable: {}",
                row.id, e
            ))
        })?;

        Ok(ManagedCertificate {
            config,
            certificate: CertificateRecord {
                cert_pem: row.cert_pem,
                cert_thumbprint_hex: row.cert_thumbprint_hex,
                cert_serial_number: row.cert_serial_number,
                ready_for_renewal: row.ready_for_renewal,
                validity_not_before: row.validity_not_before,
                validity_not_after: row.validity_not_after,
            },
        })
    }
}

pub struct SqliteStateStore {
    pool: Pool<Sqlite>,
}

impl SqliteStateStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Identities whose certificate expires before `cutoff`, soonest first
    ///
    /// Stored expiry times are compared as instants, so records written with
    /// any UTC offset order correctly. Unreadable time stamps are skipped.
    pub async fn expiring_before(&self, cutoff: DateTime<Utc>) -> CertResult<Vec<String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT id, validity_not_after
            FROM managed_certificates
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut expiring: Vec<(DateTime<Utc>, String)> = rows
            .into_iter()
            .filter_map(|(id, not_after)| match DateTime::parse_from_rfc3339(&not_after) {
                Ok(instant) => Some((instant.with_timezone(&Utc), id)),
                Err(e) => {
                    warn!("Skipping {:?}: unreadable expiration {:?}: {}", id, not_after, e);
                    None
                }
            })
            .filter(|(instant, _)| *instant < cutoff)
            .collect();
        expiring.sort();

        Ok(expiring.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self, id: &str) -> CertResult<Option<ManagedCertificate>> {
        let row = sqlx::query_as::<_, ManagedCertificateRow>(
            r#"
            SELECT id, desired_config, cert_pem, cert_thumbprint_hex, cert_serial_number,
                   ready_for_renewal, validity_not_before, validity_not_after
            FROM managed_certificates
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ManagedCertificate::try_from).transpose()
    }

    async fn save(&self, id: &str, state: &ManagedCertificate) -> CertResult<()> {
        let now = Utc::now().to_rfc3339();
        let desired_config = serde_json::to_string(&state.config)
            .map_err(|e| CertError::Storage(format!("Failed to encode configuration: {}", e)))?;
        let cert = &state.certificate;

        sqlx::query(
            r#"
            INSERT INTO managed_certificates (
                id, authority_id, template_id, desired_config, cert_pem, cert_thumbprint_hex,
                cert_serial_number, ready_for_renewal, validity_not_before, validity_not_after,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                authority_id = excluded.authority_id,
                template_id = excluded.template_id,
                desired_config = excluded.desired_config,
                cert_pem = excluded.cert_pem,
                cert_thumbprint_hex = excluded.cert_thumbprint_hex,
                cert_serial_number = excluded.cert_serial_number,
                ready_for_renewal = excluded.ready_for_renewal,
                validity_not_before = excluded.validity_not_before,
                validity_not_after = excluded.validity_not_after,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(state.config.authority_id.to_string())
        .bind(state.config.template_id.to_string())
        .bind(desired_config)
        .bind(&cert.cert_pem)
        .bind(&cert.cert_thumbprint_hex)
        .bind(&cert.cert_serial_number)
        .bind(cert.ready_for_renewal)
        .bind(&cert.validity_not_before)
        .bind(&cert.validity_not_after)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, id: &str) -> CertResult<bool> {
        let result = sqlx::query("DELETE FROM managed_certificates WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> CertResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM managed_certificates ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }
}

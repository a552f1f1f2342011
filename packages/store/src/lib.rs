#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! The remote Store boundary.
//!
//! [`SurveyStore`] names every operation this system consumes from the
//! Store. The Store is opaque: each call is assumed atomic and idempotent
//! per its contract, and all persistent state lives on its side.
//! [`RpcStore`] is the HTTP implementation, POSTing JSON bodies to
//! `{base}/rpc/{operation}`.

use async_trait::async_trait;
use survey_map_store_models::{AggregateStat, MigrationProgress};
use survey_map_survey_models::SurveyRecord;

/// Environment variable holding the Store base URL.
pub const STORE_URL_VAR: &str = "SURVEY_MAP_STORE_URL";

/// Environment variable holding the Store API key.
pub const STORE_KEY_VAR: &str = "SURVEY_MAP_STORE_KEY";

/// Errors that can occur talking to the Store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The Store rejected an RPC call.
    #[error("Store rejected the call ({status}): {message}")]
    Rpc {
        /// HTTP status code of the reply.
        status: u16,
        /// Response body, verbatim.
        message: String,
    },

    /// The Store replied with an unexpected shape.
    #[error("Unexpected Store response: {message}")]
    UnexpectedResponse {
        /// Description of what was expected.
        message: String,
    },

    /// Required configuration is missing from the environment.
    #[error("Missing configuration: {variable} is not set")]
    MissingConfig {
        /// Name of the missing environment variable.
        variable: String,
    },
}

/// Every Store operation this system consumes.
///
/// Callers hold an owned handle (typically `Arc<dyn SurveyStore>`) that
/// they construct and pass down; there is no process-wide instance.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Empties the migration destination table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the Store rejects the call.
    async fn clear_destination(&self) -> Result<(), StoreError>;

    /// Reads the authoritative migration progress.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the call fails or the reply cannot be
    /// decoded.
    async fn get_migration_progress(&self) -> Result<MigrationProgress, StoreError>;

    /// Applies one migration batch of `batch_size` rows starting at
    /// `offset`, returning the Store's human-readable success message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the Store rejects the batch.
    async fn migrate_batch(&self, batch_size: u64, offset: u64) -> Result<String, StoreError>;

    /// Persists one chunk of normalized records. The chunk is atomic from
    /// the caller's perspective: it either fully applies or fails.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the Store rejects the chunk.
    async fn upload_records(&self, records: &[SurveyRecord]) -> Result<(), StoreError>;

    /// Fetches per-neighborhood aggregate statistics, optionally filtered
    /// to one category label.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the call fails or the reply cannot be
    /// decoded.
    async fn get_aggregate_stats(
        &self,
        category_filter: Option<&str>,
    ) -> Result<Vec<AggregateStat>, StoreError>;
}

/// HTTP client for a Store exposing `POST {base}/rpc/{operation}`.
#[derive(Debug, Clone)]
pub struct RpcStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RpcStore {
    /// Creates a client against the given base URL.
    #[must_use]
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Creates a client from `SURVEY_MAP_STORE_URL` and
    /// `SURVEY_MAP_STORE_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingConfig`] naming the first variable that
    /// is not set.
    pub fn from_env() -> Result<Self, StoreError> {
        let base_url = std::env::var(STORE_URL_VAR).map_err(|_| StoreError::MissingConfig {
            variable: STORE_URL_VAR.to_string(),
        })?;
        let api_key = std::env::var(STORE_KEY_VAR).map_err(|_| StoreError::MissingConfig {
            variable: STORE_KEY_VAR.to_string(),
        })?;
        Ok(Self::new(&base_url, &api_key))
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/rpc/{operation}", self.base_url)
    }

    /// POSTs one RPC call and decodes the JSON reply (`Null` for empty
    /// bodies).
    async fn rpc(
        &self,
        operation: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        log::debug!("Store rpc {operation}");
        let response = self
            .client
            .post(self.endpoint(operation))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Rpc {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl SurveyStore for RpcStore {
    async fn clear_destination(&self) -> Result<(), StoreError> {
        self.rpc("clear_destination", serde_json::json!({})).await?;
        Ok(())
    }

    async fn get_migration_progress(&self) -> Result<MigrationProgress, StoreError> {
        let value = self
            .rpc("get_migration_progress", serde_json::json!({}))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn migrate_batch(&self, batch_size: u64, offset: u64) -> Result<String, StoreError> {
        let value = self
            .rpc("migrate_batch", migrate_batch_body(batch_size, offset))
            .await?;
        decode_message(value)
    }

    async fn upload_records(&self, records: &[SurveyRecord]) -> Result<(), StoreError> {
        self.rpc("upload_records", upload_body(records)?).await?;
        Ok(())
    }

    async fn get_aggregate_stats(
        &self,
        category_filter: Option<&str>,
    ) -> Result<Vec<AggregateStat>, StoreError> {
        let value = self
            .rpc("get_aggregate_stats", stats_body(category_filter))
            .await?;
        decode_stats(value)
    }
}

fn migrate_batch_body(batch_size: u64, offset: u64) -> serde_json::Value {
    serde_json::json!({ "batch_size": batch_size, "offset": offset })
}

fn upload_body(records: &[SurveyRecord]) -> Result<serde_json::Value, StoreError> {
    Ok(serde_json::json!({ "records": serde_json::to_value(records)? }))
}

fn stats_body(category_filter: Option<&str>) -> serde_json::Value {
    serde_json::json!({ "category_filter": category_filter })
}

/// The batch-migration reply is a bare JSON string carrying the processed
/// count in free text.
fn decode_message(value: serde_json::Value) -> Result<String, StoreError> {
    match value {
        serde_json::Value::String(message) => Ok(message),
        other => Err(StoreError::UnexpectedResponse {
            message: format!("migrate_batch returned a non-string reply: {other}"),
        }),
    }
}

/// A `null` stats reply (no rows) decodes as an empty list.
fn decode_stats(value: serde_json::Value) -> Result<Vec<AggregateStat>, StoreError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        let store = RpcStore::new("https://store.example.com/", "key");
        assert_eq!(
            store.endpoint("migrate_batch"),
            "https://store.example.com/rpc/migrate_batch"
        );
    }

    #[test]
    fn builds_rpc_bodies() {
        assert_eq!(
            migrate_batch_body(50, 100),
            serde_json::json!({"batch_size": 50, "offset": 100})
        );
        assert_eq!(
            stats_body(Some("SALUD")),
            serde_json::json!({"category_filter": "SALUD"})
        );
        assert_eq!(
            stats_body(None),
            serde_json::json!({"category_filter": null})
        );
        assert_eq!(
            upload_body(&[]).unwrap(),
            serde_json::json!({"records": []})
        );
    }

    #[test]
    fn decodes_the_batch_message() {
        let message = decode_message(serde_json::Value::String(
            "Migración parcial: 50 registros de personas procesados".to_string(),
        ))
        .unwrap();
        assert!(message.contains("50 registros"));

        let err = decode_message(serde_json::json!({"processed": 50})).unwrap_err();
        assert!(matches!(err, StoreError::UnexpectedResponse { .. }));
    }

    #[test]
    fn null_stats_decode_as_empty() {
        assert!(decode_stats(serde_json::Value::Null).unwrap().is_empty());
        let stats = decode_stats(serde_json::json!([
            {"barrio": "EL PRADO", "coordx": -74.8, "coordy": 11.0}
        ]))
        .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].barrio, "EL PRADO");
    }
}

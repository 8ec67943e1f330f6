use std::future::Future;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::models::Record;

/// Connection settings for the hosted backend
#[derive(Debug, Clone, Default)]
pub struct SupabaseConfig {
    /// Project URL (from SUPABASE_URL env var)
    pub url: String,
    /// API key (from SUPABASE_KEY env var)
    pub key: String,
}

impl SupabaseConfig {
    /// Create config from environment variables; unset variables are left empty
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("SUPABASE_URL").unwrap_or_default(),
            key: std::env::var("SUPABASE_KEY").unwrap_or_default(),
        }
    }

    pub fn new(url: String, key: String) -> Self {
        Self { url, key }
    }

    /// REST endpoint of a table
    pub fn table_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), table)
    }
}

/// Destination that accepts a bulk insert of records into a named table
pub trait TableSink {
    fn insert(&self, table: &str, records: &[Record]) -> impl Future<Output = Result<()>> + Send;
}

/// Bulk-insert client for a hosted table REST endpoint
pub struct SupabaseClient {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            anyhow::bail!("Supabase URL is empty (set SUPABASE_URL or pass --url)");
        }
        Ok(Self::with_client(config, Client::new()))
    }

    /// Build around an existing HTTP client
    pub fn with_client(config: SupabaseConfig, client: Client) -> Self {
        Self { client, config }
    }
}

impl TableSink for SupabaseClient {
    async fn insert(&self, table: &str, records: &[Record]) -> Result<()> {
        let response = self
            .client
            .post(self.config.table_endpoint(table))
            .header("apikey", &self.config.key)
            .header("Authorization", format!("Bearer {}", self.config.key))
            .header("content-type", "application/json")
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await
            .context("Failed to send insert request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Insert into '{}' failed: {} - {}", table, status, body);
        }

        Ok(())
    }
}

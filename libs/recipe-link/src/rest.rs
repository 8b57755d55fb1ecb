//! REST client for the recipes table

use common::logging::{redact_sensitive_fields, truncate_body};
use errors::{RecipeError, RecipeResult};
use recipe_model::{FetchOutcome, InsertOutcome, NewRecipe, Recipe};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;

/// Longest error body copied into the debug log
const LOGGED_BODY_CHARS: usize = 500;

/// Thin client over the backend's `/rest/v1` endpoint
///
/// The query of `fetch_all` is fixed at construction, so every call sends
/// the same URL and headers.
#[derive(Clone)]
pub struct RecipeRestClient {
    client: Client,
    table_url: String,
    fetch_url: String,
}

impl std::fmt::Debug for RecipeRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeRestClient")
            .field("fetch_url", &self.fetch_url)
            .finish_non_exhaustive()
    }
}

fn header_value(value: &str, field: &str) -> RecipeResult<HeaderValue> {
    let mut value = HeaderValue::from_str(value).map_err(|e| RecipeError::InvalidConfig {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}

impl RecipeRestClient {
    pub fn new(config: &LinkConfig) -> RecipeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.api_key, "api_key")?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.api_key), "api_key")?,
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let table_url = format!("{}/rest/v1/{}", config.base_url(), config.table);
        let fetch_url = format!(
            "{}?select=*&order={}.desc&limit={}",
            table_url, config.order_column, config.fetch_limit
        );

        Ok(Self {
            client,
            table_url,
            fetch_url,
        })
    }

    /// URL requested by `fetch_all`
    pub fn fetch_url(&self) -> &str {
        &self.fetch_url
    }

    /// Fetch every recipe, newest first
    ///
    /// A non-2xx answer is returned as `FetchOutcome::Error` carrying the body
    /// text; only transport failures and undecodable 2xx bodies are `Err`.
    pub async fn fetch_all(&self) -> RecipeResult<FetchOutcome> {
        let started = Instant::now();
        debug!("GET {}", self.fetch_url);

        let response = self.client.get(&self.fetch_url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await?;
            warn!("Recipe fetch failed: HTTP {}", status);
            debug!(
                "Error body: {}",
                truncate_body(&redact_sensitive_fields(&body), LOGGED_BODY_CHARS)
            );
            return Ok(FetchOutcome::Error(body));
        }

        let body = response.bytes().await?;
        let recipes: Vec<Recipe> = serde_json::from_slice(&body).map_err(|e| {
            RecipeError::Deserialization(format!("recipes response is not an array of rows: {}", e))
        })?;

        info!(
            "Fetched {} recipes in {}ms",
            recipes.len(),
            started.elapsed().as_millis()
        );
        Ok(FetchOutcome::Data(recipes))
    }

    /// Insert `rows` in one request
    pub async fn insert_batch(&self, rows: &[NewRecipe]) -> RecipeResult<InsertOutcome> {
        if rows.is_empty() {
            return Ok(InsertOutcome::Inserted(0));
        }

        debug!("POST {} ({} rows)", self.table_url, rows.len());
        let response = self
            .client
            .post(&self.table_url)
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await?;
            warn!("Recipe insert rejected: HTTP {}", status);
            debug!(
                "Error body: {}",
                truncate_body(&redact_sensitive_fields(&body), LOGGED_BODY_CHARS)
            );
            return Ok(InsertOutcome::Rejected(body));
        }

        Ok(InsertOutcome::Inserted(rows.len()))
    }
}

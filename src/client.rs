//! HTTP adapter for an InfluxDB 1.x `/query` endpoint.
//! Runs the rewritten query with millisecond epochs and post-processes the
//! response. The analysis and post-processing core does not depend on it.

use reqwest::Url;
use tracing::{debug, info};

use crate::config::{ClientConfig, FixConfig};
use crate::error::{AppError, AppResult};
use crate::fix::fix_with;
use crate::result::QueryResponse;

pub struct InfluxClient {
    base: Url,
    db: Option<String>,
    fix_config: FixConfig,
    client: reqwest::Client,
}

impl InfluxClient {
    pub fn new(base_url: &str, db: Option<String>) -> AppResult<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| AppError::config("bad_url", format!("Invalid datastore URL '{}': {}", base_url, e)))?;
        // Url::join replaces the last path segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder().build()?;
        Ok(InfluxClient { base, db, fix_config: FixConfig::default(), client })
    }

    pub fn from_config(cfg: &ClientConfig) -> AppResult<Self> {
        Self::new(&cfg.url, cfg.db.clone())
    }

    pub fn with_fix_config(mut self, cfg: FixConfig) -> Self {
        self.fix_config = cfg;
        self
    }

    /// `GET {base}/query?db=..&q=..&epoch=ms`
    pub fn query_url(&self, cql: &str) -> AppResult<Url> {
        let mut url = self
            .base
            .join("query")
            .map_err(|e| AppError::config("bad_url", format!("Cannot build query URL from {}: {}", self.base, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(db) = &self.db {
                pairs.append_pair("db", db);
            }
            pairs.append_pair("q", cql);
            pairs.append_pair("epoch", "ms");
        }
        Ok(url)
    }

    /// Run `cql` as-is and decode the response.
    pub async fn query_raw(&self, cql: &str) -> AppResult<QueryResponse> {
        let url = self.query_url(cql)?;
        debug!("[CLIENT] GET {}", url);
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AppError::datastore("http_status", format!("HTTP {}: {}", status, body.trim())));
        }
        Ok(serde_json::from_str::<QueryResponse>(&body)?)
    }

    /// Rewrite `cql`, run it, and post-process the response.
    pub async fn query_fixed(&self, cql: &str) -> AppResult<QueryResponse> {
        let fixed = fix_with(cql, &self.fix_config)?;
        info!("[CLIENT] running {} query: {}", fixed.post.kind(), fixed.cql);
        let raw = self.query_raw(&fixed.cql).await?;
        fixed.apply(raw)
    }
}

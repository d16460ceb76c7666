//! Last-modified lookups for submitted hyperlinks.
//!
//! The only outbound call this tool makes. Every failure collapses into
//! [`Freshness::NotAvailable`], so callers never see a transport error.

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Modified(DateTime<Utc>),
    NotAvailable(Unavailable),
}

/// Why a last-modified instant could not be obtained. Logged, never branched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    OutOfScope,
    InvalidUrl,
    Network,
    TimedOut,
    Status(u16),
    MissingHeader,
    MalformedTimestamp,
    /// The run already spent its one lookup on a different link.
    CheckLimitReached,
}

pub trait FreshnessSource {
    async fn last_modified(&self, url: &str) -> Freshness;
}

pub struct HttpFreshnessChecker {
    http: reqwest::Client,
    checkable_prefixes: Vec<String>,
}

impl HttpFreshnessChecker {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.freshness_timeout_secs))
            .build()
            .context("failed to build HTTP client for freshness checks")?;

        Ok(Self {
            http,
            checkable_prefixes: config.checkable_prefixes.clone(),
        })
    }

    /// Only links under a configured prefix are ever requested.
    pub fn is_checkable(&self, url: &str) -> bool {
        is_checkable(&self.checkable_prefixes, url)
    }

    async fn fetch(&self, url: &str) -> Result<DateTime<Utc>, Unavailable> {
        let parsed = reqwest::Url::parse(url).map_err(|_| Unavailable::InvalidUrl)?;
        let response = self.http.head(parsed).send().await.map_err(|err| {
            if err.is_timeout() {
                Unavailable::TimedOut
            } else {
                Unavailable::Network
            }
        })?;
        last_modified_from_response(&response)
    }
}

impl FreshnessSource for HttpFreshnessChecker {
    async fn last_modified(&self, url: &str) -> Freshness {
        if !self.is_checkable(url) {
            debug!(url, "link outside checkable hosts, skipping freshness check");
            return Freshness::NotAvailable(Unavailable::OutOfScope);
        }

        match self.fetch(url).await {
            Ok(modified) => {
                debug!(url, %modified, "fetched last-modified");
                Freshness::Modified(modified)
            }
            Err(reason) => {
                warn!(url, ?reason, "freshness check failed");
                Freshness::NotAvailable(reason)
            }
        }
    }
}

pub fn is_checkable(prefixes: &[String], url: &str) -> bool {
    let is_http = url.starts_with("https://") || url.starts_with("http://");
    is_http && prefixes.iter().any(|prefix| url.starts_with(prefix.as_str()))
}

fn last_modified_from_response(response: &reqwest::Response) -> Result<DateTime<Utc>, Unavailable> {
    if !response.status().is_success() {
        return Err(Unavailable::Status(response.status().as_u16()));
    }

    let value = response
        .headers()
        .get(LAST_MODIFIED)
        .ok_or(Unavailable::MissingHeader)?
        .to_str()
        .map_err(|_| Unavailable::MalformedTimestamp)?;

    parse_last_modified(value).ok_or(Unavailable::MalformedTimestamp)
}

/// Parses an HTTP date such as `Tue, 03 Feb 2026 14:05:00 GMT`.
pub fn parse_last_modified(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

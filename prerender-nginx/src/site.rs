//! Reachability and integration checks against the live site

use prerender_nginx_core::config::VerifyConfig;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;

/// Header Prerender adds to the pages it serves
pub const PRERENDER_HEADER: &str = "x-prerender";

pub struct SiteChecker {
    client: Client,
    user_agent: String,
}

impl SiteChecker {
    pub fn new(verify: &VerifyConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(verify.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            user_agent: verify.user_agent.clone(),
        })
    }

    /// True when the site answers at all, whatever the status
    pub fn check_access(&self, url: &str) -> bool {
        match self.client.get(url).send() {
            Ok(response) => {
                tracing::debug!(url, status = %response.status(), "Site responded");
                true
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "Site is not reachable");
                false
            }
        }
    }

    /// True when a crawler request gets a prerendered page
    pub fn check_integration(&self, url: &str) -> bool {
        match self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
        {
            Ok(response) => {
                tracing::debug!(url, status = %response.status(), "Site responded to crawler request");
                is_prerendered(response.status(), response.headers())
            }
            Err(e) => {
                tracing::error!(url, error = %e, "Crawler request failed");
                false
            }
        }
    }
}

pub fn is_prerendered(status: StatusCode, headers: &HeaderMap) -> bool {
    if status != StatusCode::OK {
        tracing::debug!(%status, "Crawler request did not return 200");
        return false;
    }
    if !headers.contains_key(PRERENDER_HEADER) {
        tracing::debug!("Response has no {} header", PRERENDER_HEADER);
        return false;
    }
    true
}

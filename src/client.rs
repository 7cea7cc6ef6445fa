use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::error::{Error, Result};

/// Gateway server connection-stats endpoint, relative to the cluster base URL.
pub const STATS_ENDPOINT: &str = "/api/v3/gs/gateways/{id}/connection/stats";

const USER_AGENT: &str = concat!("check_ttn_gateway/", env!("CARGO_PKG_VERSION"));

// The Things Stack identifiers: lowercase alphanumerics and single hyphens.
const MIN_ID_LEN: usize = 3;
const MAX_ID_LEN: usize = 36;

/// Timestamps reported for a gateway by the connection-stats endpoint.
/// Either may be absent, e.g. a gateway that has never sent an uplink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GatewayStatus {
    pub last_status_received_at: Option<DateTime<Utc>>,
    pub last_uplink_received_at: Option<DateTime<Utc>>,
}

impl GatewayStatus {
    /// The more recent of the two timestamps.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_status_received_at.max(self.last_uplink_received_at)
    }
}

pub struct StatusClient {
    http: reqwest::Client,
    server: String,
}

impl StatusClient {
    pub fn new(server: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let server = server.trim_end_matches('/');
        if server.is_empty() {
            return Err(Error::Config("server must be set".into()));
        }
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server must be an http(s) URL, got {server:?}"
            )));
        }
        if api_key.is_empty() {
            return Err(Error::Config("api key must be set".into()));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::Config("api key contains invalid characters".into()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        debug!(%server, timeout_ms = timeout.as_millis() as u64, "Status client ready");
        Ok(Self {
            http,
            server: server.to_string(),
        })
    }

    pub fn stats_url(&self, gateway_id: &str) -> Result<String> {
        if !is_valid_gateway_id(gateway_id) {
            return Err(Error::InvalidGatewayId(gateway_id.to_string()));
        }
        Ok(format!(
            "{}{}",
            self.server,
            STATS_ENDPOINT.replace("{id}", gateway_id)
        ))
    }

    /// Fetch the connection stats for one gateway.
    #[instrument(skip(self))]
    pub async fn fetch_status(&self, gateway_id: &str) -> Result<GatewayStatus> {
        let url = self.stats_url(gateway_id)?;
        debug!(%url, "Requesting gateway stats");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            error!(%status, %url, "Stats request failed");
            return Err(Error::UnexpectedStatus(status));
        }

        let body = resp.text().await?;
        debug!(bytes = body.len(), "Stats response received");
        Ok(serde_json::from_str(&body)?)
    }
}

fn is_valid_gateway_id(id: &str) -> bool {
    (MIN_ID_LEN..=MAX_ID_LEN).contains(&id.len())
        && !id.starts_with('-')
        && !id.ends_with('-')
        && !id.contains("--")
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! The monitoring dashboard glows amber in the dark. Eight workers are hammering
//! `/_bulk` at once. One of them just got a 429. It will try again in five seconds.
//! It doesn't know the other seven exist. That's the point.
//!
//! 🚀 This module sends batches into the elastic void, one POST at a time.
//! It is equal parts HTTP client, bulk API whisperer, and coping mechanism.
//!
//! 🧠 Knowledge graph:
//! - `ElasticsearchSinkConfig`: url, auth, target index/type, timeouts
//! - `ElasticsearchSink`: one `reqwest::Client` per worker, one attempt per `send_bulk`
//! - A 200 with `"errors": true` is a failure. The whole batch goes back to the retry loop.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{BulkRequest, BulkTransport, PermanentRejection, TransportFactory};

// 🚰 ElasticsearchSinkConfig — "What's the DEAL with index names?" — Jerry Seinfeld, if he were a DevOps engineer.
// Lives here, co-located with the sink that uses it. No scavenger hunts at 2am.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ElasticsearchSinkConfig {
    /// 📡 Where to send the bodies. Uh. The documents. Scheme + host + port, please.
    #[serde(default)]
    pub url: String,
    /// 📦 The index every document lands in.
    #[serde(default)]
    pub index: Option<String>,
    /// 🏷️ `_type` label for engines that predate the great type purge.
    #[serde(default, alias = "type")]
    pub doc_type: Option<String>,
    /// 🔒 Username. The bouncer at the club. Except the club is a database.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. "password123" is not a password. It is a confession.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key — the velvet rope variant of authentication. Wins over basic auth.
    #[serde(default)]
    pub api_key: Option<String>,
    /// ⏱️ How long we wait for a handshake before assuming the cluster ghosted us.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// ⏱️ How long a single bulk request may take. Bulk bodies are meaty. We're not monsters.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ElasticsearchSinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            index: None,
            doc_type: None,
            username: None,
            password: None,
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 🔍 The parts of a `_bulk` response we care about. Everything else is scenery.
#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

/// 🧾 The verdict on the rejected items of one response.
struct Rejections {
    count: usize,
    first_reason: Option<String>,
    /// every rejected item got a 4xx other than 429: resending the same body changes nothing
    permanent: bool,
}

impl BulkResponse {
    /// 🕵️ Count the rejected items, dig out the first reason, and decide whether a retry
    /// could possibly help.
    fn rejections(&self) -> Rejections {
        // -- each item is `{"<op>": {"status": .., "error": ..}}`
        let failed: Vec<&serde_json::Value> = self
            .items
            .iter()
            .filter_map(|item| item.as_object()?.values().next())
            .filter(|outcome| outcome.get("error").is_some())
            .collect();
        let first_reason = failed.first().and_then(|o| o.get("error")).map(|e| {
            e.get("reason")
                .and_then(|r| r.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string())
        });
        let permanent = !failed.is_empty()
            && failed.iter().all(|o| {
                o.get("status")
                    .and_then(|s| s.as_u64())
                    .is_some_and(|status| (400..500).contains(&status) && status != 429)
            });
        Rejections {
            count: failed.len(),
            first_reason,
            permanent,
        }
    }
}

/// 📡 The sink side of the Elasticsearch backend — pure I/O, zero buffering.
///
/// Accepts a fully rendered NDJSON body and POSTs it to `/_bulk`. The accumulator
/// upstream decides when. The `BulkSink` upstream decides how many times.
#[derive(Debug)]
pub struct ElasticsearchSink {
    client: reqwest::Client,
    sink_config: ElasticsearchSinkConfig,
}

impl ElasticsearchSink {
    /// 🚀 Build a sink with its own `reqwest::Client` and the configured timeouts.
    ///
    /// No network traffic happens here. The first bulk request is the first hello.
    pub fn new(config: ElasticsearchSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            // -- 💀 the TLS stack wept. the architect shrugged.
            .context("💀 The HTTP client refused to be born. We tried to build a reqwest::Client and the universe said 'no'. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;

        Ok(Self {
            client,
            sink_config: config,
        })
    }

    /// 📡 `{url}/_bulk`, with the "/" hygiene you didn't know you needed.
    fn bulk_url(&self) -> String {
        format!("{}/_bulk", self.sink_config.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl BulkTransport for ElasticsearchSink {
    /// 📡 Fire one `_bulk` POST. 🔄 This function does not retry. Retries are the caller's problem.
    async fn send_bulk(&mut self, request: &BulkRequest) -> Result<()> {
        debug!(
            "📡 Sending {} actions ({} bytes) to /_bulk",
            request.action_count,
            request.body.len()
        );

        let mut http_request = self
            .client
            .post(self.bulk_url())
            // ⚠️ application/x-ndjson — not application/json. ES will sulk otherwise.
            .header("Content-Type", "application/x-ndjson");

        // -- 🔒 api_key beats basic auth in this club. this is not a democracy.
        if let Some(ref api_key) = self.sink_config.api_key {
            http_request = http_request.header("Authorization", format!("ApiKey {}", api_key));
        } else if let Some(ref username) = self.sink_config.username {
            http_request = http_request.basic_auth(username, self.sink_config.password.as_ref());
        }

        let response = http_request
            .body(request.body.clone())
            .send()
            .await
            .context("💀 The bulk request never made it to Elasticsearch. We launched the payload into the network and the network responded with what can only be described as 'not vibing with it.' Check connectivity, check timeouts, and check your feelings.")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!(
                "💀 The bulk request arrived, but Elasticsearch looked at our documents and said '{}'. The body of the response read: '{}'.",
                status,
                body
            );
        }

        // -- 🕵️ a 200 is not a yes. the per-item report is where the bad news hides.
        match serde_json::from_str::<BulkResponse>(&body) {
            Ok(parsed) if parsed.errors => {
                let rejections = parsed.rejections();
                let message = format!(
                    "💀 Elasticsearch accepted the request but rejected {} of {} actions. First complaint: {}",
                    rejections.count,
                    request.action_count,
                    rejections
                        .first_reason
                        .unwrap_or_else(|| "(no reason given, very mysterious)".to_string())
                );
                if rejections.permanent {
                    // -- 🧱 the accepted items are already indexed. resending would index them again.
                    return Err(PermanentRejection { message }.into());
                }
                anyhow::bail!(message);
            }
            Ok(_) => {
                trace!("🚀 Bulk request landed — documents have left the building, Elvis-style");
            }
            Err(e) => {
                // -- 🤷 2xx with a body we can't read. the status said yes, so we take the yes.
                debug!("🤷 2xx from /_bulk with an unparseable body ({e}); treating as delivered");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransportFactory for ElasticsearchSinkConfig {
    type Transport = ElasticsearchSink;

    /// 🏭 Every worker gets its own client, its own connection pool, its own problems.
    async fn connect(&self) -> Result<ElasticsearchSink> {
        ElasticsearchSink::new(self.clone())
    }
}

//! HTTP client wrapper for the secondary sync endpoint.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use cosync_core::entry::Entry;
use cosync_core::error::{SyncError, SyncResult};
use cosync_engine::Notifier;

const USER_AGENT: &str = concat!("cosync/", env!("CARGO_PKG_VERSION"));

/// Notifier that POSTs upserts to a REST endpoint.
///
/// Calls `POST {base}/users` with the person entry as JSON,
/// `POST {base}/groups` with the group name and member uids, and
/// `POST {base}/cleanup` at the end of a run. All requests carry a
/// bearer token.
pub struct RestNotifier {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestNotifier {
    /// Create a notifier for the given endpoint.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::notifier(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post_json<T: serde::Serialize>(&self, path: &str, body: &T) -> SyncResult<()> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::notifier(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::notifier(format!(
                "POST {url} returned {status}: {body}"
            )));
        }
        debug!(url = %url, status = %status, "notifier request accepted");
        Ok(())
    }
}

impl fmt::Debug for RestNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestNotifier")
            .field("base_url", &self.base_url)
            .field("api_key", &"***REDACTED***")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for RestNotifier {
    async fn person(&self, entry: &Entry) -> SyncResult<()> {
        self.post_json("users", entry).await
    }

    async fn group(&self, name: &str, members: &[String]) -> SyncResult<()> {
        let body = json!({
            "name": name,
            "members": members,
        });
        self.post_json("groups", &body).await
    }

    async fn cleanup(&self) -> SyncResult<()> {
        self.post_json("cleanup", &json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let notifier =
            RestNotifier::new("https://idm.example.com/api/", "k", Duration::from_secs(5))
                .unwrap();
        assert_eq!(notifier.url("users"), "https://idm.example.com/api/users");
    }

    #[test]
    fn bare_base_url_builds_paths() {
        let notifier =
            RestNotifier::new("https://idm.example.com", "k", Duration::from_secs(5)).unwrap();
        assert_eq!(notifier.url("cleanup"), "https://idm.example.com/cleanup");
    }

    #[test]
    fn debug_redacts_api_key() {
        let notifier =
            RestNotifier::new("https://idm.example.com", "super-secret", Duration::from_secs(5))
                .unwrap();
        let rendered = format!("{notifier:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***REDACTED***"));
    }
}

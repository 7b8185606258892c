//! HTTP client for the voice-server admin daemon.

use crate::error::DirectoryError;
use crate::types::{AccountInfo, EventRecord, NewAccount};
use crate::AccountDirectory;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

#[derive(Serialize)]
struct BroadcastRequest<'a> {
    message: &'a str,
}

/// Account directory backed by the admin REST daemon of the voice server.
#[derive(Clone)]
pub struct HttpDirectory {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpDirectory {
    /// Create a new directory client.
    pub fn new(base_url: impl Into<String>) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_token: None,
        })
    }

    /// Authenticate requests with a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check if the admin daemon is reachable.
    pub async fn health_check(&self) -> bool {
        self.authed(self.client.get(format!("{}/v1/health", self.base_url)))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Fetch event-feed entries after the given sequence number.
    #[instrument(skip(self))]
    pub async fn events_after(&self, seq: u64) -> Result<Vec<EventRecord>, DirectoryError> {
        let response = self
            .authed(
                self.client
                    .get(format!("{}/v1/events?after={}", self.base_url, seq)),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Api(msg));
        }

        let events: Vec<EventRecord> = response.json().await?;
        debug!("Fetched {} directory events", events.len());
        Ok(events)
    }

    async fn accounts(&self) -> Result<Vec<AccountInfo>, DirectoryError> {
        let response = self
            .authed(self.client.get(format!("{}/v1/accounts", self.base_url)))
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Api(msg));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AccountDirectory for HttpDirectory {
    /// Username existence via a case-insensitive scan of the account list.
    #[instrument(skip(self))]
    async fn exists(&self, username: &str) -> Result<bool, DirectoryError> {
        let wanted = username.trim().to_lowercase();
        let accounts = self.accounts().await?;
        Ok(accounts
            .iter()
            .any(|a| a.username.trim().to_lowercase() == wanted))
    }

    #[instrument(skip(self, account), fields(username = %account.username))]
    async fn create(&self, account: &NewAccount) -> Result<(), DirectoryError> {
        let response = self
            .authed(self.client.post(format!("{}/v1/accounts", self.base_url)))
            .json(account)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Account creation failed: {}", msg);
            return Err(DirectoryError::Api(msg));
        }

        debug!("Created directory account '{}'", account.username);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, username: &str) -> Result<bool, DirectoryError> {
        let response = self
            .authed(self.client.delete(format!(
                "{}/v1/accounts/{}",
                self.base_url,
                encode(username)
            )))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Api(msg));
        }
        Ok(true)
    }

    #[instrument(skip(self, message))]
    async fn broadcast(&self, message: &str) -> Result<(), DirectoryError> {
        let response = self
            .authed(self.client.post(format!("{}/v1/broadcast", self.base_url)))
            .json(&BroadcastRequest { message })
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Api(msg));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, DirectoryError> {
        let accounts = self.accounts().await?;
        Ok(accounts.into_iter().map(|a| a.username).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rights::UserRights;
    use crate::types::AccountType;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_exists_is_case_insensitive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "username": "Alice" },
                { "username": "bob" }
            ])))
            .mount(&server)
            .await;

        let directory = HttpDirectory::new(server.uri()).unwrap();
        assert!(directory.exists("alice").await.unwrap());
        assert!(directory.exists(" ALICE ").await.unwrap());
        assert!(!directory.exists("carol").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_surfaces_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/accounts"))
            .respond_with(ResponseTemplate::new(502).set_body_string("daemon not ready"))
            .mount(&server)
            .await;

        let directory = HttpDirectory::new(server.uri()).unwrap();
        let result = directory.exists("alice").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_posts_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let directory = HttpDirectory::new(server.uri()).unwrap();
        let account = NewAccount::new("alice", "secret", AccountType::Standard, UserRights(7));
        directory.create(&account).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_missing_account_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/accounts/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let directory = HttpDirectory::new(server.uri()).unwrap();
        assert!(!directory.remove("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_events_after_parses_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "seq": 4, "kind": "account_removed", "username": "alice" }
            ])))
            .mount(&server)
            .await;

        let directory = HttpDirectory::new(server.uri()).unwrap();
        let events = directory.events_after(3).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].clone().into_event(),
            crate::DirectoryEvent::AccountRemoved("alice".into())
        );
    }
}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

pub const DEFAULT_REMOTE_URL: &str = "http://localhost:8090";

/// One page is fetched per list call; the contract is a single round trip.
const LIST_PAGE_SIZE: u32 = 500;

#[derive(Serialize)]
struct AuthRequest<'a> {
    identity: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
    record: AuthRecord,
}

#[derive(Deserialize)]
struct AuthRecord {
    id: String,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
}

#[derive(Deserialize)]
struct ListPage<T> {
    items: Vec<T>,
}

/// Thin client over the hosted collection service. No caching, no retries;
/// each call is one network round trip and errors surface verbatim.
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, collection)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", token),
            None => req,
        }
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Remote(format!("{status}: {body}")));
        }
        Ok(resp.json().await?)
    }

    /// Exchange credentials for a token and the authenticated user id.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession> {
        let url = format!(
            "{}/api/collections/users/auth-with-password",
            self.base_url
        );
        let resp = self
            .client
            .post(&url)
            .json(&AuthRequest {
                identity: email,
                password,
            })
            .send()
            .await?;
        let auth: AuthResponse = Self::parse(resp).await?;
        Ok(AuthSession {
            token: auth.token,
            user_id: auth.record.id,
        })
    }

    /// List records, optionally scoped by a filter expression such as
    /// `board = "b1" || board = ""`.
    pub async fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut req = self
            .client
            .get(self.records_url(collection))
            .query(&[("perPage", LIST_PAGE_SIZE.to_string())]);
        if let Some(filter) = filter {
            req = req.query(&[("filter", filter)]);
        }
        let resp = self.authorize(req).send().await?;
        let page: ListPage<T> = Self::parse(resp).await?;
        Ok(page.items)
    }

    pub async fn create<T: DeserializeOwned>(
        &self,
        collection: &str,
        record: &impl Serialize,
    ) -> Result<T> {
        let req = self.client.post(self.records_url(collection)).json(record);
        let resp = self.authorize(req).send().await?;
        Self::parse(resp).await
    }

    pub async fn update<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
    ) -> Result<T> {
        let url = format!("{}/{}", self.records_url(collection), id);
        let req = self.client.patch(&url).json(patch);
        let resp = self.authorize(req).send().await?;
        Self::parse(resp).await
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let url = format!("{}/{}", self.records_url(collection), id);
        let resp = self.authorize(self.client.delete(&url)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Remote(format!("{status}: {body}")));
        }
        Ok(())
    }
}

/// Filter for columns visible on a board: board-scoped plus global columns.
pub fn column_filter(board_id: &str) -> String {
    format!("board = \"{board_id}\" || board = \"\"")
}

pub fn board_filter(board_id: &str) -> String {
    format!("board = \"{board_id}\"")
}

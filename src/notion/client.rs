use crate::error::StoreError;
use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct NotionClient {
    http: Client,
    base_url: String,
}

impl NotionClient {
    pub fn new(base_url: &str, token: &str, api_version: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .context("NOTION_TOKEN contains characters not allowed in a header")?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            "Notion-Version",
            HeaderValue::from_str(api_version).context("invalid Notion API version")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, StoreError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, StoreError> {
        self.send(self.http.patch(self.url(path)).json(body)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|err| StoreError::Network(err.to_string()))?;
        read_response(response).await
    }
}

async fn read_response(response: Response) -> Result<Value, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| StoreError::Network(err.to_string()))?;
    debug!(status = status.as_u16(), bytes = body.len(), "record store response");

    if status == StatusCode::CONFLICT {
        return Err(StoreError::Conflict(body));
    }
    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|err| StoreError::Decode(err.to_string()))
}

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use yak_core::config::REQUEST_TIMEOUT;

use crate::error::{Error, Result};
use crate::store::CoordinationStore;

#[derive(Serialize)]
struct CasRequest<'a> {
    expected: Option<&'a str>,
    new: &'a str,
}

#[derive(Deserialize)]
struct CasResponse {
    applied: bool,
}

#[derive(Serialize)]
struct SetWithTtlRequest<'a> {
    value: &'a str,
    ttl_ms: u64,
}

#[derive(Deserialize)]
struct GetResponse {
    value: String,
}

/// `CoordinationStore` over HTTP, speaking the REST contract implemented
/// by `yak-coordd` (and any other service exposing the same four
/// primitives). Every call respects `REQUEST_TIMEOUT` (spec.md §5).
pub struct HttpCoordinationStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCoordinationStore {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: format!("http://{host}:{port}"),
        })
    }

    fn kv_url(&self, key: &str) -> String {
        format!("{}/kv/{}", self.base_url, urlencode(key))
    }
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            other => format!("%{:02X}", other as u32),
        })
        .collect()
}

#[async_trait]
impl CoordinationStore for HttpCoordinationStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let resp = self.client.get(self.kv_url(key)).send().await?;
        match resp.status() {
            reqwest::StatusCode::OK => {
                let body: GetResponse = resp.json().await?;
                Ok(Some(body.value))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(Error::UnexpectedStatus {
                key: key.to_string(),
                status,
            }),
        }
    }

    async fn cas(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        let resp = self
            .client
            .put(format!("{}/cas", self.kv_url(key)))
            .json(&CasRequest { expected, new })
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                key: key.to_string(),
                status: resp.status(),
            });
        }
        let body: CasResponse = resp.json().await?;
        Ok(body.applied)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let resp = self
            .client
            .put(format!("{}/ttl", self.kv_url(key)))
            .json(&SetWithTtlRequest {
                value,
                ttl_ms: ttl.as_millis() as u64,
            })
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                key: key.to_string(),
                status: resp.status(),
            });
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let resp = self.client.delete(self.kv_url(key)).send().await?;
        match resp.status() {
            reqwest::StatusCode::OK | reqwest::StatusCode::NOT_FOUND => Ok(()),
            status => Err(Error::UnexpectedStatus {
                key: key.to_string(),
                status,
            }),
        }
    }
}

use yak_core::config::REQUEST_TIMEOUT;
use yak_core::proto::{ApiErrorBody, BrokerAddr, ConsumeResponse, MetadataLeaderResponse};

use crate::error::Error;

/// Polls `/consume` against a tracked broker. `/consume` is served by any
/// broker (spec.md §6), so this client doesn't need to follow redirects;
/// on a transport failure it falls back to leader discovery and retries
/// there, matching spec.md §7's "consumers on failure return to leader
/// discovery".
pub struct ConsumerClient {
    http: reqwest::Client,
    target: BrokerAddr,
}

impl ConsumerClient {
    pub fn new(initial: BrokerAddr) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, target: initial })
    }

    pub async fn consume(&self, topic: &str, offset: u64) -> Result<ConsumeResponse, Error> {
        let resp = self
            .http
            .get(format!("{}/consume", self.target.base_url()))
            .query(&[("topic", topic), ("offset", &offset.to_string())])
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::OK {
            let status = resp.status();
            let message = resp
                .json::<ApiErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(Error::Rejected { status, message });
        }
        Ok(resp.json().await?)
    }

    /// Asks the currently tracked broker who the leader is and, if it
    /// answers, switches `target` there. Used as the recovery step after a
    /// failed poll.
    pub async fn rediscover_leader(&mut self) -> Result<(), Error> {
        let resp = self
            .http
            .get(format!("{}/metadata/leader", self.target.base_url()))
            .send()
            .await?;
        let body: MetadataLeaderResponse = resp.json().await?;
        if let Some(leader) = body.leader {
            self.target = BrokerAddr {
                broker_id: leader.broker_id,
                host: leader.host,
                port: leader.port,
            };
        }
        Ok(())
    }
}

use yak_core::config::REQUEST_TIMEOUT;
use yak_core::proto::{ApiErrorBody, BrokerAddr, ProduceRequest, ProduceResponse, RedirectBody};

use crate::error::Error;

/// Outcome of a single produce attempt against one broker.
enum Attempt {
    Applied(ProduceResponse),
    Redirect(BrokerAddr),
}

/// Produces messages against whichever broker currently holds the lease,
/// following the `307`-style redirect body (spec.md §6) rather than an
/// HTTP-level `Location` header, and retrying transient failures with
/// capped exponential backoff (spec.md §7's producer retry rule).
pub struct ProducerClient {
    http: reqwest::Client,
    target: BrokerAddr,
}

impl ProducerClient {
    pub fn new(initial: BrokerAddr) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http, target: initial })
    }

    /// Produces one message, following redirects and retrying transient
    /// errors until `backoff` gives up.
    pub async fn produce(
        &mut self,
        topic: &str,
        message: Vec<u8>,
        backoff: &mut impl backoff::backoff::Backoff,
    ) -> Result<ProduceResponse, Error> {
        loop {
            match self.try_once(topic, message.clone()).await {
                Ok(Attempt::Applied(resp)) => return Ok(resp),
                Ok(Attempt::Redirect(leader)) => {
                    tracing::debug!(broker_id = leader.broker_id, "following redirect to leader");
                    self.target = leader;
                    continue;
                }
                Err(err) => {
                    let Some(delay) = backoff.next_backoff() else {
                        return Err(Error::RetriesExhausted);
                    };
                    tracing::warn!(error = %err, delay_ms = delay.as_millis(), "produce attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_once(&self, topic: &str, message: Vec<u8>) -> Result<Attempt, Error> {
        let resp = self
            .http
            .post(format!("{}/produce", self.target.base_url()))
            .json(&ProduceRequest {
                topic: topic.to_string(),
                message,
            })
            .send()
            .await?;

        match resp.status() {
            reqwest::StatusCode::OK => Ok(Attempt::Applied(resp.json().await?)),
            reqwest::StatusCode::TEMPORARY_REDIRECT => {
                let body: RedirectBody = resp.json().await?;
                Ok(Attempt::Redirect(BrokerAddr {
                    broker_id: body.leader.broker_id,
                    host: body.leader.host,
                    port: body.leader.port,
                }))
            }
            status => {
                let message = resp
                    .json::<ApiErrorBody>()
                    .await
                    .map(|b| b.message)
                    .unwrap_or_else(|_| "unreadable error body".to_string());
                Err(Error::Rejected { status, message })
            }
        }
    }
}

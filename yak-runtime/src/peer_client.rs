use yak_core::config::REQUEST_TIMEOUT;
use yak_core::proto::{
    AppendReplicaRequest, AppendReplicaResponse, BrokerAddr, OffsetMismatchBody, PullReplicaResponse,
};

use crate::error::ReplicationError;

/// Outcome of pushing a batch of records to a follower.
pub enum PushOutcome {
    Applied(AppendReplicaResponse),
    OffsetMismatch(OffsetMismatchBody),
}

/// Thin HTTP client a `ReplicationCoordinator` push task (or a
/// `ReplicationWorker` doing a pull-based bootstrap) uses to talk to one
/// peer broker. Kept deliberately simple (`reqwest` rather than the
/// teacher's full `tower::Service`/`hyper` client stack) since each task
/// only ever has one request in flight at a time (spec.md §4.3's
/// backpressure rule).
pub struct PeerClient {
    client: reqwest::Client,
    addr: BrokerAddr,
}

impl PeerClient {
    pub fn new(addr: BrokerAddr) -> Result<Self, ReplicationError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, addr })
    }

    pub async fn push(&self, req: &AppendReplicaRequest) -> Result<PushOutcome, ReplicationError> {
        let resp = self
            .client
            .post(format!("{}/replicate/push", self.addr.base_url()))
            .json(req)
            .send()
            .await?;
        match resp.status() {
            reqwest::StatusCode::OK => Ok(PushOutcome::Applied(resp.json().await?)),
            reqwest::StatusCode::RANGE_NOT_SATISFIABLE => {
                Ok(PushOutcome::OffsetMismatch(resp.json().await?))
            }
            reqwest::StatusCode::CONFLICT => {
                Err(ReplicationError::EpochStale {
                    supplied: req.epoch,
                    current: 0,
                })
            }
            status => Err(ReplicationError::UnexpectedStatus { status }),
        }
    }

    pub async fn pull(
        &self,
        topic: &str,
        from: u64,
        epoch: u64,
    ) -> Result<PullReplicaResponse, ReplicationError> {
        let resp = self
            .client
            .get(format!("{}/replicate/pull", self.addr.base_url()))
            .query(&[("topic", topic), ("from", &from.to_string()), ("epoch", &epoch.to_string())])
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(ReplicationError::UnexpectedStatus { status: resp.status() });
        }
        Ok(resp.json().await?)
    }
}

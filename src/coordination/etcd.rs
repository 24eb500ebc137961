use crate::coordination::{CoordinationError, CoordinationStore, CreateOutcome, KeyValue, LeaseId};
use crate::grpc::compare::{CompareResult, CompareTarget, TargetUnion};
use crate::grpc::kv_client::KvClient;
use crate::grpc::lease_client::LeaseClient;
use crate::grpc::watch_client::WatchClient;
use crate::grpc::{
    event, request_op, response_op, watch_create_request, watch_request, Compare, DeleteRangeRequest,
    LeaseGrantRequest, LeaseRevokeRequest, PutRequest, RangeRequest, RequestOp, TxnRequest, TxnResponse,
    WatchCreateRequest, WatchRequest,
};
use bytes::Bytes;
use tokio::time::Duration;
use tokio_stream::StreamExt;
use tonic::transport::{Channel, Endpoint};

/// EtcdStore talks to an etcd v3 cluster over gRPC.
#[derive(Clone)]
pub struct EtcdStore {
    kv: KvClient<Channel>,
    watch: WatchClient<Channel>,
    lease: LeaseClient<Channel>,
    logger: slog::Logger,
}

impl EtcdStore {
    /// Endpoints are URLs like `http://127.0.0.1:2379`. Requests are balanced across them.
    pub fn connect(logger: slog::Logger, endpoints: &[String]) -> Result<Self, CoordinationError> {
        if endpoints.is_empty() {
            return Err(CoordinationError::NoEndpoints);
        }

        let mut parsed = Vec::with_capacity(endpoints.len());
        for url in endpoints {
            parsed.push(Endpoint::from_shared(url.clone())?);
        }
        slog::info!(logger, "Using etcd endpoints {:?}", endpoints);

        let channel = Channel::balance_list(parsed.into_iter());

        Ok(EtcdStore {
            kv: KvClient::new(channel.clone()),
            watch: WatchClient::new(channel.clone()),
            lease: LeaseClient::new(channel),
            logger,
        })
    }

    async fn txn(&self, request: TxnRequest) -> Result<TxnResponse, CoordinationError> {
        let mut kv = self.kv.clone();
        Ok(kv.txn(request).await?.into_inner())
    }
}

#[async_trait::async_trait]
impl CoordinationStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, CoordinationError> {
        let mut kv = self.kv.clone();
        let response = kv
            .range(RangeRequest {
                key: key.as_bytes().to_vec(),
                ..RangeRequest::default()
            })
            .await?
            .into_inner();

        Ok(response.kvs.into_iter().next().map(KeyValue::from))
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, CoordinationError> {
        let mut kv = self.kv.clone();
        let response = kv
            .range(RangeRequest {
                key: prefix.as_bytes().to_vec(),
                range_end: prefix_range_end(prefix.as_bytes()),
                ..RangeRequest::default()
            })
            .await?
            .into_inner();

        Ok(response.kvs.into_iter().map(KeyValue::from).collect())
    }

    async fn create(
        &self,
        key: &str,
        value: Bytes,
        lease: Option<LeaseId>,
    ) -> Result<CreateOutcome, CoordinationError> {
        loop {
            let response = self
                .txn(TxnRequest {
                    compare: vec![compare(key, CompareTarget::Create, TargetUnion::CreateRevision(0))],
                    success: vec![put_op(key, &value, lease)],
                    failure: vec![range_op(key)],
                })
                .await?;

            if response.succeeded {
                let revision = response.header.map(|h| h.revision).unwrap_or_default();
                return Ok(CreateOutcome::Created { revision });
            }

            let existing = response
                .responses
                .into_iter()
                .filter_map(|op| match op.response {
                    Some(response_op::Response::ResponseRange(range)) => range.kvs.into_iter().next(),
                    _ => None,
                })
                .next();
            match existing {
                Some(kv) => return Ok(CreateOutcome::Exists(KeyValue::from(kv))),
                // Deleted between the compare and the read; try again.
                None => slog::debug!(self.logger, "Key '{}' vanished during create, retrying", key),
            }
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: Bytes,
        expected_mod_revision: i64,
    ) -> Result<bool, CoordinationError> {
        let response = self
            .txn(TxnRequest {
                compare: vec![compare(
                    key,
                    CompareTarget::Mod,
                    TargetUnion::ModRevision(expected_mod_revision),
                )],
                success: vec![put_op(key, &value, None)],
                failure: vec![],
            })
            .await?;

        Ok(response.succeeded)
    }

    async fn delete(&self, key: &str) -> Result<bool, CoordinationError> {
        let mut kv = self.kv.clone();
        let response = kv
            .delete_range(DeleteRangeRequest {
                key: key.as_bytes().to_vec(),
                ..DeleteRangeRequest::default()
            })
            .await?
            .into_inner();

        Ok(response.deleted > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CoordinationError> {
        let mut kv = self.kv.clone();
        let response = kv
            .delete_range(DeleteRangeRequest {
                key: prefix.as_bytes().to_vec(),
                range_end: prefix_range_end(prefix.as_bytes()),
                ..DeleteRangeRequest::default()
            })
            .await?
            .into_inner();

        Ok(response.deleted.max(0) as u64)
    }

    async fn compare_and_delete(&self, key: &str, mod_revision: i64) -> Result<bool, CoordinationError> {
        let response = self
            .txn(TxnRequest {
                compare: vec![compare(key, CompareTarget::Mod, TargetUnion::ModRevision(mod_revision))],
                success: vec![RequestOp {
                    request: Some(request_op::Request::RequestDeleteRange(DeleteRangeRequest {
                        key: key.as_bytes().to_vec(),
                        ..DeleteRangeRequest::default()
                    })),
                }],
                failure: vec![],
            })
            .await?;

        Ok(response.succeeded)
    }

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId, CoordinationError> {
        let mut lease = self.lease.clone();
        let response = lease
            .lease_grant(LeaseGrantRequest {
                ttl: ttl.as_secs().max(1) as i64,
                id: 0,
            })
            .await?
            .into_inner();

        if !response.error.is_empty() {
            return Err(CoordinationError::LeaseRejected(response.error));
        }
        Ok(LeaseId(response.id))
    }

    async fn revoke_lease(&self, lease_id: LeaseId) -> Result<(), CoordinationError> {
        let mut lease = self.lease.clone();
        lease.lease_revoke(LeaseRevokeRequest { id: lease_id.0 }).await?;
        Ok(())
    }

    async fn wait_for_delete(&self, key: &str, after_revision: i64) -> Result<(), CoordinationError> {
        let create = WatchRequest {
            request_union: Some(watch_request::RequestUnion::CreateRequest(WatchCreateRequest {
                key: key.as_bytes().to_vec(),
                start_revision: after_revision + 1,
                filters: vec![watch_create_request::FilterType::Noput as i32],
                ..WatchCreateRequest::default()
            })),
        };
        // The request stream must stay open for as long as we want events.
        let outbound = tokio_stream::once(create).chain(tokio_stream::pending());

        let mut watch = self.watch.clone();
        let mut inbound = watch.watch(outbound).await?.into_inner();

        while let Some(response) = inbound.message().await? {
            if response.canceled {
                if response.compact_revision > 0 {
                    // History is gone; fall back to the current state.
                    slog::warn!(
                        self.logger,
                        "Watch on '{}' compacted at {}",
                        key,
                        response.compact_revision
                    );
                    return match self.get(key).await? {
                        None => Ok(()),
                        Some(kv) if kv.mod_revision > after_revision => Ok(()),
                        Some(_) => Err(CoordinationError::WatchCanceled(response.cancel_reason)),
                    };
                }
                return Err(CoordinationError::WatchCanceled(response.cancel_reason));
            }

            if response
                .events
                .iter()
                .any(|e| e.r#type == event::EventType::Delete as i32)
            {
                return Ok(());
            }
        }

        Err(CoordinationError::WatchClosed)
    }
}

fn compare(key: &str, target: CompareTarget, value: TargetUnion) -> Compare {
    Compare {
        result: CompareResult::Equal as i32,
        target: target as i32,
        key: key.as_bytes().to_vec(),
        target_union: Some(value),
        range_end: vec![],
    }
}

fn put_op(key: &str, value: &Bytes, lease: Option<LeaseId>) -> RequestOp {
    RequestOp {
        request: Some(request_op::Request::RequestPut(PutRequest {
            key: key.as_bytes().to_vec(),
            value: value.to_vec(),
            lease: lease.map(|l| l.0).unwrap_or(0),
            ..PutRequest::default()
        })),
    }
}

fn range_op(key: &str) -> RequestOp {
    RequestOp {
        request: Some(request_op::Request::RequestRange(RangeRequest {
            key: key.as_bytes().to_vec(),
            ..RangeRequest::default()
        })),
    }
}

/// The smallest key greater than every key starting with `prefix`.
fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }

    // All bytes were 0xff: range to the end of the keyspace.
    vec![0]
}

// ------- Conversions --------

impl From<crate::grpc::KeyValue> for KeyValue {
    fn from(kv: crate::grpc::KeyValue) -> Self {
        KeyValue {
            key: String::from_utf8_lossy(&kv.key).into_owned(),
            value: Bytes::from(kv.value),
            create_revision: kv.create_revision,
            mod_revision: kv.mod_revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_end_increments_last_byte() {
        assert_eq!(prefix_range_end(b"/node/p1/"), b"/node/p10".to_vec());
        assert_eq!(prefix_range_end(b"a\xff"), b"b".to_vec());
        assert_eq!(prefix_range_end(b"\xff\xff"), vec![0]);
    }
}

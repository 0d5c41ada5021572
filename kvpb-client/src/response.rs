//! # Response Kinds
//!
//! Purpose: Decode response frames into typed values, keyed by the request
//! that was sent.
//!
//! ## Design Principles
//! 1. **Closed Set**: `ResponseKind` enumerates every decodable response; a
//!    request carries its kind from the moment it is encoded, so no frame can
//!    reach a missing decoder.
//! 2. **Tag Checked**: a non-error frame whose tag differs from the expected
//!    response tag is a `MessageFormat` failure.
//! 3. **Append-Only Merge**: streaming fragments merge in receipt order.

use bytes::Bytes;
use prost::Message;

use kvpb_common::messages::{
    BucketProps, CounterGetResp, CounterUpdateResp, GetBucketResp, GetClientIdResp, GetResp,
    IndexResp, ListBucketsResp, ListKeysResp, MapRedResp, Pair, PutResp, SearchQueryResp,
    ServerInfoResp,
};
use kvpb_common::tags;
use kvpb_common::{KvError, KvResult};

/// Decoder selected when a request is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Ping,
    ServerInfo,
    GetClientId,
    SetClientId,
    Get,
    Put,
    Delete,
    ListBuckets,
    ListKeys,
    GetBucketProps,
    SetBucketProps,
    ResetBucketProps,
    MapReduce,
    IndexQuery,
    Search,
    CounterUpdate,
    CounterGet,
}

impl ResponseKind {
    /// Tag the server answers with on success.
    pub const fn expected_tag(self) -> u8 {
        match self {
            ResponseKind::Ping => tags::TAG_PING_RESP,
            ResponseKind::ServerInfo => tags::TAG_SERVER_INFO_RESP,
            ResponseKind::GetClientId => tags::TAG_GET_CLIENT_ID_RESP,
            ResponseKind::SetClientId => tags::TAG_SET_CLIENT_ID_RESP,
            ResponseKind::Get => tags::TAG_GET_RESP,
            ResponseKind::Put => tags::TAG_PUT_RESP,
            ResponseKind::Delete => tags::TAG_DEL_RESP,
            ResponseKind::ListBuckets => tags::TAG_LIST_BUCKETS_RESP,
            ResponseKind::ListKeys => tags::TAG_LIST_KEYS_RESP,
            ResponseKind::GetBucketProps => tags::TAG_GET_BUCKET_RESP,
            ResponseKind::SetBucketProps => tags::TAG_SET_BUCKET_RESP,
            ResponseKind::ResetBucketProps => tags::TAG_RESET_BUCKET_RESP,
            ResponseKind::MapReduce => tags::TAG_MAP_RED_RESP,
            ResponseKind::IndexQuery => tags::TAG_INDEX_RESP,
            ResponseKind::Search => tags::TAG_SEARCH_QUERY_RESP,
            ResponseKind::CounterUpdate => tags::TAG_COUNTER_UPDATE_RESP,
            ResponseKind::CounterGet => tags::TAG_COUNTER_GET_RESP,
        }
    }

    /// True when the answer may span several frames.
    pub const fn is_streaming(self) -> bool {
        matches!(
            self,
            ResponseKind::ListBuckets
                | ResponseKind::ListKeys
                | ResponseKind::MapReduce
                | ResponseKind::IndexQuery
        )
    }

    /// Decodes one response frame.
    ///
    /// **Input**: frame tag and payload (error frames are handled upstream).
    /// **Output**: the decoded value and whether it terminates the exchange.
    pub fn decode(self, tag: u8, payload: &Bytes) -> KvResult<(Response, bool)> {
        let expected = self.expected_tag();
        if tag != expected {
            return Err(KvError::MessageFormat(format!(
                "expected {} but received {}",
                tags::describe(expected),
                tags::describe(tag)
            )));
        }

        let decoded = match self {
            ResponseKind::Ping => (Response::Pong, true),
            ResponseKind::SetClientId => (Response::Ack, true),
            ResponseKind::Delete => (Response::Ack, true),
            ResponseKind::SetBucketProps => (Response::Ack, true),
            ResponseKind::ResetBucketProps => (Response::Ack, true),
            ResponseKind::ServerInfo => {
                let msg = ServerInfoResp::decode(payload.clone())?;
                (
                    Response::ServerInfo(ServerInfo {
                        node: msg.node,
                        server_version: msg.server_version,
                    }),
                    true,
                )
            }
            ResponseKind::GetClientId => {
                let msg = GetClientIdResp::decode(payload.clone())?;
                (Response::ClientId(msg.client_id), true)
            }
            ResponseKind::Get => (Response::Object(GetResp::decode(payload.clone())?), true),
            ResponseKind::Put => (Response::Stored(PutResp::decode(payload.clone())?), true),
            ResponseKind::GetBucketProps => {
                let msg = GetBucketResp::decode(payload.clone())?;
                (Response::BucketProps(msg.props), true)
            }
            ResponseKind::Search => {
                (Response::Search(SearchQueryResp::decode(payload.clone())?), true)
            }
            ResponseKind::CounterUpdate => {
                let msg = CounterUpdateResp::decode(payload.clone())?;
                (Response::Counter(msg.value), true)
            }
            ResponseKind::CounterGet => {
                let msg = CounterGetResp::decode(payload.clone())?;
                (Response::Counter(msg.value), true)
            }
            ResponseKind::ListBuckets => {
                let msg = ListBucketsResp::decode(payload.clone())?;
                (Response::Buckets(msg.buckets), msg.done.unwrap_or(false))
            }
            ResponseKind::ListKeys => {
                let msg = ListKeysResp::decode(payload.clone())?;
                (Response::Keys(msg.keys), msg.done.unwrap_or(false))
            }
            ResponseKind::IndexQuery => {
                let msg = IndexResp::decode(payload.clone())?;
                let done = msg.done.unwrap_or(false);
                (
                    Response::Index(IndexResults {
                        keys: msg.keys,
                        results: msg.results,
                        continuation: msg.continuation,
                    }),
                    done,
                )
            }
            ResponseKind::MapReduce => {
                let msg = MapRedResp::decode(payload.clone())?;
                let done = msg.done.unwrap_or(false);
                let phases = match msg.response {
                    Some(data) => vec![MapReducePhase {
                        phase: msg.phase,
                        data,
                    }],
                    None => Vec::new(),
                };
                (Response::MapReduce(phases), done)
            }
        };
        Ok(decoded)
    }
}

/// Node identity reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerInfo {
    pub node: Option<Bytes>,
    pub server_version: Option<Bytes>,
}

/// Secondary-index results, possibly paginated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexResults {
    /// Matching keys (when terms were not requested).
    pub keys: Vec<Bytes>,
    /// `(term, key)` pairs (when terms were requested).
    pub results: Vec<Pair>,
    /// Token for fetching the next page.
    pub continuation: Option<Bytes>,
}

/// Output of one map-reduce phase fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReducePhase {
    pub phase: Option<u32>,
    pub data: Bytes,
}

/// Decoded response value.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Pong,
    /// Tag-only acknowledgement (set client id, delete, bucket props updates).
    Ack,
    ServerInfo(ServerInfo),
    ClientId(Bytes),
    Object(GetResp),
    Stored(PutResp),
    Buckets(Vec<Bytes>),
    Keys(Vec<Bytes>),
    BucketProps(BucketProps),
    MapReduce(Vec<MapReducePhase>),
    Index(IndexResults),
    Search(SearchQueryResp),
    Counter(Option<i64>),
}

impl Response {
    /// Appends a later fragment of the same streaming response.
    ///
    /// Elements keep receipt order; the latest continuation token wins.
    pub fn merge(&mut self, fragment: Response) -> KvResult<()> {
        match (self, fragment) {
            (Response::Buckets(acc), Response::Buckets(more)) => acc.extend(more),
            (Response::Keys(acc), Response::Keys(more)) => acc.extend(more),
            (Response::MapReduce(acc), Response::MapReduce(more)) => acc.extend(more),
            (Response::Index(acc), Response::Index(more)) => {
                acc.keys.extend(more.keys);
                acc.results.extend(more.results);
                if more.continuation.is_some() {
                    acc.continuation = more.continuation;
                }
            }
            (acc, more) => {
                return Err(KvError::MessageFormat(format!(
                    "cannot merge {} fragment into {}",
                    more.name(),
                    acc.name()
                )))
            }
        }
        Ok(())
    }

    /// Number of elements carried (1 for scalar responses).
    pub fn len(&self) -> usize {
        match self {
            Response::Buckets(items) | Response::Keys(items) => items.len(),
            Response::MapReduce(phases) => phases.len(),
            Response::Index(index) => index.keys.len() + index.results.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &'static str {
        match self {
            Response::Pong => "pong",
            Response::Ack => "ack",
            Response::ServerInfo(_) => "server-info",
            Response::ClientId(_) => "client-id",
            Response::Object(_) => "object",
            Response::Stored(_) => "stored",
            Response::Buckets(_) => "buckets",
            Response::Keys(_) => "keys",
            Response::BucketProps(_) => "bucket-props",
            Response::MapReduce(_) => "map-reduce",
            Response::Index(_) => "index",
            Response::Search(_) => "search",
            Response::Counter(_) => "counter",
        }
    }

    pub fn into_keys(self) -> KvResult<Vec<Bytes>> {
        match self {
            Response::Keys(keys) => Ok(keys),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub fn into_buckets(self) -> KvResult<Vec<Bytes>> {
        match self {
            Response::Buckets(buckets) => Ok(buckets),
            _ => Err(KvError::UnexpectedResponse),
        }
    }
}

/// One delivery to a per-fragment consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub response: Response,
    pub done: bool,
}

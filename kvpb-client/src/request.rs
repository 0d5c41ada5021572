//! # Request Kinds
//!
//! Purpose: Typed requests and their one-step encoding into a tagged body
//! plus the decoder that must handle the answer.

use bytes::Bytes;
use prost::Message;

use kvpb_common::messages::{
    BucketProps, Content, CounterGetReq, CounterUpdateReq, DelReq, GetBucketReq, GetReq,
    IndexQueryType, IndexReq, ListBucketsReq, ListKeysReq, MapRedReq, PutReq, ResetBucketReq,
    SearchQueryReq, SetBucketReq, SetClientIdReq,
};
use kvpb_common::tags;
use kvpb_common::WireFrame;

use crate::response::ResponseKind;

/// A request the engine can send.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    ServerInfo,
    GetClientId,
    SetClientId(SetClientIdReq),
    Get(GetReq),
    Put(PutReq),
    Delete(DelReq),
    ListBuckets(ListBucketsReq),
    ListKeys(ListKeysReq),
    GetBucketProps(GetBucketReq),
    SetBucketProps(SetBucketReq),
    ResetBucketProps(ResetBucketReq),
    MapReduce(MapRedReq),
    IndexQuery(IndexReq),
    Search(SearchQueryReq),
    CounterUpdate(CounterUpdateReq),
    CounterGet(CounterGetReq),
}

/// Serialized request paired with the decoder for its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub tag: u8,
    pub body: Bytes,
    pub decoder: ResponseKind,
}

impl EncodedRequest {
    pub fn frame(&self) -> WireFrame {
        WireFrame::new(self.tag, self.body.clone())
    }
}

impl Request {
    /// Encodes the request body and selects its response decoder together.
    pub fn encode(&self) -> EncodedRequest {
        let (tag, body, decoder) = match self {
            Request::Ping => (tags::TAG_PING_REQ, Bytes::new(), ResponseKind::Ping),
            Request::ServerInfo => (
                tags::TAG_SERVER_INFO_REQ,
                Bytes::new(),
                ResponseKind::ServerInfo,
            ),
            Request::GetClientId => (
                tags::TAG_GET_CLIENT_ID_REQ,
                Bytes::new(),
                ResponseKind::GetClientId,
            ),
            Request::SetClientId(req) => (
                tags::TAG_SET_CLIENT_ID_REQ,
                to_body(req),
                ResponseKind::SetClientId,
            ),
            Request::Get(req) => (tags::TAG_GET_REQ, to_body(req), ResponseKind::Get),
            Request::Put(req) => (tags::TAG_PUT_REQ, to_body(req), ResponseKind::Put),
            Request::Delete(req) => (tags::TAG_DEL_REQ, to_body(req), ResponseKind::Delete),
            Request::ListBuckets(req) => (
                tags::TAG_LIST_BUCKETS_REQ,
                to_body(req),
                ResponseKind::ListBuckets,
            ),
            Request::ListKeys(req) => (
                tags::TAG_LIST_KEYS_REQ,
                to_body(req),
                ResponseKind::ListKeys,
            ),
            Request::GetBucketProps(req) => (
                tags::TAG_GET_BUCKET_REQ,
                to_body(req),
                ResponseKind::GetBucketProps,
            ),
            Request::SetBucketProps(req) => (
                tags::TAG_SET_BUCKET_REQ,
                to_body(req),
                ResponseKind::SetBucketProps,
            ),
            Request::ResetBucketProps(req) => (
                tags::TAG_RESET_BUCKET_REQ,
                to_body(req),
                ResponseKind::ResetBucketProps,
            ),
            Request::MapReduce(req) => (
                tags::TAG_MAP_RED_REQ,
                to_body(req),
                ResponseKind::MapReduce,
            ),
            Request::IndexQuery(req) => {
                (tags::TAG_INDEX_REQ, to_body(req), ResponseKind::IndexQuery)
            }
            Request::Search(req) => (
                tags::TAG_SEARCH_QUERY_REQ,
                to_body(req),
                ResponseKind::Search,
            ),
            Request::CounterUpdate(req) => (
                tags::TAG_COUNTER_UPDATE_REQ,
                to_body(req),
                ResponseKind::CounterUpdate,
            ),
            Request::CounterGet(req) => (
                tags::TAG_COUNTER_GET_REQ,
                to_body(req),
                ResponseKind::CounterGet,
            ),
        };
        EncodedRequest { tag, body, decoder }
    }

    /// Decoder the response to this request will use.
    pub fn response_kind(&self) -> ResponseKind {
        self.encode().decoder
    }

    pub fn set_client_id(client_id: impl Into<Bytes>) -> Self {
        Request::SetClientId(SetClientIdReq {
            client_id: client_id.into(),
        })
    }

    pub fn get(bucket: impl Into<Bytes>, key: impl Into<Bytes>) -> Self {
        Request::Get(GetReq {
            bucket: bucket.into(),
            key: key.into(),
            ..Default::default()
        })
    }

    /// Stores `value` under `bucket/key`.
    pub fn put(bucket: impl Into<Bytes>, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Request::Put(PutReq {
            bucket: bucket.into(),
            key: Some(key.into()),
            content: Content::from_value(value),
            ..Default::default()
        })
    }

    pub fn delete(bucket: impl Into<Bytes>, key: impl Into<Bytes>) -> Self {
        Request::Delete(DelReq {
            bucket: bucket.into(),
            key: key.into(),
            ..Default::default()
        })
    }

    /// Lists every bucket, asking the server to stream the answer.
    pub fn list_buckets() -> Self {
        Request::ListBuckets(ListBucketsReq {
            stream: Some(true),
            ..Default::default()
        })
    }

    pub fn list_keys(bucket: impl Into<Bytes>) -> Self {
        Request::ListKeys(ListKeysReq {
            bucket: bucket.into(),
            ..Default::default()
        })
    }

    /// Exact-match secondary index query.
    pub fn index_eq(
        bucket: impl Into<Bytes>,
        index: impl Into<Bytes>,
        key: impl Into<Bytes>,
    ) -> Self {
        Request::IndexQuery(IndexReq {
            bucket: bucket.into(),
            index: index.into(),
            qtype: IndexQueryType::Eq as i32,
            key: Some(key.into()),
            stream: Some(true),
            ..Default::default()
        })
    }

    /// Range secondary index query (inclusive bounds).
    pub fn index_range(
        bucket: impl Into<Bytes>,
        index: impl Into<Bytes>,
        min: impl Into<Bytes>,
        max: impl Into<Bytes>,
    ) -> Self {
        Request::IndexQuery(IndexReq {
            bucket: bucket.into(),
            index: index.into(),
            qtype: IndexQueryType::Range as i32,
            range_min: Some(min.into()),
            range_max: Some(max.into()),
            stream: Some(true),
            ..Default::default()
        })
    }

    pub fn map_reduce(request: impl Into<Bytes>, content_type: impl Into<Bytes>) -> Self {
        Request::MapReduce(MapRedReq {
            request: request.into(),
            content_type: content_type.into(),
        })
    }

    pub fn search(index: impl Into<Bytes>, query: impl Into<Bytes>) -> Self {
        Request::Search(SearchQueryReq {
            q: query.into(),
            index: index.into(),
            ..Default::default()
        })
    }

    pub fn get_bucket_props(bucket: impl Into<Bytes>) -> Self {
        Request::GetBucketProps(GetBucketReq {
            bucket: bucket.into(),
            r#type: None,
        })
    }

    pub fn set_bucket_props(bucket: impl Into<Bytes>, props: BucketProps) -> Self {
        Request::SetBucketProps(SetBucketReq {
            bucket: bucket.into(),
            props,
            r#type: None,
        })
    }

    pub fn reset_bucket_props(bucket: impl Into<Bytes>) -> Self {
        Request::ResetBucketProps(ResetBucketReq {
            bucket: bucket.into(),
            r#type: None,
        })
    }

    /// Adds `amount` to a counter and asks for the new value.
    pub fn counter_update(bucket: impl Into<Bytes>, key: impl Into<Bytes>, amount: i64) -> Self {
        Request::CounterUpdate(CounterUpdateReq {
            bucket: bucket.into(),
            key: key.into(),
            amount,
            returnvalue: Some(true),
            ..Default::default()
        })
    }

    pub fn counter_get(bucket: impl Into<Bytes>, key: impl Into<Bytes>) -> Self {
        Request::CounterGet(CounterGetReq {
            bucket: bucket.into(),
            key: key.into(),
            ..Default::default()
        })
    }
}

fn to_body<M: Message>(msg: &M) -> Bytes {
    Bytes::from(msg.encode_to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_is_tag_only() {
        let encoded = Request::Ping.encode();
        assert_eq!(encoded.tag, tags::TAG_PING_REQ);
        assert!(encoded.body.is_empty());
        assert_eq!(encoded.decoder, ResponseKind::Ping);
        assert_eq!(
            &encoded.frame().encode().unwrap()[..],
            &[0, 0, 0, 1, tags::TAG_PING_REQ]
        );
    }

    #[test]
    fn every_request_tag_is_one_below_its_response() {
        let requests = [
            Request::Ping,
            Request::ServerInfo,
            Request::GetClientId,
            Request::set_client_id("me"),
            Request::get("b", "k"),
            Request::put("b", "k", "v"),
            Request::delete("b", "k"),
            Request::list_buckets(),
            Request::list_keys("b"),
            Request::get_bucket_props("b"),
            Request::set_bucket_props("b", BucketProps::default()),
            Request::reset_bucket_props("b"),
            Request::map_reduce("{}", "application/json"),
            Request::index_eq("b", "idx_bin", "v"),
            Request::search("idx", "*:*"),
            Request::counter_update("b", "k", 1),
            Request::counter_get("b", "k"),
        ];
        for request in &requests {
            let encoded = request.encode();
            assert_eq!(encoded.tag + 1, encoded.decoder.expected_tag(), "{:?}", request);
        }
    }

    #[test]
    fn get_body_decodes_back() {
        let encoded = Request::get("bucket", "key").encode();
        let decoded = GetReq::decode(encoded.body).unwrap();
        assert_eq!(decoded.bucket, "bucket");
        assert_eq!(decoded.key, "key");
        assert_eq!(decoded.r, None);
    }

    #[test]
    fn streaming_requests_select_streaming_decoders() {
        assert!(Request::list_keys("b").response_kind().is_streaming());
        assert!(Request::list_buckets().response_kind().is_streaming());
        assert!(Request::index_range("b", "i_int", "1", "9")
            .response_kind()
            .is_streaming());
        assert!(!Request::get("b", "k").response_kind().is_streaming());
    }
}

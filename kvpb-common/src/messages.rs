//! # Payload Schemas
//!
//! Purpose: Protocol-buffer bodies carried after the tag byte of each frame.
//!
//! Every struct here is a `prost::Message`; field numbers are the wire
//! contract and must not be renumbered. Unknown fields sent by newer servers
//! are skipped by the decoder.

use bytes::Bytes;

// ============================================================================
// Error frame (tag 0)
// ============================================================================

/// Body of the dedicated error frame.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorResp {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub errmsg: Bytes,
    #[prost(uint32, required, tag = "2")]
    pub errcode: u32,
}

// ============================================================================
// Shared building blocks
// ============================================================================

/// Generic key/value pair (user metadata, index entries, search fields).
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Pair {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub key: Bytes,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub value: Option<Bytes>,
}

impl Pair {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Pair {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// Link from one object to another.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct Link {
    #[prost(bytes = "bytes", optional, tag = "1")]
    pub bucket: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub key: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub tag: Option<Bytes>,
}

/// One sibling value of a stored object.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Content {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub value: Bytes,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub content_type: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub charset: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "4")]
    pub content_encoding: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "5")]
    pub vtag: Option<Bytes>,
    #[prost(message, repeated, tag = "6")]
    pub links: Vec<Link>,
    #[prost(uint32, optional, tag = "7")]
    pub last_mod: Option<u32>,
    #[prost(uint32, optional, tag = "8")]
    pub last_mod_usecs: Option<u32>,
    #[prost(message, repeated, tag = "9")]
    pub usermeta: Vec<Pair>,
    #[prost(message, repeated, tag = "10")]
    pub indexes: Vec<Pair>,
    #[prost(bool, optional, tag = "11")]
    pub deleted: Option<bool>,
}

impl Content {
    /// Content holding only a value.
    pub fn from_value(value: impl Into<Bytes>) -> Self {
        Content {
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Bucket properties.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BucketProps {
    #[prost(uint32, optional, tag = "1")]
    pub n_val: Option<u32>,
    #[prost(bool, optional, tag = "2")]
    pub allow_mult: Option<bool>,
    #[prost(bool, optional, tag = "3")]
    pub last_write_wins: Option<bool>,
    #[prost(bool, optional, tag = "5")]
    pub has_precommit: Option<bool>,
    #[prost(bool, optional, tag = "7")]
    pub has_postcommit: Option<bool>,
    #[prost(uint32, optional, tag = "10")]
    pub old_vclock: Option<u32>,
    #[prost(uint32, optional, tag = "11")]
    pub young_vclock: Option<u32>,
    #[prost(uint32, optional, tag = "12")]
    pub big_vclock: Option<u32>,
    #[prost(uint32, optional, tag = "13")]
    pub small_vclock: Option<u32>,
    #[prost(uint32, optional, tag = "14")]
    pub pr: Option<u32>,
    #[prost(uint32, optional, tag = "15")]
    pub r: Option<u32>,
    #[prost(uint32, optional, tag = "16")]
    pub w: Option<u32>,
    #[prost(uint32, optional, tag = "17")]
    pub pw: Option<u32>,
    #[prost(uint32, optional, tag = "18")]
    pub dw: Option<u32>,
    #[prost(uint32, optional, tag = "19")]
    pub rw: Option<u32>,
    #[prost(bool, optional, tag = "20")]
    pub basic_quorum: Option<bool>,
    #[prost(bool, optional, tag = "21")]
    pub notfound_ok: Option<bool>,
    #[prost(bytes = "bytes", optional, tag = "22")]
    pub backend: Option<Bytes>,
    #[prost(bool, optional, tag = "23")]
    pub search: Option<bool>,
    #[prost(bytes = "bytes", optional, tag = "25")]
    pub search_index: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "26")]
    pub datatype: Option<Bytes>,
    #[prost(bool, optional, tag = "27")]
    pub consistent: Option<bool>,
    #[prost(bool, optional, tag = "28")]
    pub write_once: Option<bool>,
}

// ============================================================================
// Server / client identity
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerInfoResp {
    #[prost(bytes = "bytes", optional, tag = "1")]
    pub node: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub server_version: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetClientIdResp {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub client_id: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetClientIdReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub client_id: Bytes,
}

// ============================================================================
// Object operations
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub key: Bytes,
    #[prost(uint32, optional, tag = "3")]
    pub r: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub pr: Option<u32>,
    #[prost(bool, optional, tag = "5")]
    pub basic_quorum: Option<bool>,
    #[prost(bool, optional, tag = "6")]
    pub notfound_ok: Option<bool>,
    #[prost(bytes = "bytes", optional, tag = "7")]
    pub if_modified: Option<Bytes>,
    #[prost(bool, optional, tag = "8")]
    pub head: Option<bool>,
    #[prost(bool, optional, tag = "9")]
    pub deletedvclock: Option<bool>,
    #[prost(uint32, optional, tag = "10")]
    pub timeout: Option<u32>,
    #[prost(bool, optional, tag = "11")]
    pub sloppy_quorum: Option<bool>,
    #[prost(uint32, optional, tag = "12")]
    pub n_val: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "13")]
    pub r#type: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResp {
    #[prost(message, repeated, tag = "1")]
    pub content: Vec<Content>,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub vclock: Option<Bytes>,
    #[prost(bool, optional, tag = "3")]
    pub unchanged: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub key: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub vclock: Option<Bytes>,
    #[prost(message, required, tag = "4")]
    pub content: Content,
    #[prost(uint32, optional, tag = "5")]
    pub w: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub dw: Option<u32>,
    #[prost(bool, optional, tag = "7")]
    pub return_body: Option<bool>,
    #[prost(uint32, optional, tag = "8")]
    pub pw: Option<u32>,
    #[prost(bool, optional, tag = "9")]
    pub if_not_modified: Option<bool>,
    #[prost(bool, optional, tag = "10")]
    pub if_none_match: Option<bool>,
    #[prost(bool, optional, tag = "11")]
    pub return_head: Option<bool>,
    #[prost(uint32, optional, tag = "12")]
    pub timeout: Option<u32>,
    #[prost(bool, optional, tag = "13")]
    pub asis: Option<bool>,
    #[prost(bool, optional, tag = "14")]
    pub sloppy_quorum: Option<bool>,
    #[prost(uint32, optional, tag = "15")]
    pub n_val: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "16")]
    pub r#type: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutResp {
    #[prost(message, repeated, tag = "1")]
    pub content: Vec<Content>,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub vclock: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub key: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DelReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub key: Bytes,
    #[prost(uint32, optional, tag = "3")]
    pub rw: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "4")]
    pub vclock: Option<Bytes>,
    #[prost(uint32, optional, tag = "5")]
    pub r: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub w: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub pr: Option<u32>,
    #[prost(uint32, optional, tag = "8")]
    pub pw: Option<u32>,
    #[prost(uint32, optional, tag = "9")]
    pub dw: Option<u32>,
    #[prost(uint32, optional, tag = "10")]
    pub timeout: Option<u32>,
    #[prost(bool, optional, tag = "11")]
    pub sloppy_quorum: Option<bool>,
    #[prost(uint32, optional, tag = "12")]
    pub n_val: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "13")]
    pub r#type: Option<Bytes>,
}

// ============================================================================
// Listing (streaming)
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListBucketsReq {
    #[prost(uint32, optional, tag = "1")]
    pub timeout: Option<u32>,
    #[prost(bool, optional, tag = "2")]
    pub stream: Option<bool>,
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub r#type: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListBucketsResp {
    #[prost(bytes = "bytes", repeated, tag = "1")]
    pub buckets: Vec<Bytes>,
    #[prost(bool, optional, tag = "2")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListKeysReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(uint32, optional, tag = "2")]
    pub timeout: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub r#type: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListKeysResp {
    #[prost(bytes = "bytes", repeated, tag = "1")]
    pub keys: Vec<Bytes>,
    #[prost(bool, optional, tag = "2")]
    pub done: Option<bool>,
}

// ============================================================================
// Secondary index (streaming)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum IndexQueryType {
    Eq = 0,
    Range = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub index: Bytes,
    #[prost(enumeration = "IndexQueryType", required, tag = "3")]
    pub qtype: i32,
    #[prost(bytes = "bytes", optional, tag = "4")]
    pub key: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "5")]
    pub range_min: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "6")]
    pub range_max: Option<Bytes>,
    #[prost(bool, optional, tag = "7")]
    pub return_terms: Option<bool>,
    #[prost(bool, optional, tag = "8")]
    pub stream: Option<bool>,
    #[prost(uint32, optional, tag = "9")]
    pub max_results: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "10")]
    pub continuation: Option<Bytes>,
    #[prost(uint32, optional, tag = "11")]
    pub timeout: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "12")]
    pub r#type: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "13")]
    pub term_regex: Option<Bytes>,
    #[prost(bool, optional, tag = "14")]
    pub pagination_sort: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexResp {
    #[prost(bytes = "bytes", repeated, tag = "1")]
    pub keys: Vec<Bytes>,
    #[prost(message, repeated, tag = "2")]
    pub results: Vec<Pair>,
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub continuation: Option<Bytes>,
    #[prost(bool, optional, tag = "4")]
    pub done: Option<bool>,
}

// ============================================================================
// Map-reduce (streaming) and search
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MapRedReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub request: Bytes,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub content_type: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MapRedResp {
    #[prost(uint32, optional, tag = "1")]
    pub phase: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub response: Option<Bytes>,
    #[prost(bool, optional, tag = "3")]
    pub done: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchQueryReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub q: Bytes,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub index: Bytes,
    #[prost(uint32, optional, tag = "3")]
    pub rows: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub start: Option<u32>,
    #[prost(bytes = "bytes", optional, tag = "5")]
    pub sort: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "6")]
    pub filter: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "7")]
    pub df: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "8")]
    pub op: Option<Bytes>,
    #[prost(bytes = "bytes", repeated, tag = "9")]
    pub fl: Vec<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "10")]
    pub presort: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchDoc {
    #[prost(message, repeated, tag = "1")]
    pub fields: Vec<Pair>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchQueryResp {
    #[prost(message, repeated, tag = "1")]
    pub docs: Vec<SearchDoc>,
    #[prost(float, optional, tag = "2")]
    pub max_score: Option<f32>,
    #[prost(uint32, optional, tag = "3")]
    pub num_found: Option<u32>,
}

// ============================================================================
// Bucket properties
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBucketReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub r#type: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBucketResp {
    #[prost(message, required, tag = "1")]
    pub props: BucketProps,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetBucketReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(message, required, tag = "2")]
    pub props: BucketProps,
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub r#type: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResetBucketReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub r#type: Option<Bytes>,
}

// ============================================================================
// Counters
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterUpdateReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub key: Bytes,
    #[prost(sint64, required, tag = "3")]
    pub amount: i64,
    #[prost(uint32, optional, tag = "4")]
    pub w: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub dw: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub pw: Option<u32>,
    #[prost(bool, optional, tag = "7")]
    pub returnvalue: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterUpdateResp {
    #[prost(sint64, optional, tag = "1")]
    pub value: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterGetReq {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub bucket: Bytes,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub key: Bytes,
    #[prost(uint32, optional, tag = "3")]
    pub r: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub pr: Option<u32>,
    #[prost(bool, optional, tag = "5")]
    pub basic_quorum: Option<bool>,
    #[prost(bool, optional, tag = "6")]
    pub notfound_ok: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterGetResp {
    #[prost(sint64, optional, tag = "1")]
    pub value: Option<i64>,
}

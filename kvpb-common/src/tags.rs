// tags.rs - message tag definitions for the kvpb wire protocol
//
// Every frame on the wire carries a single tag byte directly after the
// 4-byte length prefix. The tag selects the payload schema used to decode
// the rest of the frame.
//
// ============================================================================
// TAG LAYOUT
// ============================================================================
//
// Requests and their responses occupy adjacent numbers: an odd request tag
// is answered by the following even tag, with two exceptions in the upper
// range (counter ops) that keep the same pairing starting at 50.
//
// Tag 0 is reserved for the error frame. It may answer any request and it
// always terminates the operation it answers.
//
//    +-----+----------------------+-----+------------------------+
//    | req | request              | rsp | response               |
//    +-----+----------------------+-----+------------------------+
//    |   1 | PING                 |   2 | PING_RESP              |
//    |   3 | GET_CLIENT_ID        |   4 | GET_CLIENT_ID_RESP     |
//    |   5 | SET_CLIENT_ID        |   6 | SET_CLIENT_ID_RESP     |
//    |   7 | SERVER_INFO          |   8 | SERVER_INFO_RESP       |
//    |   9 | GET                  |  10 | GET_RESP               |
//    |  11 | PUT                  |  12 | PUT_RESP               |
//    |  13 | DELETE               |  14 | DELETE_RESP            |
//    |  15 | LIST_BUCKETS         |  16 | LIST_BUCKETS_RESP  (*) |
//    |  17 | LIST_KEYS            |  18 | LIST_KEYS_RESP     (*) |
//    |  19 | GET_BUCKET_PROPS     |  20 | GET_BUCKET_PROPS_RESP  |
//    |  21 | SET_BUCKET_PROPS     |  22 | SET_BUCKET_PROPS_RESP  |
//    |  23 | MAP_REDUCE           |  24 | MAP_REDUCE_RESP    (*) |
//    |  25 | INDEX                |  26 | INDEX_RESP         (*) |
//    |  27 | SEARCH               |  28 | SEARCH_RESP            |
//    |  29 | RESET_BUCKET_PROPS   |  30 | RESET_BUCKET_PROPS_RESP|
//    |  50 | COUNTER_UPDATE       |  51 | COUNTER_UPDATE_RESP    |
//    |  52 | COUNTER_GET          |  53 | COUNTER_GET_RESP       |
//    +-----+----------------------+-----+------------------------+
//    (*) may arrive as several frames terminated by a `done` flag

// ============================================================================
// TAG NUMBERS
// ============================================================================

/// Error frame: `(errmsg: bytes = 1, errcode: uint32 = 2)`.
pub const TAG_ERROR_RESP: u8 = 0;
pub const TAG_PING_REQ: u8 = 1;
pub const TAG_PING_RESP: u8 = 2;
pub const TAG_GET_CLIENT_ID_REQ: u8 = 3;
pub const TAG_GET_CLIENT_ID_RESP: u8 = 4;
pub const TAG_SET_CLIENT_ID_REQ: u8 = 5;
pub const TAG_SET_CLIENT_ID_RESP: u8 = 6;
pub const TAG_SERVER_INFO_REQ: u8 = 7;
pub const TAG_SERVER_INFO_RESP: u8 = 8;
pub const TAG_GET_REQ: u8 = 9;
pub const TAG_GET_RESP: u8 = 10;
pub const TAG_PUT_REQ: u8 = 11;
pub const TAG_PUT_RESP: u8 = 12;
pub const TAG_DEL_REQ: u8 = 13;
pub const TAG_DEL_RESP: u8 = 14;
pub const TAG_LIST_BUCKETS_REQ: u8 = 15;
pub const TAG_LIST_BUCKETS_RESP: u8 = 16;
pub const TAG_LIST_KEYS_REQ: u8 = 17;
pub const TAG_LIST_KEYS_RESP: u8 = 18;
pub const TAG_GET_BUCKET_REQ: u8 = 19;
pub const TAG_GET_BUCKET_RESP: u8 = 20;
pub const TAG_SET_BUCKET_REQ: u8 = 21;
pub const TAG_SET_BUCKET_RESP: u8 = 22;
pub const TAG_MAP_RED_REQ: u8 = 23;
pub const TAG_MAP_RED_RESP: u8 = 24;
pub const TAG_INDEX_REQ: u8 = 25;
pub const TAG_INDEX_RESP: u8 = 26;
pub const TAG_SEARCH_QUERY_REQ: u8 = 27;
pub const TAG_SEARCH_QUERY_RESP: u8 = 28;
pub const TAG_RESET_BUCKET_REQ: u8 = 29;
pub const TAG_RESET_BUCKET_RESP: u8 = 30;
pub const TAG_COUNTER_UPDATE_REQ: u8 = 50;
pub const TAG_COUNTER_UPDATE_RESP: u8 = 51;
pub const TAG_COUNTER_GET_REQ: u8 = 52;
pub const TAG_COUNTER_GET_RESP: u8 = 53;

// ============================================================================
// TAG ENUMERATION
// ============================================================================

/// All message tags understood by this client.
///
/// Frames with tags outside this table are still reassembled by the codec;
/// the operation that receives them rejects them as malformed.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    ErrorResp = TAG_ERROR_RESP,
    PingReq = TAG_PING_REQ,
    PingResp = TAG_PING_RESP,
    GetClientIdReq = TAG_GET_CLIENT_ID_REQ,
    GetClientIdResp = TAG_GET_CLIENT_ID_RESP,
    SetClientIdReq = TAG_SET_CLIENT_ID_REQ,
    SetClientIdResp = TAG_SET_CLIENT_ID_RESP,
    ServerInfoReq = TAG_SERVER_INFO_REQ,
    ServerInfoResp = TAG_SERVER_INFO_RESP,
    GetReq = TAG_GET_REQ,
    GetResp = TAG_GET_RESP,
    PutReq = TAG_PUT_REQ,
    PutResp = TAG_PUT_RESP,
    DelReq = TAG_DEL_REQ,
    DelResp = TAG_DEL_RESP,
    ListBucketsReq = TAG_LIST_BUCKETS_REQ,
    ListBucketsResp = TAG_LIST_BUCKETS_RESP,
    ListKeysReq = TAG_LIST_KEYS_REQ,
    ListKeysResp = TAG_LIST_KEYS_RESP,
    GetBucketReq = TAG_GET_BUCKET_REQ,
    GetBucketResp = TAG_GET_BUCKET_RESP,
    SetBucketReq = TAG_SET_BUCKET_REQ,
    SetBucketResp = TAG_SET_BUCKET_RESP,
    MapRedReq = TAG_MAP_RED_REQ,
    MapRedResp = TAG_MAP_RED_RESP,
    IndexReq = TAG_INDEX_REQ,
    IndexResp = TAG_INDEX_RESP,
    SearchQueryReq = TAG_SEARCH_QUERY_REQ,
    SearchQueryResp = TAG_SEARCH_QUERY_RESP,
    ResetBucketReq = TAG_RESET_BUCKET_REQ,
    ResetBucketResp = TAG_RESET_BUCKET_RESP,
    CounterUpdateReq = TAG_COUNTER_UPDATE_REQ,
    CounterUpdateResp = TAG_COUNTER_UPDATE_RESP,
    CounterGetReq = TAG_COUNTER_GET_REQ,
    CounterGetResp = TAG_COUNTER_GET_RESP,
}

impl MessageTag {
    /// Convert tag to its wire byte
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to create a tag from its wire byte
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            TAG_ERROR_RESP => Some(Self::ErrorResp),
            TAG_PING_REQ => Some(Self::PingReq),
            TAG_PING_RESP => Some(Self::PingResp),
            TAG_GET_CLIENT_ID_REQ => Some(Self::GetClientIdReq),
            TAG_GET_CLIENT_ID_RESP => Some(Self::GetClientIdResp),
            TAG_SET_CLIENT_ID_REQ => Some(Self::SetClientIdReq),
            TAG_SET_CLIENT_ID_RESP => Some(Self::SetClientIdResp),
            TAG_SERVER_INFO_REQ => Some(Self::ServerInfoReq),
            TAG_SERVER_INFO_RESP => Some(Self::ServerInfoResp),
            TAG_GET_REQ => Some(Self::GetReq),
            TAG_GET_RESP => Some(Self::GetResp),
            TAG_PUT_REQ => Some(Self::PutReq),
            TAG_PUT_RESP => Some(Self::PutResp),
            TAG_DEL_REQ => Some(Self::DelReq),
            TAG_DEL_RESP => Some(Self::DelResp),
            TAG_LIST_BUCKETS_REQ => Some(Self::ListBucketsReq),
            TAG_LIST_BUCKETS_RESP => Some(Self::ListBucketsResp),
            TAG_LIST_KEYS_REQ => Some(Self::ListKeysReq),
            TAG_LIST_KEYS_RESP => Some(Self::ListKeysResp),
            TAG_GET_BUCKET_REQ => Some(Self::GetBucketReq),
            TAG_GET_BUCKET_RESP => Some(Self::GetBucketResp),
            TAG_SET_BUCKET_REQ => Some(Self::SetBucketReq),
            TAG_SET_BUCKET_RESP => Some(Self::SetBucketResp),
            TAG_MAP_RED_REQ => Some(Self::MapRedReq),
            TAG_MAP_RED_RESP => Some(Self::MapRedResp),
            TAG_INDEX_REQ => Some(Self::IndexReq),
            TAG_INDEX_RESP => Some(Self::IndexResp),
            TAG_SEARCH_QUERY_REQ => Some(Self::SearchQueryReq),
            TAG_SEARCH_QUERY_RESP => Some(Self::SearchQueryResp),
            TAG_RESET_BUCKET_REQ => Some(Self::ResetBucketReq),
            TAG_RESET_BUCKET_RESP => Some(Self::ResetBucketResp),
            TAG_COUNTER_UPDATE_REQ => Some(Self::CounterUpdateReq),
            TAG_COUNTER_UPDATE_RESP => Some(Self::CounterUpdateResp),
            TAG_COUNTER_GET_REQ => Some(Self::CounterGetReq),
            TAG_COUNTER_GET_RESP => Some(Self::CounterGetResp),
            _ => None,
        }
    }

    /// Get human-readable tag name
    pub const fn name(self) -> &'static str {
        match self {
            Self::ErrorResp => "ERROR_RESP",
            Self::PingReq => "PING",
            Self::PingResp => "PING_RESP",
            Self::GetClientIdReq => "GET_CLIENT_ID",
            Self::GetClientIdResp => "GET_CLIENT_ID_RESP",
            Self::SetClientIdReq => "SET_CLIENT_ID",
            Self::SetClientIdResp => "SET_CLIENT_ID_RESP",
            Self::ServerInfoReq => "SERVER_INFO",
            Self::ServerInfoResp => "SERVER_INFO_RESP",
            Self::GetReq => "GET",
            Self::GetResp => "GET_RESP",
            Self::PutReq => "PUT",
            Self::PutResp => "PUT_RESP",
            Self::DelReq => "DELETE",
            Self::DelResp => "DELETE_RESP",
            Self::ListBucketsReq => "LIST_BUCKETS",
            Self::ListBucketsResp => "LIST_BUCKETS_RESP",
            Self::ListKeysReq => "LIST_KEYS",
            Self::ListKeysResp => "LIST_KEYS_RESP",
            Self::GetBucketReq => "GET_BUCKET_PROPS",
            Self::GetBucketResp => "GET_BUCKET_PROPS_RESP",
            Self::SetBucketReq => "SET_BUCKET_PROPS",
            Self::SetBucketResp => "SET_BUCKET_PROPS_RESP",
            Self::MapRedReq => "MAP_REDUCE",
            Self::MapRedResp => "MAP_REDUCE_RESP",
            Self::IndexReq => "INDEX",
            Self::IndexResp => "INDEX_RESP",
            Self::SearchQueryReq => "SEARCH",
            Self::SearchQueryResp => "SEARCH_RESP",
            Self::ResetBucketReq => "RESET_BUCKET_PROPS",
            Self::ResetBucketResp => "RESET_BUCKET_PROPS_RESP",
            Self::CounterUpdateReq => "COUNTER_UPDATE",
            Self::CounterUpdateResp => "COUNTER_UPDATE_RESP",
            Self::CounterGetReq => "COUNTER_GET",
            Self::CounterGetResp => "COUNTER_GET_RESP",
        }
    }

    /// Check if this tag is the dedicated error frame
    pub const fn is_error(self) -> bool {
        matches!(self, Self::ErrorResp)
    }

    /// Check if responses with this tag may span several frames
    pub const fn is_streaming(self) -> bool {
        matches!(
            self,
            Self::ListBucketsResp | Self::ListKeysResp | Self::MapRedResp | Self::IndexResp
        )
    }
}

impl std::fmt::Display for MessageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Formats a raw tag byte for logs, falling back to the number.
pub fn describe(tag: u8) -> String {
    match MessageTag::from_u8(tag) {
        Some(known) => known.name().to_string(),
        None => format!("UNKNOWN({})", tag),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_conversion() {
        for raw in 0..=u8::MAX {
            if let Some(tag) = MessageTag::from_u8(raw) {
                assert_eq!(tag.as_u8(), raw);
            }
        }
        assert_eq!(MessageTag::from_u8(TAG_PING_REQ), Some(MessageTag::PingReq));
    }

    #[test]
    fn test_invalid_tag() {
        assert_eq!(MessageTag::from_u8(31), None);
        assert_eq!(MessageTag::from_u8(255), None);
        assert_eq!(describe(99), "UNKNOWN(99)");
    }

    #[test]
    fn test_tag_classification() {
        assert!(MessageTag::ErrorResp.is_error());
        assert!(!MessageTag::PingResp.is_error());
        assert!(MessageTag::ListKeysResp.is_streaming());
        assert!(MessageTag::IndexResp.is_streaming());
        assert!(!MessageTag::GetResp.is_streaming());
        assert!(!MessageTag::SearchQueryResp.is_streaming());
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(format!("{}", MessageTag::PingReq), "PING");
        assert_eq!(describe(TAG_LIST_KEYS_RESP), "LIST_KEYS_RESP");
    }
}

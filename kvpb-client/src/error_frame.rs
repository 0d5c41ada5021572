//! Error-frame translation.
//!
//! A frame tagged `0` carries `(errcode, errmsg)` and always ends the
//! operation it answers. The decoded `ServerError` is also kept on the
//! connection as its "last server error".

use bytes::Bytes;
use prost::Message;
use tracing::warn;

use kvpb_common::messages::ErrorResp;
use kvpb_common::{KvError, KvResult, ServerError, WireFrame};

/// Decodes an error-frame payload.
pub fn translate(payload: &Bytes) -> KvResult<ServerError> {
    let resp = ErrorResp::decode(payload.clone())
        .map_err(|err| KvError::MessageFormat(format!("undecodable error frame: {}", err)))?;
    let error = ServerError::new(resp.errcode, resp.errmsg);
    warn!(code = error.code(), message = %error.message_lossy(), "server returned error");
    Ok(error)
}

/// Translates `frame` if it is an error frame, otherwise returns `None`.
pub fn translate_frame(frame: &WireFrame) -> Option<KvResult<ServerError>> {
    if frame.is_error() {
        Some(translate(frame.payload()))
    } else {
        None
    }
}

/// Builds the payload of an error frame; used by scripted servers in tests.
pub fn encode_error(code: u32, message: impl Into<Bytes>) -> Bytes {
    ErrorResp {
        errmsg: message.into(),
        errcode: code,
    }
    .encode_to_vec()
    .into()
}

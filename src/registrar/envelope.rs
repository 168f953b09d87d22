//! Wire format for the registrar socket.
//!
//! One JSON document per line in each direction:
//!
//! ```text
//! gateway → backend   {"id":7,"topic":"api.frontend","payload":{"q":"hello"}}
//! backend → gateway   {"id":7,"body":{"results":[]}}
//! ```
//!
//! The reply `body` is kept as raw JSON text so it reaches the HTTP client
//! exactly as the backend wrote it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Outgoing query, borrowed from the caller.
#[derive(Debug, Serialize)]
pub struct QueryEnvelope<'a, P: Serialize + ?Sized> {
    pub id: u64,
    pub topic: &'a str,
    pub payload: &'a P,
}

/// Query as seen by the backend.
#[derive(Debug, Deserialize)]
pub struct IncomingQuery {
    pub id: u64,
    pub topic: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Reply from the backend.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: u64,
    pub body: Box<RawValue>,
}

impl ReplyEnvelope {
    /// The body exactly as received.
    pub fn body_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.body.get().as_bytes())
    }
}

/// Serialize a query as one newline-terminated line.
pub fn encode_query<P: Serialize + ?Sized>(
    id: u64,
    topic: &str,
    payload: &P,
) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(&QueryEnvelope { id, topic, payload })?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Serialize a reply as one newline-terminated line.
pub fn encode_reply<B: Serialize + ?Sized>(id: u64, body: &B) -> Result<Bytes, serde_json::Error> {
    let body = serde_json::value::to_raw_value(body)?;
    let mut line = serde_json::to_vec(&ReplyEnvelope { id, body })?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

pub fn decode_reply(line: &str) -> Result<ReplyEnvelope, serde_json::Error> {
    serde_json::from_str(line.trim_end())
}

pub fn decode_query(line: &str) -> Result<IncomingQuery, serde_json::Error> {
    serde_json::from_str(line.trim_end())
}

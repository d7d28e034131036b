use crate::{Error, Result};
use serde::Deserialize;
use serde_bytes::ByteBuf;

/// The unauthenticated status document served at `/api/v2/status`.
/// Development networks expose their ephemeral root key here; the
/// production network does not, and its key is compiled in instead.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaStatus {
    pub ic_api_version: Option<String>,
    pub replica_health_status: Option<String>,
    pub impl_version: Option<String>,
    pub root_key: Option<ByteBuf>,
}

impl ReplicaStatus {
    pub fn from_cbor(bytes: &[u8]) -> Result<ReplicaStatus> {
        serde_cbor::from_slice(bytes)
            .map_err(|err| Error::Decoding(format!("malformed status document: {}", err)))
    }
}

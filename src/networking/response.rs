use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Reject codes as reported by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    SysFatal,
    SysTransient,
    DestinationInvalid,
    CanisterReject,
    CanisterError,
    Unrecognized(u64),
}

impl From<u64> for RejectCode {
    fn from(code: u64) -> Self {
        match code {
            1 => RejectCode::SysFatal,
            2 => RejectCode::SysTransient,
            3 => RejectCode::DestinationInvalid,
            4 => RejectCode::CanisterReject,
            5 => RejectCode::CanisterError,
            other => RejectCode::Unrecognized(other),
        }
    }
}

/// An application-level rejection, surfaced to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectResponse {
    pub reject_code: RejectCode,
    pub reject_message: String,
    pub error_code: Option<String>,
}

/// The certified state of an outstanding call, read from a verified
/// certificate. `Unknown` covers "not there yet" and "redacted": both
/// mean keep polling.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestStatus {
    Received,
    Processing,
    Replied(Vec<u8>),
    Rejected(RejectResponse),
    Done,
    Unknown,
}

/// Body of a 200 response from the query endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResponseWire {
    Replied { reply: QueryReply },
    Rejected {
        reject_code: u64,
        reject_message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryReply {
    pub arg: ByteBuf,
}

/// Body of a 200 response from the synchronous call endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallResponseWire {
    Replied { certificate: ByteBuf },
    NonReplicatedRejection {
        reject_code: u64,
        reject_message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
}

/// Body of a 200 response from the read-state endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadStateResponseWire {
    pub certificate: ByteBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_code_mapping() {
        assert_eq!(RejectCode::from(4), RejectCode::CanisterReject);
        assert_eq!(RejectCode::from(99), RejectCode::Unrecognized(99));
    }

    #[test]
    fn test_query_response_round_trip() {
        let replied = QueryResponseWire::Replied {
            reply: QueryReply {
                arg: ByteBuf::from(b"DIDL\x00\x00".to_vec()),
            },
        };
        let bytes = serde_cbor::to_vec(&replied).unwrap();
        match serde_cbor::from_slice::<QueryResponseWire>(&bytes).unwrap() {
            QueryResponseWire::Replied { reply } => {
                assert_eq!(reply.arg.as_slice(), b"DIDL\x00\x00")
            }
            other => panic!("expected a reply, got {:?}", other),
        }

        let rejected = QueryResponseWire::Rejected {
            reject_code: 4,
            reject_message: "no".to_string(),
            error_code: Some("IC0406".to_string()),
        };
        let bytes = serde_cbor::to_vec(&rejected).unwrap();
        match serde_cbor::from_slice::<QueryResponseWire>(&bytes).unwrap() {
            QueryResponseWire::Rejected {
                reject_code,
                reject_message,
                error_code,
            } => {
                assert_eq!(reject_code, 4);
                assert_eq!(reject_message, "no");
                assert_eq!(error_code.as_deref(), Some("IC0406"));
            }
            other => panic!("expected a rejection, got {:?}", other),
        }
    }
}

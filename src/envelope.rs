use crate::identity::{Identity, SignedDelegation};
use crate::principal::Principal;
use crate::request_id::{Hashable, RequestId};
use crate::Result;
use serde::Serialize;
use serde_bytes::ByteBuf;

/// The canonical content of a request. Immutable once built: the request
/// id is derived from these fields alone, so the same content resubmitted
/// over a different endpoint generation keeps its identity.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
pub enum RequestContent {
    Call {
        canister_id: Principal,
        method_name: String,
        arg: ByteBuf,
        sender: Principal,
        ingress_expiry: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        nonce: Option<ByteBuf>,
    },
    Query {
        canister_id: Principal,
        method_name: String,
        arg: ByteBuf,
        sender: Principal,
        ingress_expiry: u64,
    },
    ReadState {
        paths: Vec<Vec<ByteBuf>>,
        sender: Principal,
        ingress_expiry: u64,
    },
}

impl RequestContent {
    pub fn to_request_id(&self) -> RequestId {
        let mut fields: Vec<(String, Hashable)> = vec![];
        match self {
            RequestContent::Call {
                canister_id,
                method_name,
                arg,
                sender,
                ingress_expiry,
                nonce,
            } => {
                fields.push(("request_type".to_string(), Hashable::text("call")));
                fields.push((
                    "canister_id".to_string(),
                    Hashable::blob(canister_id.as_slice()),
                ));
                fields.push(("method_name".to_string(), Hashable::text(method_name)));
                fields.push(("arg".to_string(), Hashable::blob(arg)));
                fields.push(("sender".to_string(), Hashable::blob(sender.as_slice())));
                fields.push(("ingress_expiry".to_string(), Hashable::U64(*ingress_expiry)));
                if let Some(nonce) = nonce {
                    fields.push(("nonce".to_string(), Hashable::blob(nonce)));
                }
            }
            RequestContent::Query {
                canister_id,
                method_name,
                arg,
                sender,
                ingress_expiry,
            } => {
                fields.push(("request_type".to_string(), Hashable::text("query")));
                fields.push((
                    "canister_id".to_string(),
                    Hashable::blob(canister_id.as_slice()),
                ));
                fields.push(("method_name".to_string(), Hashable::text(method_name)));
                fields.push(("arg".to_string(), Hashable::blob(arg)));
                fields.push(("sender".to_string(), Hashable::blob(sender.as_slice())));
                fields.push(("ingress_expiry".to_string(), Hashable::U64(*ingress_expiry)));
            }
            RequestContent::ReadState {
                paths,
                sender,
                ingress_expiry,
            } => {
                fields.push(("request_type".to_string(), Hashable::text("read_state")));
                fields.push((
                    "paths".to_string(),
                    Hashable::Array(
                        paths
                            .iter()
                            .map(|path| {
                                Hashable::Array(
                                    path.iter()
                                        .map(|label| Hashable::blob(label))
                                        .collect(),
                                )
                            })
                            .collect(),
                    ),
                ));
                fields.push(("sender".to_string(), Hashable::blob(sender.as_slice())));
                fields.push(("ingress_expiry".to_string(), Hashable::U64(*ingress_expiry)));
            }
        }
        RequestId::from_fields(&fields)
    }
}

/// A request ready for the wire: content plus whatever authentication the
/// identity produced. Fields the identity did not produce are omitted
/// from the serialized map entirely, not written as nulls.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub content: RequestContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_pubkey: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_sig: Option<ByteBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sender_delegation: Vec<SignedDelegation>,
}

impl Envelope {
    /// Computes the request id, signs it behind the request domain
    /// separator, and assembles the envelope. Performs no I/O.
    pub fn sign(content: RequestContent, identity: &dyn Identity) -> Result<(RequestId, Envelope)> {
        let request_id = content.to_request_id();
        let bundle = identity.sign(&request_id)?;
        let envelope = Envelope {
            content,
            sender_pubkey: bundle.public_key.map(ByteBuf::from),
            sender_sig: bundle.signature.map(ByteBuf::from),
            sender_delegation: bundle.delegations,
        };
        Ok((request_id, envelope))
    }

    /// The transport encoding: a self-describing tag followed by the
    /// envelope map.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut vbytes: Vec<u8> = vec![];
        let mut serializer = serde_cbor::Serializer::new(&mut vbytes);
        serializer.self_describe()?;
        serde::Serialize::serialize(self, &mut serializer)?;
        Ok(vbytes)
    }
}

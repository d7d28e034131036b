//! Test doubles: a single-holder stand-in for the network's threshold
//! key, certificate builders for canned request states, and a scripted
//! transport that replays expected exchanges in order.

use crate::certificate::{Certificate, CertificateDelegation};
use crate::crypto::{der_wrap, BLS_DER_PREFIX, BLS_DST};
use crate::hash_tree::{domain_sep, HashTree};
use crate::networking::response::ReadStateResponseWire;
use crate::networking::transport::{Transport, TransportResponse};
use crate::request_id::{Hashable, RequestId};
use crate::{Error, Result};
use async_trait::async_trait;
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use serde_bytes::ByteBuf;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A threshold key held by one party. Production signatures are
/// aggregated across a subnet; for tests a single scalar produces bytes
/// the verifier cannot tell apart.
#[derive(Clone)]
pub struct ThresholdKey {
    secret: Scalar,
}

impl ThresholdKey {
    pub fn new(seed: u64) -> Self {
        ThresholdKey {
            secret: Scalar::from(seed),
        }
    }

    pub fn public_key_der(&self) -> Vec<u8> {
        let public = G2Affine::from(G2Projective::generator() * self.secret);
        der_wrap(&BLS_DER_PREFIX, &public.to_compressed())
    }

    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let point =
            <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(msg, BLS_DST);
        G1Affine::from(point * self.secret).to_compressed().to_vec()
    }

    /// A certificate over `tree`, signed directly by this key.
    pub fn certify(&self, tree: HashTree) -> Certificate {
        let mut msg = domain_sep("ic-state-root");
        msg.extend(&tree.digest());
        let signature = self.sign(&msg);
        Certificate {
            tree,
            signature,
            delegation: None,
        }
    }

    /// A certificate over `tree` signed by this key, carrying a
    /// delegation in which `root` vouches for this key as `subnet_id`.
    pub fn certify_with_delegation(
        &self,
        tree: HashTree,
        root: &ThresholdKey,
        subnet_id: &[u8],
    ) -> Certificate {
        let delegation_tree = HashTree::Labeled(
            b"subnet".to_vec(),
            Box::new(HashTree::Labeled(
                subnet_id.to_vec(),
                Box::new(HashTree::Labeled(
                    b"public_key".to_vec(),
                    Box::new(HashTree::Leaf(self.public_key_der())),
                )),
            )),
        );
        let parent = root.certify(delegation_tree);
        let mut certificate = self.certify(tree);
        certificate.delegation = Some(CertificateDelegation {
            subnet_id: subnet_id.to_vec(),
            certificate: serde_cbor::to_vec(&parent).unwrap(),
        });
        certificate
    }
}

fn request_status_tree(request_id: &RequestId, leaves: Vec<(&[u8], Vec<u8>)>) -> HashTree {
    let mut forest: Option<HashTree> = None;
    for (label, value) in leaves {
        let node = HashTree::Labeled(label.to_vec(), Box::new(HashTree::Leaf(value)));
        forest = Some(match forest {
            None => node,
            Some(existing) => HashTree::Fork(Box::new(existing), Box::new(node)),
        });
    }
    HashTree::Labeled(
        b"request_status".to_vec(),
        Box::new(HashTree::Labeled(
            request_id.to_vec(),
            Box::new(forest.unwrap_or(HashTree::Empty)),
        )),
    )
}

/// Raw certificate bytes carrying `request_status/<id>/status = replied`
/// plus the reply payload.
pub fn replied_certificate(key: &ThresholdKey, request_id: &RequestId, reply: &[u8]) -> Vec<u8> {
    let tree = request_status_tree(
        request_id,
        vec![
            (b"reply", reply.to_vec()),
            (b"status", b"replied".to_vec()),
        ],
    );
    serde_cbor::to_vec(&key.certify(tree)).unwrap()
}

pub fn status_certificate(key: &ThresholdKey, request_id: &RequestId, status: &str) -> Vec<u8> {
    let tree = request_status_tree(request_id, vec![(b"status", status.as_bytes().to_vec())]);
    serde_cbor::to_vec(&key.certify(tree)).unwrap()
}

pub fn rejected_certificate(
    key: &ThresholdKey,
    request_id: &RequestId,
    reject_code: u64,
    reject_message: &str,
    error_code: Option<&str>,
) -> Vec<u8> {
    let mut code_bytes: Vec<u8> = vec![];
    crate::candid::leb128::write_uleb128_u64(&mut code_bytes, reject_code);
    let mut leaves: Vec<(&[u8], Vec<u8>)> = vec![
        (b"reject_code", code_bytes),
        (b"reject_message", reject_message.as_bytes().to_vec()),
        (b"status", b"rejected".to_vec()),
    ];
    if let Some(error_code) = error_code {
        leaves.insert(2, (b"error_code", error_code.as_bytes().to_vec()));
    }
    let tree = request_status_tree(request_id, leaves);
    serde_cbor::to_vec(&key.certify(tree)).unwrap()
}

fn wrap_read_state(certificate: Vec<u8>) -> Vec<u8> {
    serde_cbor::to_vec(&ReadStateResponseWire {
        certificate: ByteBuf::from(certificate),
    })
    .unwrap()
}

pub fn certified_replied_body(key: &ThresholdKey, request_id: &RequestId, reply: &[u8]) -> Vec<u8> {
    wrap_read_state(replied_certificate(key, request_id, reply))
}

pub fn certified_status_body(key: &ThresholdKey, request_id: &RequestId, status: &str) -> Vec<u8> {
    wrap_read_state(status_certificate(key, request_id, status))
}

pub fn certified_done_body(key: &ThresholdKey, request_id: &RequestId) -> Vec<u8> {
    certified_status_body(key, request_id, "done")
}

pub fn certified_rejected_body(
    key: &ThresholdKey,
    request_id: &RequestId,
    reject_code: u64,
    reject_message: &str,
    error_code: Option<&str>,
) -> Vec<u8> {
    wrap_read_state(rejected_certificate(
        key,
        request_id,
        reject_code,
        reject_message,
        error_code,
    ))
}

/// Recomputes the request id of a serialized envelope the same way the
/// receiving replica would: from the content map alone.
pub fn envelope_request_id(envelope: &[u8]) -> RequestId {
    let value: serde_cbor::Value = serde_cbor::from_slice(envelope).expect("malformed envelope");
    let map = match value {
        serde_cbor::Value::Map(map) => map,
        other => panic!("envelope is not a map: {:?}", other),
    };
    let content = match map.get(&serde_cbor::Value::Text("content".to_string())) {
        Some(serde_cbor::Value::Map(content)) => content,
        other => panic!("envelope has no content map: {:?}", other),
    };
    let fields: Vec<(String, Hashable)> = content
        .iter()
        .map(|(key, value)| {
            let key = match key {
                serde_cbor::Value::Text(key) => key.clone(),
                other => panic!("non-text content key {:?}", other),
            };
            (key, hashable_of(value))
        })
        .collect();
    RequestId::from_fields(&fields)
}

/// Pulls the polled call's request id out of a read_state envelope: the
/// second label of the first path. The read_state request has its own,
/// different, request id.
pub fn read_state_target(envelope: &[u8]) -> RequestId {
    let value: serde_cbor::Value = serde_cbor::from_slice(envelope).expect("malformed envelope");
    let map = match value {
        serde_cbor::Value::Map(map) => map,
        other => panic!("envelope is not a map: {:?}", other),
    };
    let content = match map.get(&serde_cbor::Value::Text("content".to_string())) {
        Some(serde_cbor::Value::Map(content)) => content,
        other => panic!("envelope has no content map: {:?}", other),
    };
    let paths = match content.get(&serde_cbor::Value::Text("paths".to_string())) {
        Some(serde_cbor::Value::Array(paths)) => paths,
        other => panic!("read_state envelope has no paths: {:?}", other),
    };
    match paths.first() {
        Some(serde_cbor::Value::Array(labels)) => match labels.get(1) {
            Some(serde_cbor::Value::Bytes(bytes)) => {
                let digest: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .expect("request id label is not 32 bytes");
                RequestId::new(digest)
            }
            other => panic!("first path has no request id label: {:?}", other),
        },
        other => panic!("read_state envelope has no first path: {:?}", other),
    }
}

fn hashable_of(value: &serde_cbor::Value) -> Hashable {
    match value {
        serde_cbor::Value::Text(text) => Hashable::text(text),
        serde_cbor::Value::Bytes(bytes) => Hashable::blob(bytes),
        serde_cbor::Value::Integer(number) => Hashable::U64(*number as u64),
        serde_cbor::Value::Array(elements) => {
            Hashable::Array(elements.iter().map(hashable_of).collect())
        }
        other => panic!("unhashable content value {:?}", other),
    }
}

type Responder = Box<dyn Fn(&[u8]) -> (u16, Vec<u8>) + Send + Sync>;

struct Exchange {
    method: &'static str,
    path_fragment: String,
    responder: Responder,
    repeating: bool,
}

/// A transport that replays a scripted conversation. Each expected
/// exchange matches on a path fragment and computes its response from
/// the request body, which lets certificate builders recover the
/// request id the agent derived.
pub struct MockTransport {
    script: Mutex<VecDeque<Exchange>>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn expect_post<F>(&self, path_fragment: &str, responder: F)
    where
        F: Fn(&[u8]) -> (u16, Vec<u8>) + Send + Sync + 'static,
    {
        self.push("POST", path_fragment, responder, false);
    }

    pub fn expect_post_repeating<F>(&self, path_fragment: &str, responder: F)
    where
        F: Fn(&[u8]) -> (u16, Vec<u8>) + Send + Sync + 'static,
    {
        self.push("POST", path_fragment, responder, true);
    }

    pub fn expect_get<F>(&self, path_fragment: &str, responder: F)
    where
        F: Fn(&[u8]) -> (u16, Vec<u8>) + Send + Sync + 'static,
    {
        self.push("GET", path_fragment, responder, false);
    }

    fn push<F>(&self, method: &'static str, path_fragment: &str, responder: F, repeating: bool)
    where
        F: Fn(&[u8]) -> (u16, Vec<u8>) + Send + Sync + 'static,
    {
        self.script.lock().unwrap().push_back(Exchange {
            method,
            path_fragment: path_fragment.to_string(),
            responder: Box::new(responder),
            repeating,
        });
    }

    fn respond(&self, method: &str, path: &str, body: &[u8]) -> Result<TransportResponse> {
        let mut script = self.script.lock().unwrap();
        let exchange = script.front().ok_or_else(|| {
            Error::Transport(format!("unexpected {} {} after the script ended", method, path))
        })?;
        if exchange.method != method || !path.contains(&exchange.path_fragment) {
            return Err(Error::Transport(format!(
                "expected {} ..{}.., got {} {}",
                exchange.method, exchange.path_fragment, method, path
            )));
        }
        let (status, body) = (exchange.responder)(body);
        if !exchange.repeating {
            script.pop_front();
        }
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<TransportResponse> {
        self.respond("POST", path, &body)
    }

    async fn get(&self, path: &str) -> Result<TransportResponse> {
        self.respond("GET", path, &[])
    }
}

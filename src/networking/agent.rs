use crate::candid::leb128::ByteReader;
use crate::certificate::Certificate;
use crate::envelope::{Envelope, RequestContent};
use crate::hash_tree::LookupResult;
use crate::identity::{AnonymousIdentity, Identity};
use crate::networking::response::{
    CallResponseWire, QueryResponseWire, ReadStateResponseWire, RejectCode, RejectResponse,
    RequestStatus,
};
use crate::networking::status::ReplicaStatus;
use crate::networking::transport::{ReqwestTransport, Transport, TransportResponse};
use crate::principal::Principal;
use crate::request_id::RequestId;
use crate::time::create_timestamp;
use crate::{Error, Result};
use serde_bytes::ByteBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{event, Level};
use uuid::Uuid;

lazy_static! {
    /// The production network's root public key (DER). Used whenever the
    /// status endpoint does not advertise a development key.
    pub static ref MAINNET_ROOT_KEY: Vec<u8> = hex::decode(concat!(
        "308182301d060d2b0601040182dc7c0503010201060c2b0601040182dc7c0503",
        "0201036100814c0e6ec71fab583b08bd81373c255c3c371b2e84863c98a4f1e0",
        "8b74235d14fb5d9c0cd546d9685f913a0c0b2cc5341583bf4b4392e467db96d6",
        "5b9bb4cb717112f8472e0d5a4d14505ffd7484b01291091c5f87b98883463f98",
        "091a0baaae"
    ))
    .unwrap();
}

const DEFAULT_INGRESS_EXPIRY: Duration = Duration::from_secs(240);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);

/// The client side of the protocol: builds, signs and submits requests,
/// polls them to completion, and refuses to expose any certified state
/// that did not verify.
///
/// Long-lived. Carries two pieces of lazily-written state: the cached
/// root public key, and a sticky flag recording that the synchronous v3
/// call endpoint is unavailable. The flag only ever goes one way and is
/// an optimization, never a correctness requirement.
pub struct Agent {
    transport: Arc<dyn Transport>,
    identity: Arc<dyn Identity>,
    ingress_expiry: Duration,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
    root_key: RwLock<Option<Vec<u8>>>,
    v3_unsupported: AtomicBool,
}

pub struct AgentBuilder {
    transport: Option<Arc<dyn Transport>>,
    identity: Arc<dyn Identity>,
    ingress_expiry: Duration,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
    root_key: Option<Vec<u8>>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        AgentBuilder {
            transport: None,
            identity: Arc::new(AnonymousIdentity),
            ingress_expiry: DEFAULT_INGRESS_EXPIRY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: Some(DEFAULT_POLL_TIMEOUT),
            root_key: None,
        }
    }

    pub fn with_url(mut self, url: &str) -> Result<Self> {
        self.transport = Some(Arc::new(ReqwestTransport::new(url)?));
        Ok(self)
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// How far in the future submitted requests expire.
    pub fn with_ingress_expiry(mut self, window: Duration) -> Self {
        self.ingress_expiry = window;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// `None` polls until cancelled; the default turns a two-minute wait
    /// into `Error::Timeout`.
    pub fn with_poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Preloads the root key instead of fetching it from the status
    /// endpoint on first use.
    pub fn with_root_key(mut self, root_key: Vec<u8>) -> Self {
        self.root_key = Some(root_key);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let transport = self.transport.ok_or_else(|| {
            Error::Transport("an agent needs a url or a transport".to_string())
        })?;
        Ok(Agent {
            transport,
            identity: self.identity,
            ingress_expiry: self.ingress_expiry,
            poll_interval: self.poll_interval,
            poll_timeout: self.poll_timeout,
            root_key: RwLock::new(self.root_key),
            v3_unsupported: AtomicBool::new(false),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        AgentBuilder::new()
    }
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    fn expiry_timestamp(&self) -> u64 {
        create_timestamp() + self.ingress_expiry.as_nanos() as u64
    }

    /// The unauthenticated status document.
    pub async fn status(&self) -> Result<ReplicaStatus> {
        let response = self.transport.get("api/v2/status").await?;
        if response.status != 200 {
            return Err(Error::Transport(format!(
                "status endpoint answered {}",
                response.status
            )));
        }
        ReplicaStatus::from_cbor(&response.body)
    }

    /// The key certificates are verified against. Fetched from the
    /// status endpoint once and cached; a network that does not
    /// advertise one gets the production key. A concurrent first use may
    /// fetch twice, which is wasteful but harmless.
    pub async fn read_root_key(&self) -> Result<Vec<u8>> {
        if let Some(root_key) = self.root_key.read().await.clone() {
            return Ok(root_key);
        }
        let status = self.status().await?;
        let root_key = match status.root_key {
            Some(key) => {
                event!(Level::INFO, "using the development root key from the status endpoint");
                key.into_vec()
            }
            None => MAINNET_ROOT_KEY.clone(),
        };
        *self.root_key.write().await = Some(root_key.clone());
        Ok(root_key)
    }

    /// A read-only call: one signed round trip, no certificate. The
    /// response is only as trustworthy as the replica that answered.
    pub async fn query(
        &self,
        canister_id: &Principal,
        method_name: &str,
        arg: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let content = RequestContent::Query {
            canister_id: canister_id.clone(),
            method_name: method_name.to_string(),
            arg: ByteBuf::from(arg),
            sender: self.identity.sender(),
            ingress_expiry: self.expiry_timestamp(),
        };
        let (request_id, envelope) = Envelope::sign(content, self.identity.as_ref())?;
        event!(Level::DEBUG, request_id = %request_id, method = method_name, "submitting query");
        let response = self
            .transport
            .post(&format!("api/v2/canister/{}/query", canister_id), envelope.serialize()?)
            .await?;
        if response.status != 200 {
            return Err(Error::Transport(format!(
                "query endpoint answered {}",
                response.status
            )));
        }
        match serde_cbor::from_slice::<QueryResponseWire>(&response.body)
            .map_err(|err| Error::Decoding(format!("malformed query response: {}", err)))?
        {
            QueryResponseWire::Replied { reply } => Ok(reply.arg.into_vec()),
            QueryResponseWire::Rejected {
                reject_code,
                reject_message,
                error_code,
            } => Err(Error::CallRejected(RejectResponse {
                reject_code: RejectCode::from(reject_code),
                reject_message,
                error_code,
            })),
        }
    }

    /// A state-changing call, driven to a terminal outcome. Tries the
    /// synchronous v3 endpoint first; a 404/405 marks v3 unsupported for
    /// the rest of this agent's life and resubmits through v2 plus
    /// polling. The request id is derived from content only, so it is
    /// identical on both paths.
    pub async fn call(
        &self,
        canister_id: &Principal,
        method_name: &str,
        arg: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let content = RequestContent::Call {
            canister_id: canister_id.clone(),
            method_name: method_name.to_string(),
            arg: ByteBuf::from(arg),
            sender: self.identity.sender(),
            ingress_expiry: self.expiry_timestamp(),
            nonce: Some(ByteBuf::from(Uuid::new_v4().as_bytes().to_vec())),
        };
        let (request_id, envelope) = Envelope::sign(content, self.identity.as_ref())?;
        let body = envelope.serialize()?;

        if !self.v3_unsupported.load(Ordering::Relaxed) {
            let response = self
                .transport
                .post(
                    &format!("api/v3/canister/{}/call", canister_id),
                    body.clone(),
                )
                .await?;
            match response.status {
                200 => return self.handle_v3_response(canister_id, request_id, response).await,
                202 => {
                    event!(Level::DEBUG, request_id = %request_id, "v3 call accepted, polling");
                    return self.wait(canister_id, request_id).await;
                }
                404 | 405 => {
                    event!(
                        Level::INFO,
                        "v3 call endpoint unavailable, downgrading this agent to v2"
                    );
                    self.v3_unsupported.store(true, Ordering::Relaxed);
                }
                other => {
                    return Err(Error::Transport(format!(
                        "call endpoint answered {}",
                        other
                    )))
                }
            }
        }

        let response = self
            .transport
            .post(&format!("api/v2/canister/{}/call", canister_id), body)
            .await?;
        match response.status {
            202 => self.wait(canister_id, request_id).await,
            200 if response.body.is_empty() => self.wait(canister_id, request_id).await,
            200 => Err(Error::Transport(format!(
                "call endpoint answered 200 with a body: {}",
                String::from_utf8_lossy(&response.body)
            ))),
            other => Err(Error::Transport(format!(
                "call endpoint answered {}",
                other
            ))),
        }
    }

    async fn handle_v3_response(
        &self,
        canister_id: &Principal,
        request_id: RequestId,
        response: TransportResponse,
    ) -> Result<Vec<u8>> {
        match serde_cbor::from_slice::<CallResponseWire>(&response.body)
            .map_err(|err| Error::Decoding(format!("malformed call response: {}", err)))?
        {
            CallResponseWire::Replied { certificate } => {
                let certificate = Certificate::from_cbor(&certificate)?;
                let root_key = self.read_root_key().await?;
                certificate.verify(&root_key)?;
                match classify_request_status(&certificate, &request_id)? {
                    RequestStatus::Replied(reply) => Ok(reply),
                    RequestStatus::Rejected(rejection) => Err(Error::CallRejected(rejection)),
                    RequestStatus::Done => Err(Error::RequestCleanedUp),
                    // certified but not terminal yet: fall back to polling
                    _ => self.wait(canister_id, request_id).await,
                }
            }
            CallResponseWire::NonReplicatedRejection {
                reject_code,
                reject_message,
                error_code,
            } => Err(Error::CallRejected(RejectResponse {
                reject_code: RejectCode::from(reject_code),
                reject_message,
                error_code,
            })),
        }
    }

    /// Reads arbitrary certified state paths. The returned certificate
    /// has already been verified; an unverifiable one never escapes.
    pub async fn read_state(
        &self,
        canister_id: &Principal,
        paths: Vec<Vec<Vec<u8>>>,
    ) -> Result<Certificate> {
        let content = RequestContent::ReadState {
            paths: paths
                .into_iter()
                .map(|path| path.into_iter().map(ByteBuf::from).collect())
                .collect(),
            sender: self.identity.sender(),
            ingress_expiry: self.expiry_timestamp(),
        };
        let (_, envelope) = Envelope::sign(content, self.identity.as_ref())?;
        let response = self
            .transport
            .post(
                &format!("api/v2/canister/{}/read_state", canister_id),
                envelope.serialize()?,
            )
            .await?;
        if response.status != 200 {
            return Err(Error::Transport(format!(
                "read_state endpoint answered {}",
                response.status
            )));
        }
        let wire: ReadStateResponseWire = serde_cbor::from_slice(&response.body)
            .map_err(|err| Error::Decoding(format!("malformed read_state response: {}", err)))?;
        let certificate = Certificate::from_cbor(&wire.certificate)?;
        let root_key = self.read_root_key().await?;
        certificate.verify(&root_key)?;
        Ok(certificate)
    }

    /// One certified look at a call's status.
    pub async fn request_status(
        &self,
        canister_id: &Principal,
        request_id: RequestId,
    ) -> Result<RequestStatus> {
        let path = vec![b"request_status".to_vec(), request_id.to_vec()];
        let certificate = self.read_state(canister_id, vec![path]).await?;
        classify_request_status(&certificate, &request_id)
    }

    /// Polls until the call reaches a terminal state. Sleeps between
    /// iterations and honors the configured timeout; dropping the future
    /// cancels cleanly at any await point.
    pub async fn wait(
        &self,
        canister_id: &Principal,
        request_id: RequestId,
    ) -> Result<Vec<u8>> {
        let deadline = self.poll_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            match self.request_status(canister_id, request_id).await? {
                RequestStatus::Replied(reply) => return Ok(reply),
                RequestStatus::Rejected(rejection) => {
                    return Err(Error::CallRejected(rejection))
                }
                RequestStatus::Done => return Err(Error::RequestCleanedUp),
                RequestStatus::Received | RequestStatus::Processing | RequestStatus::Unknown => {}
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    event!(Level::WARN, request_id = %request_id, "gave up polling");
                    return Err(Error::Timeout);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Reads `request_status/<id>` out of a verified certificate tree.
fn classify_request_status(
    certificate: &Certificate,
    request_id: &RequestId,
) -> Result<RequestStatus> {
    let status_path: [&[u8]; 3] = [b"request_status", request_id.as_slice(), b"status"];
    let status = match certificate.lookup_path(&status_path) {
        LookupResult::Found(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::Decoding("request status is not UTF-8".to_string()))?,
        // absent means not scheduled yet, pruned means not disclosed;
        // either way the caller keeps polling
        LookupResult::Absent | LookupResult::Unknown => return Ok(RequestStatus::Unknown),
        LookupResult::Error => {
            return Err(Error::Decoding(
                "malformed request_status path in certificate".to_string(),
            ))
        }
    };
    match status.as_str() {
        "received" => Ok(RequestStatus::Received),
        "processing" => Ok(RequestStatus::Processing),
        "done" => Ok(RequestStatus::Done),
        "replied" => {
            let reply_path: [&[u8]; 3] = [b"request_status", request_id.as_slice(), b"reply"];
            match certificate.lookup_path(&reply_path) {
                LookupResult::Found(reply) => Ok(RequestStatus::Replied(reply.to_vec())),
                _ => Err(Error::Decoding(
                    "certificate says replied but carries no reply".to_string(),
                )),
            }
        }
        "rejected" => {
            let code_path: [&[u8]; 3] =
                [b"request_status", request_id.as_slice(), b"reject_code"];
            let message_path: [&[u8]; 3] =
                [b"request_status", request_id.as_slice(), b"reject_message"];
            let error_path: [&[u8]; 3] =
                [b"request_status", request_id.as_slice(), b"error_code"];
            let reject_code = match certificate.lookup_path(&code_path) {
                LookupResult::Found(bytes) => {
                    let mut reader = ByteReader::new(bytes);
                    RejectCode::from(reader.read_uleb128_u64()?)
                }
                _ => {
                    return Err(Error::Decoding(
                        "certificate says rejected but carries no reject_code".to_string(),
                    ))
                }
            };
            let reject_message = match certificate.lookup_path(&message_path) {
                LookupResult::Found(bytes) => String::from_utf8(bytes.to_vec())
                    .map_err(|_| Error::Decoding("reject message is not UTF-8".to_string()))?,
                _ => String::new(),
            };
            let error_code = match certificate.lookup_path(&error_path) {
                LookupResult::Found(bytes) => Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|_| Error::Decoding("error code is not UTF-8".to_string()))?,
                ),
                _ => None,
            };
            Ok(RequestStatus::Rejected(RejectResponse {
                reject_code,
                reject_message,
                error_code,
            }))
        }
        other => Err(Error::Decoding(format!(
            "unrecognized request status {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::mocks::{
        certified_done_body, certified_rejected_body, certified_replied_body,
        certified_status_body, envelope_request_id, read_state_target, replied_certificate,
        MockTransport, ThresholdKey,
    };

    fn canister() -> Principal {
        Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0x04, 0xd2]).unwrap()
    }

    fn agent_with(transport: MockTransport, key: &ThresholdKey) -> Agent {
        Agent::builder()
            .with_transport(Arc::new(transport))
            .with_root_key(key.public_key_der())
            .with_poll_interval(Duration::from_millis(1))
            .with_poll_timeout(Some(Duration::from_secs(5)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_replied() {
        let reply = b"DIDL\x00\x01\x7e\x01".to_vec();
        let wire = QueryResponseWire::Replied {
            reply: crate::networking::response::QueryReply {
                arg: ByteBuf::from(reply.clone()),
            },
        };
        let transport = MockTransport::new();
        transport.expect_post(
            "api/v2/canister/aaaaa-aa/query",
            move |_| (200, serde_cbor::to_vec(&wire).unwrap()),
        );
        let agent = Agent::builder()
            .with_transport(Arc::new(transport))
            .build()
            .unwrap();
        let result = agent
            .query(&Principal::management_canister(), "greet", b"DIDL\x00\x00".to_vec())
            .await
            .unwrap();
        assert_eq!(result, reply);
    }

    #[tokio::test]
    async fn test_query_rejected_surfaces_exact_fields() {
        let wire = QueryResponseWire::Rejected {
            reject_code: 4,
            reject_message: "canister said no".to_string(),
            error_code: Some("IC0406".to_string()),
        };
        let transport = MockTransport::new();
        transport.expect_post("/query", move |_| (200, serde_cbor::to_vec(&wire).unwrap()));
        let agent = Agent::builder()
            .with_transport(Arc::new(transport))
            .build()
            .unwrap();
        match agent
            .query(&canister(), "greet", b"DIDL\x00\x00".to_vec())
            .await
        {
            Err(Error::CallRejected(rejection)) => {
                assert_eq!(rejection.reject_code, RejectCode::CanisterReject);
                assert_eq!(rejection.reject_message, "canister said no");
                assert_eq!(rejection.error_code.as_deref(), Some("IC0406"));
            }
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_v3_call_replied_synchronously() {
        let key = ThresholdKey::new(3);
        let key_for_response = key.clone();
        let reply = b"DIDL\x00\x01\x7d\x2a".to_vec();
        let reply_for_response = reply.clone();

        let transport = MockTransport::new();
        transport.expect_post("api/v3/canister", move |envelope| {
            let request_id = envelope_request_id(envelope);
            let certificate = replied_certificate(&key_for_response, &request_id, &reply_for_response);
            let wire = CallResponseWire::Replied {
                certificate: ByteBuf::from(certificate),
            };
            (200, serde_cbor::to_vec(&wire).unwrap())
        });
        let agent = agent_with(transport, &key);
        let result = agent
            .call(&canister(), "increment", b"DIDL\x00\x00".to_vec())
            .await
            .unwrap();
        assert_eq!(result, reply);
    }

    #[tokio::test]
    async fn test_v3_unavailable_falls_back_to_v2_and_polls() {
        let key = ThresholdKey::new(5);
        let key_for_response = key.clone();
        let reply = b"DIDL\x00\x01\x7d\x2b".to_vec();
        let reply_for_response = reply.clone();

        let transport = MockTransport::new();
        transport.expect_post("api/v3/canister", |_| (404, vec![]));
        transport.expect_post("api/v2/canister", |_| (202, vec![]));
        // first poll is still processing, the second has the reply
        let processing_key = key.clone();
        transport.expect_post("/read_state", move |envelope| {
            let request_id = read_state_target(envelope);
            (
                200,
                certified_status_body(&processing_key, &request_id, "processing"),
            )
        });
        transport.expect_post("/read_state", move |envelope| {
            let request_id = read_state_target(envelope);
            (
                200,
                certified_replied_body(&key_for_response, &request_id, &reply_for_response),
            )
        });

        let agent = agent_with(transport, &key);
        let result = agent
            .call(&canister(), "increment", b"DIDL\x00\x00".to_vec())
            .await
            .unwrap();
        assert_eq!(result, reply);
        // the downgrade is sticky
        assert!(agent.v3_unsupported.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_sticky_downgrade_skips_v3_on_later_calls() {
        let key = ThresholdKey::new(6);
        let key_for_response = key.clone();
        let transport = MockTransport::new();
        // no v3 exchange scripted: a v3 attempt would fail the test
        transport.expect_post("api/v2/canister", |_| (202, vec![]));
        transport.expect_post("/read_state", move |envelope| {
            let request_id = read_state_target(envelope);
            (
                200,
                certified_replied_body(&key_for_response, &request_id, b"DIDL\x00\x00"),
            )
        });
        let agent = agent_with(transport, &key);
        agent.v3_unsupported.store(true, Ordering::Relaxed);
        agent
            .call(&canister(), "increment", b"DIDL\x00\x00".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_status_becomes_call_rejected() {
        let key = ThresholdKey::new(9);
        let key_for_response = key.clone();
        let transport = MockTransport::new();
        transport.expect_post("api/v3/canister", |_| (404, vec![]));
        transport.expect_post("api/v2/canister", |_| (202, vec![]));
        transport.expect_post("/read_state", move |envelope| {
            let request_id = read_state_target(envelope);
            (
                200,
                certified_rejected_body(&key_for_response, &request_id, 5, "trapped", Some("IC0502")),
            )
        });
        let agent = agent_with(transport, &key);
        match agent
            .call(&canister(), "explode", b"DIDL\x00\x00".to_vec())
            .await
        {
            Err(Error::CallRejected(rejection)) => {
                assert_eq!(rejection.reject_code, RejectCode::CanisterError);
                assert_eq!(rejection.reject_message, "trapped");
                assert_eq!(rejection.error_code.as_deref(), Some("IC0502"));
            }
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_done_status_means_cleaned_up() {
        let key = ThresholdKey::new(10);
        let key_for_response = key.clone();
        let transport = MockTransport::new();
        transport.expect_post("api/v3/canister", |_| (202, vec![]));
        transport.expect_post("/read_state", move |envelope| {
            let request_id = read_state_target(envelope);
            (200, certified_done_body(&key_for_response, &request_id))
        });
        let agent = agent_with(transport, &key);
        match agent
            .call(&canister(), "increment", b"DIDL\x00\x00".to_vec())
            .await
        {
            Err(Error::RequestCleanedUp) => {}
            other => panic!("expected RequestCleanedUp, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_timeout() {
        let key = ThresholdKey::new(12);
        let transport = MockTransport::new();
        transport.expect_post("api/v3/canister", |_| (202, vec![]));
        let pending_key = key.clone();
        transport.expect_post_repeating("/read_state", move |envelope| {
            let request_id = read_state_target(envelope);
            (
                200,
                certified_status_body(&pending_key, &request_id, "received"),
            )
        });
        let agent = Agent::builder()
            .with_transport(Arc::new(transport))
            .with_root_key(key.public_key_der())
            .with_poll_interval(Duration::from_millis(1))
            .with_poll_timeout(Some(Duration::from_millis(20)))
            .build()
            .unwrap();
        match agent
            .call(&canister(), "increment", b"DIDL\x00\x00".to_vec())
            .await
        {
            Err(Error::Timeout) => {}
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tampered_certificate_never_reaches_the_caller() {
        let key = ThresholdKey::new(14);
        let wrong_key = ThresholdKey::new(15);
        let transport = MockTransport::new();
        transport.expect_post("api/v3/canister", |_| (202, vec![]));
        let signer = wrong_key.clone();
        transport.expect_post("/read_state", move |envelope| {
            let request_id = read_state_target(envelope);
            (
                200,
                certified_replied_body(&signer, &request_id, b"DIDL\x00\x00"),
            )
        });
        let agent = agent_with(transport, &key);
        match agent
            .call(&canister(), "increment", b"DIDL\x00\x00".to_vec())
            .await
        {
            Err(Error::InvalidCertificate(_)) => {}
            other => panic!("expected an invalid certificate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_root_key_fetched_from_status_and_cached() {
        let key = ThresholdKey::new(16);
        let key_der = key.public_key_der();
        let transport = MockTransport::new();
        transport.expect_post("api/v3/canister", |_| (202, vec![]));
        let reply_key = key.clone();
        transport.expect_post("/read_state", move |envelope| {
            let request_id = read_state_target(envelope);
            (
                200,
                certified_replied_body(&reply_key, &request_id, b"DIDL\x00\x00"),
            )
        });
        // the root key is only fetched once the first certificate needs
        // verifying, which is why the status exchange comes last
        let status_key = key_der.clone();
        transport.expect_get("api/v2/status", move |_| {
            let mut map: std::collections::BTreeMap<serde_cbor::Value, serde_cbor::Value> =
                Default::default();
            map.insert(
                serde_cbor::Value::Text("root_key".to_string()),
                serde_cbor::Value::Bytes(status_key.clone()),
            );
            (
                200,
                serde_cbor::to_vec(&serde_cbor::Value::Map(map)).unwrap(),
            )
        });
        // no with_root_key: the agent must discover it
        let agent = Agent::builder()
            .with_transport(Arc::new(transport))
            .with_poll_interval(Duration::from_millis(1))
            .build()
            .unwrap();
        agent
            .call(&canister(), "increment", b"DIDL\x00\x00".to_vec())
            .await
            .unwrap();
        assert_eq!(agent.root_key.read().await.as_deref(), Some(&key_der[..]));
    }
}

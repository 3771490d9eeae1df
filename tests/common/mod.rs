//! Shared test collaborators
//!
//! Instrumented stand-ins for the hash provider, signed URL provider and
//! transport. Every call records a start and end event with a global sequence
//! number so tests can assert on cross-file ordering.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use hayate_uploadr::hash::{ContentDigest, DigestAlgorithm, HashError, HashProvider};
use hayate_uploadr::orchestrator::Orchestrator;
use hayate_uploadr::s3::{ProvisionError, SignedUrl, SignedUrlProvider, SigningError};
use hayate_uploadr::upload::{PutOutcome, PutRequest, Transport, TransportError, UploadFile};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Hash,
    Sign,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Start,
    End,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub seq: usize,
    pub file: String,
    pub call: Call,
    pub edge: Edge,
}

/// Ordered log of collaborator calls
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn record(&self, file: &str, call: Call, edge: Edge) {
        let mut events = self.events.lock();
        let seq = events.len();
        events.push(Event {
            seq,
            file: file.to_string(),
            call,
            edge,
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Sequence number of the first matching event
    pub fn seq(&self, file: &str, call: Call, edge: Edge) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .find(|e| e.file == file && e.call == call && e.edge == edge)
            .map(|e| e.seq)
    }

    pub fn all_seqs(&self, call: Call, edge: Edge) -> Vec<usize> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.call == call && e.edge == edge)
            .map(|e| e.seq)
            .collect()
    }

    pub fn count(&self, file: &str, call: Call) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.file == file && e.call == call && e.edge == Edge::Start)
            .count()
    }
}

/// Per-file artificial latency
#[derive(Debug, Clone, Default)]
pub struct Delays {
    per_file: HashMap<(String, Call), Duration>,
}

impl Delays {
    pub fn with(mut self, file: &str, call: Call, delay: Duration) -> Self {
        self.per_file.insert((file.to_string(), call), delay);
        self
    }

    async fn wait(&self, file: &str, call: Call) {
        match self.per_file.get(&(file.to_string(), call)) {
            Some(delay) => tokio::time::sleep(*delay).await,
            None => tokio::task::yield_now().await,
        }
    }
}

pub struct StubHasher {
    pub recorder: Arc<Recorder>,
    pub delays: Delays,
    pub fail_on: HashSet<String>,
}

#[async_trait]
impl HashProvider for StubHasher {
    async fn digest(&self, file: &UploadFile) -> Result<ContentDigest, HashError> {
        self.recorder.record(file.name(), Call::Hash, Edge::Start);
        self.delays.wait(file.name(), Call::Hash).await;
        self.recorder.record(file.name(), Call::Hash, Edge::End);

        if self.fail_on.contains(file.name()) {
            return Err(HashError::Unreadable {
                file: file.name().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            });
        }
        Ok(ContentDigest::new(DigestAlgorithm::Md5, vec![7u8; 16]))
    }
}

pub struct StubSigner {
    pub recorder: Arc<Recorder>,
    pub delays: Delays,
    pub fail_on: HashSet<String>,
    pub ensure_calls: AtomicUsize,
}

#[async_trait]
impl SignedUrlProvider for StubSigner {
    async fn ensure_destination_ready(&self) -> Result<(), ProvisionError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_url(&self, file_name: &str) -> Result<SignedUrl, SigningError> {
        self.recorder.record(file_name, Call::Sign, Edge::Start);
        self.delays.wait(file_name, Call::Sign).await;
        self.recorder.record(file_name, Call::Sign, Edge::End);

        if self.fail_on.contains(file_name) {
            return Err(SigningError::Rejected {
                key: file_name.to_string(),
                reason: "AccessDenied".into(),
            });
        }
        Ok(SignedUrl {
            url: format!("http://storage.test/test-uploads/{file_name}?X-Amz-Signature=sig"),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }
}

/// How the stub transport fails a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// Returns `Err(TransportError::Rejected)`
    Error,
    /// Returns an unsuccessful `PutOutcome`
    Unsuccessful,
}

pub struct StubTransport {
    pub recorder: Arc<Recorder>,
    pub delays: Delays,
    pub fail_on: HashSet<String>,
    pub failure: TransportFailure,
    pub requests: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl Transport for StubTransport {
    async fn put(&self, request: PutRequest<'_>) -> Result<PutOutcome, TransportError> {
        let file = request
            .url
            .rsplit('/')
            .next()
            .and_then(|tail| tail.split('?').next())
            .unwrap_or_default()
            .to_string();

        self.recorder.record(&file, Call::Put, Edge::Start);
        self.delays.wait(&file, Call::Put).await;
        self.recorder.record(&file, Call::Put, Edge::End);

        self.requests.lock().push((
            file.clone(),
            request.content_type.to_string(),
            request.digest_header.0.to_string(),
        ));

        if self.fail_on.contains(&file) {
            return match self.failure {
                TransportFailure::Error => Err(TransportError::Rejected {
                    status: 500,
                    status_text: "Internal Server Error".into(),
                }),
                TransportFailure::Unsuccessful => Ok(PutOutcome {
                    success: false,
                    status: 403,
                    status_text: "Forbidden".into(),
                    etag: None,
                }),
            };
        }
        Ok(PutOutcome::ok(200, "OK", Some(format!("\"etag-{file}\""))))
    }
}

/// Builder for an orchestrator wired to the stubs
#[derive(Default)]
pub struct Harness {
    pub delays: Delays,
    pub hash_fail: HashSet<String>,
    pub sign_fail: HashSet<String>,
    pub put_fail: HashSet<String>,
    pub put_failure: Option<TransportFailure>,
}

pub struct Wired {
    pub orchestrator: Orchestrator,
    pub recorder: Arc<Recorder>,
    pub signer: Arc<StubSigner>,
    pub transport: Arc<StubTransport>,
}

impl Harness {
    pub fn delays(mut self, delays: Delays) -> Self {
        self.delays = delays;
        self
    }

    pub fn fail_hash(mut self, file: &str) -> Self {
        self.hash_fail.insert(file.to_string());
        self
    }

    pub fn fail_sign(mut self, file: &str) -> Self {
        self.sign_fail.insert(file.to_string());
        self
    }

    pub fn fail_put(mut self, file: &str, failure: TransportFailure) -> Self {
        self.put_fail.insert(file.to_string());
        self.put_failure = Some(failure);
        self
    }

    pub fn build(self) -> Wired {
        let recorder = Arc::new(Recorder::default());
        let hasher = Arc::new(StubHasher {
            recorder: Arc::clone(&recorder),
            delays: self.delays.clone(),
            fail_on: self.hash_fail,
        });
        let signer = Arc::new(StubSigner {
            recorder: Arc::clone(&recorder),
            delays: self.delays.clone(),
            fail_on: self.sign_fail,
            ensure_calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(StubTransport {
            recorder: Arc::clone(&recorder),
            delays: self.delays,
            fail_on: self.put_fail,
            failure: self.put_failure.unwrap_or(TransportFailure::Error),
            requests: Mutex::new(Vec::new()),
        });

        let orchestrator = Orchestrator::new(
            hasher,
            Arc::clone(&signer) as Arc<dyn SignedUrlProvider>,
            Arc::clone(&transport) as Arc<dyn Transport>,
        );

        Wired {
            orchestrator,
            recorder,
            signer,
            transport,
        }
    }
}

pub fn files(names: &[&str]) -> Vec<UploadFile> {
    names
        .iter()
        .map(|name| UploadFile::from_bytes(*name, "text/plain", format!("content of {name}")))
        .collect()
}

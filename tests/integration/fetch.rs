//! Coordinator tests against an in-process retriever

use async_trait::async_trait;
use ferry::audit::AuditLog;
use ferry::descriptor::request_set;
use ferry::store::CommitOutcome;
use ferry::{
    Algorithm, ArtifactKind, ContentStore, Descriptor, Digest, FerryError, FerryResult,
    FetchCoordinator, FetchOptions, OriginKind, Outcome, Retriever, RetrieverRegistry,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn index_json(tag: &str) -> Vec<u8> {
    format!(
        r#"{{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","manifests":[],"annotations":{{"tag":"{}"}}}}"#,
        tag
    )
    .into_bytes()
}

fn docker_manifest_json() -> Vec<u8> {
    br#"{"schemaVersion":2,"mediaType":"application/vnd.docker.distribution.manifest.v2+json","config":{},"layers":[]}"#
        .to_vec()
}

/// Serves fixed manifest bytes by name, counting calls
#[derive(Default)]
struct FakeRetriever {
    manifests: HashMap<String, Vec<u8>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeRetriever {
    fn serving(entries: &[(&str, Vec<u8>)]) -> Self {
        Self {
            manifests: entries
                .iter()
                .map(|(n, b)| (n.to_string(), b.clone()))
                .collect(),
            ..Self::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    fn heal(&self, name: &str) {
        self.failing.lock().unwrap().remove(name);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(&self, descriptor: &Descriptor, dest: &Path) -> FerryResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = async {
            tokio::fs::create_dir_all(dest).await.unwrap();
            if self.failing.lock().unwrap().contains(descriptor.name()) {
                // Leave a partial download behind
                tokio::fs::write(dest.join("partial"), b"half").await.unwrap();
                return Err(FerryError::retrieval(descriptor.digest(), "connection reset"));
            }
            let bytes = self
                .manifests
                .get(descriptor.name())
                .cloned()
                .unwrap_or_default();
            tokio::fs::write(dest.join("manifest.json"), bytes).await.unwrap();
            Ok(())
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct Harness {
    _dir: TempDir,
    store: ContentStore,
    retriever: Arc<FakeRetriever>,
}

impl Harness {
    async fn new(retriever: FakeRetriever) -> Self {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::open(dir.path().join("store")).await.unwrap();
        Self {
            _dir: dir,
            store,
            retriever: Arc::new(retriever),
        }
    }

    fn coordinator(&self) -> FetchCoordinator {
        let registry =
            RetrieverRegistry::new().with(OriginKind::RemoteRegistry, self.retriever.clone());
        FetchCoordinator::new(self.store.clone(), registry)
    }

    fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.store.staging_dir())
            .unwrap()
            .next()
            .is_none()
    }
}

fn remote(digest: &Digest, name: &str) -> Descriptor {
    Descriptor::new(digest.clone(), OriginKind::RemoteRegistry, name)
}

fn sha256(bytes: &[u8]) -> Digest {
    Digest::of_bytes(Algorithm::Sha256, bytes)
}

#[tokio::test]
async fn fetches_then_serves_from_cache() {
    let bytes = index_json("v1");
    let digest = sha256(&bytes);
    let h = Harness::new(FakeRetriever::serving(&[("example/app", bytes)])).await;
    let coordinator = h.coordinator();

    let report = coordinator
        .fetch_all(request_set([remote(&digest, "example/app")]))
        .await
        .unwrap();
    assert!(matches!(
        report.outcome(&digest),
        Some(Outcome::Fetched(CommitOutcome::Committed))
    ));
    assert!(h.store.exists(&digest).await.unwrap());
    h.store.verify_entry(&digest).await.unwrap();

    // Second run retrieves nothing
    let report = coordinator
        .fetch_all(request_set([remote(&digest, "example/app")]))
        .await
        .unwrap();
    assert!(matches!(report.outcome(&digest), Some(Outcome::Cached)));
    assert_eq!(h.retriever.calls(), 1);
    assert!(h.staging_is_empty());
}

#[tokio::test]
async fn mismatched_content_is_never_committed() {
    let requested = sha256(b"what was asked for");
    let h = Harness::new(FakeRetriever::serving(&[("example/app", index_json("other"))])).await;

    let err = h
        .coordinator()
        .fetch_all(request_set([remote(&requested, "example/app")]))
        .await
        .unwrap_err();

    match err.root_cause() {
        FerryError::DigestMismatch { expected, .. } => {
            assert_eq!(expected.to_string(), requested.to_string())
        }
        other => panic!("expected digest mismatch, got {other}"),
    }
    assert!(!err.is_retryable());
    assert!(!h.store.exists(&requested).await.unwrap());
    assert!(h.staging_is_empty());
}

#[tokio::test]
async fn one_failure_does_not_sink_the_rest() {
    let good = index_json("good");
    let d1 = sha256(&good);
    let d2 = sha256(&index_json("bad"));
    let h = Harness::new(FakeRetriever::serving(&[
        ("example/good", good),
        ("example/bad", index_json("bad")),
    ]))
    .await;
    h.retriever.fail("example/bad");

    let report = h
        .coordinator()
        .fetch(request_set([
            remote(&d1, "example/good"),
            remote(&d2, "example/bad"),
        ]))
        .await;

    assert!(!report.is_success());
    assert!(matches!(report.outcome(&d1), Some(Outcome::Fetched(_))));
    assert!(matches!(report.outcome(&d2), Some(Outcome::Failed(_))));
    assert!(h.store.exists(&d1).await.unwrap());
    assert!(!h.store.exists(&d2).await.unwrap());
    assert!(h.staging_is_empty());
}

#[tokio::test]
async fn rerun_after_failure_fetches_only_what_is_missing() {
    let good = index_json("good");
    let flaky = index_json("flaky");
    let d1 = sha256(&good);
    let d2 = sha256(&flaky);
    let h = Harness::new(FakeRetriever::serving(&[
        ("example/good", good),
        ("example/flaky", flaky),
    ]))
    .await;
    let requests = || {
        request_set([
            remote(&d1, "example/good"),
            remote(&d2, "example/flaky"),
        ])
    };

    h.retriever.fail("example/flaky");
    let err = h.coordinator().fetch_all(requests()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.retriever.calls(), 2);

    h.retriever.heal("example/flaky");
    let report = h.coordinator().fetch_all(requests()).await.unwrap();
    assert_eq!(h.retriever.calls(), 3);
    assert!(matches!(report.outcome(&d1), Some(Outcome::Cached)));
    assert!(matches!(report.outcome(&d2), Some(Outcome::Fetched(_))));
}

#[tokio::test]
async fn wrong_shape_is_rejected() {
    let bytes = docker_manifest_json();
    let digest = sha256(&bytes);
    let h = Harness::new(FakeRetriever::serving(&[("example/app", bytes)])).await;

    // Requests default to an image index
    let err = h
        .coordinator()
        .fetch_all(request_set([remote(&digest, "example/app")]))
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), FerryError::Shape { .. }));
    assert!(!h.store.exists(&digest).await.unwrap());

    // Asking for a manifest accepts the same bytes
    h.coordinator()
        .fetch_all(request_set([
            remote(&digest, "example/app").with_kind(ArtifactKind::Manifest)
        ]))
        .await
        .unwrap();
    assert!(h.store.exists(&digest).await.unwrap());
}

#[tokio::test]
async fn slow_retrieval_times_out() {
    let bytes = index_json("slow");
    let digest = sha256(&bytes);
    let h = Harness::new(
        FakeRetriever::serving(&[("example/slow", bytes)]).with_delay(Duration::from_secs(30)),
    )
    .await;

    let err = h
        .coordinator()
        .with_options(FetchOptions::default().with_retrieval_timeout(Duration::from_millis(50)))
        .fetch_all(request_set([remote(&digest, "example/slow")]))
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), FerryError::Retrieval { .. }));
    assert!(err.to_string().contains("fetching"));
    assert!(!h.store.exists(&digest).await.unwrap());
    assert!(h.staging_is_empty());
}

#[tokio::test]
async fn unregistered_origin_fails_alone() {
    let bytes = index_json("remote");
    let d1 = sha256(&bytes);
    let d2 = sha256(b"local only");
    let h = Harness::new(FakeRetriever::serving(&[("example/app", bytes)])).await;

    let report = h
        .coordinator()
        .fetch(request_set([
            remote(&d1, "example/app"),
            Descriptor::new(d2.clone(), OriginKind::LocalStore, "example/local"),
        ]))
        .await;

    assert!(matches!(report.outcome(&d1), Some(Outcome::Fetched(_))));
    match report.outcome(&d2) {
        Some(Outcome::Failed(e)) => {
            assert!(matches!(e.root_cause(), FerryError::UnsupportedOrigin { .. }))
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn worker_limit_bounds_parallel_retrievals() {
    let entries: Vec<(String, Vec<u8>)> = (0..6)
        .map(|i| (format!("example/app{i}"), index_json(&i.to_string())))
        .collect();
    let borrowed: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|(n, b)| (n.as_str(), b.clone()))
        .collect();
    let h = Harness::new(
        FakeRetriever::serving(&borrowed).with_delay(Duration::from_millis(40)),
    )
    .await;

    let requests = request_set(
        entries
            .iter()
            .map(|(name, bytes)| remote(&sha256(bytes), name)),
    );

    let report = h
        .coordinator()
        .with_options(FetchOptions::default().with_workers(2))
        .fetch_all(requests)
        .await
        .unwrap();

    assert_eq!(report.fetched().len(), 6);
    assert_eq!(h.retriever.calls(), 6);
    assert!(h.retriever.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn overlapping_fetches_both_succeed() {
    let bytes = index_json("shared");
    let digest = sha256(&bytes);
    let h = Harness::new(
        FakeRetriever::serving(&[("example/shared", bytes)]).with_delay(Duration::from_millis(50)),
    )
    .await;
    let first = h.coordinator();
    let second = h.coordinator();

    // Readers only ever see a complete, verifiable entry
    let store = h.store.clone();
    let watched = digest.clone();
    let reader = tokio::spawn(async move {
        for _ in 0..40 {
            if store.exists(&watched).await.unwrap() {
                store.verify_entry(&watched).await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let (a, b) = tokio::join!(
        first.fetch_all(request_set([remote(&digest, "example/shared")])),
        second.fetch_all(request_set([remote(&digest, "example/shared")])),
    );
    a.unwrap();
    b.unwrap();
    reader.await.unwrap();

    // No coalescing across calls: at most one retrieval each
    let calls = h.retriever.calls();
    assert!((1..=2).contains(&calls));
    h.store.verify_entry(&digest).await.unwrap();
    assert_eq!(h.store.list().await.unwrap(), vec![digest]);
    assert!(h.staging_is_empty());
}

#[tokio::test]
async fn mismatch_is_audited() {
    let requested = sha256(b"expected");
    let h = Harness::new(FakeRetriever::serving(&[("example/app", index_json("x"))])).await;
    let audit_path = h.store.root().parent().unwrap().join("audit.log");

    let _ = h
        .coordinator()
        .with_audit(AuditLog::at(&audit_path))
        .fetch_all(request_set([remote(&requested, "example/app")]))
        .await;

    let log = std::fs::read_to_string(&audit_path).unwrap();
    assert!(log.contains("artifact.digest_mismatch"));
    assert!(log.contains(&requested.to_string()));
}

#[tokio::test]
async fn huge_worker_count_still_fetches() {
    let bytes = index_json("many-workers");
    let digest = sha256(&bytes);
    let h = Harness::new(FakeRetriever::serving(&[("example/app", bytes)])).await;

    let coordinator = h
        .coordinator()
        .with_options(FetchOptions::default().with_workers(usize::MAX));
    assert_eq!(coordinator.options().workers(), ferry::fetch::MAX_WORKERS);

    coordinator
        .fetch_all(request_set([remote(&digest, "example/app")]))
        .await
        .unwrap();
    assert!(h.store.exists(&digest).await.unwrap());
}

#[tokio::test]
async fn abandoned_staging_is_swept_on_next_fetch() {
    let bytes = index_json("after-crash");
    let digest = sha256(&bytes);
    let h = Harness::new(FakeRetriever::serving(&[("example/app", bytes)])).await;

    // What a killed run leaves behind
    let abandoned = h.store.staging_dir().join("stage-killed");
    std::fs::create_dir_all(abandoned.join("artifact")).unwrap();
    std::fs::write(abandoned.join("artifact").join("partial"), b"half").unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;

    h.coordinator()
        .with_options(FetchOptions::default().with_retrieval_timeout(Duration::from_millis(200)))
        .fetch_all(request_set([remote(&digest, "example/app")]))
        .await
        .unwrap();

    assert!(!abandoned.exists());
    assert!(h.staging_is_empty());
    assert!(h.store.exists(&digest).await.unwrap());
}

//! End-to-end behaviour of the index manager over real on-disk indexes.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use artidex::remote::{DefaultFetcherFactory, FetcherFactory, HttpSettings, ResourceFetcher};
use artidex::{
    ArtifactIndex, ArtifactKey, ArtifactRecord, ClassifierMask, FindQuery, IndexDetailLevel, IndexError,
    IndexListener, IndexManager, IndexPacker, IndexedArtifact, ManagerConfig, RepositoryDescriptor,
    RepositoryScope, SearchExpression, SearchType, UpdateOutcome,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn manager(dir: &Path) -> Arc<IndexManager> {
    Arc::new(IndexManager::new(ManagerConfig::new(dir.join("indexes"))).unwrap())
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn local_repo(uid: &str) -> RepositoryDescriptor {
    RepositoryDescriptor::remote(uid, "file:///unused").with_scope(RepositoryScope::Local)
}

fn remote_record(group: &str, artifact: &str, version: &str, sha1: &str) -> ArtifactRecord {
    let mut record = ArtifactRecord::new(&ArtifactKey::new(group, artifact, version), "jar", "jar");
    record.file_name = format!("{}-{}.jar", artifact, version);
    record.sha1 = Some(sha1.to_string());
    record
}

/// Identity, versions and file names, for comparing result sets
fn summary(artifacts: &[IndexedArtifact]) -> Vec<(String, String, Vec<String>)> {
    artifacts
        .iter()
        .map(|a| (a.group_id.clone(), a.artifact_id.clone(), a.versions()))
        .collect()
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[test]
fn test_added_artifact_is_found() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());
    manager.repository_added(local_repo("repo1")).unwrap();

    let jar = write_file(tmp.path(), "lib-1.0.jar", b"library bytes");
    manager
        .add_artifact("repo1", &jar, &ArtifactKey::new("com.acme", "lib", "1.0"))
        .unwrap();

    let found = manager
        .find("repo1", Some(SearchExpression::exact("com.acme")), Some(SearchExpression::exact("lib")), None, None)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].versions(), vec!["1.0"]);
}

#[test]
fn test_versions_newest_first() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());
    manager.repository_added(local_repo("repo1")).unwrap();

    let old = write_file(tmp.path(), "lib-1.0.jar", b"one");
    let snapshot = write_file(tmp.path(), "lib-2.0-SNAPSHOT.jar", b"two");
    manager
        .add_artifacts(
            "repo1",
            &[
                (ArtifactKey::new("com.acme", "lib", "1.0"), old),
                (ArtifactKey::new("com.acme", "lib", "2.0-SNAPSHOT"), snapshot),
            ],
        )
        .unwrap();

    let found = manager
        .find("repo1", Some(SearchExpression::exact("com.acme")), Some(SearchExpression::exact("lib")), None, None)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].versions(), vec!["2.0-SNAPSHOT", "1.0"]);
}

#[test]
fn test_repeated_version_expressions_match_any() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());
    manager.repository_added(local_repo("repo1")).unwrap();

    let artifacts: Vec<(ArtifactKey, PathBuf)> = ["1.0", "1.5", "2.0-SNAPSHOT"]
        .iter()
        .map(|v| {
            let jar = write_file(tmp.path(), &format!("lib-{}.jar", v), v.as_bytes());
            (ArtifactKey::new("com.acme", "lib", *v), jar)
        })
        .collect();
    manager.add_artifacts("repo1", &artifacts).unwrap();

    let query = FindQuery::new()
        .group(SearchExpression::exact("com.acme"))
        .version(SearchExpression::exact("2.0-SNAPSHOT"))
        .version(SearchExpression::exact("1.0"));
    let found = manager.find_all("repo1", &query).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].versions(), vec!["2.0-SNAPSHOT", "1.0"]);
}

#[test]
fn test_sha1_full_checksum_is_exact_prefix_is_partial() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());
    let repo = RepositoryDescriptor::remote("central", "file:///unused");
    let ctx = manager
        .get_or_create_context(&repo, IndexDetailLevel::Min)
        .unwrap()
        .unwrap();

    let sha1 = "0123456789abcdef0123456789abcdef01234567";
    let sibling = "0123456789ffffffffffffffffffffffffffffff";
    let a = remote_record("com.acme", "a", "1.0", sha1);
    let b = remote_record("com.acme", "b", "1.0", sibling);
    ctx.apply([&a, &b]).unwrap();

    let exact = manager
        .search("central", sha1, SearchType::Sha1, ClassifierMask::NONE)
        .unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact.keys().collect::<Vec<_>>(), vec!["::com.acme:a"]);

    let prefix = manager
        .search("central", &sha1[..10], SearchType::Sha1, ClassifierMask::NONE)
        .unwrap();
    assert_eq!(prefix.len(), 2);
}

#[test]
fn test_composite_merges_files_across_repositories() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());
    manager.repository_added(local_repo("first")).unwrap();
    manager.repository_added(local_repo("second")).unwrap();

    let one = write_file(tmp.path(), "lib-1.0.jar", b"one");
    let two = write_file(tmp.path(), "lib-2.0.jar", b"two");
    manager
        .add_artifact("first", &one, &ArtifactKey::new("com.acme", "lib", "1.0"))
        .unwrap();
    manager
        .add_artifact("second", &two, &ArtifactKey::new("com.acme", "lib", "2.0"))
        .unwrap();

    let composite = manager.composite(&["first", "second"]).unwrap();
    let found = composite
        .find(&FindQuery::new().group(SearchExpression::exact("com.acme")))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].versions(), vec!["2.0", "1.0"]);

    let identified = composite.identify(&two).unwrap().unwrap();
    assert_eq!(identified.version, "2.0");
}

#[test]
fn test_get_or_create_context_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());
    let repo = RepositoryDescriptor::remote("central", "file:///unused");

    let first = manager.get_or_create_context(&repo, IndexDetailLevel::Min).unwrap().unwrap();
    let second = manager.get_or_create_context(&repo, IndexDetailLevel::Min).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(manager.repositories().len(), 1);
}

#[test]
fn test_concurrent_reads_see_whole_batches() {
    const BATCH: usize = 5;
    const BATCHES: usize = 8;

    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());
    manager.repository_added(local_repo("stress")).unwrap();
    let missing = tmp.path().join("not-on-disk.jar");

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            for batch in 0..BATCHES {
                let artifacts: Vec<(ArtifactKey, PathBuf)> = (0..BATCH)
                    .map(|i| {
                        let key = ArtifactKey::new("com.stress", format!("lib-{}-{}", batch, i), "1.0");
                        (key, missing.clone())
                    })
                    .collect();
                assert_eq!(manager.add_artifacts("stress", &artifacts).unwrap(), BATCH);
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for _ in 0..50 {
                    let count = manager.find_all("stress", &FindQuery::new()).unwrap().len();
                    assert_eq!(count % BATCH, 0, "saw a partial batch: {}", count);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(manager.find_all("stress", &FindQuery::new()).unwrap().len(), BATCH * BATCHES);
}

#[test]
fn test_incremental_update_matches_full_rebuild() {
    let tmp = TempDir::new().unwrap();
    let remote_dir = tmp.path().join("remote");
    let packer = IndexPacker::new(&remote_dir).with_index_id("central");

    let v1 = vec![
        remote_record("com.acme", "core", "1.0", "1111111111111111111111111111111111111111"),
        remote_record("com.acme", "util", "1.0", "2222222222222222222222222222222222222222"),
    ];
    packer.publish_snapshot(&v1).unwrap().unwrap();

    let incremental_side = tmp.path().join("a");
    let manager_a = manager(&incremental_side);
    manager_a
        .repository_added(RepositoryDescriptor::remote("central", file_url(&remote_dir)))
        .unwrap();
    let cancel = CancellationToken::new();
    assert_eq!(manager_a.update_index("central", false, &cancel).unwrap(), UpdateOutcome::Full);
    assert_eq!(manager_a.find_all("central", &FindQuery::new()).unwrap().len(), 2);

    let v2 = vec![
        remote_record("com.acme", "core", "1.0", "1111111111111111111111111111111111111111"),
        remote_record("com.acme", "core", "1.1", "3333333333333333333333333333333333333333"),
        remote_record("com.acme", "extra", "0.9", "4444444444444444444444444444444444444444"),
    ];
    let props = packer.publish_snapshot(&v2).unwrap().unwrap();
    assert_eq!(props.last_incremental, 1);

    assert_eq!(
        manager_a.update_index("central", false, &cancel).unwrap(),
        UpdateOutcome::Incremental
    );
    assert_eq!(manager_a.update_index("central", false, &cancel).unwrap(), UpdateOutcome::UpToDate);

    let full_side = tmp.path().join("b");
    let manager_b = manager(&full_side);
    manager_b
        .repository_added(RepositoryDescriptor::remote("central", file_url(&remote_dir)))
        .unwrap();
    assert_eq!(manager_b.update_index("central", false, &cancel).unwrap(), UpdateOutcome::Full);

    let incremental = manager_a.find_all("central", &FindQuery::new()).unwrap();
    let full = manager_b.find_all("central", &FindQuery::new()).unwrap();
    assert_eq!(summary(&incremental), summary(&full));
    assert_eq!(
        summary(&full),
        vec![
            ("com.acme".to_string(), "core".to_string(), vec!["1.1".to_string(), "1.0".to_string()]),
            ("com.acme".to_string(), "extra".to_string(), vec!["0.9".to_string()]),
        ]
    );
}

#[test]
fn test_forced_full_after_incremental_uses_current_snapshot() {
    let tmp = TempDir::new().unwrap();
    let remote_dir = tmp.path().join("remote");
    let packer = IndexPacker::new(&remote_dir).with_index_id("central");
    let v1 = remote_record("com.acme", "core", "1.0", "1111111111111111111111111111111111111111");
    packer.publish_snapshot(&[v1.clone()]).unwrap().unwrap();

    let manager = manager(tmp.path());
    manager
        .repository_added(RepositoryDescriptor::remote("central", file_url(&remote_dir)))
        .unwrap();
    let cancel = CancellationToken::new();
    assert_eq!(manager.update_index("central", false, &cancel).unwrap(), UpdateOutcome::Full);

    let v2 = remote_record("com.acme", "core", "2.0", "2222222222222222222222222222222222222222");
    packer.publish_snapshot(&[v1, v2]).unwrap().unwrap();
    assert_eq!(
        manager.update_index("central", false, &cancel).unwrap(),
        UpdateOutcome::Incremental
    );
    let versions = |m: &IndexManager| m.find_all("central", &FindQuery::new()).unwrap()[0].versions();
    assert_eq!(versions(&manager), vec!["2.0", "1.0"]);

    assert_eq!(manager.update_index("central", true, &cancel).unwrap(), UpdateOutcome::Full);
    assert_eq!(versions(&manager), vec!["2.0", "1.0"]);
    assert_eq!(manager.update_index("central", false, &cancel).unwrap(), UpdateOutcome::UpToDate);
}

/// Cancels the caller's token once an index chunk starts downloading
struct TrippingFetcher {
    inner: Box<dyn ResourceFetcher>,
    armed: Arc<AtomicBool>,
    trip: CancellationToken,
}

impl ResourceFetcher for TrippingFetcher {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn fetch(&self, name: &str, dest: &mut dyn Write, cancel: &CancellationToken) -> artidex::Result<u64> {
        if self.armed.load(Ordering::SeqCst) && name.ends_with(".gz") {
            dest.write_all(b"partial")?;
            self.trip.cancel();
        }
        self.inner.fetch(name, dest, cancel)
    }
}

struct TrippingFactory {
    inner: DefaultFetcherFactory,
    armed: Arc<AtomicBool>,
    trip: CancellationToken,
}

impl FetcherFactory for TrippingFactory {
    fn create(&self, repository: &RepositoryDescriptor) -> artidex::Result<Box<dyn ResourceFetcher>> {
        Ok(Box::new(TrippingFetcher {
            inner: self.inner.create(repository)?,
            armed: Arc::clone(&self.armed),
            trip: self.trip.clone(),
        }))
    }
}

fn dir_contents(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file() && !p.to_string_lossy().ends_with(".lock"))
        .map(|p| (p.file_name().unwrap().to_string_lossy().to_string(), fs::read(&p).unwrap()))
        .collect()
}

#[test]
fn test_cancelled_transfer_leaves_live_index_untouched() {
    let tmp = TempDir::new().unwrap();
    let remote_dir = tmp.path().join("remote");
    let packer = IndexPacker::new(&remote_dir);
    packer
        .publish_snapshot(&[remote_record("com.acme", "core", "1.0", "1111111111111111111111111111111111111111")])
        .unwrap();

    let armed = Arc::new(AtomicBool::new(false));
    let trip = CancellationToken::new();
    let factory = TrippingFactory {
        inner: DefaultFetcherFactory::new(HttpSettings::default()),
        armed: Arc::clone(&armed),
        trip: trip.clone(),
    };
    let manager = Arc::new(
        IndexManager::new(ManagerConfig::new(tmp.path().join("indexes")))
            .unwrap()
            .with_fetcher_factory(factory),
    );
    manager
        .repository_added(RepositoryDescriptor::remote("central", file_url(&remote_dir)))
        .unwrap();
    assert_eq!(
        manager.update_index("central", false, &CancellationToken::new()).unwrap(),
        UpdateOutcome::Full
    );

    packer
        .publish_snapshot(&[
            remote_record("com.acme", "core", "1.0", "1111111111111111111111111111111111111111"),
            remote_record("com.acme", "core", "2.0", "5555555555555555555555555555555555555555"),
        ])
        .unwrap();

    let live_dir = manager.context_dir("central");
    let before = dir_contents(&live_dir);
    armed.store(true, Ordering::SeqCst);

    let err = manager.update_index("central", false, &trip).unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));
    assert_eq!(dir_contents(&live_dir), before);

    let found = manager.find_all("central", &FindQuery::new()).unwrap();
    assert_eq!(found[0].versions(), vec!["1.0"]);
}

#[test]
fn test_queue_collects_per_repository_failures() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());

    let local_dir = tmp.path().join("m2");
    fs::create_dir_all(local_dir.join("com/acme/lib/1.0")).unwrap();
    write_file(&local_dir.join("com/acme/lib/1.0"), "lib-1.0.jar", b"jar");
    manager.repository_added(RepositoryDescriptor::local(&local_dir)).unwrap();
    manager
        .repository_added(RepositoryDescriptor::remote("broken", file_url(&tmp.path().join("missing"))))
        .unwrap();

    assert_eq!(manager.schedule_all(false).unwrap(), 2);
    let status = manager.wait_for_updates();

    assert_eq!(status.completed, 1);
    assert_eq!(status.failures.len(), 1);
    assert_eq!(status.failures[0].0, "broken");
    assert!(status.failures[0].1.is_transient());
    assert!(!status.cancelled);

    let found = manager.find_all("local", &FindQuery::new()).unwrap();
    assert_eq!(found.len(), 1);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, event: &str, repository: &RepositoryDescriptor) {
        self.events.lock().unwrap().push(format!("{}:{}", event, repository.uid));
    }
}

impl IndexListener for Recorder {
    fn index_added(&self, repository: &RepositoryDescriptor) {
        self.push("added", repository);
    }

    fn index_removed(&self, repository: &RepositoryDescriptor) {
        self.push("removed", repository);
    }

    fn index_updating(&self, repository: &RepositoryDescriptor) {
        self.push("updating", repository);
    }

    fn index_changed(&self, repository: &RepositoryDescriptor) {
        self.push("changed", repository);
    }
}

#[test]
fn test_listener_sees_lifecycle_in_order() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(tmp.path());
    let recorder = Arc::new(Recorder::default());
    assert!(manager.add_listener(recorder.clone()));

    let local_dir = tmp.path().join("m2");
    fs::create_dir_all(&local_dir).unwrap();
    manager.repository_added(RepositoryDescriptor::local(&local_dir)).unwrap();

    let jar = write_file(tmp.path(), "lib-1.0.jar", b"jar");
    manager
        .add_artifact("local", &jar, &ArtifactKey::new("com.acme", "lib", "1.0"))
        .unwrap();
    manager
        .update_index("local", false, &CancellationToken::new())
        .unwrap();
    manager.repository_removed("local", true).unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["added:local", "changed:local", "updating:local", "changed:local", "removed:local"]
    );
}

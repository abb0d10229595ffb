mod common;

use std::sync::Arc;

use common::{MemoryFs, Op, RecordingListener, assert_monotonic, loc};
use fmkit_core::{LocalFs, Location};
use fmkit_monitor::{ChangeKind, MonitorConfig, MonitorRegistry};
use fmkit_ops::{DeleteJob, JobListener, JobOutcome, ProgressUnit, start_delete};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// file1.txt (100), dir1/file2.txt (250), dir1/subdir/file3.txt (1).
fn tree() -> Arc<MemoryFs> {
    let fs = MemoryFs::new();
    fs.add_dir("/root", 0o755)
        .add_file("/root/file1.txt", 100, 0o644)
        .add_dir("/root/dir1", 0o755)
        .add_file("/root/dir1/file2.txt", 250, 0o644)
        .add_dir("/root/dir1/subdir", 0o755)
        .add_file("/root/dir1/subdir/file3.txt", 1, 0o644);
    Arc::new(fs)
}

fn registry() -> MonitorRegistry {
    MonitorRegistry::new(MonitorConfig::default())
}

fn deleted(path: &str) -> Op {
    Op::Delete(path.to_string())
}

#[test]
fn test_delete_accounts_bytes_children_first() {
    let fs = tree();
    let job = DeleteJob::new(fs.clone(), registry(), vec![loc("/root")]);
    let mut listener = RecordingListener::default();
    let summary = job.run(&mut listener);

    assert_eq!(summary.outcome, JobOutcome::Finished);
    assert_eq!(summary.unit, ProgressUnit::Bytes);
    assert_eq!(summary.total, 351);
    assert_eq!(summary.finished, 351);
    assert_eq!(summary.errors, 0);
    assert_monotonic(&listener.percents);
    assert_eq!(listener.percents.last(), Some(&1.0));

    assert_eq!(
        fs.log(),
        vec![
            deleted("/root/file1.txt"),
            deleted("/root/dir1/file2.txt"),
            deleted("/root/dir1/subdir/file3.txt"),
            deleted("/root/dir1/subdir"),
            deleted("/root/dir1"),
            deleted("/root"),
        ]
    );
    assert!(!fs.exists("/root"));
}

#[test]
fn test_deleted_events_go_to_the_parent_monitor() {
    let fs = tree();
    let registry = registry();
    let top = registry.directory_watch(&loc("/")).unwrap();
    let root = registry.directory_watch(&loc("/root")).unwrap();
    let mut top_rx = top.subscribe();
    let mut root_rx = root.subscribe();

    DeleteJob::new(fs, registry.clone(), vec![loc("/root")]).run(&mut RecordingListener::default());

    let mut top_events = Vec::new();
    while let Ok(event) = top_rx.try_recv() {
        top_events.push((event.kind, event.location));
    }
    assert_eq!(top_events, vec![(ChangeKind::Deleted, loc("/root"))]);

    let mut root_events = Vec::new();
    while let Ok(event) = root_rx.try_recv() {
        root_events.push((event.kind, event.location));
    }
    assert_eq!(
        root_events,
        vec![
            (ChangeKind::Deleted, loc("/root/file1.txt")),
            (ChangeKind::Deleted, loc("/root/dir1")),
        ]
    );
}

#[test]
fn test_empty_files_still_reach_full_progress() {
    let fs = MemoryFs::new();
    fs.add_dir("/empty", 0o755)
        .add_file("/empty/a", 0, 0o644)
        .add_file("/empty/b", 0, 0o644);
    let fs = Arc::new(fs);

    let job = DeleteJob::new(fs.clone(), registry(), vec![loc("/empty")]);
    let mut listener = RecordingListener::default();
    let summary = job.run(&mut listener);

    assert!(summary.is_success());
    assert_eq!(summary.total, 0);
    assert_monotonic(&listener.percents);
    assert_eq!(listener.percents.last(), Some(&1.0));
    assert_eq!(listener.percents.iter().filter(|&&p| p == 1.0).count(), 1);
    assert!(!fs.exists("/empty"));
}

#[test]
fn test_enumeration_failure_is_surfaced() {
    let fs = tree();
    fs.fail_read_dir("/root/dir1");
    let job = DeleteJob::new(fs.clone(), registry(), vec![loc("/root")]);
    let mut listener = RecordingListener::default();
    let summary = job.run(&mut listener);

    assert_eq!(summary.outcome, JobOutcome::Stopped);
    assert!(!summary.cancelled);
    assert_eq!(summary.total, 100);
    assert_eq!(summary.finished, 100);
    // The listing error, then the two directories that could not be emptied.
    assert_eq!(
        listener.errors,
        vec![
            ("/root/dir1".to_string(), false),
            ("/root/dir1".to_string(), false),
            ("/root".to_string(), false),
        ]
    );
    assert_eq!(fs.log(), vec![deleted("/root/file1.txt")]);
    assert!(fs.exists("/root/dir1/file2.txt"));
}

#[test]
fn test_child_failure_does_not_stop_siblings() {
    let fs = tree();
    fs.fail_delete("/root/file1.txt");
    let job = DeleteJob::new(fs.clone(), registry(), vec![loc("/root")]);
    let mut listener = RecordingListener::default();
    let summary = job.run(&mut listener);

    assert_eq!(summary.outcome, JobOutcome::Stopped);
    assert!(!fs.exists("/root/dir1"));
    assert!(fs.exists("/root/file1.txt"));
    assert_eq!(listener.errors.len(), 2);
}

#[test]
fn test_root_query_failure_is_fatal() {
    let fs = tree();
    fs.fail_query("/root");
    let job = DeleteJob::new(fs.clone(), registry(), vec![loc("/root"), loc("/root/file1.txt")]);
    let mut listener = RecordingListener::default();
    let summary = job.run(&mut listener);

    assert_eq!(summary.outcome, JobOutcome::Stopped);
    assert_eq!(listener.errors, vec![("/root".to_string(), true)]);
    assert!(fs.log().is_empty());
}

struct CancelAfter {
    token: CancellationToken,
    after: usize,
    seen: usize,
}

impl JobListener for CancelAfter {
    fn percent(&mut self, _ratio: f64) {
        self.seen += 1;
        if self.seen == self.after {
            self.token.cancel();
        }
    }
}

#[test]
fn test_cancel_after_two_of_five_roots() {
    let fs = MemoryFs::new();
    let roots: Vec<Location> = (1..=5)
        .map(|i| {
            let path = format!("/f{}", i);
            fs.add_file(&path, 10 * i, 0o644);
            loc(&path)
        })
        .collect();
    let fs = Arc::new(fs);

    let job = DeleteJob::new(fs.clone(), registry(), roots);
    let mut listener = CancelAfter {
        token: job.cancellation_token(),
        after: 2,
        seen: 0,
    };
    let summary = job.run(&mut listener);

    // The second root is cancelled right after it is accounted, before
    // its delete call.
    assert_eq!(summary.outcome, JobOutcome::Stopped);
    assert!(summary.cancelled);
    assert_eq!(summary.total, 150);
    assert_eq!(summary.finished, 30);
    assert_eq!(summary.errors, 0);
    assert_eq!(fs.log(), vec![deleted("/f1")]);
    assert!(fs.exists("/f2"));
}

fn local_tree(temp: &TempDir) -> std::path::PathBuf {
    let root = temp.path().join("root");
    std::fs::create_dir_all(root.join("dir1/subdir")).unwrap();
    std::fs::write(root.join("file1.txt"), vec![0u8; 100]).unwrap();
    std::fs::write(root.join("dir1/file2.txt"), vec![0u8; 250]).unwrap();
    std::fs::write(root.join("dir1/subdir/file3.txt"), vec![0u8; 1]).unwrap();
    root
}

#[test]
fn test_delete_local_tree() {
    let temp = TempDir::new().unwrap();
    let root = local_tree(&temp);

    let job = DeleteJob::new(Arc::new(LocalFs::new()), registry(), vec![Location::from_path(&root)]);
    let summary = job.run(&mut RecordingListener::default());

    assert!(summary.is_success());
    assert_eq!(summary.total, 351);
    assert_eq!(summary.finished, 351);
    assert!(!root.exists());
}

#[tokio::test]
async fn test_start_delete_completes() {
    let temp = TempDir::new().unwrap();
    let root = local_tree(&temp);

    let handle = start_delete(Arc::new(LocalFs::new()), registry(), vec![Location::from_path(&root)]);
    let summary = handle.wait().await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.finished, 351);
    assert!(!root.exists());
}

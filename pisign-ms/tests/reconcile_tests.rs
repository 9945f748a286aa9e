//! Integration tests for media reconciliation
//!
//! Tests the full pass (diff → download → delete → publish) against a temp
//! media directory and an in-memory asset source:
//! - Idempotence: an unchanged manifest causes no downloads, deletions or writes
//! - Convergence: transient per-file failures are retried on later passes
//! - Playlist content and atomic publication
//! - Per-file deletion failures and manifest names that are not assets

mod helpers;

use helpers::FakeAssetSource;
use pisign_ms::manifest::parse_manifest;
use pisign_ms::playlist::{self, PlaylistPublisher};
use pisign_ms::reconcile::scan_media_dir;
use pisign_ms::{HttpAssetSource, MediaItem, ReconcileOutcome, Reconciler, TargetSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn reconciler(media_dir: &Path, source: FakeAssetSource) -> Reconciler<FakeAssetSource> {
    Reconciler::new(
        media_dir,
        source,
        PlaylistPublisher::new(media_dir.join("playlist.m3u")),
    )
}

fn target(paths: &[&str]) -> TargetSet {
    let items: Vec<MediaItem> = paths.iter().map(|p| MediaItem::new(*p)).collect();
    TargetSet::from_items(&items)
}

fn names(dir: &Path) -> Vec<String> {
    scan_media_dir(dir).unwrap().into_iter().collect()
}

#[tokio::test]
async fn test_first_pass_downloads_and_publishes() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().join("media");
    let source = FakeAssetSource::new()
        .with_asset("campaigns/a.mp4", b"aaaa")
        .with_asset("campaigns/b.jpg", b"bb");
    let reconciler = reconciler(&media, source);

    let outcome = reconciler
        .reconcile(&target(&["campaigns/a.mp4", "campaigns/b.jpg"]))
        .await
        .unwrap();

    match outcome {
        ReconcileOutcome::Updated(report) => {
            assert_eq!(report.downloaded.len(), 2);
            assert!(report.is_complete());
        }
        other => panic!("expected Updated, got {:?}", other),
    }
    assert_eq!(fs::read(media.join("a.mp4")).unwrap(), b"aaaa");
    assert_eq!(names(&media), vec!["a.mp4", "b.jpg"]);
    assert!(media.join("playlist.m3u").exists());
}

#[tokio::test]
async fn test_second_pass_with_same_manifest_is_noop() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    let source = FakeAssetSource::new().with_asset("campaigns/a.mp4", b"aaaa");
    let reconciler = reconciler(&media, source);
    let wanted = target(&["campaigns/a.mp4"]);

    reconciler.reconcile(&wanted).await.unwrap();
    let playlist_path = media.join("playlist.m3u");
    let first_modified = fs::metadata(&playlist_path).unwrap().modified().unwrap();
    reconciler.source().clear_calls();

    let outcome = reconciler.reconcile(&wanted).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert!(reconciler.source().calls().is_empty());
    assert_eq!(
        fs::metadata(&playlist_path).unwrap().modified().unwrap(),
        first_modified
    );
}

#[tokio::test]
async fn test_unused_files_are_removed_and_reserved_files_kept() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    fs::write(media.join("old.mp4"), b"old").unwrap();
    fs::write(media.join("schedule.json"), b"[]").unwrap();
    fs::write(media.join(".power_state"), b"on").unwrap();
    let source = FakeAssetSource::new().with_asset("campaigns/new.mp4", b"new");
    let reconciler = reconciler(&media, source);

    let outcome = reconciler
        .reconcile(&target(&["campaigns/new.mp4"]))
        .await
        .unwrap();

    match outcome {
        ReconcileOutcome::Updated(report) => {
            assert_eq!(report.removed, vec!["old.mp4".to_string()]);
            assert_eq!(report.downloaded, vec!["new.mp4".to_string()]);
        }
        other => panic!("expected Updated, got {:?}", other),
    }
    assert!(!media.join("old.mp4").exists());
    assert!(media.join("schedule.json").exists());
    assert!(media.join(".power_state").exists());
}

#[tokio::test]
async fn test_empty_manifest_clears_media_and_leaves_header_only_playlist() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    fs::write(media.join("a.mp4"), b"a").unwrap();
    fs::write(media.join("b.mp4"), b"b").unwrap();
    let reconciler = reconciler(&media, FakeAssetSource::new());

    reconciler.reconcile(&TargetSet::default()).await.unwrap();

    assert!(names(&media).is_empty());
    assert_eq!(
        fs::read_to_string(media.join("playlist.m3u")).unwrap(),
        "#EXTM3U\n"
    );
}

#[tokio::test]
async fn test_failed_download_is_skipped_and_retried_next_pass() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    let source = FakeAssetSource::new()
        .with_asset("c/a.mp4", b"a")
        .with_asset("c/b.mp4", b"b")
        .failing("c/b.mp4", 1);
    let reconciler = reconciler(&media, source);
    let wanted = target(&["c/a.mp4", "c/b.mp4"]);

    let first = reconciler.reconcile(&wanted).await.unwrap();
    match first {
        ReconcileOutcome::Updated(report) => {
            assert_eq!(report.downloaded, vec!["a.mp4".to_string()]);
            assert_eq!(report.failed_downloads, vec!["b.mp4".to_string()]);
        }
        other => panic!("expected Updated, got {:?}", other),
    }
    assert_eq!(names(&media), vec!["a.mp4"]);
    reconciler.source().clear_calls();

    let second = reconciler.reconcile(&wanted).await.unwrap();

    // Only the still-missing asset is requested again
    assert_eq!(reconciler.source().calls(), vec!["c/b.mp4".to_string()]);
    assert!(matches!(second, ReconcileOutcome::Updated(ref r) if r.is_complete()));
    assert_eq!(names(&media), vec!["a.mp4", "b.mp4"]);

    let third = reconciler.reconcile(&wanted).await.unwrap();
    assert_eq!(third, ReconcileOutcome::Unchanged);
}

#[tokio::test]
async fn test_converges_within_one_pass_per_transient_failure() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    fs::write(media.join("stale.mp4"), b"x").unwrap();
    let source = FakeAssetSource::new()
        .with_asset("a.mp4", b"a")
        .with_asset("b.mp4", b"b")
        .with_asset("c.mp4", b"c")
        .failing("a.mp4", 2)
        .failing("c.mp4", 1);
    let reconciler = reconciler(&media, source);
    let wanted = target(&["a.mp4", "b.mp4", "c.mp4"]);

    // 3 transient failures in total → at most 1 + 3 passes to converge
    let mut passes = 0;
    loop {
        passes += 1;
        let outcome = reconciler.reconcile(&wanted).await.unwrap();
        if outcome == ReconcileOutcome::Unchanged {
            break;
        }
        assert!(passes <= 4, "did not converge");
    }

    assert_eq!(names(&media), vec!["a.mp4", "b.mp4", "c.mp4"]);
}

#[tokio::test]
async fn test_playlist_contains_only_manifest_entries() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    fs::write(media.join("leftover.mp4"), b"x").unwrap();
    let source = FakeAssetSource::new().with_asset("campaigns/a.mp4", b"a");
    let reconciler = reconciler(&media, source);
    let items = parse_manifest(br#"[{"media_file":"campaigns/a.mp4"}]"#).unwrap();

    reconciler
        .reconcile(&TargetSet::from_items(&items))
        .await
        .unwrap();

    let document = fs::read_to_string(media.join("playlist.m3u")).unwrap();
    assert_eq!(playlist::entries(&document), vec![media.join("a.mp4")]);
    assert!(document.contains("server-url=\"campaigns/a.mp4\""));
    assert!(!document.contains("leftover.mp4"));
}

#[tokio::test]
async fn test_reordered_manifest_refreshes_playlist_only() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    let source = FakeAssetSource::new()
        .with_asset("a.mp4", b"a")
        .with_asset("b.mp4", b"b");
    let reconciler = reconciler(&media, source);

    reconciler.reconcile(&target(&["a.mp4", "b.mp4"])).await.unwrap();
    reconciler.source().clear_calls();

    let outcome = reconciler.reconcile(&target(&["b.mp4", "a.mp4"])).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::PlaylistRefreshed);
    assert!(reconciler.source().calls().is_empty());
    let document = fs::read_to_string(media.join("playlist.m3u")).unwrap();
    assert_eq!(
        playlist::entries(&document),
        vec![media.join("b.mp4"), media.join("a.mp4")]
    );
}

#[tokio::test]
async fn test_missing_playlist_is_republished() {
    let dir = TempDir::new().unwrap();
    let media: PathBuf = dir.path().to_path_buf();
    fs::write(media.join("a.mp4"), b"a").unwrap();
    let reconciler = reconciler(&media, FakeAssetSource::new());

    let outcome = reconciler.reconcile(&target(&["a.mp4"])).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::PlaylistRefreshed);
    assert!(media.join("playlist.m3u").exists());
}

#[tokio::test]
async fn test_reserved_and_hidden_manifest_names_are_not_downloaded() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    fs::write(media.join("schedule.json"), b"[]").unwrap();
    let source = FakeAssetSource::new()
        .with_asset("campaigns/.intro.mp4", b"VIDEO BYTES")
        .with_asset("campaigns/schedule.json", b"VIDEO BYTES")
        .with_asset("campaigns/a.mp4", b"a");
    let reconciler = reconciler(&media, source);
    let wanted = target(&[
        "campaigns/.intro.mp4",
        "campaigns/schedule.json",
        "campaigns/a.mp4",
    ]);

    reconciler.reconcile(&wanted).await.unwrap();
    assert_eq!(reconciler.source().calls(), vec!["campaigns/a.mp4".to_string()]);
    reconciler.source().clear_calls();

    let second = reconciler.reconcile(&wanted).await.unwrap();

    assert_eq!(second, ReconcileOutcome::Unchanged);
    assert!(reconciler.source().calls().is_empty());
    assert_eq!(fs::read(media.join("schedule.json")).unwrap(), b"[]");
    assert!(!media.join(".intro.mp4").exists());
}

fn remove_unless_locked(path: &Path) -> std::io::Result<()> {
    if path.file_name().and_then(|n| n.to_str()) == Some("locked.mp4") {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "file is in use",
        ));
    }
    fs::remove_file(path)
}

#[tokio::test]
async fn test_failed_removal_is_skipped_and_playlist_still_published() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    fs::write(media.join("locked.mp4"), b"x").unwrap();
    fs::write(media.join("old.mp4"), b"x").unwrap();
    let source = FakeAssetSource::new().with_asset("campaigns/new.mp4", b"new");
    let reconciler = reconciler(&media, source).with_remover(remove_unless_locked);
    let wanted = target(&["campaigns/new.mp4"]);

    let outcome = reconciler.reconcile(&wanted).await.unwrap();

    match outcome {
        ReconcileOutcome::Updated(report) => {
            assert_eq!(report.failed_removals, vec!["locked.mp4".to_string()]);
            // The batch carried on past the failure
            assert_eq!(report.removed, vec!["old.mp4".to_string()]);
            assert_eq!(report.downloaded, vec!["new.mp4".to_string()]);
            assert!(!report.is_complete());
        }
        other => panic!("expected Updated, got {:?}", other),
    }
    let document = fs::read_to_string(media.join("playlist.m3u")).unwrap();
    assert_eq!(playlist::entries(&document), vec![media.join("new.mp4")]);

    // Still unused, so the next pass tries again
    let second = reconciler.reconcile(&wanted).await.unwrap();
    assert!(matches!(second, ReconcileOutcome::Updated(ref r) if r.failed_removals == vec!["locked.mp4".to_string()]));
}

#[tokio::test]
async fn test_deletions_run_without_host_url() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    fs::write(media.join("old.mp4"), b"x").unwrap();
    let reconciler = Reconciler::new(
        &media,
        HttpAssetSource::new(None).unwrap(),
        PlaylistPublisher::new(media.join("playlist.m3u")),
    );

    let outcome = reconciler.reconcile(&TargetSet::default()).await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Updated(ref r) if r.removed == vec!["old.mp4".to_string()]));
    assert_eq!(
        fs::read_to_string(media.join("playlist.m3u")).unwrap(),
        "#EXTM3U\n"
    );
}

#[tokio::test]
async fn test_leftover_partial_download_is_cleaned_up() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().to_path_buf();
    fs::write(media.join(".dropped.mp4.part"), b"half").unwrap();
    let source = FakeAssetSource::new().with_asset("a.mp4", b"a");
    let reconciler = reconciler(&media, source);

    reconciler.reconcile(&target(&["a.mp4"])).await.unwrap();

    assert!(!media.join(".dropped.mp4.part").exists());
    assert_eq!(names(&media), vec!["a.mp4"]);
}

use super::*;
use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;

async fn collect_created(watch: &mut FsWatch, wanted: usize) -> BTreeSet<PathBuf> {
    let mut seen = BTreeSet::new();
    while seen.len() < wanted {
        let event = tokio::time::timeout(Duration::from_secs(5), watch.next_event())
            .await
            .expect("event before timeout")
            .expect("watch still open")
            .expect("watch healthy");
        if event.kind == FileEventKind::Created {
            seen.insert(event.path);
        }
    }
    seen
}

#[tokio::test]
async fn manual_watch_delivers_in_order() {
    let (feed, mut watch) = FsWatch::manual(Path::new("/ws"));
    assert!(feed.send(FileEvent::created("/ws/a")));
    assert!(feed.send(FileEvent::created("/ws/b")));

    let first = watch.next_event().await.expect("event").expect("ok");
    let second = watch.next_event().await.expect("event").expect("ok");
    assert_eq!(first.path, PathBuf::from("/ws/a"));
    assert_eq!(second.path, PathBuf::from("/ws/b"));
}

#[tokio::test]
async fn closing_is_idempotent_and_stops_the_feed() {
    let (feed, mut watch) = FsWatch::manual(Path::new("/ws"));
    let closer = watch.closer();
    closer.close();
    closer.close();
    watch.close();

    assert!(watch.is_closed());
    assert!(!feed.send(FileEvent::created("/ws/a")));
    assert!(watch.next_event().await.is_none());
}

#[tokio::test]
async fn close_wakes_a_pending_reader() {
    let (_feed, mut watch) = FsWatch::manual(Path::new("/ws"));
    let closer = watch.closer();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        closer.close();
    });
    let next = tokio::time::timeout(Duration::from_secs(5), watch.next_event())
        .await
        .expect("reader woke up");
    assert!(next.is_none());
}

#[tokio::test]
async fn start_requires_existing_root() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = FsWatch::start(&temp.path().join("missing"), WatchOptions::default())
        .expect_err("missing root");
    assert!(matches!(err, HarnessError::NotFound(_)));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn reports_files_in_directories_created_after_start() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().to_path_buf();
    let mut watch = FsWatch::start(&root, WatchOptions::default()).expect("start watch");

    let deep = root.join("src/main/java/org/example");
    fs::create_dir_all(&deep).expect("create nested dirs");
    fs::write(deep.join("Address.java"), b"class Address {}").expect("write java");
    fs::write(root.join("wsdl2rest.readme.md"), b"readme").expect("write readme");

    let seen = collect_created(&mut watch, 2).await;
    assert!(seen.contains(&deep.join("Address.java")));
    assert!(seen.contains(&root.join("wsdl2rest.readme.md")));
    watch.close();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn reports_existing_files_when_asked() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().to_path_buf();
    fs::create_dir_all(root.join("config")).expect("create dir");
    fs::write(root.join("config/logging.properties"), b"").expect("write file");
    fs::write(root.join("pom.xml"), b"<project/>").expect("write pom");

    let mut watch = FsWatch::start(&root, WatchOptions::default()).expect("start watch");
    let seen = collect_created(&mut watch, 2).await;
    assert!(seen.contains(&root.join("config/logging.properties")));
    assert!(seen.contains(&root.join("pom.xml")));
}

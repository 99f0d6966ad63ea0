use bucketfs::cadapter::memory::{InMemoryBackend, Op};
use bucketfs::{BucketFs, ErrorKind, FsError, FsOptions, Node, SeekMode};
use std::io::SeekFrom;

fn bucket(keys: &[(&str, Vec<u8>)]) -> BucketFs<InMemoryBackend> {
    with_backend(InMemoryBackend::new("contract"), keys, FsOptions::default())
}

fn with_backend(
    backend: InMemoryBackend,
    keys: &[(&str, Vec<u8>)],
    options: FsOptions,
) -> BucketFs<InMemoryBackend> {
    for (key, data) in keys {
        backend.insert(*key, data.clone());
    }
    BucketFs::with_options(backend, options)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn names(entries: &[bucketfs::FileInfo]) -> Vec<String> {
    entries.iter().map(|e| e.name().to_string()).collect()
}

#[tokio::test]
async fn stat_reports_exact_size() {
    let fs = bucket(&[("data/blob.bin", pattern(1234))]);
    let info = fs.stat("data/blob.bin").await.unwrap();
    assert!(info.is_file());
    assert_eq!(info.size(), 1234);
    assert_eq!(info.name(), "blob.bin");
    assert!(info.mod_time().is_some());
}

#[tokio::test]
async fn prefix_resolves_to_directory_without_mtime() {
    let fs = bucket(&[("a/b/c.txt", b"x".to_vec())]);
    for path in ["a", "a/b"] {
        let info = fs.stat(path).await.unwrap();
        assert!(info.is_dir(), "{path}");
        assert!(info.mod_time().is_none(), "{path}");
    }
}

#[tokio::test]
async fn absent_path_is_not_found() {
    let fs = bucket(&[("a/b/c.txt", b"x".to_vec())]);
    for path in ["nope", "a/b/c", "a/b/c.txt/d"] {
        let err = fs.stat(path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{path}");
        assert!(matches!(err.source, FsError::NotExist));
        let err = fs.open(path).await.err().unwrap();
        assert!(err.is_not_found());
    }
}

#[tokio::test]
async fn code_only_not_found_is_recognised() {
    let backend = InMemoryBackend::new("localstack").with_not_found_code("NotFound");
    let fs = with_backend(backend, &[("dir/file", b"1".to_vec())], FsOptions::default());
    assert!(fs.stat("dir").await.unwrap().is_dir());
    let err = fs.stat("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn read_to_end_is_byte_exact() {
    let large = pattern(600 * 1024);
    let fs = bucket(&[
        ("empty", Vec::new()),
        ("one", vec![0x42]),
        ("large", large.clone()),
    ]);

    assert!(fs.read_file("empty").await.unwrap().is_empty());
    assert_eq!(fs.read_file("one").await.unwrap(), vec![0x42]);
    assert_eq!(fs.read_file("large").await.unwrap(), large);
}

#[tokio::test]
async fn small_buffer_reads_reassemble_object() {
    let data = pattern(1000);
    let fs = bucket(&[("f", data.clone())]);
    let mut file = fs.open("f").await.unwrap().into_file().unwrap();

    let mut out = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = file.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, data);
    // One range request per non-empty read.
    assert_eq!(fs.client().backend().calls(Op::Get), 1000usize.div_ceil(7));
}

#[tokio::test]
async fn arithmetic_seek_matches_skipping() {
    let data = pattern(4096);
    let fs = bucket(&[("f", data.clone())]);
    for k in [0u64, 1, 100, 4095, 4096] {
        let mut file = fs.open("f").await.unwrap().into_file().unwrap();
        file.seek(SeekFrom::Start(k)).await.unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, &data[k as usize..], "offset {k}");
    }

    let mut file = fs.open("f").await.unwrap().into_file().unwrap();
    assert_eq!(file.seek(SeekFrom::End(-96)).await.unwrap(), 4000);
    let mut out = Vec::new();
    file.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, &data[4000..]);
}

#[tokio::test]
async fn root_listing_collapses_prefixes() {
    let fs = bucket(&[
        ("a/x", b"1".to_vec()),
        ("a/y/z", b"2".to_vec()),
        ("b", b"3".to_vec()),
    ]);
    let entries = fs.read_dir(".", None).await.unwrap();
    assert_eq!(names(&entries), vec!["a", "b"]);
    assert!(entries[0].is_dir());
    assert!(entries[1].is_file());
    assert_eq!(entries[1].size(), 1);

    let root = fs.stat(".").await.unwrap();
    assert!(root.is_dir());
}

#[tokio::test]
async fn listing_follows_pagination() {
    let mut keys = Vec::new();
    for i in 0..25 {
        keys.push((format!("logs/{i:02}"), vec![b'x']));
    }
    for i in 0..5 {
        keys.push((format!("logs/sub{i}/inner"), vec![b'y']));
    }
    let borrowed: Vec<_> = keys.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    let options = FsOptions {
        list_page_size: 4,
        ..FsOptions::default()
    };
    let fs = with_backend(InMemoryBackend::new("paged"), &borrowed, options);

    let all = fs.read_dir("logs", None).await.unwrap();
    assert_eq!(all.len(), 30);
    assert_eq!(all[0].name(), "00");
    assert_eq!(all[29].name(), "sub4");
    assert!(all[29].is_dir());

    let mut dir = fs.open_dir("logs").await.unwrap();
    let mut seen = Vec::new();
    loop {
        let chunk = dir.read_dir(Some(7)).await.unwrap();
        if chunk.is_empty() {
            break;
        }
        assert!(chunk.len() <= 7);
        seen.extend(chunk);
    }
    assert_eq!(names(&seen), names(&all));
    assert!(dir.is_exhausted());

    let calls = fs.client().backend().calls(Op::List);
    assert!(dir.read_dir(None).await.unwrap().is_empty());
    assert_eq!(fs.client().backend().calls(Op::List), calls);
}

#[tokio::test]
async fn listing_a_file_fails_not_a_directory() {
    let fs = bucket(&[("plain.txt", b"x".to_vec())]);
    let err = fs.read_dir("plain.txt", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotADirectory);
}

#[tokio::test]
async fn invalid_paths_never_reach_the_backend() {
    let fs = bucket(&[("a", b"x".to_vec())]);
    for path in ["", "/a", "a/", "a//b", "../a", "a/./b"] {
        assert_eq!(fs.stat(path).await.unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(fs.open(path).await.err().unwrap().kind(), ErrorKind::Invalid);
        assert_eq!(fs.read_dir(path, None).await.unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(fs.write_file(path, b"x").await.unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(fs.rename(path, "b").await.unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(fs.rename("a", path).await.unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(fs.mkdir_all(path).await.unwrap_err().kind(), ErrorKind::Invalid);
    }
    assert_eq!(fs.client().backend().total_calls(), 0);

    // The root is looked up without a round trip.
    fs.stat(".").await.unwrap();
    assert_eq!(fs.client().backend().total_calls(), 0);
}

#[tokio::test]
async fn rename_moves_object() {
    let fs = bucket(&[("old/name.txt", b"payload".to_vec())]);
    fs.rename("old/name.txt", "new/place.txt").await.unwrap();
    assert_eq!(fs.read_file("new/place.txt").await.unwrap(), b"payload");
    assert!(fs.stat("old/name.txt").await.unwrap_err().is_not_found());
    // The old directory vanished with its last key.
    assert!(fs.stat("old").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn rename_of_missing_source_fails_either_way() {
    let fs = bucket(&[]);
    for dest in ["ghost", "elsewhere"] {
        let err = fs.rename("ghost", dest).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "rename ghost -> {dest}");
        assert_eq!(err.op, "rename");
    }
    assert!(fs.client().backend().keys().is_empty());
}

#[tokio::test]
async fn rename_with_failed_delete_leaves_both() {
    let fs = bucket(&[("src", b"payload".to_vec())]);
    fs.client().backend().fail(Op::Delete, "AccessDenied");

    let err = fs.rename("src", "dst").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    match &err.source {
        FsError::PartialRename { dest, source } => {
            assert_eq!(dest, "dst");
            assert_eq!(source.code(), Some("AccessDenied"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(fs.read_file("src").await.unwrap(), b"payload");
    assert_eq!(fs.read_file("dst").await.unwrap(), b"payload");
}

#[tokio::test]
async fn write_detects_png() {
    let fs = bucket(&[]);
    let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";
    fs.write_file("img/pixel.png", png).await.unwrap();
    let stored = fs.client().backend().object("img/pixel.png").unwrap();
    assert_eq!(stored.content_type.as_deref(), Some("image/png"));

    fs.write_file("img/readme", b"plain words").await.unwrap();
    let stored = fs.client().backend().object("img/readme").unwrap();
    assert_eq!(stored.content_type.as_deref(), Some("text/plain; charset=utf-8"));

    // Last write wins.
    fs.write_file("img/readme", b"again").await.unwrap();
    assert_eq!(fs.read_file("img/readme").await.unwrap(), b"again");
}

#[tokio::test]
async fn mkdir_all_creates_nothing() {
    let fs = bucket(&[]);
    fs.mkdir_all("deep/tree/here").await.unwrap();
    assert!(fs.stat("deep").await.unwrap_err().is_not_found());
    assert!(fs.client().backend().keys().is_empty());
}

#[tokio::test]
async fn reopen_mode_detects_changes() {
    let options = FsOptions {
        seek_mode: SeekMode::Reopen,
        ..FsOptions::default()
    };
    let fs = with_backend(
        InMemoryBackend::new("reopen"),
        &[("f", pattern(100))],
        options,
    );

    let mut file = fs.open("f").await.unwrap().into_file().unwrap();
    assert_eq!(file.seek(SeekFrom::Start(50)).await.unwrap(), 50);

    fs.write_file("f", &pattern(10)).await.unwrap();
    let err = file.seek(SeekFrom::Start(50)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert_eq!(file.size(), 10);

    fs.client().backend().remove("f");
    let err = file.seek(SeekFrom::Start(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn arithmetic_mode_keeps_stale_size() {
    let fs = bucket(&[("f", pattern(100))]);
    let mut file = fs.open("f").await.unwrap().into_file().unwrap();
    fs.write_file("f", &pattern(10)).await.unwrap();

    let calls = fs.client().backend().total_calls();
    assert_eq!(file.seek(SeekFrom::End(0)).await.unwrap(), 100);
    assert_eq!(fs.client().backend().total_calls(), calls);
    assert_eq!(file.stat().await.unwrap().size(), 10);
}

#[tokio::test]
async fn handles_expose_their_capabilities() {
    let fs = bucket(&[("d/f", b"abc".to_vec())]);

    match fs.open("d").await.unwrap() {
        Node::Dir(mut dir) => {
            assert_eq!(dir.stat().name(), "d");
            assert_eq!(names(&dir.read_dir(None).await.unwrap()), vec!["f"]);
            dir.close();
        }
        Node::File(_) => panic!("expected a directory"),
    }

    let node = fs.open("d/f").await.unwrap();
    assert_eq!(node.stat().await.unwrap().size(), 3);
    let mut file = node.into_file().unwrap();
    let mut buf = [0u8; 2];
    assert_eq!(file.read(&mut buf).await.unwrap(), 2);
    assert_eq!(file.seek(SeekFrom::Current(-1)).await.unwrap(), 1);
    assert_eq!(file.stat().await.unwrap().name(), "f");
    file.close();
}

#[tokio::test]
async fn concurrent_operations_share_one_binding() {
    let fs = bucket(&[]);
    let mut tasks = Vec::new();
    for i in 0..8 {
        let fs = fs.clone();
        tasks.push(tokio::spawn(async move {
            let path = format!("jobs/{i}");
            fs.write_file(&path, path.as_bytes()).await.unwrap();
            fs.read_file(&path).await.unwrap()
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), format!("jobs/{i}").into_bytes());
    }
    assert_eq!(fs.read_dir("jobs", None).await.unwrap().len(), 8);
}

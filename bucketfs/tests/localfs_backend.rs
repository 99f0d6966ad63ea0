use bucketfs::cadapter::localfs::LocalFsBackend;
use bucketfs::{BucketFs, ErrorKind, FsOptions};
use std::io::SeekFrom;

fn local_fs(dir: &tempfile::TempDir) -> BucketFs<LocalFsBackend> {
    BucketFs::new(LocalFsBackend::new(dir.path()))
}

#[tokio::test]
async fn write_stat_and_read_back() {
    let tmp = tempfile::tempdir().unwrap();
    let fs = local_fs(&tmp);

    fs.write_file("docs/guide/intro.md", b"# Intro\n").await.unwrap();
    assert!(tmp.path().join("docs/guide/intro.md").is_file());

    let info = fs.stat("docs/guide/intro.md").await.unwrap();
    assert!(info.is_file());
    assert_eq!(info.size(), 8);

    let dir = fs.stat("docs/guide").await.unwrap();
    assert!(dir.is_dir());
    assert!(dir.mod_time().is_none());

    assert_eq!(fs.read_file("docs/guide/intro.md").await.unwrap(), b"# Intro\n");
}

#[tokio::test]
async fn ranged_reads_and_seeks() {
    let tmp = tempfile::tempdir().unwrap();
    let fs = local_fs(&tmp);
    let data: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    fs.write_file("blob", &data).await.unwrap();

    let mut file = fs.open("blob").await.unwrap().into_file().unwrap();
    file.seek(SeekFrom::Start(2990)).await.unwrap();
    let mut buf = [0u8; 64];
    assert_eq!(file.read(&mut buf).await.unwrap(), 10);
    assert_eq!(&buf[..10], &data[2990..]);
    assert_eq!(file.read(&mut buf).await.unwrap(), 0);

    file.seek(SeekFrom::End(-3000)).await.unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, data);
}

#[tokio::test]
async fn listing_with_small_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let fs = BucketFs::with_options(
        LocalFsBackend::new(tmp.path()),
        FsOptions {
            list_page_size: 2,
            ..FsOptions::default()
        },
    );
    for key in ["r/a", "r/b/1", "r/b/2", "r/c", "r/d/e/f", "top"] {
        fs.write_file(key, key.as_bytes()).await.unwrap();
    }

    let entries = fs.read_dir("r", None).await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
    let dirs: Vec<_> = entries.iter().map(|e| e.is_dir()).collect();
    assert_eq!(dirs, vec![false, true, false, true]);

    let root = fs.read_dir(".", None).await.unwrap();
    let names: Vec<_> = root.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["r", "top"]);
}

#[tokio::test]
async fn rename_across_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let fs = local_fs(&tmp);
    fs.write_file("inbox/msg", b"hi").await.unwrap();

    fs.rename("inbox/msg", "archive/2024/msg").await.unwrap();
    assert_eq!(fs.read_file("archive/2024/msg").await.unwrap(), b"hi");
    assert!(fs.stat("inbox").await.unwrap_err().is_not_found());
    assert!(!tmp.path().join("inbox").exists());
}

#[tokio::test]
async fn errors_on_local_backend() {
    let tmp = tempfile::tempdir().unwrap();
    let fs = local_fs(&tmp);
    fs.write_file("f", b"x").await.unwrap();

    assert_eq!(
        fs.read_dir("f", None).await.unwrap_err().kind(),
        ErrorKind::NotADirectory
    );
    assert_eq!(
        fs.stat("missing/thing").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        fs.rename("missing", "other").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(fs.read_dir(".", None).await.unwrap().len() == 1);
}

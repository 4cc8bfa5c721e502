use tempfile::TempDir;

use arxmap_core::config::StorageSettings;
use arxmap_core::traits::BlobStore;
use arxmap_core::Error;
use arxmap_ingest::{open_blob_store, LocalBlobStore};

#[tokio::test]
async fn local_store_put_get_exists() {
    let tmp = TempDir::new().unwrap();
    let store = LocalBlobStore::new(tmp.path());

    assert_eq!(store.get("papers/cs.CV/a.pdf").await.unwrap(), None);
    assert!(!store.exists("papers/cs.CV/a.pdf").await.unwrap());

    store.put("papers/cs.CV/a.pdf", b"%PDF-1.4".to_vec(), "application/pdf").await.unwrap();
    assert_eq!(store.get("papers/cs.CV/a.pdf").await.unwrap().as_deref(), Some(&b"%PDF-1.4"[..]));
    assert!(store.exists("papers/cs.CV/a.pdf").await.unwrap());
    assert!(tmp.path().join("papers/cs.CV/a.pdf").is_file());
}

#[tokio::test]
async fn local_store_rejects_escaping_keys() {
    let tmp = TempDir::new().unwrap();
    let store = LocalBlobStore::new(tmp.path());
    for key in ["../outside.txt", "/etc/passwd", ""] {
        let err = store.put(key, vec![1], "text/plain").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)), "key {key:?}");
    }
}

#[test]
fn store_selection_by_backend() {
    let timeout = std::time::Duration::from_secs(1);
    let local = StorageSettings { local_root: "/tmp/arxmap-test".into(), ..Default::default() };
    assert_eq!(open_blob_store(&local, timeout).unwrap().describe(), "local:/tmp/arxmap-test");

    let http = StorageSettings { backend: "http".into(), http_base_url: Some("http://store.local/bucket/".into()), ..Default::default() };
    assert_eq!(open_blob_store(&http, timeout).unwrap().describe(), "http://store.local/bucket");

    let missing_url = StorageSettings { backend: "http".into(), ..Default::default() };
    assert!(matches!(open_blob_store(&missing_url, timeout), Err(Error::Config(_))));

    let unknown = StorageSettings { backend: "ftp".into(), ..Default::default() };
    assert!(matches!(open_blob_store(&unknown, timeout), Err(Error::Config(_))));
}

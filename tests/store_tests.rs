mod common;

use std::collections::HashSet;

use anyhow::Result;
use common::temp_path;
use typoguard::error::StorageError;
use typoguard::store::{summarize, BlacklistEntry, BlacklistStore, JsonlStore, MemoryStore};

#[tokio::test]
async fn test_memory_store_pending_is_invisible_until_flush() -> Result<()> {
    let store = MemoryStore::new();
    store
        .append_entry(BlacklistEntry::new("google.com.", "g00gle.com."))
        .await?;

    assert_eq!(store.pending_len().await, 1);
    assert!(store.list_malicious_variants("google.com.").await?.is_empty());

    assert_eq!(store.flush().await?, 1);
    assert_eq!(store.pending_len().await, 0);
    assert!(store
        .list_malicious_variants("google.com.")
        .await?
        .contains("g00gle.com."));

    // Nothing left to commit
    assert_eq!(store.flush().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_memory_store_filters_by_original() -> Result<()> {
    let store = MemoryStore::with_entries([
        BlacklistEntry::new("google.com.", "g00gle.com."),
        BlacklistEntry::new("google.com.", "gogle.com."),
        BlacklistEntry::new("paypal.com.", "paypa1.com."),
    ]);

    assert_eq!(store.list_entries(None).await?.len(), 3);
    assert_eq!(store.list_entries(Some("google.com.")).await?.len(), 2);
    assert!(store.list_entries(Some("example.com.")).await?.is_empty());
    assert_eq!(
        store.list_malicious_variants("paypal.com.").await?,
        HashSet::from(["paypa1.com.".to_string()])
    );
    Ok(())
}

#[tokio::test]
async fn test_jsonl_store_survives_reopen() -> Result<()> {
    let path = temp_path("typoguard_store");

    {
        let store = JsonlStore::open(&path).await?;
        assert!(store.list_entries(None).await?.is_empty());

        store
            .append_entry(BlacklistEntry::new("rnicrosoft.com.", "rnicros0ft.com."))
            .await?;
        store
            .append_entry(BlacklistEntry::new("facebook.com.", "facedook.com."))
            .await?;

        // Not on disk before the flush
        assert!(!path.exists());
        assert_eq!(store.flush().await?, 2);
    }

    let reopened = JsonlStore::open(&path).await?;
    assert_eq!(reopened.path(), path.as_path());
    let entries = reopened.list_entries(None).await?;
    assert_eq!(entries.len(), 2);
    assert!(reopened
        .list_malicious_variants("facebook.com.")
        .await?
        .contains("facedook.com."));

    // Appends go to the end of the existing file
    reopened
        .append_entry(BlacklistEntry::new("facebook.com.", "faceb00k.com."))
        .await?;
    reopened.flush().await?;
    let contents = tokio::fs::read_to_string(&path).await?;
    assert_eq!(contents.lines().count(), 3);

    tokio::fs::remove_file(&path).await?;
    Ok(())
}

#[tokio::test]
async fn test_jsonl_store_defaults_blocked_flag() -> Result<()> {
    let path = temp_path("typoguard_blocked");
    tokio::fs::write(
        &path,
        "{\"original\":\"google.com.\",\"malicious\":\"gooogle.com.\"}\n\n",
    )
    .await?;

    let store = JsonlStore::open(&path).await?;
    let entries = store.list_entries(Some("google.com.")).await?;
    assert_eq!(entries, vec![BlacklistEntry::new("google.com.", "gooogle.com.")]);
    assert!(entries[0].blocked);

    tokio::fs::remove_file(&path).await?;
    Ok(())
}

#[tokio::test]
async fn test_jsonl_store_rejects_corrupt_lines() -> Result<()> {
    let path = temp_path("typoguard_corrupt");
    tokio::fs::write(&path, "not json\n").await?;

    let result = JsonlStore::open(&path).await;
    assert!(matches!(result, Err(StorageError::Serialization(_))));

    tokio::fs::remove_file(&path).await?;
    Ok(())
}

#[tokio::test]
async fn test_jsonl_store_drops_torn_last_line() -> Result<()> {
    let path = temp_path("typoguard_torn");
    let intact = "{\"original\":\"google.com.\",\"malicious\":\"g00gle.com.\",\"blocked\":true}\n";
    tokio::fs::write(&path, format!("{}{{\"original\":\"goo", intact)).await?;

    let store = JsonlStore::open(&path).await?;
    assert_eq!(store.list_entries(None).await?.len(), 1);
    assert_eq!(tokio::fs::read_to_string(&path).await?, intact);

    store
        .append_entry(BlacklistEntry::new("google.com.", "gogle.com."))
        .await?;
    assert_eq!(store.flush().await?, 1);

    let reopened = JsonlStore::open(&path).await?;
    let variants = reopened.list_malicious_variants("google.com.").await?;
    assert_eq!(variants, HashSet::from(["g00gle.com.".to_string(), "gogle.com.".to_string()]));

    tokio::fs::remove_file(&path).await?;
    Ok(())
}

#[tokio::test]
async fn test_jsonl_store_terminates_unterminated_entry() -> Result<()> {
    let path = temp_path("typoguard_unterminated");
    tokio::fs::write(
        &path,
        "{\"original\":\"google.com.\",\"malicious\":\"g00gle.com.\"}",
    )
    .await?;

    let store = JsonlStore::open(&path).await?;
    store
        .append_entry(BlacklistEntry::new("google.com.", "gogle.com."))
        .await?;
    store.flush().await?;

    let contents = tokio::fs::read_to_string(&path).await?;
    assert_eq!(contents.lines().count(), 2);
    assert_eq!(JsonlStore::open(&path).await?.list_entries(None).await?.len(), 2);

    tokio::fs::remove_file(&path).await?;
    Ok(())
}

#[tokio::test]
async fn test_jsonl_store_retried_flush_writes_each_entry_once() -> Result<()> {
    let dir = temp_path("typoguard_missing_dir").with_extension("");
    let path = dir.join("blacklist.jsonl");

    let store = JsonlStore::open(&path).await?;
    store
        .append_entry(BlacklistEntry::new("google.com.", "g00gle.com."))
        .await?;
    store
        .append_entry(BlacklistEntry::new("google.com.", "gogle.com."))
        .await?;

    // Parent directory does not exist yet
    assert!(matches!(store.flush().await, Err(StorageError::Io(_))));
    assert!(store.list_entries(None).await?.is_empty());

    tokio::fs::create_dir_all(&dir).await?;
    assert_eq!(store.flush().await?, 2);
    assert_eq!(store.flush().await?, 0);

    let contents = tokio::fs::read_to_string(&path).await?;
    assert_eq!(contents.lines().count(), 2);
    assert_eq!(store.list_entries(None).await?.len(), 2);

    tokio::fs::remove_dir_all(&dir).await?;
    Ok(())
}

#[test]
fn test_summarize_counts_per_original() {
    let entries = vec![
        BlacklistEntry::new("google.com.", "g00gle.com."),
        BlacklistEntry::new("google.com.", "gogle.com."),
        BlacklistEntry::new("paypal.com.", "paypa1.com."),
    ];

    let stats = summarize(&entries);
    assert_eq!(stats.len(), 2);
    assert_eq!(stats["google.com."], 2);
    assert_eq!(stats["paypal.com."], 1);
    assert!(summarize(&[]).is_empty());
}

//! Durable JSON metadata collections keyed by URL.

use crate::error::StoreError;
use crate::results::PageRecord;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The two metadata collections of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Every stored page
    Full,
    /// Pages judged relevant
    Filtered,
}

/// Pretty-printed JSON arrays of [`PageRecord`] on disk.
///
/// Every [`MetadataStore::upsert`] reads the collection, replaces the entry for
/// the record's URL, and writes the whole array back before returning.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    full_path: PathBuf,
    filtered_path: PathBuf,
}

impl MetadataStore {
    pub fn new(full_path: PathBuf, filtered_path: PathBuf) -> Self {
        Self {
            full_path,
            filtered_path,
        }
    }

    pub fn path(&self, collection: Collection) -> &Path {
        match collection {
            Collection::Full => &self.full_path,
            Collection::Filtered => &self.filtered_path,
        }
    }

    /// Truncate both collections to empty arrays
    pub fn reset(&self) -> Result<(), StoreError> {
        for collection in [Collection::Full, Collection::Filtered] {
            write_collection(self.path(collection), &[])?;
        }
        Ok(())
    }

    /// Insert `record`, replacing any entry with the same URL
    pub fn upsert(&self, record: &PageRecord, collection: Collection) -> Result<(), StoreError> {
        let path = self.path(collection);

        let mut records = self.read_tolerant(collection);
        records.retain(|r| r.url != record.url);
        records.push(record.clone());

        write_collection(path, &records)?;
        ::log::debug!(
            "Saved metadata for {} ({:?}, {} records)",
            record.url,
            collection,
            records.len()
        );
        Ok(())
    }

    /// Read a collection; a missing file is an empty collection
    pub fn load(&self, collection: Collection) -> Result<Vec<PageRecord>, StoreError> {
        match fs::read_to_string(self.path(collection)) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`MetadataStore::load`], but unreadable or corrupt files count as
    /// empty and get overwritten by the next write
    fn read_tolerant(&self, collection: Collection) -> Vec<PageRecord> {
        match self.load(collection) {
            Ok(records) => records,
            Err(e) => {
                ::log::warn!(
                    "Error reading metadata file {}, starting a new one: {}",
                    self.path(collection).display(),
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Serialize with a four-space indent, write to a temp file, fsync, then
/// rename over `path`
fn write_collection(path: &Path, records: &[PageRecord]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut serializer)?;

    let mut tmp_path = path.as_os_str().to_os_string();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)?;
    file.write_all(&buf)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    sync_parent_directory(path)?;
    Ok(())
}

fn sync_parent_directory(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            File::open(parent)?.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, content: &str) -> PageRecord {
        PageRecord::new(
            url.to_string(),
            "Title".to_string(),
            content.to_string(),
            vec!["Heading".to_string()],
        )
    }

    fn store_in(dir: &Path) -> MetadataStore {
        MetadataStore::new(
            dir.join("website_metadata.json"),
            dir.join("website_metadata_filtered.json"),
        )
    }

    #[test]
    fn test_reset_writes_empty_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.upsert(&record("https://a.test/", "old"), Collection::Full).unwrap();

        store.reset().unwrap();
        assert!(store.load(Collection::Full).unwrap().is_empty());
        assert!(store.load(Collection::Filtered).unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(store.path(Collection::Full)).unwrap(),
            "[]"
        );
    }

    #[test]
    fn test_upsert_replaces_same_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.reset().unwrap();

        store.upsert(&record("https://a.test/", "first"), Collection::Full).unwrap();
        store.upsert(&record("https://a.test/b", "other"), Collection::Full).unwrap();
        store.upsert(&record("https://a.test/", "second"), Collection::Full).unwrap();

        let records = store.load(Collection::Full).unwrap();
        assert_eq!(records.len(), 2);
        let matching: Vec<_> = records.iter().filter(|r| r.url == "https://a.test/").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].content, "second");
        // Replaced entries move to the end
        assert_eq!(records[1].url, "https://a.test/");
    }

    #[test]
    fn test_collections_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.reset().unwrap();

        store.upsert(&record("https://a.test/", "x"), Collection::Full).unwrap();
        assert_eq!(store.load(Collection::Full).unwrap().len(), 1);
        assert!(store.load(Collection::Filtered).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.path(Collection::Filtered), "{ not json").unwrap();

        assert!(store.load(Collection::Filtered).is_err());
        store
            .upsert(&record("https://a.test/", "x"), Collection::Filtered)
            .unwrap();
        let records = store.load(Collection::Filtered).unwrap();
        assert_eq!(records, vec![record("https://a.test/", "x")]);
    }

    #[test]
    fn test_pretty_printed_with_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .upsert(&record("https://a.test/", "café"), Collection::Full)
            .unwrap();

        let raw = fs::read_to_string(store.path(Collection::Full)).unwrap();
        assert!(raw.starts_with("[\n    {\n        \"title\": \"Title\""));
        assert!(raw.contains("café"));
        assert!(!dir.path().join("website_metadata.json.tmp").exists());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir.path().join("not-yet"));
        assert!(store.load(Collection::Full).unwrap().is_empty());
    }
}

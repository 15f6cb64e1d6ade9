//! Flat L2 vector indexes.
//!
//! File layout, all little-endian:
//!
//! ```text
//! magic "YRFL" | version u32 | dimension u32 | count u64 | count * dimension f32
//! ```
//!
//! Writes go to a temporary sibling which is fsynced and then renamed over the
//! target, so a reader never sees a half-written index.

use crate::error::IndexError;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"YRFL";
const FORMAT_VERSION: u32 = 1;

/// Exact nearest-neighbour index over fixed-dimension vectors.
///
/// Append-only: entries are never removed or reordered. Entry `i` is the
/// `i`-th vector added.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

/// A search hit: position in insertion order and squared L2 distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

impl FlatL2Index {
    /// An empty index. A zero `dimension` yields an index that rejects every
    /// `add` and `search`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append one vector
    pub fn add(&mut self, vector: &[f32]) -> Result<(), IndexError> {
        if self.dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if self.dimension == 0 {
            return None;
        }
        let start = position.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    /// The `k` closest entries to `query`, nearest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if self.dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: squared_l2(query, v),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    /// Write the index to `path`, replacing any previous file
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let dimension = u32::try_from(self.dimension).map_err(|_| {
            IndexError::Format(format!("dimension {} does not fit the header", self.dimension))
        })?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temporary_path(path);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        {
            let mut writer = BufWriter::new(&mut file);
            writer.write_all(MAGIC)?;
            writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
            writer.write_all(&dimension.to_le_bytes())?;
            writer.write_all(&(self.len() as u64).to_le_bytes())?;
            for value in &self.data {
                writer.write_all(&value.to_le_bytes())?;
            }
            writer.flush()?;
        }
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Read an index previously written by [`FlatL2Index::save`]
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(IndexError::Format("bad magic".into()));
        }
        let version = read_u32(&mut reader)?;
        if version != FORMAT_VERSION {
            return Err(IndexError::Format(format!("unsupported version {version}")));
        }
        let dimension = read_u32(&mut reader)? as usize;
        if dimension == 0 {
            return Err(IndexError::Format("zero dimension".into()));
        }
        let mut count_bytes = [0u8; 8];
        reader.read_exact(&mut count_bytes)?;
        let count = usize::try_from(u64::from_le_bytes(count_bytes))
            .map_err(|_| IndexError::Format("entry count overflows".into()))?;

        let expected = count
            .checked_mul(dimension)
            .and_then(|floats| floats.checked_mul(4))
            .ok_or_else(|| IndexError::Format("entry count overflows".into()))?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() != expected {
            return Err(IndexError::Format(format!(
                "expected {} vector bytes, found {}",
                expected,
                bytes.len()
            )));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { dimension, data })
    }
}

fn read_u32(reader: &mut impl Read) -> Result<u32, IndexError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(format!(".tmp.{}", std::process::id()));
    PathBuf::from(os)
}

/// The full-corpus index and the relevant-only index of one crawl session
#[derive(Debug)]
pub struct VectorIndexes {
    full: FlatL2Index,
    filtered: FlatL2Index,
    full_path: PathBuf,
    filtered_path: PathBuf,
}

impl VectorIndexes {
    pub fn new(dimension: usize, full_path: PathBuf, filtered_path: PathBuf) -> Self {
        Self {
            full: FlatL2Index::new(dimension),
            filtered: FlatL2Index::new(dimension),
            full_path,
            filtered_path,
        }
    }

    /// Start over with two empty indexes, in memory and on disk
    pub fn reset(&mut self) -> Result<(), IndexError> {
        let dimension = self.full.dimension();
        self.full = FlatL2Index::new(dimension);
        self.filtered = FlatL2Index::new(dimension);
        self.persist()
    }

    pub fn add_to_full(&mut self, vector: &[f32]) -> Result<(), IndexError> {
        self.full.add(vector)
    }

    pub fn add_to_filtered(&mut self, vector: &[f32]) -> Result<(), IndexError> {
        self.filtered.add(vector)
    }

    pub fn full(&self) -> &FlatL2Index {
        &self.full
    }

    pub fn filtered(&self) -> &FlatL2Index {
        &self.filtered
    }

    /// Write both indexes; safe to call repeatedly
    pub fn persist(&self) -> Result<(), IndexError> {
        self.full.save(&self.full_path)?;
        ::log::info!(
            "Main vector store saved to {} ({} vectors)",
            self.full_path.display(),
            self.full.len()
        );

        self.filtered.save(&self.filtered_path)?;
        ::log::info!(
            "Filtered vector store saved to {} ({} vectors)",
            self.filtered_path.display(),
            self.filtered.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = FlatL2Index::new(3);
        assert!(index.add(&[1.0, 2.0, 3.0]).is_ok());
        assert!(matches!(
            index.add(&[1.0, 2.0]),
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = FlatL2Index::new(2);
        index.add(&[0.0, 0.0]).unwrap();
        index.add(&[5.0, 5.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();

        let hits = index.search(&[0.9, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 2);
        assert_eq!(hits[1].position, 0);
        assert!(hits[0].distance < hits[1].distance);

        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 3);
        assert!(index.search(&[0.0], 1).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("docs.index");

        let mut index = FlatL2Index::new(2);
        index.add(&[1.5, -2.0]).unwrap();
        index.add(&[0.25, 4.0]).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatL2Index::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.vector(1), Some(&[0.25, 4.0][..]));
        assert_eq!(loaded.vector(2), None);
    }

    #[test]
    fn test_save_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.index");

        let mut index = FlatL2Index::new(1);
        index.add(&[1.0]).unwrap();
        index.add(&[2.0]).unwrap();
        index.save(&path).unwrap();

        FlatL2Index::new(1).save(&path).unwrap();
        let loaded = FlatL2Index::load(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension(), 1);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.index");
        std::fs::write(&path, b"not an index at all").unwrap();
        assert!(matches!(
            FlatL2Index::load(&path),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_dual_indexes_persist_independently() {
        let dir = tempfile::tempdir().unwrap();
        let full_path = dir.path().join("full.index");
        let filtered_path = dir.path().join("filtered.index");

        let mut indexes = VectorIndexes::new(2, full_path.clone(), filtered_path.clone());
        indexes.add_to_full(&[1.0, 1.0]).unwrap();
        indexes.add_to_full(&[2.0, 2.0]).unwrap();
        indexes.add_to_filtered(&[2.0, 2.0]).unwrap();
        indexes.persist().unwrap();
        // Idempotent
        indexes.persist().unwrap();

        assert_eq!(FlatL2Index::load(&full_path).unwrap().len(), 2);
        assert_eq!(FlatL2Index::load(&filtered_path).unwrap().len(), 1);

        indexes.reset().unwrap();
        assert!(indexes.full().is_empty());
        assert!(indexes.filtered().is_empty());
        // Reset truncates the files too
        assert!(FlatL2Index::load(&full_path).unwrap().is_empty());
        assert!(FlatL2Index::load(&filtered_path).unwrap().is_empty());
    }

    fn write_header(path: &Path, dimension: u32, count: u64, payload: &[u8]) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&dimension.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(payload);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_load_rejects_zero_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.index");
        write_header(&path, 0, 5, &[]);
        assert!(matches!(
            FlatL2Index::load(&path),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_load_rejects_overflowing_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.index");
        write_header(&path, 4, u64::MAX, &[0u8; 16]);
        assert!(matches!(
            FlatL2Index::load(&path),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_load_rejects_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.index");
        write_header(&path, 2, 2, &[0u8; 12]);
        assert!(matches!(
            FlatL2Index::load(&path),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_zero_dimension_index_rejects_use() {
        let mut index = FlatL2Index::new(0);
        assert!(matches!(index.add(&[]), Err(IndexError::ZeroDimension)));
        assert!(matches!(index.search(&[], 1), Err(IndexError::ZeroDimension)));
        assert_eq!(index.vector(0), None);
        assert!(index.is_empty());
    }

    #[test]
    fn test_vector_position_out_of_range() {
        let mut index = FlatL2Index::new(2);
        index.add(&[1.0, 2.0]).unwrap();
        assert_eq!(index.vector(usize::MAX), None);
        assert_eq!(index.vector(usize::MAX / 2), None);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_save_rejects_dimension_beyond_header() {
        let dir = tempfile::tempdir().unwrap();
        let index = FlatL2Index::new(u32::MAX as usize + 1);
        assert!(matches!(
            index.save(&dir.path().join("wide.index")),
            Err(IndexError::Format(_))
        ));
    }
}

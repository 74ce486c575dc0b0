//! Region-file chunk store.
//!
//! A region file packs up to 32x32 chunks into one sectored container:
//! a 4 KiB location table (sector offset and count per chunk), a 4 KiB
//! timestamp table, then chunk records padded to 4 KiB sectors. Each record
//! is a big-endian length, one compression-scheme byte, and the compressed
//! document bytes.
//!
//! Mutations are deferred: [`RegionFile::write_chunk`] and
//! [`RegionFile::queue_delete`] only touch pending sets, and
//! [`RegionFile::save`] realizes both in a single compaction pass, so n
//! deletions cost one rewrite rather than n.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use tracing::debug;
use zerocopy::byteorder::{BigEndian, U32};

use crate::{Compression, RegionError};

pub const SECTOR_BYTES: usize = 4096;
pub const REGION_SIDE: i32 = 32;
const TABLE_ENTRIES: usize = (REGION_SIDE * REGION_SIDE) as usize;
const HEADER_BYTES: usize = 2 * SECTOR_BYTES;
const MAX_SECTORS_PER_CHUNK: usize = 255;

pub struct RegionFile {
    path: PathBuf,
    locations: [u32; TABLE_ENTRIES],
    timestamps: [u32; TABLE_ENTRIES],
    /// Uncompressed document bytes waiting to be written at save time.
    pending_writes: BTreeMap<usize, Vec<u8>>,
    /// Chunk indices whose physical removal is realized at save time.
    pending_deletes: BTreeSet<usize>,
}

impl RegionFile {
    /// Open an existing region file, reading and validating only the header.
    pub fn open(path: &Path) -> Result<Self, RegionError> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_BYTES as u64 {
            return Err(RegionError::TruncatedHeader(len));
        }
        let mut header = [0u8; HEADER_BYTES];
        file.read_exact(&mut header)?;

        let mut locations = [0u32; TABLE_ENTRIES];
        let mut timestamps = [0u32; TABLE_ENTRIES];
        for i in 0..TABLE_ENTRIES {
            let at = i * 4;
            locations[i] = U32::<BigEndian>::from_bytes([
                header[at],
                header[at + 1],
                header[at + 2],
                header[at + 3],
            ])
            .get();
            let at = SECTOR_BYTES + i * 4;
            timestamps[i] = U32::<BigEndian>::from_bytes([
                header[at],
                header[at + 1],
                header[at + 2],
                header[at + 3],
            ])
            .get();
        }

        Ok(Self {
            path: path.to_path_buf(),
            locations,
            timestamps,
            pending_writes: BTreeMap::new(),
            pending_deletes: BTreeSet::new(),
        })
    }

    /// Create an empty region file (header only) at `path`.
    pub fn create(path: &Path) -> Result<Self, RegionError> {
        fs::write(path, [0u8; HEADER_BYTES])?;
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn index(x: i32, z: i32) -> Result<usize, RegionError> {
        if (0..REGION_SIDE).contains(&x) && (0..REGION_SIDE).contains(&z) {
            Ok((z * REGION_SIDE + x) as usize)
        } else {
            Err(RegionError::CoordOutOfRange { x, z })
        }
    }

    /// Whether the coordinate currently resolves to chunk data, counting
    /// pending writes and discounting queued deletions.
    pub fn has_chunk(&self, x: i32, z: i32) -> bool {
        match Self::index(x, z) {
            Ok(i) => {
                !self.pending_deletes.contains(&i)
                    && (self.locations[i] != 0 || self.pending_writes.contains_key(&i))
            }
            Err(_) => false,
        }
    }

    /// Present chunk coordinates in table order.
    pub fn chunk_coords(&self) -> Vec<(i32, i32)> {
        (0..TABLE_ENTRIES as i32)
            .map(|i| (i % REGION_SIDE, i / REGION_SIDE))
            .filter(|&(x, z)| self.has_chunk(x, z))
            .collect()
    }

    /// Read and decompress one chunk's document bytes. The file handle is
    /// scoped to this call.
    pub fn read_chunk(&self, x: i32, z: i32) -> Result<Vec<u8>, RegionError> {
        let i = Self::index(x, z)?;
        if self.pending_deletes.contains(&i) {
            return Err(RegionError::MissingChunk { x, z });
        }
        if let Some(data) = self.pending_writes.get(&i) {
            return Ok(data.clone());
        }
        let location = self.locations[i];
        if location == 0 {
            return Err(RegionError::MissingChunk { x, z });
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start((location >> 8) as u64 * SECTOR_BYTES as u64))?;
        let mut prefix = [0u8; 5];
        file.read_exact(&mut prefix)?;
        let record_len =
            U32::<BigEndian>::from_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]).get();
        if record_len == 0 {
            return Err(RegionError::MalformedChunk { x, z });
        }
        let scheme = prefix[4];
        let mut compressed = vec![0u8; record_len as usize - 1];
        file.read_exact(&mut compressed)?;

        let compression =
            Compression::from_scheme(scheme).ok_or(RegionError::UnsupportedScheme(scheme))?;
        let mut data = Vec::new();
        match compression {
            Compression::Gzip => GzDecoder::new(&compressed[..]).read_to_end(&mut data)?,
            Compression::Zlib => ZlibDecoder::new(&compressed[..]).read_to_end(&mut data)?,
            Compression::Uncompressed => {
                data = compressed;
                data.len()
            }
        };
        Ok(data)
    }

    /// Stage uncompressed document bytes for the coordinate. Realized, with
    /// zlib compression, at the next [`RegionFile::save`].
    pub fn write_chunk(&mut self, x: i32, z: i32, data: Vec<u8>) -> Result<(), RegionError> {
        let i = Self::index(x, z)?;
        self.pending_deletes.remove(&i);
        self.pending_writes.insert(i, data);
        Ok(())
    }

    /// Queue the coordinate for physical removal at the next save.
    pub fn queue_delete(&mut self, x: i32, z: i32) -> Result<(), RegionError> {
        let i = Self::index(x, z)?;
        self.pending_writes.remove(&i);
        self.pending_deletes.insert(i);
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_writes.is_empty() || !self.pending_deletes.is_empty()
    }

    /// Parse `(region_x, region_z)` out of an `r.<x>.<z>.mca` file name.
    pub fn region_coords(&self) -> Option<(i32, i32)> {
        let name = self.path.file_name()?.to_str()?;
        let mut parts = name.split('.');
        if parts.next()? != "r" {
            return None;
        }
        let x = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        match parts.next()? {
            "mca" | "mcr" => Some((x, z)),
            _ => None,
        }
    }

    /// Flush pending writes and deletions in one compaction pass: every
    /// surviving chunk is re-packed into a fresh sector layout and the file
    /// is replaced atomically.
    pub fn save(&mut self) -> Result<(), RegionError> {
        if !self.has_pending() {
            return Ok(());
        }
        debug!(
            path = %self.path.display(),
            writes = self.pending_writes.len(),
            deletes = self.pending_deletes.len(),
            "compacting region file"
        );

        let old = fs::read(&self.path)?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        let mut locations = [0u32; TABLE_ENTRIES];
        let mut timestamps = [0u32; TABLE_ENTRIES];
        let mut body: Vec<u8> = Vec::new();
        let mut next_sector = (HEADER_BYTES / SECTOR_BYTES) as u32;

        for i in 0..TABLE_ENTRIES {
            if self.pending_deletes.contains(&i) {
                continue;
            }
            let (record, timestamp) = if let Some(data) = self.pending_writes.get(&i) {
                (Self::pack_record(data, i)?, now)
            } else if self.locations[i] != 0 {
                (
                    Self::stored_record(&old, self.locations[i], i)?,
                    self.timestamps[i],
                )
            } else {
                continue;
            };

            let sectors = record.len().div_ceil(SECTOR_BYTES);
            if sectors > MAX_SECTORS_PER_CHUNK {
                let (x, z) = ((i as i32) % REGION_SIDE, (i as i32) / REGION_SIDE);
                return Err(RegionError::ChunkTooLarge { x, z });
            }
            locations[i] = (next_sector << 8) | sectors as u32;
            timestamps[i] = timestamp;
            body.extend_from_slice(&record);
            body.resize(body.len().next_multiple_of(SECTOR_BYTES), 0);
            next_sector += sectors as u32;
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for value in locations {
                tmp.write_all(&U32::<BigEndian>::new(value).to_bytes())?;
            }
            for value in timestamps {
                tmp.write_all(&U32::<BigEndian>::new(value).to_bytes())?;
            }
            tmp.write_all(&body)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        self.locations = locations;
        self.timestamps = timestamps;
        self.pending_writes.clear();
        self.pending_deletes.clear();
        Ok(())
    }

    /// Compress staged document bytes into an on-disk chunk record.
    fn pack_record(data: &[u8], i: usize) -> Result<Vec<u8>, RegionError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;
        let record_len = u32::try_from(compressed.len() + 1).map_err(|_| {
            let (x, z) = ((i as i32) % REGION_SIDE, (i as i32) / REGION_SIDE);
            RegionError::ChunkTooLarge { x, z }
        })?;
        let mut record = Vec::with_capacity(5 + compressed.len());
        record.extend_from_slice(&U32::<BigEndian>::new(record_len).to_bytes());
        record.push(Compression::Zlib.scheme());
        record.extend_from_slice(&compressed);
        Ok(record)
    }

    /// Slice an untouched chunk's stored record bytes out of the old file.
    fn stored_record(old: &[u8], location: u32, i: usize) -> Result<Vec<u8>, RegionError> {
        let (x, z) = ((i as i32) % REGION_SIDE, (i as i32) / REGION_SIDE);
        let start = (location >> 8) as usize * SECTOR_BYTES;
        if start + 5 > old.len() {
            return Err(RegionError::MalformedChunk { x, z });
        }
        let record_len = U32::<BigEndian>::from_bytes([
            old[start],
            old[start + 1],
            old[start + 2],
            old[start + 3],
        ])
        .get() as usize;
        let end = start + 4 + record_len;
        if record_len == 0 || end > old.len() {
            return Err(RegionError::MalformedChunk { x, z });
        }
        Ok(old[start..end].to_vec())
    }
}

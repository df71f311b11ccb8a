//! File format structures for raw event dump files
//!
//! File structure:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Header                                 │
//! │  - Magic "PXDDUMP1"                     │
//! │  - Length (u32 LE) + MsgPack DumpHeader │
//! ├─────────────────────────────────────────┤
//! │  Record 1                               │
//! │  - Length prefix (u32 LE)               │
//! │  - Meta length (u32 LE) + MsgPack meta  │
//! │  - Buffer count (u32 LE)                │
//! │  - (length u32 LE + raw bytes) × count  │
//! ├─────────────────────────────────────────┤
//! │  ...                                    │
//! ├─────────────────────────────────────────┤
//! │  Footer (fixed 64 bytes)                │
//! │  - Magic, checksum, completion flag     │
//! └─────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use xxhash_rust::xxh64::xxh64;

use crate::common::{EventMeta, RawEventBuffer};

/// Magic bytes of dump files
pub const FILE_MAGIC: [u8; 8] = *b"PXDDUMP1";

/// Current file format version
pub const FORMAT_VERSION: u32 = 1;

/// Footer magic bytes (different from header to detect truncation)
pub const FOOTER_MAGIC: [u8; 8] = *b"PXDEND01";

/// Fixed footer size in bytes
pub const FOOTER_SIZE: usize = 64;

/// Largest accepted record
pub const MAX_RECORD_SIZE: usize = 256 * 1024 * 1024;

/// File header with run metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpHeader {
    /// Format version
    pub version: u32,

    pub experiment: u16,
    pub run: u16,

    /// File creation time (Unix timestamp in nanoseconds)
    pub created_ns: u64,

    /// Producer of the data (e.g. "emulator")
    pub source: String,

    pub comment: String,

    /// Additional key-value metadata
    pub metadata: HashMap<String, String>,
}

impl DumpHeader {
    pub fn new(experiment: u16, run: u16, source: impl Into<String>) -> Self {
        Self {
            version: FORMAT_VERSION,
            experiment,
            run,
            created_ns: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64,
            source: source.into(),
            comment: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// Serialize header to bytes (with magic prefix)
    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(&FILE_MAGIC);
        let header_bytes = rmp_serde::to_vec(self)?;
        buf.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&header_bytes);
        Ok(buf)
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<usize, FileFormatError> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        Ok(bytes.len())
    }

    /// Read header from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, FileFormatError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != FILE_MAGIC {
            return Err(FileFormatError::InvalidMagic);
        }

        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;

        let header: Self = rmp_serde::from_slice(&data)?;
        if header.version != FORMAT_VERSION {
            return Err(FileFormatError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }
}

/// One trigger: metadata and all of its buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    pub meta: EventMeta,
    pub buffers: Vec<RawEventBuffer>,
}

impl DumpRecord {
    pub fn new(meta: EventMeta, buffers: Vec<RawEventBuffer>) -> Self {
        Self { meta, buffers }
    }

    /// Encode the record body (without the outer length prefix)
    pub fn to_bytes(&self) -> Result<Vec<u8>, FileFormatError> {
        let meta = rmp_serde::to_vec(&self.meta)?;
        let payload: usize = self.buffers.iter().map(|b| 4 + b.len()).sum();
        let mut buf = Vec::with_capacity(8 + meta.len() + payload);
        buf.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        buf.extend_from_slice(&meta);
        buf.extend_from_slice(&(self.buffers.len() as u32).to_le_bytes());
        for buffer in &self.buffers {
            buf.extend_from_slice(&(buffer.len() as u32).to_le_bytes());
            buf.extend_from_slice(buffer.as_bytes());
        }
        Ok(buf)
    }

    /// Decode a record body
    pub fn from_bytes(data: &[u8]) -> Result<Self, FileFormatError> {
        let mut cursor = RecordCursor { data, offset: 0 };
        let meta_len = cursor.u32()? as usize;
        let meta: EventMeta = rmp_serde::from_slice(cursor.take(meta_len)?)?;
        let count = cursor.u32()? as usize;

        let mut buffers = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            let len = cursor.u32()? as usize;
            buffers.push(RawEventBuffer::from(cursor.take(len)?.to_vec()));
        }
        if cursor.offset != data.len() {
            return Err(FileFormatError::CorruptRecord(format!(
                "{} trailing bytes",
                data.len() - cursor.offset
            )));
        }
        Ok(Self { meta, buffers })
    }
}

struct RecordCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> RecordCursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], FileFormatError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(FileFormatError::TooShort)?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, FileFormatError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// File footer containing checksums and completion status
///
/// Fixed 64-byte structure for easy seeking to file end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpFooter {
    pub magic: [u8; 8],

    /// Checksum of all records (length prefixes included)
    pub data_checksum: u64,

    pub total_records: u64,

    /// Bytes of all records (length prefixes included)
    pub data_bytes: u64,

    pub first_trigger: u32,
    pub last_trigger: u32,

    /// File end time (Unix timestamp in nanoseconds)
    pub file_end_time_ns: u64,

    /// Write completion flag (1 = complete, 0 = incomplete/crashed)
    pub write_complete: u8,
}

impl Default for DumpFooter {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpFooter {
    pub fn new() -> Self {
        Self {
            magic: FOOTER_MAGIC,
            data_checksum: 0,
            total_records: 0,
            data_bytes: 0,
            first_trigger: 0,
            last_trigger: 0,
            file_end_time_ns: 0,
            write_complete: 0,
        }
    }

    /// Mark as complete and set end time
    pub fn finalize(&mut self) {
        self.write_complete = 1;
        self.file_end_time_ns = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
    }

    pub fn is_complete(&self) -> bool {
        self.write_complete == 1
    }

    /// Serialize footer to fixed 64-byte array
    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        buf[0..8].copy_from_slice(&self.magic);
        buf[8..16].copy_from_slice(&self.data_checksum.to_le_bytes());
        buf[16..24].copy_from_slice(&self.total_records.to_le_bytes());
        buf[24..32].copy_from_slice(&self.data_bytes.to_le_bytes());
        buf[32..36].copy_from_slice(&self.first_trigger.to_le_bytes());
        buf[36..40].copy_from_slice(&self.last_trigger.to_le_bytes());
        buf[40..48].copy_from_slice(&self.file_end_time_ns.to_le_bytes());
        buf[48] = self.write_complete;
        // 49..64 reserved
        buf
    }

    /// Deserialize footer from 64-byte array
    pub fn from_bytes(data: &[u8; FOOTER_SIZE]) -> Result<Self, FileFormatError> {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&data[0..8]);
        if magic != FOOTER_MAGIC {
            return Err(FileFormatError::InvalidFooterMagic);
        }

        let u64_at = |o: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&data[o..o + 8]);
            u64::from_le_bytes(b)
        };
        let u32_at = |o: usize| u32::from_le_bytes([data[o], data[o + 1], data[o + 2], data[o + 3]]);

        Ok(Self {
            magic,
            data_checksum: u64_at(8),
            total_records: u64_at(16),
            data_bytes: u64_at(24),
            first_trigger: u32_at(32),
            last_trigger: u32_at(36),
            file_end_time_ns: u64_at(40),
            write_complete: data[48],
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), FileFormatError> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, FileFormatError> {
        let mut buf = [0u8; FOOTER_SIZE];
        reader.read_exact(&mut buf)?;
        Self::from_bytes(&buf)
    }
}

/// Incremental checksum calculator using xxHash64
#[derive(Debug, Clone, Default)]
pub struct ChecksumCalculator {
    state: u64,
    bytes_processed: u64,
}

impl ChecksumCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine the hash of one block into the running state
    pub fn update(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let block_hash = xxh64(data, 0);
        self.state = self.state.rotate_left(5) ^ block_hash;
        self.bytes_processed += data.len() as u64;
    }

    pub fn finalize(&self) -> u64 {
        self.state ^ self.bytes_processed
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }
}

/// File format errors
#[derive(Debug, thiserror::Error)]
pub enum FileFormatError {
    #[error("Data too short to contain valid structure")]
    TooShort,

    #[error("Invalid file magic bytes")]
    InvalidMagic,

    #[error("Invalid footer magic bytes")]
    InvalidFooterMagic,

    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum mismatch: expected {expected:016x}, got {actual:016x}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    #[error("Incomplete file (footer indicates crash during write)")]
    IncompleteFile,
}

/// Result of file validation
#[derive(Debug)]
pub struct DumpValidation {
    /// Footer present, complete and checksum matches
    pub is_valid: bool,
    pub header: Option<DumpHeader>,
    pub footer: Option<DumpFooter>,
    /// Records readable from the start of the data region
    pub recoverable_records: u64,
    pub errors: Vec<String>,
}

impl DumpValidation {
    /// File has data but no valid footer
    pub fn needs_recovery(&self) -> bool {
        !self.is_valid && self.recoverable_records > 0
    }
}

/// Reader for dump files with recovery support
pub struct DumpReader<R> {
    reader: R,
    header: DumpHeader,
    footer: Option<DumpFooter>,
    header_size: u64,
    file_size: u64,
}

impl<R: Read + Seek> DumpReader<R> {
    /// Open a dump file; the header must be readable
    pub fn new(mut reader: R) -> Result<Self, FileFormatError> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let header = DumpHeader::read_from(&mut reader)?;
        let header_size = reader.stream_position()?;

        Ok(Self {
            reader,
            header,
            footer: None,
            header_size,
            file_size,
        })
    }

    pub fn header(&self) -> &DumpHeader {
        &self.header
    }

    pub fn footer(&self) -> Option<&DumpFooter> {
        self.footer.as_ref()
    }

    /// Try to read the footer (fails for incomplete files)
    pub fn read_footer(&mut self) -> Result<DumpFooter, FileFormatError> {
        if self.file_size < self.header_size + FOOTER_SIZE as u64 {
            return Err(FileFormatError::TooShort);
        }
        self.reader.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let footer = DumpFooter::read_from(&mut self.reader)?;
        self.footer = Some(footer);
        Ok(footer)
    }

    /// End of the data region: before the footer when there is one
    fn data_end(&self) -> u64 {
        match self.footer {
            Some(_) => self.file_size - FOOTER_SIZE as u64,
            None => self.file_size,
        }
    }

    /// Validate file integrity
    pub fn validate(&mut self) -> DumpValidation {
        let mut result = DumpValidation {
            is_valid: false,
            header: Some(self.header.clone()),
            footer: None,
            recoverable_records: 0,
            errors: Vec::new(),
        };

        match self.read_footer() {
            Ok(footer) => {
                result.footer = Some(footer);
                if !footer.is_complete() {
                    result
                        .errors
                        .push(FileFormatError::IncompleteFile.to_string());
                }
            }
            Err(e) => {
                self.footer = None;
                result.errors.push(format!("Failed to read footer: {}", e));
            }
        }

        let mut calc = ChecksumCalculator::new();
        let mut records = 0u64;
        let mut triggers = None;
        for block in self.blocks() {
            match block {
                Ok((len_bytes, data)) => {
                    calc.update(&len_bytes);
                    calc.update(&data);
                    match DumpRecord::from_bytes(&data) {
                        Ok(record) => {
                            let trigger = record.meta.trigger_number;
                            triggers = Some(triggers.map_or((trigger, trigger), |(f, _)| (f, trigger)));
                            records += 1;
                        }
                        Err(e) => {
                            result.errors.push(format!("Record {}: {}", records, e));
                            break;
                        }
                    }
                }
                Err(e) => {
                    result.errors.push(format!("Record {}: {}", records, e));
                    break;
                }
            }
        }
        result.recoverable_records = records;

        if let Some(footer) = result.footer {
            if footer.is_complete() && result.errors.is_empty() {
                if calc.finalize() != footer.data_checksum {
                    result.errors.push(
                        FileFormatError::ChecksumMismatch {
                            expected: footer.data_checksum,
                            actual: calc.finalize(),
                        }
                        .to_string(),
                    );
                } else if footer.total_records != records {
                    result.errors.push(format!(
                        "Footer declares {} records, found {}",
                        footer.total_records, records
                    ));
                } else if triggers.is_some_and(|(f, l)| (f, l) != (footer.first_trigger, footer.last_trigger)) {
                    result.errors.push("Footer trigger range does not match records".to_string());
                } else {
                    result.is_valid = true;
                }
            }
        }
        result
    }

    /// Raw record blocks (length prefix, body) from the start of the data
    fn blocks(&mut self) -> BlockIterator<'_, R> {
        let data_end = self.data_end();
        let start = self.reader.seek(SeekFrom::Start(self.header_size));
        BlockIterator {
            reader: &mut self.reader,
            data_end,
            done: start.is_err(),
        }
    }

    /// Iterate over records; stops at the footer or the first corrupt block
    pub fn records(&mut self) -> RecordIterator<'_, R> {
        if self.footer.is_none() {
            // footer is optional for recovery; ignore its absence here
            let _ = self.read_footer();
        }
        RecordIterator {
            blocks: self.blocks(),
        }
    }
}

struct BlockIterator<'a, R> {
    reader: &'a mut R,
    data_end: u64,
    done: bool,
}

impl<R: Read + Seek> Iterator for BlockIterator<'_, R> {
    type Item = Result<([u8; 4], Vec<u8>), FileFormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let pos = match self.reader.stream_position() {
            Ok(p) => p,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };
        if pos >= self.data_end {
            self.done = true;
            return None;
        }

        let mut len_bytes = [0u8; 4];
        if let Err(e) = self.reader.read_exact(&mut len_bytes) {
            self.done = true;
            return Some(Err(e.into()));
        }
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len == 0 || len > MAX_RECORD_SIZE || pos + 4 + len as u64 > self.data_end {
            self.done = true;
            return Some(Err(FileFormatError::CorruptRecord(format!(
                "invalid length {} at offset {}",
                len, pos
            ))));
        }

        let mut data = vec![0u8; len];
        if let Err(e) = self.reader.read_exact(&mut data) {
            self.done = true;
            return Some(Err(e.into()));
        }
        Some(Ok((len_bytes, data)))
    }
}

/// Iterator over the records of a dump file
pub struct RecordIterator<'a, R> {
    blocks: BlockIterator<'a, R>,
}

impl<R: Read + Seek> Iterator for RecordIterator<'_, R> {
    type Item = Result<DumpRecord, FileFormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self
            .blocks
            .next()?
            .and_then(|(_, data)| DumpRecord::from_bytes(&data));
        if item.is_err() {
            self.blocks.done = true;
        }
        Some(item)
    }
}

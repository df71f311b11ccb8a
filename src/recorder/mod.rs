//! Recorder - writes raw event buffers to dump files
//!
//! Dump files keep the exact bytes delivered by the readout together with
//! the event metadata, so a run can be decoded again offline.
//!
//! File format (v1):
//! - Header: Magic "PXDDUMP1" + length (4 bytes) + MsgPack metadata
//! - Records: length (4 bytes LE) + record body (repeated)
//! - Footer: Fixed 64 bytes with magic "PXDEND01", checksum, completion flag

mod format;

pub use format::{
    ChecksumCalculator, DumpFooter, DumpHeader, DumpReader, DumpRecord, DumpValidation,
    FileFormatError, RecordIterator, FILE_MAGIC, FOOTER_SIZE, FORMAT_VERSION,
};

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::common::{EventMeta, RawEventBuffer};

/// Writer for dump files
///
/// The footer is only written by [`DumpWriter::finish`]; a file whose writer
/// was dropped early has no footer and is reported as incomplete.
pub struct DumpWriter<W: Write> {
    writer: W,
    footer: DumpFooter,
    checksum: ChecksumCalculator,
}

impl DumpWriter<BufWriter<File>> {
    /// Create a dump file, truncating an existing one
    pub fn create<P: AsRef<Path>>(path: P, header: &DumpHeader) -> Result<Self, FileFormatError> {
        let file = File::create(path.as_ref())?;
        info!(path = %path.as_ref().display(), run = header.run, "Opened dump file");
        Self::new(BufWriter::new(file), header)
    }
}

impl<W: Write> DumpWriter<W> {
    /// Start a dump on any writer
    pub fn new(mut writer: W, header: &DumpHeader) -> Result<Self, FileFormatError> {
        header.write_to(&mut writer)?;
        Ok(Self {
            writer,
            footer: DumpFooter::new(),
            checksum: ChecksumCalculator::new(),
        })
    }

    /// Append one trigger with all of its buffers
    pub fn write_event(
        &mut self,
        meta: &EventMeta,
        buffers: &[RawEventBuffer],
    ) -> Result<(), FileFormatError> {
        let body = DumpRecord::new(*meta, buffers.to_vec()).to_bytes()?;
        let len_bytes = (body.len() as u32).to_le_bytes();
        self.writer.write_all(&len_bytes)?;
        self.writer.write_all(&body)?;
        self.checksum.update(&len_bytes);
        self.checksum.update(&body);

        if self.footer.total_records == 0 {
            self.footer.first_trigger = meta.trigger_number;
        }
        self.footer.last_trigger = meta.trigger_number;
        self.footer.total_records += 1;
        self.footer.data_bytes += (len_bytes.len() + body.len()) as u64;
        debug!(
            trigger = meta.trigger_number,
            buffers = buffers.len(),
            bytes = body.len(),
            "Recorded event"
        );
        Ok(())
    }

    /// Append a single-buffer trigger
    pub fn write(&mut self, meta: &EventMeta, buffer: &RawEventBuffer) -> Result<(), FileFormatError> {
        self.write_event(meta, std::slice::from_ref(buffer))
    }

    pub fn records_written(&self) -> u64 {
        self.footer.total_records
    }

    /// Write the footer and flush; returns the underlying writer
    pub fn finish(mut self) -> Result<(W, DumpFooter), FileFormatError> {
        self.footer.data_checksum = self.checksum.finalize();
        self.footer.finalize();
        self.footer.write_to(&mut self.writer)?;
        self.writer.flush()?;
        info!(
            records = self.footer.total_records,
            bytes = self.footer.data_bytes,
            "Dump file closed"
        );
        Ok((self.writer, self.footer))
    }
}

/// Open a dump file for reading
pub fn open_dump<P: AsRef<Path>>(path: P) -> Result<DumpReader<BufReader<File>>, FileFormatError> {
    DumpReader::new(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn buffer(fill: u8, len: usize) -> RawEventBuffer {
        RawEventBuffer::from(vec![fill; len])
    }

    fn write_dump(events: u32) -> Vec<u8> {
        let header = DumpHeader::new(1, 2, "test");
        let mut writer = DumpWriter::new(Vec::new(), &header).unwrap();
        for i in 0..events {
            let meta = EventMeta::new(100 + i, 1, 2, 0);
            writer.write(&meta, &buffer(i as u8, 16 + i as usize)).unwrap();
        }
        let (bytes, footer) = writer.finish().unwrap();
        assert_eq!(footer.total_records, events as u64);
        bytes
    }

    #[test]
    fn test_write_read_records() {
        let bytes = write_dump(3);
        let mut reader = DumpReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.header().run, 2);

        let records: Vec<DumpRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].meta.trigger_number, 102);
        assert_eq!(records[2].buffers[0], buffer(2, 18));
    }

    #[test]
    fn test_validate_complete_file() {
        let bytes = write_dump(5);
        let mut reader = DumpReader::new(Cursor::new(bytes)).unwrap();
        let result = reader.validate();
        assert!(result.is_valid, "{:?}", result.errors);
        assert_eq!(result.recoverable_records, 5);
        let footer = result.footer.unwrap();
        assert_eq!((footer.first_trigger, footer.last_trigger), (100, 104));
    }

    #[test]
    fn test_validate_truncated_file() {
        let mut bytes = write_dump(4);
        bytes.truncate(bytes.len() - FOOTER_SIZE - 3);
        let mut reader = DumpReader::new(Cursor::new(bytes)).unwrap();
        let result = reader.validate();
        assert!(!result.is_valid);
        assert!(result.needs_recovery());
        assert_eq!(result.recoverable_records, 3);

        let recovered: Vec<_> = reader.records().filter_map(Result::ok).collect();
        assert_eq!(recovered.len(), 3);
    }

    #[test]
    fn test_validate_corrupted_data() {
        let mut bytes = write_dump(2);
        let header_len = DumpHeader::new(1, 2, "test").to_bytes().unwrap().len();
        // flip the last byte of the first buffer
        let len = u32::from_le_bytes(bytes[header_len..header_len + 4].try_into().unwrap());
        bytes[header_len + 4 + len as usize - 1] ^= 0xFF;
        let mut reader = DumpReader::new(Cursor::new(bytes)).unwrap();
        let result = reader.validate();
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("Checksum mismatch")));
    }

    #[test]
    fn test_dropped_writer_has_no_footer() {
        let header = DumpHeader::new(1, 2, "test");
        let mut out = Vec::new();
        {
            let mut writer = DumpWriter::new(&mut out, &header).unwrap();
            writer.write(&EventMeta::new(1, 1, 2, 0), &buffer(0, 8)).unwrap();
        }
        let mut reader = DumpReader::new(Cursor::new(out)).unwrap();
        let result = reader.validate();
        assert!(result.footer.is_none());
        assert_eq!(result.recoverable_records, 1);
    }
}

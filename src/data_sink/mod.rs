//! Data sink - decodes recorded triggers in parallel
//!
//! Architecture:
//! - Producer task: records (dump file or memory) → per-worker mpsc channels
//! - Worker tasks: channel → `Unpacker` → worker-local `DecodeStatistics`
//! - Statistics are merged once all workers have drained their channels
//!
//! Decoding is CPU-bound, so producer and workers run as blocking tasks.

use std::io::{Read, Seek};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::common::{DecodeStatistics, UnpackError, UnpackResult};
use crate::recorder::{DumpReader, DumpRecord};
use crate::unpacker::{DecodedEvent, Unpacker};

/// Sink configuration
#[derive(Debug, Clone)]
pub struct DataSinkConfig {
    /// Number of decode workers
    pub workers: usize,
    /// Per-worker channel capacity
    pub channel_capacity: usize,
    /// Return decoded events (in input order) in addition to statistics
    pub keep_events: bool,
}

impl Default for DataSinkConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            channel_capacity: 256,
            keep_events: false,
        }
    }
}

/// Outcome of one decode run
#[derive(Debug, Default)]
pub struct DecodeReport {
    pub statistics: DecodeStatistics,
    /// Decoded events in input order; empty unless `keep_events`
    pub events: Vec<DecodedEvent>,
    pub elapsed: Duration,
}

type Indexed = (u64, DumpRecord);
type WorkerOutput = (DecodeStatistics, Vec<(u64, DecodedEvent)>);

/// Parallel decoder over a stream of records
pub struct DataSink {
    unpacker: Arc<Unpacker>,
    config: DataSinkConfig,
}

impl DataSink {
    pub fn new(unpacker: Unpacker, config: DataSinkConfig) -> UnpackResult<Self> {
        if config.workers == 0 {
            return Err(UnpackError::invalid_argument("workers must be at least 1"));
        }
        if config.channel_capacity == 0 {
            return Err(UnpackError::invalid_argument(
                "channel capacity must be at least 1",
            ));
        }
        Ok(Self {
            unpacker: Arc::new(unpacker),
            config,
        })
    }

    pub fn config(&self) -> &DataSinkConfig {
        &self.config
    }

    /// Decode every record of a dump file
    pub async fn decode_dump<R>(&self, mut reader: DumpReader<R>) -> UnpackResult<DecodeReport>
    where
        R: Read + Seek + Send + 'static,
    {
        self.run(move |dispatch| {
            for record in reader.records() {
                dispatch(record?)?;
            }
            Ok(())
        })
        .await
    }

    /// Decode records held in memory
    pub async fn decode_records(&self, records: Vec<DumpRecord>) -> UnpackResult<DecodeReport> {
        self.run(move |dispatch| records.into_iter().try_for_each(dispatch))
            .await
    }

    async fn run<P>(&self, produce: P) -> UnpackResult<DecodeReport>
    where
        P: FnOnce(&mut dyn FnMut(DumpRecord) -> UnpackResult<()>) -> UnpackResult<()>
            + Send
            + 'static,
    {
        let start = Instant::now();
        let mut senders = Vec::with_capacity(self.config.workers);
        let mut workers = Vec::with_capacity(self.config.workers);

        for worker_id in 0..self.config.workers {
            let (tx, rx) = mpsc::channel::<Indexed>(self.config.channel_capacity);
            senders.push(tx);
            let unpacker = self.unpacker.clone();
            let keep_events = self.config.keep_events;
            workers.push(tokio::task::spawn_blocking(move || {
                decode_worker(worker_id, &unpacker, rx, keep_events)
            }));
        }

        let producer = tokio::task::spawn_blocking(move || {
            let mut index = 0u64;
            let mut dispatch = |record: DumpRecord| -> UnpackResult<()> {
                let worker = (index % senders.len() as u64) as usize;
                senders[worker]
                    .blocking_send((index, record))
                    .map_err(|_| UnpackError::other("decode worker stopped"))?;
                index += 1;
                Ok(())
            };
            let result = produce(&mut dispatch);
            result.map(|()| index)
        });

        // senders are dropped with the producer, which ends the workers
        let produced = producer.await?;

        let mut statistics = Vec::with_capacity(workers.len());
        let mut events = Vec::new();
        for worker in workers {
            let (stats, decoded) = worker.await?;
            statistics.push(stats);
            events.extend(decoded);
        }
        let records = produced?;

        events.sort_by_key(|(index, _)| *index);
        let report = DecodeReport {
            statistics: statistics.into_iter().sum(),
            events: events.into_iter().map(|(_, event)| event).collect(),
            elapsed: start.elapsed(),
        };

        let secs = report.elapsed.as_secs_f64();
        info!(
            records,
            workers = self.config.workers,
            events_with_errors = report.statistics.events_with_errors,
            rejected = report.statistics.rejected,
            elapsed_ms = report.elapsed.as_millis() as u64,
            rate = if secs > 0.0 { records as f64 / secs } else { 0.0 },
            "Decode finished"
        );
        Ok(report)
    }
}

fn decode_worker(
    worker_id: usize,
    unpacker: &Unpacker,
    mut rx: mpsc::Receiver<Indexed>,
    keep_events: bool,
) -> WorkerOutput {
    let mut stats = DecodeStatistics::new();
    let mut events = Vec::new();
    while let Some((index, record)) = rx.blocking_recv() {
        let event = unpacker.unpack_event(&record.meta, &record.buffers);
        stats.record(&event);
        if keep_events {
            events.push((index, event));
        }
    }
    debug!(worker = worker_id, events = stats.events, "Decode worker done");
    (stats, events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source_emulator::{Emulator, EmulatorConfig};
    use crate::recorder::{DumpHeader, DumpWriter};
    use std::io::Cursor;

    fn emulated(events: u64, faked_fraction: f64) -> Vec<DumpRecord> {
        Emulator::new(EmulatorConfig {
            events,
            seed: Some(7),
            faked_fraction,
            ..Default::default()
        })
        .unwrap()
        .map(|(meta, buffer)| DumpRecord::new(meta, vec![buffer]))
        .collect()
    }

    fn sequential(records: &[DumpRecord]) -> DecodeStatistics {
        let unpacker = Unpacker::with_defaults();
        let mut stats = DecodeStatistics::new();
        for record in records {
            stats.record(&unpacker.unpack_event(&record.meta, &record.buffers));
        }
        stats
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = DataSinkConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            DataSink::new(Unpacker::with_defaults(), config),
            Err(UnpackError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let records = emulated(200, 0.1);
        let expected = sequential(&records);

        let sink = DataSink::new(
            Unpacker::with_defaults(),
            DataSinkConfig {
                workers: 4,
                channel_capacity: 8,
                keep_events: true,
            },
        )
        .unwrap();
        let report = sink.decode_records(records.clone()).await.unwrap();

        assert_eq!(report.statistics, expected);
        assert_eq!(report.events.len(), 200);
        let triggers: Vec<u32> = report.events.iter().map(|e| e.meta.trigger_number).collect();
        let inputs: Vec<u32> = records.iter().map(|r| r.meta.trigger_number).collect();
        assert_eq!(triggers, inputs);
    }

    #[tokio::test]
    async fn test_decode_dump() {
        let records = emulated(20, 0.0);
        let mut writer = DumpWriter::new(Vec::new(), &DumpHeader::new(1, 1, "test")).unwrap();
        for record in &records {
            writer.write_event(&record.meta, &record.buffers).unwrap();
        }
        let (bytes, _) = writer.finish().unwrap();

        let reader = DumpReader::new(Cursor::new(bytes)).unwrap();
        let sink = DataSink::new(Unpacker::with_defaults(), DataSinkConfig::default()).unwrap();
        let report = sink.decode_dump(reader).await.unwrap();

        assert_eq!(report.statistics.events, 20);
        assert_eq!(report.statistics.events_with_errors, 0);
        assert!(report.events.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_dump_reports_error() {
        let records = emulated(5, 0.0);
        let mut writer = DumpWriter::new(Vec::new(), &DumpHeader::new(1, 1, "test")).unwrap();
        for record in &records {
            writer.write_event(&record.meta, &record.buffers).unwrap();
        }
        let (mut bytes, _) = writer.finish().unwrap();
        bytes.truncate(bytes.len() - 100);

        let reader = DumpReader::new(Cursor::new(bytes)).unwrap();
        let sink = DataSink::new(Unpacker::with_defaults(), DataSinkConfig::default()).unwrap();
        let err = sink.decode_dump(reader).await.unwrap_err();
        assert!(matches!(err, UnpackError::Format(_)));
    }
}

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use yak_core::config::{HWM_FILE_NAME, LOG_FILE_NAME, PARTITION_DIR};
use yak_core::record::{LogEndEpoch, Offset, Record, TopicLogMeta};
use yak_core::{Error, Result};

/// A single topic's on-disk log: `messages.log` (one JSON [`Record`] per
/// line) plus an `hwm` sidecar holding the persisted high-water mark as a
/// decimal integer (spec.md §4.1's on-disk layout).
pub struct FileTopicLog {
    topic: String,
    log_path: PathBuf,
    hwm_path: PathBuf,
    log_file: File,
    meta: TopicLogMeta,
}

impl FileTopicLog {
    /// Opens (creating if necessary) the on-disk log for `topic` under
    /// `data_dir`, replaying it to reconstruct `next_offset`/`hwm`/
    /// `log_end_epoch`, discarding any partial trailing line left by a
    /// crash mid-append.
    pub fn open(data_dir: &Path, topic: &str) -> Result<Self> {
        let partition_dir = data_dir.join(topic).join(PARTITION_DIR);
        fs::create_dir_all(&partition_dir).map_err(|source| Error::Storage {
            topic: topic.to_string(),
            source,
        })?;
        let log_path = partition_dir.join(LOG_FILE_NAME);
        let hwm_path = partition_dir.join(HWM_FILE_NAME);

        let (next_offset, log_end_epoch) = Self::replay(&log_path, topic)?;
        let persisted_hwm = Self::read_hwm_sidecar(&hwm_path, topic)?;
        let hwm = persisted_hwm.min(next_offset);

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|source| Error::Storage {
                topic: topic.to_string(),
                source,
            })?;

        Ok(Self {
            topic: topic.to_string(),
            log_path,
            hwm_path,
            log_file,
            meta: TopicLogMeta {
                next_offset,
                hwm,
                log_end_epoch,
            },
        })
    }

    /// Replays `log_path` line by line, discarding a trailing line that
    /// never received its closing newline (an in-flight append at crash
    /// time). A complete line that fails to parse is real corruption.
    fn replay(log_path: &Path, topic: &str) -> Result<(Offset, LogEndEpoch)> {
        if !log_path.exists() {
            return Ok((0, 0));
        }
        let file = File::open(log_path).map_err(|source| Error::Storage {
            topic: topic.to_string(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut valid_bytes: u64 = 0;
        let mut count: Offset = 0;
        let mut log_end_epoch: LogEndEpoch = 0;

        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).map_err(|source| Error::Storage {
                topic: topic.to_string(),
                source,
            })?;
            if n == 0 {
                break; // EOF
            }
            let complete_line = line.ends_with('\n');
            let trimmed = line.trim_end_matches('\n');
            match serde_json::from_str::<Record>(trimmed) {
                Ok(record) => {
                    valid_bytes += n as u64;
                    count += 1;
                    log_end_epoch = record.epoch;
                }
                Err(source) => {
                    if complete_line {
                        // A fully-written line that still doesn't parse is
                        // genuine corruption, not a crash artifact.
                        return Err(Error::Corrupt {
                            topic: topic.to_string(),
                            source,
                        });
                    }
                    // Partial trailing write: stop here, discard it below.
                    break;
                }
            }
        }

        // Drop any partial trailing line so next_offset matches what was
        // actually durably flushed.
        let file = OpenOptions::new()
            .write(true)
            .open(log_path)
            .map_err(|source| Error::Storage {
                topic: topic.to_string(),
                source,
            })?;
        file.set_len(valid_bytes).map_err(|source| Error::Storage {
            topic: topic.to_string(),
            source,
        })?;

        Ok((count, log_end_epoch))
    }

    fn read_hwm_sidecar(hwm_path: &Path, topic: &str) -> Result<Offset> {
        if !hwm_path.exists() {
            return Ok(0);
        }
        let mut contents = String::new();
        File::open(hwm_path)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|source| Error::Storage {
                topic: topic.to_string(),
                source,
            })?;
        Ok(contents.trim().parse().unwrap_or(0))
    }

    fn write_hwm_sidecar(&self) -> Result<()> {
        let mut file = File::create(&self.hwm_path).map_err(|source| Error::Storage {
            topic: self.topic.clone(),
            source,
        })?;
        write!(file, "{}", self.meta.hwm).map_err(|source| Error::Storage {
            topic: self.topic.clone(),
            source,
        })?;
        file.sync_data().map_err(|source| Error::Storage {
            topic: self.topic.clone(),
            source,
        })
    }

    pub fn meta(&self) -> TopicLogMeta {
        self.meta
    }

    pub fn next_offset(&self) -> Offset {
        self.meta.next_offset
    }

    pub fn hwm(&self) -> Offset {
        self.meta.hwm
    }

    pub fn last_epoch(&self) -> LogEndEpoch {
        self.meta.log_end_epoch
    }

    /// Appends `message` under `epoch`, returning the assigned offset.
    /// `next_offset` is only advanced after the line and its trailing
    /// newline are durably flushed (spec.md §4.1's atomicity rule).
    pub fn append(&mut self, message: Vec<u8>, epoch: LogEndEpoch) -> Result<Offset> {
        let offset = self.meta.next_offset;
        let record = Record {
            offset,
            topic: self.topic.clone(),
            message,
            epoch,
        };
        let mut line = serde_json::to_vec(&record).map_err(|source| Error::Corrupt {
            topic: self.topic.clone(),
            source,
        })?;
        line.push(b'\n');
        self.log_file
            .write_all(&line)
            .and_then(|()| self.log_file.sync_data())
            .map_err(|source| Error::Storage {
                topic: self.topic.clone(),
                source,
            })?;

        self.meta.next_offset += 1;
        self.meta.log_end_epoch = epoch;
        Ok(offset)
    }

    /// Returns the contiguous run of records starting at `from_offset`,
    /// capped at `max_count`. Empty if `from_offset == next_offset`.
    pub fn read(&self, from_offset: Offset, max_count: usize) -> Result<Vec<Record>> {
        if from_offset > self.meta.next_offset {
            return Err(Error::OutOfRange {
                topic: self.topic.clone(),
                requested: from_offset,
                next_offset: self.meta.next_offset,
            });
        }
        if from_offset == self.meta.next_offset || max_count == 0 {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path).map_err(|source| Error::Storage {
            topic: self.topic.clone(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut out = Vec::with_capacity(max_count.min((self.meta.next_offset - from_offset) as usize));
        for line in reader
            .lines()
            .skip(from_offset as usize)
            .take(max_count)
        {
            let line = line.map_err(|source| Error::Storage {
                topic: self.topic.clone(),
                source,
            })?;
            let record: Record = serde_json::from_str(&line).map_err(|source| Error::Corrupt {
                topic: self.topic.clone(),
                source,
            })?;
            out.push(record);
        }
        Ok(out)
    }

    /// Discards every record at or after `new_end`. Never allowed to
    /// reach below `hwm` (spec.md §4.1 and §4.4's truncate-safety
    /// invariant).
    pub fn truncate_to(&mut self, new_end: Offset) -> Result<()> {
        if new_end < self.meta.hwm {
            return Err(Error::TruncateBelowHwm {
                topic: self.topic.clone(),
                requested: new_end,
                hwm: self.meta.hwm,
            });
        }
        if new_end >= self.meta.next_offset {
            return Ok(());
        }

        let kept = self.read(0, new_end as usize)?;
        let mut rewritten = Vec::new();
        for record in &kept {
            serde_json::to_writer(&mut rewritten, record).map_err(|source| Error::Corrupt {
                topic: self.topic.clone(),
                source,
            })?;
            rewritten.push(b'\n');
        }

        let tmp_path = self.log_path.with_extension("log.tmp");
        fs::write(&tmp_path, &rewritten).map_err(|source| Error::Storage {
            topic: self.topic.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.log_path).map_err(|source| Error::Storage {
            topic: self.topic.clone(),
            source,
        })?;

        self.log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|source| Error::Storage {
                topic: self.topic.clone(),
                source,
            })?;

        self.meta.next_offset = new_end;
        self.meta.log_end_epoch = kept.last().map_or(0, |r| r.epoch);
        Ok(())
    }

    /// Advances the committed prefix. Rejects any attempt to move `hwm`
    /// backwards or past the log end (spec.md §4.1).
    pub fn set_hwm(&mut self, new_hwm: Offset) -> Result<()> {
        if new_hwm < self.meta.hwm || new_hwm > self.meta.next_offset {
            return Err(Error::InvalidHwm {
                topic: self.topic.clone(),
                requested: new_hwm,
                current: self.meta.hwm,
                next_offset: self.meta.next_offset,
            });
        }
        self.meta.hwm = new_hwm;
        self.write_hwm_sidecar()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileTopicLog::open(dir.path(), "orders").unwrap();
        let o0 = log.append(b"a".to_vec(), 1).unwrap();
        let o1 = log.append(b"b".to_vec(), 1).unwrap();
        assert_eq!((o0, o1), (0, 1));
        assert_eq!(log.next_offset(), 2);

        let records = log.read(0, 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, b"a");
        assert_eq!(records[1].message, b"b");
    }

    #[test]
    fn read_past_end_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileTopicLog::open(dir.path(), "t").unwrap();
        let err = log.read(5, 10).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
    }

    #[test]
    fn hwm_cannot_move_backwards_or_past_log_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileTopicLog::open(dir.path(), "t").unwrap();
        log.append(b"a".to_vec(), 1).unwrap();
        log.set_hwm(1).unwrap();
        assert!(log.set_hwm(0).is_err());
        assert!(log.set_hwm(5).is_err());
    }

    #[test]
    fn truncate_below_hwm_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileTopicLog::open(dir.path(), "t").unwrap();
        log.append(b"a".to_vec(), 1).unwrap();
        log.append(b"b".to_vec(), 1).unwrap();
        log.set_hwm(2).unwrap();
        assert!(log.truncate_to(1).is_err());
        assert!(log.truncate_to(2).is_ok());
    }

    #[test]
    fn restart_discards_partial_trailing_line() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = FileTopicLog::open(dir.path(), "t").unwrap();
            log.append(b"a".to_vec(), 1).unwrap();
        }
        // Simulate a crash mid-write: append a line with no trailing newline.
        let log_path = dir.path().join("t").join(PARTITION_DIR).join(LOG_FILE_NAME);
        let mut f = OpenOptions::new().append(true).open(&log_path).unwrap();
        write!(f, "{{\"offset\":1,\"topic\":\"t\"").unwrap();
        drop(f);

        let log = FileTopicLog::open(dir.path(), "t").unwrap();
        assert_eq!(log.next_offset(), 1);
    }
}

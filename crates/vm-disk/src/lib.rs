//! The disk store: a 4-D sector array indexed by `(track, cylinder,
//! sector)`, each cell an 8-character string. There is no head-motion
//! simulation — seeks just record the current head position for the
//! `disk` console command to report.

use std::sync::Mutex;

use vm_core::Logger;
use vm_word::Word;

pub const TRACKS: i64 = 10;
pub const CYLINDERS: i64 = 10;
pub const SECTORS_PER_CYLINDER: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum DiskFault {
    #[error("sector coordinates out of range")]
    OutOfRange,
}

/// Current read/write head position, tracked for `disk`-info purposes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Head {
    pub track: i64,
    pub cylinder: i64,
    pub sector: i64,
}

pub struct Disk {
    sectors: Mutex<Vec<String>>,
    head: Mutex<Head>,
    logger: vm_core::SharedLogger,
}

impl Disk {
    #[must_use]
    pub fn new(logger: vm_core::SharedLogger) -> Self {
        let total = (TRACKS * CYLINDERS * SECTORS_PER_CYLINDER) as usize;
        Self {
            sectors: Mutex::new(vec!["00000000".to_string(); total]),
            head: Mutex::new(Head::default()),
            logger,
        }
    }

    fn index(track: i64, cylinder: i64, sector: i64) -> Option<usize> {
        if (0..TRACKS).contains(&track)
            && (0..CYLINDERS).contains(&cylinder)
            && (0..SECTORS_PER_CYLINDER).contains(&sector)
        {
            let idx = (track * CYLINDERS + cylinder) * SECTORS_PER_CYLINDER + sector;
            Some(idx as usize)
        } else {
            None
        }
    }

    /// Read the 8-character payload at `(track, cylinder, sector)`. Invalid
    /// coordinates log an error and yield `Word::error_sentinel()`.
    pub fn read_sector(&self, track: i64, cylinder: i64, sector: i64) -> Result<Word, DiskFault> {
        match Self::index(track, cylinder, sector) {
            Some(idx) => Ok(Word::from_raw(self.sectors.lock().unwrap()[idx].clone())),
            None => {
                self.logger.error(&format!(
                    "read_sector: ({track},{cylinder},{sector}) out of range"
                ));
                Err(DiskFault::OutOfRange)
            }
        }
    }

    /// Write `data` to `(track, cylinder, sector)`. A payload whose length
    /// isn't 8 logs a warning but is written verbatim anyway.
    pub fn write_sector(
        &self,
        track: i64,
        cylinder: i64,
        sector: i64,
        data: &Word,
    ) -> Result<(), DiskFault> {
        match Self::index(track, cylinder, sector) {
            Some(idx) => {
                if data.as_str().len() != 8 {
                    self.logger.warning(&format!(
                        "write_sector: payload length {} != 8",
                        data.as_str().len()
                    ));
                }
                self.sectors.lock().unwrap()[idx] = data.as_str().to_string();
                Ok(())
            }
            None => {
                self.logger.error(&format!(
                    "write_sector: ({track},{cylinder},{sector}) out of range"
                ));
                Err(DiskFault::OutOfRange)
            }
        }
    }

    /// Move the head to `(track, cylinder, sector)`. Not used by any
    /// opcode in the core ISA; present so `disk`-info can report a
    /// meaningful position once a future revision adds seeking.
    pub fn seek(&self, track: i64, cylinder: i64, sector: i64) {
        *self.head.lock().unwrap() = Head {
            track,
            cylinder,
            sector,
        };
    }

    #[must_use]
    pub fn head(&self) -> Head {
        *self.head.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm_core::NullLogger;
    use std::sync::Arc;

    fn disk() -> Disk {
        Disk::new(Arc::new(NullLogger))
    }

    #[test]
    fn fresh_disk_reads_zero_sectors() {
        let d = disk();
        assert_eq!(d.read_sector(0, 0, 0).unwrap().as_str(), "00000000");
        assert_eq!(d.read_sector(9, 9, 99).unwrap().as_str(), "00000000");
    }

    #[test]
    fn write_then_read_round_trips() {
        let d = disk();
        d.write_sector(3, 4, 50, &Word::from_raw("12345678")).unwrap();
        assert_eq!(d.read_sector(3, 4, 50).unwrap().as_str(), "12345678");
    }

    #[test]
    fn out_of_range_coordinates_fault() {
        let d = disk();
        assert!(d.read_sector(10, 0, 0).is_err());
        assert!(d.read_sector(0, 0, 100).is_err());
        assert!(d.write_sector(-1, 0, 0, &Word::zero()).is_err());
    }

    #[test]
    fn short_payload_is_written_verbatim_with_a_warning() {
        let d = disk();
        d.write_sector(0, 0, 0, &Word::from_raw("1234")).unwrap();
        assert_eq!(d.read_sector(0, 0, 0).unwrap().as_str(), "1234");
    }

    #[test]
    fn seek_updates_head_position() {
        let d = disk();
        assert_eq!(d.head(), Head::default());
        d.seek(2, 3, 4);
        assert_eq!(d.head(), Head { track: 2, cylinder: 3, sector: 4 });
    }
}

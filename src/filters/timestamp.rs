//! Timestamp seek filter
//!
//! Produces the ascending, non-overlapping key windows a scan visits.
//!
//! ## Persisted Payloads
//! ```text
//! Ranges    (tag 0x01): count u32 | count × (start u64, stop u64)
//! Intervals (tag 0x02): start u64 | stop u64 | interval u64 | tolerance u64
//! ```

use bytes::{BufMut, BytesMut};

use crate::encoding::varint::{ensure, get_u32_le, get_u64_le};
use crate::error::{HistError, Result};
use crate::model::HistorianKey;

pub const TAG_RANGES: u8 = 0x01;
pub const TAG_INTERVALS: u8 = 0x02;

/// Inclusive key window `[start, stop]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyWindow {
    pub start: HistorianKey,
    pub stop: HistorianKey,
}

impl KeyWindow {
    pub fn new(start: HistorianKey, stop: HistorianKey) -> Self {
        Self { start, stop }
    }

    /// Window covering every point in `[start_time, stop_time]`
    pub fn for_timestamps(start_time: u64, stop_time: u64) -> Self {
        Self::new(
            HistorianKey::lower_bound(start_time),
            HistorianKey::upper_bound(stop_time),
        )
    }

    pub fn contains(&self, key: &HistorianKey) -> bool {
        *key >= self.start && *key <= self.stop
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Timestamps {
    Ranges(Vec<(u64, u64)>),
    Intervals {
        start: u64,
        stop: u64,
        interval: u64,
        tolerance: u64,
    },
}

/// Seek filter over closed timestamp ranges.
///
/// Construction rejects descending or overlapping ranges, so every window
/// sequence it yields is ascending and disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFilter {
    timestamps: Timestamps,
}

impl TimestampFilter {
    /// All points in `[start, stop]`
    pub fn from_range(start: u64, stop: u64) -> Result<Self> {
        Self::from_ranges(vec![(start, stop)])
    }

    /// All points in any of the given ranges.
    ///
    /// Ranges must be ascending and must not overlap or touch.
    pub fn from_ranges(ranges: Vec<(u64, u64)>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(HistError::InvalidArgument(
                "timestamp filter needs at least one range".to_string(),
            ));
        }

        let mut previous: Option<(u64, u64)> = None;
        for &(start, stop) in &ranges {
            if start > stop {
                return Err(HistError::InvalidRange { start, stop });
            }
            if let Some((prev_start, prev_stop)) = previous {
                if start <= prev_stop {
                    return Err(HistError::OverlappingRanges {
                        prev_start,
                        prev_stop,
                        start,
                        stop,
                    });
                }
            }
            previous = Some((start, stop));
        }

        Ok(Self {
            timestamps: Timestamps::Ranges(ranges),
        })
    }

    /// Windows of `±tolerance` around `start`, `start + interval`, ... up to
    /// `stop`. Windows are generated lazily.
    pub fn from_intervals(start: u64, stop: u64, interval: u64, tolerance: u64) -> Result<Self> {
        if start > stop {
            return Err(HistError::InvalidRange { start, stop });
        }
        if interval == 0 {
            return Err(HistError::InvalidArgument(
                "interval must be greater than zero".to_string(),
            ));
        }
        if tolerance.saturating_mul(2) >= interval {
            return Err(HistError::InvalidArgument(format!(
                "tolerance {} overlaps neighbouring windows of interval {}",
                tolerance, interval
            )));
        }

        Ok(Self {
            timestamps: Timestamps::Intervals {
                start,
                stop,
                interval,
                tolerance,
            },
        })
    }

    /// Lazy ascending sequence of key windows
    pub fn windows(&self) -> SeekWindows {
        let inner = match &self.timestamps {
            Timestamps::Ranges(ranges) => WindowSource::Ranges(ranges.clone().into_iter()),
            Timestamps::Intervals {
                start,
                stop,
                interval,
                tolerance,
            } => WindowSource::Intervals {
                next: Some(*start),
                stop: *stop,
                interval: *interval,
                tolerance: *tolerance,
            },
        };
        SeekWindows { inner }
    }

    /// True if any window covers `timestamp`
    pub fn contains_timestamp(&self, timestamp: u64) -> bool {
        match &self.timestamps {
            Timestamps::Ranges(ranges) => ranges
                .iter()
                .any(|&(start, stop)| timestamp >= start && timestamp <= stop),
            Timestamps::Intervals {
                start,
                stop,
                interval,
                tolerance,
            } => {
                let low = start.saturating_sub(*tolerance);
                let high = stop.saturating_add(*tolerance);
                if timestamp < low || timestamp > high {
                    return false;
                }
                // Nearest grid point at or below, then the one above
                let offset = timestamp.saturating_sub(*start);
                let below = start + (offset / interval) * interval;
                let candidates = [Some(below), below.checked_add(*interval)];
                candidates.iter().flatten().any(|&t| {
                    t <= *stop && timestamp >= t.saturating_sub(*tolerance)
                        && timestamp <= t.saturating_add(*tolerance)
                })
            }
        }
    }

    pub fn tag(&self) -> u8 {
        match self.timestamps {
            Timestamps::Ranges(_) => TAG_RANGES,
            Timestamps::Intervals { .. } => TAG_INTERVALS,
        }
    }

    /// Write tag + payload
    pub fn save(&self, out: &mut BytesMut) -> Result<()> {
        out.put_u8(self.tag());
        match &self.timestamps {
            Timestamps::Ranges(ranges) => {
                let count = u32::try_from(ranges.len()).map_err(|_| {
                    HistError::InvalidArgument(format!("{} ranges exceed u32", ranges.len()))
                })?;
                out.put_u32_le(count);
                for &(start, stop) in ranges {
                    out.put_u64_le(start);
                    out.put_u64_le(stop);
                }
            }
            Timestamps::Intervals {
                start,
                stop,
                interval,
                tolerance,
            } => {
                out.put_u64_le(*start);
                out.put_u64_le(*stop);
                out.put_u64_le(*interval);
                out.put_u64_le(*tolerance);
            }
        }
        Ok(())
    }

    /// Read the payload for an already consumed `tag`.
    ///
    /// Persisted ranges go through the same validation as freshly built ones.
    pub fn load_payload(tag: u8, input: &mut &[u8]) -> Result<Self> {
        match tag {
            TAG_RANGES => {
                let count = get_u32_le(input)? as usize;
                ensure(input, count.saturating_mul(16))?;
                let mut ranges = Vec::with_capacity(count);
                for _ in 0..count {
                    let start = get_u64_le(input)?;
                    let stop = get_u64_le(input)?;
                    ranges.push((start, stop));
                }
                Self::from_ranges(ranges)
            }
            TAG_INTERVALS => {
                let start = get_u64_le(input)?;
                let stop = get_u64_le(input)?;
                let interval = get_u64_le(input)?;
                let tolerance = get_u64_le(input)?;
                Self::from_intervals(start, stop, interval, tolerance)
            }
            tag => Err(HistError::UnsupportedFormat {
                kind: "timestamp filter",
                tag,
            }),
        }
    }
}

#[derive(Debug, Clone)]
enum WindowSource {
    Everything { done: bool },
    Ranges(std::vec::IntoIter<(u64, u64)>),
    Intervals {
        next: Option<u64>,
        stop: u64,
        interval: u64,
        tolerance: u64,
    },
}

/// Owned iterator of [`KeyWindow`]s, ascending and disjoint.
#[derive(Debug, Clone)]
pub struct SeekWindows {
    inner: WindowSource,
}

impl SeekWindows {
    /// A single window spanning the whole key space
    pub fn everything() -> Self {
        Self {
            inner: WindowSource::Everything { done: false },
        }
    }
}

impl Iterator for SeekWindows {
    type Item = KeyWindow;

    fn next(&mut self) -> Option<KeyWindow> {
        match &mut self.inner {
            WindowSource::Everything { done } => {
                if *done {
                    return None;
                }
                *done = true;
                Some(KeyWindow::new(HistorianKey::MIN, HistorianKey::MAX))
            }
            WindowSource::Ranges(ranges) => ranges
                .next()
                .map(|(start, stop)| KeyWindow::for_timestamps(start, stop)),
            WindowSource::Intervals {
                next,
                stop,
                interval,
                tolerance,
            } => {
                let t = (*next)?;
                if t > *stop {
                    *next = None;
                    return None;
                }
                *next = t.checked_add(*interval);
                Some(KeyWindow::for_timestamps(
                    t.saturating_sub(*tolerance),
                    t.saturating_add(*tolerance),
                ))
            }
        }
    }
}

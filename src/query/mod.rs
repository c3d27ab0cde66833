//! Query Module
//!
//! Composes filters and an engine read session into point streams, and
//! merges streams into timestamp-aligned frames.
//!
//! ```text
//! engine.open_reader() ──► reader.read(options, filters) ──► PointStream
//!                                                               │
//!                                             merge_to_frames ◄─┘
//!                                                   │
//!                                                   ▼
//!                                     BTreeMap<timestamp, FrameData>
//! ```

mod frames;
mod point_stream;

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::filters::{
    MatchFilter, PointIdFilter, ScanFilters, SeekFilter, TimestampFilter, ValueMatchFilter,
};
use crate::storage::{ReaderOptions, SortedTreeEngine};

pub use frames::{merge_to_frames, FrameData};
pub use point_stream::PointStream;

/// Open a read session on `engine` and start one scan.
///
/// If the scan cannot be started the session is released before the error
/// is returned.
pub fn open_point_stream<E>(
    engine: &E,
    options: &ReaderOptions,
    seek: SeekFilter,
    key_match: MatchFilter,
    value_match: ValueMatchFilter,
) -> Result<PointStream>
where
    E: SortedTreeEngine + ?Sized,
{
    let reader = engine.open_reader()?;
    let stream = PointStream::open(reader, options, ScanFilters::new(seek, key_match, value_match))?;
    debug!(?options, "Point stream opened");
    Ok(stream)
}

/// Shorthand scans on any engine.
///
/// Every scan takes its limits from `config.reader_options`.
pub trait PointStreamExt: SortedTreeEngine {
    /// Every point in `[start, stop]`
    fn point_stream_range(&self, config: &Config, start: u64, stop: u64) -> Result<PointStream> {
        let seek = TimestampFilter::from_range(start, stop)?;
        self.point_stream_filtered(config, seek.into(), MatchFilter::All)
    }

    /// The listed points in `[start, stop]`
    fn point_stream_points(
        &self,
        config: &Config,
        start: u64,
        stop: u64,
        points: &[u64],
    ) -> Result<PointStream> {
        let seek = TimestampFilter::from_range(start, stop)?;
        self.point_stream_seek_points(config, seek.into(), points)
    }

    /// The listed points inside an arbitrary seek filter
    fn point_stream_seek_points(
        &self,
        config: &Config,
        seek: SeekFilter,
        points: &[u64],
    ) -> Result<PointStream> {
        let key_match = PointIdFilter::from_list(points.iter().copied());
        self.point_stream_filtered(config, seek, key_match.into())
    }

    /// Arbitrary seek and match filters
    fn point_stream_filtered(
        &self,
        config: &Config,
        seek: SeekFilter,
        key_match: MatchFilter,
    ) -> Result<PointStream> {
        open_point_stream(
            self,
            &config.reader_options,
            seek,
            key_match,
            ValueMatchFilter::All,
        )
    }

    /// Frames for `[start, stop]`, optionally limited to `points`
    fn frames(
        &self,
        config: &Config,
        start: u64,
        stop: u64,
        points: Option<&[u64]>,
    ) -> Result<BTreeMap<u64, FrameData>> {
        let mut stream = match points {
            Some(points) => self.point_stream_points(config, start, stop, points)?,
            None => self.point_stream_range(config, start, stop)?,
        };
        merge_to_frames(&mut stream)
    }
}

impl<E: SortedTreeEngine + ?Sized> PointStreamExt for E {}

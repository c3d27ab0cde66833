//! Tests for point streams and frame merge
//!
//! These tests verify:
//! - Seek pruning returns exactly the in-window subsequence of a full scan
//! - Frame grouping by timestamp
//! - The read session is released exactly once, cursor first
//! - Reader option limits end the sequence
//! - Out-of-order input to the merge is rejected

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use histkv::filters::{
    MatchFilter, PointIdFilter, ScanFilters, SeekFilter, TimestampFilter, ValueFilter,
    ValueMatchFilter,
};
use histkv::storage::{EngineReader, MemoryArchive, ReaderOptions, SortedTreeEngine, TreeStream};
use histkv::{
    merge_to_frames, open_point_stream, Config, FrameData, HistError, HistorianKey, HistorianValue,
    PointStream, PointStreamExt, Result, ValueStruct,
};

// =============================================================================
// Helper Functions
// =============================================================================

/// Four points every 100 ticks from t=0 to t=1900
fn populated_archive() -> MemoryArchive {
    let archive = MemoryArchive::new();
    archive.extend((0..20u64).flat_map(|step| {
        (0..4u64).map(move |point_id| {
            (
                HistorianKey::new(step * 100, point_id),
                HistorianValue::new((step * 10 + point_id) as f64, (step % 3) as u32),
            )
        })
    }));
    archive
}

fn collect(stream: &mut PointStream) -> Vec<(HistorianKey, HistorianValue)> {
    let mut records = Vec::new();
    while stream.read().unwrap() {
        assert!(stream.is_valid());
        records.push((*stream.current_key(), *stream.current_value()));
    }
    assert!(!stream.is_valid());
    records
}

fn full_scan(engine: &MemoryArchive) -> Vec<(HistorianKey, HistorianValue)> {
    let mut stream = open_point_stream(
        engine,
        &ReaderOptions::default(),
        SeekFilter::All,
        MatchFilter::All,
        ValueMatchFilter::All,
    )
    .unwrap();
    collect(&mut stream)
}

/// In-memory stream over a fixed record list
struct VecStream {
    records: Vec<(HistorianKey, HistorianValue)>,
    position: usize,
    key: HistorianKey,
    value: HistorianValue,
    fail_at: Option<usize>,
}

impl VecStream {
    fn new(records: Vec<(u64, u64, f64)>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|(ts, id, v)| (HistorianKey::new(ts, id), HistorianValue::new(v, 0)))
                .collect(),
            position: 0,
            key: HistorianKey::default(),
            value: HistorianValue::default(),
            fail_at: None,
        }
    }
}

impl TreeStream for VecStream {
    fn read(&mut self) -> Result<bool> {
        if self.fail_at == Some(self.position) {
            return Err(HistError::Corruption("injected failure".to_string()));
        }
        match self.records.get(self.position) {
            Some(&(key, value)) => {
                self.key = key;
                self.value = value;
                self.position += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn current_key(&self) -> &HistorianKey {
        &self.key
    }

    fn current_value(&self) -> &HistorianValue {
        &self.value
    }

    fn cancel(&mut self) {
        self.position = self.records.len();
    }
}

// =============================================================================
// Seek Pruning Tests
// =============================================================================

#[test]
fn test_seek_filters_equal_filtered_full_scan() {
    let archive = populated_archive();
    let everything = full_scan(&archive);

    let filters = vec![
        TimestampFilter::from_range(250, 750).unwrap(),
        TimestampFilter::from_range(0, 0).unwrap(),
        TimestampFilter::from_ranges(vec![(100, 200), (450, 500), (1_800, u64::MAX)]).unwrap(),
        TimestampFilter::from_intervals(0, 2_000, 300, 100).unwrap(),
        TimestampFilter::from_range(5_000, 6_000).unwrap(),
    ];

    for filter in filters {
        let expected: Vec<_> = everything
            .iter()
            .copied()
            .filter(|(key, _)| filter.contains_timestamp(key.timestamp))
            .collect();

        let mut stream = archive
            .point_stream_filtered(&Config::default(), filter.clone().into(), MatchFilter::All)
            .unwrap();
        assert_eq!(collect(&mut stream), expected, "filter {:?}", filter);
    }
}

#[test]
fn test_point_and_value_filters_compose() {
    let archive = populated_archive();
    let everything = full_scan(&archive);

    let value_filter = ValueFilter::exclude_quality(0x1);
    let points = PointIdFilter::from_list([0, 3]);
    let expected: Vec<_> = everything
        .iter()
        .copied()
        .filter(|(key, value)| {
            key.timestamp <= 1_000 && points.contains(key.point_id) && value_filter.contains(value)
        })
        .collect();

    let mut stream = open_point_stream(
        &archive,
        &ReaderOptions::default(),
        TimestampFilter::from_range(0, 1_000).unwrap().into(),
        points.into(),
        value_filter.into(),
    )
    .unwrap();
    assert_eq!(collect(&mut stream), expected);
}

#[test]
fn test_extension_overloads() {
    let archive = populated_archive();

    let mut range = archive.point_stream_range(&Config::default(), 300, 400).unwrap();
    assert_eq!(collect(&mut range).len(), 8);

    let mut points = archive.point_stream_points(&Config::default(), 300, 400, &[2]).unwrap();
    let keys: Vec<_> = collect(&mut points).into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec![HistorianKey::new(300, 2), HistorianKey::new(400, 2)]);

    let seek: SeekFilter = TimestampFilter::from_ranges(vec![(0, 0), (1_900, 1_900)]).unwrap().into();
    let mut seek_points = archive.point_stream_seek_points(&Config::default(), seek, &[1, 3]).unwrap();
    assert_eq!(collect(&mut seek_points).len(), 4);
}

#[test]
fn test_query_matching_nothing_is_empty() {
    let archive = populated_archive();

    let mut stream = archive.point_stream_points(&Config::default(), 0, 1_900, &[99]).unwrap();
    assert!(collect(&mut stream).is_empty());
    assert!(archive.frames(&Config::default(), 10_000, 20_000, None).unwrap().is_empty());

    let empty = MemoryArchive::new();
    assert!(full_scan(&empty).is_empty());
}

#[test]
fn test_stream_reads_a_snapshot() {
    let archive = populated_archive();
    let mut stream = archive.point_stream_range(&Config::default(), 0, u64::MAX).unwrap();
    assert!(stream.read().unwrap());

    archive.insert(HistorianKey::new(5_000, 0), HistorianValue::new(1.0, 0));

    let mut remaining = 1;
    while stream.read().unwrap() {
        remaining += 1;
    }
    assert_eq!(remaining, 80);
    assert_eq!(archive.len(), 81);
}

// =============================================================================
// Frame Merge Tests
// =============================================================================

#[test]
fn test_frame_grouping_example() {
    let mut stream = VecStream::new(vec![(100, 1, 5.0), (100, 2, 6.0), (200, 1, 7.0)]);
    let frames = merge_to_frames(&mut stream).unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(
        100,
        FrameData::new(
            vec![1, 2],
            vec![
                ValueStruct { value: 5.0, quality: 0 },
                ValueStruct { value: 6.0, quality: 0 },
            ],
        ),
    );
    expected.insert(
        200,
        FrameData::new(vec![1], vec![ValueStruct { value: 7.0, quality: 0 }]),
    );
    assert_eq!(frames, expected);

    let frame = &frames[&100];
    assert_eq!(frame.len(), 2);
    assert_eq!(frame.get(2).map(|v| v.value), Some(6.0));
    assert_eq!(frame.get(3), None);
}

#[test]
fn test_frames_from_engine() {
    let archive = populated_archive();
    let frames = archive.frames(&Config::default(), 500, 800, Some(&[1, 2])).unwrap();

    assert_eq!(frames.keys().copied().collect::<Vec<_>>(), vec![500, 600, 700, 800]);
    for (timestamp, frame) in &frames {
        assert_eq!(frame.point_ids(), &[1u64, 2]);
        let step = timestamp / 100;
        assert_eq!(frame.values()[0].value, (step * 10 + 1) as f64);
        assert_eq!(frame.values()[1].value, (step * 10 + 2) as f64);
    }
}

#[test]
fn test_merge_rejects_out_of_order_timestamps() {
    let mut stream = VecStream::new(vec![(200, 1, 1.0), (100, 1, 2.0)]);
    assert!(matches!(
        merge_to_frames(&mut stream),
        Err(HistError::OutOfOrder { previous: 200, current: 100 })
    ));
}

#[test]
fn test_merge_propagates_stream_errors() {
    let mut stream = VecStream::new(vec![(100, 1, 1.0), (200, 1, 2.0)]);
    stream.fail_at = Some(1);
    assert!(matches!(merge_to_frames(&mut stream), Err(HistError::Corruption(_))));
}

#[test]
fn test_merge_of_empty_stream() {
    let mut stream = VecStream::new(Vec::new());
    assert!(merge_to_frames(&mut stream).unwrap().is_empty());
}

// =============================================================================
// Release Tests
// =============================================================================

#[test]
fn test_drop_without_read_releases_session() {
    let archive = populated_archive();
    let stream = archive.point_stream_range(&Config::default(), 0, 100).unwrap();
    assert_eq!(archive.stats().active_readers(), 1);
    assert_eq!(archive.stats().active_cursors(), 1);

    drop(stream);
    assert_eq!(archive.stats().readers_opened(), 1);
    assert_eq!(archive.stats().readers_released(), 1);
    assert_eq!(archive.stats().active_cursors(), 0);
}

#[test]
fn test_abandoned_mid_scan_releases_session() {
    let archive = populated_archive();
    {
        let mut stream = archive.point_stream_range(&Config::default(), 0, u64::MAX).unwrap();
        assert!(stream.read().unwrap());
        assert!(stream.read().unwrap());
    }
    assert_eq!(archive.stats().active_readers(), 0);
    assert_eq!(archive.stats().readers_released(), 1);
    assert_eq!(archive.stats().active_cursors(), 0);
}

#[test]
fn test_close_releases_once() {
    let archive = populated_archive();
    let mut stream = archive.point_stream_range(&Config::default(), 0, 100).unwrap();
    while stream.read().unwrap() {}

    // Exhausted cursors let go of their source before the session ends
    assert_eq!(archive.stats().active_cursors(), 0);
    assert_eq!(archive.stats().active_readers(), 1);

    stream.close();
    assert_eq!(archive.stats().readers_released(), 1);
    assert_eq!(archive.stats().active_readers(), 0);
}

#[test]
fn test_stream_from_open_reader() {
    let archive = populated_archive();
    let reader = archive.open_reader().unwrap();
    assert_eq!(archive.stats().active_readers(), 1);

    let filters = ScanFilters::new(
        TimestampFilter::from_range(0, 100).unwrap().into(),
        PointIdFilter::from_list([3]).into(),
        ValueMatchFilter::All,
    );
    let mut stream = PointStream::open(reader, &ReaderOptions::default(), filters).unwrap();
    let keys: Vec<_> = collect(&mut stream).into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec![HistorianKey::new(0, 3), HistorianKey::new(100, 3)]);

    drop(stream);
    assert_eq!(archive.stats().readers_released(), 1);
}

#[test]
fn test_merge_then_drop_releases_session() {
    let archive = populated_archive();
    let frames = archive.frames(&Config::default(), 0, 300, None).unwrap();
    assert_eq!(frames.len(), 4);
    assert_eq!(archive.stats().readers_opened(), 1);
    assert_eq!(archive.stats().active_readers(), 0);
}

/// Engine that records lifecycle events in order
struct RecordingEngine {
    events: Arc<Mutex<Vec<&'static str>>>,
}

struct RecordingReader {
    events: Arc<Mutex<Vec<&'static str>>>,
}

struct RecordingStream {
    events: Arc<Mutex<Vec<&'static str>>>,
    key: HistorianKey,
    value: HistorianValue,
}

impl SortedTreeEngine for RecordingEngine {
    fn open_reader(&self) -> Result<Box<dyn EngineReader>> {
        self.events.lock().push("open");
        Ok(Box::new(RecordingReader {
            events: Arc::clone(&self.events),
        }))
    }
}

impl EngineReader for RecordingReader {
    fn read(&mut self, _options: &ReaderOptions, _filters: ScanFilters) -> Result<Box<dyn TreeStream>> {
        self.events.lock().push("read");
        Ok(Box::new(RecordingStream {
            events: Arc::clone(&self.events),
            key: HistorianKey::default(),
            value: HistorianValue::default(),
        }))
    }
}

impl Drop for RecordingReader {
    fn drop(&mut self) {
        self.events.lock().push("release");
    }
}

impl TreeStream for RecordingStream {
    fn read(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn current_key(&self) -> &HistorianKey {
        &self.key
    }

    fn current_value(&self) -> &HistorianValue {
        &self.value
    }

    fn cancel(&mut self) {
        self.events.lock().push("cancel");
    }
}

#[test]
fn test_cursor_cancelled_before_reader_released() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let engine = RecordingEngine {
        events: Arc::clone(&events),
    };

    let mut stream = engine.point_stream_range(&Config::default(), 0, 10).unwrap();
    assert!(!stream.read().unwrap());
    stream.close();

    assert_eq!(*events.lock(), vec!["open", "read", "cancel", "release"]);
}

#[test]
fn test_read_after_release_does_not_touch_cursor() {
    /// Cursor that ignores cancellation and counts every advance
    struct EndlessStream {
        reads: Arc<Mutex<usize>>,
        key: HistorianKey,
        value: HistorianValue,
    }

    impl TreeStream for EndlessStream {
        fn read(&mut self) -> Result<bool> {
            *self.reads.lock() += 1;
            Ok(true)
        }

        fn current_key(&self) -> &HistorianKey {
            &self.key
        }

        fn current_value(&self) -> &HistorianValue {
            &self.value
        }

        fn cancel(&mut self) {}
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let reads = Arc::new(Mutex::new(0));
    let reader = Box::new(RecordingReader {
        events: Arc::clone(&events),
    });
    let cursor = Box::new(EndlessStream {
        reads: Arc::clone(&reads),
        key: HistorianKey::default(),
        value: HistorianValue::default(),
    });

    let mut stream = PointStream::new(reader, cursor);
    assert!(stream.read().unwrap());
    assert!(stream.is_valid());

    TreeStream::cancel(&mut stream);
    assert_eq!(*events.lock(), vec!["release"]);

    assert!(!stream.read().unwrap());
    assert!(!stream.read().unwrap());
    assert!(!stream.is_valid());
    assert_eq!(*reads.lock(), 1);
}

#[test]
fn test_failed_scan_start_releases_reader() {
    struct FailingReader {
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl EngineReader for FailingReader {
        fn read(&mut self, _options: &ReaderOptions, _filters: ScanFilters) -> Result<Box<dyn TreeStream>> {
            Err(HistError::Corruption("no scan".to_string()))
        }
    }

    impl Drop for FailingReader {
        fn drop(&mut self) {
            self.events.lock().push("release");
        }
    }

    struct FailingEngine {
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SortedTreeEngine for FailingEngine {
        fn open_reader(&self) -> Result<Box<dyn EngineReader>> {
            Ok(Box::new(FailingReader {
                events: Arc::clone(&self.events),
            }))
        }
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let engine = FailingEngine {
        events: Arc::clone(&events),
    };
    assert!(engine.point_stream_range(&Config::default(), 0, 10).is_err());
    assert_eq!(*events.lock(), vec!["release"]);
}

// =============================================================================
// Reader Option Tests
// =============================================================================

#[test]
fn test_max_return_count_limits_stream() {
    let archive = populated_archive();
    let options = ReaderOptions::default().with_max_return_count(5);
    let mut stream = open_point_stream(
        &archive,
        &options,
        SeekFilter::All,
        MatchFilter::All,
        ValueMatchFilter::All,
    )
    .unwrap();

    let records = collect(&mut stream);
    assert_eq!(records.len(), 5);
    assert_eq!(records[4].0, HistorianKey::new(100, 0));
}

#[test]
fn test_max_scan_count_counts_rejected_records() {
    let archive = populated_archive();
    let options = ReaderOptions::default().with_max_scan_count(8);
    let mut stream = open_point_stream(
        &archive,
        &options,
        SeekFilter::All,
        PointIdFilter::from_list([0]).into(),
        ValueMatchFilter::All,
    )
    .unwrap();

    // Eight records examined cover two timestamps, one match each
    let keys: Vec<_> = collect(&mut stream).into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec![HistorianKey::new(0, 0), HistorianKey::new(100, 0)]);
}

#[test]
fn test_config_limits_apply_to_overloads() {
    let archive = populated_archive();
    let config = Config::builder()
        .reader_options(ReaderOptions::default().with_max_return_count(3))
        .build()
        .unwrap();

    let mut range = archive.point_stream_range(&config, 0, 1_900).unwrap();
    assert_eq!(collect(&mut range).len(), 3);

    let mut points = archive.point_stream_points(&config, 0, 1_900, &[2]).unwrap();
    let keys: Vec<_> = collect(&mut points).into_iter().map(|(key, _)| key).collect();
    assert_eq!(
        keys,
        vec![HistorianKey::new(0, 2), HistorianKey::new(100, 2), HistorianKey::new(200, 2)]
    );

    let frames = archive.frames(&config, 0, 1_900, None).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[&0].len(), 3);
}

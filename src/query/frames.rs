//! Frame merge
//!
//! Folds an ascending record stream into one frame per timestamp.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{HistError, Result};
use crate::model::ValueStruct;
use crate::storage::TreeStream;

/// All records sharing one timestamp, as parallel lists in stream order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameData {
    point_ids: Vec<u64>,
    values: Vec<ValueStruct>,
}

impl FrameData {
    pub fn new(point_ids: Vec<u64>, values: Vec<ValueStruct>) -> Self {
        debug_assert_eq!(point_ids.len(), values.len());
        Self { point_ids, values }
    }

    pub fn point_ids(&self) -> &[u64] {
        &self.point_ids
    }

    pub fn values(&self) -> &[ValueStruct] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.point_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point_ids.is_empty()
    }

    /// (point id, value) pairs in stream order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &ValueStruct)> + '_ {
        self.point_ids.iter().copied().zip(self.values.iter())
    }

    /// Value recorded for `point_id` in this frame
    pub fn get(&self, point_id: u64) -> Option<&ValueStruct> {
        self.point_ids
            .iter()
            .position(|&id| id == point_id)
            .map(|i| &self.values[i])
    }

    fn push(&mut self, point_id: u64, value: ValueStruct) {
        self.point_ids.push(point_id);
        self.values.push(value);
    }
}

/// Drain `stream` into frames keyed by timestamp.
///
/// A timestamp lower than the one before it fails with `OutOfOrder`; the
/// stream is left wherever the failure happened.
pub fn merge_to_frames<S>(stream: &mut S) -> Result<BTreeMap<u64, FrameData>>
where
    S: TreeStream + ?Sized,
{
    let mut frames = BTreeMap::new();
    let mut current: Option<(u64, FrameData)> = None;
    let mut records = 0u64;

    while stream.read()? {
        let key = *stream.current_key();
        let value = stream.current_value().to_struct();

        if let Some((timestamp, frame)) = current.as_mut() {
            if *timestamp == key.timestamp {
                frame.push(key.point_id, value);
                records += 1;
                continue;
            }
            if key.timestamp < *timestamp {
                return Err(HistError::OutOfOrder {
                    previous: *timestamp,
                    current: key.timestamp,
                });
            }
        }

        let mut frame = FrameData::default();
        frame.push(key.point_id, value);
        if let Some((timestamp, finished)) = current.replace((key.timestamp, frame)) {
            frames.insert(timestamp, finished);
        }
        records += 1;
    }

    if let Some((timestamp, frame)) = current {
        frames.insert(timestamp, frame);
    }

    debug!(records, frames = frames.len(), "Merged stream into frames");
    Ok(frames)
}

//! Encoding Module
//!
//! Pluggable delta-compression codecs for keys and values.
//!
//! ## Layers
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ RecordWriter / RecordReader  (per-cursor previous state) │
//! ├──────────────────────────────────────────────────────────┤
//! │ DoubleValueEncoding<K, V>    (key codec + value codec)   │
//! ├───────────────────────────┬──────────────────────────────┤
//! │ SingleValueEncoding<K>    │ SingleValueEncoding<V>       │
//! └───────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Codecs themselves hold no mutable state: the previous key and value are
//! passed in on every call. Writers and readers own that state, so each
//! cursor clones its own and concurrent scans never share it.
//!
//! ## Record Wire Format
//! Key bytes immediately followed by value bytes. The order is fixed.

mod combined;
mod definition;
mod key;
mod record;
mod value;
pub mod varint;

use bytes::BytesMut;

use crate::error::Result;

pub use combined::CombinedEncoding;
pub use definition::{EncodingDefinition, KeyEncodingKind, ValueEncodingKind};
pub use key::{DeltaKeyEncoding, FixedKeyEncoding};
pub use record::{RecordReader, RecordWriter};
pub use value::{FixedValueEncoding, XorValueEncoding};

/// Codec for a single field (key or value).
pub trait SingleValueEncoding<T>: Send + Sync {
    /// True when the output depends on the previous record's field
    fn uses_previous_value(&self) -> bool;

    /// Worst-case number of bytes `compress` appends for one record
    fn max_compression_size(&self) -> usize;

    /// Append the encoding of `cur` to `out`
    fn compress(&self, out: &mut BytesMut, prev: &T, cur: &T);

    /// Decode one field from `input` into `cur`, advancing `input`
    fn decompress(&self, input: &mut &[u8], prev: &T, cur: &mut T) -> Result<()>;

    fn clone_encoding(&self) -> Box<dyn SingleValueEncoding<T>>;
}

impl<T> Clone for Box<dyn SingleValueEncoding<T>> {
    fn clone(&self) -> Self {
        self.clone_encoding()
    }
}

/// Codec for a whole record: one key field and one value field.
pub trait DoubleValueEncoding<K, V>: Send + Sync {
    fn uses_previous_key(&self) -> bool;

    fn uses_previous_value(&self) -> bool;

    /// Worst-case number of bytes `compress` appends for one record
    fn max_compression_size(&self) -> usize;

    fn compress(&self, out: &mut BytesMut, prev_key: &K, prev_value: &V, key: &K, value: &V);

    fn decompress(
        &self,
        input: &mut &[u8],
        prev_key: &K,
        prev_value: &V,
        key: &mut K,
        value: &mut V,
    ) -> Result<()>;

    fn clone_encoding(&self) -> Box<dyn DoubleValueEncoding<K, V>>;
}

impl<K, V> Clone for Box<dyn DoubleValueEncoding<K, V>> {
    fn clone(&self) -> Self {
        self.clone_encoding()
    }
}

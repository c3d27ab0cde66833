//! Key + value codec composition

use bytes::BytesMut;

use super::{DoubleValueEncoding, SingleValueEncoding};
use crate::error::Result;

/// Pairs one key codec with one value codec.
///
/// Neither half knows about the other. Keys are always written before
/// values; that order is part of the record wire format.
pub struct CombinedEncoding<K, V> {
    key_encoding: Box<dyn SingleValueEncoding<K>>,
    value_encoding: Box<dyn SingleValueEncoding<V>>,
}

impl<K, V> CombinedEncoding<K, V> {
    pub fn new(
        key_encoding: Box<dyn SingleValueEncoding<K>>,
        value_encoding: Box<dyn SingleValueEncoding<V>>,
    ) -> Self {
        Self {
            key_encoding,
            value_encoding,
        }
    }
}

impl<K, V> Clone for CombinedEncoding<K, V> {
    fn clone(&self) -> Self {
        Self {
            key_encoding: self.key_encoding.clone_encoding(),
            value_encoding: self.value_encoding.clone_encoding(),
        }
    }
}

impl<K: 'static, V: 'static> DoubleValueEncoding<K, V> for CombinedEncoding<K, V> {
    fn uses_previous_key(&self) -> bool {
        self.key_encoding.uses_previous_value()
    }

    fn uses_previous_value(&self) -> bool {
        self.value_encoding.uses_previous_value()
    }

    fn max_compression_size(&self) -> usize {
        self.key_encoding.max_compression_size() + self.value_encoding.max_compression_size()
    }

    fn compress(&self, out: &mut BytesMut, prev_key: &K, prev_value: &V, key: &K, value: &V) {
        self.key_encoding.compress(out, prev_key, key);
        self.value_encoding.compress(out, prev_value, value);
    }

    fn decompress(
        &self,
        input: &mut &[u8],
        prev_key: &K,
        prev_value: &V,
        key: &mut K,
        value: &mut V,
    ) -> Result<()> {
        self.key_encoding.decompress(input, prev_key, key)?;
        self.value_encoding.decompress(input, prev_value, value)
    }

    fn clone_encoding(&self) -> Box<dyn DoubleValueEncoding<K, V>> {
        Box::new(self.clone())
    }
}

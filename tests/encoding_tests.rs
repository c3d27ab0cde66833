//! Tests for the codec framework
//!
//! These tests verify:
//! - Round-trip through every key/value codec pairing
//! - Key bytes always precede value bytes in a combined record
//! - Emitted bytes never exceed the declared maximum
//! - Cloned writers and readers keep independent state
//! - A codec that breaks its declared bound aborts the write

use bytes::BytesMut;
use histkv::encoding::{
    CombinedEncoding, DeltaKeyEncoding, DoubleValueEncoding, EncodingDefinition,
    FixedKeyEncoding, FixedValueEncoding, KeyEncodingKind, RecordReader, RecordWriter,
    SingleValueEncoding, ValueEncodingKind, XorValueEncoding,
};
use histkv::{HistError, HistorianKey, HistorianValue, Result};

// =============================================================================
// Helper Functions
// =============================================================================

fn all_definitions() -> Vec<EncodingDefinition> {
    let mut definitions = Vec::new();
    for key in [KeyEncodingKind::Fixed, KeyEncodingKind::Delta] {
        for value in [ValueEncodingKind::Fixed, ValueEncodingKind::Xor] {
            definitions.push(EncodingDefinition::new(key, value));
        }
    }
    definitions
}

/// Records chosen to hit codec edge cases
fn sample_records() -> Vec<(HistorianKey, HistorianValue)> {
    vec![
        (HistorianKey::new(0, 0), HistorianValue::new(0.0, 0)),
        (HistorianKey::new(0, 1), HistorianValue::new(0.0, 0)),
        (HistorianKey::new(0, 2), HistorianValue::new(-0.0, 0)),
        (HistorianKey::new(100, 1), HistorianValue::new(5.0, 0)),
        (HistorianKey::new(100, 2), HistorianValue::new(6.0, 0x20)),
        (HistorianKey::new(200, 1), HistorianValue::new(7.0, 0x20)),
        (HistorianKey::new(200, 1 << 40), HistorianValue::new(f64::NAN, 0)),
        (HistorianKey::new(50, 3), HistorianValue::new(f64::INFINITY, u32::MAX)),
        (HistorianKey::new(u64::MAX, u64::MAX), HistorianValue::new(f64::MIN_POSITIVE, 1)),
        (HistorianKey::new(1, 0), HistorianValue::new(-1.5e300, 0)),
    ]
}

fn encode_all(definition: &EncodingDefinition, records: &[(HistorianKey, HistorianValue)]) -> BytesMut {
    let mut writer = definition.writer();
    let mut out = BytesMut::new();
    for (key, value) in records {
        writer.write(&mut out, key, value);
    }
    out
}

fn decode_all(definition: &EncodingDefinition, mut input: &[u8]) -> Result<Vec<(HistorianKey, HistorianValue)>> {
    let mut reader = definition.reader();
    let mut records = Vec::new();
    while !input.is_empty() {
        let mut key = HistorianKey::default();
        let mut value = HistorianValue::default();
        reader.read(&mut input, &mut key, &mut value)?;
        records.push((key, value));
    }
    Ok(records)
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_round_trip_every_pairing() {
    let records = sample_records();
    for definition in all_definitions() {
        let encoded = encode_all(&definition, &records);
        let decoded = decode_all(&definition, &encoded).unwrap();
        assert_eq!(decoded, records, "round trip failed for {:?}", definition);
    }
}

#[test]
fn test_compressed_beats_fixed_on_regular_series() {
    let records: Vec<_> = (0..1000u64)
        .map(|i| {
            (
                HistorianKey::new(1_000 + i / 4 * 10, i % 4),
                HistorianValue::new(((i / 4) % 3) as f64, 0),
            )
        })
        .collect();

    let fixed = encode_all(&EncodingDefinition::FIXED, &records);
    let compressed = encode_all(&EncodingDefinition::COMPRESSED, &records);

    assert_eq!(fixed.len(), records.len() * 28);
    assert!(compressed.len() * 4 < fixed.len());
}

#[test]
fn test_truncated_record_is_an_error() {
    let records = sample_records();
    for definition in all_definitions() {
        let encoded = encode_all(&definition, &records[..1]);
        let short = &encoded[..encoded.len() - 1];
        assert!(
            matches!(decode_all(&definition, short), Err(HistError::Truncated { .. })),
            "{:?} accepted a truncated record",
            definition
        );
    }
}

// =============================================================================
// Composite Ordering Tests
// =============================================================================

#[test]
fn test_combined_writes_key_then_value() {
    let prev_key = HistorianKey::new(100, 7);
    let prev_value = HistorianValue::new(1.25, 0);
    let key = HistorianKey::new(130, 2);
    let value = HistorianValue::new(-8.5, 4);

    let keys: Vec<Box<dyn SingleValueEncoding<HistorianKey>>> =
        vec![Box::new(FixedKeyEncoding), Box::new(DeltaKeyEncoding)];
    let values: Vec<Box<dyn SingleValueEncoding<HistorianValue>>> =
        vec![Box::new(FixedValueEncoding), Box::new(XorValueEncoding)];

    for key_codec in &keys {
        for value_codec in &values {
            let mut expected = BytesMut::new();
            key_codec.compress(&mut expected, &prev_key, &key);
            value_codec.compress(&mut expected, &prev_value, &value);

            let combined = CombinedEncoding::new(key_codec.clone(), value_codec.clone());
            let mut actual = BytesMut::new();
            combined.compress(&mut actual, &prev_key, &prev_value, &key, &value);

            assert_eq!(actual, expected);
            assert_eq!(
                combined.max_compression_size(),
                key_codec.max_compression_size() + value_codec.max_compression_size()
            );
        }
    }
}

#[test]
fn test_combined_forwards_previous_flags() {
    let combined = EncodingDefinition::COMPRESSED.build();
    assert!(combined.uses_previous_key());
    assert!(combined.uses_previous_value());

    let fixed = EncodingDefinition::FIXED.build();
    assert!(!fixed.uses_previous_key());
    assert!(!fixed.uses_previous_value());
}

// =============================================================================
// Size Bound Tests
// =============================================================================

#[test]
fn test_every_record_within_declared_bound() {
    let records = sample_records();
    for definition in all_definitions() {
        let mut writer = definition.writer();
        let mut out = BytesMut::new();
        for (key, value) in &records {
            let written = writer.write(&mut out, key, value);
            assert!(written <= writer.max_record_size());
        }
    }
}

#[test]
fn test_declared_bounds() {
    assert_eq!(EncodingDefinition::FIXED.writer().max_record_size(), 16 + 12);
    assert_eq!(EncodingDefinition::COMPRESSED.writer().max_record_size(), 20 + 14);
}

/// Value codec that claims one byte and writes four
struct OversizedValueEncoding;

impl SingleValueEncoding<HistorianValue> for OversizedValueEncoding {
    fn uses_previous_value(&self) -> bool {
        false
    }

    fn max_compression_size(&self) -> usize {
        1
    }

    fn compress(&self, out: &mut BytesMut, _prev: &HistorianValue, cur: &HistorianValue) {
        out.extend_from_slice(&cur.quality.to_le_bytes());
    }

    fn decompress(&self, _input: &mut &[u8], _prev: &HistorianValue, _cur: &mut HistorianValue) -> Result<()> {
        Ok(())
    }

    fn clone_encoding(&self) -> Box<dyn SingleValueEncoding<HistorianValue>> {
        Box::new(OversizedValueEncoding)
    }
}

#[test]
#[should_panic(expected = "declared maximum")]
fn test_bound_violation_panics() {
    let combined = CombinedEncoding::new(Box::new(FixedKeyEncoding), Box::new(OversizedValueEncoding));
    let mut writer = RecordWriter::new(Box::new(combined));
    let mut out = BytesMut::new();
    writer.write(&mut out, &HistorianKey::new(1, 1), &HistorianValue::new(1.0, 0));
}

// =============================================================================
// Clone Independence Tests
// =============================================================================

#[test]
fn test_cloned_writer_has_independent_state() {
    let records = sample_records();
    let definition = EncodingDefinition::COMPRESSED;

    let mut writer = definition.writer();
    let mut out = BytesMut::new();
    writer.write(&mut out, &records[0].0, &records[0].1);

    // Drive the clone through unrelated records
    let mut clone = writer.clone();
    let mut scratch = BytesMut::new();
    for (key, value) in records.iter().rev() {
        clone.write(&mut scratch, key, value);
    }

    for (key, value) in &records[1..] {
        writer.write(&mut out, key, value);
    }

    assert_eq!(out, encode_all(&definition, &records));
}

#[test]
fn test_cloned_reader_has_independent_state() {
    let records = sample_records();
    let definition = EncodingDefinition::COMPRESSED;
    let encoded = encode_all(&definition, &records);

    let mut reader: RecordReader = definition.reader();
    let mut input: &[u8] = &encoded;
    let mut key = HistorianKey::default();
    let mut value = HistorianValue::default();
    reader.read(&mut input, &mut key, &mut value).unwrap();

    // The clone consumes the rest of the input on its own copy of the slice
    let mut clone = reader.clone();
    let mut clone_input = input;
    while !clone_input.is_empty() {
        clone.read(&mut clone_input, &mut key, &mut value).unwrap();
    }
    clone.reset();

    let mut decoded = vec![records[0]];
    while !input.is_empty() {
        reader.read(&mut input, &mut key, &mut value).unwrap();
        decoded.push((key, value));
    }
    assert_eq!(decoded, records);
}

// =============================================================================
// Definition Tests
// =============================================================================

#[test]
fn test_definition_tags_round_trip() {
    for definition in all_definitions() {
        let (key, value) = definition.tags();
        assert_eq!(EncodingDefinition::from_tags(key, value).unwrap(), definition);
    }
    assert!(matches!(
        EncodingDefinition::from_tags(9, 1),
        Err(HistError::UnsupportedFormat { tag: 9, .. })
    ));
    assert_eq!(EncodingDefinition::default(), EncodingDefinition::COMPRESSED);
}

//! Binary writer for serializing metadata structures.

use widestring::U16Str;

use crate::buffer::{BlobBuilder, Reservation};
use crate::error::{Error, Result};

/// Largest value representable as a compressed unsigned integer.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Smallest value representable as a compressed signed integer.
pub const MIN_COMPRESSED_INT: i32 = -(1 << 28);

/// Largest value representable as a compressed signed integer.
pub const MAX_COMPRESSED_INT: i32 = (1 << 28) - 1;

/// A binary writer producing little-endian data on top of a [`BlobBuilder`].
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: BlobBuilder,
}

impl Writer {
    /// Create a new empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BlobBuilder::new(),
        }
    }

    /// Create a new writer whose chunks hold `chunk_size` bytes.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            buf: BlobBuilder::with_chunk_size(chunk_size),
        }
    }

    /// Get the current length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the writer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Flatten the written data into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.to_vec()
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.write_bytes(&[value]);
    }

    /// Write a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Write a little-endian u16.
    pub fn write_u16(&mut self, value: u16) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a big-endian u16.
    pub fn write_u16_be(&mut self, value: u16) {
        self.buf.write_bytes(&value.to_be_bytes());
    }

    /// Write a little-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a big-endian u32.
    pub fn write_u32_be(&mut self, value: u32) {
        self.buf.write_bytes(&value.to_be_bytes());
    }

    /// Write a little-endian u64.
    pub fn write_u64(&mut self, value: u64) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a signed byte.
    pub fn write_i8(&mut self, value: i8) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian i16.
    pub fn write_i16(&mut self, value: i16) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian i32.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian i64.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian IEEE 754 single.
    pub fn write_f32(&mut self, value: f32) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian IEEE 754 double.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.write_bytes(&value.to_le_bytes());
    }

    /// Write a slice of bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.write_bytes(bytes);
    }

    /// Write `count` zero bytes.
    pub fn write_zeros(&mut self, count: usize) {
        self.buf.write_repeated(0, count);
    }

    /// Write a null-terminated string.
    pub fn write_null_str(&mut self, s: &str) {
        self.buf.write_bytes(s.as_bytes());
        self.write_u8(0);
    }

    /// Write padding to align to a boundary.
    pub fn align(&mut self, alignment: usize) {
        let remainder = self.len() % alignment;
        if remainder != 0 {
            self.write_zeros(alignment - remainder);
        }
    }

    /// Write a 2 or 4 byte index based on size flag.
    pub fn write_index(&mut self, value: u32, wide: bool) {
        if wide {
            self.write_u32(value);
        } else {
            debug_assert!(value <= 0xFFFF, "index {value:#x} needs a wide column");
            self.write_u16(value as u16);
        }
    }

    /// Write a compressed unsigned integer (ECMA-335 II.23.2).
    pub fn write_compressed_uint(&mut self, value: u32) -> Result<()> {
        if value < 0x80 {
            // 1 byte: 0xxxxxxx
            self.write_u8(value as u8);
        } else if value < 0x4000 {
            // 2 bytes: 10xxxxxx xxxxxxxx
            self.write_u16_be(0x8000 | value as u16);
        } else if value <= MAX_COMPRESSED_UINT {
            // 4 bytes: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
            self.write_u32_be(0xC000_0000 | value);
        } else {
            return Err(Error::CompressedUIntOverflow(value));
        }
        Ok(())
    }

    /// Write a compressed signed integer (ECMA-335 II.23.2), sign rotated into bit 0.
    pub fn write_compressed_int(&mut self, value: i32) -> Result<()> {
        const B6: i32 = (1 << 6) - 1;
        const B13: i32 = (1 << 13) - 1;
        const B28: i32 = (1 << 28) - 1;

        // All ones for negative values, all zeros otherwise.
        let sign = value >> 31;
        if (value & !B6) == (sign & !B6) {
            let n = ((value & B6) << 1) | (sign & 1);
            self.write_u8(n as u8);
        } else if (value & !B13) == (sign & !B13) {
            let n = ((value & B13) << 1) | (sign & 1);
            self.write_u16_be(0x8000 | n as u16);
        } else if (value & !B28) == (sign & !B28) {
            let n = ((value & B28) << 1) | (sign & 1);
            self.write_u32_be(0xC000_0000 | n as u32);
        } else {
            return Err(Error::CompressedIntOverflow(value));
        }
        Ok(())
    }

    /// Write UTF-16 code units as UTF-8.
    ///
    /// A high surrogate followed by a low surrogate becomes one 4-byte sequence. A lone
    /// surrogate is written as the 3-byte encoding of its own code unit when
    /// `allow_unpaired_surrogates` is set, and as U+FFFD otherwise.
    pub fn write_utf8(&mut self, s: &U16Str, allow_unpaired_surrogates: bool) {
        let units = s.as_slice();
        let mut i = 0;
        while i < units.len() {
            let c = u32::from(units[i]);
            if c < 0x80 {
                self.write_u8(c as u8);
            } else if c < 0x800 {
                self.write_bytes(&[(0xC0 | (c >> 6)) as u8, (0x80 | (c & 0x3F)) as u8]);
            } else if is_high_surrogate(c) && units.get(i + 1).is_some_and(|&n| is_low_surrogate(n.into())) {
                let low = u32::from(units[i + 1]);
                let cp = 0x10000 + ((c - 0xD800) << 10) + (low - 0xDC00);
                self.write_bytes(&[
                    (0xF0 | (cp >> 18)) as u8,
                    (0x80 | ((cp >> 12) & 0x3F)) as u8,
                    (0x80 | ((cp >> 6) & 0x3F)) as u8,
                    (0x80 | (cp & 0x3F)) as u8,
                ]);
                i += 1;
            } else {
                let c = if is_surrogate(c) && !allow_unpaired_surrogates {
                    0xFFFD
                } else {
                    c
                };
                self.write_bytes(&[
                    (0xE0 | (c >> 12)) as u8,
                    (0x80 | ((c >> 6) & 0x3F)) as u8,
                    (0x80 | (c & 0x3F)) as u8,
                ]);
            }
            i += 1;
        }
    }

    /// Write UTF-16 code units little-endian, without terminator.
    pub fn write_utf16(&mut self, s: &U16Str) {
        for &unit in s.as_slice() {
            self.write_u16(unit);
        }
    }

    /// Write a SerString (ECMA-335 II.23.3): `0xFF` for null, otherwise a
    /// compressed byte length followed by UTF-8.
    pub fn write_ser_string(&mut self, s: Option<&U16Str>) -> Result<()> {
        match s {
            None => {
                self.write_u8(0xFF);
                Ok(())
            }
            Some(s) => {
                self.write_compressed_uint(utf8_byte_count(s) as u32)?;
                self.write_utf8(s, true);
                Ok(())
            }
        }
    }

    /// Reserve space for a later [`fill`](Self::fill).
    pub fn reserve(&mut self, len: usize) -> Reservation {
        self.buf.reserve(len)
    }

    /// Redeem a reservation.
    pub fn fill(&mut self, reservation: Reservation, bytes: &[u8]) -> Result<()> {
        self.buf.fill(reservation, bytes)
    }

    /// Append the content of another writer without copying it.
    pub fn link_suffix(&mut self, other: Writer) {
        self.buf.link_suffix(other.buf);
    }
}

/// Round `value` up to a multiple of `alignment` (a power of two).
#[must_use]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Number of bytes [`Writer::write_compressed_uint`] emits for `value`.
pub fn compressed_uint_size(value: u32) -> Result<usize> {
    match value {
        0..0x80 => Ok(1),
        0x80..0x4000 => Ok(2),
        0x4000..=MAX_COMPRESSED_UINT => Ok(4),
        _ => Err(Error::CompressedUIntOverflow(value)),
    }
}

/// Number of bytes [`Writer::write_utf8`] emits for `s`.
///
/// Lone surrogates take three bytes in both modes (raw code unit or U+FFFD).
#[must_use]
pub fn utf8_byte_count(s: &U16Str) -> usize {
    let units = s.as_slice();
    let mut count = 0;
    let mut i = 0;
    while i < units.len() {
        let c = u32::from(units[i]);
        count += if c < 0x80 {
            1
        } else if c < 0x800 {
            2
        } else if is_high_surrogate(c) && units.get(i + 1).is_some_and(|&n| is_low_surrogate(n.into())) {
            i += 1;
            4
        } else {
            3
        };
        i += 1;
    }
    count
}

fn is_high_surrogate(c: u32) -> bool {
    (0xD800..=0xDBFF).contains(&c)
}

fn is_low_surrogate(c: u32) -> bool {
    (0xDC00..=0xDFFF).contains(&c)
}

fn is_surrogate(c: u32) -> bool {
    (0xD800..=0xDFFF).contains(&c)
}

#[cfg(test)]
mod tests {
    use widestring::{U16String, u16str};

    use super::*;
    use crate::reader::Reader;

    fn encode_uint(value: u32) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_compressed_uint(value).unwrap();
        writer.to_vec()
    }

    fn encode_int(value: i32) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_compressed_int(value).unwrap();
        writer.to_vec()
    }

    #[test]
    fn test_compressed_uint_thresholds() {
        assert_eq!(encode_uint(0x03), vec![0x03]);
        assert_eq!(encode_uint(0x7F), vec![0x7F]);
        assert_eq!(encode_uint(0x80), vec![0x80, 0x80]);
        assert_eq!(encode_uint(0x2E57), vec![0xAE, 0x57]);
        assert_eq!(encode_uint(0x3FFF), vec![0xBF, 0xFF]);
        assert_eq!(encode_uint(0x4000), vec![0xC0, 0x00, 0x40, 0x00]);
        assert_eq!(encode_uint(0x1FFF_FFFF), vec![0xDF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_compressed_uint_overflow() {
        let mut writer = Writer::new();
        let err = writer.write_compressed_uint(0x2000_0000).unwrap_err();
        assert!(matches!(err, Error::CompressedUIntOverflow(0x2000_0000)));
        assert!(writer.is_empty());
        assert!(compressed_uint_size(0x2000_0000).is_err());
    }

    #[test]
    fn test_compressed_uint_size_matches_encoding() {
        for value in [0, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1234_5678, MAX_COMPRESSED_UINT] {
            assert_eq!(compressed_uint_size(value).unwrap(), encode_uint(value).len());
        }
    }

    #[test]
    fn test_compressed_uint_decodes_back() {
        let samples = (0..=MAX_COMPRESSED_UINT).step_by(0x0001_0FFF).chain([
            0x7F,
            0x80,
            0x3FFF,
            0x4000,
            MAX_COMPRESSED_UINT,
        ]);
        for value in samples {
            let bytes = encode_uint(value);
            let mut reader = Reader::new(&bytes);
            assert_eq!(reader.read_compressed_uint().unwrap(), value);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_compressed_int_examples() {
        // Examples from ECMA-335 II.23.2.
        assert_eq!(encode_int(3), vec![0x06]);
        assert_eq!(encode_int(-3), vec![0x7B]);
        assert_eq!(encode_int(64), vec![0x80, 0x80]);
        assert_eq!(encode_int(-64), vec![0x01]);
        assert_eq!(encode_int(8192), vec![0xC0, 0x00, 0x40, 0x00]);
        assert_eq!(encode_int(-8192), vec![0x80, 0x01]);
        assert_eq!(encode_int(268_435_455), vec![0xDF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(encode_int(-268_435_456), vec![0xC0, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_compressed_int_range() {
        let mut writer = Writer::new();
        assert!(writer.write_compressed_int(MAX_COMPRESSED_INT + 1).is_err());
        assert!(writer.write_compressed_int(MIN_COMPRESSED_INT - 1).is_err());
        assert!(writer.write_compressed_int(i32::MIN).is_err());

        for value in [MIN_COMPRESSED_INT, -8193, -65, -1, 0, 1, 63, 8191, MAX_COMPRESSED_INT] {
            let bytes = encode_int(value);
            let mut reader = Reader::new(&bytes);
            assert_eq!(reader.read_compressed_int().unwrap(), value);
        }
    }

    #[test]
    fn test_utf8_surrogate_pair() {
        let s = U16String::from_vec(vec![0xD800u16, 0xDC00]);
        let mut writer = Writer::new();
        writer.write_utf8(&s, false);
        assert_eq!(writer.to_vec(), vec![0xF0, 0x90, 0x80, 0x80]);
        assert_eq!(utf8_byte_count(&s), 4);
    }

    #[test]
    fn test_utf8_lone_surrogate() {
        let s = U16String::from_vec(vec![0xD800u16]);

        let mut raw = Writer::new();
        raw.write_utf8(&s, true);
        assert_eq!(raw.to_vec(), vec![0xED, 0xA0, 0x80]);
        assert_eq!(utf8_byte_count(&s), raw.len());

        let mut replaced = Writer::new();
        replaced.write_utf8(&s, false);
        assert_eq!(replaced.to_vec(), vec![0xEF, 0xBF, 0xBD]);
        assert_eq!(utf8_byte_count(&s), replaced.len());
    }

    #[test]
    fn test_utf8_count_matches_output() {
        let samples = [
            U16String::from_str("plain ascii"),
            U16String::from_str("caf\u{e9} \u{65e5}\u{672c}"),
            U16String::from_str("\u{1F600} emoji"),
            U16String::from_vec(vec![0x41u16, 0xDC00, 0xD800, 0x42]),
        ];
        for s in &samples {
            for allow in [true, false] {
                let mut writer = Writer::new();
                writer.write_utf8(s, allow);
                assert_eq!(utf8_byte_count(s), writer.len());
            }
        }
        let native = "caf\u{e9} \u{1F600}";
        let mut writer = Writer::new();
        writer.write_utf8(&U16String::from_str(native), false);
        assert_eq!(writer.to_vec(), native.as_bytes());
    }

    #[test]
    fn test_ser_string() {
        let mut writer = Writer::new();
        writer.write_ser_string(None).unwrap();
        assert_eq!(writer.to_vec(), vec![0xFF]);

        let mut writer = Writer::new();
        writer.write_ser_string(Some(u16str!("abc"))).unwrap();
        assert_eq!(writer.to_vec(), vec![0x03, b'a', b'b', b'c']);

        let mut writer = Writer::new();
        writer.write_ser_string(Some(u16str!(""))).unwrap();
        assert_eq!(writer.to_vec(), vec![0x00]);
    }

    #[test]
    fn test_align_and_index() {
        let mut writer = Writer::new();
        writer.write_u8(1);
        writer.align(4);
        writer.write_index(0x1234, false);
        writer.write_index(0x1234, true);
        assert_eq!(writer.to_vec(), vec![1, 0, 0, 0, 0x34, 0x12, 0x34, 0x12, 0, 0]);
    }

    #[test]
    fn test_reserve_then_fill() {
        let mut writer = Writer::new();
        let slot = writer.reserve(4);
        writer.write_u8(0xEE);
        writer.fill(slot, &0xDEADBEEFu32.to_le_bytes()).unwrap();
        assert_eq!(writer.to_vec(), vec![0xEF, 0xBE, 0xAD, 0xDE, 0xEE]);
    }
}

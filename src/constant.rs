//! Literal values of the Constant table and of Portable PDB local constants.

use widestring::U16String;

use crate::error::{Error, Result};
use crate::signature::ElementType;
use crate::writer::Writer;

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Boolean(bool),
    Char(u16),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    String(U16String),
    /// Null reference.
    Null,
    /// `System.Decimal`; has no metadata constant encoding.
    Decimal { scale: u8, negative: bool, low: u64, high: u32 },
    /// `System.DateTime` ticks; has no metadata constant encoding.
    DateTime(i64),
}

impl ConstantValue {
    /// Element type stored in the Constant table's Type column.
    pub fn element_type(&self) -> Result<ElementType> {
        Ok(match self {
            Self::Boolean(_) => ElementType::Boolean,
            Self::Char(_) => ElementType::Char,
            Self::SByte(_) => ElementType::I1,
            Self::Byte(_) => ElementType::U1,
            Self::Int16(_) => ElementType::I2,
            Self::UInt16(_) => ElementType::U2,
            Self::Int32(_) => ElementType::I4,
            Self::UInt32(_) => ElementType::U4,
            Self::Int64(_) => ElementType::I8,
            Self::UInt64(_) => ElementType::U8,
            Self::Single(_) => ElementType::R4,
            Self::Double(_) => ElementType::R8,
            Self::String(_) => ElementType::String,
            Self::Null => ElementType::Class,
            Self::Decimal { .. } => return Err(Error::UnsupportedConstant("System.Decimal")),
            Self::DateTime(_) => return Err(Error::UnsupportedConstant("System.DateTime")),
        })
    }

    /// Check if the value is a primitive with a fixed-size encoding.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Self::String(_) | Self::Null | Self::Decimal { .. } | Self::DateTime(_)
        )
    }

    /// Write the value bytes without any type prefix.
    ///
    /// Strings are UTF-16LE without a length; a null reference is a 4-byte zero.
    pub fn write_value(&self, w: &mut Writer) -> Result<()> {
        match self {
            Self::Boolean(v) => w.write_bool(*v),
            Self::Char(v) => w.write_u16(*v),
            Self::SByte(v) => w.write_i8(*v),
            Self::Byte(v) => w.write_u8(*v),
            Self::Int16(v) => w.write_i16(*v),
            Self::UInt16(v) => w.write_u16(*v),
            Self::Int32(v) => w.write_i32(*v),
            Self::UInt32(v) => w.write_u32(*v),
            Self::Int64(v) => w.write_i64(*v),
            Self::UInt64(v) => w.write_u64(*v),
            Self::Single(v) => w.write_f32(*v),
            Self::Double(v) => w.write_f64(*v),
            Self::String(s) => w.write_utf16(s),
            Self::Null => w.write_u32(0),
            Self::Decimal { .. } | Self::DateTime(_) => {
                self.element_type()?;
            }
        }
        Ok(())
    }

    /// The #Blob content of a Constant row.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        self.write_value(&mut w)?;
        Ok(w.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;

    #[test]
    fn test_primitive_blobs() {
        assert_eq!(ConstantValue::Boolean(true).to_blob().unwrap(), vec![1]);
        assert_eq!(
            ConstantValue::Int32(-2).to_blob().unwrap(),
            vec![0xFE, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            ConstantValue::Double(1.0).to_blob().unwrap(),
            1.0f64.to_le_bytes().to_vec()
        );
        assert_eq!(
            ConstantValue::Int64(0).element_type().unwrap(),
            ElementType::I8
        );
    }

    #[test]
    fn test_string_and_null() {
        let s = ConstantValue::String(u16str!("ab").to_owned());
        assert_eq!(s.to_blob().unwrap(), vec![b'a', 0, b'b', 0]);
        assert!(ConstantValue::String(U16String::new()).to_blob().unwrap().is_empty());
        assert_eq!(ConstantValue::Null.to_blob().unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(ConstantValue::Null.element_type().unwrap(), ElementType::Class);
    }

    #[test]
    fn test_unsupported() {
        let value = ConstantValue::DateTime(0);
        assert!(matches!(
            value.to_blob(),
            Err(Error::UnsupportedConstant("System.DateTime"))
        ));
        let value = ConstantValue::Decimal {
            scale: 0,
            negative: false,
            low: 1,
            high: 0,
        };
        assert!(value.element_type().is_err());
        assert!(!value.is_primitive());
    }
}

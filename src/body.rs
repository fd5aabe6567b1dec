//! The IL stream: method body headers, code and exception sections (ECMA-335 II.25.4).

use std::collections::HashMap;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::model::{ExceptionRegion, ExceptionRegionKind, IlOperand, MethodBody, TypeRefId};
use crate::writer::Writer;

bitflags! {
    /// Flags in the first bytes of a method body header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodHeaderFlags: u16 {
        const TINY_FORMAT = 0x2;
        const FAT_FORMAT = 0x3;
        const MORE_SECTS = 0x8;
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Kind byte of a method data section.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        const EH_TABLE = 0x1;
        const OPT_IL_TABLE = 0x2;
        const FAT_FORMAT = 0x40;
        const MORE_SECTS = 0x80;
    }
}

/// Size of a fat header in 4-byte units, stored in the high nibble of the flags.
const FAT_HEADER_DWORDS: u16 = 3;

/// Largest IL size a tiny header can describe.
pub const MAX_TINY_IL: usize = 63;

/// Largest evaluation stack a tiny header implies.
pub const MAX_TINY_STACK: u16 = 8;

/// Supplies the tokens a method body refers to.
pub trait BodyTokens {
    /// Token of an IL operand.
    fn operand_token(&mut self, operand: &IlOperand) -> Result<u32>;

    /// Token of the type caught by a typed handler.
    fn catch_type_token(&mut self, ty: TypeRefId) -> Result<u32>;
}

/// Handler kind stored in an exception clause.
fn clause_flags(kind: &ExceptionRegionKind) -> u16 {
    match kind {
        ExceptionRegionKind::Catch(_) => 0x0000,
        ExceptionRegionKind::Filter(_) => 0x0001,
        ExceptionRegionKind::Finally => 0x0002,
        ExceptionRegionKind::Fault => 0x0004,
    }
}

/// Accumulates method bodies.
#[derive(Debug)]
pub struct MethodBodyStream {
    writer: Writer,
    tiny_bodies: HashMap<Vec<u8>, u32>,
}

impl Default for MethodBodyStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodBodyStream {
    /// Start a stream with 4 bytes of padding, so no body lives at offset 0.
    #[must_use]
    pub fn new() -> Self {
        let mut writer = Writer::new();
        writer.write_u32(0);
        Self {
            writer,
            tiny_bodies: HashMap::new(),
        }
    }

    /// Append a body and return its offset in the stream.
    ///
    /// `local_signature` is the StandAloneSig token of the locals, or 0.
    pub fn add(
        &mut self,
        body: &MethodBody,
        local_signature: u32,
        tokens: &mut dyn BodyTokens,
    ) -> Result<u32> {
        let mut il = body.il.clone();
        for fixup in &body.fixups {
            let start = fixup.offset as usize;
            let il_len = il.len();
            let slot = start
                .checked_add(4)
                .and_then(|end| il.get_mut(start..end))
                .ok_or(Error::InvalidFixup {
                    offset: fixup.offset,
                    il_len,
                })?;
            let token = tokens.operand_token(&fixup.operand)?;
            slot.copy_from_slice(&token.to_le_bytes());
        }

        let is_tiny = il.len() <= MAX_TINY_IL
            && body.max_stack <= MAX_TINY_STACK
            && local_signature == 0
            && body.exception_regions.is_empty();

        if is_tiny {
            if let Some(&offset) = self.tiny_bodies.get(&il) {
                return Ok(offset);
            }
            let offset = self.writer.len() as u32;
            let header = ((il.len() as u16) << 2) | MethodHeaderFlags::TINY_FORMAT.bits();
            self.writer.write_u8(header as u8);
            self.writer.write_bytes(&il);
            self.tiny_bodies.insert(il, offset);
            return Ok(offset);
        }

        self.writer.align(4);
        let offset = self.writer.len() as u32;
        let mut flags = MethodHeaderFlags::FAT_FORMAT;
        if !body.exception_regions.is_empty() {
            flags |= MethodHeaderFlags::MORE_SECTS;
        }
        if body.init_locals {
            flags |= MethodHeaderFlags::INIT_LOCALS;
        }
        self.writer.write_u16((FAT_HEADER_DWORDS << 12) | flags.bits());
        self.writer.write_u16(body.max_stack);
        self.writer.write_u32(il.len() as u32);
        self.writer.write_u32(local_signature);
        self.writer.write_bytes(&il);

        if !body.exception_regions.is_empty() {
            self.write_exception_section(&body.exception_regions, tokens)?;
        }
        Ok(offset)
    }

    fn write_exception_section(
        &mut self,
        regions: &[ExceptionRegion],
        tokens: &mut dyn BodyTokens,
    ) -> Result<()> {
        let small = may_use_small_section(regions);
        let w = &mut self.writer;
        w.align(4);
        if small {
            let size = regions.len() as u32 * 12 + 4;
            w.write_u8(SectionFlags::EH_TABLE.bits());
            w.write_u8(size as u8);
            w.write_u16(0);
        } else {
            let size = regions.len() as u32 * 24 + 4;
            w.write_u8((SectionFlags::EH_TABLE | SectionFlags::FAT_FORMAT).bits());
            w.write_u8(size as u8);
            w.write_u16((size >> 8) as u16);
        }

        for region in regions {
            let flags = clause_flags(&region.kind);
            if small {
                w.write_u16(flags);
                w.write_u16(region.try_offset as u16);
                w.write_u8(region.try_length as u8);
                w.write_u16(region.handler_offset as u16);
                w.write_u8(region.handler_length as u8);
            } else {
                w.write_u32(u32::from(flags));
                w.write_u32(region.try_offset);
                w.write_u32(region.try_length);
                w.write_u32(region.handler_offset);
                w.write_u32(region.handler_length);
            }
            match region.kind {
                ExceptionRegionKind::Catch(ty) => w.write_u32(tokens.catch_type_token(ty)?),
                ExceptionRegionKind::Filter(offset) => w.write_u32(offset),
                ExceptionRegionKind::Finally | ExceptionRegionKind::Fault => w.write_u32(0),
            }
        }
        Ok(())
    }

    /// Size of the stream so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    /// Check if the stream holds nothing but its padding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer.len() <= 4
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.to_vec()
    }
}

fn may_use_small_section(regions: &[ExceptionRegion]) -> bool {
    regions.len() * 12 + 4 <= 0xFF
        && regions.iter().all(|r| {
            r.try_offset <= 0xFFFF
                && r.try_length <= 0xFF
                && r.handler_offset <= 0xFFFF
                && r.handler_length <= 0xFF
        })
}

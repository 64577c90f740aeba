//! ELF64 file header.

use super::{EI_NIDENT, ELF_MAGIC, ElfError, ElfResult, read_u16, read_u32, read_u64};

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;

/// ELF object file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfType {
    None,
    Rel,
    Exec,
    Dyn,
    Core,
    Unknown(u16),
}

impl From<u16> for ElfType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Rel,
            2 => Self::Exec,
            3 => Self::Dyn,
            4 => Self::Core,
            other => Self::Unknown(other),
        }
    }
}

/// The header fields the audit needs.
#[derive(Debug, Clone, Copy)]
pub struct Elf64Header {
    pub e_type: ElfType,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_shoff: u64,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Elf64Header {
    pub const SIZE: usize = 64;

    /// Parse and validate the header of a little-endian ELF64 object.
    ///
    /// # Errors
    ///
    /// Short buffers, bad magic, 32-bit objects and big-endian objects.
    pub fn parse(data: &[u8]) -> ElfResult<Self> {
        if data.len() < Self::SIZE {
            return Err(ElfError::BufferTooSmall {
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        if data[..4] != ELF_MAGIC {
            return Err(ElfError::InvalidMagic);
        }
        let ident = &data[..EI_NIDENT];
        if ident[EI_CLASS] != ELFCLASS64 {
            return Err(ElfError::UnsupportedClass(ident[EI_CLASS]));
        }
        if ident[EI_DATA] != ELFDATA2LSB {
            return Err(ElfError::UnsupportedEncoding(ident[EI_DATA]));
        }

        Ok(Self {
            e_type: ElfType::from(read_u16(data, 16)),
            e_machine: read_u16(data, 18),
            e_version: read_u32(data, 20),
            e_shoff: read_u64(data, 40),
            e_shentsize: read_u16(data, 58),
            e_shnum: read_u16(data, 60),
            e_shstrndx: read_u16(data, 62),
        })
    }

    pub fn is_shared_object(&self) -> bool {
        matches!(self.e_type, ElfType::Dyn)
    }
}

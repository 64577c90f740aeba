//! ELF64 section headers.

use super::{ElfError, ElfResult, read_u32, read_u64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Null,
    Progbits,
    Symtab,
    Strtab,
    Dynamic,
    Nobits,
    Dynsym,
    Unknown(u32),
}

impl From<u32> for SectionType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::Progbits,
            2 => Self::Symtab,
            3 => Self::Strtab,
            6 => Self::Dynamic,
            8 => Self::Nobits,
            11 => Self::Dynsym,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64SectionHeader {
    pub sh_name: u32,
    pub sh_type: SectionType,
    pub sh_flags: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_entsize: u64,
}

impl Elf64SectionHeader {
    pub const SIZE: usize = 64;

    pub fn parse(data: &[u8]) -> ElfResult<Self> {
        if data.len() < Self::SIZE {
            return Err(ElfError::BufferTooSmall {
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        Ok(Self {
            sh_name: read_u32(data, 0),
            sh_type: SectionType::from(read_u32(data, 4)),
            sh_flags: read_u64(data, 8),
            sh_offset: read_u64(data, 24),
            sh_size: read_u64(data, 32),
            sh_link: read_u32(data, 40),
            sh_entsize: read_u64(data, 56),
        })
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.sh_type, SectionType::Dynamic)
    }
}

/// Parse the section header table.
pub fn parse_section_headers(
    data: &[u8],
    shoff: u64,
    shentsize: u16,
    shnum: u16,
) -> ElfResult<Vec<Elf64SectionHeader>> {
    if shnum == 0 {
        return Ok(Vec::new());
    }
    let entsize = usize::from(shentsize);
    if entsize < Elf64SectionHeader::SIZE {
        return Err(ElfError::InvalidOffset {
            kind: "section header entry size",
            offset: u64::from(shentsize),
        });
    }
    let table = super::slice_at(
        data,
        shoff,
        u64::from(shentsize) * u64::from(shnum),
        "section header table",
    )?;

    table
        .chunks_exact(entsize)
        .map(Elf64SectionHeader::parse)
        .collect()
}

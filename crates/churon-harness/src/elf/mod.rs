//! Minimal ELF64 reader for auditing the built module.
//!
//! Reads just enough of a little-endian ELF64 shared object to answer which
//! symbols it defines, how they bind, and whether the object was linked with
//! symbolic binding. Nothing here loads or relocates anything.

pub mod dynamic;
pub mod header;
pub mod section;
pub mod symbol;

use thiserror::Error;

pub use dynamic::{DynamicEntry, binds_symbolically, parse_dynamic};
pub use header::{Elf64Header, ElfType};
pub use section::{Elf64SectionHeader, SectionType, parse_section_headers};
pub use symbol::{Elf64Symbol, SymbolBinding, SymbolVisibility, get_string, parse_symbols};

/// ELF magic bytes: "\x7fELF"
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Size of ELF identification array
pub const EI_NIDENT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElfError {
    #[error("invalid ELF magic")]
    InvalidMagic,
    #[error("unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("unsupported data encoding: {0}")]
    UnsupportedEncoding(u8),
    #[error("invalid {kind} offset: {offset:#x}")]
    InvalidOffset { kind: &'static str, offset: u64 },
    #[error("buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("invalid string index: {0}")]
    InvalidStringIndex(u32),
}

pub type ElfResult<T> = Result<T, ElfError>;

pub(crate) fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(bytes)
}

pub(crate) fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Bounds-checked `data[offset..offset + size]`.
pub(crate) fn slice_at<'a>(
    data: &'a [u8],
    offset: u64,
    size: u64,
    kind: &'static str,
) -> ElfResult<&'a [u8]> {
    let start = usize::try_from(offset).map_err(|_| ElfError::InvalidOffset { kind, offset })?;
    let len = usize::try_from(size).map_err(|_| ElfError::InvalidOffset { kind, offset })?;
    let end = start
        .checked_add(len)
        .ok_or(ElfError::InvalidOffset { kind, offset })?;
    data.get(start..end).ok_or(ElfError::BufferTooSmall {
        needed: end,
        available: data.len(),
    })
}

/// A symbol with its name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSymbol {
    pub name: String,
    pub symbol: Elf64Symbol,
}

/// Parsed view of an ELF64 image.
#[derive(Debug)]
pub struct ElfImage<'a> {
    data: &'a [u8],
    pub header: Elf64Header,
    pub sections: Vec<Elf64SectionHeader>,
}

impl<'a> ElfImage<'a> {
    pub fn parse(data: &'a [u8]) -> ElfResult<Self> {
        let header = Elf64Header::parse(data)?;
        let sections =
            parse_section_headers(data, header.e_shoff, header.e_shentsize, header.e_shnum)?;
        Ok(Self {
            data,
            header,
            sections,
        })
    }

    fn section_bytes(&self, section: &Elf64SectionHeader) -> ElfResult<&'a [u8]> {
        if matches!(section.sh_type, SectionType::Nobits) {
            return Ok(&[]);
        }
        slice_at(self.data, section.sh_offset, section.sh_size, "section")
    }

    /// Symbols of the first section of `kind` (`Symtab` or `Dynsym`), names resolved
    /// through the linked string table. `None` when the section is absent.
    pub fn symbols(&self, kind: SectionType) -> ElfResult<Option<Vec<NamedSymbol>>> {
        let Some(table) = self.sections.iter().find(|s| s.sh_type == kind) else {
            return Ok(None);
        };
        let strtab = self
            .sections
            .get(table.sh_link as usize)
            .ok_or(ElfError::InvalidOffset {
                kind: "string table link",
                offset: u64::from(table.sh_link),
            })?;
        let strings = self.section_bytes(strtab)?;
        let symbols = parse_symbols(self.data, table.sh_offset, table.sh_size)?;

        let mut named = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let name = if symbol.st_name == 0 {
                String::new()
            } else {
                get_string(strings, symbol.st_name)?.to_string()
            };
            named.push(NamedSymbol { name, symbol });
        }
        Ok(Some(named))
    }

    /// Entries of the dynamic section, empty when the object has none.
    pub fn dynamic_entries(&self) -> ElfResult<Vec<DynamicEntry>> {
        match self.sections.iter().find(|s| s.is_dynamic()) {
            Some(section) => parse_dynamic(self.section_bytes(section)?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(ElfError::InvalidMagic.to_string(), "invalid ELF magic");
        assert_eq!(
            ElfError::BufferTooSmall {
                needed: 64,
                available: 3
            }
            .to_string(),
            "buffer too small: need 64, have 3"
        );
    }

    #[test]
    fn slice_at_checks_bounds() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(slice_at(&data, 1, 2, "t").unwrap(), &[2, 3]);
        assert!(matches!(
            slice_at(&data, 3, 2, "t"),
            Err(ElfError::BufferTooSmall { needed: 5, .. })
        ));
        assert!(slice_at(&data, u64::MAX, 1, "t").is_err());
    }

    #[test]
    fn little_endian_readers() {
        let data = [0x34, 0x12, 0x78, 0x56, 0, 0, 0, 0];
        assert_eq!(read_u16(&data, 0), 0x1234);
        assert_eq!(read_u32(&data, 0), 0x5678_1234);
        assert_eq!(read_u64(&data, 0), 0x5678_1234);
    }
}

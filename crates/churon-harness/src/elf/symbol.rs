//! ELF64 symbol tables.

use super::{ElfError, ElfResult, read_u16, read_u32, read_u64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolBinding {
    Local,
    Global,
    Weak,
    Unknown(u8),
}

impl From<u8> for SymbolBinding {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Local,
            1 => Self::Global,
            2 => Self::Weak,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolVisibility {
    Default,
    Internal,
    Hidden,
    /// Exported but not preemptible.
    Protected,
}

impl From<u8> for SymbolVisibility {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => Self::Default,
            1 => Self::Internal,
            2 => Self::Hidden,
            _ => Self::Protected,
        }
    }
}

const SHN_UNDEF: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Symbol {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

impl Elf64Symbol {
    pub const SIZE: usize = 24;

    pub fn parse(data: &[u8]) -> ElfResult<Self> {
        if data.len() < Self::SIZE {
            return Err(ElfError::BufferTooSmall {
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        Ok(Self {
            st_name: read_u32(data, 0),
            st_info: data[4],
            st_other: data[5],
            st_shndx: read_u16(data, 6),
            st_value: read_u64(data, 8),
            st_size: read_u64(data, 16),
        })
    }

    pub fn binding(&self) -> SymbolBinding {
        SymbolBinding::from(self.st_info >> 4)
    }

    pub fn visibility(&self) -> SymbolVisibility {
        SymbolVisibility::from(self.st_other)
    }

    pub fn is_defined(&self) -> bool {
        self.st_shndx != SHN_UNDEF
    }

    /// Defined, non-local and default visibility: other objects can bind to it
    /// and, without symbolic linking, it can be preempted.
    pub fn is_exported(&self) -> bool {
        self.is_defined()
            && matches!(self.binding(), SymbolBinding::Global | SymbolBinding::Weak)
            && matches!(
                self.visibility(),
                SymbolVisibility::Default | SymbolVisibility::Protected
            )
    }

    /// References inside the object always resolve to this definition.
    pub fn binds_locally(&self) -> bool {
        self.is_defined()
            && (matches!(self.binding(), SymbolBinding::Local)
                || !matches!(self.visibility(), SymbolVisibility::Default))
    }
}

/// Parse every entry of a symbol table section.
pub fn parse_symbols(data: &[u8], offset: u64, size: u64) -> ElfResult<Vec<Elf64Symbol>> {
    let table = super::slice_at(data, offset, size, "symbol table")?;
    table
        .chunks_exact(Elf64Symbol::SIZE)
        .map(Elf64Symbol::parse)
        .collect()
}

/// NUL-terminated string at `index` in a string table.
pub fn get_string(strtab: &[u8], index: u32) -> ElfResult<&str> {
    let start = index as usize;
    let tail = strtab
        .get(start..)
        .filter(|tail| !tail.is_empty())
        .ok_or(ElfError::InvalidStringIndex(index))?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(ElfError::InvalidStringIndex(index))?;
    std::str::from_utf8(&tail[..len]).map_err(|_| ElfError::InvalidStringIndex(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(info: u8, other: u8, shndx: u16) -> Elf64Symbol {
        let mut raw = [0u8; 24];
        raw[0] = 0x10;
        raw[4] = info;
        raw[5] = other;
        raw[6..8].copy_from_slice(&shndx.to_le_bytes());
        raw[9] = 0x10;
        Elf64Symbol::parse(&raw).unwrap()
    }

    #[test]
    fn global_default_function_is_exported() {
        let sym = symbol(0x12, 0, 1);
        assert_eq!(sym.st_name, 0x10);
        assert_eq!(sym.st_value, 0x1000);
        assert_eq!(sym.binding(), SymbolBinding::Global);
        assert!(sym.is_exported());
        assert!(!sym.binds_locally());
    }

    #[test]
    fn hidden_and_local_symbols_bind_locally() {
        let hidden = symbol(0x12, 2, 1);
        assert_eq!(hidden.visibility(), SymbolVisibility::Hidden);
        assert!(hidden.binds_locally());
        assert!(!hidden.is_exported());

        let local = symbol(0x02, 0, 1);
        assert!(local.binds_locally());
        assert!(!local.is_exported());

        let protected = symbol(0x12, 3, 1);
        assert!(protected.is_exported());
        assert!(protected.binds_locally());
    }

    #[test]
    fn undefined_symbols_are_neither() {
        let undef = symbol(0x12, 0, 0);
        assert!(!undef.is_defined());
        assert!(!undef.is_exported());
        assert!(!undef.binds_locally());
    }

    #[test]
    fn string_lookup() {
        let strtab = b"\0hello\0world\0";
        assert_eq!(get_string(strtab, 1).unwrap(), "hello");
        assert_eq!(get_string(strtab, 7).unwrap(), "world");
        assert_eq!(get_string(strtab, 0).unwrap(), "");
        assert!(get_string(strtab, 100).is_err());
        assert!(get_string(b"\0abc", 1).is_err());
    }
}

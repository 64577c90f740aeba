//! ELF64 dynamic section.

use super::{ElfResult, read_u64};

const DT_NULL: i64 = 0;
pub const DT_SYMBOLIC: i64 = 16;
pub const DT_FLAGS: i64 = 30;
pub const DF_SYMBOLIC: u64 = 0x2;

const ENTRY_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntry {
    pub tag: i64,
    pub value: u64,
}

/// Entries up to (not including) `DT_NULL`.
pub fn parse_dynamic(section: &[u8]) -> ElfResult<Vec<DynamicEntry>> {
    let mut entries = Vec::new();
    for raw in section.chunks_exact(ENTRY_SIZE) {
        let tag = read_u64(raw, 0) as i64;
        if tag == DT_NULL {
            break;
        }
        entries.push(DynamicEntry {
            tag,
            value: read_u64(raw, 8),
        });
    }
    Ok(entries)
}

/// Whether the object was linked with `-Bsymbolic`.
pub fn binds_symbolically(entries: &[DynamicEntry]) -> bool {
    entries.iter().any(|e| {
        e.tag == DT_SYMBOLIC || (e.tag == DT_FLAGS && e.value & DF_SYMBOLIC != 0)
    })
}

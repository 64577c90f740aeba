use std::path::PathBuf;

use thiserror::Error;

use crate::elf::ElfError;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("elf: {0}")]
    Elf(#[from] ElfError),
    #[error("io on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

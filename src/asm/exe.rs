//! Executable container for x25-32 programs.
//!
//! Binary layout, every field a big-endian 32-bit word:
//!
//! | Word | Field                 |
//! |------|-----------------------|
//! | 0    | codec version         |
//! | 1    | RAM region start      |
//! | 2    | RAM region end        |
//! | 3    | console region start  |
//! | 4    | console region end    |
//! | 5    | entry point           |
//! | 6..  | program words (even)  |

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::MemoryLayout;
use crate::isa::{Word, INSTRUCTION_WORDS};

/// Codec version as (major, minor, patch).
pub const CODEC_VERSION: (u8, u8, u8) = (1, 0, 0);

/// Header words before the program.
pub const HEADER_WORDS: usize = 6;

/// `CODEC_VERSION` packed into one word.
pub const fn version_word() -> Word {
    let (major, minor, patch) = CODEC_VERSION;
    (major as Word) << 16 | (minor as Word) << 8 | patch as Word
}

/// Executable header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExeHeader {
    pub version: Word,
    pub ram_start: Word,
    pub ram_end: Word,
    pub console_start: Word,
    pub console_end: Word,
    pub entry: Word,
}

impl ExeHeader {
    /// Header for the current codec version.
    pub fn new(layout: MemoryLayout, entry: Word) -> Self {
        Self {
            version: version_word(),
            ram_start: layout.ram_start,
            ram_end: layout.ram_end,
            console_start: layout.console_start,
            console_end: layout.console_end,
            entry,
        }
    }

    pub fn layout(&self) -> MemoryLayout {
        MemoryLayout {
            ram_start: self.ram_start,
            ram_end: self.ram_end,
            console_start: self.console_start,
            console_end: self.console_end,
        }
    }

    fn words(&self) -> [Word; HEADER_WORDS] {
        [
            self.version,
            self.ram_start,
            self.ram_end,
            self.console_start,
            self.console_end,
            self.entry,
        ]
    }
}

impl Default for ExeHeader {
    fn default() -> Self {
        let layout = MemoryLayout::default();
        Self::new(layout, layout.ram_start)
    }
}

/// A loaded executable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Executable {
    pub header: ExeHeader,
    pub program: Vec<Word>,
}

impl Executable {
    /// Wrap a program with the default layout, entering at RAM start.
    pub fn new(program: Vec<Word>) -> Self {
        Self {
            header: ExeHeader::default(),
            program,
        }
    }

    /// Serialize to the binary container format.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.header
            .words()
            .iter()
            .chain(&self.program)
            .flat_map(|w| w.to_be_bytes())
            .collect()
    }

    /// Parse the binary container format, rejecting a foreign version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExeError> {
        if bytes.len() % 4 != 0 || bytes.len() < HEADER_WORDS * 4 {
            return Err(ExeError::Truncated { len: bytes.len() });
        }
        let words: Vec<Word> = bytes
            .chunks_exact(4)
            .map(|c| Word::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let (head, program) = words.split_at(HEADER_WORDS);

        let header = ExeHeader {
            version: head[0],
            ram_start: head[1],
            ram_end: head[2],
            console_start: head[3],
            console_end: head[4],
            entry: head[5],
        };
        if header.version != version_word() {
            return Err(ExeError::VersionMismatch {
                expected: version_word(),
                found: header.version,
            });
        }
        if program.len() % INSTRUCTION_WORDS != 0 {
            return Err(ExeError::OddProgramLength { words: program.len() });
        }

        Ok(Self {
            header,
            program: program.to_vec(),
        })
    }
}

/// Load an executable from disk.
pub fn load_exe<P: AsRef<Path>>(path: P) -> Result<Executable, ExeError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| ExeError::Io(e.to_string()))?;
    let exe = Executable::from_bytes(&bytes)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        words = exe.program.len(),
        entry = exe.header.entry,
        "executable loaded"
    );
    Ok(exe)
}

/// Save an executable to disk.
pub fn save_exe<P: AsRef<Path>>(path: P, exe: &Executable) -> Result<(), ExeError> {
    if exe.program.len() % INSTRUCTION_WORDS != 0 {
        return Err(ExeError::OddProgramLength {
            words: exe.program.len(),
        });
    }
    std::fs::write(path.as_ref(), exe.to_bytes()).map_err(|e| ExeError::Io(e.to_string()))
}

/// Errors that can occur reading or writing executables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExeError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("executable truncated: {len} bytes")]
    Truncated { len: usize },

    #[error("program has an odd number of words ({words})")]
    OddProgramLength { words: usize },

    #[error("version mismatch: expected {expected:#08x}, found {found:#08x}")]
    VersionMismatch { expected: Word, found: Word },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_word() {
        assert_eq!(version_word(), 0x0001_0000);
    }

    #[test]
    fn test_byte_layout() {
        let exe = Executable::new(vec![0x0102_0304, 0]);
        let bytes = exe.to_bytes();
        assert_eq!(bytes.len(), (HEADER_WORDS + 2) * 4);
        assert_eq!(&bytes[..4], &[0, 1, 0, 0]);
        assert_eq!(&bytes[24..28], &[1, 2, 3, 4]);
        assert_eq!(Executable::from_bytes(&bytes).unwrap(), exe);
    }

    #[test]
    fn test_version_mismatch() {
        let mut bytes = Executable::new(vec![]).to_bytes();
        bytes[1] = 2;
        assert_eq!(
            Executable::from_bytes(&bytes),
            Err(ExeError::VersionMismatch {
                expected: 0x0001_0000,
                found: 0x0002_0000
            })
        );
    }

    #[test]
    fn test_truncated_and_odd() {
        assert_eq!(
            Executable::from_bytes(&[0; 10]),
            Err(ExeError::Truncated { len: 10 })
        );
        let mut exe = Executable::new(vec![1, 2]);
        exe.program.push(3);
        assert_eq!(
            Executable::from_bytes(&exe.to_bytes()),
            Err(ExeError::OddProgramLength { words: 3 })
        );
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.x25");
        let layout = MemoryLayout {
            ram_start: 0x100,
            ram_end: 0x1FF,
            console_start: 0x200,
            console_end: 0x20F,
        };
        let exe = Executable {
            header: ExeHeader::new(layout, 0x104),
            program: vec![0x2400_0000, 7, 0x0400_0000, 0x100],
        };

        save_exe(&path, &exe).unwrap();
        let loaded = load_exe(&path).unwrap();
        assert_eq!(loaded, exe);
        assert_eq!(loaded.header.layout(), layout);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_exe(dir.path().join("nope.x25")),
            Err(ExeError::Io(_))
        ));
    }
}

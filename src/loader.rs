//! Loader for `.ls8` program text: one 8-digit binary byte per line.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::vm::MEMORY_SIZE;

const COMMENT_MARKER: char = '#';
const DIGITS_PER_BYTE: usize = 8;

// --- Loader Error (with line numbers) ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Line is neither blank/comment nor exactly eight `0`/`1` digits.
    #[error("line {line}: expected 8 binary digits, found '{text}'")]
    MalformedProgramLine { line: usize, text: String },
    /// More bytes than there are memory cells.
    #[error("program has {bytes} bytes but memory holds {}", MEMORY_SIZE)]
    ProgramTooLarge { bytes: usize },
    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },
}

// --- Memory Image ---

/// A full 256-byte memory snapshot ready for `Machine::load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    bytes: [u8; MEMORY_SIZE],
    len: usize,
}

impl MemoryImage {
    /// Copies `program` to address 0; the rest of memory is zeroed.
    pub fn from_bytes(program: &[u8]) -> Result<Self, LoadError> {
        if program.len() > MEMORY_SIZE {
            return Err(LoadError::ProgramTooLarge {
                bytes: program.len(),
            });
        }
        let mut bytes = [0; MEMORY_SIZE];
        bytes[..program.len()].copy_from_slice(program);
        Ok(MemoryImage {
            bytes,
            len: program.len(),
        })
    }

    pub fn bytes(&self) -> &[u8; MEMORY_SIZE] {
        &self.bytes
    }

    /// Number of bytes the program itself occupies.
    pub fn program_len(&self) -> usize {
        self.len
    }

    pub fn program(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

// --- Parsing ---

fn parse_byte(text: &str) -> Option<u8> {
    if text.len() != DIGITS_PER_BYTE || !text.bytes().all(|b| b == b'0' || b == b'1') {
        return None;
    }
    u8::from_str_radix(text, 2).ok()
}

/// Parses program text into a memory image.
///
/// Everything after `#` is a comment. Blank and comment-only lines are
/// skipped; every other line must be exactly eight binary digits.
pub fn parse_program(source: &str) -> Result<MemoryImage, LoadError> {
    let mut program = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let text = raw
            .split(COMMENT_MARKER)
            .next()
            .unwrap_or_default()
            .trim();
        if text.is_empty() {
            continue;
        }
        let byte = parse_byte(text).ok_or_else(|| LoadError::MalformedProgramLine {
            line: index + 1,
            text: text.to_string(),
        })?;
        program.push(byte);
    }
    MemoryImage::from_bytes(&program)
}

/// Reads and parses a program file.
pub fn load_file(path: impl AsRef<Path>) -> Result<MemoryImage, LoadError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let image = parse_program(&source)?;
    debug!(path = %path.display(), bytes = image.program_len(), "parsed program file");
    Ok(image)
}

//! Error taxonomy shared by the loading, resolution and analysis layers.
//!
//! Loading and resolution errors are fatal for a single artifact only; the
//! batch runner turns them into a failed report. Analysis errors are never
//! fatal and are downgraded to findings by the analyzer.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassFormatError {
    #[error("bad magic number 0x{0:08X}")]
    BadMagic(u32),
    #[error("unexpected end of data at offset {offset} (wanted {wanted} more bytes)")]
    Truncated { offset: usize, wanted: usize },
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },
    #[error("constant pool index {index} does not hold a {expected}")]
    BadConstant { index: u16, expected: &'static str },
    #[error("unknown opcode 0x{opcode:02X} at bytecode offset {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },
    #[error("malformed {attribute} attribute: {reason}")]
    BadAttribute {
        attribute: &'static str,
        reason: &'static str,
    },
    #[error("invalid descriptor `{descriptor}`: {reason}")]
    BadDescriptor {
        descriptor: String,
        reason: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot walk {}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
    #[error("{} is not a regular class file", path.display())]
    NotAFile { path: PathBuf },
    #[error("{} is neither a directory, a jar nor a class file", path.display())]
    UnsupportedLocation { path: PathBuf },
    #[error("{} is not a valid archive", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("malformed class file {entry} in {}", path.display())]
    Malformed {
        path: PathBuf,
        entry: String,
        #[source]
        source: ClassFormatError,
    },
    #[error("type {class} has supertype {supertype} which is not on the classpath")]
    UnresolvedSupertype { class: String, supertype: String },
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("invalid coordinates `{0}`, expected group:artifact[:version]")]
    InvalidCoordinates(String),
    #[error("no version of {coordinates} found under {}", root.display())]
    NoVersion { coordinates: String, root: PathBuf },
    #[error("artifact {coordinates} not found at {}", path.display())]
    NotFound { coordinates: String, path: PathBuf },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("method {method} is concrete but has no bytecode")]
    MissingCode { method: String },
    #[error("{0}")]
    Unexpected(String),
}

#[derive(Debug, Error)]
#[error("invalid package pattern `{pattern}`: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

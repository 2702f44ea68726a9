//! Loader utilities for snowport-core.
//!
//! Responsibilities:
//! - Detect whether the provided core bytes are a `.wasm` binary or `.wat` text.
//! - If it looks like WAT, convert it to WASM bytes (via the `wat` crate).
//! - Compile a Wasmtime `Module` from the resulting WASM bytes.
//!
//! File extensions are not trusted; the bytes themselves are sniffed.

use std::path::Path;

use wasmtime::{Engine, Module};

/// Error returned by loader helpers.
#[derive(Debug)]
pub enum LoadError {
    /// The input was empty or otherwise not recognized as WASM/WAT.
    UnrecognizedFormat,
    /// Reading the core from disk failed.
    Read(std::io::Error),
    /// WAT parsing failed.
    WatParseFailed(wat::Error),
    /// Wasmtime module compilation failed.
    CompileFailed(anyhow::Error),
}

impl core::fmt::Display for LoadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LoadError::UnrecognizedFormat => {
                write!(f, "unrecognized core format (expected wasm or wat)")
            }
            LoadError::Read(e) => write!(f, "failed to read core: {e}"),
            LoadError::WatParseFailed(e) => write!(f, "failed to parse WAT: {e}"),
            LoadError::CompileFailed(e) => write!(f, "failed to compile WASM module: {e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::UnrecognizedFormat => None,
            LoadError::Read(e) => Some(e),
            LoadError::WatParseFailed(e) => Some(e),
            LoadError::CompileFailed(e) => Some(e.as_ref()),
        }
    }
}

/// What kind of module the loader inferred from the bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DetectedFormat {
    Wasm,
    Wat,
}

/// Result of normalizing (detecting + possibly converting) the input.
#[derive(Clone, Debug)]
pub struct Detected {
    pub format: DetectedFormat,
    /// Always valid WASM bytes (for WASM/WAT inputs).
    pub wasm_bytes: Vec<u8>,
}

/// Load: detect -> (optional) wat->wasm -> compile.
pub fn compile_module(engine: &Engine, bytes: &[u8]) -> Result<Module, LoadError> {
    let Detected { format, wasm_bytes } = normalize_to_wasm(bytes)?;
    log::debug!("compiling {format:?} core ({} bytes)", wasm_bytes.len());
    Module::from_binary(engine, &wasm_bytes).map_err(LoadError::CompileFailed)
}

pub fn compile_file(engine: &Engine, path: &Path) -> Result<Module, LoadError> {
    let bytes = std::fs::read(path).map_err(LoadError::Read)?;
    compile_module(engine, &bytes)
}

/// Detect format and normalize to valid WASM bytes.
pub fn normalize_to_wasm(bytes: &[u8]) -> Result<Detected, LoadError> {
    let format = detect_format(bytes).ok_or(LoadError::UnrecognizedFormat)?;

    match format {
        DetectedFormat::Wasm => Ok(Detected {
            format,
            wasm_bytes: bytes.to_vec(),
        }),
        DetectedFormat::Wat => {
            let wasm = wat::parse_bytes(bytes).map_err(LoadError::WatParseFailed)?;
            Ok(Detected {
                format,
                wasm_bytes: wasm.into_owned(),
            })
        }
    }
}

/// Best-effort detection.
///
/// Rules:
/// - If the first 4 bytes are `\0asm`, treat as WASM.
/// - Else, after skipping a UTF-8 BOM, whitespace and `;;` line comments, a `(` means WAT.
pub fn detect_format(bytes: &[u8]) -> Option<DetectedFormat> {
    if bytes.starts_with(b"\0asm") {
        return Some(DetectedFormat::Wasm);
    }

    let i = skip_preamble(bytes);
    (bytes.get(i) == Some(&b'(')).then_some(DetectedFormat::Wat)
}

fn skip_preamble(bytes: &[u8]) -> usize {
    let mut i = if bytes.starts_with(b"\xEF\xBB\xBF") { 3 } else { 0 };

    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b';' if bytes.get(i + 1) == Some(&b';') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            _ => break,
        }
    }

    i
}

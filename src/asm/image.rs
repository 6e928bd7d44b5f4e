//! Program image files.
//!
//! Three on-disk forms are accepted:
//! - `.asm` / `.s`: assembly source, assembled on load
//! - `.hex`: text hex dump (see below)
//! - anything else: raw binary, loaded byte for byte
//!
//! The hex format is one or more lines of two-digit hex bytes. A line may
//! start with `AAAA:` to set the address of its first byte; gaps are zero
//! filled. `;` starts a comment.
//!
//! ```text
//! ; countdown
//! 0000: 06 03 17 41 FD
//! 0005: 48 FE
//! ```

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::asm::assembler::{assemble, AssemblerError};

/// Bytes per line written by [`to_hex`].
const BYTES_PER_LINE: usize = 16;

/// One past the last byte address an image may occupy.
const ADDRESS_LIMIT: usize = 0x1_0000;

/// Parse the text hex format.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, ImageError> {
    let mut image = Vec::new();
    let mut addr = 0usize;

    for (line_num, line) in text.lines().enumerate() {
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(colon) = line.find(':') {
            let prefix = line[..colon].trim();
            addr = u16::from_str_radix(prefix, 16)
                .map(usize::from)
                .map_err(|_| ImageError::ParseError {
                    line: line_num + 1,
                    message: format!("bad address '{}'", prefix),
                })?;
            line = line[colon + 1..].trim();
        }

        for token in line.split_whitespace() {
            let byte = u8::from_str_radix(token, 16).map_err(|_| ImageError::ParseError {
                line: line_num + 1,
                message: format!("bad byte '{}'", token),
            })?;
            if addr >= ADDRESS_LIMIT {
                return Err(ImageError::ParseError {
                    line: line_num + 1,
                    message: format!("byte '{}' runs past address $FFFF", token),
                });
            }
            if image.len() <= addr {
                image.resize(addr + 1, 0);
            }
            image[addr] = byte;
            addr += 1;
        }
    }

    Ok(image)
}

/// Render an image in the text hex format.
pub fn to_hex(image: &[u8]) -> String {
    let mut out = String::new();
    out.push_str("; acc8 program image\n");
    out.push_str(&format!("; {} bytes\n", image.len()));
    for (i, chunk) in image.chunks(BYTES_PER_LINE).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        out.push_str(&format!("{:04X}: {}\n", i * BYTES_PER_LINE, bytes.join(" ")));
    }
    out
}

/// Load a program from disk, choosing the parser by extension.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, ImageError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("asm") | Some("s") => {
            let source = fs::read_to_string(path).map_err(|e| ImageError::IoError(e.to_string()))?;
            Ok(assemble(&source)?)
        }
        Some("hex") => {
            let text = fs::read_to_string(path).map_err(|e| ImageError::IoError(e.to_string()))?;
            parse_hex(&text)
        }
        _ => fs::read(path).map_err(|e| ImageError::IoError(e.to_string())),
    }
}

/// Save an image to disk: text hex for `.hex`, raw bytes otherwise.
pub fn save_image<P: AsRef<Path>>(path: P, image: &[u8]) -> Result<(), ImageError> {
    let path = path.as_ref();
    let is_hex = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("hex"));

    let result = if is_hex {
        fs::write(path, to_hex(image))
    } else {
        fs::write(path, image)
    };
    result.map_err(|e| ImageError::IoError(e.to_string()))
}

/// Errors that can occur while reading or writing program images.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("assembly failed: {0}")]
    Assembly(#[from] AssemblerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_with_addresses() {
        let text = "; demo\n0000: 01 0A\n0004: 53 ; trailing\n";
        assert_eq!(parse_hex(text).unwrap(), vec![0x01, 0x0A, 0x00, 0x00, 0x53]);
    }

    #[test]
    fn test_parse_hex_without_addresses() {
        assert_eq!(parse_hex("48 fe").unwrap(), vec![0x48, 0xFE]);
    }

    #[test]
    fn test_parse_hex_errors() {
        assert!(matches!(parse_hex("01 GG"), Err(ImageError::ParseError { line: 1, .. })));
        assert!(matches!(parse_hex("\nZZ: 00"), Err(ImageError::ParseError { line: 2, .. })));
    }

    #[test]
    fn test_parse_hex_rejects_wide_addresses() {
        assert!(matches!(
            parse_hex("FFFFFFFFFFFFFFFF: 00"),
            Err(ImageError::ParseError { line: 1, .. })
        ));
        assert!(matches!(
            parse_hex("; big\nFFFFFFF: 00"),
            Err(ImageError::ParseError { line: 2, .. })
        ));
        assert!(matches!(parse_hex("10000: 00"), Err(ImageError::ParseError { line: 1, .. })));
    }

    #[test]
    fn test_parse_hex_stops_at_top_of_memory() {
        let image = parse_hex("FFFF: 7E").unwrap();
        assert_eq!(image.len(), 0x1_0000);
        assert_eq!(image[0xFFFF], 0x7E);

        assert!(matches!(parse_hex("FFFE: 01 02 03"), Err(ImageError::ParseError { line: 1, .. })));
    }

    #[test]
    fn test_hex_text_reparses() {
        let image: Vec<u8> = (0..40).collect();
        assert_eq!(parse_hex(&to_hex(&image)).unwrap(), image);
    }

    #[test]
    fn test_load_and_save_files() {
        let dir = std::env::temp_dir().join(format!("acc8-image-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let asm = dir.join("prog.asm");
        fs::write(&asm, "LDA #1\nNOP\n").unwrap();
        assert_eq!(load_image(&asm).unwrap(), vec![0x01, 0x01, 0x00]);

        let hex = dir.join("prog.hex");
        save_image(&hex, &[0x50, 0x00, 0x00]).unwrap();
        assert_eq!(load_image(&hex).unwrap(), vec![0x50, 0x00, 0x00]);

        let bin = dir.join("prog.bin");
        save_image(&bin, &[0xAA, 0x55]).unwrap();
        assert_eq!(load_image(&bin).unwrap(), vec![0xAA, 0x55]);

        fs::remove_dir_all(&dir).unwrap();
    }
}

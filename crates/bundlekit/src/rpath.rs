//! RPATH fixup for freshly extracted versions.
//!
//! Every dynamically linked ELF file under `bin/` and `lib/` gets its
//! runtime search path pointed at the version's own `lib/`, which makes the
//! tree relocatable. Classification is done here by reading the ELF program
//! headers; the rewrite goes through the [`SystemEffects`] port.

use crate::error::{IoContext, Result};
use crate::system::SystemEffects;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const PT_DYNAMIC: u32 = 2;

/// What a file is, as far as RPATH fixup cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfKind {
    NotElf,
    Static,
    Dynamic,
}

/// Classify a file by its ELF header and program headers.
///
/// Truncated or malformed ELF files count as [`ElfKind::NotElf`].
pub fn classify(path: &Path) -> Result<ElfKind> {
    let mut file = File::open(path).at(path)?;
    match read_kind(&mut file) {
        Ok(kind) => Ok(kind),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(ElfKind::NotElf),
        Err(e) => Err(e).at(path),
    }
}

fn read_kind<R: Read + Seek>(reader: &mut R) -> io::Result<ElfKind> {
    let mut ident = [0u8; 16];
    reader.read_exact(&mut ident)?;
    if ident[..4] != ELF_MAGIC {
        return Ok(ElfKind::NotElf);
    }

    let is_64 = match ident[4] {
        1 => false,
        2 => true,
        _ => return Ok(ElfKind::NotElf),
    };
    let little = match ident[5] {
        1 => true,
        2 => false,
        _ => return Ok(ElfKind::NotElf),
    };

    let mut header = [0u8; 48];
    let header_len = if is_64 { 48 } else { 36 };
    reader.read_exact(&mut header[..header_len])?;

    // Offsets below are relative to the end of e_ident.
    let (phoff, phentsize, phnum) = if is_64 {
        (
            read_u64(&header[16..24], little),
            u64::from(read_u16(&header[38..40], little)),
            read_u16(&header[40..42], little),
        )
    } else {
        (
            u64::from(read_u32(&header[12..16], little)),
            u64::from(read_u16(&header[26..28], little)),
            read_u16(&header[28..30], little),
        )
    };

    if phoff == 0 || phnum == 0 || phentsize < 4 {
        return Ok(ElfKind::Static);
    }

    for i in 0..u64::from(phnum) {
        reader.seek(SeekFrom::Start(phoff + i * phentsize))?;
        let mut p_type = [0u8; 4];
        reader.read_exact(&mut p_type)?;
        if read_u32(&p_type, little) == PT_DYNAMIC {
            return Ok(ElfKind::Dynamic);
        }
    }
    Ok(ElfKind::Static)
}

fn read_u16(bytes: &[u8], little: bool) -> u16 {
    let b = [bytes[0], bytes[1]];
    if little {
        u16::from_le_bytes(b)
    } else {
        u16::from_be_bytes(b)
    }
}

fn read_u32(bytes: &[u8], little: bool) -> u32 {
    let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if little {
        u32::from_le_bytes(b)
    } else {
        u32::from_be_bytes(b)
    }
}

fn read_u64(bytes: &[u8], little: bool) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[..8]);
    if little {
        u64::from_le_bytes(b)
    } else {
        u64::from_be_bytes(b)
    }
}

/// Point every dynamic ELF in `bin/` and `lib/` at `<version>/lib`.
///
/// Returns the patched files.
pub fn fixup(system: &dyn SystemEffects, version_dir: &Path) -> Result<Vec<PathBuf>> {
    let lib_dir = version_dir.join("lib");
    let mut patched = Vec::new();

    for sub in ["bin", "lib"] {
        let dir = version_dir.join(sub);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            match classify(entry.path())? {
                ElfKind::Dynamic => {
                    system.set_rpath(entry.path(), &lib_dir)?;
                    log::debug!("Set RPATH of {}", entry.path().display());
                    patched.push(entry.into_path());
                }
                kind => log::trace!("Skipping {} ({kind:?})", entry.path().display()),
            }
        }
    }

    Ok(patched)
}

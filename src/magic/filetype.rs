//! GY-031: File type sniffing from magic bytes.

use serde::Serialize;

/// A recognised file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileType {
    pub name: &'static str,
    pub extension: &'static str,
    pub mime: &'static str,
}

struct Signature {
    offset: usize,
    magic: &'static [u8],
    file_type: FileType,
}

const fn sig(
    offset: usize,
    magic: &'static [u8],
    name: &'static str,
    extension: &'static str,
    mime: &'static str,
) -> Signature {
    Signature {
        offset,
        magic,
        file_type: FileType {
            name,
            extension,
            mime,
        },
    }
}

/// Checked in order; the first match wins.
static SIGNATURES: &[Signature] = &[
    sig(0, &[0x1f, 0x8b, 0x08], "Gzip", "gz", "application/gzip"),
    sig(0, b"PK\x03\x04", "PKZIP archive", "zip", "application/zip"),
    sig(0, b"BZh", "Bzip2", "bz2", "application/x-bzip2"),
    sig(0, &[0x28, 0xb5, 0x2f, 0xfd], "Zstandard compressed data", "zst", "application/zstd"),
    sig(0, &[0xfd, b'7', b'z', b'X', b'Z', 0x00], "XZ compressed data", "xz", "application/x-xz"),
    sig(0, &[0x78, 0x9c], "Zlib compressed data", "zlib", "application/zlib"),
    sig(0, b"\x89PNG\r\n\x1a\n", "Portable Network Graphics image", "png", "image/png"),
    sig(0, &[0xff, 0xd8, 0xff], "Joint Photographic Experts Group image", "jpg", "image/jpeg"),
    sig(0, b"GIF87a", "Graphics Interchange Format image", "gif", "image/gif"),
    sig(0, b"GIF89a", "Graphics Interchange Format image", "gif", "image/gif"),
    sig(0, b"%PDF-", "Portable Document Format", "pdf", "application/pdf"),
    sig(0, b"\x7fELF", "ELF executable", "elf", "application/x-executable"),
    sig(257, b"ustar", "Tarball", "tar", "application/x-tar"),
];

/// Identify the format of `data` by its leading magic bytes.
pub fn detect(data: &[u8]) -> Option<FileType> {
    SIGNATURES
        .iter()
        .find(|s| {
            data.get(s.offset..s.offset + s.magic.len())
                .is_some_and(|window| window == s.magic)
        })
        .map(|s| s.file_type)
}

/// Whether `data` starts with the signature of a compressed stream or archive.
pub fn is_compressed(data: &[u8]) -> bool {
    matches!(
        detect(data).map(|ft| ft.extension),
        Some("gz" | "zip" | "bz2" | "zst" | "xz" | "zlib" | "tar")
    )
}

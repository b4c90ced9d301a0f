//! Content inspection: MIME sniffing from a content prefix and listing the
//! entries of archive uploads.

use flate2::read::GzDecoder;
use std::io::{self, ErrorKind, Read, Seek};

/// How many leading bytes `detect_mimetype` wants to see.
pub const SNIFF_LEN: usize = 512;

pub const MIME_ZIP: &str = "application/zip";
pub const MIME_TAR: &str = "application/x-tar";
pub const MIME_GZIP: &str = "application/gzip";
pub const MIME_TEXT: &str = "text/plain; charset=utf-8";
pub const MIME_BINARY: &str = "application/octet-stream";

const MAGIC_NUMBERS: &[(&[u8], &str)] = &[
    (&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], "image/png"),
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (&[0x50, 0x4B, 0x03, 0x04], MIME_ZIP),
    (&[0x50, 0x4B, 0x05, 0x06], MIME_ZIP),
    (&[0x1F, 0x8B], MIME_GZIP),
    (b"BZh", "application/x-bzip2"),
    (&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], "application/x-xz"),
    (&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], "application/x-7z-compressed"),
    (&[0x7F, 0x45, 0x4C, 0x46], "application/x-elf"),
    (&[0x00, 0x61, 0x73, 0x6D], "application/wasm"),
    (b"ID3", "audio/mpeg"),
    (b"OggS", "application/ogg"),
    (b"fLaC", "audio/flac"),
];

/// Detect the MIME type of an object from its first bytes.
pub fn detect_mimetype(prefix: &[u8]) -> String {
    if let Some(&(_, mime)) = MAGIC_NUMBERS
        .iter()
        .find(|(magic, _)| prefix.starts_with(magic))
    {
        return mime.to_string();
    }

    if prefix.len() >= 12 && &prefix[..4] == b"RIFF" && &prefix[8..12] == b"WEBP" {
        return "image/webp".into();
    }
    if prefix.len() >= 12 && &prefix[4..8] == b"ftyp" {
        return "video/mp4".into();
    }
    // BMP: "BM" followed by a size and two zeroed reserved words.
    if prefix.len() >= 14 && prefix.starts_with(b"BM") && prefix[6..10] == [0, 0, 0, 0] {
        return "image/bmp".into();
    }
    if prefix.len() >= 262 && &prefix[257..262] == b"ustar" {
        return MIME_TAR.into();
    }

    if looks_like_text(prefix) {
        MIME_TEXT.into()
    } else {
        MIME_BINARY.into()
    }
}

/// UTF-8 without NUL bytes. A multi-byte sequence cut off by the end of
/// the prefix still counts as text.
fn looks_like_text(prefix: &[u8]) -> bool {
    if prefix.contains(&0) {
        return false;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    }
}

/// Whether `list_archive_files` knows how to read this type.
pub fn is_archive(mimetype: &str) -> bool {
    matches!(mimetype, MIME_ZIP | MIME_TAR | MIME_GZIP | "application/x-gzip")
}

/// List the entry names of an archive, sorted.
///
/// `reader` must be positioned at the start of the object and `size` is its
/// total length in bytes.
pub fn list_archive_files<R: Read + Seek>(
    mimetype: &str,
    size: u64,
    reader: R,
) -> io::Result<Vec<String>> {
    let mut names = match mimetype {
        MIME_ZIP => list_zip(size, reader)?,
        MIME_TAR => list_tar(reader)?,
        MIME_GZIP | "application/x-gzip" => list_tar(GzDecoder::new(reader))?,
        other => {
            return Err(io::Error::new(
                ErrorKind::Unsupported,
                format!("cannot list archive of type `{}`", other),
            ));
        }
    };
    names.sort();
    Ok(names)
}

fn list_zip<R: Read + Seek>(size: u64, reader: R) -> io::Result<Vec<String>> {
    // Smallest possible zip is a bare end-of-central-directory record.
    if size < 22 {
        return Err(io::Error::new(ErrorKind::InvalidData, "zip archive truncated"));
    }
    let archive = zip::ZipArchive::new(reader).map_err(io::Error::other)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

fn list_tar<R: Read>(reader: R) -> io::Result<Vec<String>> {
    let mut archive = tar::Archive::new(reader);
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        names.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

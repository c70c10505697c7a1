//! Mime type detection by file extension or by content.

use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";

const EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
];

/// Mime type from the extension of `path`, `application/octet-stream` when
/// unknown.
#[must_use]
pub fn get_mime_type(path: impl AsRef<Path>) -> &'static str {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| {
            EXTENSIONS
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(OCTET_STREAM)
}

/// Mime type from the leading magic bytes of `bytes`. Unrecognized
/// content that is valid UTF-8 is `text/plain`.
#[must_use]
pub fn get_mime_type_from_bytes(bytes: &[u8]) -> &'static str {
    let riff = |kind: &[u8]| bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == kind;
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, ..] => "image/png",
        [0xff, 0xd8, 0xff, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'%', b'P', b'D', b'F', b'-', ..] => "application/pdf",
        [b'P', b'K', 0x03, 0x04, ..] => "application/zip",
        [0x1f, 0x8b, ..] => "application/gzip",
        [b'I', b'D', b'3', ..] | [0xff, 0xfb, ..] => "audio/mpeg",
        [b'O', b'g', b'g', b'S', ..] => "audio/ogg",
        _ if riff(b"WEBP") => "image/webp",
        _ if riff(b"WAVE") => "audio/wav",
        _ if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" => "video/mp4",
        _ if std::str::from_utf8(bytes).is_ok() => TEXT_PLAIN,
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_by_path() {
        let table = [
            ("foo.txt", "text/plain"),
            ("dir/foo.PDF", "application/pdf"),
            ("photo.jpeg", "image/jpeg"),
            ("data.json", "application/json"),
            ("bad.asdf", OCTET_STREAM),
            ("no_extension", OCTET_STREAM),
        ];
        for (path, mime) in table {
            assert_eq!(get_mime_type(path), mime, "{path}");
        }
    }

    #[test]
    fn test_mime_by_bytes() {
        assert_eq!(get_mime_type_from_bytes(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(get_mime_type_from_bytes(b"%PDF-1.7"), "application/pdf");
        assert_eq!(get_mime_type_from_bytes(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(get_mime_type_from_bytes(&[0xfe, 0x00, 0xc3]), OCTET_STREAM);
    }

    #[test]
    fn test_unknown_extension_with_text_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.asdf");
        std::fs::write(&path, "this file has an extension nobody knows").unwrap();

        assert_eq!(get_mime_type(&path), OCTET_STREAM);
        assert_eq!(get_mime_type_from_bytes(&std::fs::read(&path).unwrap()), TEXT_PLAIN);
    }
}

//! Out-of-band attachments for a single request.
//!
//! An [`Attachment`] is supplied per call and turned into one synthesized
//! user message with a single media part. It is never added to the
//! conversation history.
//!
//! Remote image URLs are passed through. Local files and raw bytes are
//! sniffed from their leading bytes, base64-encoded and embedded: images as
//! a `data:<mime>;base64,...` URI, audio as an `input_audio` part with a
//! container label.

use crate::error::AttachmentError;
use crate::{ImageUrl, InputAudio, MediaContent, Message};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected when sniffing a file.
pub const SNIFF_LEN: usize = 512;

/// Fallback label for audio that matches no known signature.
pub const UNKNOWN_AUDIO_FORMAT: &str = "unknown";

/// An attachment for the next request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// An `http(s)://` URL or a local file path.
    Image(String),
    /// Raw image bytes, e.g. piped from stdin.
    ImageBytes(Vec<u8>),
    /// A local audio file.
    Audio(String),
}

/// File access used for attachments and uploads.
///
/// Exists so tests can supply file contents without touching disk.
pub trait FileReader: Send + Sync {
    /// Read the whole file.
    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    /// Read at most [`SNIFF_LEN`] leading bytes.
    fn read_header(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let mut bytes = self.read_file(path)?;
        bytes.truncate(SNIFF_LEN);
        Ok(bytes)
    }
}

/// [`FileReader`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileReader;

impl FileReader for StdFileReader {
    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_header(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let file = std::fs::File::open(path)?;
        let mut buf = Vec::with_capacity(SNIFF_LEN);
        file.take(SNIFF_LEN as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Build the synthesized user message carrying `attachment`.
pub fn attachment_message(
    attachment: &Attachment,
    reader: &dyn FileReader,
) -> Result<Message, AttachmentError> {
    let part = match attachment {
        Attachment::Image(reference) => image_from_url_or_file(reference, reader)?,
        Attachment::ImageBytes(bytes) => image_from_bytes(bytes),
        Attachment::Audio(path) => audio_from_file(path, reader)?,
    };
    Ok(Message::user_media(vec![part]))
}

/// Image part from a URL (passed through) or a local file (embedded).
pub fn image_from_url_or_file(
    reference: &str,
    reader: &dyn FileReader,
) -> Result<MediaContent, AttachmentError> {
    if is_http_url(reference) {
        return Ok(image_part(reference.to_string()));
    }

    let path = Path::new(reference);
    let header = reader
        .read_header(path)
        .map_err(|source| read_error(reference, source))?;
    let mime = detect_mime(&header);
    let data = reader
        .read_file(path)
        .map_err(|source| read_error(reference, source))?;

    Ok(image_part(data_uri(mime, &data)))
}

/// Image part embedding raw bytes as a data URI.
pub fn image_from_bytes(bytes: &[u8]) -> MediaContent {
    image_part(data_uri(detect_mime(bytes), bytes))
}

/// Audio part with the sniffed container label.
pub fn audio_from_file(
    path: &str,
    reader: &dyn FileReader,
) -> Result<MediaContent, AttachmentError> {
    let file = Path::new(path);
    let header = reader
        .read_header(file)
        .map_err(|source| read_error(path, source))?;
    let format = detect_audio_format(&header);
    let data = reader
        .read_file(file)
        .map_err(|source| read_error(path, source))?;

    Ok(MediaContent::InputAudio {
        input_audio: InputAudio {
            data: STANDARD.encode(data),
            format: format.to_string(),
        },
    })
}

/// Whether `input` is an absolute `http` or `https` URL.
pub fn is_http_url(input: &str) -> bool {
    url::Url::parse(input).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

fn image_part(url: String) -> MediaContent {
    MediaContent::ImageUrl {
        image_url: ImageUrl { url },
    }
}

fn data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(data))
}

fn read_error(path: &str, source: std::io::Error) -> AttachmentError {
    AttachmentError::Read {
        path: path.to_string(),
        source,
    }
}

// ── Sniffing ───────────────────────────────────────────────────────

/// Sniff a MIME type from leading bytes.
///
/// Recognizes the common image containers; anything else is reported as
/// UTF-8 text when it contains no binary control bytes, or
/// `application/octet-stream` otherwise.
pub fn detect_mime(bytes: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"\x00\x00\x01\x00", "image/x-icon"),
        (b"\x00\x00\x02\x00", "image/x-icon"),
        (b"%PDF-", "application/pdf"),
    ];

    if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP") {
        return "image/webp";
    }
    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| bytes.starts_with(sig)) {
        return mime;
    }
    if bytes.is_empty() || bytes.iter().any(|b| is_binary_byte(*b)) {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Sniff an audio container label from leading bytes.
pub fn detect_audio_format(bytes: &[u8]) -> &'static str {
    let at = |range: std::ops::Range<usize>| bytes.get(range);

    if at(0..4) == Some(b"RIFF") && at(8..12) == Some(b"WAVE") {
        return "wav";
    }
    if at(0..3) == Some(b"ID3") {
        return "mp3";
    }
    if let [0xFF, second, ..] = bytes
        && second & 0xE0 == 0xE0
    {
        return "mp3";
    }
    if at(0..4) == Some(b"fLaC") {
        return "flac";
    }
    if at(0..4) == Some(b"OggS") {
        return "ogg";
    }
    if at(4..8) == Some(b"ftyp") {
        return match at(8..12) {
            Some(b"M4A ") | Some(b"isom") | Some(b"mp42") => "m4a",
            _ => "mp4",
        };
    }
    UNKNOWN_AUDIO_FORMAT
}

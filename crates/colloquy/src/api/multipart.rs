//! `multipart/form-data` bodies for uploads.
//!
//! Built in memory and sent through
//! [`Transport::post_with_headers`](super::Transport::post_with_headers),
//! so the transport never needs to know about form encoding.

use crate::ids::unique_id;

const CRLF: &str = "\r\n";

/// An in-memory multipart form.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::with_boundary(unique_id("colloquy-"))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Add a plain text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part(&format!("form-data; name=\"{}\"", escape(name)), None);
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(CRLF.as_bytes());
        self
    }

    /// Add a file field.
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape(name),
            escape(filename)
        );
        self.open_part(&disposition, Some(content_type));
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(CRLF.as_bytes());
        self
    }

    /// Close the form, returning `(content_type, body)`.
    pub fn finish(mut self) -> (String, Vec<u8>) {
        let closing = format!("--{}--{CRLF}", self.boundary);
        self.body.extend_from_slice(closing.as_bytes());
        (self.content_type(), self.body)
    }

    fn open_part(&mut self, disposition: &str, content_type: Option<&str>) {
        let mut head = format!("--{}{CRLF}Content-Disposition: {disposition}{CRLF}", self.boundary);
        if let Some(ct) = content_type {
            head.push_str(&format!("Content-Type: {ct}{CRLF}"));
        }
        head.push_str(CRLF);
        self.body.extend_from_slice(head.as_bytes());
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

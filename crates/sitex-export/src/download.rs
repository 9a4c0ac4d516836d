use std::io::{self, Read, Write};

/// Content type for a served file, from a closed mapping on the extension.
pub fn content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("zip") => "application/zip",
        Some("sql") => "application/sql",
        _ => "application/octet-stream",
    }
}

fn headers(file_name: &str, length: u64) -> Vec<(&'static str, String)> {
    let quoted = file_name.replace(['"', '\r', '\n'], "");
    vec![
        ("Content-Type", content_type(file_name).to_string()),
        ("Content-Disposition", format!("attachment; filename=\"{quoted}\"")),
        ("Content-Length", length.to_string()),
        ("Cache-Control", "no-cache, no-store, must-revalidate".to_string()),
        ("Pragma", "no-cache".to_string()),
        ("Expires", "0".to_string()),
        ("X-Content-Type-Options", "nosniff".to_string()),
        ("X-Frame-Options", "DENY".to_string()),
    ]
}

/// A validated file ready to stream.
pub struct DownloadResponse {
    pub file_name: String,
    pub length: u64,
    pub headers: Vec<(&'static str, String)>,
    body: Box<dyn Read + Send>,
}

impl DownloadResponse {
    pub(crate) fn new(file_name: String, length: u64, body: Box<dyn Read + Send>) -> Self {
        Self {
            headers: headers(&file_name, length),
            file_name,
            length,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Stream the body into `out`.
    pub fn write_to(mut self, out: &mut dyn Write) -> io::Result<u64> {
        io::copy(&mut self.body, out)
    }
}

impl std::fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("file_name", &self.file_name)
            .field("length", &self.length)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

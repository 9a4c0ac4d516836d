use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Compression {
    Stored,
    #[default]
    Deflated,
}

impl Compression {
    pub(crate) fn method(self) -> zip::CompressionMethod {
        match self {
            Self::Stored => zip::CompressionMethod::Stored,
            Self::Deflated => zip::CompressionMethod::Deflated,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub site_name: String,
    /// Timestamp embedded in the archive name.
    pub created_at: DateTime<Utc>,
    pub compression: Compression,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            site_name: "site".to_string(),
            created_at: Utc::now(),
            compression: Compression::default(),
        }
    }
}

impl BuildOptions {
    pub fn site_name(mut self, name: impl Into<String>) -> Self {
        self.site_name = name.into();
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

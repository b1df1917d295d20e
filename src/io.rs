use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use bytes::Bytes;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::debug;

/// What the object store reports about an uploaded object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    /// e.g. "application/gzip" or "text/csv"
    pub content_type: String,
    /// e.g. "gzip", "zstd", or empty
    pub content_encoding: String,
    /// just the key/filename (used for extension fallback)
    pub name_hint: String,
}

/// Upper bound on the buffer reserved before decompressing.
const MAX_OUTPUT_HINT: usize = 8 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl ObjectMeta {
    /// Lightweight meta from the object name's extension only.
    pub fn from_name(name: &str) -> Self {
        let file_name = Path::new(name)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let mut meta = Self {
            name_hint: file_name,
            ..Default::default()
        };

        let ext = Path::new(name)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match ext {
            "gz" => {
                meta.content_type = "application/gzip".into();
                meta.content_encoding = "gzip".into();
            }
            "zst" => {
                meta.content_type = "application/zstd".into();
                meta.content_encoding = "zstd".into();
            }
            _ => {
                meta.content_type = "text/csv".into();
            }
        }
        meta
    }

    /// Decompression choice: encoding -> type -> extension.
    pub fn compression(&self) -> Compression {
        let ce = self.content_encoding.to_ascii_lowercase();
        let ct = self.content_type.to_ascii_lowercase();

        let is_gzip = ce.split(',').any(|s| s.trim() == "gzip")
            || matches!(ct.as_str(), "application/gzip" | "application/x-gzip")
            || self.name_hint.ends_with(".gz");
        if is_gzip {
            return Compression::Gzip;
        }

        let is_zstd = ce.split(',').any(|s| s.trim() == "zstd")
            || ct == "application/zstd"
            || self.name_hint.ends_with(".zst");
        if is_zstd {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Object name without a `.gz`/`.zst` suffix.
pub fn strip_compression_suffix(name: &str) -> &str {
    name.strip_suffix(".gz")
        .or_else(|| name.strip_suffix(".zst"))
        .unwrap_or(name)
}

/// Initial output capacity for `compressed` input bytes; `read_to_end` grows past it.
fn output_hint(compressed: usize) -> usize {
    compressed.saturating_mul(4).min(MAX_OUTPUT_HINT)
}

/// Undo any transport compression of an object's content.
pub async fn decompress(data: Bytes, meta: &ObjectMeta) -> std::io::Result<Bytes> {
    let compression = meta.compression();
    if compression == Compression::None {
        return Ok(data);
    }

    let buf = BufReader::with_capacity(1 << 16, &data[..]);
    let mut reader: Box<dyn AsyncRead + Unpin + Send + '_> = match compression {
        Compression::Gzip => Box::new(GzipDecoder::new(buf)),
        Compression::Zstd => Box::new(ZstdDecoder::new(buf)),
        Compression::None => Box::new(buf),
    };

    let mut out = Vec::with_capacity(output_hint(data.len()));
    reader.read_to_end(&mut out).await?;
    debug!(?compression, compressed = data.len(), decompressed = out.len(), "decompressed object");
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_from_meta() {
        assert_eq!(ObjectMeta::from_name("a/b/r.csv").compression(), Compression::None);
        assert_eq!(ObjectMeta::from_name("a/b/r.csv.gz").compression(), Compression::Gzip);
        assert_eq!(ObjectMeta::from_name("a/b/r.csv.zst").compression(), Compression::Zstd);

        let meta = ObjectMeta {
            content_encoding: "br, GZIP".into(),
            ..Default::default()
        };
        assert_eq!(meta.compression(), Compression::Gzip);
    }

    #[test]
    fn suffix_is_stripped() {
        assert_eq!(strip_compression_suffix("r.csv.gz"), "r.csv");
        assert_eq!(strip_compression_suffix("r.csv.zst"), "r.csv");
        assert_eq!(strip_compression_suffix("r.csv"), "r.csv");
    }

    #[test]
    fn output_hint_is_capped() {
        assert_eq!(output_hint(1024), 4096);
        assert_eq!(output_hint(512 << 20), MAX_OUTPUT_HINT);
        assert_eq!(output_hint(usize::MAX), MAX_OUTPUT_HINT);
    }

    #[tokio::test]
    async fn gzip_objects_are_inflated() -> anyhow::Result<()> {
        let plain = b"zona;orden\n1;2\n".repeat(100);
        let mut gz = Vec::new();
        async_compression::tokio::bufread::GzipEncoder::new(&plain[..])
            .read_to_end(&mut gz)
            .await?;

        let out = decompress(Bytes::from(gz), &ObjectMeta::from_name("r.csv.gz")).await?;
        assert_eq!(out, plain);
        Ok(())
    }

    #[tokio::test]
    async fn plain_objects_pass_through() -> anyhow::Result<()> {
        let data = Bytes::from_static(b"zona;orden\n");
        let out = decompress(data.clone(), &ObjectMeta::from_name("r.csv")).await?;
        assert_eq!(out, data);
        Ok(())
    }
}

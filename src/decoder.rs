use crate::utils::Result;
use bytes::Bytes;
use encoding_rs::SHIFT_JIS;
use flate2::read::{DeflateDecoder, GzDecoder};
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
    Zstd,
}

impl ContentEncoding {
    /// Reads a `Content-Encoding` header value. Unknown codings are passed
    /// through as identity.
    pub fn from_header(value: Option<&str>) -> Self {
        let value = value.unwrap_or_default().trim().to_lowercase();
        match value.as_str() {
            "gzip" | "x-gzip" => ContentEncoding::Gzip,
            "deflate" => ContentEncoding::Deflate,
            "zstd" => ContentEncoding::Zstd,
            _ => ContentEncoding::Identity,
        }
    }
}

fn inflate<R: Read>(mut reader: R) -> Result<Bytes> {
    let mut decoded = Vec::new();
    reader.read_to_end(&mut decoded)?;
    Ok(Bytes::from(decoded))
}

pub fn decompress(data: &[u8], encoding: ContentEncoding) -> Result<Bytes> {
    match encoding {
        ContentEncoding::Identity => Ok(Bytes::copy_from_slice(data)),
        ContentEncoding::Gzip => inflate(GzDecoder::new(data)),
        ContentEncoding::Deflate => inflate(DeflateDecoder::new(data)),
        ContentEncoding::Zstd => Ok(Bytes::from(zstd::decode_all(data)?)),
    }
}

/// Decompresses a response body and decodes it as text.
///
/// Search responses are UTF-8, but some log shippers write Shift-JIS into
/// the source documents, so that is tried before giving up.
pub fn decode_body(data: &[u8], encoding: ContentEncoding) -> Result<String> {
    let body = decompress(data, encoding)?;

    match String::from_utf8(body.to_vec()) {
        Ok(s) => Ok(s),
        Err(utf8e) => {
            let (text, _, had_errors) = SHIFT_JIS.decode(&body);
            if had_errors {
                anyhow::bail!("Failed to decode body with utf8/shift-jis: {}", utf8e);
            }
            Ok(text.into_owned())
        }
    }
}

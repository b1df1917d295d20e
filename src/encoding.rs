use encoding_rs::{Encoding, ISO_8859_15, UTF_8, WINDOWS_1252};
use tracing::debug;

/// Candidate encodings tried in order when no byte-order mark is present.
///
/// windows-1252 maps every byte to a character, so with this list the
/// resolver never gets past it: ISO-8859-15 and the lossy fallback only come
/// into play for custom lists that leave windows-1252 out.
pub fn default_candidates() -> Vec<&'static Encoding> {
    vec![UTF_8, WINDOWS_1252, ISO_8859_15]
}

/// Text recovered from an uploaded object.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    /// The encoding that produced `text`.
    pub encoding: &'static Encoding,
    /// True when malformed sequences were replaced.
    pub lossy: bool,
}

/// Decodes raw bytes by trying an ordered list of encodings.
///
/// A byte-order mark wins over the candidate list. When every candidate
/// rejects the input, the first candidate decodes it with replacement
/// characters, so decoding never fails. Callers report `lossy` results.
#[derive(Debug, Clone)]
pub struct EncodingResolver {
    candidates: Vec<&'static Encoding>,
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
        }
    }
}

impl EncodingResolver {
    pub fn new(candidates: impl Into<Vec<&'static Encoding>>) -> Self {
        let candidates = candidates.into();
        if candidates.is_empty() {
            return Self::default();
        }
        Self { candidates }
    }

    pub fn candidates(&self) -> &[&'static Encoding] {
        &self.candidates
    }

    pub fn decode(&self, bytes: &[u8]) -> DecodedText {
        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            let (text, lossy) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
            debug!(encoding = encoding.name(), "decoded using byte-order mark");
            return DecodedText {
                text: text.into_owned(),
                encoding,
                lossy,
            };
        }

        for &encoding in &self.candidates {
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
            {
                debug!(encoding = encoding.name(), "decoded object");
                return DecodedText {
                    text: text.into_owned(),
                    encoding,
                    lossy: false,
                };
            }
        }

        let fallback = self.candidates[0];
        let (text, lossy) = fallback.decode_without_bom_handling(bytes);
        debug!(
            encoding = fallback.name(),
            "no candidate decoded cleanly, replacing malformed bytes"
        );
        DecodedText {
            text: text.into_owned(),
            encoding: fallback,
            lossy,
        }
    }
}

/// Decode with the default candidate list.
pub fn decode_text(bytes: &[u8]) -> DecodedText {
    EncodingResolver::default().decode(bytes)
}

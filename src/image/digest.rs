use crate::errors::ImageError;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::{fmt, ops::Range};

/// A digest securely identifies the specific contents of a binary object
///
/// The text form is `<format>:<hex>`, for example
/// `sha256:77af778b51abd4a3c51c5ddd97204a9c3ae614ebccb75a606c3b6865aed6744e`.
/// A reference carrying a digest is pinned: its meaning can't change when a
/// tag moves on the registry.
#[derive(Clone)]
pub struct ContentDigest {
    serialized: String,
    format_pos: Range<usize>,
    hex_pos: Range<usize>,
}

serialized_name_impls!(ContentDigest);

impl ContentDigest {
    /// Returns a reference to the existing string representation of a
    /// [ContentDigest]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Create a new ContentDigest from a format name and a hex-formattable
    /// hash value
    pub fn from_parts<T: fmt::LowerHex>(
        format_part: &str,
        hex_part: &T,
    ) -> Result<Self, ImageError> {
        ContentDigest::parse(&format!("{}:{:x}", format_part, hex_part))
    }

    /// Hash some content with `sha256`
    ///
    /// ```
    /// # use berth::image::ContentDigest;
    /// let digest = ContentDigest::from_content(b"cat");
    /// assert_eq!(digest.as_str(), "sha256:77af778b51abd4a3c51c5ddd97204a9c3ae614ebccb75a606c3b6865aed6744e");
    /// ```
    pub fn from_content(content_bytes: &[u8]) -> Self {
        let hash = Sha256::digest(content_bytes);
        ContentDigest::from_parts("sha256", &hash)
            .expect("sha256 output is always a valid digest")
    }

    /// Parse a [prim@str] as a [ContentDigest]
    ///
    /// ```
    /// # use berth::image::ContentDigest;
    /// let digest = ContentDigest::parse("format:00112233445566778899aabbccddeeff").unwrap();
    /// assert_eq!(digest.format_str(), "format");
    /// assert_eq!(digest.hex_str(), "00112233445566778899aabbccddeeff")
    /// ```
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", ContentDigest::regex_str())).unwrap();
        }
        match RE.captures(s) {
            None => Err(ImageError::InvalidReferenceFormat(s.to_owned())),
            Some(captures) => Ok(ContentDigest {
                serialized: s.to_owned(),
                format_pos: captures.name("dig_f").unwrap().range(),
                hex_pos: captures.name("dig_h").unwrap().range(),
            }),
        }
    }

    /// The hash format, `sha256` for everything we compute
    pub fn format_str(&self) -> &str {
        &self.serialized[self.format_pos.clone()]
    }

    /// At least 32 lowercase hex digits
    pub fn hex_str(&self) -> &str {
        &self.serialized[self.hex_pos.clone()]
    }

    pub(crate) fn regex_str() -> &'static str {
        concat!(
            "(?P<dig>",
            /*  */ "(?P<dig_f>", // format, alphanumeric groups joined by separators
            /* -- */ "[a-zA-Z][a-zA-Z0-9]*",
            /* -- */ "(?:[-_+.][a-zA-Z][a-zA-Z0-9]*)*",
            /*  */ ")",
            /*  */ "[:]",
            /*  */ "(?P<dig_h>[a-f0-9]{32,})",
            ")",
        )
    }
}

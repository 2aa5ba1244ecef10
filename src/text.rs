//! Textual metadata records: tEXt, zTXt and iTXt, spec.md §3 "Ancillary
//! state" and §6.

/// How a textual chunk's text is stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCompression {
    /// tEXt: stored uncompressed.
    Uncompressed,
    /// zTXt or compressed iTXt: stored zlib-compressed.
    Compressed,
}

/// One textual metadata record. `language` and `translated_keyword` are
/// only meaningful for iTXt and are empty strings for tEXt/zTXt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub keyword: String,
    pub text: String,
    pub compression: TextCompression,
    pub language: String,
    pub translated_keyword: String,
}

impl TextRecord {
    /// Builds a plain tEXt-shaped record (no language tag, uncompressed).
    pub fn latin1(keyword: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            text: text.into(),
            compression: TextCompression::Uncompressed,
            language: String::new(),
            translated_keyword: String::new(),
        }
    }

    /// Whether this record must be written as iTXt (has non-Latin-1 content
    /// or a language tag / translated keyword).
    pub fn requires_itxt(&self) -> bool {
        !self.language.is_empty()
            || !self.translated_keyword.is_empty()
            || !self.text.is_ascii()
    }
}

pub mod entry;
pub mod erp;

use std::fmt::{Debug, Display, Formatter, Write};

/// Fixed 16-byte type identifier classifying an entry's asset kind.
///
/// On disk the text is padded to 16 bytes and the padding bytes are not
/// guaranteed to be zeroed, so comparisons only look at the leading bytes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct TypeTag(pub [u8; 16]);

impl TypeTag {
    /// Case-insensitive match against a tag literal, ignoring the padding
    /// tail beyond `tag.len()` bytes.
    #[inline]
    pub fn matches(&self, tag: &str) -> bool {
        tag.len() <= self.0.len() && self.0[..tag.len()].eq_ignore_ascii_case(tag.as_bytes())
    }

    fn text(&self) -> &[u8] {
        let len = self.0.iter().position(|&c| c == 0).unwrap_or(self.0.len());
        &self.0[..len]
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for &c in self.text() {
            f.write_char(c as char)?;
        }
        Ok(())
    }
}

impl Debug for TypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_char('"')?;
        for &c in self.text() {
            f.write_char(c as char)?;
        }
        f.write_char('"')?;
        Ok(())
    }
}

impl PartialEq<[u8; 16]> for TypeTag {
    fn eq(&self, other: &[u8; 16]) -> bool { &self.0 == other }
}

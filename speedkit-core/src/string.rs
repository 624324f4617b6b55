use std::{
    fmt::{self, Debug, Display},
    io::Read,
};

use anyhow::Context;

use crate::binary::{Deserialize, Deserializer};

/// Fixed-width string field padded to `N` bytes with trailing NULs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedString<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> FixedString<N> {
    /// Returns the string's byte representation without the trailing NUL padding.
    pub fn to_bytes(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .rposition(|&byte| byte != b'\0')
            .map_or(0, |i| i + 1);
        &self.bytes[..end]
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self { bytes: [0; N] }
    }
}

impl<const N: usize> Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(utf8) = std::str::from_utf8(self.to_bytes()) {
            Debug::fmt(utf8, f)
        } else {
            f.write_str("<invalid UTF-8> ")?;
            Debug::fmt(&self.to_bytes(), f)
        }
    }
}

impl<const N: usize> Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(utf8) = std::str::from_utf8(self.to_bytes()) {
            Display::fmt(utf8, f)
        } else {
            f.write_str("<invalid UTF-8> ")?;
            Debug::fmt(&self.to_bytes(), f)
        }
    }
}

impl<const N: usize> Deserialize for FixedString<N> {
    fn deserialize(deserializer: &mut Deserializer<impl Read>) -> anyhow::Result<Self> {
        let mut bytes = [0; N];
        deserializer
            .read_bytes(&mut bytes)
            .with_context(|| format!("cannot read fixed string of width {N}"))?;
        Ok(Self { bytes })
    }
}

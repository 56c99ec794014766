//! SHA-256 digests of rendered documents.
use base64ct::{Base64, Encoding};
use sha2::{Digest as _, Sha256};
use std::fmt::{self, Display, Formatter, Write};

/// A single SHA-256 computation with its text encodings.
///
/// Every representation derives from the same 32 bytes.
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::Digest;
///
/// let digest = Digest::of(b"abc");
/// assert_eq!(digest.base64(), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
/// assert_eq!(Digest::from_base64(&digest.base64()), Some(digest));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

/// Digest of the canonical unsigned invoice.
pub type InvoiceHash = Digest;

impl Digest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Re-read a base64 encoded digest; `None` if it is not 32 bytes of base64.
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let bytes = Base64::decode_vec(encoded).ok()?;
        let raw: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(raw))
    }

    pub fn raw(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn base64(&self) -> String {
        Base64::encode_string(&self.0)
    }

    /// Lowercase hex.
    pub fn hex(&self) -> String {
        let mut hex = String::with_capacity(self.0.len() * 2);
        for byte in self.0 {
            let _ = write!(&mut hex, "{:02x}", byte);
        }
        hex
    }

    /// Base64 of the lowercase hex text, used for certificate and signed-properties digests.
    pub fn hex_base64(&self) -> String {
        Base64::encode_string(self.hex().as_bytes())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_HEX: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn known_vectors() {
        let digest = Digest::of(b"abc");
        assert_eq!(digest.hex(), ABC_HEX);
        assert_eq!(
            digest.base64(),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
        assert_eq!(
            Digest::of(b"").hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn encodings_describe_the_same_bytes() {
        let digest = Digest::of(b"<Invoice></Invoice>");
        let decoded = Base64::decode_vec(&digest.base64()).expect("base64");
        assert_eq!(decoded.as_slice(), digest.raw());

        let hex_text = Base64::decode_vec(&digest.hex_base64()).expect("hex base64");
        assert_eq!(hex_text, digest.hex().into_bytes());
    }

    #[test]
    fn from_base64_rejects_wrong_lengths() {
        assert_eq!(Digest::from_base64("YWJj"), None);
        assert_eq!(Digest::from_base64("not base64!"), None);
    }
}

use super::SigningError;
use base64ct::{Base64, Encoding};
use k256::SecretKey;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::pkcs8::{DecodePrivateKey, EncodePublicKey};
use std::fmt;

/// Produces signature bytes over an invoice digest.
pub trait DigestSigner {
    fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>, SigningError>;
}

/// secp256k1 ECDSA with SHA-256, DER-encoded output.
#[derive(Clone)]
pub struct EcdsaSigner {
    key: SigningKey,
}

impl fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaSigner").finish_non_exhaustive()
    }
}

impl EcdsaSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, SigningError> {
        SigningKey::from_pkcs8_der(der)
            .map(Self::new)
            .map_err(|e| SigningError::Key(format!("PKCS#8 parse error: {e}")))
    }

    /// PKCS#8 first, then SEC1.
    pub fn from_der(der: &[u8]) -> Result<Self, SigningError> {
        if let Ok(key) = SigningKey::from_pkcs8_der(der) {
            return Ok(Self::new(key));
        }
        SecretKey::from_sec1_der(der)
            .map(|secret| Self::new(SigningKey::from(secret)))
            .map_err(|e| SigningError::Key(format!("private key parse error: {e}")))
    }

    /// Accepts a PKCS#8 or SEC1 PEM, or the bare base64 body of either.
    pub fn from_pem(pem: &str) -> Result<Self, SigningError> {
        let pem = pem.trim();
        if pem.contains("BEGIN EC PRIVATE KEY") {
            return SecretKey::from_sec1_pem(pem)
                .map(|secret| Self::new(SigningKey::from(secret)))
                .map_err(|e| SigningError::Key(format!("SEC1 PEM parse error: {e}")));
        }
        if pem.contains("BEGIN PRIVATE KEY") {
            return SigningKey::from_pkcs8_pem(pem)
                .map(Self::new)
                .map_err(|e| SigningError::Key(format!("PKCS#8 PEM parse error: {e}")));
        }

        let body: String = pem.chars().filter(|c| !c.is_whitespace()).collect();
        let der = Base64::decode_vec(&body)
            .map_err(|e| SigningError::Key(format!("private key is not base64: {e}")))?;
        Self::from_der(&der)
    }

    /// A PEM document that was itself base64 encoded.
    pub fn from_base64_pem(encoded: &str) -> Result<Self, SigningError> {
        let decoded = Base64::decode_vec(encoded.trim())
            .map_err(|e| SigningError::Key(format!("private key is not base64: {e}")))?;
        let pem = String::from_utf8(decoded)
            .map_err(|e| SigningError::Key(format!("private key is not UTF-8: {e}")))?;
        Self::from_pem(&pem)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.key.verifying_key()
    }

    /// DER `SubjectPublicKeyInfo` of the verifying key.
    pub fn public_key_der(&self) -> Result<Vec<u8>, SigningError> {
        self.key
            .verifying_key()
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| SigningError::Key(format!("public key encoding error: {e}")))
    }
}

impl DigestSigner for EcdsaSigner {
    fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>, SigningError> {
        let signature: Signature = self
            .key
            .try_sign(digest)
            .map_err(|e| SigningError::Signer(format!("failed to sign invoice digest: {e}")))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

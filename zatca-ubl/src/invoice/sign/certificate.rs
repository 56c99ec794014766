use super::{SigningError, serial_bytes_to_decimal_string};
use crate::invoice::Digest;
use base64ct::{Base64, Encoding};
use tracing::debug;
use x509_cert::Certificate;
use x509_cert::der::{Decode, Encode};
use x509_cert::name::Name;

/// Identity fields of the signing certificate, as consumed by the signature and QR payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    issuer_name: String,
    serial_number: String,
    digest: String,
    public_key: Vec<u8>,
    signature: Vec<u8>,
    content_without_headers: String,
}

impl CertificateInfo {
    pub fn new(
        issuer_name: impl Into<String>,
        serial_number: impl Into<String>,
        digest: impl Into<String>,
        public_key: Vec<u8>,
        signature: Vec<u8>,
        content_without_headers: impl Into<String>,
    ) -> Self {
        Self {
            issuer_name: issuer_name.into(),
            serial_number: serial_number.into(),
            digest: digest.into(),
            public_key,
            signature,
            content_without_headers: content_without_headers.into(),
        }
    }

    /// Issuer distinguished name, most specific attribute first, `", "` separated.
    pub fn issuer_name(&self) -> &str {
        &self.issuer_name
    }

    /// Serial number in decimal.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Base64 of the hex SHA-256 of [`Self::content_without_headers`].
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// DER `SubjectPublicKeyInfo`.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// The issuing authority's signature over the certificate.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn content_without_headers(&self) -> &str {
        &self.content_without_headers
    }
}

/// Source of [`CertificateInfo`].
pub trait CertificateReader {
    fn read_certificate(&self, content: &str) -> Result<CertificateInfo, SigningError>;
}

/// Reads X.509 certificates given as PEM or bare base64 DER.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509CertificateReader;

impl CertificateReader for X509CertificateReader {
    fn read_certificate(&self, content: &str) -> Result<CertificateInfo, SigningError> {
        let body = strip_pem_headers(content);
        if body.is_empty() {
            return Err(SigningError::MissingField("certificate"));
        }
        let der = Base64::decode_vec(&body)
            .map_err(|e| SigningError::Certificate(format!("certificate is not base64: {e}")))?;
        let cert = Certificate::from_der(&der)
            .map_err(|e| SigningError::Certificate(format!("certificate parse error: {e}")))?;

        let tbs = &cert.tbs_certificate;
        let serial_number = serial_bytes_to_decimal_string(tbs.serial_number.as_bytes());
        let issuer_name = issuer_name(&tbs.issuer);
        let public_key = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| SigningError::Certificate(format!("public key encoding error: {e}")))?;
        let signature = cert
            .signature
            .as_bytes()
            .ok_or_else(|| SigningError::Certificate("certificate signature has unused bits".into()))?
            .to_vec();
        let digest = Digest::of(body.as_bytes()).hex_base64();

        debug!(issuer = %issuer_name, serial = %serial_number, "read signing certificate");
        Ok(CertificateInfo {
            issuer_name,
            serial_number,
            digest,
            public_key,
            signature,
            content_without_headers: body,
        })
    }
}

/// RFC 4514 form with `", "` between RDNs, most specific first.
///
/// Each RDN keeps its own escaping, so commas inside values stay escaped.
fn issuer_name(name: &Name) -> String {
    name.0
        .iter()
        .rev()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Drop PEM armor lines and all whitespace.
fn strip_pem_headers(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .flat_map(|line| line.chars().filter(|c| !c.is_whitespace()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIBAA==\n-----END CERTIFICATE-----\n";

    #[test]
    fn strips_armor_and_whitespace() {
        assert_eq!(strip_pem_headers(PEM), "MIIBAA==");
        assert_eq!(strip_pem_headers("  MIIB\r\n AA==  "), "MIIBAA==");
    }

    #[test]
    fn rejects_empty_and_garbage_input() {
        let reader = X509CertificateReader;
        assert!(matches!(
            reader.read_certificate("-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----"),
            Err(SigningError::MissingField("certificate"))
        ));
        assert!(matches!(
            reader.read_certificate("not a certificate"),
            Err(SigningError::Certificate(_))
        ));
        assert!(matches!(
            reader.read_certificate(PEM),
            Err(SigningError::Certificate(_))
        ));
    }

    #[test]
    fn issuer_name_joins_rdns_without_splitting_values() {
        let name = Name::from_str("CN=PRZEINVOICESCA4-CA,DC=extgazt,DC=gov,DC=local").expect("name");
        assert_eq!(
            issuer_name(&name),
            "CN=PRZEINVOICESCA4-CA, DC=extgazt, DC=gov, DC=local"
        );

        let name = Name::from_str("CN=Acme\\, Inc,O=Sample  Org,C=SA").expect("name");
        assert_eq!(issuer_name(&name), "CN=Acme\\, Inc, O=Sample  Org, C=SA");
    }
}

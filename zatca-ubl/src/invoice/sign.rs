mod certificate;
mod signer;

pub use certificate::{CertificateInfo, CertificateReader, X509CertificateReader};
pub use signer::{DigestSigner, EcdsaSigner};

use super::digest::{Digest, InvoiceHash};
use super::xml::{InvoiceXmlError, RenderMode, XmlFormat, render, signed_properties_xml};
use super::{Invoice, QrCodeError, QrPayload, SignedInvoice};
use crate::ErrorKind;
use crate::config::ConformanceProfile;
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signature field is missing: {0}")]
    MissingField(&'static str),
    #[error("certificate error: {0}")]
    Certificate(String),
    #[error("private key error: {0}")]
    Key(String),
    #[error("signer failed: {0}")]
    Signer(String),
    #[error(transparent)]
    Xml(#[from] InvoiceXmlError),
    #[error(transparent)]
    Qr(#[from] QrCodeError),
}

impl SigningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SigningError::MissingField(_) => ErrorKind::MissingField,
            SigningError::Certificate(_) | SigningError::Key(_) | SigningError::Signer(_) => {
                ErrorKind::Signing
            }
            SigningError::Xml(err) => err.kind(),
            SigningError::Qr(err) => err.kind(),
        }
    }
}

/// Signing context bound into the signature: when it was made and by which certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedProperties {
    signing_time: DateTime<Utc>,
    certificate_digest: String,
    issuer_name: String,
    serial_number: String,
}

impl SignedProperties {
    pub fn new(
        signing_time: DateTime<Utc>,
        certificate_digest: impl Into<String>,
        issuer_name: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            signing_time,
            certificate_digest: certificate_digest.into(),
            issuer_name: issuer_name.into(),
            serial_number: serial_number.into(),
        }
    }

    pub fn from_certificate(signing_time: DateTime<Utc>, certificate: &CertificateInfo) -> Self {
        Self::new(
            signing_time,
            certificate.digest(),
            certificate.issuer_name(),
            certificate.serial_number(),
        )
    }

    pub fn signing_time(&self) -> DateTime<Utc> {
        self.signing_time
    }

    pub fn signing_time_string(&self) -> String {
        format_signing_time(&self.signing_time)
    }

    pub fn certificate_digest(&self) -> &str {
        &self.certificate_digest
    }

    pub fn issuer_name(&self) -> &str {
        &self.issuer_name
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// The standalone `xades:SignedProperties` document that gets hashed.
    pub fn to_xml(&self) -> Result<String, InvoiceXmlError> {
        signed_properties_xml(
            &self.signing_time_string(),
            &self.certificate_digest,
            &self.issuer_name,
            &self.serial_number,
        )
    }

    pub fn digest(&self) -> Result<Digest, InvoiceXmlError> {
        Ok(Digest::of(self.to_xml()?.as_bytes()))
    }
}

/// Inputs gathered by the pipeline before a [`Signature`] can be assembled.
#[derive(Debug, Clone)]
pub struct SignatureParts {
    pub invoice_digest: Option<InvoiceHash>,
    pub signed_properties_digest: Option<Digest>,
    pub signature_value: Vec<u8>,
    pub certificate: String,
    pub certificate_digest: String,
    pub signing_time: DateTime<Utc>,
    pub issuer_name: String,
    pub serial_number: String,
}

/// Enveloped signature block attached to an invoice for the signed rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    invoice_digest: InvoiceHash,
    signed_properties_digest: Digest,
    signature_value: Vec<u8>,
    certificate: String,
    certificate_digest: String,
    signing_time: DateTime<Utc>,
    issuer_name: String,
    serial_number: String,
}

impl Signature {
    /// Aggregate signature material. No cryptography happens here.
    ///
    /// # Errors
    /// Returns [`SigningError::MissingField`] for the first absent or empty part.
    pub fn assemble(parts: SignatureParts) -> Result<Self, SigningError> {
        let invoice_digest = parts
            .invoice_digest
            .ok_or(SigningError::MissingField("invoice digest"))?;
        let signed_properties_digest = parts
            .signed_properties_digest
            .ok_or(SigningError::MissingField("signed properties digest"))?;
        if parts.signature_value.is_empty() {
            return Err(SigningError::MissingField("signature value"));
        }
        let text_fields = [
            ("certificate", &parts.certificate),
            ("certificate digest", &parts.certificate_digest),
            ("issuer name", &parts.issuer_name),
            ("serial number", &parts.serial_number),
        ];
        for (name, value) in text_fields {
            if value.trim().is_empty() {
                return Err(SigningError::MissingField(name));
            }
        }

        Ok(Self {
            invoice_digest,
            signed_properties_digest,
            signature_value: parts.signature_value,
            certificate: parts.certificate,
            certificate_digest: parts.certificate_digest,
            signing_time: parts.signing_time,
            issuer_name: parts.issuer_name,
            serial_number: parts.serial_number,
        })
    }

    pub fn invoice_digest(&self) -> InvoiceHash {
        self.invoice_digest
    }

    pub fn signed_properties_digest(&self) -> Digest {
        self.signed_properties_digest
    }

    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    pub fn signature_value_base64(&self) -> String {
        Base64::encode_string(&self.signature_value)
    }

    /// Certificate body without PEM armor.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    pub fn certificate_digest(&self) -> &str {
        &self.certificate_digest
    }

    pub fn signing_time(&self) -> DateTime<Utc> {
        self.signing_time
    }

    pub fn signing_time_string(&self) -> String {
        format_signing_time(&self.signing_time)
    }

    pub fn issuer_name(&self) -> &str {
        &self.issuer_name
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }
}

/// Runs the full pipeline for one certificate and signer.
///
/// unsigned canonical form -> invoice digest -> signer -> signed properties ->
/// signature -> QR payload -> signed document.
#[derive(Debug)]
pub struct InvoiceSigner<S> {
    signer: S,
    certificate: CertificateInfo,
    profile: ConformanceProfile,
}

impl<S: DigestSigner> InvoiceSigner<S> {
    pub fn new(signer: S, certificate: CertificateInfo) -> Self {
        Self {
            signer,
            certificate,
            profile: ConformanceProfile::default(),
        }
    }

    pub fn from_certificate(
        signer: S,
        reader: &impl CertificateReader,
        certificate: &str,
    ) -> Result<Self, SigningError> {
        Ok(Self::new(signer, reader.read_certificate(certificate)?))
    }

    pub fn with_profile(mut self, profile: ConformanceProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn certificate(&self) -> &CertificateInfo {
        &self.certificate
    }

    pub fn profile(&self) -> &ConformanceProfile {
        &self.profile
    }

    /// Sign using the invoice issue time as the signing time.
    pub fn sign(&self, invoice: &Invoice) -> Result<SignedInvoice, SigningError> {
        self.sign_at(invoice, *invoice.data().issue_datetime())
    }

    pub fn sign_at(
        &self,
        invoice: &Invoice,
        signing_time: DateTime<Utc>,
    ) -> Result<SignedInvoice, SigningError> {
        let unsigned = invoice.unsigned();
        let invoice_hash = unsigned.generate_hash_with_profile(&self.profile)?;
        debug!(invoice_id = unsigned.data().id(), hash = %invoice_hash, "hashed canonical invoice");

        let signature_value = self.signer.sign_digest(invoice_hash.raw())?;
        debug!(len = signature_value.len(), "signed invoice digest");

        let signed_properties = SignedProperties::from_certificate(signing_time, &self.certificate);
        let signed_properties_digest = signed_properties.digest()?;
        debug!(
            signing_time = %signed_properties.signing_time_string(),
            digest = %signed_properties_digest.hex_base64(),
            "hashed signed properties"
        );

        let signature = Signature::assemble(SignatureParts {
            invoice_digest: Some(invoice_hash),
            signed_properties_digest: Some(signed_properties_digest),
            signature_value,
            certificate: self.certificate.content_without_headers().to_string(),
            certificate_digest: self.certificate.digest().to_string(),
            signing_time,
            issuer_name: self.certificate.issuer_name().to_string(),
            serial_number: self.certificate.serial_number().to_string(),
        })?;

        let qr_code = QrPayload::from_invoice(&unsigned, &signature, &self.certificate, &self.profile)?
            .encode_with_limit(self.profile.max_qr_length())?;

        let signed = unsigned.with_signature(signature).with_qr_code(qr_code.clone());
        let signed_xml = render(&signed, RenderMode::Document(XmlFormat::Compact), &self.profile)?;
        info!(
            invoice_id = signed.data().id(),
            uuid = signed.data().uuid(),
            "signed invoice"
        );

        Ok(SignedInvoice::new(
            signed,
            invoice_hash,
            qr_code,
            signed_xml,
            self.profile.clone(),
        ))
    }
}

fn format_signing_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub(crate) fn serial_bytes_to_decimal_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "0".to_string();
    }

    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while digits.len() > 1 && matches!(digits.last(), Some(0)) {
        digits.pop();
    }

    digits.iter().rev().map(|d| (b'0' + *d) as char).collect()
}

use super::sign::{CertificateInfo, Signature};
use super::{Invoice, InvoiceData};
use crate::ErrorKind;
use crate::config::{ConformanceProfile, QrSignatureEncoding};
use base64ct::{Base64, Encoding};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum QrCodeError {
    #[error("QR field is missing: {0}")]
    MissingField(&'static str),
    #[error("TLV field {tag} exceeds 255 bytes (len={len})")]
    ValueTooLong { tag: u8, len: usize },
    #[error("QR code payload exceeds {max} characters once base64 encoded (len={len})")]
    EncodedTooLong { len: usize, max: usize },
    #[error("malformed TLV stream at byte {offset}")]
    Malformed { offset: usize },
    #[error("QR code payload is not valid base64")]
    InvalidBase64,
}

impl QrCodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QrCodeError::MissingField(_) => ErrorKind::MissingField,
            _ => ErrorKind::Encoding,
        }
    }
}

pub type QrResult<T> = std::result::Result<T, QrCodeError>;

/// A single TLV value: text is written as UTF-8, binary as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlvValue {
    Text(String),
    Binary(Vec<u8>),
}

impl TlvValue {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TlvValue::Text(text) => text.as_bytes(),
            TlvValue::Binary(bytes) => bytes,
        }
    }
}

/// Caller-supplied QR values, in tag order.
///
/// Tags 1-5 are always present. Tags 6-9 are optional but must form a prefix:
/// a later field cannot be set while an earlier one is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QrFields {
    pub seller_name: String,
    pub vat_number: String,
    pub timestamp: String,
    pub invoice_total: String,
    pub vat_total: String,
    pub invoice_hash: Option<String>,
    pub signature: Option<TlvValue>,
    pub public_key: Option<Vec<u8>>,
    pub certificate_signature: Option<Vec<u8>>,
}

/// Ordered QR payload; the tag of each value is its 1-based position.
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::{QrFields, QrPayload, decode_tlv};
/// use base64ct::{Base64, Encoding};
///
/// let payload = QrPayload::new(QrFields {
///     seller_name: "Ahmed Mohamed AL Ahmady".into(),
///     vat_number: "301121971500003".into(),
///     timestamp: "2022-03-13T14:40:40Z".into(),
///     invoice_total: "1108.90".into(),
///     vat_total: "144.9".into(),
///     ..QrFields::default()
/// })?;
/// let encoded = payload.encode()?;
/// let entries = decode_tlv(&Base64::decode_vec(&encoded).unwrap())?;
/// assert_eq!(entries[0], (1, b"Ahmed Mohamed AL Ahmady".to_vec()));
/// # Ok::<(), zatca_ubl::invoice::QrCodeError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    values: Vec<TlvValue>,
}

impl QrPayload {
    /// # Errors
    /// Returns [`QrCodeError::MissingField`] if the seller name or VAT number is empty,
    /// or if an optional field is set after a missing one.
    pub fn new(fields: QrFields) -> QrResult<Self> {
        if fields.seller_name.trim().is_empty() {
            return Err(QrCodeError::MissingField("seller name"));
        }
        if fields.vat_number.trim().is_empty() {
            return Err(QrCodeError::MissingField("VAT number"));
        }

        let mut values = vec![
            TlvValue::Text(fields.seller_name),
            TlvValue::Text(fields.vat_number),
            TlvValue::Text(fields.timestamp),
            TlvValue::Text(fields.invoice_total),
            TlvValue::Text(fields.vat_total),
        ];

        let optional = [
            ("invoice hash", fields.invoice_hash.map(TlvValue::Text)),
            ("ECDSA signature", fields.signature),
            ("ECDSA public key", fields.public_key.map(TlvValue::Binary)),
            (
                "certificate signature",
                fields.certificate_signature.map(TlvValue::Binary),
            ),
        ];
        let mut missing: Option<&'static str> = None;
        for (name, value) in optional {
            match (value, missing) {
                (Some(_), Some(gap)) => return Err(QrCodeError::MissingField(gap)),
                (Some(value), None) => values.push(value),
                (None, _) => missing = missing.or(Some(name)),
            }
        }

        Ok(Self { values })
    }

    /// Build the payload of a signed invoice.
    ///
    /// The invoice total and VAT total use two decimals, the timestamp is the issue time in UTC.
    pub fn from_invoice(
        invoice: &Invoice,
        signature: &Signature,
        certificate: &CertificateInfo,
        profile: &ConformanceProfile,
    ) -> QrResult<Self> {
        let data = invoice.data();
        let seller = data.seller();
        let vat_number = seller
            .vat_id()
            .map(|vat| vat.as_str().to_string())
            .ok_or(QrCodeError::MissingField("VAT number"))?;

        let signature_value = match profile.qr_signature_encoding() {
            QrSignatureEncoding::Raw => TlvValue::Binary(signature.signature_value().to_vec()),
            QrSignatureEncoding::Base64Text => {
                TlvValue::Text(signature.signature_value_base64())
            }
        };

        Self::new(QrFields {
            seller_name: seller.name().to_string(),
            vat_number,
            timestamp: data
                .issue_datetime()
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
            invoice_total: InvoiceData::format_amount(data.totals().tax_inclusive_amount),
            vat_total: InvoiceData::format_amount(data.totals().tax_amount),
            invoice_hash: Some(signature.invoice_digest().base64()),
            signature: Some(signature_value),
            public_key: Some(certificate.public_key().to_vec()),
            certificate_signature: Some(certificate.signature().to_vec()),
        })
    }

    /// `(tag, value)` pairs in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (u8, &TlvValue)> {
        self.values
            .iter()
            .enumerate()
            .map(|(idx, value)| (idx as u8 + 1, value))
    }

    /// Raw TLV bytes.
    pub fn encode_tlv(&self) -> QrResult<Vec<u8>> {
        let mut tlv = TlvBuilder::new();
        for (tag, value) in self.entries() {
            tlv.push_bytes(tag, value.as_bytes())?;
        }
        Ok(tlv.bytes)
    }

    /// Base64 of the TLV bytes, without a length ceiling.
    pub fn to_base64(&self) -> QrResult<String> {
        Ok(Base64::encode_string(&self.encode_tlv()?))
    }

    /// Base64 of the TLV bytes, limited to the default profile's ceiling.
    pub fn encode(&self) -> QrResult<String> {
        self.encode_with_limit(ConformanceProfile::default().max_qr_length())
    }

    pub fn encode_with_limit(&self, max_len: Option<usize>) -> QrResult<String> {
        let encoded = self.to_base64()?;
        if let Some(max) = max_len {
            if encoded.len() > max {
                return Err(QrCodeError::EncodedTooLong {
                    len: encoded.len(),
                    max,
                });
            }
        }
        debug!(tags = self.values.len(), len = encoded.len(), "encoded QR payload");
        Ok(encoded)
    }
}

struct TlvBuilder {
    bytes: Vec<u8>,
}

impl TlvBuilder {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn push_bytes(&mut self, tag: u8, value: &[u8]) -> QrResult<()> {
        if value.len() > u8::MAX as usize {
            return Err(QrCodeError::ValueTooLong {
                tag,
                len: value.len(),
            });
        }
        trace!(tag, len = value.len(), "tlv field");
        self.bytes.push(tag);
        self.bytes.push(value.len() as u8);
        self.bytes.extend_from_slice(value);
        Ok(())
    }
}

/// Split a TLV byte stream into `(tag, value)` pairs.
///
/// # Errors
/// Returns [`QrCodeError::Malformed`] if a length byte or value runs past the end.
pub fn decode_tlv(bytes: &[u8]) -> QrResult<Vec<(u8, Vec<u8>)>> {
    let mut entries = Vec::new();
    let mut idx = 0;
    while idx < bytes.len() {
        let tag = bytes[idx];
        let len = *bytes
            .get(idx + 1)
            .ok_or(QrCodeError::Malformed { offset: idx + 1 })? as usize;
        let start = idx + 2;
        let end = start + len;
        let value = bytes
            .get(start..end)
            .ok_or(QrCodeError::Malformed { offset: start })?;
        entries.push((tag, value.to_vec()));
        idx = end;
    }
    Ok(entries)
}

/// Decode a base64 QR string into `(tag, value)` pairs.
pub fn decode_base64(encoded: &str) -> QrResult<Vec<(u8, Vec<u8>)>> {
    let bytes = Base64::decode_vec(encoded).map_err(|_| QrCodeError::InvalidBase64)?;
    decode_tlv(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_one_fields() -> QrFields {
        QrFields {
            seller_name: "Acme Inc".into(),
            vat_number: "301121971500003".into(),
            timestamp: "2024-01-01T12:30:00Z".into(),
            invoice_total: "115.00".into(),
            vat_total: "15.00".into(),
            ..QrFields::default()
        }
    }

    #[test]
    fn qr_code_contains_all_required_tags() {
        let payload = QrPayload::new(QrFields {
            invoice_hash: Some("hash==".into()),
            signature: Some(TlvValue::Binary(vec![0x30, 0x45, 0x02])),
            public_key: Some(b"public-key".to_vec()),
            certificate_signature: Some(b"stamp".to_vec()),
            ..phase_one_fields()
        })
        .expect("payload");

        let qr = payload.encode().expect("encode");
        assert!(qr.len() < 700);

        let entries = decode_base64(&qr).expect("decode");
        let expected = vec![
            (1, b"Acme Inc".to_vec()),
            (2, b"301121971500003".to_vec()),
            (3, b"2024-01-01T12:30:00Z".to_vec()),
            (4, b"115.00".to_vec()),
            (5, b"15.00".to_vec()),
            (6, b"hash==".to_vec()),
            (7, vec![0x30, 0x45, 0x02]),
            (8, b"public-key".to_vec()),
            (9, b"stamp".to_vec()),
        ];
        assert_eq!(entries, expected);
    }

    #[test]
    fn phase_one_payload_stops_at_tag_five() {
        let payload = QrPayload::new(phase_one_fields()).expect("payload");
        let tags: Vec<u8> = payload.entries().map(|(tag, _)| tag).collect();
        assert_eq!(tags, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn optional_fields_cannot_leave_gaps() {
        let err = QrPayload::new(QrFields {
            invoice_hash: Some("hash==".into()),
            public_key: Some(vec![1, 2, 3]),
            ..phase_one_fields()
        })
        .unwrap_err();
        assert!(matches!(err, QrCodeError::MissingField("ECDSA signature")));
    }

    #[test]
    fn missing_seller_is_rejected() {
        let err = QrPayload::new(QrFields {
            seller_name: "  ".into(),
            ..phase_one_fields()
        })
        .unwrap_err();
        assert!(matches!(err, QrCodeError::MissingField("seller name")));
        assert_eq!(err.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn value_length_boundary() {
        let at_limit = QrPayload::new(QrFields {
            seller_name: "a".repeat(255),
            ..phase_one_fields()
        })
        .expect("payload");
        let tlv = at_limit.encode_tlv().expect("255 bytes fit");
        assert_eq!(tlv[0], 1);
        assert_eq!(tlv[1], 255);

        let over = QrPayload::new(QrFields {
            seller_name: "a".repeat(256),
            ..phase_one_fields()
        })
        .expect("payload");
        match over.encode_tlv() {
            Err(err @ QrCodeError::ValueTooLong { tag: 1, len: 256 }) => {
                assert_eq!(err.kind(), ErrorKind::Encoding)
            }
            other => panic!("expected ValueTooLong error, got {:?}", other),
        }
    }

    #[test]
    fn qr_code_errors_when_payload_too_long() {
        let payload = QrPayload::new(QrFields {
            invoice_hash: Some("a".repeat(200)),
            signature: Some(TlvValue::Text("a".repeat(200))),
            public_key: Some(vec![b'k'; 200]),
            certificate_signature: Some(vec![b'k'; 200]),
            ..phase_one_fields()
        })
        .expect("payload");

        match payload.encode() {
            Err(QrCodeError::EncodedTooLong { max: 700, .. }) => {}
            other => panic!("expected EncodedTooLong error, got {:?}", other),
        }
        assert!(payload.encode_with_limit(None).is_ok());
        assert!(payload.to_base64().is_ok());
    }

    #[test]
    fn decode_rejects_truncated_streams() {
        assert!(matches!(
            decode_tlv(&[1]),
            Err(QrCodeError::Malformed { offset: 1 })
        ));
        assert!(matches!(
            decode_tlv(&[1, 5, b'a']),
            Err(QrCodeError::Malformed { offset: 2 })
        ));
        assert_eq!(decode_tlv(&[]).expect("empty"), vec![]);
    }
}

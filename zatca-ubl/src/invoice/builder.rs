use super::digest::{Digest, InvoiceHash};
use super::sign::{DigestSigner, InvoiceSigner, Signature, SigningError};
use super::xml::{InvoiceXmlError, RenderMode, XmlFormat, render};
use super::{
    AllowanceCharge, Buyer, Delivery, InvoiceData, InvoiceError, InvoiceFlags, InvoiceNote,
    InvoiceTotals, InvoiceType, LineItems, QrPayload, QrResult, Seller,
};
use crate::config::ConformanceProfile;
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use iso_currency::Currency;

/// Values every invoice must carry.
#[derive(Debug, Clone)]
pub struct RequiredInvoiceFields {
    pub invoice_type: InvoiceType,
    pub id: String,
    pub uuid: String,
    pub issue_datetime: DateTime<Utc>,
    pub currency: Currency,
    pub previous_invoice_hash: String,
    pub invoice_counter: u64,
    pub seller: Seller,
    pub line_items: LineItems,
    pub totals: InvoiceTotals,
    pub payment_means_code: String,
}

/// Builder for [`Invoice`].
///
/// Totals are taken as given; see [`InvoiceTotals::from_line_items`] to derive them.
#[derive(Debug)]
pub struct InvoiceBuilder {
    invoice: InvoiceData,
}

impl InvoiceBuilder {
    pub fn new(fields: RequiredInvoiceFields) -> Self {
        Self {
            invoice: InvoiceData {
                invoice_type: fields.invoice_type,
                flags: InvoiceFlags::empty(),
                id: fields.id,
                uuid: fields.uuid,
                issue_datetime: fields.issue_datetime,
                currency: fields.currency,
                note: None,
                invoice_counter: fields.invoice_counter,
                previous_invoice_hash: fields.previous_invoice_hash,
                seller: fields.seller,
                buyer: None,
                delivery: None,
                payment_means_code: fields.payment_means_code,
                allowance_charges: Vec::new(),
                totals: fields.totals,
                line_items: fields.line_items,
            },
        }
    }

    pub fn note(mut self, note: InvoiceNote) -> Self {
        self.invoice.note = Some(note);
        self
    }

    pub fn buyer(mut self, buyer: Buyer) -> Self {
        self.invoice.buyer = Some(buyer);
        self
    }

    pub fn flags(mut self, flags: InvoiceFlags) -> Self {
        self.invoice.flags = flags;
        self
    }

    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.invoice.delivery = Some(delivery);
        self
    }

    pub fn allowance_charge(mut self, allowance_charge: AllowanceCharge) -> Self {
        self.invoice.allowance_charges.push(allowance_charge);
        self
    }

    pub fn allowance_charges(mut self, allowance_charges: Vec<AllowanceCharge>) -> Self {
        self.invoice.allowance_charges = allowance_charges;
        self
    }

    pub fn build(self) -> Result<Invoice, InvoiceError> {
        if self.invoice.line_items.is_empty() {
            return Err(InvoiceError::MissingLineItems);
        }

        Ok(Invoice {
            data: self.invoice,
            signature: None,
            qr_code: None,
        })
    }
}

/// An invoice, optionally carrying its signature and QR code.
///
/// Attaching either returns a new value; the unsigned form stays available through
/// [`Invoice::unsigned`].
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    data: InvoiceData,
    signature: Option<Signature>,
    qr_code: Option<String>,
}

impl Invoice {
    pub fn data(&self) -> &InvoiceData {
        &self.data
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn qr_code(&self) -> Option<&str> {
        self.qr_code.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn with_signature(&self, signature: Signature) -> Invoice {
        Invoice {
            signature: Some(signature),
            ..self.clone()
        }
    }

    pub fn with_qr_code(&self, qr_code: impl Into<String>) -> Invoice {
        Invoice {
            qr_code: Some(qr_code.into()),
            ..self.clone()
        }
    }

    /// Attach an encoded [`QrPayload`].
    pub fn with_qr_payload(&self, payload: &QrPayload) -> QrResult<Invoice> {
        Ok(self.with_qr_code(payload.encode()?))
    }

    /// The same invoice without signature or QR code.
    pub fn unsigned(&self) -> Invoice {
        Invoice {
            data: self.data.clone(),
            signature: None,
            qr_code: None,
        }
    }

    /// Hash of the canonical unsigned rendering.
    pub fn generate_hash(&self) -> Result<InvoiceHash, InvoiceXmlError> {
        self.generate_hash_with_profile(&ConformanceProfile::default())
    }

    pub fn generate_hash_with_profile(
        &self,
        profile: &ConformanceProfile,
    ) -> Result<InvoiceHash, InvoiceXmlError> {
        let canonical = self.canonical_xml_with_profile(profile)?;
        Ok(Digest::of(canonical.as_bytes()))
    }

    pub fn generate_xml(&self, format: XmlFormat) -> Result<String, InvoiceXmlError> {
        self.generate_xml_with_profile(format, &ConformanceProfile::default())
    }

    pub fn generate_xml_with_profile(
        &self,
        format: XmlFormat,
        profile: &ConformanceProfile,
    ) -> Result<String, InvoiceXmlError> {
        render(self, RenderMode::Document(format), profile)
    }

    /// The exact bytes that are hashed and embedded in the signed document.
    pub fn canonical_xml(&self) -> Result<String, InvoiceXmlError> {
        self.canonical_xml_with_profile(&ConformanceProfile::default())
    }

    pub fn canonical_xml_with_profile(
        &self,
        profile: &ConformanceProfile,
    ) -> Result<String, InvoiceXmlError> {
        render(self, RenderMode::Canonical, profile)
    }

    pub fn sign<S: DigestSigner>(
        &self,
        signer: &InvoiceSigner<S>,
    ) -> Result<SignedInvoice, SigningError> {
        signer.sign(self)
    }
}

/// Output of the signing pipeline.
#[derive(Debug, Clone)]
pub struct SignedInvoice {
    invoice: Invoice,
    invoice_hash: InvoiceHash,
    qr_code: String,
    signed_xml: String,
    profile: ConformanceProfile,
}

impl SignedInvoice {
    pub(crate) fn new(
        invoice: Invoice,
        invoice_hash: InvoiceHash,
        qr_code: String,
        signed_xml: String,
        profile: ConformanceProfile,
    ) -> Self {
        Self {
            invoice,
            invoice_hash,
            qr_code,
            signed_xml,
            profile,
        }
    }

    /// The invoice with signature and QR code attached.
    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn data(&self) -> &InvoiceData {
        self.invoice.data()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.invoice.signature()
    }

    pub fn qr_code(&self) -> &str {
        &self.qr_code
    }

    pub fn xml(&self) -> &str {
        &self.signed_xml
    }

    pub fn uuid(&self) -> &str {
        self.invoice.data().uuid()
    }

    pub fn invoice_hash(&self) -> InvoiceHash {
        self.invoice_hash
    }

    pub fn profile(&self) -> &ConformanceProfile {
        &self.profile
    }

    pub fn to_xml_base64(&self) -> String {
        Base64::encode_string(self.signed_xml.as_bytes())
    }
}

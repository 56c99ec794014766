//! XML serialization for invoices.
use super::{
    Address, AllowanceCharge, Buyer, Delivery, Invoice, InvoiceData, InvoiceNote, InvoiceTotals,
    LineItem, OriginalInvoiceRef, OtherId, Party, PartyRole, Seller, SignedInvoice, TaxCategory,
    TaxSubtotal, VatId,
};
use crate::ErrorKind;
use crate::config::{ConformanceProfile, EmptyElementStyle};

use base64ct::{Base64, Encoding};
use helpers::{
    FixedPrecision, currency_amount, id_with_scheme, id_with_scheme_with_agency,
    quantity_with_unit,
};
use quick_xml::Reader;
use quick_xml::events::Event;
use quick_xml::se::{QuoteLevel, SeError, Serializer as QuickXmlSerializer};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use signature::{CacSignatureXml, UblExtensionsXml};
use thiserror::Error;
use tracing::debug;

pub(crate) mod constants;
mod signature;
pub(crate) use signature::signed_properties_xml;

/// XML serialization error.
#[derive(Debug, Error)]
pub enum InvoiceXmlError {
    #[error("failed to serialize invoice to XML: {source}")]
    Serialize {
        #[from]
        source: SeError,
    },
    #[error("cannot render invoice: missing {0}")]
    MissingField(&'static str),
    #[error("failed to re-escape rendered XML: {source}")]
    Escape {
        #[from]
        source: quick_xml::Error,
    },
}

impl InvoiceXmlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvoiceXmlError::Serialize { .. } => ErrorKind::Serialization,
            InvoiceXmlError::MissingField(_) => ErrorKind::MissingField,
            InvoiceXmlError::Escape { .. } => ErrorKind::Serialization,
        }
    }
}

/// XML formatting options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum XmlFormat {
    #[default]
    Compact,
    Pretty {
        indent_char: char,
        indent_size: usize,
    },
}

/// The two renderings of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Hash input: compact, without signature or QR, no XML declaration,
    /// empty elements written as start/end pairs.
    Canonical,
    /// Full document including any attached signature and QR code.
    Document(XmlFormat),
}

mod helpers {
    use serde::ser::{Serialize, SerializeStruct, Serializer};
    use std::fmt::{self, Display, Formatter};

    pub(super) struct FixedPrecision {
        value: f64,
        precision: usize,
    }

    impl FixedPrecision {
        pub(super) fn new(value: f64, precision: usize) -> Self {
            Self { value, precision }
        }
    }

    impl Display for FixedPrecision {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.write_str(&crate::invoice::format_fixed(self.value, self.precision))
        }
    }

    impl Serialize for FixedPrecision {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.collect_str(self)
        }
    }

    struct CurrencyAmountSer<'a> {
        tag: &'static str,
        currency: &'a str,
        value: f64,
    }

    pub(super) fn currency_amount<'a>(
        tag: &'static str,
        currency: &'a str,
        value: f64,
    ) -> impl Serialize + 'a {
        CurrencyAmountSer {
            tag,
            currency,
            value,
        }
    }

    impl<'a> Serialize for CurrencyAmountSer<'a> {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut st = s.serialize_struct(self.tag, 2)?;
            st.serialize_field("@currencyID", self.currency)?;
            st.serialize_field("$text", &FixedPrecision::new(self.value, 2))?;
            st.end()
        }
    }

    struct IdWithSchemeSer<'a> {
        tag: &'static str,
        scheme_id: &'a str,
        scheme_agency_id: Option<&'a str>,
        value: &'a str,
    }

    pub(super) fn id_with_scheme<'a>(
        tag: &'static str,
        scheme_id: &'a str,
        value: &'a str,
    ) -> impl Serialize + 'a {
        IdWithSchemeSer {
            tag,
            scheme_id,
            scheme_agency_id: None,
            value,
        }
    }

    pub(super) fn id_with_scheme_with_agency<'a>(
        tag: &'static str,
        scheme_id: &'a str,
        scheme_agency_id: &'a str,
        value: &'a str,
    ) -> impl Serialize + 'a {
        IdWithSchemeSer {
            tag,
            scheme_id,
            scheme_agency_id: Some(scheme_agency_id),
            value,
        }
    }

    impl<'a> Serialize for IdWithSchemeSer<'a> {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            // canonical attribute order: schemeAgencyID sorts before schemeID
            let mut st = s.serialize_struct(self.tag, 3)?;
            if let Some(agency) = self.scheme_agency_id {
                st.serialize_field("@schemeAgencyID", agency)?;
            }
            st.serialize_field("@schemeID", self.scheme_id)?;
            st.serialize_field("$text", self.value)?;
            st.end()
        }
    }

    struct QuantityWithUnitSer<'a> {
        tag: &'static str,
        value: f64,
        unit_code: &'a str,
    }

    pub(super) fn quantity_with_unit<'a>(
        tag: &'static str,
        value: f64,
        unit_code: &'a str,
    ) -> impl Serialize + 'a {
        QuantityWithUnitSer {
            tag,
            value,
            unit_code,
        }
    }

    impl<'a> Serialize for QuantityWithUnitSer<'a> {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut st = s.serialize_struct(self.tag, 2)?;
            st.serialize_field("@unitCode", self.unit_code)?;
            st.serialize_field("$text", &FixedPrecision::new(self.value, 6))?;
            st.end()
        }
    }

    struct AlgorithmSer {
        tag: &'static str,
        uri: &'static str,
    }

    /// Empty element carrying only an `Algorithm` attribute.
    pub(super) fn algorithm(tag: &'static str, uri: &'static str) -> impl Serialize {
        AlgorithmSer { tag, uri }
    }

    impl Serialize for AlgorithmSer {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut st = s.serialize_struct(self.tag, 1)?;
            st.serialize_field("@Algorithm", self.uri)?;
            st.end()
        }
    }
}

/// Shared rendering inputs for nested elements.
#[derive(Clone, Copy)]
struct RenderContext<'a> {
    currency: &'a str,
    scheme_ids: bool,
}

struct InvoiceXml<'a> {
    data: &'a InvoiceData,
    ctx: RenderContext<'a>,
    signature: Option<UblExtensionsXml<'a>>,
    qr_code: Option<&'a str>,
}

struct InvoiceTypeView<'a>(&'a InvoiceData);

impl<'a> Serialize for InvoiceTypeView<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let invoice_type = self.0.invoice_type();
        let transaction_code = self.0.flags().transaction_code(invoice_type.sub_type());

        let mut st = s.serialize_struct("cbc:InvoiceTypeCode", 2)?;
        st.serialize_field("@name", &transaction_code)?;
        st.serialize_field("$text", invoice_type.type_code())?;
        st.end()
    }
}

struct TaxSchemeXml {
    scheme_ids: bool,
}

impl Serialize for TaxSchemeXml {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:TaxScheme", 0)?;
        if self.scheme_ids {
            st.serialize_field(
                "cbc:ID",
                &id_with_scheme_with_agency("cbc:ID", "UN/ECE 5153", "6", "VAT"),
            )?;
        } else {
            st.serialize_field("cbc:ID", "VAT")?;
        }
        st.end()
    }
}

struct VatSchemeXml<'a>(&'a VatId);

impl<'a> Serialize for VatSchemeXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let vat = self.0;
        let mut st = s.serialize_struct("cac:PartyTaxScheme", 0)?;
        st.serialize_field("cbc:CompanyID", vat.as_str())?;
        st.serialize_field("cac:TaxScheme", &TaxSchemeXml { scheme_ids: false })?;
        st.end()
    }
}

struct PartyXml<'a, R: PartyRole>(&'a Party<R>);

struct PartyIdentificationXml<'a>(&'a OtherId);

impl<'a> Serialize for PartyIdentificationXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let other_id = self.0;
        let mut st = s.serialize_struct("cac:PartyIdentification", 0)?;
        if let Some(scheme_id) = other_id.scheme_id() {
            st.serialize_field(
                "cbc:ID",
                &id_with_scheme("cbc:ID", scheme_id, other_id.as_str()),
            )?;
        } else {
            st.serialize_field("cbc:ID", other_id.as_str())?;
        }
        st.end()
    }
}

struct PartyLegalEntityXml<'a>(&'a str);

impl<'a> Serialize for PartyLegalEntityXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:PartyLegalEntity", 0)?;
        st.serialize_field("cbc:RegistrationName", self.0)?;
        st.end()
    }
}

struct AccountingSupplierPartyXml<'a>(&'a Seller);

impl<'a> Serialize for AccountingSupplierPartyXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:AccountingSupplierParty", 0)?;
        st.serialize_field("cac:Party", &PartyXml(self.0))?;
        st.end()
    }
}

struct AccountingCustomerPartyXml<'a>(Option<&'a Buyer>);

impl<'a> Serialize for AccountingCustomerPartyXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:AccountingCustomerParty", 0)?;
        if let Some(party) = self.0 {
            st.serialize_field("cac:Party", &PartyXml(party))?;
        } else {
            st.serialize_field("cac:Party", &EmptyParty)?;
        }
        st.end()
    }
}

struct EmptyParty;

impl Serialize for EmptyParty {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let st = s.serialize_struct("cac:Party", 0)?;
        st.end()
    }
}

impl<'a, R: PartyRole> Serialize for PartyXml<'a, R> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let p = self.0;

        let mut st = s.serialize_struct("cac:Party", 0)?;
        if let Some(other_id) = p.other_id() {
            st.serialize_field("cac:PartyIdentification", &PartyIdentificationXml(other_id))?;
        }
        st.serialize_field("cac:PostalAddress", &AddressXml(p.address()))?;
        if let Some(vat) = p.vat_id() {
            st.serialize_field("cac:PartyTaxScheme", &VatSchemeXml(vat))?;
        }
        st.serialize_field("cac:PartyLegalEntity", &PartyLegalEntityXml(p.name()))?;
        st.end()
    }
}

struct AddressXml<'a>(&'a Address);

impl<'a> Serialize for AddressXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let a = self.0;
        let mut st = s.serialize_struct("cac:PostalAddress", 0)?;

        st.serialize_field("cbc:StreetName", a.street())?;
        if let Some(additional) = a.additional_street() {
            st.serialize_field("cbc:AdditionalStreetName", additional)?;
        }
        st.serialize_field("cbc:BuildingNumber", a.building_number())?;
        if let Some(plot) = a.additional_number() {
            st.serialize_field("cbc:PlotIdentification", plot)?;
        }
        if let Some(district) = a.district() {
            st.serialize_field("cbc:CitySubdivisionName", district)?;
        }
        st.serialize_field("cbc:CityName", a.city())?;
        st.serialize_field("cbc:PostalZone", a.postal_code())?;
        if let Some(subdivision) = a.subdivision() {
            st.serialize_field("cbc:CountrySubentity", subdivision)?;
        }
        st.serialize_field("cac:Country", &CountryXml(a.country_code().alpha2()))?;

        st.end()
    }
}

struct CountryXml<'a>(&'a str);

impl<'a> Serialize for CountryXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:Country", 0)?;
        st.serialize_field("cbc:IdentificationCode", self.0)?;
        st.end()
    }
}

struct NoteXml<'a>(&'a InvoiceNote);

impl<'a> Serialize for NoteXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let note = self.0;
        let mut st = s.serialize_struct("cbc:Note", 2)?;
        st.serialize_field("@languageID", note.language())?;
        st.serialize_field("$text", note.text())?;
        st.end()
    }
}

struct EmbeddedDocumentXml<'a> {
    mime_code: &'a str,
    data: &'a str,
}

impl<'a> Serialize for EmbeddedDocumentXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cbc:EmbeddedDocumentBinaryObject", 2)?;
        st.serialize_field("@mimeCode", self.mime_code)?;
        st.serialize_field("$text", self.data)?;
        st.end()
    }
}

enum AdditionalDocumentReferenceXml<'a> {
    InvoiceCounter(&'a str),
    PreviousInvoiceHash(&'a str),
    QrCode(&'a str),
}

impl<'a> Serialize for AdditionalDocumentReferenceXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:AdditionalDocumentReference", 0)?;
        match self {
            AdditionalDocumentReferenceXml::InvoiceCounter(value) => {
                st.serialize_field("cbc:ID", "ICV")?;
                st.serialize_field("cbc:UUID", value)?;
            }
            AdditionalDocumentReferenceXml::PreviousInvoiceHash(value) => {
                st.serialize_field("cbc:ID", "PIH")?;
                st.serialize_field("cac:Attachment", &AttachmentXml(value))?;
            }
            AdditionalDocumentReferenceXml::QrCode(value) => {
                st.serialize_field("cbc:ID", "QR")?;
                st.serialize_field("cac:Attachment", &AttachmentXml(value))?;
            }
        }
        st.end()
    }
}

struct AttachmentXml<'a>(&'a str);

impl<'a> Serialize for AttachmentXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:Attachment", 0)?;
        st.serialize_field(
            "cbc:EmbeddedDocumentBinaryObject",
            &EmbeddedDocumentXml {
                mime_code: "text/plain",
                data: self.0,
            },
        )?;
        st.end()
    }
}

struct BillingReferenceXml<'a>(&'a OriginalInvoiceRef);

impl<'a> Serialize for BillingReferenceXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:BillingReference", 0)?;
        st.serialize_field(
            "cac:InvoiceDocumentReference",
            &InvoiceDocumentReferenceXml(self.0),
        )?;
        st.end()
    }
}

struct InvoiceDocumentReferenceXml<'a>(&'a OriginalInvoiceRef);

impl<'a> Serialize for InvoiceDocumentReferenceXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:InvoiceDocumentReference", 0)?;
        st.serialize_field("cbc:ID", self.0.id())?;
        if let Some(uuid) = self.0.uuid() {
            st.serialize_field("cbc:UUID", uuid)?;
        }
        if let Some(issue_date) = self.0.issue_date() {
            st.serialize_field("cbc:IssueDate", &issue_date.to_string())?;
        }
        st.end()
    }
}

struct DeliveryXml<'a>(&'a Delivery);

impl<'a> Serialize for DeliveryXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:Delivery", 0)?;
        st.serialize_field(
            "cbc:ActualDeliveryDate",
            &self.0.actual_delivery_date().to_string(),
        )?;
        if let Some(latest) = self.0.latest_delivery_date() {
            st.serialize_field("cbc:LatestDeliveryDate", &latest.to_string())?;
        }
        st.end()
    }
}

struct PaymentMeansXml<'a> {
    code: &'a str,
    instruction_note: Option<&'a str>,
}

impl<'a> Serialize for PaymentMeansXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:PaymentMeans", 0)?;
        st.serialize_field("cbc:PaymentMeansCode", self.code)?;
        if let Some(note) = self.instruction_note {
            st.serialize_field("cbc:InstructionNote", note)?;
        }
        st.end()
    }
}

struct TaxCategoryXml<'a> {
    category: &'a TaxCategory,
    scheme_ids: bool,
    with_exemption: bool,
}

impl<'a> Serialize for TaxCategoryXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let category = self.category;
        let code = category.category().code();

        let mut st = s.serialize_struct("cac:TaxCategory", 0)?;
        if self.scheme_ids {
            st.serialize_field(
                "cbc:ID",
                &id_with_scheme_with_agency("cbc:ID", "UN/ECE 5305", "6", code),
            )?;
        } else {
            st.serialize_field("cbc:ID", code)?;
        }
        st.serialize_field("cbc:Percent", &FixedPrecision::new(category.percent(), 2))?;
        if self.with_exemption {
            if let Some(reason_code) = category.exemption_reason_code() {
                st.serialize_field("cbc:TaxExemptionReasonCode", reason_code)?;
            }
            if let Some(reason) = category.exemption_reason() {
                st.serialize_field("cbc:TaxExemptionReason", reason)?;
            }
        }
        st.serialize_field(
            "cac:TaxScheme",
            &TaxSchemeXml {
                scheme_ids: self.scheme_ids,
            },
        )?;
        st.end()
    }
}

struct AllowanceChargeXml<'a>(&'a AllowanceCharge, RenderContext<'a>);

impl<'a> Serialize for AllowanceChargeXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (charge, ctx) = (self.0, self.1);
        let mut st = s.serialize_struct("cac:AllowanceCharge", 0)?;
        st.serialize_field("cbc:ChargeIndicator", &charge.is_charge())?;
        st.serialize_field("cbc:AllowanceChargeReason", charge.reason())?;
        st.serialize_field(
            "cbc:Amount",
            &currency_amount("cbc:Amount", ctx.currency, charge.amount()),
        )?;
        st.serialize_field(
            "cac:TaxCategory",
            &TaxCategoryXml {
                category: charge.tax_category(),
                scheme_ids: ctx.scheme_ids,
                with_exemption: false,
            },
        )?;
        st.end()
    }
}

struct TaxTotalXml<'a> {
    amount: f64,
    subtotals: &'a [TaxSubtotal],
    ctx: RenderContext<'a>,
}

impl<'a> Serialize for TaxTotalXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:TaxTotal", 0)?;
        st.serialize_field(
            "cbc:TaxAmount",
            &currency_amount("cbc:TaxAmount", self.ctx.currency, self.amount),
        )?;
        for subtotal in self.subtotals {
            st.serialize_field("cac:TaxSubtotal", &TaxSubtotalXml(subtotal, self.ctx))?;
        }
        st.end()
    }
}

struct TaxSubtotalXml<'a>(&'a TaxSubtotal, RenderContext<'a>);

impl<'a> Serialize for TaxSubtotalXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (subtotal, ctx) = (self.0, self.1);
        let mut st = s.serialize_struct("cac:TaxSubtotal", 0)?;
        st.serialize_field(
            "cbc:TaxableAmount",
            &currency_amount("cbc:TaxableAmount", ctx.currency, subtotal.taxable_amount()),
        )?;
        st.serialize_field(
            "cbc:TaxAmount",
            &currency_amount("cbc:TaxAmount", ctx.currency, subtotal.tax_amount()),
        )?;
        st.serialize_field(
            "cac:TaxCategory",
            &TaxCategoryXml {
                category: subtotal.tax_category(),
                scheme_ids: ctx.scheme_ids,
                with_exemption: true,
            },
        )?;
        st.end()
    }
}

struct LegalMonetaryTotalXml<'a>(&'a InvoiceTotals, RenderContext<'a>);

impl<'a> Serialize for LegalMonetaryTotalXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (totals, currency) = (self.0, self.1.currency);
        let mut st = s.serialize_struct("cac:LegalMonetaryTotal", 0)?;
        st.serialize_field(
            "cbc:LineExtensionAmount",
            &currency_amount("cbc:LineExtensionAmount", currency, totals.line_extension_amount),
        )?;
        st.serialize_field(
            "cbc:TaxExclusiveAmount",
            &currency_amount("cbc:TaxExclusiveAmount", currency, totals.tax_exclusive_amount),
        )?;
        st.serialize_field(
            "cbc:TaxInclusiveAmount",
            &currency_amount("cbc:TaxInclusiveAmount", currency, totals.tax_inclusive_amount),
        )?;
        st.serialize_field(
            "cbc:AllowanceTotalAmount",
            &currency_amount(
                "cbc:AllowanceTotalAmount",
                currency,
                totals.allowance_total_amount,
            ),
        )?;
        if totals.charge_total_amount != 0.0 {
            st.serialize_field(
                "cbc:ChargeTotalAmount",
                &currency_amount("cbc:ChargeTotalAmount", currency, totals.charge_total_amount),
            )?;
        }
        st.serialize_field(
            "cbc:PrepaidAmount",
            &currency_amount("cbc:PrepaidAmount", currency, totals.prepaid_amount),
        )?;
        st.serialize_field(
            "cbc:PayableAmount",
            &currency_amount("cbc:PayableAmount", currency, totals.payable_amount),
        )?;
        st.end()
    }
}

struct InvoiceLineTaxTotalXml<'a>(&'a LineItem, &'a str);

impl<'a> Serialize for InvoiceLineTaxTotalXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (li, currency) = (self.0, self.1);
        let mut st = s.serialize_struct("cac:TaxTotal", 0)?;
        st.serialize_field(
            "cbc:TaxAmount",
            &currency_amount("cbc:TaxAmount", currency, li.tax_amount()),
        )?;
        st.serialize_field(
            "cbc:RoundingAmount",
            &currency_amount("cbc:RoundingAmount", currency, li.rounding_amount()),
        )?;
        st.end()
    }
}

struct InvoiceItemXml<'a>(&'a LineItem);

impl<'a> Serialize for InvoiceItemXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let li = self.0;
        let mut st = s.serialize_struct("cac:Item", 0)?;
        st.serialize_field("cbc:Name", li.name())?;
        // item-level categories never carry scheme attributes
        st.serialize_field(
            "cac:ClassifiedTaxCategory",
            &TaxCategoryXml {
                category: li.tax_category(),
                scheme_ids: false,
                with_exemption: false,
            },
        )?;
        st.end()
    }
}

struct PriceXml<'a>(f64, &'a str);

impl<'a> Serialize for PriceXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:Price", 0)?;
        st.serialize_field(
            "cbc:PriceAmount",
            &currency_amount("cbc:PriceAmount", self.1, self.0),
        )?;
        st.end()
    }
}

struct InvoiceLineXml<'a>(usize, &'a LineItem, &'a str);

impl<'a> Serialize for InvoiceLineXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (idx, li, currency) = (self.0, self.1, self.2);

        let mut st = s.serialize_struct("cac:InvoiceLine", 0)?;
        st.serialize_field("cbc:ID", &idx.to_string())?;
        st.serialize_field(
            "cbc:InvoicedQuantity",
            &quantity_with_unit("cbc:InvoicedQuantity", li.quantity(), li.unit_code()),
        )?;
        st.serialize_field(
            "cbc:LineExtensionAmount",
            &currency_amount("cbc:LineExtensionAmount", currency, li.line_extension_amount()),
        )?;
        st.serialize_field("cac:TaxTotal", &InvoiceLineTaxTotalXml(li, currency))?;
        st.serialize_field("cac:Item", &InvoiceItemXml(li))?;
        st.serialize_field("cac:Price", &PriceXml(li.unit_price(), currency))?;
        st.end()
    }
}

impl<'a> Serialize for InvoiceXml<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.data;
        let ctx = self.ctx;
        let totals = data.totals();

        let mut root = serializer.serialize_struct("Invoice", 0)?;

        // ---- namespaces (attributes) ----
        root.serialize_field("@xmlns", constants::INVOICE_NS)?;
        root.serialize_field("@xmlns:cac", constants::CAC_NS)?;
        root.serialize_field("@xmlns:cbc", constants::CBC_NS)?;
        root.serialize_field("@xmlns:ext", constants::EXT_NS)?;

        if let Some(extensions) = &self.signature {
            root.serialize_field("ext:UBLExtensions", extensions)?;
        }

        // ---- identifiers & issue info ----
        root.serialize_field("cbc:ProfileID", constants::PROFILE_ID)?;
        root.serialize_field("cbc:ID", data.id())?;
        root.serialize_field("cbc:UUID", data.uuid())?;
        root.serialize_field("cbc:IssueDate", &data.issue_date_string())?;
        root.serialize_field("cbc:IssueTime", &data.issue_time_string())?;

        // ---- invoice type ----
        root.serialize_field("cbc:InvoiceTypeCode", &InvoiceTypeView(data))?;
        if let Some(note) = data.note() {
            root.serialize_field("cbc:Note", &NoteXml(note))?;
        }
        root.serialize_field("cbc:DocumentCurrencyCode", ctx.currency)?;
        root.serialize_field("cbc:TaxCurrencyCode", ctx.currency)?;

        // ---- credit/debit references ----
        if let Some(original) = data.invoice_type().original_invoice() {
            root.serialize_field("cac:BillingReference", &BillingReferenceXml(original))?;
        }

        // ---- supporting references ----
        let counter = data.invoice_counter().to_string();
        root.serialize_field(
            "cac:AdditionalDocumentReference",
            &AdditionalDocumentReferenceXml::InvoiceCounter(&counter),
        )?;
        root.serialize_field(
            "cac:AdditionalDocumentReference",
            &AdditionalDocumentReferenceXml::PreviousInvoiceHash(data.previous_invoice_hash()),
        )?;
        if let Some(qr) = self.qr_code {
            root.serialize_field(
                "cac:AdditionalDocumentReference",
                &AdditionalDocumentReferenceXml::QrCode(qr),
            )?;
        }
        if self.signature.is_some() {
            root.serialize_field("cac:Signature", &CacSignatureXml)?;
        }

        // ---- parties ----
        root.serialize_field(
            "cac:AccountingSupplierParty",
            &AccountingSupplierPartyXml(data.seller()),
        )?;
        root.serialize_field(
            "cac:AccountingCustomerParty",
            &AccountingCustomerPartyXml(data.buyer()),
        )?;
        if let Some(delivery) = data.delivery() {
            root.serialize_field("cac:Delivery", &DeliveryXml(delivery))?;
        }

        // ---- payment ----
        root.serialize_field(
            "cac:PaymentMeans",
            &PaymentMeansXml {
                code: data.payment_means_code(),
                instruction_note: data.invoice_type().reason(),
            },
        )?;

        // ---- allowance / charges ----
        for charge in data.allowance_charges() {
            root.serialize_field("cac:AllowanceCharge", &AllowanceChargeXml(charge, ctx))?;
        }

        // ---- tax totals ----
        root.serialize_field(
            "cac:TaxTotal",
            &TaxTotalXml {
                amount: totals.tax_amount,
                subtotals: &[],
                ctx,
            },
        )?;
        root.serialize_field(
            "cac:TaxTotal",
            &TaxTotalXml {
                amount: totals.tax_amount,
                subtotals: &totals.tax_subtotals,
                ctx,
            },
        )?;

        root.serialize_field("cac:LegalMonetaryTotal", &LegalMonetaryTotalXml(totals, ctx))?;

        // ---- lines ----
        for (i, line) in data.line_items().iter().enumerate() {
            root.serialize_field("cac:InvoiceLine", &InvoiceLineXml(i + 1, line, ctx.currency))?;
        }

        root.end()
    }
}

/// Serialize invoices to XML.
///
/// # Examples
/// ```rust,no_run
/// use zatca_ubl::invoice::Invoice;
/// use zatca_ubl::invoice::xml::ToXml;
///
/// let invoice: Invoice = unimplemented!();
/// let xml = invoice.to_xml_pretty()?;
/// # let _ = xml;
/// # Ok::<(), zatca_ubl::invoice::xml::InvoiceXmlError>(())
/// ```
pub trait ToXml {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, InvoiceXmlError>;

    fn to_xml(&self) -> Result<String, InvoiceXmlError> {
        self.to_xml_with_format(XmlFormat::Compact)
    }

    fn to_xml_pretty(&self) -> Result<String, InvoiceXmlError> {
        self.to_xml_with_format(XmlFormat::Pretty {
            indent_char: ' ',
            indent_size: 2,
        })
    }
}

impl ToXml for Invoice {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, InvoiceXmlError> {
        render(self, RenderMode::Document(format), &ConformanceProfile::default())
    }
}

impl ToXml for SignedInvoice {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, InvoiceXmlError> {
        render(self.invoice(), RenderMode::Document(format), self.profile())
    }
}

/// Render an invoice.
///
/// Pure and deterministic: the same invoice, mode and profile always yield the same bytes.
/// A signed document embeds the base64 canonical rendering when the profile asks for it.
///
/// # Errors
/// Returns [`InvoiceXmlError::MissingField`] when a required header value is empty and
/// [`InvoiceXmlError::Serialize`] when the writer fails.
pub fn render(
    invoice: &Invoice,
    mode: RenderMode,
    profile: &ConformanceProfile,
) -> Result<String, InvoiceXmlError> {
    let data = invoice.data();
    if data.id().trim().is_empty() {
        return Err(InvoiceXmlError::MissingField("invoice id"));
    }
    if data.uuid().trim().is_empty() {
        return Err(InvoiceXmlError::MissingField("invoice uuid"));
    }
    if data.line_items().is_empty() {
        return Err(InvoiceXmlError::MissingField("invoice lines"));
    }

    let ctx = RenderContext {
        currency: data.currency().code(),
        scheme_ids: profile.tax_category_scheme_ids(),
    };

    let mut buffer = String::with_capacity(4096);
    match mode {
        RenderMode::Canonical => {
            let view = InvoiceXml {
                data,
                ctx,
                signature: None,
                qr_code: None,
            };
            let mut raw = String::with_capacity(4096);
            let mut serializer = QuickXmlSerializer::new(&mut raw);
            serializer.set_quote_level(QuoteLevel::Partial);
            serializer.expand_empty_elements(true);
            view.serialize(serializer)?;
            buffer.push_str(&escape_canonical(&raw)?);
        }
        RenderMode::Document(format) => {
            let embedded = match invoice.signature() {
                Some(_) if profile.embed_unsigned_document() => {
                    let canonical = render(invoice, RenderMode::Canonical, profile)?;
                    Some(Base64::encode_string(canonical.as_bytes()))
                }
                _ => None,
            };
            let view = InvoiceXml {
                data,
                ctx,
                signature: invoice.signature().map(|signature| UblExtensionsXml {
                    signature,
                    method: profile.signature_method(),
                    embedded: embedded.as_deref(),
                }),
                qr_code: invoice.qr_code(),
            };

            buffer.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
            buffer.push('\n');

            let mut raw = String::with_capacity(8192);
            let mut serializer = QuickXmlSerializer::new(&mut raw);
            serializer.set_quote_level(QuoteLevel::Partial);
            serializer.expand_empty_elements(profile.empty_elements() == EmptyElementStyle::Expanded);
            if let XmlFormat::Pretty {
                indent_char,
                indent_size,
            } = format
            {
                serializer.indent(indent_char, indent_size);
            }
            view.serialize(serializer)?;
            buffer.push_str(&escape_canonical(&raw)?);
        }
    }

    debug!(
        invoice_id = data.id(),
        ?mode,
        signed = invoice.signature().is_some(),
        bytes = buffer.len(),
        "rendered invoice xml"
    );
    Ok(buffer)
}

/// Rewrite serializer output with canonical XML escaping.
///
/// Text escapes `&`, `<`, `>` and CR. Attribute values escape `&`, `<`, `"`, tab, LF and CR.
/// Markup, attribute order and empty-element style are kept as written. Both render modes
/// go through this so a verifier re-canonicalizing the document gets the hashed bytes.
fn escape_canonical(xml: &str) -> Result<String, InvoiceXmlError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len() + xml.len() / 16);

    loop {
        match reader.read_event().map_err(quick_xml::Error::from)? {
            Event::Start(e) => {
                write_start_tag(&mut out, &e)?;
                out.push('>');
            }
            Event::Empty(e) => {
                write_start_tag(&mut out, &e)?;
                out.push_str("/>");
            }
            Event::End(e) => {
                out.push_str("</");
                out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
                out.push('>');
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(quick_xml::Error::from)?;
                push_escaped(&mut out, &text, false);
            }
            Event::CData(e) => {
                push_escaped(&mut out, &String::from_utf8_lossy(&e), false);
            }
            Event::Eof => break,
            // the serializer writes no comments, declarations or processing instructions
            _ => {}
        }
    }
    Ok(out)
}

fn write_start_tag(
    out: &mut String,
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<(), InvoiceXmlError> {
    out.push('<');
    out.push_str(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
        out.push(' ');
        out.push_str(&String::from_utf8_lossy(attr.key.as_ref()));
        out.push_str("=\"");
        push_escaped(out, &value, true);
        out.push('"');
    }
    Ok(())
}

fn push_escaped(out: &mut String, value: &str, attribute: bool) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '\r' => out.push_str("&#xD;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\t' if attribute => out.push_str("&#x9;"),
            '\n' if attribute => out.push_str("&#xA;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConformanceProfile, EmptyElementStyle};
    use crate::invoice::{
        BuyerRole, InvoiceBuilder, InvoiceFlags, InvoiceSubType, InvoiceType, LineItemFields,
        RequiredInvoiceFields, SellerRole, VatCategory,
    };
    use chrono::NaiveDate;
    use chrono::TimeZone;
    use iso_currency::Currency;
    use isocountry::CountryCode;

    fn seller() -> Seller {
        Party::<SellerRole>::new(
            "Acme Inc".into(),
            Address::new(
                CountryCode::SAU,
                "Riyadh",
                "King Fahd",
                None,
                "1234",
                Some("5678".into()),
                "12222",
                None,
                Some("Al Olaya".into()),
            ),
            "301121971500003",
            None,
        )
        .expect("valid seller")
    }

    fn line_item() -> LineItem {
        LineItem::new(LineItemFields {
            name: "Item".into(),
            quantity: 1.0,
            unit_code: "PCE".into(),
            unit_price: 100.0,
            tax_category: TaxCategory::standard(15.0),
        })
    }

    fn builder(invoice_type: InvoiceType) -> InvoiceBuilder {
        builder_with_id(invoice_type, "INV-1")
    }

    fn builder_with_id(invoice_type: InvoiceType, id: &str) -> InvoiceBuilder {
        builder_with(invoice_type, id, seller(), vec![line_item()])
    }

    fn builder_with(
        invoice_type: InvoiceType,
        id: &str,
        seller: Seller,
        lines: Vec<LineItem>,
    ) -> InvoiceBuilder {
        let totals = InvoiceTotals::from_line_items(&lines, &[]);
        InvoiceBuilder::new(RequiredInvoiceFields {
            invoice_type,
            id: id.into(),
            uuid: "uuid-123".into(),
            issue_datetime: chrono::Utc
                .with_ymd_and_hms(2024, 1, 1, 12, 30, 0)
                .single()
                .expect("valid datetime"),
            currency: Currency::SAR,
            previous_invoice_hash: "NWZlY2ViNjZmZmM4NmYzOGQ5NTI3ODZjNmQ2OTZjNzljMmRiYzIzOWRkNGU5MWI0NjcyOWQ3M2EyN2ZiNTdlOQ==".into(),
            invoice_counter: 10,
            seller,
            line_items: lines,
            totals,
            payment_means_code: "10".into(),
        })
    }

    fn simplified() -> Invoice {
        builder(InvoiceType::Tax(InvoiceSubType::Simplified))
            .build()
            .expect("build invoice")
    }

    fn position(xml: &str, needle: &str) -> usize {
        xml.find(needle)
            .unwrap_or_else(|| panic!("missing {needle} in {xml}"))
    }

    #[test]
    fn compact_rendering_is_deterministic() {
        let invoice = simplified();
        let first = invoice.to_xml().expect("xml");
        let second = invoice.to_xml().expect("xml");
        assert_eq!(first, second);
        assert!(first.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Invoice "));
        assert!(!first.contains("\n  "));
    }

    #[test]
    fn canonical_form_has_no_declaration_and_expanded_empty_elements() {
        let invoice = simplified();
        let canonical = invoice.canonical_xml().expect("canonical");
        assert!(canonical.starts_with("<Invoice xmlns=\""));
        assert!(canonical.contains("<cac:Party></cac:Party>"));
        assert!(!canonical.contains("ext:UBLExtensions"));
        assert!(!canonical.contains("cac:Signature"));

        let document = invoice.to_xml().expect("xml");
        assert!(document.contains("<cac:Party/>"));
    }

    #[test]
    fn header_elements_follow_schema_order() {
        let xml = simplified().to_xml().expect("xml");
        let order = [
            "<cbc:ProfileID>reporting:1.0</cbc:ProfileID>",
            "<cbc:ID>INV-1</cbc:ID>",
            "<cbc:UUID>uuid-123</cbc:UUID>",
            "<cbc:IssueDate>2024-01-01</cbc:IssueDate>",
            "<cbc:IssueTime>12:30:00</cbc:IssueTime>",
            "<cbc:InvoiceTypeCode name=\"0200000\">388</cbc:InvoiceTypeCode>",
            "<cbc:DocumentCurrencyCode>SAR</cbc:DocumentCurrencyCode>",
            "<cbc:TaxCurrencyCode>SAR</cbc:TaxCurrencyCode>",
            "<cbc:ID>ICV</cbc:ID><cbc:UUID>10</cbc:UUID>",
            "<cbc:ID>PIH</cbc:ID>",
            "<cac:AccountingSupplierParty>",
            "<cac:AccountingCustomerParty>",
            "<cac:PaymentMeans><cbc:PaymentMeansCode>10</cbc:PaymentMeansCode></cac:PaymentMeans>",
            "<cac:TaxTotal>",
            "<cac:LegalMonetaryTotal>",
            "<cac:InvoiceLine>",
        ];
        let mut last = 0;
        for needle in order {
            let at = position(&xml, needle);
            assert!(at >= last, "{needle} out of order");
            last = at;
        }
    }

    #[test]
    fn address_uses_schema_field_order() {
        let xml = simplified().to_xml().expect("xml");
        assert!(xml.contains(
            "<cac:PostalAddress><cbc:StreetName>King Fahd</cbc:StreetName>\
             <cbc:BuildingNumber>1234</cbc:BuildingNumber>\
             <cbc:PlotIdentification>5678</cbc:PlotIdentification>\
             <cbc:CitySubdivisionName>Al Olaya</cbc:CitySubdivisionName>\
             <cbc:CityName>Riyadh</cbc:CityName><cbc:PostalZone>12222</cbc:PostalZone>\
             <cac:Country><cbc:IdentificationCode>SA</cbc:IdentificationCode></cac:Country>\
             </cac:PostalAddress>"
        ));
    }

    #[test]
    fn numbers_use_fixed_precision() {
        let xml = simplified().to_xml().expect("xml");
        assert!(xml.contains("<cbc:InvoicedQuantity unitCode=\"PCE\">1.000000</cbc:InvoicedQuantity>"));
        assert!(xml.contains("<cbc:LineExtensionAmount currencyID=\"SAR\">100.00</cbc:LineExtensionAmount>"));
        assert!(xml.contains("<cbc:RoundingAmount currencyID=\"SAR\">115.00</cbc:RoundingAmount>"));
        assert!(xml.contains("<cbc:Percent>15.00</cbc:Percent>"));
        assert!(xml.contains("<cbc:PayableAmount currencyID=\"SAR\">115.00</cbc:PayableAmount>"));
        assert!(!xml.contains("cbc:ChargeTotalAmount"));
    }

    #[test]
    fn tax_category_scheme_ids_follow_profile() {
        let invoice = simplified();
        let with_ids = invoice
            .generate_xml_with_profile(XmlFormat::Compact, &ConformanceProfile::default())
            .expect("xml");
        assert!(with_ids.contains(
            "<cbc:ID schemeAgencyID=\"6\" schemeID=\"UN/ECE 5305\">S</cbc:ID>"
        ));
        assert!(with_ids.contains(
            "<cbc:ID schemeAgencyID=\"6\" schemeID=\"UN/ECE 5153\">VAT</cbc:ID>"
        ));
        // item level stays plain
        assert!(with_ids.contains("<cac:ClassifiedTaxCategory><cbc:ID>S</cbc:ID>"));

        let plain = invoice
            .generate_xml_with_profile(
                XmlFormat::Compact,
                &ConformanceProfile::default().with_tax_category_scheme_ids(false),
            )
            .expect("xml");
        assert!(!plain.contains("UN/ECE 5305"));
    }

    #[test]
    fn expanded_empty_elements_profile() {
        let profile = ConformanceProfile::default().with_empty_elements(EmptyElementStyle::Expanded);
        let xml = simplified()
            .generate_xml_with_profile(XmlFormat::Compact, &profile)
            .expect("xml");
        assert!(xml.contains("<cac:Party></cac:Party>"));
    }

    #[test]
    fn credit_note_renders_reference_and_reason() {
        let invoice = builder(InvoiceType::CreditNote(
            InvoiceSubType::Standard,
            OriginalInvoiceRef::new("SME00002"),
            "Returned goods".into(),
        ))
        .flags(InvoiceFlags::EXPORT)
        .build()
        .expect("build");
        let xml = invoice.to_xml().expect("xml");
        assert!(xml.contains("<cbc:InvoiceTypeCode name=\"0100100\">381</cbc:InvoiceTypeCode>"));
        assert!(xml.contains(
            "<cac:BillingReference><cac:InvoiceDocumentReference><cbc:ID>SME00002</cbc:ID>"
        ));
        assert!(xml.contains("<cbc:InstructionNote>Returned goods</cbc:InstructionNote>"));
    }

    #[test]
    fn allowance_charges_render_in_order() {
        let category = TaxCategory::new(VatCategory::Standard, 15.0);
        let invoice = builder(InvoiceType::Tax(InvoiceSubType::Standard))
            .allowance_charge(AllowanceCharge::allowance("discount", 2.0, category.clone()))
            .allowance_charge(AllowanceCharge::charge("freight", 5.0, category))
            .build()
            .expect("build");
        let xml = invoice.to_xml().expect("xml");
        let discount = position(&xml, "<cbc:ChargeIndicator>false</cbc:ChargeIndicator>");
        let freight = position(&xml, "<cbc:ChargeIndicator>true</cbc:ChargeIndicator>");
        assert!(discount < freight);
        assert!(freight < position(&xml, "<cac:TaxTotal>"));
    }

    #[test]
    fn pretty_rendering_is_cosmetic() {
        let invoice = simplified();
        let pretty = invoice.to_xml_pretty().expect("pretty");
        assert!(pretty.contains("\n  <cbc:ProfileID>"));
        let compact = invoice.to_xml().expect("compact");
        assert_ne!(pretty, compact);
    }

    #[test]
    fn empty_identifier_is_missing_field() {
        let invoice = builder_with_id(InvoiceType::Tax(InvoiceSubType::Simplified), "  ")
            .build()
            .expect("build");
        let err = invoice.to_xml().unwrap_err();
        assert!(matches!(err, InvoiceXmlError::MissingField("invoice id")));
        assert_eq!(err.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn canonical_escaping_of_text_and_attributes() {
        let quoted_seller = Party::<SellerRole>::new(
            "Acme's \"Trading\" <KSA> & Co\r\nBranch".into(),
            seller().address().clone(),
            "301121971500003",
            None,
        )
        .expect("valid seller");
        let line = LineItem::new(LineItemFields {
            name: "Cable > 2m".into(),
            quantity: 1.0,
            unit_code: "P\"C>E\t".into(),
            unit_price: 10.0,
            tax_category: TaxCategory::standard(15.0),
        });
        let invoice = builder_with(
            InvoiceType::Tax(InvoiceSubType::Simplified),
            "INV-1",
            quoted_seller,
            vec![line],
        )
        .build()
        .expect("build");

        let canonical = invoice.canonical_xml().expect("canonical");
        let name = "<cbc:RegistrationName>Acme's \"Trading\" &lt;KSA&gt; &amp; Co&#xD;\nBranch</cbc:RegistrationName>";
        let quantity = "<cbc:InvoicedQuantity unitCode=\"P&quot;C>E&#x9;\">1.000000</cbc:InvoicedQuantity>";
        assert!(canonical.contains(name), "{canonical}");
        assert!(canonical.contains(quantity), "{canonical}");
        assert!(canonical.contains("<cbc:Name>Cable &gt; 2m</cbc:Name>"));
        assert!(!canonical.contains('\r'));

        // the document carries the same escapes, so re-canonicalizing it is lossless
        let document = invoice.to_xml().expect("xml");
        assert!(document.contains(name));
        assert!(document.contains(quantity));
    }

    #[test]
    fn standard_invoice_renders_buyer_delivery_note_and_exemption() {
        let buyer = Party::<BuyerRole>::new(
            "Fatoora Samples LTD".into(),
            Address::new(
                CountryCode::SAU,
                "Jeddah",
                "Al Hamra",
                None,
                "4321",
                None,
                "23000",
                None,
                Some("Al Rawdah".into()),
            ),
            Some("300000000000003".into()),
            Some(OtherId::with_scheme("1010010000", "CRN")),
        )
        .expect("valid buyer");
        let exempt = TaxCategory::new(VatCategory::Zero, 0.0)
            .with_exemption("VATEX-SA-32", "Export of goods");
        let line = LineItem::new(LineItemFields {
            name: "Generator".into(),
            quantity: 2.0,
            unit_code: "PCE".into(),
            unit_price: 50.0,
            tax_category: exempt,
        });
        let delivery = Delivery::new(NaiveDate::from_ymd_opt(2024, 1, 2).expect("date"))
            .with_latest_delivery_date(NaiveDate::from_ymd_opt(2024, 1, 9).expect("date"));
        let invoice = builder_with(
            InvoiceType::Tax(InvoiceSubType::Standard),
            "STD-1",
            seller(),
            vec![line],
        )
        .buyer(buyer)
        .delivery(delivery)
        .note(InvoiceNote::new("en", "Export order"))
        .build()
        .expect("build");

        let xml = invoice.canonical_xml().expect("canonical");
        let order = [
            "<cbc:InvoiceTypeCode name=\"0100000\">388</cbc:InvoiceTypeCode>",
            "<cbc:Note languageID=\"en\">Export order</cbc:Note>",
            "<cbc:DocumentCurrencyCode>SAR</cbc:DocumentCurrencyCode>",
            "<cac:AccountingSupplierParty>",
            "<cac:AccountingCustomerParty><cac:Party>\
             <cac:PartyIdentification><cbc:ID schemeID=\"CRN\">1010010000</cbc:ID></cac:PartyIdentification>\
             <cac:PostalAddress><cbc:StreetName>Al Hamra</cbc:StreetName>\
             <cbc:BuildingNumber>4321</cbc:BuildingNumber>\
             <cbc:CitySubdivisionName>Al Rawdah</cbc:CitySubdivisionName>\
             <cbc:CityName>Jeddah</cbc:CityName><cbc:PostalZone>23000</cbc:PostalZone>\
             <cac:Country><cbc:IdentificationCode>SA</cbc:IdentificationCode></cac:Country>\
             </cac:PostalAddress>\
             <cac:PartyTaxScheme><cbc:CompanyID>300000000000003</cbc:CompanyID>\
             <cac:TaxScheme><cbc:ID>VAT</cbc:ID></cac:TaxScheme></cac:PartyTaxScheme>\
             <cac:PartyLegalEntity><cbc:RegistrationName>Fatoora Samples LTD</cbc:RegistrationName>\
             </cac:PartyLegalEntity></cac:Party></cac:AccountingCustomerParty>",
            "<cac:Delivery><cbc:ActualDeliveryDate>2024-01-02</cbc:ActualDeliveryDate>\
             <cbc:LatestDeliveryDate>2024-01-09</cbc:LatestDeliveryDate></cac:Delivery>",
            "<cac:PaymentMeans>",
            "<cac:TaxSubtotal><cbc:TaxableAmount currencyID=\"SAR\">100.00</cbc:TaxableAmount>\
             <cbc:TaxAmount currencyID=\"SAR\">0.00</cbc:TaxAmount><cac:TaxCategory>\
             <cbc:ID schemeAgencyID=\"6\" schemeID=\"UN/ECE 5305\">Z</cbc:ID>\
             <cbc:Percent>0.00</cbc:Percent>\
             <cbc:TaxExemptionReasonCode>VATEX-SA-32</cbc:TaxExemptionReasonCode>\
             <cbc:TaxExemptionReason>Export of goods</cbc:TaxExemptionReason>\
             <cac:TaxScheme><cbc:ID schemeAgencyID=\"6\" schemeID=\"UN/ECE 5153\">VAT</cbc:ID></cac:TaxScheme>\
             </cac:TaxCategory></cac:TaxSubtotal>",
            "<cac:LegalMonetaryTotal>",
            // line categories never carry the exemption
            "<cac:ClassifiedTaxCategory><cbc:ID>Z</cbc:ID><cbc:Percent>0.00</cbc:Percent>\
             <cac:TaxScheme><cbc:ID>VAT</cbc:ID></cac:TaxScheme></cac:ClassifiedTaxCategory>",
        ];
        let mut last = 0;
        for needle in order {
            let at = position(&xml, needle);
            assert!(at >= last, "{needle} out of order");
            last = at;
        }
    }
}

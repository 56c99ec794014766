//! Invoice domain types and builders.
mod builder;
pub mod digest;
mod qr;
pub mod sign;
pub mod xml;
pub use builder::{Invoice, InvoiceBuilder, RequiredInvoiceFields, SignedInvoice};
pub use digest::{Digest, InvoiceHash};
pub use qr::{QrCodeError, QrFields, QrPayload, QrResult, TlvValue, decode_base64, decode_tlv};

use bitflags::bitflags;
use chrono::{DateTime, NaiveDate, Utc};
use iso_currency::Currency;
use isocountry::CountryCode;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::str::FromStr;
use thiserror::Error;

type Result<T> = std::result::Result<T, InvoiceError>;

/// Invoice construction errors.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoice has no line items")]
    MissingLineItems,
    #[error("Missing Buyer ID for buyer")]
    MissingBuyerId,
    #[error("Invalid VAT ID format")]
    InvalidVatFormat,
}

/// Postal address for parties.
///
/// Fields render in schema order: street, additional street, building number,
/// additional number (plot), district, city, postal code, subdivision, country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub country_code: CountryCode,
    pub city: String,
    pub street: String,
    pub additional_street: Option<String>,
    pub building_number: String,
    pub additional_number: Option<String>,
    pub postal_code: String,
    pub subdivision: Option<String>,
    pub district: Option<String>,
}

impl Address {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        country_code: CountryCode,
        city: impl Into<String>,
        street: impl Into<String>,
        additional_street: Option<String>,
        building_number: impl Into<String>,
        additional_number: Option<String>,
        postal_code: impl Into<String>,
        subdivision: Option<String>,
        district: Option<String>,
    ) -> Self {
        Self {
            country_code,
            city: city.into(),
            street: street.into(),
            additional_street,
            building_number: building_number.into(),
            additional_number,
            postal_code: postal_code.into(),
            subdivision,
            district,
        }
    }

    pub fn country_code(&self) -> &CountryCode {
        &self.country_code
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn additional_street(&self) -> Option<&str> {
        self.additional_street.as_deref()
    }

    pub fn building_number(&self) -> &str {
        &self.building_number
    }

    pub fn additional_number(&self) -> Option<&str> {
        self.additional_number.as_deref()
    }

    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    pub fn subdivision(&self) -> Option<&str> {
        self.subdivision.as_deref()
    }

    pub fn district(&self) -> Option<&str> {
        self.district.as_deref()
    }
}

/// VAT registration number.
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::VatId;
///
/// let vat = VatId::parse(" 301121971500003 ")?;
/// assert_eq!(vat.as_str(), "301121971500003");
/// # Ok::<(), zatca_ubl::invoice::InvoiceError>(())
/// ```
///
/// # Errors
/// Returns [`InvoiceError::InvalidVatFormat`] if the input is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatId(String);
impl VatId {
    pub fn parse<S: Into<String>>(s: S) -> Result<Self> {
        let s = s.into().trim().to_string();
        if s.is_empty() {
            return Err(InvoiceError::InvalidVatFormat);
        }
        Ok(VatId(s))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl AsRef<str> for VatId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
impl FromStr for VatId {
    type Err = InvoiceError;
    fn from_str(s: &str) -> Result<Self> {
        VatId::parse(s)
    }
}
impl TryFrom<&str> for VatId {
    type Error = InvoiceError;
    fn try_from(value: &str) -> Result<Self> {
        VatId::parse(value)
    }
}

/// Additional party identifier (commercial registration, national id, ...).
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::OtherId;
///
/// let id = OtherId::with_scheme("1010010000", "CRN");
/// assert_eq!(id.as_str(), "1010010000");
/// assert_eq!(id.scheme_id(), Some("CRN"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherId {
    value: String,
    scheme_id: Option<String>,
}
impl OtherId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        OtherId {
            value: value.into(),
            scheme_id: None,
        }
    }

    pub fn with_scheme<V: Into<String>, S: Into<String>>(value: V, scheme_id: S) -> Self {
        OtherId {
            value: value.into(),
            scheme_id: Some(scheme_id.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn scheme_id(&self) -> Option<&str> {
        self.scheme_id.as_deref()
    }
}

/// Invoice note with language metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceNote {
    language: String,
    text: String,
}

impl InvoiceNote {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            text: text.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

// Marker roles
/// Marker trait for party role types.
pub trait PartyRole {}

/// Seller role marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerRole;
impl PartyRole for SellerRole {}
/// Buyer role marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerRole;
impl PartyRole for BuyerRole {}

/// Party wrapper with role-specific typing.
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::{Address, OtherId, Party, SellerRole};
/// use isocountry::CountryCode;
///
/// let seller = Party::<SellerRole>::new(
///     "Ahmed Mohamed AL Ahmady".into(),
///     Address::new(
///         CountryCode::SAU,
///         "Riyadh",
///         "Prince Sultan",
///         None,
///         "2322",
///         None,
///         "23333",
///         None,
///         Some("Al-Murabba".into()),
///     ),
///     "301121971500003",
///     Some(OtherId::with_scheme("1010010000", "CRN")),
/// )?;
/// assert_eq!(seller.vat_id().map(|v| v.as_str()), Some("301121971500003"));
/// # Ok::<(), zatca_ubl::invoice::InvoiceError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party<R: PartyRole> {
    _marker: PhantomData<R>,
    name: String,
    address: Address,
    vat_id: Option<VatId>,
    other_id: Option<OtherId>,
}

pub type Seller = Party<SellerRole>;
pub type Buyer = Party<BuyerRole>;

impl Party<SellerRole> {
    /// Create a seller party; the VAT number is mandatory.
    ///
    /// # Errors
    /// Returns an error if the VAT ID is empty.
    pub fn new(
        name: String,
        address: Address,
        vat_id: impl Into<String>,
        other_id: Option<OtherId>,
    ) -> Result<Self> {
        let vat = VatId::parse(vat_id.into())?;
        Ok(Party {
            _marker: PhantomData,
            name,
            address,
            vat_id: Some(vat),
            other_id,
        })
    }
}

impl Party<BuyerRole> {
    /// Create a buyer party.
    ///
    /// # Errors
    /// Returns an error if the VAT ID is invalid or no identifier is provided.
    pub fn new(
        name: String,
        address: Address,
        vat_id: Option<String>,
        other_id: Option<OtherId>, // required if vat_id is None
    ) -> Result<Self> {
        let vat = match vat_id {
            Some(v) => Some(VatId::parse(v)?),
            None => None,
        };
        if vat.is_none() && other_id.is_none() {
            return Err(InvoiceError::MissingBuyerId);
        }
        Ok(Party {
            _marker: PhantomData,
            name,
            address,
            vat_id: vat,
            other_id,
        })
    }
}

impl<R: PartyRole> Party<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn vat_id(&self) -> Option<&VatId> {
        self.vat_id.as_ref()
    }

    pub fn other_id(&self) -> Option<&OtherId> {
        self.other_id.as_ref()
    }
}

/// Invoice subtype: standard (B2B) or simplified (B2C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceSubType {
    Simplified,
    Standard,
}

/// Reference to an original invoice for credit/debit notes.
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::OriginalInvoiceRef;
///
/// let original = OriginalInvoiceRef::new("SME00002").with_uuid("uuid-orig");
/// assert_eq!(original.id(), "SME00002");
/// assert_eq!(original.uuid(), Some("uuid-orig"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalInvoiceRef {
    id: String,
    uuid: Option<String>,
    issue_date: Option<NaiveDate>,
}

impl OriginalInvoiceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uuid: None,
            issue_date: None,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_issue_date(mut self, issue_date: NaiveDate) -> Self {
        self.issue_date = Some(issue_date);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }
}

/// Invoice type and required metadata.
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::{InvoiceSubType, InvoiceType};
///
/// let invoice_type = InvoiceType::Tax(InvoiceSubType::Simplified);
/// assert!(invoice_type.is_simplified());
/// assert_eq!(invoice_type.type_code(), "388");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceType {
    Tax(InvoiceSubType),
    Prepayment(InvoiceSubType),
    CreditNote(InvoiceSubType, OriginalInvoiceRef, String), // original invoice ref + reason
    DebitNote(InvoiceSubType, OriginalInvoiceRef, String),  // original invoice ref + reason
}

impl InvoiceType {
    pub fn sub_type(&self) -> InvoiceSubType {
        match self {
            InvoiceType::Tax(st)
            | InvoiceType::Prepayment(st)
            | InvoiceType::CreditNote(st, ..)
            | InvoiceType::DebitNote(st, ..) => *st,
        }
    }

    pub fn is_simplified(&self) -> bool {
        self.sub_type() == InvoiceSubType::Simplified
    }

    /// UN/CEFACT 1001 document code.
    pub fn type_code(&self) -> &'static str {
        match self {
            InvoiceType::Tax(_) => "388",
            InvoiceType::Prepayment(_) => "386",
            InvoiceType::CreditNote(..) => "381",
            InvoiceType::DebitNote(..) => "383",
        }
    }

    pub fn original_invoice(&self) -> Option<&OriginalInvoiceRef> {
        match self {
            InvoiceType::CreditNote(_, original, _) | InvoiceType::DebitNote(_, original, _) => {
                Some(original)
            }
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            InvoiceType::CreditNote(_, _, reason) | InvoiceType::DebitNote(_, _, reason) => {
                Some(reason.as_str()).filter(|r| !r.trim().is_empty())
            }
            _ => None,
        }
    }
}

bitflags! {
    /// Invoice transaction flags, packed into the `name` attribute of the type code.
    ///
    /// # Examples
    /// ```rust
    /// use zatca_ubl::invoice::InvoiceFlags;
    ///
    /// let flags = InvoiceFlags::EXPORT | InvoiceFlags::SELF_BILLED;
    /// assert!(flags.contains(InvoiceFlags::EXPORT));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct InvoiceFlags: u8 {
        const THIRD_PARTY = 0b00001;
        const NOMINAL = 0b00010;
        const EXPORT = 0b00100;
        const SUMMARY = 0b01000;
        const SELF_BILLED = 0b10000;
    }
}

impl InvoiceFlags {
    /// Transaction code `0PTNESB` where `P` is the subtype and the rest are flag digits.
    pub fn transaction_code(&self, sub_type: InvoiceSubType) -> String {
        let digit = |flag: InvoiceFlags| if self.contains(flag) { '1' } else { '0' };
        let mut code = String::with_capacity(7);
        code.push('0');
        code.push(match sub_type {
            InvoiceSubType::Standard => '1',
            InvoiceSubType::Simplified => '2',
        });
        for flag in [
            InvoiceFlags::THIRD_PARTY,
            InvoiceFlags::NOMINAL,
            InvoiceFlags::EXPORT,
            InvoiceFlags::SUMMARY,
            InvoiceFlags::SELF_BILLED,
        ] {
            code.push(digit(flag));
        }
        code
    }
}

/// VAT category (UN/ECE 5305 subset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VatCategory {
    Exempt,
    Standard,
    Zero,
    OutOfScope,
}

impl VatCategory {
    pub fn code(&self) -> &'static str {
        match self {
            VatCategory::Exempt => "E",
            VatCategory::Standard => "S",
            VatCategory::Zero => "Z",
            VatCategory::OutOfScope => "O",
        }
    }
}

/// Tax category with rate and optional exemption reason.
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::{TaxCategory, VatCategory};
///
/// let zero = TaxCategory::new(VatCategory::Zero, 0.0)
///     .with_exemption("VATEX-SA-32", "Export of goods");
/// assert_eq!(zero.exemption_reason_code(), Some("VATEX-SA-32"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCategory {
    category: VatCategory,
    percent: f64,
    exemption_reason_code: Option<String>,
    exemption_reason: Option<String>,
}

impl TaxCategory {
    pub fn new(category: VatCategory, percent: f64) -> Self {
        Self {
            category,
            percent,
            exemption_reason_code: None,
            exemption_reason: None,
        }
    }

    pub fn standard(percent: f64) -> Self {
        Self::new(VatCategory::Standard, percent)
    }

    pub fn with_exemption(mut self, code: impl Into<String>, reason: impl Into<String>) -> Self {
        self.exemption_reason_code = Some(code.into());
        self.exemption_reason = Some(reason.into());
        self
    }

    pub fn category(&self) -> VatCategory {
        self.category
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn exemption_reason_code(&self) -> Option<&str> {
        self.exemption_reason_code.as_deref()
    }

    pub fn exemption_reason(&self) -> Option<&str> {
        self.exemption_reason.as_deref()
    }
}

/// Delivery dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    actual_delivery_date: NaiveDate,
    latest_delivery_date: Option<NaiveDate>,
}

impl Delivery {
    pub fn new(actual_delivery_date: NaiveDate) -> Self {
        Self {
            actual_delivery_date,
            latest_delivery_date: None,
        }
    }

    pub fn with_latest_delivery_date(mut self, date: NaiveDate) -> Self {
        self.latest_delivery_date = Some(date);
        self
    }

    pub fn actual_delivery_date(&self) -> NaiveDate {
        self.actual_delivery_date
    }

    pub fn latest_delivery_date(&self) -> Option<NaiveDate> {
        self.latest_delivery_date
    }
}

/// Document-level allowance (discount) or charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowanceCharge {
    charge_indicator: bool,
    reason: String,
    amount: f64,
    tax_category: TaxCategory,
}

impl AllowanceCharge {
    pub fn allowance(reason: impl Into<String>, amount: f64, tax_category: TaxCategory) -> Self {
        Self {
            charge_indicator: false,
            reason: reason.into(),
            amount,
            tax_category,
        }
    }

    pub fn charge(reason: impl Into<String>, amount: f64, tax_category: TaxCategory) -> Self {
        Self {
            charge_indicator: true,
            reason: reason.into(),
            amount,
            tax_category,
        }
    }

    pub fn is_charge(&self) -> bool {
        self.charge_indicator
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn tax_category(&self) -> &TaxCategory {
        &self.tax_category
    }
}

/// Single invoice line item.
///
/// # Examples
/// ```rust
/// use zatca_ubl::invoice::{LineItem, LineItemFields, TaxCategory};
///
/// let item = LineItem::new(LineItemFields {
///     name: "Book".into(),
///     quantity: 33.0,
///     unit_code: "PCE".into(),
///     unit_price: 3.0,
///     tax_category: TaxCategory::standard(15.0),
/// });
/// assert_eq!(item.line_extension_amount(), 99.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    name: String,
    quantity: f64,
    unit_code: String,
    unit_price: f64,
    line_extension_amount: f64,
    tax_amount: f64,
    rounding_amount: f64,
    tax_category: TaxCategory,
}

/// Fields for a line item whose amounts are derived from quantity and price.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemFields {
    pub name: String,
    pub quantity: f64,
    pub unit_code: String,
    pub unit_price: f64,
    pub tax_category: TaxCategory,
}

/// Fields for a line item whose amounts are supplied by the caller as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemPartsFields {
    pub name: String,
    pub quantity: f64,
    pub unit_code: String,
    pub unit_price: f64,
    pub line_extension_amount: f64,
    pub tax_amount: f64,
    pub rounding_amount: f64,
    pub tax_category: TaxCategory,
}

impl LineItem {
    pub fn new(fields: LineItemFields) -> Self {
        let line_extension_amount = round2(fields.quantity * fields.unit_price);
        let tax_amount = round2(line_extension_amount * fields.tax_category.percent / 100.0);
        Self {
            name: fields.name,
            quantity: fields.quantity,
            unit_code: fields.unit_code,
            unit_price: fields.unit_price,
            line_extension_amount,
            tax_amount,
            rounding_amount: round2(line_extension_amount + tax_amount),
            tax_category: fields.tax_category,
        }
    }

    /// Build a line from caller-supplied amounts; nothing is recomputed.
    pub fn from_parts(fields: LineItemPartsFields) -> Self {
        Self {
            name: fields.name,
            quantity: fields.quantity,
            unit_code: fields.unit_code,
            unit_price: fields.unit_price,
            line_extension_amount: fields.line_extension_amount,
            tax_amount: fields.tax_amount,
            rounding_amount: fields.rounding_amount,
            tax_category: fields.tax_category,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn unit_code(&self) -> &str {
        &self.unit_code
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn line_extension_amount(&self) -> f64 {
        self.line_extension_amount
    }

    pub fn tax_amount(&self) -> f64 {
        self.tax_amount
    }

    pub fn rounding_amount(&self) -> f64 {
        self.rounding_amount
    }

    pub fn tax_category(&self) -> &TaxCategory {
        &self.tax_category
    }
}

pub type LineItems = Vec<LineItem>;

/// Per-category tax subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxSubtotal {
    taxable_amount: f64,
    tax_amount: f64,
    tax_category: TaxCategory,
}

impl TaxSubtotal {
    pub fn new(taxable_amount: f64, tax_amount: f64, tax_category: TaxCategory) -> Self {
        Self {
            taxable_amount,
            tax_amount,
            tax_category,
        }
    }

    pub fn taxable_amount(&self) -> f64 {
        self.taxable_amount
    }

    pub fn tax_amount(&self) -> f64 {
        self.tax_amount
    }

    pub fn tax_category(&self) -> &TaxCategory {
        &self.tax_category
    }
}

/// Document totals and tax summary.
///
/// Values are rendered exactly as given; consistency between lines and totals is the
/// caller's responsibility. [`InvoiceTotals::from_line_items`] derives a consistent set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub line_extension_amount: f64,
    pub tax_exclusive_amount: f64,
    pub tax_inclusive_amount: f64,
    pub allowance_total_amount: f64,
    pub charge_total_amount: f64,
    pub prepaid_amount: f64,
    pub payable_amount: f64,
    pub tax_amount: f64,
    pub tax_subtotals: Vec<TaxSubtotal>,
}

impl InvoiceTotals {
    /// Derive totals from lines and document-level allowances/charges.
    ///
    /// Subtotals are grouped by category and rate in first-seen order.
    pub fn from_line_items(line_items: &[LineItem], allowance_charges: &[AllowanceCharge]) -> Self {
        let line_extension_amount = round2(line_items.iter().map(|li| li.line_extension_amount).sum());
        let allowance_total_amount = round2(
            allowance_charges
                .iter()
                .filter(|ac| !ac.charge_indicator)
                .map(|ac| ac.amount)
                .sum(),
        );
        let charge_total_amount = round2(
            allowance_charges
                .iter()
                .filter(|ac| ac.charge_indicator)
                .map(|ac| ac.amount)
                .sum(),
        );

        let mut tax_subtotals: Vec<TaxSubtotal> = Vec::new();
        for li in line_items {
            let category = &li.tax_category;
            match tax_subtotals.iter_mut().find(|st| {
                st.tax_category.category == category.category
                    && st.tax_category.percent == category.percent
            }) {
                Some(subtotal) => subtotal.taxable_amount += li.line_extension_amount,
                None => tax_subtotals.push(TaxSubtotal::new(
                    li.line_extension_amount,
                    0.0,
                    category.clone(),
                )),
            }
        }
        for ac in allowance_charges {
            let sign = if ac.charge_indicator { 1.0 } else { -1.0 };
            if let Some(subtotal) = tax_subtotals.iter_mut().find(|st| {
                st.tax_category.category == ac.tax_category.category
                    && st.tax_category.percent == ac.tax_category.percent
            }) {
                subtotal.taxable_amount += sign * ac.amount;
            }
        }
        for subtotal in &mut tax_subtotals {
            subtotal.taxable_amount = round2(subtotal.taxable_amount);
            subtotal.tax_amount =
                round2(subtotal.taxable_amount * subtotal.tax_category.percent / 100.0);
        }

        let tax_amount = round2(tax_subtotals.iter().map(|st| st.tax_amount).sum());
        let tax_exclusive_amount =
            round2(line_extension_amount - allowance_total_amount + charge_total_amount);
        let tax_inclusive_amount = round2(tax_exclusive_amount + tax_amount);

        Self {
            line_extension_amount,
            tax_exclusive_amount,
            tax_inclusive_amount,
            allowance_total_amount,
            charge_total_amount,
            prepaid_amount: 0.0,
            payable_amount: tax_inclusive_amount,
            tax_amount,
            tax_subtotals,
        }
    }

    pub fn with_prepaid_amount(mut self, prepaid: f64) -> Self {
        self.prepaid_amount = prepaid;
        self.payable_amount = round2(self.tax_inclusive_amount - prepaid);
        self
    }
}

/// Core invoice data model.
///
/// Instances are produced by [`InvoiceBuilder`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    invoice_type: InvoiceType,
    flags: InvoiceFlags,
    id: String,
    uuid: String,
    issue_datetime: DateTime<Utc>,
    currency: Currency, // currently no separate tax/invoice currency
    note: Option<InvoiceNote>,
    invoice_counter: u64,
    previous_invoice_hash: String,
    seller: Seller,
    buyer: Option<Buyer>,
    delivery: Option<Delivery>,
    payment_means_code: String,
    allowance_charges: Vec<AllowanceCharge>,
    totals: InvoiceTotals,
    line_items: LineItems,
}

impl InvoiceData {
    pub fn invoice_type(&self) -> &InvoiceType {
        &self.invoice_type
    }

    pub fn flags(&self) -> InvoiceFlags {
        self.flags
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn issue_datetime(&self) -> &DateTime<Utc> {
        &self.issue_datetime
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn note(&self) -> Option<&InvoiceNote> {
        self.note.as_ref()
    }

    pub fn invoice_counter(&self) -> u64 {
        self.invoice_counter
    }

    pub fn previous_invoice_hash(&self) -> &str {
        &self.previous_invoice_hash
    }

    pub fn seller(&self) -> &Seller {
        &self.seller
    }

    pub fn buyer(&self) -> Option<&Buyer> {
        self.buyer.as_ref()
    }

    pub fn delivery(&self) -> Option<&Delivery> {
        self.delivery.as_ref()
    }

    pub fn payment_means_code(&self) -> &str {
        &self.payment_means_code
    }

    pub fn allowance_charges(&self) -> &[AllowanceCharge] {
        &self.allowance_charges
    }

    pub fn totals(&self) -> &InvoiceTotals {
        &self.totals
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub(crate) fn issue_date_string(&self) -> String {
        self.issue_datetime.date_naive().to_string()
    }

    pub(crate) fn issue_time_string(&self) -> String {
        self.issue_datetime.time().format("%H:%M:%S").to_string()
    }

    pub(crate) fn format_amount(amount: f64) -> String {
        format_fixed(amount, 2)
    }
}

/// Fixed-point decimal text; values that round to zero never carry a sign.
pub(crate) fn format_fixed(value: f64, precision: usize) -> String {
    let text = format!("{:.*}", precision, value);
    match text.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_string(),
        _ => text,
    }
}

fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // -0.0 == 0.0, so this also drops the sign of a negative zero
    if rounded == 0.0 { 0.0 } else { rounded }
}

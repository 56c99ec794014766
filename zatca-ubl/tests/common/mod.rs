use chrono::TimeZone;
use iso_currency::Currency;
use isocountry::CountryCode;
use std::path::Path;
use zatca_ubl::invoice::sign::{
    CertificateInfo, CertificateReader, DigestSigner, EcdsaSigner, InvoiceSigner, SigningError,
    X509CertificateReader,
};
use zatca_ubl::invoice::{
    Address, AllowanceCharge, Invoice, InvoiceBuilder, InvoiceSubType, InvoiceTotals, InvoiceType,
    LineItem, LineItemFields, OtherId, Party, RequiredInvoiceFields, SellerRole, TaxCategory,
    TaxSubtotal,
};

pub const PREVIOUS_INVOICE_HASH: &str =
    "NWZlY2ViNjZmZmM4NmYzOGQ5NTI3ODZjNmQ2OTZjNzljMmRiYzIzOWRkNGU5MWI0NjcyOWQ3M2EyN2ZiNTdlOQ==";

#[allow(dead_code)]
pub fn dummy_invoice() -> Invoice {
    let seller = Party::<SellerRole>::new(
        "Acme Inc".into(),
        dummy_seller_address(),
        "399999999900003",
        Some(OtherId::with_scheme("7003339333", "CRN")),
    )
    .expect("valid seller");

    let line_items = vec![LineItem::new(LineItemFields {
        name: "Item".into(),
        quantity: 1.0,
        unit_code: "PCE".into(),
        unit_price: 100.0,
        tax_category: TaxCategory::standard(15.0),
    })];
    let totals = InvoiceTotals::from_line_items(&line_items, &[]);

    InvoiceBuilder::new(RequiredInvoiceFields {
        invoice_type: InvoiceType::Tax(InvoiceSubType::Simplified),
        id: "INV-1".into(),
        uuid: "8e6000cf-1a98-4174-b3e7-b5d5954bc10d".into(),
        issue_datetime: chrono::Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 30, 0)
            .single()
            .expect("valid datetime"),
        currency: Currency::SAR,
        previous_invoice_hash: PREVIOUS_INVOICE_HASH.into(),
        invoice_counter: 0,
        seller,
        line_items,
        totals,
        payment_means_code: "10".into(),
    })
    .build()
    .expect("build dummy invoice")
}

/// Simplified invoice carrying the values of the authority's QR sample.
#[allow(dead_code)]
pub fn conformance_invoice() -> Invoice {
    let seller = Party::<SellerRole>::new(
        "Ahmed Mohamed AL Ahmady".into(),
        Address::new(
            CountryCode::SAU,
            "Riyadh",
            "Prince Sultan",
            None,
            "2322",
            None,
            "23333",
            None,
            Some("Al-Murabba".into()),
        ),
        "301121971500003",
        Some(OtherId::with_scheme("1010010000", "CRN")),
    )
    .expect("valid seller");

    let line_items = vec![
        LineItem::new(LineItemFields {
            name: "Book".into(),
            quantity: 33.0,
            unit_code: "PCE".into(),
            unit_price: 3.0,
            tax_category: TaxCategory::standard(15.0),
        }),
        LineItem::new(LineItemFields {
            name: "Pen".into(),
            quantity: 3.0,
            unit_code: "PCE".into(),
            unit_price: 289.0,
            tax_category: TaxCategory::standard(15.0),
        }),
    ];
    // Totals mirror the sample document, which discounts after computing VAT.
    let totals = InvoiceTotals {
        line_extension_amount: 966.0,
        tax_exclusive_amount: 964.0,
        tax_inclusive_amount: 1108.9,
        allowance_total_amount: 2.0,
        charge_total_amount: 0.0,
        prepaid_amount: 0.0,
        payable_amount: 1108.9,
        tax_amount: 144.9,
        tax_subtotals: vec![TaxSubtotal::new(966.0, 144.9, TaxCategory::standard(15.0))],
    };

    InvoiceBuilder::new(RequiredInvoiceFields {
        invoice_type: InvoiceType::Tax(InvoiceSubType::Simplified),
        id: "SME00010".into(),
        uuid: "8e6000cf-1a98-4174-b3e7-b5d5954bc10d".into(),
        issue_datetime: chrono::Utc
            .with_ymd_and_hms(2022, 3, 13, 14, 40, 40)
            .single()
            .expect("valid datetime"),
        currency: Currency::SAR,
        previous_invoice_hash: PREVIOUS_INVOICE_HASH.into(),
        invoice_counter: 10,
        seller,
        line_items,
        totals,
        payment_means_code: "10".into(),
    })
    .allowance_charge(AllowanceCharge::allowance(
        "discount",
        2.0,
        TaxCategory::standard(15.0),
    ))
    .build()
    .expect("build conformance invoice")
}

#[allow(dead_code)]
pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

#[allow(dead_code)]
pub fn fixture_signer() -> InvoiceSigner<EcdsaSigner> {
    let key = EcdsaSigner::from_pem(&fixture("private_key.pem")).expect("fixture key");
    InvoiceSigner::from_certificate(key, &X509CertificateReader, &fixture("certificate.pem"))
        .expect("fixture certificate")
}

/// Signs with a fixed byte pattern; no key material involved.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub struct FakeSigner(pub u8);

impl DigestSigner for FakeSigner {
    fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>, SigningError> {
        Ok(digest.iter().map(|b| b ^ self.0).collect())
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub struct FailingSigner;

impl DigestSigner for FailingSigner {
    fn sign_digest(&self, _digest: &[u8]) -> Result<Vec<u8>, SigningError> {
        Err(SigningError::Signer("device unavailable".into()))
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct FakeCertificateReader;

impl CertificateReader for FakeCertificateReader {
    fn read_certificate(&self, content: &str) -> Result<CertificateInfo, SigningError> {
        if content.is_empty() {
            return Err(SigningError::MissingField("certificate"));
        }
        Ok(fake_certificate(content))
    }
}

#[allow(dead_code)]
pub fn fake_certificate(content: &str) -> CertificateInfo {
    CertificateInfo::new(
        "CN=PRZEINVOICESCA4-CA, DC=extgazt, DC=gov, DC=local",
        "379112742831380471835263969587287663520528387",
        "ZDMwMmI0MTE1NzVjOTU2NTk4YzVlODhhYmI0ODU2NDUyNTU2YTVhYjhhMDFmN2FjYjk1YTA2OWQ0NjY2MjQ4NQ==",
        vec![0x30, 0x56, 0x30, 0x10],
        vec![0x30, 0x45, 0x02, 0x21],
        content,
    )
}

#[allow(dead_code)]
fn dummy_seller_address() -> Address {
    Address::new(
        CountryCode::SAU,
        "Riyadh",
        "King Fahd",
        None,
        "1234",
        Some("5678".into()),
        "12222",
        None,
        Some("Olaya".into()),
    )
}

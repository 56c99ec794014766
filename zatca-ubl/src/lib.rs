//! ZATCA e-invoice core: canonical UBL rendering, hashing, XAdES signing and QR payloads.
//!
//! # Examples
//! ```rust
//! use zatca_ubl::config::{ConformanceProfile, ProfileName};
//!
//! let profile: ConformanceProfile = ProfileName::Default.profile();
//! assert!(profile.embed_unsigned_document());
//! ```
pub mod config;
pub mod invoice;

use thiserror::Error;

pub use config::{ConformanceProfile, ProfileName, ProfileParseError};
pub use invoice::QrCodeError;
pub use invoice::sign::SigningError;
pub use invoice::xml::InvoiceXmlError;
pub use invoice::{Invoice, InvoiceBuilder, InvoiceError, SignedInvoice};

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Invoice(#[from] invoice::InvoiceError),
    #[error(transparent)]
    Signing(#[from] invoice::sign::SigningError),
    #[error(transparent)]
    Qr(#[from] invoice::QrCodeError),
    #[error(transparent)]
    Xml(#[from] invoice::xml::InvoiceXmlError),
    #[error(transparent)]
    Profile(#[from] config::ProfileParseError),
}

/// Coarse classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required invoice, certificate or signature field was absent.
    MissingField,
    /// The renderer could not produce a document.
    Serialization,
    /// A value could not be encoded (TLV limits, base64).
    Encoding,
    /// The signer or certificate reader failed.
    Signing,
    /// The caller supplied a structurally invalid value.
    InvalidInput,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Invoice(_) | Error::Profile(_) => ErrorKind::InvalidInput,
            Error::Signing(err) => err.kind(),
            Error::Qr(err) => err.kind(),
            Error::Xml(err) => err.kind(),
        }
    }
}

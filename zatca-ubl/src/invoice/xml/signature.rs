//! UBL extension carrying the XAdES signature, and the standalone signed-properties document.
use super::constants::{
    C14N11_URI, DS_NS, HASH_EXCLUSION_XPATHS, INVOICE_SIGNED_DATA_ID, REFERENCED_SIGNATURE_ID,
    SAC_NS, SBC_NS, SHA256_URI, SIG_NS, SIGNATURE_ID, SIGNATURE_INFORMATION_ID,
    SIGNATURE_PROPERTIES_TYPE, SIGNED_PROPERTIES_ID, SIGNED_PROPERTIES_URI, XADES_EXTENSION_URI,
    XADES_NS, XPATH_TRANSFORM_URI,
};
use super::helpers::algorithm;
use super::{EmbeddedDocumentXml, InvoiceXmlError, escape_canonical};
use crate::config::SignatureMethod;
use crate::invoice::sign::Signature;

use quick_xml::se::{QuoteLevel, Serializer as QuickXmlSerializer};
use serde::ser::{Serialize, SerializeStruct, Serializer};

pub(super) struct UblExtensionsXml<'a> {
    pub(super) signature: &'a Signature,
    pub(super) method: SignatureMethod,
    pub(super) embedded: Option<&'a str>,
}

impl<'a> Serialize for UblExtensionsXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ext:UBLExtensions", 0)?;
        st.serialize_field("ext:UBLExtension", &SignatureExtensionXml(self))?;
        if let Some(document) = self.embedded {
            st.serialize_field("ext:UBLExtension", &EmbeddedExtensionXml(document))?;
        }
        st.end()
    }
}

struct SignatureExtensionXml<'a>(&'a UblExtensionsXml<'a>);

impl<'a> Serialize for SignatureExtensionXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ext:UBLExtension", 0)?;
        st.serialize_field("ext:ExtensionURI", XADES_EXTENSION_URI)?;
        st.serialize_field("ext:ExtensionContent", &SignatureContentXml(self.0))?;
        st.end()
    }
}

struct SignatureContentXml<'a>(&'a UblExtensionsXml<'a>);

impl<'a> Serialize for SignatureContentXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ext:ExtensionContent", 0)?;
        st.serialize_field("sig:UBLDocumentSignatures", &DocumentSignaturesXml(self.0))?;
        st.end()
    }
}

struct DocumentSignaturesXml<'a>(&'a UblExtensionsXml<'a>);

impl<'a> Serialize for DocumentSignaturesXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("sig:UBLDocumentSignatures", 0)?;
        st.serialize_field("@xmlns:sac", SAC_NS)?;
        st.serialize_field("@xmlns:sbc", SBC_NS)?;
        st.serialize_field("@xmlns:sig", SIG_NS)?;
        st.serialize_field("sac:SignatureInformation", &SignatureInformationXml(self.0))?;
        st.end()
    }
}

struct SignatureInformationXml<'a>(&'a UblExtensionsXml<'a>);

impl<'a> Serialize for SignatureInformationXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("sac:SignatureInformation", 0)?;
        st.serialize_field("cbc:ID", SIGNATURE_INFORMATION_ID)?;
        st.serialize_field("sbc:ReferencedSignatureID", REFERENCED_SIGNATURE_ID)?;
        st.serialize_field("ds:Signature", &DsSignatureXml(self.0))?;
        st.end()
    }
}

struct DsSignatureXml<'a>(&'a UblExtensionsXml<'a>);

impl<'a> Serialize for DsSignatureXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let signature = self.0.signature;
        let mut st = s.serialize_struct("ds:Signature", 0)?;
        st.serialize_field("@xmlns:ds", DS_NS)?;
        st.serialize_field("@Id", SIGNATURE_ID)?;
        st.serialize_field(
            "ds:SignedInfo",
            &SignedInfoXml {
                signature,
                method: self.0.method,
            },
        )?;
        st.serialize_field("ds:SignatureValue", &signature.signature_value_base64())?;
        st.serialize_field("ds:KeyInfo", &KeyInfoXml(signature.certificate()))?;
        st.serialize_field("ds:Object", &ObjectXml(signature))?;
        st.end()
    }
}

struct SignedInfoXml<'a> {
    signature: &'a Signature,
    method: SignatureMethod,
}

impl<'a> Serialize for SignedInfoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ds:SignedInfo", 0)?;
        st.serialize_field(
            "ds:CanonicalizationMethod",
            &algorithm("ds:CanonicalizationMethod", C14N11_URI),
        )?;
        st.serialize_field(
            "ds:SignatureMethod",
            &algorithm("ds:SignatureMethod", self.method.uri()),
        )?;
        st.serialize_field(
            "ds:Reference",
            &InvoiceReferenceXml(&self.signature.invoice_digest().base64()),
        )?;
        st.serialize_field(
            "ds:Reference",
            &SignedPropertiesReferenceXml(&self.signature.signed_properties_digest().hex_base64()),
        )?;
        st.end()
    }
}

struct InvoiceReferenceXml<'a>(&'a str);

impl<'a> Serialize for InvoiceReferenceXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ds:Reference", 0)?;
        st.serialize_field("@Id", INVOICE_SIGNED_DATA_ID)?;
        st.serialize_field("@URI", "")?;
        st.serialize_field("ds:Transforms", &TransformsXml)?;
        st.serialize_field("ds:DigestMethod", &algorithm("ds:DigestMethod", SHA256_URI))?;
        st.serialize_field("ds:DigestValue", self.0)?;
        st.end()
    }
}

struct TransformsXml;

impl Serialize for TransformsXml {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ds:Transforms", 0)?;
        for xpath in HASH_EXCLUSION_XPATHS {
            st.serialize_field("ds:Transform", &XPathTransformXml(xpath))?;
        }
        st.serialize_field("ds:Transform", &algorithm("ds:Transform", C14N11_URI))?;
        st.end()
    }
}

struct XPathTransformXml(&'static str);

impl Serialize for XPathTransformXml {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ds:Transform", 0)?;
        st.serialize_field("@Algorithm", XPATH_TRANSFORM_URI)?;
        st.serialize_field("ds:XPath", self.0)?;
        st.end()
    }
}

struct SignedPropertiesReferenceXml<'a>(&'a str);

impl<'a> Serialize for SignedPropertiesReferenceXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ds:Reference", 0)?;
        st.serialize_field("@Type", SIGNATURE_PROPERTIES_TYPE)?;
        st.serialize_field("@URI", SIGNED_PROPERTIES_URI)?;
        st.serialize_field("ds:DigestMethod", &algorithm("ds:DigestMethod", SHA256_URI))?;
        st.serialize_field("ds:DigestValue", self.0)?;
        st.end()
    }
}

struct KeyInfoXml<'a>(&'a str);

impl<'a> Serialize for KeyInfoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ds:KeyInfo", 0)?;
        st.serialize_field("ds:X509Data", &X509DataXml(self.0))?;
        st.end()
    }
}

struct X509DataXml<'a>(&'a str);

impl<'a> Serialize for X509DataXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ds:X509Data", 0)?;
        st.serialize_field("ds:X509Certificate", self.0)?;
        st.end()
    }
}

struct ObjectXml<'a>(&'a Signature);

impl<'a> Serialize for ObjectXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ds:Object", 0)?;
        st.serialize_field("xades:QualifyingProperties", &QualifyingPropertiesXml(self.0))?;
        st.end()
    }
}

struct QualifyingPropertiesXml<'a>(&'a Signature);

impl<'a> Serialize for QualifyingPropertiesXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let signature = self.0;
        let signing_time = signature.signing_time_string();
        let mut st = s.serialize_struct("xades:QualifyingProperties", 0)?;
        st.serialize_field("@xmlns:xades", XADES_NS)?;
        st.serialize_field("@Target", SIGNATURE_ID)?;
        st.serialize_field(
            "xades:SignedProperties",
            &SignedPropertiesXml {
                standalone: false,
                signing_time: &signing_time,
                certificate_digest: signature.certificate_digest(),
                issuer_name: signature.issuer_name(),
                serial_number: signature.serial_number(),
            },
        )?;
        st.end()
    }
}

/// `xades:SignedProperties`, either embedded in the signature or as its own document.
///
/// The standalone form declares the xades namespace on the root and the ds namespace on
/// every ds element, which is the shape the authority hashes.
struct SignedPropertiesXml<'a> {
    standalone: bool,
    signing_time: &'a str,
    certificate_digest: &'a str,
    issuer_name: &'a str,
    serial_number: &'a str,
}

impl<'a> Serialize for SignedPropertiesXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("xades:SignedProperties", 0)?;
        if self.standalone {
            st.serialize_field("@xmlns:xades", XADES_NS)?;
        }
        st.serialize_field("@Id", SIGNED_PROPERTIES_ID)?;
        st.serialize_field("xades:SignedSignatureProperties", &SignedSignaturePropertiesXml(self))?;
        st.end()
    }
}

struct SignedSignaturePropertiesXml<'a>(&'a SignedPropertiesXml<'a>);

impl<'a> Serialize for SignedSignaturePropertiesXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("xades:SignedSignatureProperties", 0)?;
        st.serialize_field("xades:SigningTime", self.0.signing_time)?;
        st.serialize_field("xades:SigningCertificate", &SigningCertificateXml(self.0))?;
        st.end()
    }
}

struct SigningCertificateXml<'a>(&'a SignedPropertiesXml<'a>);

impl<'a> Serialize for SigningCertificateXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("xades:SigningCertificate", 0)?;
        st.serialize_field("xades:Cert", &CertXml(self.0))?;
        st.end()
    }
}

struct CertXml<'a>(&'a SignedPropertiesXml<'a>);

impl<'a> Serialize for CertXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let props = self.0;
        let mut st = s.serialize_struct("xades:Cert", 0)?;
        st.serialize_field(
            "xades:CertDigest",
            &CertDigestXml {
                standalone: props.standalone,
                digest: props.certificate_digest,
            },
        )?;
        st.serialize_field("xades:IssuerSerial", &IssuerSerialXml(props))?;
        st.end()
    }
}

struct CertDigestXml<'a> {
    standalone: bool,
    digest: &'a str,
}

impl<'a> Serialize for CertDigestXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("xades:CertDigest", 0)?;
        st.serialize_field(
            "ds:DigestMethod",
            &DsElement {
                tag: "ds:DigestMethod",
                standalone: self.standalone,
                algorithm: Some(SHA256_URI),
                text: None,
            },
        )?;
        st.serialize_field(
            "ds:DigestValue",
            &DsElement {
                tag: "ds:DigestValue",
                standalone: self.standalone,
                algorithm: None,
                text: Some(self.digest),
            },
        )?;
        st.end()
    }
}

struct IssuerSerialXml<'a>(&'a SignedPropertiesXml<'a>);

impl<'a> Serialize for IssuerSerialXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let props = self.0;
        let mut st = s.serialize_struct("xades:IssuerSerial", 0)?;
        st.serialize_field(
            "ds:X509IssuerName",
            &DsElement {
                tag: "ds:X509IssuerName",
                standalone: props.standalone,
                algorithm: None,
                text: Some(props.issuer_name),
            },
        )?;
        st.serialize_field(
            "ds:X509SerialNumber",
            &DsElement {
                tag: "ds:X509SerialNumber",
                standalone: props.standalone,
                algorithm: None,
                text: Some(props.serial_number),
            },
        )?;
        st.end()
    }
}

/// A ds element that redeclares its namespace when rendered outside `ds:Signature`.
struct DsElement<'a> {
    tag: &'static str,
    standalone: bool,
    algorithm: Option<&'static str>,
    text: Option<&'a str>,
}

impl<'a> Serialize for DsElement<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct(self.tag, 0)?;
        if self.standalone {
            st.serialize_field("@xmlns:ds", DS_NS)?;
        }
        if let Some(uri) = self.algorithm {
            st.serialize_field("@Algorithm", uri)?;
        }
        if let Some(text) = self.text {
            st.serialize_field("$text", text)?;
        }
        st.end()
    }
}

struct EmbeddedExtensionXml<'a>(&'a str);

impl<'a> Serialize for EmbeddedExtensionXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ext:UBLExtension", 0)?;
        st.serialize_field("ext:ExtensionContent", &EmbeddedContentXml(self.0))?;
        st.end()
    }
}

struct EmbeddedContentXml<'a>(&'a str);

impl<'a> Serialize for EmbeddedContentXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("ext:ExtensionContent", 0)?;
        st.serialize_field(
            "cbc:EmbeddedDocumentBinaryObject",
            &EmbeddedDocumentXml {
                mime_code: "text/xml",
                data: self.0,
            },
        )?;
        st.end()
    }
}

/// `cac:Signature` pointer to the enveloped signature.
pub(super) struct CacSignatureXml;

impl Serialize for CacSignatureXml {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:Signature", 0)?;
        st.serialize_field("cbc:ID", REFERENCED_SIGNATURE_ID)?;
        st.serialize_field("cbc:SignatureMethod", XADES_EXTENSION_URI)?;
        st.end()
    }
}

/// Render the standalone signed-properties document that is digested into the signature.
///
/// Compact, no XML declaration, empty elements expanded.
pub(crate) fn signed_properties_xml(
    signing_time: &str,
    certificate_digest: &str,
    issuer_name: &str,
    serial_number: &str,
) -> Result<String, InvoiceXmlError> {
    let props = SignedPropertiesXml {
        standalone: true,
        signing_time,
        certificate_digest,
        issuer_name,
        serial_number,
    };

    let mut buffer = String::with_capacity(1024);
    let mut serializer = QuickXmlSerializer::new(&mut buffer);
    serializer.set_quote_level(QuoteLevel::Partial);
    serializer.expand_empty_elements(true);
    props.serialize(serializer)?;
    escape_canonical(&buffer)
}

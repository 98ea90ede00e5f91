//! OGC exception report encodings.

use std::io::Write;

use ows_common::{OwsFault, OwsResult};

use crate::namespaces;
use crate::xml::XmlWriter;

/// Which exception report schema a protocol version answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultEnvelope {
    /// OGC `ServiceExceptionReport` of pre-OWS services (WFS 1.0.0).
    PreOws { version: &'static str },
    /// OWS Common 1.0 `ExceptionReport` (WFS 1.1.0, CSW 2.0.2).
    Ows100 { version: &'static str },
    /// OWS Common 1.1 `ExceptionReport` (WFS 2.0.0, SOS, WMTS, WPS).
    Ows110 { version: &'static str },
}

impl FaultEnvelope {
    /// Used before any codec is known.
    pub const DEFAULT: FaultEnvelope = FaultEnvelope::Ows110 { version: "1.1.0" };

    pub fn content_type(&self) -> &'static str {
        match self {
            FaultEnvelope::PreOws { .. } => "application/vnd.ogc.se_xml",
            FaultEnvelope::Ows100 { .. } | FaultEnvelope::Ows110 { .. } => "text/xml",
        }
    }

    /// HTTP status for `fault`. Pre-OWS clients expect 200 with an
    /// exception document.
    pub fn http_status(&self, fault: &OwsFault) -> u16 {
        match self {
            FaultEnvelope::PreOws { .. } => 200,
            _ => fault.exception_code.http_status(),
        }
    }

    pub fn write(&self, fault: &OwsFault, sink: &mut dyn Write) -> OwsResult<()> {
        let mut w = XmlWriter::new(sink);
        w.declaration()?;
        match *self {
            FaultEnvelope::PreOws { version } => {
                w.start(
                    "ServiceExceptionReport",
                    &[("xmlns", namespaces::OGC), ("version", version)],
                )?;
                let mut attrs = vec![("code", fault.exception_code.as_str())];
                if let Some(locator) = &fault.locator {
                    attrs.push(("locator", locator.as_str()));
                }
                w.text_element("ServiceException", &attrs, &fault.message)?;
                w.end("ServiceExceptionReport")?;
            }
            FaultEnvelope::Ows100 { version } => write_ows(&mut w, namespaces::OWS_100, version, fault)?,
            FaultEnvelope::Ows110 { version } => write_ows(&mut w, namespaces::OWS_110, version, fault)?,
        }
        w.finish()
    }
}

fn write_ows(w: &mut XmlWriter<'_>, ns: &str, version: &str, fault: &OwsFault) -> OwsResult<()> {
    w.start(
        "ows:ExceptionReport",
        &[("xmlns:ows", ns), ("version", version), ("xml:lang", "en")],
    )?;
    let mut attrs = vec![("exceptionCode", fault.exception_code.as_str())];
    if let Some(locator) = &fault.locator {
        attrs.push(("locator", locator.as_str()));
    }
    w.start("ows:Exception", &attrs)?;
    w.simple("ows:ExceptionText", &fault.message)?;
    w.end("ows:Exception")?;
    w.end("ows:ExceptionReport")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ows_common::ExceptionCode;

    fn render(envelope: FaultEnvelope, fault: &OwsFault) -> String {
        let mut out = Vec::new();
        envelope.write(fault, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_pre_ows_report() {
        let fault = OwsFault::new(ExceptionCode::MissingParameterValue, "Missing TYPENAME")
            .with_locator("TYPENAME");
        let xml = render(FaultEnvelope::PreOws { version: "1.2.0" }, &fault);
        assert!(xml.contains(r#"<ServiceExceptionReport xmlns="http://www.opengis.net/ogc" version="1.2.0">"#));
        assert!(xml.contains(
            r#"<ServiceException code="MissingParameterValue" locator="TYPENAME">Missing TYPENAME</ServiceException>"#
        ));
        assert_eq!(FaultEnvelope::PreOws { version: "1.2.0" }.http_status(&fault), 200);
    }

    #[test]
    fn test_ows_110_report() {
        let fault = OwsFault::new(ExceptionCode::OperationNotSupported, "no Transaction");
        let envelope = FaultEnvelope::Ows110 { version: "2.0.0" };
        let xml = render(envelope, &fault);
        assert!(xml.contains(r#"xmlns:ows="http://www.opengis.net/ows/1.1" version="2.0.0""#));
        assert!(xml.contains(r#"<ows:Exception exceptionCode="OperationNotSupported">"#));
        assert!(xml.contains("<ows:ExceptionText>no Transaction</ows:ExceptionText>"));
        assert_eq!(envelope.http_status(&fault), 501);
        assert_eq!(envelope.content_type(), "text/xml");
    }

    #[test]
    fn test_ows_100_report_keeps_empty_message() {
        let fault = OwsFault::new(ExceptionCode::NoApplicableCode, "");
        let xml = render(FaultEnvelope::Ows100 { version: "1.0.0" }, &fault);
        assert!(xml.contains(r#"xmlns:ows="http://www.opengis.net/ows" version="1.0.0""#));
        assert!(xml.contains("<ows:ExceptionText></ows:ExceptionText>"));
    }
}

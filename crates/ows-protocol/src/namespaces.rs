//! Namespace URIs of the supported schemas.

pub const OWS_100: &str = "http://www.opengis.net/ows";
pub const OWS_110: &str = "http://www.opengis.net/ows/1.1";
pub const OGC: &str = "http://www.opengis.net/ogc";
pub const FES_20: &str = "http://www.opengis.net/fes/2.0";
pub const GML: &str = "http://www.opengis.net/gml";
pub const GML_32: &str = "http://www.opengis.net/gml/3.2";
pub const WFS: &str = "http://www.opengis.net/wfs";
pub const WFS_20: &str = "http://www.opengis.net/wfs/2.0";
pub const SOS_100: &str = "http://www.opengis.net/sos/1.0";
pub const OM_100: &str = "http://www.opengis.net/om/1.0";
pub const SWE_101: &str = "http://www.opengis.net/swe/1.0.1";
pub const WMTS_100: &str = "http://www.opengis.net/wmts/1.0";
pub const WPS_100: &str = "http://www.opengis.net/wps/1.0.0";
pub const CSW_202: &str = "http://www.opengis.net/cat/csw/2.0.2";
pub const DC: &str = "http://purl.org/dc/elements/1.1/";
pub const DCT: &str = "http://purl.org/dc/terms/";
pub const XLINK: &str = "http://www.w3.org/1999/xlink";
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema";
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
pub const SOAP_11: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_12: &str = "http://www.w3.org/2003/05/soap-envelope";

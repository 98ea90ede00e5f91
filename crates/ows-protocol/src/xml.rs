//! Namespace-aware XML request trees and the streaming writer used by the
//! response encoders.

use std::io::{self, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use ows_common::{OwsError, OwsResult};

use crate::namespaces;

/// An attribute with its namespace resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Qualified name as written.
    pub name: String,
    pub namespace: Option<String>,
    pub local_name: String,
    pub value: String,
}

/// An element of a parsed request document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `wfs:Query`.
    pub name: String,
    pub namespace: Option<String>,
    pub local_name: String,
    pub attributes: Vec<XmlAttribute>,
    /// `xmlns` declarations made on this element as `(prefix, uri)`; the
    /// default namespace has an empty prefix.
    pub namespace_decls: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

/// SOAP envelope version a request arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl XmlElement {
    /// Parse a complete document and return its root element.
    pub fn parse(input: &[u8]) -> OwsResult<XmlElement> {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut scope: Vec<(String, String)> = Vec::new();
        let mut marks: Vec<usize> = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                malformed(format!("at position {}: {}", reader.buffer_position(), e))
            })?;
            match event {
                Event::Start(start) => {
                    marks.push(scope.len());
                    stack.push(open_element(&start, &mut scope)?);
                }
                Event::Empty(start) => {
                    let mark = scope.len();
                    let element = open_element(&start, &mut scope)?;
                    scope.truncate(mark);
                    attach(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed("unexpected closing tag"))?;
                    if let Some(mark) = marks.pop() {
                        scope.truncate(mark);
                    }
                    attach(element, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        let text = text.unescape().map_err(|e| malformed(e.to_string()))?;
                        top.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(malformed("document ends inside an element"));
        }
        root.ok_or_else(|| malformed("document has no root element"))
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Value of an unqualified attribute.
    pub fn attr(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn attr_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.local_name == local_name)
            .map(|a| a.value.trim())
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }

    /// First child with the given local name, in any namespace.
    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.local_name == local_name)
    }

    pub fn children_named<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children
            .iter()
            .filter(move |c| c.local_name == local_name)
    }

    /// Trimmed text content.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Trimmed text of the first child named `local_name`, if non-empty.
    pub fn child_text(&self, local_name: &str) -> Option<&str> {
        self.child(local_name)
            .map(XmlElement::text)
            .filter(|t| !t.is_empty())
    }

    /// Texts of all children named `local_name`, skipping empty ones.
    pub fn children_text(&self, local_name: &str) -> Vec<String> {
        self.children_named(local_name)
            .map(XmlElement::text)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Resolve a `prefix:local` value against the declarations visible on
    /// this element and `ancestors` (outermost first).
    pub fn resolve_prefix<'a>(&'a self, ancestors: &[&'a XmlElement], prefix: &str) -> Option<&'a str> {
        std::iter::once(self)
            .chain(ancestors.iter().rev().copied())
            .flat_map(|e| e.namespace_decls.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Strip a SOAP 1.1 or 1.2 envelope, returning the first element of its
    /// body. Other documents are returned unchanged.
    pub fn unwrap_soap(self) -> OwsResult<(XmlElement, Option<SoapVersion>)> {
        let version = match self.namespace.as_deref() {
            Some(namespaces::SOAP_11) if self.local_name == "Envelope" => SoapVersion::Soap11,
            Some(namespaces::SOAP_12) if self.local_name == "Envelope" => SoapVersion::Soap12,
            _ => return Ok((self, None)),
        };

        let envelope_ns = self.namespace.clone();
        let body = self
            .children
            .into_iter()
            .find(|c| c.local_name == "Body" && c.namespace == envelope_ns)
            .ok_or_else(|| malformed("SOAP envelope has no Body"))?;
        let request = body
            .children
            .into_iter()
            .next()
            .ok_or_else(|| malformed("SOAP Body is empty"))?;
        Ok((request, Some(version)))
    }

    /// Serialize this subtree as a standalone fragment, declaring every
    /// namespace prefix it uses on the fragment root.
    pub fn to_xml_string(&self) -> OwsResult<String> {
        let mut bindings: Vec<(String, String)> = self.namespace_decls.clone();
        self.collect_bindings(&mut bindings);

        let mut out = Vec::new();
        {
            let mut writer = Writer::new(&mut out);
            self.write_to(&mut writer, &bindings)?;
        }
        String::from_utf8(out).map_err(|e| OwsError::Internal(e.to_string()))
    }

    fn collect_bindings(&self, bindings: &mut Vec<(String, String)>) {
        let mut bind = |qname: &str, namespace: &Option<String>| {
            if let Some(uri) = namespace {
                let prefix = qname.split_once(':').map(|(p, _)| p).unwrap_or("");
                if prefix != "xml" && !bindings.iter().any(|(p, _)| p == prefix) {
                    bindings.push((prefix.to_string(), uri.clone()));
                }
            }
        };
        bind(&self.name, &self.namespace);
        for attr in &self.attributes {
            bind(&attr.name, &attr.namespace);
        }
        for child in &self.children {
            child.collect_bindings(bindings);
        }
    }

    fn write_to<W: Write>(&self, writer: &mut Writer<W>, decls: &[(String, String)]) -> OwsResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (prefix, uri) in decls {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            start.push_attribute((key.as_str(), uri.as_str()));
        }
        for attr in &self.attributes {
            start.push_attribute((attr.name.as_str(), attr.value.as_str()));
        }

        let text = self.text();
        if self.children.is_empty() && text.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(write_error);
        }

        writer.write_event(Event::Start(start)).map_err(write_error)?;
        if !text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?;
        }
        for child in &self.children {
            child.write_to(writer, &child.namespace_decls)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(write_error)
    }
}

fn open_element(start: &BytesStart, scope: &mut Vec<(String, String)>) -> OwsResult<XmlElement> {
    let name = utf8(start.name().as_ref())?.to_string();

    let mut raw_attributes = Vec::new();
    let mut decls = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(e.to_string()))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            decls.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            decls.push((prefix.to_string(), value));
        } else {
            raw_attributes.push((key, value));
        }
    }
    scope.extend(decls.iter().cloned());

    let (prefix, local_name) = split_qname(&name);
    let namespace = match prefix {
        Some(prefix) => Some(
            lookup(scope, prefix)
                .ok_or_else(|| malformed(format!("unbound namespace prefix '{}'", prefix)))?,
        ),
        None => lookup(scope, ""),
    };

    let attributes = raw_attributes
        .into_iter()
        .map(|(name, value)| {
            let (prefix, local) = split_qname(&name);
            let namespace = match prefix {
                Some(prefix) => Some(lookup(scope, prefix).ok_or_else(|| {
                    malformed(format!("unbound namespace prefix '{}'", prefix))
                })?),
                None => None,
            };
            Ok(XmlAttribute {
                local_name: local.to_string(),
                name,
                namespace,
                value,
            })
        })
        .collect::<OwsResult<Vec<_>>>()?;

    Ok(XmlElement {
        local_name: local_name.to_string(),
        name,
        namespace,
        attributes,
        namespace_decls: decls,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> OwsResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(malformed("document has more than one root element")),
        None => *root = Some(element),
    }
    Ok(())
}

fn lookup(scope: &[(String, String)], prefix: &str) -> Option<String> {
    if prefix == "xml" {
        return Some(namespaces::XML.to_string());
    }
    scope
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty())
}

/// Split `prefix:local` into its parts.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn utf8(bytes: &[u8]) -> OwsResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| malformed(e.to_string()))
}

fn malformed(message: impl std::fmt::Display) -> OwsError {
    OwsError::MalformedRequest(format!("Invalid XML: {}", message))
}

/// Map a writer failure, keeping disconnects recognisable.
pub fn write_error(err: quick_xml::Error) -> OwsError {
    match err {
        quick_xml::Error::Io(io_err) => io::Error::new(io_err.kind(), io_err.to_string()).into(),
        other => OwsError::Internal(format!("XML write failed: {}", other)),
    }
}

/// Indenting XML writer over a response sink.
///
/// Attribute order is exactly the order callers pass, so output is
/// byte-for-byte reproducible for the same input.
pub struct XmlWriter<'w> {
    inner: Writer<&'w mut dyn Write>,
}

impl<'w> XmlWriter<'w> {
    pub fn new(sink: &'w mut dyn Write) -> Self {
        Self {
            inner: Writer::new_with_indent(sink, b' ', 2),
        }
    }

    pub fn declaration(&mut self) -> OwsResult<()> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> OwsResult<()> {
        self.event(Event::Start(start_tag(name, attrs)))
    }

    pub fn end(&mut self, name: &str) -> OwsResult<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> OwsResult<()> {
        self.event(Event::Empty(start_tag(name, attrs)))
    }

    /// `<name attrs>text</name>`, escaping the text.
    pub fn text_element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> OwsResult<()> {
        self.start(name, attrs)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub fn simple(&mut self, name: &str, text: &str) -> OwsResult<()> {
        self.text_element(name, &[], text)
    }

    /// Write `name` only when a value is present.
    pub fn optional(&mut self, name: &str, text: Option<&str>) -> OwsResult<()> {
        match text {
            Some(text) => self.simple(name, text),
            None => Ok(()),
        }
    }

    pub fn finish(mut self) -> OwsResult<()> {
        self.inner.get_mut().write_all(b"\n")?;
        self.inner.get_mut().flush()?;
        Ok(())
    }

    fn event(&mut self, event: Event<'_>) -> OwsResult<()> {
        self.inner.write_event(event).map_err(write_error)
    }
}

fn start_tag<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_FEATURE: &str = r#"<?xml version="1.0"?>
<wfs:GetFeature xmlns:wfs="http://www.opengis.net/wfs/2.0" xmlns:fes="http://www.opengis.net/fes/2.0"
    service="WFS" version="2.0.0">
  <wfs:Query typeNames="app:Road" xmlns:app="http://www.deegree.org/app">
    <fes:Filter><fes:ResourceId rid="ROAD_1"/></fes:Filter>
  </wfs:Query>
</wfs:GetFeature>"#;

    #[test]
    fn test_parse_resolves_namespaces() {
        let root = XmlElement::parse(GET_FEATURE.as_bytes()).unwrap();
        assert!(root.is(namespaces::WFS_20, "GetFeature"));
        assert_eq!(root.attr("version"), Some("2.0.0"));

        let query = root.child("Query").unwrap();
        assert_eq!(query.attr("typeNames"), Some("app:Road"));
        assert_eq!(
            query.resolve_prefix(&[&root], "app"),
            Some("http://www.deegree.org/app")
        );

        let filter = query.child("Filter").unwrap();
        assert!(filter.is(namespaces::FES_20, "Filter"));
    }

    #[test]
    fn test_fragment_declares_inherited_prefixes() {
        let root = XmlElement::parse(GET_FEATURE.as_bytes()).unwrap();
        let filter = root.child("Query").unwrap().child("Filter").unwrap();
        let xml = filter.to_xml_string().unwrap();
        assert_eq!(
            xml,
            r#"<fes:Filter xmlns:fes="http://www.opengis.net/fes/2.0"><fes:ResourceId rid="ROAD_1"/></fes:Filter>"#
        );

        let reparsed = XmlElement::parse(xml.as_bytes()).unwrap();
        assert!(reparsed.is(namespaces::FES_20, "Filter"));
    }

    #[test]
    fn test_unbound_prefix_is_malformed() {
        let err = XmlElement::parse(b"<foo:Bar/>").unwrap_err();
        assert!(matches!(err, OwsError::MalformedRequest(_)));
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let err = XmlElement::parse(b"<a><b></a>").unwrap_err();
        assert!(matches!(err, OwsError::MalformedRequest(_)));
    }

    #[test]
    fn test_empty_document_is_malformed() {
        assert!(matches!(
            XmlElement::parse(b"   ").unwrap_err(),
            OwsError::MalformedRequest(_)
        ));
    }

    #[test]
    fn test_unwrap_soap_12() {
        let doc = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
            <soap:Header/>
            <soap:Body>
              <sos:DescribeSensor xmlns:sos="http://www.opengis.net/sos/1.0" service="SOS"/>
            </soap:Body>
          </soap:Envelope>"#;
        let (request, soap) = XmlElement::parse(doc.as_bytes())
            .unwrap()
            .unwrap_soap()
            .unwrap();
        assert_eq!(soap, Some(SoapVersion::Soap12));
        assert!(request.is(namespaces::SOS_100, "DescribeSensor"));
    }

    #[test]
    fn test_unwrap_soap_empty_body() {
        let doc = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body/></s:Envelope>"#;
        let err = XmlElement::parse(doc.as_bytes())
            .unwrap()
            .unwrap_soap()
            .unwrap_err();
        assert!(matches!(err, OwsError::MalformedRequest(_)));
    }

    #[test]
    fn test_writer_output_is_deterministic() {
        let render = || {
            let mut out = Vec::new();
            let mut w = XmlWriter::new(&mut out);
            w.declaration().unwrap();
            w.start("a:Root", &[("xmlns:a", "urn:a"), ("version", "1.0.0")]).unwrap();
            w.simple("a:Title", "Roads & Rivers").unwrap();
            w.empty("a:Empty", &[("x", "1")]).unwrap();
            w.end("a:Root").unwrap();
            w.finish().unwrap();
            String::from_utf8(out).unwrap()
        };
        let first = render();
        assert_eq!(first, render());
        assert!(first.contains("<a:Title>Roads &amp; Rivers</a:Title>"));
        assert!(first.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    }
}

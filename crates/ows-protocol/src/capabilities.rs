//! OWS Common capabilities sections shared by the OWS based services.

use ows_common::{BoundingBox, OperationName, OwsResult};

use crate::response::{Capabilities, ServiceMetadata};
use crate::xml::XmlWriter;

/// OWS Common schema generation, which decides a few element shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwsVersion {
    V100,
    V110,
}

/// A constraint on an operation or the service, advertised as
/// `ows:Parameter`.
#[derive(Debug, Clone, Copy)]
pub struct AllowedValues<'a> {
    pub name: &'a str,
    pub values: &'a [&'a str],
}

/// Writes the `ServiceIdentification`, `ServiceProvider` and
/// `OperationsMetadata` sections a capabilities document asked for.
pub struct OwsSections<'a> {
    pub ows: OwsVersion,
    pub service_type: &'a str,
    pub versions: &'a [&'a str],
    pub capabilities: &'a Capabilities,
}

impl OwsSections<'_> {
    pub fn write(&self, w: &mut XmlWriter<'_>, parameters: &[AllowedValues<'_>]) -> OwsResult<()> {
        if self.capabilities.includes("ServiceIdentification") {
            self.write_identification(w)?;
        }
        if self.capabilities.includes("ServiceProvider") {
            write_provider(w, &self.capabilities.service)?;
        }
        if self.capabilities.includes("OperationsMetadata") {
            self.write_operations(w, parameters)?;
        }
        Ok(())
    }

    fn write_identification(&self, w: &mut XmlWriter<'_>) -> OwsResult<()> {
        let service = &self.capabilities.service;
        w.start("ows:ServiceIdentification", &[])?;
        w.simple("ows:Title", &service.title)?;
        w.optional("ows:Abstract", service.abstract_text.as_deref())?;
        if !service.keywords.is_empty() {
            w.start("ows:Keywords", &[])?;
            for keyword in &service.keywords {
                w.simple("ows:Keyword", keyword)?;
            }
            w.end("ows:Keywords")?;
        }
        w.simple("ows:ServiceType", self.service_type)?;
        for version in self.versions {
            w.simple("ows:ServiceTypeVersion", version)?;
        }
        w.simple("ows:Fees", service.fees.as_deref().unwrap_or("NONE"))?;
        w.simple(
            "ows:AccessConstraints",
            service.access_constraints.as_deref().unwrap_or("NONE"),
        )?;
        w.end("ows:ServiceIdentification")
    }

    fn write_operations(&self, w: &mut XmlWriter<'_>, parameters: &[AllowedValues<'_>]) -> OwsResult<()> {
        let href = self.capabilities.service.online_resource.as_str();
        w.start("ows:OperationsMetadata", &[])?;
        for operation in &self.capabilities.operations {
            write_operation(w, operation, href)?;
        }
        for parameter in parameters {
            self.write_parameter(w, parameter)?;
        }
        w.end("ows:OperationsMetadata")
    }

    fn write_parameter(&self, w: &mut XmlWriter<'_>, parameter: &AllowedValues<'_>) -> OwsResult<()> {
        w.start("ows:Parameter", &[("name", parameter.name)])?;
        if self.ows == OwsVersion::V110 {
            w.start("ows:AllowedValues", &[])?;
        }
        for value in parameter.values {
            w.simple("ows:Value", value)?;
        }
        if self.ows == OwsVersion::V110 {
            w.end("ows:AllowedValues")?;
        }
        w.end("ows:Parameter")
    }
}

fn write_provider(w: &mut XmlWriter<'_>, service: &ServiceMetadata) -> OwsResult<()> {
    w.start("ows:ServiceProvider", &[])?;
    w.simple("ows:ProviderName", &service.provider_name)?;
    if let Some(site) = &service.provider_site {
        w.empty("ows:ProviderSite", &[("xlink:href", site.as_str())])?;
    }
    w.end("ows:ServiceProvider")
}

fn write_operation(w: &mut XmlWriter<'_>, operation: &OperationName, href: &str) -> OwsResult<()> {
    w.start("ows:Operation", &[("name", operation.as_str())])?;
    w.start("ows:DCP", &[])?;
    w.start("ows:HTTP", &[])?;
    w.empty("ows:Get", &[("xlink:href", href)])?;
    w.empty("ows:Post", &[("xlink:href", href)])?;
    w.end("ows:HTTP")?;
    w.end("ows:DCP")?;
    w.end("ows:Operation")
}

/// `ows:WGS84BoundingBox` with lon/lat corners.
pub fn write_wgs84_bbox(w: &mut XmlWriter<'_>, bbox: &BoundingBox) -> OwsResult<()> {
    w.start("ows:WGS84BoundingBox", &[])?;
    w.simple("ows:LowerCorner", &bbox.lower_corner())?;
    w.simple("ows:UpperCorner", &bbox.upper_corner())?;
    w.end("ows:WGS84BoundingBox")
}

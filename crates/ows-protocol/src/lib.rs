//! OGC protocol-version dispatch and request/response transcoding.
//!
//! Supports:
//! - WFS 1.0.0, 1.1.0 and 2.0.0 (KVP, XML and SOAP)
//! - SOS 1.0.0, WMTS 1.0.0 (KVP and RESTful bindings), WPS 1.0.0 and CSW 2.0.2
//!
//! A request is read into a [`RequestEnvelope`], its version negotiated
//! against the [`VersionRegistry`], decoded into a [`CanonicalRequest`] by
//! the chosen [`RequestCodec`], handled through the [`Dispatcher`] and the
//! [`CanonicalResponse`] streamed back in that version's syntax.
//! [`ServiceContext::process`] runs the whole lifecycle.

pub mod capabilities;
pub mod codec;
pub mod csw;
pub mod dispatch;
pub mod envelope;
pub mod exceptions;
pub mod namespaces;
pub mod negotiate;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod response;
pub mod sink;
pub mod sos;
pub mod wfs;
pub mod wmts;
pub mod wps;
pub mod xml;

pub use codec::RequestCodec;
pub use csw::CswCodec;
pub use dispatch::{Dispatcher, Handler};
pub use envelope::{RawRequest, RequestBody, RequestEnvelope};
pub use exceptions::FaultEnvelope;
pub use negotiate::{negotiate, negotiate_accept_versions};
pub use pipeline::{Disposition, Lifecycle, Outcome, ServiceContext, Stage};
pub use registry::VersionRegistry;
pub use request::{CanonicalRequest, RequestPayload};
pub use response::{CanonicalResponse, Document};
pub use sink::{BufferSink, ResponseHead, ResponseSink};
pub use sos::SosCodec;
pub use wfs::{WfsCodec, WfsVersion};
pub use wmts::{WmtsCodec, WmtsRestPath};
pub use wps::WpsCodec;

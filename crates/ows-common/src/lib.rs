//! Common types shared across the OWS gateway crates.

pub mod bbox;
pub mod error;
pub mod fault;
pub mod kvp;
pub mod protocol;
pub mod tile;
pub mod version;

pub use bbox::BoundingBox;
pub use error::{HandlerError, OwsError, OwsResult};
pub use fault::{fault_from_error, map_to_fault, ExceptionCode, OwsFault};
pub use kvp::KvpMap;
pub use protocol::{OperationName, Protocol};
pub use tile::{TileMatrix, TileMatrixSet};
pub use version::ProtocolVersion;

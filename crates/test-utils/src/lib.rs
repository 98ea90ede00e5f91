//! Shared test utilities for the OWS gateway workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Request document fixtures and their paths
//! - Canonical response fixtures
//! - Stub handlers
//! - Response sinks that misbehave on purpose
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in integration tests (under `tests/`):
//!
//! ```ignore
//! use test_utils::{fixtures, handlers, DisconnectingSink};
//! ```

pub mod fixtures;
pub mod handlers;
pub mod paths;
pub mod sinks;

// Re-export commonly used items at the crate root
pub use paths::*;
pub use sinks::*;

/// Assert that an encoded document contains every fragment, printing the
/// whole document on failure.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_xml_contains;
///
/// assert_xml_contains!(xml, "<wfs:member>", r#"numberReturned="1""#);
/// ```
#[macro_export]
macro_rules! assert_xml_contains {
    ($xml:expr, $($fragment:expr),+ $(,)?) => {{
        let xml: &str = &$xml;
        $(
            if !xml.contains($fragment) {
                panic!(
                    "assertion failed: document does not contain `{}`\n--- document ---\n{}",
                    $fragment, xml
                );
            }
        )+
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_xml_contains_passes() {
        assert_xml_contains!("<a><b/></a>", "<a>", "<b/>");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_xml_contains_fails() {
        assert_xml_contains!(String::from("<a/>"), "<b/>");
    }
}

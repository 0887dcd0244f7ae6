//! Small helpers shared by the feed readers and writers.
//!
//! - **URL validation**: refuses subscription URLs that point at localhost or private networks
//! - **Text cleanup**: strips characters that are illegal in XML output

mod text;
mod url_validator;

pub use text::{non_empty, xml_safe_text};
pub use url_validator::{validate_url, UrlValidationError};

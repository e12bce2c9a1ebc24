pub mod errors;

pub use errors::{TransportError, TransportErrorKind, ValidationError};

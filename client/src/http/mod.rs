pub mod executor;
pub mod transport;
pub mod types;

pub use executor::send_request;
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::{HttpRequest, HttpResponse, RetryPolicy};

mod cancellation;
pub use cancellation::run_cancellable;

mod http_client;
pub use http_client::build_client;

pub mod logging;

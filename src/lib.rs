pub mod cache;
pub mod config;
pub mod exception;
pub mod param;
pub mod request;
pub mod response;
pub mod router;
pub mod routes;

pub use cache::FileCache;
pub use config::Config;
pub use exception::Exception;
pub use request::{parse_request, Request};
pub use response::ResponseWriter;
pub use router::{Handler, HandlerFuture, Router};
pub use routes::setup_router;

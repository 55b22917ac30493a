//! Request, Dispatch, and Response value types.

mod dispatch;
mod handler;
mod request;
mod response;

pub use dispatch::Dispatch;
pub use handler::{call_handler_catching_panics, RequestHandler};
pub use request::Request;
pub use response::{Body, FullResponse, HandleResult};

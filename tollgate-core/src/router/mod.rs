//! Router applications: the policy layer atop [`crate::path::PathMap`]
//! that walks a [`crate::request::Dispatch`] down to a leaf handler.

mod path_router;
mod serial_router;
mod suffix_router;

pub use path_router::{PathRouter, PathRouterEntry};
pub use serial_router::SerialRouter;
pub use suffix_router::{SuffixRouter, SuffixRouterEntry};

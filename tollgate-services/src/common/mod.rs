//! Generic services for panic catching, context management, and timeouts.
mod context;
mod detect;
mod erase;
mod map;
mod panic;
mod timeout;

pub use context::ContextService;
pub use detect::{Detect, DetectService, FixedLengthDetector, PrefixDetector};
pub use erase::EraseResp;
pub use map::{FnSvc, Map, MapErr};
pub use panic::{CatchPanicError, CatchPanicService};
pub use timeout::{Timeout, TimeoutError, TimeoutService};

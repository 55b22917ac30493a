mod runtimes;
mod wrapper;

pub use runtimes::{Fleet, WorkerCommand};
pub use wrapper::RuntimeWrapper;

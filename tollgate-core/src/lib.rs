#![feature(impl_trait_in_assoc_type)]

#[macro_use]
mod error;
pub use error::{AnyError, AnyResult, Error};

pub mod component;
pub mod config;
pub mod context;
pub mod host;
pub mod listener;
pub mod path;
pub mod ratelimit;
pub mod request;
pub mod router;
pub mod util;

pub trait Builder<Config> {
    fn build_with_config(config: Config) -> Self;
}

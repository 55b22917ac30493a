#![feature(impl_trait_in_assoc_type)]

pub type AnyError = anyhow::Error;

pub mod common;
pub mod endpoint;
pub mod tls;
pub mod warehouse;

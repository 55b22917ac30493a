//! The component lifecycle kernel: [`ControlContext`], [`ComponentState`],
//! [`BaseComponent`], and configuration-struct binding.

mod base;
mod config_binder;
mod context;
mod state;

pub use base::BaseComponent;
pub use config_binder::bind_config;
pub use context::ControlContext;
pub use state::ComponentState;

//! [`BaseComponent`]: the lifecycle contract every component implements.
//! `init`/`start`/`stop` are provided methods that drive the
//! [`ControlContext`] state machine around the subclass's `_init`/
//! `_start`/`_stop` hooks, so a hook can never "forget to call the base" —
//! the base is what calls the hook, not the other way around.

use std::future::Future;

use crate::error::Error;

use super::context::ControlContext;
use super::state::ComponentState;

/// Implemented by every concrete component class.
pub trait BaseComponent {
    /// The class's bound, validated configuration type.
    type Config;

    fn control(&self) -> &ControlContext;

    /// Runs once, `new → stopped`. No overt external I/O beyond reading
    /// config-declared files is expected here.
    fn _init(&self, config: Self::Config) -> impl Future<Output = Result<(), Error>>;

    /// Runs `stopped → running`. Fails if already running.
    fn _start(&self) -> impl Future<Output = Result<(), Error>>;

    /// Runs `running → stopped`. `will_reload` hints that the caller
    /// expects a like-for-like replacement to follow shortly, letting the
    /// component retain warmable state (e.g. a listening socket).
    fn _stop(&self, will_reload: bool) -> impl Future<Output = Result<(), Error>>;

    /// Drives `new → initializing → stopped`. A root may call this itself
    /// on first `start`; non-root components are always initialized
    /// explicitly by their owning manager.
    fn init(&self, config: Self::Config) -> impl Future<Output = Result<(), Error>> {
        async move {
            let ctx = self.control();
            ctx.begin_transition(ComponentState::New)?;
            match self._init(config).await {
                Ok(()) => {
                    ctx.end_transition(ComponentState::Stopped);
                    Ok(())
                }
                Err(e) => {
                    ctx.abort_transition(ComponentState::New);
                    Err(e)
                }
            }
        }
    }

    /// Drives `stopped → starting → running`. Auto-inits a component still
    /// in `new` (matches the root auto-init allowance).
    fn start(&self, auto_init_with: Option<Self::Config>) -> impl Future<Output = Result<(), Error>> {
        async move {
            let ctx = self.control();
            if ctx.state() == ComponentState::New {
                let config = auto_init_with.ok_or_else(|| {
                    Error::IllegalState(format!(
                        "{}: cannot auto-init without a configuration",
                        ctx.name_path_string()
                    ))
                })?;
                self.init(config).await?;
            }
            ctx.begin_transition(ComponentState::Stopped)?;
            match self._start().await {
                Ok(()) => {
                    ctx.end_transition(ComponentState::Running);
                    Ok(())
                }
                Err(e) => {
                    ctx.abort_transition(ComponentState::Stopped);
                    Err(e)
                }
            }
        }
    }

    /// Drives `running → stopping → stopped`. Only legal from `running`.
    fn stop(&self, will_reload: bool) -> impl Future<Output = Result<(), Error>> {
        async move {
            let ctx = self.control();
            ctx.begin_transition(ComponentState::Running)?;
            ctx.end_transition(ComponentState::Stopping);
            let result = self._stop(will_reload).await;
            ctx.node_force_state(ComponentState::Stopped);
            result
        }
    }
}

impl ControlContext {
    /// Sets the state directly, used by [`BaseComponent::stop`] once
    /// already in the non-reentrant `Stopping` state (which has no
    /// matching `begin_transition` counterpart since `Stopping` itself is
    /// externally observable, unlike `Initializing`/`Starting`).
    pub(super) fn node_force_state(&self, to: ComponentState) {
        self.abort_transition(to);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct Counter {
        ctx: ControlContext,
        inits: RefCell<u32>,
        starts: RefCell<u32>,
        stops: RefCell<u32>,
    }

    impl BaseComponent for Counter {
        type Config = ();

        fn control(&self) -> &ControlContext {
            &self.ctx
        }

        async fn _init(&self, _config: ()) -> Result<(), Error> {
            *self.inits.borrow_mut() += 1;
            Ok(())
        }

        async fn _start(&self) -> Result<(), Error> {
            *self.starts.borrow_mut() += 1;
            Ok(())
        }

        async fn _stop(&self, _will_reload: bool) -> Result<(), Error> {
            *self.stops.borrow_mut() += 1;
            Ok(())
        }
    }

    fn make() -> Counter {
        Counter {
            ctx: ControlContext::root("comp", "Counter"),
            inits: RefCell::new(0),
            starts: RefCell::new(0),
            stops: RefCell::new(0),
        }
    }

    #[monoio::test]
    async fn full_lifecycle_runs_each_hook_once() {
        let c = make();
        c.init(()).await.unwrap();
        assert_eq!(c.ctx.state(), ComponentState::Stopped);
        c.start(None).await.unwrap();
        assert_eq!(c.ctx.state(), ComponentState::Running);
        c.stop(false).await.unwrap();
        assert_eq!(c.ctx.state(), ComponentState::Stopped);
        assert_eq!(*c.inits.borrow(), 1);
        assert_eq!(*c.starts.borrow(), 1);
        assert_eq!(*c.stops.borrow(), 1);
    }

    #[monoio::test]
    async fn start_twice_without_stop_is_rejected() {
        let c = make();
        c.init(()).await.unwrap();
        c.start(None).await.unwrap();
        let err = c.start(None).await.unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[monoio::test]
    async fn stop_from_stopped_is_rejected() {
        let c = make();
        c.init(()).await.unwrap();
        let err = c.stop(false).await.unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[monoio::test]
    async fn root_auto_inits_on_first_start() {
        let c = make();
        c.start(Some(())).await.unwrap();
        assert_eq!(*c.inits.borrow(), 1);
        assert_eq!(c.ctx.state(), ComponentState::Running);
    }
}

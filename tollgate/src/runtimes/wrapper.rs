use std::future::Future;

#[cfg(target_os = "linux")]
use monoio::IoUringDriver;
use monoio::{time::TimeDriver, LegacyDriver, Runtime, RuntimeBuilder};
use tollgate_core::config::{RuntimeConfig, RuntimeType};

/// io_uring's sqpoll kernel thread idle timeout floor; a value below
/// this wakes the poller often enough to defeat the point of sqpoll.
#[cfg(target_os = "linux")]
const MIN_SQPOLL_IDLE_TIME: u32 = 1000;

pub enum RuntimeWrapper {
    #[cfg(target_os = "linux")]
    IoUring(Runtime<TimeDriver<IoUringDriver>>),
    Legacy(Runtime<TimeDriver<LegacyDriver>>),
}

impl From<&RuntimeConfig> for RuntimeWrapper {
    fn from(config: &RuntimeConfig) -> Self {
        match config.runtime_type {
            #[cfg(target_os = "linux")]
            RuntimeType::IoUring => {
                let builder = match config.sqpoll_idle {
                    Some(idle) => {
                        let builder = RuntimeBuilder::<monoio::IoUringDriver>::new();
                        let idle = MIN_SQPOLL_IDLE_TIME.max(idle);
                        let mut uring_builder = io_uring::IoUring::builder();
                        uring_builder.setup_sqpoll(idle);
                        builder.uring_builder(&uring_builder)
                    }
                    None => RuntimeBuilder::<monoio::IoUringDriver>::new(),
                };
                let runtime = builder
                    .enable_timer()
                    .with_entries(config.entries)
                    .build()
                    .expect("failed to build io_uring runtime");
                RuntimeWrapper::IoUring(runtime)
            }
            RuntimeType::Legacy => {
                let runtime = RuntimeBuilder::<monoio::LegacyDriver>::new()
                    .enable_timer()
                    .with_entries(config.entries)
                    .build()
                    .expect("failed to build legacy runtime");
                RuntimeWrapper::Legacy(runtime)
            }
        }
    }
}

impl RuntimeWrapper {
    pub fn exec<F>(&mut self, future: F) -> F::Output
    where
        F: Future,
    {
        match self {
            #[cfg(target_os = "linux")]
            RuntimeWrapper::IoUring(driver) => driver.block_on(future),
            RuntimeWrapper::Legacy(driver) => driver.block_on(future),
        }
    }
}

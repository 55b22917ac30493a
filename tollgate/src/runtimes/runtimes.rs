use std::thread;

use anyhow::Result;
use futures::StreamExt;
use futures_channel::mpsc;
use monoio::utils::bind_to_cpu_set;
use tollgate_core::config::{Config as RawConfig, RuntimeConfig};
use tollgate_services::warehouse::Warehouse;
use tracing::{error, info, warn};

use super::RuntimeWrapper;

/// A message broadcast to every worker thread's [`Warehouse`] over an
/// unbounded `futures-channel` mpsc, the two messages a `Warehouse`
/// actually needs.
pub enum WorkerCommand {
 Reload(RawConfig),
 Shutdown,
}

/// The running worker-thread fleet: one OS thread per
/// `RuntimeConfig::worker_threads`, each with its own single-threaded
/// `monoio` runtime and its own `Warehouse` — `Rc`-based component
/// state can't cross threads, so each worker owns a complete,
/// independent copy of the running configuration.
pub struct Fleet {
 senders: Vec<mpsc::UnboundedSender<WorkerCommand>>,
 handles: Vec<thread::JoinHandle<()>>,
}

impl Fleet {
 /// Spawns the fleet and starts every worker's `Warehouse` from
 /// `config`. Returns once every worker has either started
 /// successfully or failed — a startup failure on any worker is
 /// surfaced to the caller (exit code 3).
 pub fn spawn(config: RawConfig) -> Result<Self> {
 let runtime_config = config.runtime.clone();
 let worker_count = runtime_config.worker_threads.max(1);

 info!(
 runtime = ?runtime_config.runtime_type,
 workers = worker_count,
 entries = runtime_config.entries,
 sqpoll_idle = ?runtime_config.sqpoll_idle,
 "starting tollgate worker fleet",
 );

 let mut senders = Vec::with_capacity(worker_count);
 let mut handles = Vec::with_capacity(worker_count);
 let mut startups = Vec::with_capacity(worker_count);

 for worker in 0..worker_count {
 let (sender, receiver) = mpsc::unbounded();
 let (started_tx, started_rx) = std::sync::mpsc::channel();
 let runtime_config = runtime_config.clone();
 let config = config.clone();

 let handle = thread::Builder::new()
 .name(format!("tollgate-worker-{worker}"))
 .spawn(move || {
 bind_cpu(&runtime_config, worker);
 let mut runtime = RuntimeWrapper::from(&runtime_config);
 runtime.exec(worker_main(worker, config, receiver, started_tx));
 })
 .expect("failed to spawn worker thread");

 senders.push(sender);
 handles.push(handle);
 startups.push(started_rx);
 }

 for (worker, started_rx) in startups.into_iter().enumerate() {
 match started_rx.recv() {
 Ok(Ok(())) => {}
 Ok(Err(e)) => anyhow::bail!("worker {worker} failed to start: {e}"),
 Err(_) => anyhow::bail!("worker {worker} exited before starting"),
 }
 }

 Ok(Fleet { senders, handles })
 }

 /// Broadcasts a reload to every worker. A worker's `Warehouse`
 /// reload failure is logged there and doesn't stop the broadcast to
 /// the rest — a reload that fails validation is logged and the
 /// fleet keeps running on its previous configuration, worker by
 /// worker.
 pub fn broadcast_reload(&self, config: RawConfig) {
 for sender in &self.senders {
 if sender.unbounded_send(WorkerCommand::Reload(config.clone())).is_err() {
 warn!("worker channel closed, dropping reload");
 }
 }
 }

 pub fn shutdown(&self) {
 for sender in &self.senders {
 let _ = sender.unbounded_send(WorkerCommand::Shutdown);
 }
 }

 /// Waits for every worker thread to exit. Used for both a graceful
 /// shutdown (after [`Fleet::shutdown`]) and an immediate abort
 /// (its second-`SIGINT`-within-5s case just drops the process
 /// instead of calling this).
 pub fn join(self) {
 for handle in self.handles {
 let _ = handle.join();
 }
 }
}

fn bind_cpu(config: &RuntimeConfig, worker: usize) {
 if !config.cpu_affinity {
 return;
 }
 let cpu_count = std::thread::available_parallelism()
 .map(|n| n.get())
 .unwrap_or(1);
 if let Err(e) = bind_to_cpu_set(vec![worker % cpu_count]) {
 warn!("failed to pin worker {worker} to a cpu: {e}");
 }
}

async fn worker_main(
 worker: usize,
 initial_config: RawConfig,
 mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
 started: std::sync::mpsc::Sender<Result<(), anyhow::Error>>,
) {
 let warehouse = Warehouse::new();
 match warehouse.start(initial_config).await {
 Ok(()) => {
 let _ = started.send(Ok(()));
 }
 Err(e) => {
 let _ = started.send(Err(e.into()));
 return;
 }
 }

 while let Some(command) = commands.next().await {
 match command {
 WorkerCommand::Reload(config) => {
 if let Err(e) = warehouse.reload(config).await {
 error!(worker, "reload failed: {e}");
 }
 }
 WorkerCommand::Shutdown => break,
 }
 }

 if let Err(e) = warehouse.stop().await {
 error!(worker, "shutdown failed: {e}");
 }
}

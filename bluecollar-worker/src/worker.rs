use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bluecollar_broker::{Broker, BrokerError};
use bluecollar_core::{Envelope, ErrorRecord, Reply};
use bluecollar_registry::{InstancePolicy, Registry, Resolved};
use tokio::task::JoinHandle;

use crate::cache::{ExecutableCache, InstanceCache};
use crate::config::WorkerConfig;
use crate::executor::{execute, Dispatch};

/// How the worker loop ended — `main()` turns this into a process exit code
/// (§4.3 "Fatal conditions").
#[derive(Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// Removed from the roster, or received a termination signal; drained
    /// in-flight executors and exited cleanly.
    Clean,
    /// Lost the broker connection; exits after a 5s delay so a process
    /// supervisor doesn't tight-loop restart.
    BrokerLost,
}

/// A running worker: the registry it dispatches against, its broker
/// connection, and its two caches.
pub struct Worker {
    registry: Arc<Registry>,
    broker: Arc<dyn Broker>,
    config: WorkerConfig,
    executable_cache: ExecutableCache,
    instance_cache: InstanceCache,
    in_flight: Vec<JoinHandle<()>>,
    terminating: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(registry: Arc<Registry>, broker: Arc<dyn Broker>, config: WorkerConfig) -> Self {
        Self {
            registry,
            broker,
            config,
            executable_cache: ExecutableCache::new(),
            instance_cache: InstanceCache::new(),
            in_flight: Vec::new(),
            terminating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the background task that flips `terminating` on SIGTERM. Call
    /// once, before [`Self::run`].
    #[cfg(unix)]
    pub fn install_signal_handler(&self) {
        let terminating = self.terminating.clone();
        tokio::spawn(async move {
            if let Ok(mut sigterm) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            {
                sigterm.recv().await;
                tracing::info!("received SIGTERM, shutting down");
                terminating.store(true, Ordering::SeqCst);
            }
        });
    }

    #[cfg(not(unix))]
    pub fn install_signal_handler(&self) {
        let terminating = self.terminating.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                terminating.store(true, Ordering::SeqCst);
            }
        });
    }

    /// Run the state machine described in §4.3 until roster removal, a
    /// termination signal, or broker loss.
    pub async fn run(&mut self) -> WorkerExit {
        if let Err(err) = self
            .broker
            .set_add(&self.config.queues.worker_list, &self.config.worker_id)
            .await
        {
            tracing::error!(%err, "could not register in worker roster");
            return self.fatal_exit().await;
        }
        tracing::info!(worker_id = %self.config.worker_id, "registered in worker roster");

        loop {
            if self.terminating.load(Ordering::SeqCst) {
                self.deregister().await;
                break;
            }

            match self
                .broker
                .set_contains(&self.config.queues.worker_list, &self.config.worker_id)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!("removed from worker roster, draining");
                    break;
                }
                Err(err) => {
                    tracing::error!(%err, "broker connection lost polling roster");
                    return self.fatal_exit().await;
                }
            }

            self.reap();
            tokio::task::yield_now().await;

            let popped = self
                .broker
                .blocking_pop(&self.config.queues.work_queue, self.config.poll_timeout)
                .await;
            let bytes = match popped {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(BrokerError::ConnectionLost(msg)) => {
                    tracing::error!(error = %msg, "broker connection lost dequeuing");
                    return self.fatal_exit().await;
                }
                Err(err) => {
                    tracing::warn!(%err, "dequeue command failed");
                    continue;
                }
            };

            let envelope = match Envelope::decode(&bytes) {
                Ok(envelope) => envelope,
                Err(err) => {
                    tracing::warn!(%err, "dropping undecodable envelope");
                    continue;
                }
            };

            self.handle_envelope(envelope).await;
        }

        self.join_in_flight().await;
        WorkerExit::Clean
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        let resolved = self
            .executable_cache
            .resolve(&self.registry, &envelope.method);

        let dispatch = match resolved {
            Ok(Resolved::Function(f)) => Dispatch::Function(f),
            Ok(Resolved::Method {
                type_path,
                type_entry,
                method,
            }) => {
                let instance = match type_entry.policy {
                    InstancePolicy::Singleton => self
                        .instance_cache
                        .get_or_construct(&type_path, || type_entry.construct()),
                    InstancePolicy::PerCall => type_entry.construct(),
                };
                Dispatch::Method {
                    type_entry,
                    instance,
                    method,
                }
            }
            Err(err) => {
                tracing::warn!(method = %envelope.method, %err, "unresolved method");
                self.reply(envelope.reply_channel.as_deref(), Reply::error(ErrorRecord::not_found(&envelope.method)))
                    .await;
                return;
            }
        };

        if envelope.no_exec {
            self.reply(
                envelope.reply_channel.as_deref(),
                Reply::presence(envelope.method.clone()),
            )
            .await;
            return;
        }

        self.spawn_executor(dispatch, envelope);
    }

    fn spawn_executor(&mut self, dispatch: Dispatch, envelope: Envelope) {
        let broker = self.broker.clone();
        let reply_ttl = self.config.reply_ttl;
        let reply_channel = envelope.reply_channel;
        let handle = tokio::spawn(async move {
            let result = execute(dispatch, envelope.args, envelope.kwargs).await;
            let reply = match result {
                Ok(value) => Reply::ok(value),
                Err(message) => {
                    tracing::error!(%message, "callable raised");
                    Reply::error(ErrorRecord::new(message, 500))
                }
            };
            if let Some(channel) = reply_channel {
                let bytes = reply.to_bytes();
                if let Err(err) = broker.push_with_expiry(&channel, bytes, reply_ttl).await {
                    tracing::warn!(%err, "broker connection lost pushing reply; dropping");
                }
            }
        });
        self.in_flight.push(handle);
    }

    async fn reply(&self, channel: Option<&str>, reply: Reply) {
        let Some(channel) = channel else { return };
        if let Err(err) = self
            .broker
            .push_with_expiry(channel, reply.to_bytes(), self.config.reply_ttl)
            .await
        {
            tracing::warn!(%err, "broker connection lost pushing reply; dropping");
        }
    }

    fn reap(&mut self) {
        self.in_flight.retain(|handle| !handle.is_finished());
    }

    async fn join_in_flight(&mut self) {
        for handle in self.in_flight.drain(..) {
            let _ = handle.await;
        }
    }

    async fn deregister(&self) {
        if let Err(err) = self
            .broker
            .set_remove(&self.config.queues.worker_list, &self.config.worker_id)
            .await
        {
            tracing::warn!(%err, "failed to remove self from worker roster on shutdown");
        }
    }

    async fn fatal_exit(&mut self) -> WorkerExit {
        tokio::time::sleep(Duration::from_secs(5)).await;
        WorkerExit::BrokerLost
    }
}

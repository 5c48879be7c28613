use std::{collections::VecDeque, time::Duration};

use chrono::Utc;
use js5watch_client::Transport;
use js5watch_proto::{js5::BASELINE_REVISION, ResetRecord, Revision};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{EndpointSet, LastReset, ResetStore};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay between pings of the primary, and between reconnect attempts
    pub probe_interval: Duration,
    /// Revision the first handshake offers
    pub baseline_revision: Revision,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(5),
            baseline_revision: BASELINE_REVISION,
        }
    }
}

/// What the monitor will do on its next step
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// Loading the last reset from the store
    Initializing,
    /// (Re)establishing connections to every endpoint
    Reconnecting,
    /// Pinging the primary
    Probing,
    /// The primary stopped answering; asking the redundant endpoints whether the whole cluster did
    Verifying,
}

/// Watches an [`EndpointSet`] for cluster resets.
///
/// Runs forever: every failure, whether of the network or of the store, is retried after the probe interval.
pub struct ResetMonitor<T, S> {
    endpoints: EndpointSet<T>,
    store: S,
    last_reset: LastReset,
    config: MonitorConfig,
    state: State,
    /// Sticky across reconnects; only ever raised
    revision: Revision,
    /// Published records the store hasn't accepted yet, oldest first
    unpersisted: VecDeque<ResetRecord>,
}

impl<T: Transport, S: ResetStore> ResetMonitor<T, S> {
    pub fn new(
        endpoints: EndpointSet<T>,
        store: S,
        last_reset: LastReset,
        config: MonitorConfig,
    ) -> Self {
        Self {
            endpoints,
            store,
            last_reset,
            revision: config.baseline_revision,
            config,
            state: State::Initializing,
            unpersisted: VecDeque::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Number of records waiting for the store to come back
    pub fn unpersisted(&self) -> usize {
        self.unpersisted.len()
    }

    /// Step until `cancel` fires, then make a last attempt to store queued resets
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            endpoints = ?self.endpoints.addresses().collect::<Vec<_>>(),
            interval_secs = self.config.probe_interval.as_secs_f64(),
            "reset monitor started"
        );
        loop {
            let delay = tokio::select! {
                _ = cancel.cancelled() => break,
                delay = self.advance() => delay,
            };
            // Outside the select: an abandoned insert may still land and must not stay queued
            self.persist().await;
            if let Some(delay) = delay {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        self.endpoints.close_all();
        if !self.unpersisted.is_empty() {
            let flushed = tokio::time::timeout(self.config.probe_interval, self.persist()).await;
            if flushed.is_err() || !self.unpersisted.is_empty() {
                warn!(
                    pending = self.unpersisted.len(),
                    "resets lost on shutdown, store unavailable"
                );
            }
        }
        info!("reset monitor stopped");
    }

    /// Execute the current state and store any queued resets.
    ///
    /// Returns how long to wait before the next step.
    pub async fn step(&mut self) -> Option<Duration> {
        let delay = self.advance().await;
        self.persist().await;
        delay
    }

    async fn advance(&mut self) -> Option<Duration> {
        match self.state {
            State::Initializing => self.initialize().await,
            State::Reconnecting => self.reconnect().await,
            State::Probing => self.probe().await,
            State::Verifying => self.verify().await,
        }
    }

    async fn initialize(&mut self) -> Option<Duration> {
        let record = match self.store.last_reset().await {
            Ok(Some(record)) => {
                info!(
                    reset_time = %record.reset_time,
                    uptime_seconds = record.uptime_seconds,
                    "loaded last reset"
                );
                record
            }
            Ok(None) => {
                info!("no reset on record, starting history now");
                let record = ResetRecord::first(Utc::now());
                self.unpersisted.push_back(record.clone());
                record
            }
            Err(e) => {
                warn!(error = %e, "failed to load last reset, retrying");
                return Some(self.config.probe_interval);
            }
        };
        self.last_reset.publish(record);
        self.state = State::Reconnecting;
        None
    }

    async fn reconnect(&mut self) -> Option<Duration> {
        match self.endpoints.connect_all(self.revision).await {
            Ok(revision) => {
                self.revision = self.revision.max(revision);
                info!(revision = self.revision, "connected");
                self.state = State::Probing;
                None
            }
            Err(e) => {
                warn!(error = %e, kind = ?e.source.kind(), "unable to connect, retrying");
                Some(self.config.probe_interval)
            }
        }
    }

    async fn probe(&mut self) -> Option<Duration> {
        match self.endpoints.ping_primary().await {
            Ok(response) => {
                debug!(bytes = response.len(), "primary alive");
                Some(self.config.probe_interval)
            }
            Err(e) => {
                info!(
                    endpoint = self.endpoints.primary_address(),
                    kind = ?e.kind(),
                    error = %e,
                    "primary connection broken"
                );
                self.state = State::Verifying;
                None
            }
        }
    }

    async fn verify(&mut self) -> Option<Duration> {
        if self.endpoints.any_redundant_alive().await {
            info!("other endpoints still answering, reconnecting without recording a reset");
        } else {
            let now = Utc::now();
            let record = match self.last_reset.get() {
                Some(previous) => previous.following(now),
                None => ResetRecord::first(now),
            };
            info!(
                reset_time = %record.reset_time,
                uptime_seconds = record.uptime_seconds,
                "reset confirmed"
            );
            self.last_reset.publish(record.clone());
            self.unpersisted.push_back(record);
        }
        self.endpoints.close_all();
        self.state = State::Reconnecting;
        Some(self.config.probe_interval)
    }

    /// Hand queued records to the store, oldest first, stopping at the first failure.
    ///
    /// A record leaves the queue only once the store has acknowledged it.
    async fn persist(&mut self) {
        while let Some(record) = self.unpersisted.front() {
            if let Err(e) = self.store.insert_reset(record).await {
                warn!(
                    error = %e,
                    pending = self.unpersisted.len(),
                    "failed to persist reset, will retry"
                );
                return;
            }
            self.unpersisted.pop_front();
        }
    }
}

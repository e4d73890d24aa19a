//! Multi-viewer synchronization of the manual fog layer.
//!
//! Every local change publishes the full area list and settings tagged
//! with the sender's client id. Receivers replace their own layer
//! wholesale with whatever arrives last, skipping their own echoes.
//! There is no merge: concurrent edits race and the last snapshot wins.

use crossbeam::channel::Receiver;
use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use crate::engine::FogEngine;
use crate::error::FogError;
use crate::events::FogEvent;
use crate::types::SyncSnapshot;

/// Session-scoped publish side of a pub/sub transport.
pub trait FogChannel {
    fn publish(&self, snapshot: &SyncSnapshot) -> Result<(), FogError>;
}

/// In-process session channel carrying JSON-encoded snapshots.
#[derive(Debug, Clone)]
pub struct SessionBus {
    session_id: String,
    tx: broadcast::Sender<String>,
}

impl SessionBus {
    pub fn new(session_id: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            session_id: session_id.into(),
            tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl FogChannel for SessionBus {
    fn publish(&self, snapshot: &SyncSnapshot) -> Result<(), FogError> {
        let json = serde_json::to_string(snapshot)?;
        if self.tx.send(json).is_err() {
            debug!(
                "session {}: snapshot dropped, no listeners",
                self.session_id
            );
        }
        Ok(())
    }
}

/// Sync adapter bound to one engine and one client identity.
pub struct FogSync<C: FogChannel> {
    client_id: String,
    channel: C,
    changes: Receiver<FogEvent>,
}

impl<C: FogChannel> FogSync<C> {
    /// Subscribe to the engine's change events and bind to `channel`.
    pub fn attach(
        engine: &mut FogEngine,
        client_id: impl Into<String>,
        channel: C,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            channel,
            changes: engine.subscribe(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn snapshot(&self, engine: &FogEngine) -> SyncSnapshot {
        SyncSnapshot {
            visible_areas: engine.areas().to_vec(),
            fog_settings: engine.settings().clone(),
            updated_by: self.client_id.clone(),
        }
    }

    /// Publish the current state unconditionally.
    pub fn publish(&self, engine: &FogEngine) -> Result<(), FogError> {
        self.changes.try_iter().for_each(drop);
        let snapshot = self.snapshot(engine);
        self.channel.publish(&snapshot).map_err(|e| {
            warn!("fog publish from {} failed: {e}", self.client_id);
            e
        })
    }

    /// Publish once if the engine changed since the last publish or
    /// receive. Returns whether a snapshot was sent.
    pub fn flush(&self, engine: &FogEngine) -> Result<bool, FogError> {
        if self.changes.try_iter().count() == 0 {
            return Ok(false);
        }
        self.publish(engine)?;
        Ok(true)
    }

    /// Apply a remote snapshot unless it originated here. Returns
    /// whether it was applied.
    ///
    /// The change event the apply produces is consumed so the remote
    /// state is not republished by the next `flush`.
    pub fn receive(
        &self,
        engine: &mut FogEngine,
        snapshot: SyncSnapshot,
    ) -> bool {
        if snapshot.updated_by == self.client_id {
            debug!("{}: ignoring own fog snapshot", self.client_id);
            return false;
        }
        debug!(
            "{}: applying fog snapshot from {} ({} areas)",
            self.client_id,
            snapshot.updated_by,
            snapshot.visible_areas.len()
        );
        engine.apply_remote(snapshot.visible_areas, snapshot.fog_settings);
        self.changes.try_iter().for_each(drop);
        true
    }

    /// Decode and apply a wire payload. Malformed payloads leave the
    /// engine untouched.
    pub fn receive_json(
        &self,
        engine: &mut FogEngine,
        json: &str,
    ) -> Result<bool, FogError> {
        let snapshot: SyncSnapshot = serde_json::from_str(json).map_err(|e| {
            warn!("{}: malformed fog snapshot: {e}", self.client_id);
            e
        })?;
        Ok(self.receive(engine, snapshot))
    }

    /// Apply everything currently queued on a bus receiver. Returns the
    /// number of snapshots applied.
    pub fn drain(
        &self,
        engine: &mut FogEngine,
        rx: &mut broadcast::Receiver<String>,
    ) -> Result<usize, FogError> {
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(json) => {
                    if self.receive_json(engine, &json)? {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(
                        "{}: fog receiver lagged, {skipped} snapshots skipped",
                        self.client_id
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        Ok(applied)
    }
}

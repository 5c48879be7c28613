//! Scripted stand-ins for JS5 endpoints and the reset store

use std::{
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use js5watch_client::{Error, Transport};
use js5watch_proto::{ResetRecord, Revision};

#[derive(Default)]
struct PeerState {
    up: bool,
    accepted: Revision,
    connected: bool,
    connects: usize,
    pings: usize,
    offered: Vec<Revision>,
}

/// A JS5 server whose availability the test controls
#[derive(Clone)]
pub struct Peer(Arc<Mutex<PeerState>>);

impl Peer {
    pub fn new(accepted: Revision) -> Self {
        Self(Arc::new(Mutex::new(PeerState {
            up: true,
            accepted,
            ..PeerState::default()
        })))
    }

    /// Take the server down or bring it back. Going down drops established connections.
    pub fn set_up(&self, up: bool) {
        let mut state = self.0.lock().unwrap();
        state.up = up;
        if !up {
            state.connected = false;
        }
    }

    /// Drop the established connection while staying up
    pub fn sever(&self) {
        self.0.lock().unwrap().connected = false;
    }

    /// Whether a ping on the current connection would be answered
    pub fn is_answering(&self) -> bool {
        let state = self.0.lock().unwrap();
        state.up && state.connected
    }

    pub fn connects(&self) -> usize {
        self.0.lock().unwrap().connects
    }

    pub fn pings(&self) -> usize {
        self.0.lock().unwrap().pings
    }

    /// Revisions offered by each `connect`, in order
    pub fn offered(&self) -> Vec<Revision> {
        self.0.lock().unwrap().offered.clone()
    }

    pub fn transport(&self, address: &str) -> FakeTransport {
        FakeTransport {
            address: address.into(),
            peer: self.clone(),
        }
    }
}

pub struct FakeTransport {
    address: String,
    peer: Peer,
}

#[async_trait]
impl Transport for FakeTransport {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&mut self, revision: Revision) -> Result<Revision, Error> {
        let mut state = self.peer.0.lock().unwrap();
        state.offered.push(revision);
        if !state.up {
            state.connected = false;
            return Err(Error::Connect(io::ErrorKind::ConnectionRefused.into()));
        }
        state.connects += 1;
        state.connected = true;
        Ok(revision.max(state.accepted))
    }

    async fn ping(&mut self) -> Result<Vec<u8>, Error> {
        let mut state = self.peer.0.lock().unwrap();
        state.pings += 1;
        if state.up && state.connected {
            Ok(vec![0; 8])
        } else {
            Err(Error::Liveness(io::ErrorKind::UnexpectedEof.into()))
        }
    }

    fn close(&mut self) {
        self.peer.0.lock().unwrap().connected = false;
    }
}

#[derive(Debug, thiserror::Error)]
#[error("store offline")]
pub struct Offline;

#[derive(Default)]
struct StoreState {
    records: Vec<ResetRecord>,
    offline: bool,
}

/// Reset history kept in memory, optionally refusing every call
#[derive(Clone, Default)]
pub struct MemoryStore(Arc<Mutex<StoreState>>);

impl MemoryStore {
    pub fn with(records: Vec<ResetRecord>) -> Self {
        Self(Arc::new(Mutex::new(StoreState {
            records,
            offline: false,
        })))
    }

    pub fn set_offline(&self, offline: bool) {
        self.0.lock().unwrap().offline = offline;
    }

    pub fn records(&self) -> Vec<ResetRecord> {
        self.0.lock().unwrap().records.clone()
    }
}

#[async_trait]
impl crate::ResetStore for MemoryStore {
    type Error = Offline;

    async fn last_reset(&self) -> Result<Option<ResetRecord>, Offline> {
        let state = self.0.lock().unwrap();
        if state.offline {
            return Err(Offline);
        }
        Ok(state.records.last().cloned())
    }

    async fn insert_reset(&self, record: &ResetRecord) -> Result<(), Offline> {
        let mut state = self.0.lock().unwrap();
        if state.offline {
            return Err(Offline);
        }
        state.records.push(record.clone());
        Ok(())
    }
}

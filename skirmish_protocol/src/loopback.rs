// In-process loopback transport.
//
// A `LoopbackHub` is a shared routing table; each `LoopbackEndpoint` hosts one
// or more peers and owns an `mpsc` inbox. Sending looks up the destination's
// inbox in the table and pushes the payload there, so delivery is ordered per
// sender and never lost while both ends are connected.
//
// Disconnection (explicit via `disconnect()`, or implicit on drop) removes the
// endpoint's routes and tells every other endpoint, once per departed peer,
// with `TransportEvent::Disconnected`. Sends addressed to a departed peer fail
// with `TransportError::Disconnected`, which callers may treat as benign.
//
// Used by `multiplayer_tests` to run several full coordinators in one test,
// and usable for hot-seat play where every player shares a process.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::transport::{Transport, TransportError, TransportEvent};
use crate::types::PeerId;

struct Route {
    endpoint: u32,
    inbox: Sender<TransportEvent>,
}

#[derive(Default)]
struct HubState {
    routes: BTreeMap<PeerId, Route>,
    departed: BTreeSet<PeerId>,
    next_endpoint: u32,
}

/// Shared routing table. Clone freely; clones refer to the same hub.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an endpoint hosting `peers`. Each peer may be hosted once.
    pub fn endpoint(&self, peers: &[PeerId]) -> Result<LoopbackEndpoint, TransportError> {
        let mut state = self.lock();
        let mut local: Vec<PeerId> = peers.to_vec();
        local.sort();
        local.dedup();
        if let Some(&taken) = local
            .iter()
            .find(|p| state.routes.contains_key(p) || state.departed.contains(p))
        {
            return Err(TransportError::AlreadyHosted(taken));
        }

        let endpoint = state.next_endpoint;
        state.next_endpoint += 1;
        let (sender, inbox) = mpsc::channel();
        for &peer in &local {
            state.routes.insert(
                peer,
                Route {
                    endpoint,
                    inbox: sender.clone(),
                },
            );
        }
        drop(state);

        Ok(LoopbackEndpoint {
            hub: self.clone(),
            id: endpoint,
            local,
            inbox,
            connected: true,
        })
    }
}

/// One process-local participant in a `LoopbackHub` session.
pub struct LoopbackEndpoint {
    hub: LoopbackHub,
    id: u32,
    local: Vec<PeerId>,
    inbox: Receiver<TransportEvent>,
    connected: bool,
}

impl LoopbackEndpoint {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Leave the session. Every other endpoint receives one `Disconnected`
    /// event per peer hosted here. Idempotent.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        let mut state = self.hub.lock();
        for peer in &self.local {
            state.routes.remove(peer);
            state.departed.insert(*peer);
        }
        let mut notified = BTreeSet::new();
        for route in state.routes.values() {
            if route.endpoint == self.id || !notified.insert(route.endpoint) {
                continue;
            }
            for &peer in &self.local {
                // A dropped receiver just means that endpoint is gone too.
                let _ = route.inbox.send(TransportEvent::Disconnected { peer });
            }
        }
        debug!(endpoint = self.id, peers = ?self.local, "loopback endpoint disconnected");
    }
}

impl Transport for LoopbackEndpoint {
    fn local_peers(&self) -> &[PeerId] {
        &self.local
    }

    fn send(&mut self, from: PeerId, to: PeerId, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.local.contains(&from) {
            return Err(TransportError::NotLocal(from));
        }
        if !self.connected {
            return Err(TransportError::Disconnected(from));
        }
        let state = self.hub.lock();
        match state.routes.get(&to) {
            Some(route) => route
                .inbox
                .send(TransportEvent::Message { from, to, payload })
                .map_err(|_| TransportError::Disconnected(to)),
            None if state.departed.contains(&to) => Err(TransportError::Disconnected(to)),
            None => Err(TransportError::UnknownPeer(to)),
        }
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let events: Vec<TransportEvent> = self.inbox.try_iter().collect();
        if self.connected { events } else { Vec::new() }
    }
}

impl Drop for LoopbackEndpoint {
    fn drop(&mut self) {
        self.disconnect();
    }
}

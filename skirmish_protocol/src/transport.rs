// The `Transport` trait: what the coordinator needs from a network.
//
// Several peers may live behind one transport endpoint (hot-seat play on one
// machine). `local_peers()` reports them; anything else reachable through
// `send` is remote. Delivery must be ordered per sender and eventually
// complete. `poll()` drains everything that arrived since the last call and
// never blocks.
//
// See also: `loopback.rs` for the in-process implementation,
// `skirmish_sim::coordinator` for the only consumer.

use crate::types::PeerId;

/// Something that happened on the transport since the last `poll()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// An opaque payload sent by `from`, addressed to the local peer `to`.
    Message {
        from: PeerId,
        to: PeerId,
        payload: Vec<u8>,
    },
    /// A remote peer left the session. Reported once per departed peer.
    Disconnected { peer: PeerId },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{0} is not part of this session")]
    UnknownPeer(PeerId),
    #[error("{0} has disconnected")]
    Disconnected(PeerId),
    #[error("{0} is not hosted on this endpoint")]
    NotLocal(PeerId),
    #[error("{0} is already hosted by another endpoint")]
    AlreadyHosted(PeerId),
}

pub trait Transport {
    /// Peers hosted by this endpoint, in ascending order.
    fn local_peers(&self) -> &[PeerId];

    /// Queue `payload` for delivery from local peer `from` to `to`.
    fn send(&mut self, from: PeerId, to: PeerId, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Drain every event received since the previous call.
    fn poll(&mut self) -> Vec<TransportEvent>;
}

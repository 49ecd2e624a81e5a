// skirmish_protocol — the transport seam between lockstep peers.
//
// The sim crate never talks to sockets. It hands opaque byte payloads to a
// `Transport` and drains whatever arrived since the last tick. This crate
// defines that seam and ships one implementation, an in-process loopback
// hub used by tests and by local hot-seat play.
//
// Module overview:
// - `types.rs`:     `PeerId`, the transport-level participant identity.
// - `transport.rs`: The `Transport` trait, `TransportEvent`, `TransportError`.
// - `loopback.rs`:  `LoopbackHub` / `LoopbackEndpoint`, an ordered
//                   `mpsc`-backed transport for peers in one process.
//
// Design decisions:
// - **Payloads are opaque `Vec<u8>`.** The command codec lives in the sim
//   crate (`skirmish_sim::wire`); this crate has no dependency on the sim.
// - **Ordered, reliable delivery is assumed.** Datagram loss and reordering
//   belong to a real network transport, which would sit behind the same
//   trait.
// - **No async runtime.** `poll()` is a non-blocking drain called once per
//   game tick.

pub mod loopback;
pub mod transport;
pub mod types;

pub use loopback::{LoopbackEndpoint, LoopbackHub};
pub use transport::{Transport, TransportError, TransportEvent};
pub use types::PeerId;

// Core ID types for the transport seam.
//
// `PeerId` names one participant as the transport sees it. The sim maps its
// own `PlayerId` onto a `PeerId` one-to-one (both are small dense indices),
// so the protocol crate never needs to know what a player is.

use std::fmt;

/// Transport-level identity of one participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u8);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

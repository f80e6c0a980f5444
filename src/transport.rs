//! Event ingestion: a UDP listener and a polled event file both feed one
//! [`EventSlot`]. The producer side ([`InfobarNotifier`]) writes both.

pub mod file;
pub mod notify;
pub mod slot;
pub mod udp;

pub use file::FileWatcher;
pub use notify::{InfobarNotifier, NowPlaying};
pub use slot::{AcceptedEvent, EventSlot};
pub use udp::UdpListener;

/// Largest datagram accepted on the wire.
pub const MAX_DATAGRAM_BYTES: usize = 65_535;

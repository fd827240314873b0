//! loadpair-services — the node runtime: port allocation, the peer link,
//! discovery, traffic generation, queue counters and snapshot broadcast.

pub mod broadcaster;
pub mod discovery;
pub mod link;
pub mod node;
pub mod peer;
pub mod port;
pub mod queue;
pub mod traffic;

pub use broadcaster::{Emit, StateBroadcaster};
pub use discovery::{DiscoveryState, PeerDiscovery};
pub use link::{LinkError, LinkListener, LinkTimeouts};
pub use node::{Node, NodeHandle, NodeIdentity};
pub use peer::PeerBinding;
pub use port::find_free_port;
pub use queue::QueueStore;
pub use traffic::{Schedule, TrafficGenerator};

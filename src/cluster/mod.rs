//! Cluster layout, liveness, wire protocol, and message routing
pub mod bus;
pub mod consistent_hashing;
pub mod membership;
pub mod messages;
pub mod node_name;
pub mod router;
pub mod topology;

pub use bus::{LocalBus, LocalHub, MessageBus, UdpBus};
pub use membership::{Membership, NodeInfo, NodeStatus};
pub use messages::{ClusterMessage, ClusterPacket, MAX_SYNC_BYTES, SYNC_BATCH_SIZE};
pub use node_name::NodeName;
pub use router::{Destination, Router, RoutingKey, DEFAULT_ROUTING_KEY};
pub use topology::{NodeRole, PeerSpec, Topology};

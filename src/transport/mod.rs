//! Socket plumbing shared by the cluster bus and the store service.
//!
//! UDP carries fire-and-forget cluster packets between named peers.
//! TCP carries length-prefixed request/response frames for store calls.
pub mod receiver;
pub mod socket_pool;
pub mod socket_pool_tcp;
pub mod tcp_receiver;

pub use receiver::{FrozenReceiverStats, ReceiverStats, UdpReceiver};
pub use socket_pool::{FrozenSocketPoolStats, SocketPoolStats, UdpSocketPool};
pub use socket_pool_tcp::{TcpSocketPool, TcpSocketPoolStats};
pub use tcp_receiver::{TcpReceiver, TcpRequest};

pub mod api;
pub mod cli;
pub mod cluster;
pub mod connection;
pub mod error;
pub mod expiring_map;
pub mod filter;
pub mod host_record;
pub mod node;
pub mod resolver;
pub mod settings;
pub mod sink;
pub mod store;
pub mod transport;

//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub const CONNECTIONS: &str = "/connections";
pub const KNOWN_HOSTS: &str = "/known-hosts";
pub const STATUS: &str = "/status";
pub const EXPIRE_KEYS: &str = "/expire-keys";

//! Connection notifications from the traffic tracker
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpState {
    Inactive,
    SynSent,
    SynAckSent,
    Partial,
    Established,
    Closed,
    Reset,
}

/// One tracked TCP connection, originator and responder endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub orig_h: IpAddr,
    pub orig_p: u16,
    pub resp_h: IpAddr,
    pub resp_p: u16,
    pub orig_state: TcpState,
    pub resp_state: TcpState,
}

impl ConnectionEvent {
    pub fn established(orig_h: IpAddr, orig_p: u16, resp_h: IpAddr, resp_p: u16) -> Self {
        Self {
            orig_h,
            orig_p,
            resp_h,
            resp_p,
            orig_state: TcpState::Established,
            resp_state: TcpState::Established,
        }
    }

    /// Both sides finished the handshake
    pub fn is_established(&self) -> bool {
        self.orig_state == TcpState::Established && self.resp_state == TcpState::Established
    }

    /// Distinct endpoint addresses, originator first
    pub fn endpoints(&self) -> Vec<IpAddr> {
        if self.orig_h == self.resp_h {
            vec![self.orig_h]
        } else {
            vec![self.orig_h, self.resp_h]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_open_connection_is_not_established() {
        let mut event = ConnectionEvent::established(
            "10.0.0.5".parse().unwrap(),
            51000,
            "10.0.0.6".parse().unwrap(),
            443,
        );
        assert!(event.is_established());
        event.resp_state = TcpState::SynAckSent;
        assert!(!event.is_established());
    }

    #[test]
    fn test_endpoints_are_distinct() {
        let host: IpAddr = "127.0.0.1".parse().unwrap();
        let event = ConnectionEvent::established(host, 1, host, 2);
        assert_eq!(event.endpoints(), vec![host]);
    }

    #[test]
    fn test_json_shape() {
        let event: ConnectionEvent = serde_json::from_str(
            r#"{"orig_h":"10.0.0.5","orig_p":51000,"resp_h":"10.0.0.6","resp_p":22,
                "orig_state":"established","resp_state":"established"}"#,
        )
        .unwrap();
        assert!(event.is_established());
        assert_eq!(event.resp_p, 22);
    }
}

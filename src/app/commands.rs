//! Inbound commands.
//!
//! - [`RemoteCommand`] arrives on the broker's command channel.  Only one
//!   exists; anything that does not match it exactly (topic and payload,
//!   byte for byte) parses to `None` and must leave the node's state
//!   untouched.
//! - [`ConsoleCommand`] arrives as a line on the serial console and is the
//!   fallback way to get network credentials onto a node that has none:
//!
//! ```text
//!   WIFI <ssid>,<secret>   store (or update) a network profile
//!   WIFI FORGET            erase every stored profile
//! ```

use super::ports::InboundMessage;
use crate::credentials::CredentialProfile;

/// Commands the remote operator can send to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Authorize queue draining for this boot (or connection, per scope).
    Start,
}

impl RemoteCommand {
    /// Interpret an inbound message.  No trimming, no case folding.
    pub fn parse(msg: &InboundMessage, command_topic: &str, start_token: &str) -> Option<Self> {
        if msg.topic.as_str() != command_topic {
            return None;
        }
        if msg.payload.as_slice() == start_token.as_bytes() {
            Some(Self::Start)
        } else {
            None
        }
    }
}

/// Commands typed on the serial console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Provision(CredentialProfile),
    ForgetNetworks,
}

impl ConsoleCommand {
    /// Parse one console line (without its terminator).  The verb is
    /// case-insensitive; the first comma separates name from secret, so
    /// the secret may itself contain commas.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let line = core::str::from_utf8(line).ok()?.trim_end_matches('\r');
        let (verb, rest) = line.split_once(' ')?;
        if !verb.eq_ignore_ascii_case("WIFI") {
            return None;
        }
        if rest.eq_ignore_ascii_case("FORGET") {
            return Some(Self::ForgetNetworks);
        }
        let (name, secret) = rest.split_once(',')?;
        if name.is_empty() {
            return None;
        }
        CredentialProfile::new(name, secret).ok().map(Self::Provision)
    }
}

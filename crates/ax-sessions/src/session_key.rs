//! Session key computation.
//!
//! Maps inbound channel metadata to a canonical `SessionId`. The richer
//! DM/group/thread routing rules collapse into the `scope` segment of the
//! `agent:channel:scope[:thread]` grammar — inner separators use `-` so the
//! result always parses as a valid persistent session ID.

use ax_domain::config::{DmScope, InboundMetadata};

use crate::id::SessionId;

pub fn compute_session_key(agent_id: &str, dm_scope: DmScope, meta: &InboundMetadata) -> SessionId {
    let channel = meta.channel.as_deref().unwrap_or("default");

    let scope = if meta.is_direct {
        let peer = meta.peer_id.as_deref().unwrap_or("unknown");
        match dm_scope {
            DmScope::Main => "main".to_string(),
            DmScope::PerPeer => format!("dm-{peer}"),
            DmScope::PerChannelPeer => format!("dm-{peer}"),
            DmScope::PerAccountChannelPeer => {
                let acct = meta.account_id.as_deref().unwrap_or("default");
                format!("dm-{acct}-{peer}")
            }
        }
    } else {
        compute_group_scope(meta)
    };

    SessionId::compose(agent_id, channel, &scope, meta.thread_id.as_deref())
        .expect("scope segments built from sanitized metadata must be valid")
}

fn compute_group_scope(meta: &InboundMetadata) -> String {
    match (&meta.group_id, &meta.channel_id) {
        (Some(g), Some(c)) => format!("group-{g}-channel-{c}"),
        (Some(g), None) => format!("group-{g}"),
        (None, Some(c)) => format!("channel-{c}"),
        (None, None) => "group-unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(channel: &str, peer: &str, is_direct: bool) -> InboundMetadata {
        InboundMetadata {
            channel: Some(channel.into()),
            peer_id: Some(peer.into()),
            is_direct,
            ..Default::default()
        }
    }

    #[test]
    fn dm_main_scope() {
        let id = compute_session_key("bot1", DmScope::Main, &meta("discord", "alice", true));
        assert_eq!(id.as_str(), "bot1:discord:main");
    }

    #[test]
    fn dm_per_peer() {
        let id = compute_session_key("bot1", DmScope::PerPeer, &meta("discord", "alice", true));
        assert_eq!(id.as_str(), "bot1:discord:dm-alice");
    }

    #[test]
    fn group_message() {
        let m = InboundMetadata {
            channel: Some("discord".into()),
            group_id: Some("server42".into()),
            channel_id: Some("general".into()),
            is_direct: false,
            ..Default::default()
        };
        let id = compute_session_key("bot1", DmScope::PerChannelPeer, &m);
        assert_eq!(id.as_str(), "bot1:discord:group-server42-channel-general");
    }

    #[test]
    fn thread_appended_as_fourth_segment() {
        let m = InboundMetadata {
            channel: Some("discord".into()),
            group_id: Some("server42".into()),
            thread_id: Some("t99".into()),
            is_direct: false,
            ..Default::default()
        };
        let id = compute_session_key("bot1", DmScope::PerChannelPeer, &m);
        assert_eq!(id.as_str(), "bot1:discord:group-server42:t99");
    }
}

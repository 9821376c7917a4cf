//! Property-based tests for the board channel frame codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never panics `decode_inbound` (returns `Err` or a frame).
//! 2. Any unrecognized `type` tag decodes to `InboundFrame::Unknown`.
//! 3. A status-change notification a client sends reads back on the other
//!    side as a `task_update` carrying the same task and status.
//! 4. Chat text of any content survives the hub relaying it.

use proptest::prelude::*;
use boardsync_proto::codec;
use boardsync_proto::frame::{InboundFrame, OutboundFrame};
use boardsync_proto::task::{TaskId, TaskStatus};

// --- Strategies ---

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

fn arb_task_id() -> impl Strategy<Value = TaskId> {
    "[a-f0-9]{1,24}".prop_map(TaskId::new)
}

/// Frame types the client does not understand.
fn arb_unknown_type() -> impl Strategy<Value = String> {
    "[a-z_]{1,16}".prop_filter("must not be a known frame type", |t| {
        !matches!(
            t.as_str(),
            "chat" | "system" | "user_joined" | "user_left" | "task_update" | "typing"
        )
    })
}

// --- Properties ---

proptest! {
    #[test]
    fn decode_never_panics_on_arbitrary_text(text in ".{0,512}") {
        let _ = codec::decode_inbound(&text);
    }

    #[test]
    fn unknown_frame_types_are_ignored(kind in arb_unknown_type(), payload in "[a-z ]{0,32}") {
        let json = serde_json::json!({"type": kind, "payload": payload}).to_string();
        let frame = codec::decode_inbound(&json).unwrap();
        prop_assert_eq!(frame, InboundFrame::Unknown);
    }

    #[test]
    fn status_change_reads_back_as_task_update(id in arb_task_id(), status in arb_status()) {
        let text = codec::encode_outbound(&OutboundFrame::status_changed(id.clone(), status)).unwrap();
        let frame = codec::decode_inbound(&text).unwrap();
        match frame {
            InboundFrame::TaskUpdate { task_id, action, details, .. } => {
                prop_assert_eq!(task_id, Some(id));
                prop_assert_eq!(action, "updated");
                prop_assert_eq!(details.status, Some(status));
            }
            other => prop_assert!(false, "expected TaskUpdate, got {:?}", other),
        }
    }

    #[test]
    fn chat_text_survives_relay(message in "\\PC{0,256}") {
        let sent = codec::encode_outbound(&OutboundFrame::Chat { message: message.clone() }).unwrap();
        let received: OutboundFrame = codec::decode(&sent).unwrap();
        let relayed = InboundFrame::Chat {
            user_id: "u1".into(),
            username: "alice".into(),
            message: match received {
                OutboundFrame::Chat { message } => message,
                _ => String::new(),
            },
            timestamp: boardsync_proto::time::Timestamp::now(),
        };
        let text = codec::encode(&relayed).unwrap();
        let frame = codec::decode_inbound(&text).unwrap();
        match frame {
            InboundFrame::Chat { message: relayed_text, .. } => prop_assert_eq!(relayed_text, message),
            other => prop_assert!(false, "expected Chat, got {:?}", other),
        }
    }
}

//! Typed ID wrappers so agent, thread, trace, and other identifier spaces
//! cannot be accidentally mixed at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(AgentId, "Unique identifier for an agent.");
typed_id!(TraceId, "Opaque correlation identifier carried from Input to Output.");
typed_id!(ThreadId, "Identifier that partitions the checkpoint version space.");
typed_id!(CheckpointId, "Unique identifier for a single checkpoint.");
typed_id!(ApprovalId, "Unique identifier for a pending approval request.");
typed_id!(SubscriptionId, "Handle returned by EventBus::subscribe, used to unsubscribe.");
typed_id!(ToolCallId, "Identifier correlating a ToolCall with its ToolResult.");

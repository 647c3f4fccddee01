// Identifier newtypes shared across the flow engine
//
// Every identifier in the system is a thin wrapper over `String` rather
// than a bare `String` or `Uuid`. This keeps a `FlowId` from ever being
// passed where a `NodeId` was expected - the compiler catches it instead
// of it surfacing as a confusing "not found" at runtime.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn new<S: Into<String>>(value: S) -> Self {
                $name(value.into())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(FlowId);
string_id!(VersionId);
string_id!(NodeId);
string_id!(EdgeId);
string_id!(ExecutionId);
string_id!(UserId);
string_id!(AgentId);
string_id!(ConversationId);
string_id!(SessionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_conversions() {
        let a = FlowId::from("f1");
        let b = FlowId::new("f1".to_string());
        let c = FlowId("f1".to_string());
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "f1");
        assert_eq!(a.to_string(), "f1");
    }

    #[test]
    fn distinct_id_types_do_not_compare() {
        let flow = FlowId::from("x");
        let node = NodeId::from("x");
        // Different types entirely - this just documents that the same
        // string can legally back two different identifier kinds.
        assert_eq!(flow.as_str(), node.as_str());
    }
}

use serde::{Deserialize, Serialize};

/// Account roles. Guardians manage the family; a display account drives the
/// shared household screen and may only read today's list and mark tasks done.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guardian,
    Display,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guardian => "guardian",
            Role::Display => "display",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guardian" => Some(Role::Guardian),
            "display" => Some(Role::Display),
            _ => None,
        }
    }
}

//! Opaque identifier newtypes shared across the daemon.
//!
//! The identity/session layer that mints these is out of scope for this
//! core (see spec §1 Out of scope); it hands the core plain strings, so the
//! ids here wrap `String` rather than `Uuid`.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident, $display_prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an owned string as this identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Mint a fresh, random identifier carrying this type's prefix.
            pub fn generate() -> Self {
                Self(format!("{}_{}", $display_prefix, uuid::Uuid::new_v4().simple()))
            }

            /// Borrow the identifier as a plain string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// `true` if the identifier is empty after trimming whitespace.
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(GroupId, "group");
string_id!(MemberId, "member");
string_id!(EventId, "gevtmsg");
string_id!(MessageId, "gmsg");
string_id!(ContactId, "contact");
string_id!(DeviceId, "device");

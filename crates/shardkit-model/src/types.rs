//! Newtype wrappers for string identifiers.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$name> for String {
            fn eq(&self, other: &$name) -> bool {
                *self == other.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Name of a bundle module, unique within a bundle.
    ModuleName
);

string_newtype!(
    /// Label of a split, only meaningful for split APKs and dropped before sharding.
    SplitName
);

string_newtype!(
    /// Blake3-derived identifier of a fused package, derived from its entries.
    ShardId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_display_and_as_ref() {
        let name = ModuleName::new("base");
        assert_eq!(name.to_string(), "base");
        assert_eq!(name.as_str(), "base");
        assert_eq!(AsRef::<str>::as_ref(&name), "base");
    }

    #[test]
    fn module_name_serializes_as_plain_string() {
        let name = ModuleName::new("feature_camera");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"feature_camera\"");
        let back: ModuleName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn split_name_compares_with_str() {
        let split = SplitName::from("config.x86");
        assert!(split == *"config.x86");
        assert_eq!(String::from("config.x86"), split);
    }

    #[test]
    fn shard_id_into_inner() {
        let id = ShardId::new("abc123".to_owned());
        assert_eq!(id.into_inner(), "abc123");
    }
}

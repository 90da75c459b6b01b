//! Identifier - the `{namespace, key}` pair naming a domain object.
//!
//! The string form is `"namespace:key"`. Colons inside the namespace are
//! escaped as `\:` so the first unescaped colon always separates the two
//! halves. An empty namespace renders as the bare key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Structural identity of a domain object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identifier {
    pub namespace: String,
    pub key: String,
}

impl Identifier {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Identifier {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Generate a fresh identifier with a random key in the given namespace.
    pub fn generate(namespace: impl Into<String>) -> Self {
        Identifier::new(namespace, uuid::Uuid::new_v4().to_string())
    }

    /// Parse a `"namespace:key"` string.
    pub fn parse(s: &str) -> Self {
        let mut namespace = String::new();
        let mut chars = s.char_indices().peekable();

        while let Some((index, c)) = chars.next() {
            match c {
                '\\' if matches!(chars.peek(), Some((_, ':'))) => {
                    namespace.push(':');
                    chars.next();
                }
                ':' => return Identifier::new(namespace, &s[index + 1..]),
                other => namespace.push(other),
            }
        }

        // No separator: the whole string is a key.
        Identifier::new("", s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}:{}", self.namespace.replace(':', "\\:"), self.key)
        }
    }
}

impl FromStr for Identifier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Identifier::parse(s))
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::parse(s)
    }
}

// Composition arrays written by older clients hold key strings rather than
// `{namespace, key}` objects; accept both.
impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Object { namespace: String, key: String },
            KeyString(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Object { namespace, key } => Identifier::new(namespace, key),
            Repr::KeyString(s) => Identifier::parse(&s),
        })
    }
}

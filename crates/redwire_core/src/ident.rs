//! `namespace:path` identifiers

use crate::BridgeError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a registered kind, e.g. `mymod:ruby_ore`.
///
/// Namespaces allow `[a-z0-9_.-]`, paths additionally allow `/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    namespace: String,
    path: String,
}

impl Identifier {
    pub fn new(namespace: &str, path: &str) -> Result<Self, BridgeError> {
        let raw = || format!("{namespace}:{path}");
        if namespace.is_empty() {
            return Err(BridgeError::invalid_identifier(raw(), "namespace is empty"));
        }
        if path.is_empty() {
            return Err(BridgeError::invalid_identifier(raw(), "path is empty"));
        }
        if let Some(c) = namespace.chars().find(|&c| !is_namespace_char(c)) {
            return Err(BridgeError::invalid_identifier(
                raw(),
                format!("character '{c}' is not allowed in a namespace"),
            ));
        }
        if let Some(c) = path.chars().find(|&c| !is_path_char(c)) {
            return Err(BridgeError::invalid_identifier(
                raw(),
                format!("character '{c}' is not allowed in a path"),
            ));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// Parse a full `namespace:path` string.
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        match raw.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Err(BridgeError::invalid_identifier(
                raw,
                "expected the form namespace:path",
            )),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn is_namespace_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-')
}

fn is_path_char(c: char) -> bool {
    is_namespace_char(c) || c == '/'
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for Identifier {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespace_and_path() {
        let id = Identifier::parse("mymod:ores/ruby_ore").unwrap();
        assert_eq!(id.namespace(), "mymod");
        assert_eq!(id.path(), "ores/ruby_ore");
        assert_eq!(id.to_string(), "mymod:ores/ruby_ore");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for raw in ["ruby_ore", ":ruby_ore", "mymod:", "MyMod:ore", "my mod:ore", "a:b:c"] {
            let err = Identifier::parse(raw).unwrap_err();
            assert!(
                matches!(err, BridgeError::InvalidIdentifier { .. }),
                "{raw} produced {err:?}"
            );
        }
    }

    #[test]
    fn namespace_may_not_contain_slash() {
        assert!(Identifier::parse("my/mod:ore").is_err());
    }
}

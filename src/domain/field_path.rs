//! Structural locator for values inside an audit specification document
//!
//! Architecture: Value Object - A path is an ordered list of key/index segments
//! - Rendering and parsing are inverses, so every reported locator resolves
//!   back to the exact node the extractor read
//! - Replaces ad-hoc string concatenation for report field references

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One step of a field path: a mapping key or a sequence index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Ordered structural location, rendered as `discovery.code_patterns[2].pattern`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The empty path, addressing the whole document
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Append a mapping key segment
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append a sequence index segment
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// Whether this path addresses the whole document
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Render as a dotted/bracketed locator; the root path renders as `root`
    pub fn to_locator(&self) -> String {
        if self.segments.is_empty() {
            return "root".to_string();
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Parse a locator produced by [`FieldPath::to_locator`]
    pub fn parse(locator: &str) -> Result<Self, String> {
        if locator == "root" {
            return Ok(Self::root());
        }
        if locator.is_empty() {
            return Err("empty locator".to_string());
        }

        let mut segments = Vec::new();
        let mut chars = locator.chars();
        let mut current = String::new();
        let mut expect_key = true;

        while let Some(ch) = chars.next() {
            match ch {
                '.' => {
                    if expect_key {
                        if current.is_empty() {
                            return Err(format!("empty key segment in '{locator}'"));
                        }
                        segments.push(PathSegment::Key(std::mem::take(&mut current)));
                    }
                    expect_key = true;
                }
                '[' => {
                    if expect_key {
                        if current.is_empty() {
                            return Err(format!("index without key in '{locator}'"));
                        }
                        segments.push(PathSegment::Key(std::mem::take(&mut current)));
                        expect_key = false;
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(other) => {
                                return Err(format!("invalid index char '{other}' in '{locator}'"))
                            }
                            None => return Err(format!("unterminated index in '{locator}'")),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| format!("invalid index in '{locator}'"))?;
                    segments.push(PathSegment::Index(index));
                }
                other => {
                    if !expect_key {
                        return Err(format!("key after index without '.' in '{locator}'"));
                    }
                    current.push(other);
                }
            }
        }

        if expect_key {
            if current.is_empty() {
                return Err(format!("trailing separator in '{locator}'"));
            }
            segments.push(PathSegment::Key(current));
        }

        Ok(Self { segments })
    }

    /// Walk a parsed document tree to the node this path addresses
    pub fn resolve<'a>(&self, root: &'a serde_yaml::Value) -> Option<&'a serde_yaml::Value> {
        let mut node = root;
        for segment in &self.segments {
            node = match segment {
                PathSegment::Key(key) => node.get(key.as_str())?,
                PathSegment::Index(index) => node.get(*index)?,
            };
        }
        Some(node)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_locator())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_locator())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_rendering() {
        let path = FieldPath::root()
            .key("discovery")
            .key("code_patterns")
            .index(2)
            .key("pattern");
        assert_eq!(path.to_locator(), "discovery.code_patterns[2].pattern");
    }

    #[test]
    fn test_root_rendering() {
        assert_eq!(FieldPath::root().to_locator(), "root");
        assert!(FieldPath::root().is_root());
    }

    #[test]
    fn test_parse_round_trip() {
        let locators = [
            "root",
            "discovery.code_patterns[2].pattern",
            "closeout_checklist[0].verification",
            "signals.critical[3].evidence_pattern",
            "procedure.steps[1].commands[4].command",
            "tooling.scripts[0].code",
        ];

        for locator in locators {
            let parsed = FieldPath::parse(locator).unwrap();
            assert_eq!(parsed.to_locator(), locator);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a.[0]").is_err());
        assert!(FieldPath::parse("a[x]").is_err());
        assert!(FieldPath::parse("a[0").is_err());
        assert!(FieldPath::parse("a.").is_err());
        assert!(FieldPath::parse("a[0]b").is_err());
    }

    #[test]
    fn test_resolve_walks_tree() {
        let doc: serde_yaml::Value = serde_yaml::from_str(
            r#"
discovery:
  code_patterns:
    - pattern: "first"
    - pattern: "second"
"#,
        )
        .unwrap();

        let path = FieldPath::root()
            .key("discovery")
            .key("code_patterns")
            .index(1)
            .key("pattern");

        let node = path.resolve(&doc).unwrap();
        assert_eq!(node.as_str(), Some("second"));

        let missing = FieldPath::root().key("discovery").index(0);
        assert!(missing.resolve(&doc).is_none());
    }
}

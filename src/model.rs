//! Node and edge values as seen by graph rules.

use std::collections::BTreeMap;

/// Reserved attribute holding a node or edge key.
pub const ATTR_KEY: &str = "key";
/// Reserved attribute holding a node or edge kind.
pub const ATTR_KIND: &str = "kind";

/// Attribute value carried by nodes and edges.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Owned string.
    String(String),
    /// Owned byte vector.
    Bytes(Vec<u8>),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// A node identified by `(partition, kind, key)`; the partition is carried by the event.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique key within the node kind.
    pub key: String,
    /// Node kind.
    pub kind: String,
    /// Attributes other than `key` and `kind`.
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Node {
    /// Creates a node without attributes.
    pub fn new(key: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// All attribute names including the reserved `key` and `kind`.
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        [ATTR_KEY, ATTR_KIND]
            .into_iter()
            .chain(self.attrs.keys().map(String::as_str))
    }
}

/// One end of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeEnd {
    /// Key of the node at this end.
    pub key: String,
    /// Kind of the node at this end.
    pub kind: String,
    /// Role the node plays in the relationship.
    pub role: String,
    /// Deleting the node at this end also deletes the node at the other end.
    pub cascading: bool,
}

impl EdgeEnd {
    /// Creates a non-cascading end.
    pub fn new(key: impl Into<String>, kind: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            role: role.into(),
            cascading: false,
        }
    }

    /// Marks this end as cascading.
    pub fn cascading(mut self) -> Self {
        self.cascading = true;
        self
    }

    fn is(&self, key: &str, kind: &str) -> bool {
        self.key == key && self.kind == kind
    }
}

/// Which end of an edge a node occupies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EndSide {
    /// The first end.
    End1,
    /// The second end.
    End2,
}

impl EndSide {
    /// The opposite side.
    pub fn other(self) -> Self {
        match self {
            EndSide::End1 => EndSide::End2,
            EndSide::End2 => EndSide::End1,
        }
    }
}

/// An edge identified by `(partition, kind, key)` connecting two node ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Unique key within the edge kind.
    pub key: String,
    /// Edge kind.
    pub kind: String,
    /// Attributes other than `key` and `kind`.
    pub attrs: BTreeMap<String, AttrValue>,
    /// First end.
    pub end1: EdgeEnd,
    /// Second end.
    pub end2: EdgeEnd,
}

impl Edge {
    /// Creates an edge without attributes.
    pub fn new(key: impl Into<String>, kind: impl Into<String>, end1: EdgeEnd, end2: EdgeEnd) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            attrs: BTreeMap::new(),
            end1,
            end2,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// All attribute names including the reserved `key` and `kind`.
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        [ATTR_KEY, ATTR_KIND]
            .into_iter()
            .chain(self.attrs.keys().map(String::as_str))
    }

    /// Returns the side occupied by the given node. Self loops resolve to `End1`.
    pub fn side_of(&self, key: &str, kind: &str) -> Option<EndSide> {
        if self.end1.is(key, kind) {
            Some(EndSide::End1)
        } else if self.end2.is(key, kind) {
            Some(EndSide::End2)
        } else {
            None
        }
    }

    /// Returns the end on the given side.
    pub fn end(&self, side: EndSide) -> &EdgeEnd {
        match side {
            EndSide::End1 => &self.end1,
            EndSide::End2 => &self.end2,
        }
    }

    /// Relationship spec as seen from the given side:
    /// `role:edgekind:otherrole:otherkind`.
    pub fn spec(&self, side: EndSide) -> String {
        let this = self.end(side);
        let other = self.end(side.other());
        format!("{}:{}:{}:{}", this.role, self.kind, other.role, other.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owns() -> Edge {
        Edge::new(
            "e1",
            "Owns",
            EdgeEnd::new("p1", "Person", "owner").cascading(),
            EdgeEnd::new("c1", "Car", "property"),
        )
    }

    #[test]
    fn spec_is_directed() {
        let edge = owns();
        assert_eq!(edge.spec(EndSide::End1), "owner:Owns:property:Car");
        assert_eq!(edge.spec(EndSide::End2), "property:Owns:owner:Person");
    }

    #[test]
    fn side_lookup_matches_key_and_kind() {
        let edge = owns();
        assert_eq!(edge.side_of("p1", "Person"), Some(EndSide::End1));
        assert_eq!(edge.side_of("c1", "Car"), Some(EndSide::End2));
        assert_eq!(edge.side_of("c1", "Person"), None);
        assert!(edge.end(EndSide::End1).cascading);
    }

    #[test]
    fn attr_names_include_reserved() {
        let node = Node::new("n1", "Person").with_attr("name", "Ada");
        let names: Vec<_> = node.attr_names().collect();
        assert_eq!(names, vec!["key", "kind", "name"]);
    }
}

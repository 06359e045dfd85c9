//! Minimal tagged tree used for entity persistence.
//!
//! Mirrors the shape of NBT (named compounds, homogeneous lists, string leaves)
//! without the binary encoding; trees are embedded in the JSON world save.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    String,
    List,
    Compound,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Tag {
    String(String),
    List(ListTag),
    Compound(CompoundTag),
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::String(_) => TagKind::String,
            Tag::List(_) => TagKind::List,
            Tag::Compound(_) => TagKind::Compound,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A list whose items all share `kind`. Mixed lists are rejected when read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawListTag")]
pub struct ListTag {
    kind: TagKind,
    items: Vec<Tag>,
}

#[derive(Deserialize)]
struct RawListTag {
    kind: TagKind,
    items: Vec<Tag>,
}

impl TryFrom<RawListTag> for ListTag {
    type Error = String;

    fn try_from(raw: RawListTag) -> Result<Self, Self::Error> {
        if let Some(stray) = raw.items.iter().find(|tag| tag.kind() != raw.kind) {
            return Err(format!(
                "{:?} list holds a {:?} item",
                raw.kind,
                stray.kind()
            ));
        }
        Ok(Self {
            kind: raw.kind,
            items: raw.items,
        })
    }
}

impl ListTag {
    pub fn from_strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: TagKind::String,
            items: values.into_iter().map(|v| Tag::String(v.into())).collect(),
        }
    }

    /// String leaves in order; empty for lists of any other kind.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(Tag::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompoundTag(BTreeMap<String, Tag>);

impl CompoundTag {
    pub fn get_list(&self, key: &str) -> Option<&ListTag> {
        match self.0.get(key)? {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, tag: Tag) -> Option<Tag> {
        self.0.insert(key.into(), tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_lists_are_rejected_when_read() {
        let mixed = serde_json::json!({
            "kind": "string",
            "items": [
                { "type": "string", "value": "ok" },
                { "type": "compound", "value": {} }
            ]
        });
        let err = serde_json::from_value::<ListTag>(mixed).unwrap_err();
        assert!(err.to_string().contains("String list holds a Compound item"));
    }

    #[test]
    fn list_getter_ignores_other_kinds() {
        let mut tree = CompoundTag::default();
        tree.insert("name", Tag::String("Bob".into()));
        tree.insert("lines", Tag::List(ListTag::from_strings(["a", "b"])));

        assert!(tree.get_list("name").is_none());
        let lines: Vec<&str> = tree.get_list("lines").unwrap().strings().collect();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn json_shape_is_tagged() {
        let mut tree = CompoundTag::default();
        tree.insert("commands", Tag::List(ListTag::from_strings(["say hi"])));
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "commands": {
                    "type": "list",
                    "value": {
                        "kind": "string",
                        "items": [{ "type": "string", "value": "say hi" }]
                    }
                }
            })
        );
        let back: CompoundTag = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }
}

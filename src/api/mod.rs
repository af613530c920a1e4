pub mod client;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::error::ApiError;

pub use client::ApiClient;

/// Opaque identifier for chats and members.
///
/// The service hands out numbers (Telegram ids) but strings are accepted too.
/// Ids are sent back in the same JSON form they arrived in; anything that is
/// not an `i64` or a string is kept as the raw value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Int(i64),
    Text(String),
    Other(Value),
}

impl Id {
    /// Convert a raw JSON value, rejecting falsy ones (`null`, `false`, `0`, `""`)
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bool(false) => None,
            Value::Number(n) => match n.as_i64() {
                Some(0) => None,
                Some(v) => Some(Id::Int(v)),
                None if n.as_f64() == Some(0.0) => None,
                None => Some(Id::Other(Value::Number(n))),
            },
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(Id::Text(s)),
            other => Some(Id::Other(other)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Id::Int(_) => 0,
            Id::Text(_) => 1,
            Id::Other(_) => 2,
        }
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Id::Int(a), Id::Int(b)) => a.cmp(b),
            (Id::Text(a), Id::Text(b)) => a.cmp(b),
            (Id::Other(a), Id::Other(b)) => a.to_string().cmp(&b.to_string()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(v) => write!(f, "{}", v),
            Id::Text(s) => f.write_str(s),
            Id::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Group {
    pub chat_id: Id,
    #[serde(default)]
    pub title: Option<String>,
}

impl Group {
    pub fn display_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!("Group {}", self.chat_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Member {
    /// `None` when the server sent no id or a falsy one; such members can't be selected
    #[serde(default, deserialize_with = "truthy_id")]
    pub id: Option<Id>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Member {
    pub fn display_name(&self) -> String {
        match (self.name.as_deref(), &self.id) {
            (Some(n), _) if !n.trim().is_empty() => n.to_string(),
            (_, Some(id)) => id.to_string(),
            _ => "Unknown".to_string(),
        }
    }
}

fn truthy_id<'de, D>(deserializer: D) -> Result<Option<Id>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(Id::from_json))
}

/// A saved tag group as the client sees it: the name, plus the size when the server reports one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGroupSummary {
    pub name: String,
    pub member_count: Option<usize>,
}

/// The tag-group service seen from the controller
#[async_trait]
pub trait GroupService: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<Group>, ApiError>;

    async fn list_members(&self, chat_id: &Id) -> Result<Vec<Member>, ApiError>;

    /// Sorted by name
    async fn list_tag_groups(&self, chat_id: &Id) -> Result<Vec<TagGroupSummary>, ApiError>;

    async fn create_tag_group(&self, chat_id: &Id, name: &str, members: &[Id]) -> Result<(), ApiError>;

    async fn trigger(&self, chat_id: &Id, tag_name: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_member_ids_become_none() {
        let members: Vec<Member> = serde_json::from_value(json!([
            { "id": 0, "name": "zero" },
            { "id": "", "name": "empty" },
            { "id": null, "name": "null" },
            { "id": false, "name": "false" },
            { "name": "missing" },
            { "id": 42, "name": "real" },
            { "id": "u-7" },
        ]))
        .unwrap();

        let ids: Vec<Option<Id>> = members.iter().map(|m| m.id.clone()).collect();
        assert_eq!(
            ids,
            vec![None, None, None, None, None, Some(Id::Int(42)), Some(Id::from("u-7"))]
        );
    }

    #[test]
    fn test_ids_serialize_in_original_form() {
        let ids = vec![Id::Int(-100123), Id::from("abc")];
        assert_eq!(serde_json::to_value(&ids).unwrap(), json!([-100123, "abc"]));
    }

    #[test]
    fn test_non_integer_ids_keep_their_json_form() {
        let members: Vec<Member> = serde_json::from_value(json!([
            { "id": 1.5, "name": "float" },
            { "id": 18446744073709551615u64, "name": "big" },
            { "id": true, "name": "flag" },
            { "id": { "uid": 3 }, "name": "object" },
            { "id": [], "name": "list" },
        ]))
        .unwrap();

        assert!(members.iter().all(|m| m.id.is_some()));
        let ids: Vec<Id> = members.into_iter().filter_map(|m| m.id).collect();
        assert_eq!(
            serde_json::to_value(&ids).unwrap(),
            json!([1.5, 18446744073709551615u64, true, { "uid": 3 }, []])
        );
    }

    #[test]
    fn test_id_ordering_is_total() {
        let mut ids = vec![Id::from("b"), Id::Other(json!(2.5)), Id::Int(7), Id::Int(-1), Id::from("a")];
        ids.sort();
        assert_eq!(
            ids,
            vec![Id::Int(-1), Id::Int(7), Id::from("a"), Id::from("b"), Id::Other(json!(2.5))]
        );
    }

    #[test]
    fn test_display_fallbacks() {
        let group: Group = serde_json::from_value(json!({ "chat_id": -5 })).unwrap();
        assert_eq!(group.display_title(), "Group -5");

        let named: Group = serde_json::from_value(json!({ "chat_id": 1, "title": "Team" })).unwrap();
        assert_eq!(named.display_title(), "Team");

        let anon: Member = serde_json::from_value(json!({ "id": 9 })).unwrap();
        assert_eq!(anon.display_name(), "9");

        let nobody: Member = serde_json::from_value(json!({})).unwrap();
        assert_eq!(nobody.display_name(), "Unknown");
    }
}

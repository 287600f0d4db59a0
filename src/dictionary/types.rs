//! Glossary records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One substitution rule. `from` is a regular expression, `to` is inserted literally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub usage: u64,
    pub created_at: DateTime<Utc>,
}

/// A named, ordered list of terms owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dictionary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub terms: Vec<Term>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update for a dictionary's own fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub terms: Option<Vec<Term>>,
}

/// Partial update for a term.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TermUpdate {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// A `from -> to` pair supplied by the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TermInput {
    pub from: String,
    pub to: String,
}

pub(crate) fn new_dictionary_id() -> String {
    format!("dict_{}", uuid::Uuid::new_v4().simple())
}

pub(crate) fn new_term_id() -> String {
    format!("term_{}", uuid::Uuid::new_v4().simple())
}

impl Term {
    pub fn new(from: impl Into<String>, to: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_term_id(),
            from: from.into(),
            to: to.into(),
            usage: 0,
            created_at: now,
        }
    }
}

impl Dictionary {
    pub fn new(name: impl Into<String>, description: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_dictionary_id(),
            name: name.into(),
            description,
            terms: Vec::new(),
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_prefixed_and_unique() {
        let now = Utc::now();
        let a = Term::new("AI", "人工知能", now);
        let b = Term::new("AI", "人工知能", now);
        assert!(a.id.starts_with("term_"));
        assert_ne!(a.id, b.id);
        assert!(Dictionary::new("美容", None, now).id.starts_with("dict_"));
    }

    #[test]
    fn test_dictionary_wire_format() {
        let json = r#"{
            "id": "dict_1",
            "name": "美容用語",
            "terms": [{"id": "term_1", "from": "カット", "to": "カット", "usage": 3,
                       "createdAt": "2025-01-01T00:00:00Z"}],
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-02T00:00:00Z",
            "isActive": true
        }"#;
        let dict: Dictionary = serde_json::from_str(json).unwrap();
        assert_eq!(dict.terms[0].usage, 3);
        assert!(dict.description.is_none());

        let value = serde_json::to_value(&dict).unwrap();
        assert_eq!(value["isActive"], true);
        assert!(value.get("description").is_none());
    }
}

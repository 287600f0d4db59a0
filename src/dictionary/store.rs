//! Per-user dictionary persistence.
//!
//! Each user has two keys: the full dictionary list and the ordered list of
//! active dictionary ids. Both are read and written wholesale.

use std::sync::Arc;

use crate::clock::Clock;
use crate::store::{get_json, set_json, KvStore, StoreError};

use super::engine::{self, Substitution};
use super::types::{new_dictionary_id, Dictionary, DictionaryUpdate, Term, TermInput, TermUpdate};

/// Name of the dictionary created when quick-replace rules are saved and no
/// dictionary is active.
pub const QUICK_REPLACE_DICTIONARY: &str = "クイック置換から追加";

#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("dictionary not found: {0}")]
    DictionaryNotFound(String),
    #[error("term not found: {0}")]
    TermNotFound(String),
    #[error("invalid dictionary: {0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn dictionaries_key(user_id: &str) -> String {
    format!("user_dictionaries:{}", user_id)
}

fn active_key(user_id: &str) -> String {
    format!("user_active_dictionaries:{}", user_id)
}

pub struct DictionaryStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl DictionaryStore {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Dictionary>, StoreError> {
        Ok(get_json(self.store.as_ref(), &dictionaries_key(user_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn active_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(get_json(self.store.as_ref(), &active_key(user_id))
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, dictionaries: &[Dictionary]) -> Result<(), StoreError> {
        set_json(self.store.as_ref(), &dictionaries_key(user_id), dictionaries).await
    }

    pub async fn set_active(&self, user_id: &str, ids: &[String]) -> Result<(), StoreError> {
        set_json(self.store.as_ref(), &active_key(user_id), ids).await
    }

    pub async fn create(
        &self,
        user_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<Dictionary, DictionaryError> {
        if name.trim().is_empty() {
            return Err(DictionaryError::Invalid("name is required".to_string()));
        }
        let mut dictionaries = self.list(user_id).await?;
        let dictionary = Dictionary::new(name.trim(), description, self.clock.now());
        dictionaries.push(dictionary.clone());
        self.save(user_id, &dictionaries).await?;
        log::info!("Dictionaries: {} created {}", user_id, dictionary.id);
        Ok(dictionary)
    }

    /// Load the list, let `f` modify the dictionary `dict_id`, stamp and save.
    async fn modify<T>(
        &self,
        user_id: &str,
        dict_id: &str,
        f: impl FnOnce(&mut Dictionary) -> Result<T, DictionaryError>,
    ) -> Result<T, DictionaryError> {
        let mut dictionaries = self.list(user_id).await?;
        let dictionary = dictionaries
            .iter_mut()
            .find(|d| d.id == dict_id)
            .ok_or_else(|| DictionaryError::DictionaryNotFound(dict_id.to_string()))?;
        let out = f(dictionary)?;
        dictionary.updated_at = self.clock.now();
        self.save(user_id, &dictionaries).await?;
        Ok(out)
    }

    pub async fn update(
        &self,
        user_id: &str,
        dict_id: &str,
        update: DictionaryUpdate,
    ) -> Result<Dictionary, DictionaryError> {
        self.modify(user_id, dict_id, |d| {
            if let Some(name) = update.name {
                if name.trim().is_empty() {
                    return Err(DictionaryError::Invalid("name is required".to_string()));
                }
                d.name = name;
            }
            if let Some(description) = update.description {
                d.description = Some(description).filter(|s| !s.is_empty());
            }
            if let Some(is_active) = update.is_active {
                d.is_active = is_active;
            }
            if let Some(terms) = update.terms {
                d.terms = terms;
            }
            Ok(d.clone())
        })
        .await
    }

    /// Delete a dictionary and drop it from the active list.
    pub async fn delete(&self, user_id: &str, dict_id: &str) -> Result<(), DictionaryError> {
        let mut dictionaries = self.list(user_id).await?;
        let before = dictionaries.len();
        dictionaries.retain(|d| d.id != dict_id);
        if dictionaries.len() == before {
            return Err(DictionaryError::DictionaryNotFound(dict_id.to_string()));
        }

        let mut active = self.active_ids(user_id).await?;
        active.retain(|id| id != dict_id);

        self.save(user_id, &dictionaries).await?;
        self.set_active(user_id, &active).await?;
        log::info!("Dictionaries: {} deleted {}", user_id, dict_id);
        Ok(())
    }

    pub async fn add_term(
        &self,
        user_id: &str,
        dict_id: &str,
        input: TermInput,
    ) -> Result<Term, DictionaryError> {
        if input.from.is_empty() {
            return Err(DictionaryError::Invalid("term pattern is required".to_string()));
        }
        let now = self.clock.now();
        self.modify(user_id, dict_id, |d| {
            let term = Term::new(input.from, input.to, now);
            d.terms.push(term.clone());
            Ok(term)
        })
        .await
    }

    pub async fn update_term(
        &self,
        user_id: &str,
        dict_id: &str,
        term_id: &str,
        update: TermUpdate,
    ) -> Result<Term, DictionaryError> {
        self.modify(user_id, dict_id, |d| {
            let term = d
                .terms
                .iter_mut()
                .find(|t| t.id == term_id)
                .ok_or_else(|| DictionaryError::TermNotFound(term_id.to_string()))?;
            if let Some(from) = update.from {
                if from.is_empty() {
                    return Err(DictionaryError::Invalid("term pattern is required".to_string()));
                }
                term.from = from;
            }
            if let Some(to) = update.to {
                term.to = to;
            }
            Ok(term.clone())
        })
        .await
    }

    pub async fn delete_term(
        &self,
        user_id: &str,
        dict_id: &str,
        term_id: &str,
    ) -> Result<(), DictionaryError> {
        self.modify(user_id, dict_id, |d| {
            let before = d.terms.len();
            d.terms.retain(|t| t.id != term_id);
            if d.terms.len() == before {
                return Err(DictionaryError::TermNotFound(term_id.to_string()));
            }
            Ok(())
        })
        .await
    }

    /// Pretty-printed JSON of one dictionary.
    pub async fn export(&self, user_id: &str, dict_id: &str) -> Result<String, DictionaryError> {
        let dictionaries = self.list(user_id).await?;
        let dictionary = dictionaries
            .iter()
            .find(|d| d.id == dict_id)
            .ok_or_else(|| DictionaryError::DictionaryNotFound(dict_id.to_string()))?;
        serde_json::to_string_pretty(dictionary)
            .map_err(|e| DictionaryError::Store(StoreError::Serialization(e)))
    }

    /// Add a dictionary from exported JSON under a fresh id.
    pub async fn import(&self, user_id: &str, json: &str) -> Result<Dictionary, DictionaryError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| DictionaryError::Invalid(format!("not valid JSON: {}", e)))?;

        let has_id = value
            .get("id")
            .and_then(|v| v.as_str())
            .is_some_and(|s| !s.is_empty());
        let has_name = value
            .get("name")
            .and_then(|v| v.as_str())
            .is_some_and(|s| !s.is_empty());
        let has_terms = value.get("terms").is_some_and(|v| v.is_array());
        if !(has_id && has_name && has_terms) {
            return Err(DictionaryError::Invalid(
                "id, name and terms are required".to_string(),
            ));
        }

        let mut dictionary: Dictionary = serde_json::from_value(value)
            .map_err(|e| DictionaryError::Invalid(e.to_string()))?;
        dictionary.id = new_dictionary_id();
        dictionary.updated_at = self.clock.now();

        let mut dictionaries = self.list(user_id).await?;
        dictionaries.push(dictionary.clone());
        self.save(user_id, &dictionaries).await?;
        log::info!(
            "Dictionaries: {} imported {} ({} terms)",
            user_id,
            dictionary.id,
            dictionary.terms.len()
        );
        Ok(dictionary)
    }

    /// Save quick-replace rules as terms.
    ///
    /// Terms go to the first active dictionary; if none is active, a new
    /// dictionary is created and activated. Rules with an empty pattern are
    /// skipped. Returns the target dictionary and how many terms were added.
    pub async fn save_quick_replace(
        &self,
        user_id: &str,
        rules: Vec<TermInput>,
    ) -> Result<(Dictionary, usize), DictionaryError> {
        let now = self.clock.now();
        let mut dictionaries = self.list(user_id).await?;
        let mut active = self.active_ids(user_id).await?;

        let target_index = active
            .first()
            .and_then(|first| dictionaries.iter().position(|d| &d.id == first));
        let target_index = match target_index {
            Some(index) => index,
            None => {
                let dictionary = Dictionary::new(QUICK_REPLACE_DICTIONARY, None, now);
                active.insert(0, dictionary.id.clone());
                dictionaries.push(dictionary);
                self.set_active(user_id, &active).await?;
                dictionaries.len() - 1
            }
        };

        let target = &mut dictionaries[target_index];
        let mut added = 0;
        for rule in rules.into_iter().filter(|r| !r.from.is_empty()) {
            target.terms.push(Term::new(rule.from, rule.to, now));
            added += 1;
        }
        target.updated_at = now;
        let target = target.clone();

        self.save(user_id, &dictionaries).await?;
        log::info!(
            "Dictionaries: {} saved {} quick-replace terms to {}",
            user_id,
            added,
            target.id
        );
        Ok((target, added))
    }

    /// Substitute using `ids`, or the stored active list when `ids` is None.
    ///
    /// Usage counters are not touched; call [`Self::increment_usage`] with the
    /// applied terms.
    pub async fn apply(
        &self,
        user_id: &str,
        text: &str,
        ids: Option<Vec<String>>,
    ) -> Result<Substitution, StoreError> {
        let dictionaries = self.list(user_id).await?;
        let active = match ids {
            Some(ids) => ids,
            None => self.active_ids(user_id).await?,
        };
        Ok(engine::apply(text, &dictionaries, &active))
    }

    /// Bump the usage counter of every term whose id is in `term_ids`.
    ///
    /// Returns how many terms were updated.
    pub async fn increment_usage(
        &self,
        user_id: &str,
        term_ids: &[String],
    ) -> Result<usize, StoreError> {
        if term_ids.is_empty() {
            return Ok(0);
        }
        let mut dictionaries = self.list(user_id).await?;
        let mut updated = 0;
        for term in dictionaries.iter_mut().flat_map(|d| d.terms.iter_mut()) {
            if term_ids.iter().any(|id| id == &term.id) {
                term.usage += 1;
                updated += 1;
            }
        }
        if updated > 0 {
            self.save(user_id, &dictionaries).await?;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::MemoryStore;

    fn store() -> DictionaryStore {
        DictionaryStore::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    fn input(from: &str, to: &str) -> TermInput {
        TermInput {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_add_and_apply() {
        let store = store();
        let dict = store.create("user001", "IT用語", None).await.unwrap();
        store
            .add_term("user001", &dict.id, input("AI", "人工知能"))
            .await
            .unwrap();
        store
            .set_active("user001", std::slice::from_ref(&dict.id))
            .await
            .unwrap();

        let result = store.apply("user001", "AIを使う", None).await.unwrap();
        assert_eq!(result.text, "人工知能を使う");
        assert_eq!(result.applied_terms.len(), 1);

        // Usage is only changed when explicitly recorded.
        assert_eq!(store.list("user001").await.unwrap()[0].terms[0].usage, 0);
        let ids: Vec<String> = result.applied_terms.iter().map(|t| t.id.clone()).collect();
        assert_eq!(store.increment_usage("user001", &ids).await.unwrap(), 1);
        assert_eq!(store.list("user001").await.unwrap()[0].terms[0].usage, 1);
    }

    #[tokio::test]
    async fn test_dictionaries_are_per_user() {
        let store = store();
        store.create("user001", "a", None).await.unwrap();
        assert!(store.list("user002").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_from_active_list() {
        let store = store();
        let a = store.create("u", "a", None).await.unwrap();
        let b = store.create("u", "b", None).await.unwrap();
        store
            .set_active("u", &[a.id.clone(), b.id.clone()])
            .await
            .unwrap();

        store.delete("u", &a.id).await.unwrap();
        assert_eq!(store.active_ids("u").await.unwrap(), vec![b.id.clone()]);
        assert_eq!(store.list("u").await.unwrap().len(), 1);

        assert!(matches!(
            store.delete("u", &a.id).await,
            Err(DictionaryError::DictionaryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete_term() {
        let store = store();
        let dict = store.create("u", "a", None).await.unwrap();
        let term = store.add_term("u", &dict.id, input("x", "y")).await.unwrap();

        let updated = store
            .update_term(
                "u",
                &dict.id,
                &term.id,
                TermUpdate {
                    from: None,
                    to: Some("z".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.from, "x");
        assert_eq!(updated.to, "z");

        store.delete_term("u", &dict.id, &term.id).await.unwrap();
        assert!(matches!(
            store.delete_term("u", &dict.id, &term.id).await,
            Err(DictionaryError::TermNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_export_then_import_assigns_new_id() {
        let store = store();
        let dict = store.create("u", "美容", Some("サロン".to_string())).await.unwrap();
        store.add_term("u", &dict.id, input("カット", "Cut")).await.unwrap();

        let json = store.export("u", &dict.id).await.unwrap();
        assert!(json.contains('\n'));

        let imported = store.import("u", &json).await.unwrap();
        assert_ne!(imported.id, dict.id);
        assert_eq!(imported.name, "美容");
        assert_eq!(imported.terms.len(), 1);
        assert_eq!(store.list("u").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_rejects_incomplete_json() {
        let store = store();
        assert!(matches!(
            store.import("u", r#"{"name": "x", "terms": []}"#).await,
            Err(DictionaryError::Invalid(_))
        ));
        assert!(matches!(
            store.import("u", "not json").await,
            Err(DictionaryError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_quick_replace_creates_dictionary_when_none_active() {
        let store = store();
        let (dict, added) = store
            .save_quick_replace("u", vec![input("えーと", ""), input("", "skip")])
            .await
            .unwrap();
        assert_eq!(dict.name, QUICK_REPLACE_DICTIONARY);
        assert_eq!(added, 1);
        assert_eq!(store.active_ids("u").await.unwrap(), vec![dict.id]);
    }

    #[tokio::test]
    async fn test_quick_replace_uses_first_active_dictionary() {
        let store = store();
        let a = store.create("u", "a", None).await.unwrap();
        let b = store.create("u", "b", None).await.unwrap();
        store.set_active("u", &[b.id.clone(), a.id.clone()]).await.unwrap();

        let (dict, _) = store
            .save_quick_replace("u", vec![input("foo", "bar")])
            .await
            .unwrap();
        assert_eq!(dict.id, b.id);
        let stored = store.list("u").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].terms.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_with_explicit_ids() {
        let store = store();
        let dict = store.create("u", "a", None).await.unwrap();
        store.add_term("u", &dict.id, input("犬", "イヌ")).await.unwrap();

        let none = store.apply("u", "犬", None).await.unwrap();
        assert_eq!(none.text, "犬");
        let explicit = store.apply("u", "犬", Some(vec![dict.id])).await.unwrap();
        assert_eq!(explicit.text, "イヌ");
    }
}

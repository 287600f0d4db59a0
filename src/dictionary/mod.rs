//! User glossaries and the substitution engine.

mod engine;
mod store;
mod types;

pub use engine::{apply, Substitution};
pub use store::{DictionaryError, DictionaryStore, QUICK_REPLACE_DICTIONARY};
pub use types::{Dictionary, DictionaryUpdate, Term, TermInput, TermUpdate};

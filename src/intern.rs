//! String interning scoped to one ingestion context.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError};

use foldhash::{HashMap, HashMapExt};

/// Equality used for interning and value filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StringComparer {
    /// Exact, code point by code point.
    #[default]
    Ordinal,
    /// Case-insensitive (Unicode simple lowercase).
    OrdinalIgnoreCase,
}

impl StringComparer {
    pub fn equals(&self, a: &str, b: &str) -> bool {
        match self {
            StringComparer::Ordinal => a == b,
            StringComparer::OrdinalIgnoreCase => {
                a.eq_ignore_ascii_case(b) || self.key(a) == self.key(b)
            }
        }
    }

    /// Normalized form: two strings are equal under the comparer iff their
    /// keys are equal.
    pub fn key<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            StringComparer::Ordinal => Cow::Borrowed(value),
            StringComparer::OrdinalIgnoreCase => Cow::Owned(value.to_lowercase()),
        }
    }
}

/// Deduplicating cache handing out one shared `Arc<str>` per distinct value.
///
/// The first occurrence of a value is stored; later values equal under the
/// pool's comparer get the stored one back. The pool only grows.
#[derive(Debug, Default)]
pub struct StringInternPool {
    comparer: StringComparer,
    values: Mutex<HashMap<String, Arc<str>>>,
}

impl StringInternPool {
    pub fn new(comparer: StringComparer) -> Self {
        Self {
            comparer,
            values: Mutex::new(HashMap::new()),
        }
    }

    pub fn comparer(&self) -> StringComparer {
        self.comparer
    }

    pub fn intern(&self, value: &str) -> Arc<str> {
        let key = self.comparer.key(value);
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stored) = values.get(key.as_ref()) {
            return Arc::clone(stored);
        }
        let stored: Arc<str> = Arc::from(value);
        values.insert(key.into_owned(), Arc::clone(&stored));
        stored
    }

    /// Number of distinct stored values.
    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Placeholder environment for generated handler code
//!
//! Handler code may contain `%KEY%` placeholders. Each placeholder whose key is known is
//! replaced literally by the key's value; unknown placeholders are left as they are.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Key holding the revision of the file a handler was compiled from
pub const FILE_REVISION_KEY: &str = "GIT_FILE_LAST_COMMIT";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%([^%\s]+)%").expect("placeholder pattern is valid"));

/// Ordered key/value table consulted during placeholder substitution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment, skipping non-UTF-8 entries
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Substitute every known placeholder in `code`
    pub fn substitute(&self, code: &str) -> String {
        Self::substitute_with(code, |key| self.get(key))
    }

    /// Substitute with [`FILE_REVISION_KEY`] bound to `revision` for this call only
    pub fn substitute_for_revision(&self, code: &str, revision: &str) -> String {
        Self::substitute_with(code, |key| {
            if key == FILE_REVISION_KEY {
                Some(revision)
            } else {
                self.get(key)
            }
        })
    }

    /// Single left-to-right pass; inserted values are never scanned again
    fn substitute_with<'v>(code: &str, lookup: impl Fn(&str) -> Option<&'v str>) -> String {
        let mut out = String::with_capacity(code.len());
        let mut pos = 0;
        while let Some(captures) = PLACEHOLDER.captures_at(code, pos) {
            let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
                break;
            };
            if let Some(value) = lookup(key.as_str()) {
                out.push_str(&code[pos..whole.start()]);
                out.push_str(value);
                pos = whole.end();
            } else {
                // the closing `%` may open the next placeholder
                let next = whole.start() + 1;
                out.push_str(&code[pos..next]);
                pos = next;
            }
        }
        out.push_str(&code[pos..]);
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Environment {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.vars
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

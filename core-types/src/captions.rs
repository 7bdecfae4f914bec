use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Language code used for the untranslated caption.
pub const DEFAULT_LANGUAGE: &str = "x-default";

/// Localized text keyed by language code (RFC 3066 style, plus `x-default`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptionsMap(BTreeMap<String, String>);

impl CaptionsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a map holding only the default-language text.
    pub fn from_default(text: impl Into<String>) -> Self {
        let mut map = Self::new();
        map.insert(DEFAULT_LANGUAGE, text);
        map
    }

    /// Inserts a caption; blank text removes the language instead.
    pub fn insert(&mut self, language: impl Into<String>, text: impl Into<String>) {
        let language = language.into();
        let text = text.into();
        if text.trim().is_empty() {
            self.0.remove(&language);
        } else {
            self.0.insert(language, text);
        }
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.0.get(language).map(String::as_str)
    }

    pub fn default_text(&self) -> Option<&str> {
        self.get(DEFAULT_LANGUAGE)
    }

    pub fn remove(&mut self, language: &str) -> Option<String> {
        self.0.remove(language)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CaptionsMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (language, text) in iter {
            map.insert(language, text);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_not_stored() {
        let mut map = CaptionsMap::from_default("Harbour");
        map.insert("de-DE", "   ");
        assert_eq!(map.len(), 1);
        map.insert(DEFAULT_LANGUAGE, "");
        assert!(map.is_empty());
    }

    #[test]
    fn serializes_as_plain_object() {
        let map: CaptionsMap = [("x-default", "Sunset"), ("fr-FR", "Coucher")].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"fr-FR":"Coucher","x-default":"Sunset"}"#);
    }
}

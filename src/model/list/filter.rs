//! Filter/sort criteria and their epoch identity
//!
//! A `FilterEpoch` is the canonical serialization of a `ListQuery`. Two queries with the same
//! criteria always produce the same epoch regardless of the order filters were added in, so
//! the epoch can be compared to decide whether a list must be reset.

use std::collections::BTreeMap;

use derive_deref::Deref;
use serde::Serialize;

/// Active filter, sort and search parameters of one list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    filters: BTreeMap<String, String>,
}

/// Identity of the filter state that produced a list's items
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deref)]
pub struct FilterEpoch(String);

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Set the search text. Blank text is the same as no search.
    pub fn with_search(mut self, search: impl AsRef<str>) -> Self {
        let search = search.as_ref().trim();
        self.search = (!search.is_empty()).then(|| search.to_string());
        self
    }

    /// Add an arbitrary filter. An empty value removes the filter.
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.filters.remove(&key);
        } else {
            self.filters.insert(key, value);
        }
        self
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters.get(key).map(String::as_str)
    }

    pub fn epoch(&self) -> FilterEpoch {
        // Serializing a struct of strings and a BTreeMap cannot fail
        FilterEpoch(serde_json::to_string(self).unwrap_or_default())
    }

    /// Request query parameters, in a stable order
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 2);
        if let Some(sort) = &self.sort {
            params.push(("sort".to_string(), sort.clone()));
        }
        if let Some(search) = &self.search {
            params.push(("search".to_string(), search.clone()));
        }
        params.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

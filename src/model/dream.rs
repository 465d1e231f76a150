//! Dream journal entries and their AI analysis records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{
    item::{Item, Nested},
    list::ListQuery,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Interpretation produced asynchronously for a dream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(alias = "_id")]
    pub id: String,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dream {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
}

impl Item for Dream {
    fn id(&self) -> &str {
        &self.id
    }

    fn nested(&self) -> Option<Nested<'_>> {
        self.analysis.as_ref().map(|analysis| Nested {
            field: "analysis",
            id: &analysis.id,
        })
    }
}

impl Dream {
    pub fn analysis_status(&self) -> Option<AnalysisStatus> {
        self.analysis.as_ref().map(|analysis| analysis.status)
    }

    /// Whether the analysis job is still running
    pub fn is_analyzing(&self) -> bool {
        matches!(
            self.analysis_status(),
            Some(AnalysisStatus::Pending | AnalysisStatus::Processing)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DreamSort {
    #[default]
    Recent,
    Oldest,
}

/// Criteria of the personal dream list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DreamFilter {
    pub sort: DreamSort,
    pub search: String,
    pub mood: Option<String>,
    pub tag: Option<String>,
}

impl DreamFilter {
    pub fn to_query(&self) -> ListQuery {
        ListQuery::new()
            .with_sort(self.sort.to_string())
            .with_search(&self.search)
            .with_filter("mood", self.mood.clone().unwrap_or_default())
            .with_filter("tag", self.tag.clone().unwrap_or_default())
    }
}

use serde::{Deserialize, Serialize};

/// One entry of the document store's listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
}

/// A listed document together with its client-side selection flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

impl From<DocumentSummary> for DocumentRef {
    fn from(summary: DocumentSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            selected: false,
        }
    }
}

/// Derived information about one document, produced by the document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightBundle {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Named entities. Order carries no meaning.
    #[serde(default)]
    pub entities: Vec<String>,
}

impl InsightBundle {
    pub fn has_entity(&self, label: &str) -> bool {
        self.entities.iter().any(|e| e == label)
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// A user supplied selector. Exactly one field may be set; blank strings
/// count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
}

/// A validated single selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Index(usize),
    Id(String),
    /// Exact (case-insensitive) label, value or nearby label.
    Label(String),
    /// Substring of label, value, nearby label or role.
    Contains(String),
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl SelectorQuery {
    pub fn index(index: usize) -> Self {
        SelectorQuery {
            index: Some(index),
            ..Default::default()
        }
    }

    pub fn id(id: impl Into<String>) -> Self {
        SelectorQuery {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        SelectorQuery {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn contains(text: impl Into<String>) -> Self {
        SelectorQuery {
            contains: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        usize::from(self.index.is_some())
            + usize::from(non_blank(&self.id).is_some())
            + usize::from(non_blank(&self.label).is_some())
            + usize::from(non_blank(&self.contains).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn selector(&self) -> Result<Selector> {
        match self.count() {
            0 => Err(SimError::usage(
                "selector is required: --index|--id|--label|--contains",
            )),
            1 => {
                if let Some(index) = self.index {
                    Ok(Selector::Index(index))
                } else if let Some(id) = non_blank(&self.id) {
                    Ok(Selector::Id(id.to_string()))
                } else if let Some(label) = non_blank(&self.label) {
                    Ok(Selector::Label(label.to_string()))
                } else {
                    Ok(Selector::Contains(
                        non_blank(&self.contains).unwrap_or_default().to_string(),
                    ))
                }
            }
            _ => Err(SimError::usage(
                "choose only one selector: --index|--id|--label|--contains",
            )),
        }
    }
}

impl Selector {
    /// The free-text part of the selector, used by fallback heuristics.
    pub fn text(&self) -> Option<&str> {
        match self {
            Selector::Label(s) | Selector::Contains(s) => Some(s),
            _ => None,
        }
    }

    /// Index and id selectors address a saved frame directly.
    pub fn is_direct(&self) -> bool {
        matches!(self, Selector::Index(_) | Selector::Id(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Selector::Index(_) => "index",
            Selector::Id(_) => "id",
            Selector::Label(_) => "label",
            Selector::Contains(_) => "contains",
        }
    }
}

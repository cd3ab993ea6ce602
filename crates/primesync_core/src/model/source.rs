//! Bibliography item (`Source`), authors and authorship ordering.
//!
//! # Invariants
//! - `authors` order is the authorship order; positions are 1-based and dense.
//! - Author names are compared by `normalize_author_name`.

use crate::model::ids::PrimeId;
use crate::model::{require_text, RecordValidationError};
use serde::{Deserialize, Serialize};

/// Citable bibliography record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub prime_id: PrimeId,
    pub title: String,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub volume: Option<String>,
    pub pages: Option<String>,
    /// Never populated from interchange documents.
    pub doi: Option<String>,
    /// Author names in authorship order.
    pub authors: Vec<String>,
}

/// One position in the author list of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorship {
    /// 1-based position.
    pub order: u32,
    pub author: String,
}

impl Source {
    /// Creates a source with only the required fields set.
    pub fn new(prime_id: PrimeId, title: impl Into<String>) -> Self {
        Self {
            prime_id,
            title: title.into(),
            journal: None,
            year: None,
            volume: None,
            pages: None,
            doi: None,
            authors: Vec::new(),
        }
    }

    /// Returns the dense 1-based authorship sequence.
    pub fn authorships(&self) -> Vec<Authorship> {
        self.authors
            .iter()
            .enumerate()
            .map(|(index, author)| Authorship {
                order: u32::try_from(index + 1).unwrap_or(u32::MAX),
                author: author.clone(),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        require_text("title", &self.title)?;
        for author in &self.authors {
            if normalize_author_name(author).is_empty() {
                return Err(RecordValidationError::new("author", "must not be blank"));
            }
        }
        Ok(())
    }
}

/// Normalizes an author name into its deduplication key.
///
/// Leading/trailing whitespace is dropped and inner runs collapse to one
/// space. Case is preserved.
pub fn normalize_author_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{normalize_author_name, Source};
    use crate::model::ids::{EntityKind, PrimeId};

    #[test]
    fn authorships_are_dense_and_one_based() {
        let mut source = Source::new(PrimeId::new(EntityKind::Bibliography, 1).unwrap(), "T");
        source.authors = vec!["C".into(), "A".into(), "B".into()];
        let orders: Vec<(u32, String)> = source
            .authorships()
            .into_iter()
            .map(|a| (a.order, a.author))
            .collect();
        assert_eq!(
            orders,
            vec![(1, "C".into()), (2, "A".into()), (3, "B".into())]
        );
    }

    #[test]
    fn author_names_normalize_whitespace_only() {
        assert_eq!(normalize_author_name("  W.  Tsang\n"), "W. Tsang");
        assert_ne!(normalize_author_name("w. tsang"), normalize_author_name("W. Tsang"));
    }

    #[test]
    fn blank_title_is_rejected() {
        let source = Source::new(PrimeId::new(EntityKind::Bibliography, 1).unwrap(), "  ");
        assert_eq!(source.validate().unwrap_err().field, "title");
    }
}

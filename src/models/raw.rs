//! Source-specific candidate items, before normalization.

use std::collections::BTreeMap;

/// An author as reported by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAuthor {
    /// Structured name parts (scholarly metadata)
    Structured {
        given: Option<String>,
        family: Option<String>,
    },
    /// A free-form name string (feeds)
    Plain(String),
}

/// A date as reported by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDate {
    /// A date string in any of the formats the date parser tolerates
    Text(String),
    /// Crossref `date-parts`: year, optional month, optional day
    Parts(Vec<Option<i32>>),
}

/// Candidate date fields of a raw item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateCandidates {
    pub online: Option<RawDate>,
    pub print: Option<RawDate>,
    pub created: Option<RawDate>,
    pub published: Option<RawDate>,
    pub updated: Option<RawDate>,
}

impl DateCandidates {
    /// Candidates in resolution order: online, print, created, published, updated.
    pub fn in_precedence(&self) -> impl Iterator<Item = &RawDate> {
        [
            &self.online,
            &self.print,
            &self.created,
            &self.published,
            &self.updated,
        ]
        .into_iter()
        .flatten()
    }
}

/// A candidate record produced by a source fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Persistent identifier (DOI); preferred over `link` as dedup key
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<RawAuthor>,
    pub dates: DateCandidates,
    pub extra: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_skips_missing() {
        let dates = DateCandidates {
            created: Some(RawDate::Text("c".into())),
            updated: Some(RawDate::Text("u".into())),
            print: Some(RawDate::Parts(vec![Some(2020)])),
            ..DateCandidates::default()
        };
        let order: Vec<_> = dates.in_precedence().cloned().collect();
        assert_eq!(
            order,
            vec![
                RawDate::Parts(vec![Some(2020)]),
                RawDate::Text("c".into()),
                RawDate::Text("u".into()),
            ]
        );
    }
}

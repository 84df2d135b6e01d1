// Query-string shapes for the read/list surface (spec.md §4.4, §6.2).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReadQuery {
    /// `i=k` or `i=a:b`.
    pub i: Option<String>,
    pub limit: Option<i64>,
    pub after: Option<i64>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub recursive: bool,
    pub fields: Option<String>,
    pub truncate: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSelector {
    Single(i64),
    Range(i64, i64),
}

impl ReadQuery {
    pub fn index_selector(&self) -> Option<IndexSelector> {
        let raw = self.i.as_deref()?;
        if let Some((a, b)) = raw.split_once(':') {
            let a: i64 = a.parse().ok()?;
            let b: i64 = b.parse().ok()?;
            Some(IndexSelector::Range(a, b))
        } else {
            raw.parse().ok().map(IndexSelector::Single)
        }
    }

    pub fn is_index_query(&self) -> bool {
        self.i.is_some() || self.recursive
    }

    pub fn field_list(&self) -> Option<Vec<String>> {
        self.fields
            .as_deref()
            .map(|s| s.split(',').map(|f| f.trim().to_string()).collect())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeleteQuery {
    #[serde(default)]
    pub purge: bool,
    #[serde(default)]
    pub stream: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_index() {
        let q = ReadQuery {
            i: Some("-1".to_string()),
            ..Default::default()
        };
        assert_eq!(q.index_selector(), Some(IndexSelector::Single(-1)));
    }

    #[test]
    fn parses_range_index() {
        let q = ReadQuery {
            i: Some("0:5".to_string()),
            ..Default::default()
        };
        assert_eq!(q.index_selector(), Some(IndexSelector::Range(0, 5)));
    }

    #[test]
    fn recursive_counts_as_index_query() {
        let q = ReadQuery {
            recursive: true,
            ..Default::default()
        };
        assert!(q.is_index_query());
    }
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One product as it appears on the listing page.
///
/// `url` is the identity key: two records with the same URL are the same
/// product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

/// Drop records whose URL was already seen. First occurrence wins and the
/// relative order of the survivors is kept.
pub fn dedup_by_url(records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, url: &str) -> ProductRecord {
        ProductRecord {
            name: name.into(),
            url: url.into(),
            price: None,
            color: None,
            sku: None,
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let out = dedup_by_url(vec![
            record("a", "/p/1"),
            record("b", "/p/2"),
            record("a-again", "/p/1"),
            record("c", "/p/3"),
        ]);
        let names: Vec<_> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let json = serde_json::to_value(record("Kelly", "/p/1")).unwrap_or_default();
        assert_eq!(json["name"], "Kelly");
        assert!(json.get("price").is_none());
    }
}

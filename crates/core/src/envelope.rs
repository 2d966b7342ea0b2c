//! Normalisation of the list response shapes older callers and data sources still send.

use serde::Deserialize;

use crate::listing::Page;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    #[serde(rename_all = "camelCase")]
    Canonical { items: Vec<T>, total_count: u64 },
    #[serde(rename_all = "camelCase")]
    Paged { content: Vec<T>, total_elements: u64 },
    Wrapped { data: WrappedContent<T> },
    Bare(Vec<T>),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WrappedContent<T> {
    pub content: Vec<T>,
    pub total: u64,
}

impl<T> ListEnvelope<T> {
    pub fn into_page(self, page: u32, page_size: u32) -> Page<T> {
        let (items, total_count) = match self {
            Self::Canonical { items, total_count } => (items, total_count),
            Self::Paged { content, total_elements } => (content, total_elements),
            Self::Wrapped { data } => (data.content, data.total),
            Self::Bare(items) => {
                let total = items.len() as u64;
                (items, total)
            }
        };
        Page { items, total_count, page, page_size }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ListEnvelope;

    fn parse(value: serde_json::Value) -> ListEnvelope<String> {
        serde_json::from_value(value).expect("known envelope shape")
    }

    #[test]
    fn every_legacy_shape_normalises_to_the_same_page() {
        let shapes = [
            json!({ "items": ["a", "b"], "totalCount": 7 }),
            json!({ "content": ["a", "b"], "totalElements": 7 }),
            json!({ "data": { "content": ["a", "b"], "total": 7 } }),
        ];

        for shape in shapes {
            let page = parse(shape).into_page(2, 2);
            assert_eq!(page.items, vec!["a".to_owned(), "b".to_owned()]);
            assert_eq!(page.total_count, 7);
            assert_eq!((page.page, page.page_size), (2, 2));
        }
    }

    #[test]
    fn bare_array_counts_its_own_items() {
        let page = parse(json!(["only"])).into_page(1, 20);
        assert_eq!(page.total_count, 1);
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let result = serde_json::from_value::<ListEnvelope<String>>(json!({ "rows": [] }));
        assert!(result.is_err());
    }
}

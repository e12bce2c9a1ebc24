use serde::Deserialize;

/// One page of a paged list response.
///
/// `nextLink` points at the following page and is absent (or empty) on the
/// last one. Some list endpoints omit `value` entirely when the collection
/// is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn last_page_has_no_next_link() {
        let page: ListResponse<Value> =
            serde_json::from_value(json!({"value": [{"id": "a"}]})).unwrap();
        assert_eq!(page.value.len(), 1);
        assert_eq!(page.next_link, None);
    }

    #[test]
    fn missing_value_deserializes_as_empty() {
        let page: ListResponse<Value> =
            serde_json::from_value(json!({"nextLink": "https://example.test/page2"})).unwrap();
        assert!(page.value.is_empty());
        assert_eq!(page.next_link.as_deref(), Some("https://example.test/page2"));
    }
}

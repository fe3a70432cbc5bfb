use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::categories::repo_types::Category;
use crate::records::{RecordStore, StoreError, StoreResult, CATEGORIES};

pub(crate) fn is_valid_color(color: &str) -> bool {
    lazy_static! {
        static ref COLOR_RE: Regex = Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap();
    }
    COLOR_RE.is_match(color)
}

impl Category {
    pub async fn list(store: &RecordStore) -> StoreResult<Vec<Category>> {
        store.load(CATEGORIES).await
    }

    pub async fn create(store: &RecordStore, name: &str, color: &str) -> StoreResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            warn!("category without name");
            return Err(StoreError::InvalidInput("category name is required".into()));
        }
        if !is_valid_color(color) {
            warn!(color, "bad category color");
            return Err(StoreError::InvalidInput(format!("invalid color: {color}")));
        }

        let _guard = store.lock(CATEGORIES).await;
        let mut categories: Vec<Category> = store.load(CATEGORIES).await?;
        let floor = categories.iter().map(|c| c.id).max().unwrap_or(0);
        let category = Category {
            id: store.next_id(floor),
            name: name.to_string(),
            color: color.to_string(),
        };
        categories.push(category.clone());
        store.save(CATEGORIES, &categories).await?;

        info!(category_id = category.id, name = %category.name, "category created");
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::memory_store;

    #[test]
    fn color_validation() {
        assert!(is_valid_color("#000000"));
        assert!(is_valid_color("#4CAF50"));
        assert!(is_valid_color("#fff"));
        assert!(!is_valid_color("000000"));
        assert!(!is_valid_color("#12345"));
        assert!(!is_valid_color("#gggggg"));
    }

    #[tokio::test]
    async fn create_and_list() {
        let (_, store) = memory_store();
        assert!(Category::list(&store).await.unwrap().is_empty());

        let work = Category::create(&store, "  Work ", "#007AFF").await.unwrap();
        let home = Category::create(&store, "Home", "#4CAF50").await.unwrap();
        assert_eq!(work.name, "Work");
        assert_ne!(work.id, home.id);

        let all = Category::list(&store).await.unwrap();
        assert_eq!(all, vec![work, home]);
    }

    #[tokio::test]
    async fn invalid_input_writes_nothing() {
        let (_, store) = memory_store();
        let err = Category::create(&store, "   ", "#000000").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        let err = Category::create(&store, "Errands", "red").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        assert!(Category::list(&store).await.unwrap().is_empty());
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TransactionKind, UserId, ValidationError, require_text};

pub type CategoryId = Uuid;

/// Color token used when a transaction's category cannot be resolved.
pub const NEUTRAL_COLOR: &str = "#9ca3af";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub user_id: UserId,
    pub name: String,
    pub color: String,
    pub kind: TransactionKind,
}

impl Category {
    pub fn new(
        user_id: UserId,
        name: &str,
        color: Option<String>,
        kind: TransactionKind,
    ) -> Result<Self, ValidationError> {
        let name = require_text("name", name)?;
        let color = color
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| NEUTRAL_COLOR.to_string());

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            color,
            kind,
        })
    }

    /// Case-insensitive name comparison.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

/// Resolve the category a transaction key refers to. Keys are either a
/// category id or a free-text category name (as written on receipts).
pub fn resolve_category<'a>(key: &str, categories: &'a [Category]) -> Option<&'a Category> {
    categories
        .iter()
        .find(|c| c.id.to_string() == key)
        .or_else(|| categories.iter().find(|c| c.matches_name(key)))
}

/// Display color for a category key, falling back to [`NEUTRAL_COLOR`].
pub fn category_color(key: &str, categories: &[Category]) -> String {
    resolve_category(key, categories)
        .map(|c| c.color.clone())
        .unwrap_or_else(|| NEUTRAL_COLOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        let user = Uuid::new_v4();
        vec![
            Category::new(
                user,
                "Food",
                Some("#f97316".into()),
                TransactionKind::Expense,
            )
            .unwrap(),
            Category::new(user, "Salary", None, TransactionKind::Income).unwrap(),
        ]
    }

    #[test]
    fn test_default_color_is_neutral() {
        let cats = categories();
        assert_eq!(cats[1].color, NEUTRAL_COLOR);
    }

    #[test]
    fn test_resolve_by_id() {
        let cats = categories();
        let key = cats[0].id.to_string();
        assert_eq!(resolve_category(&key, &cats).map(|c| c.name.as_str()), Some("Food"));
    }

    #[test]
    fn test_resolve_by_name_case_insensitive() {
        let cats = categories();
        assert_eq!(
            resolve_category("FOOD", &cats).map(|c| c.id),
            Some(cats[0].id)
        );
        assert_eq!(category_color("food", &cats), "#f97316");
    }

    #[test]
    fn test_unknown_category_falls_back_to_neutral() {
        let cats = categories();
        assert!(resolve_category("Travel", &cats).is_none());
        assert_eq!(category_color("Travel", &cats), NEUTRAL_COLOR);
    }

    #[test]
    fn test_category_requires_name() {
        assert!(Category::new(Uuid::new_v4(), "  ", None, TransactionKind::Expense).is_err());
    }
}

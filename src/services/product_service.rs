//! Product catalog reads.

use crate::{db::DbPool, error::AppError, models::product::Product};

/// Maximum number of products a search returns.
const SEARCH_LIMIT: i64 = 4;

/// Escape `LIKE` wildcards so the search term matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// List the catalog, or search it by name.
///
/// A search is case-insensitive, ordered by name descending and capped at
/// four results. A blank search lists everything.
pub async fn list_products(pool: &DbPool, search: Option<&str>) -> Result<Vec<Product>, AppError> {
    let products = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            sqlx::query_as::<_, Product>(
                r#"
                SELECT * FROM products
                WHERE name ILIKE $1
                ORDER BY name DESC
                LIMIT $2
                "#,
            )
            .bind(like_pattern(term))
            .bind(SEARCH_LIMIT)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at, name")
                .fetch_all(pool)
                .await?
        }
    };

    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("mug"), "%mug%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}

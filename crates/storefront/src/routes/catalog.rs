//! Catalog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use palermo_core::StockStatus;
use serde::Deserialize;
use tracing::instrument;

use crate::api::Product;
use crate::filters;
use crate::state::AppState;

// =============================================================================
// Product View
// =============================================================================

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: String,
    pub image: String,
    pub stock: u32,
    pub stock_label: &'static str,
    /// CSS modifier for the stock badge.
    pub stock_class: &'static str,
    pub last_units: bool,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        let status = product.stock_status();
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            description: product
                .description
                .clone()
                .filter(|d| !d.trim().is_empty()),
            category: product.category.clone(),
            price: product.price.display(),
            image: product.image_path(),
            stock: product.stock,
            stock_label: status.label(),
            stock_class: stock_class(status),
            last_units: product.is_last_units(),
        }
    }
}

const fn stock_class(status: StockStatus) -> &'static str {
    match status {
        StockStatus::OutOfStock => "stock--out",
        StockStatus::Low => "stock--low",
        StockStatus::InStock => "stock--ok",
    }
}

// =============================================================================
// Filtering
// =============================================================================

/// Catalog query string.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub q: Option<String>,
    pub category: Option<String>,
}

impl CatalogQuery {
    fn search(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Whether `product` matches the search text and category.
    ///
    /// Search is a case-insensitive substring match on name or category.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let search_ok = self.search().is_none_or(|q| {
            product.name.to_lowercase().contains(&q)
                || product.category.to_lowercase().contains(&q)
        });
        let category_ok = self
            .category()
            .is_none_or(|c| product.category.eq_ignore_ascii_case(c));
        search_ok && category_ok
    }
}

/// Distinct categories in display order.
fn categories(products: &[Product]) -> Vec<String> {
    let mut categories: Vec<String> = products
        .iter()
        .map(|p| p.category.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    categories.sort_unstable_by_key(|c| c.to_lowercase());
    categories.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    categories
}

// =============================================================================
// Handlers
// =============================================================================

/// A category chip in the catalog filter bar.
#[derive(Clone)]
pub struct CategoryLink {
    pub name: String,
    pub active: bool,
}

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog.html")]
pub struct CatalogTemplate {
    pub products: Vec<ProductView>,
    pub categories: Vec<CategoryLink>,
    pub query: String,
    pub selected_category: String,
    /// Shown instead of the grid when the API could not be reached.
    pub error: Option<String>,
}

/// Display the catalog: active, in-stock products filtered by `q` and
/// `category`.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> CatalogTemplate {
    let (products, error) = match state.api().listed_products().await {
        Ok(products) => (products, None),
        Err(e) => {
            tracing::error!("Failed to fetch catalog: {e}");
            (Vec::new(), Some(e.user_message()))
        }
    };

    let selected_category = query.category().unwrap_or_default().to_string();

    CatalogTemplate {
        categories: categories(&products)
            .into_iter()
            .map(|name| CategoryLink {
                active: name.eq_ignore_ascii_case(&selected_category),
                name,
            })
            .collect(),
        products: products
            .iter()
            .filter(|p| query.matches(p))
            .map(ProductView::from)
            .collect(),
        query: query.q.clone().unwrap_or_default(),
        selected_category,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::tests::product;

    fn named(id: i64, name: &str, category: &str) -> Product {
        Product {
            name: name.to_string(),
            category: category.to_string(),
            ..product(id, 100, 5)
        }
    }

    fn query(q: Option<&str>, category: Option<&str>) -> CatalogQuery {
        CatalogQuery {
            q: q.map(String::from),
            category: category.map(String::from),
        }
    }

    #[test]
    fn test_search_matches_name_or_category() {
        let sofa = named(1, "Sofá Milano", "Living");
        let table = named(2, "Mesa Roble", "Comedor");

        let q = query(Some("  living "), None);
        assert!(q.matches(&sofa));
        assert!(!q.matches(&table));

        let q = query(Some("ROBLE"), None);
        assert!(q.matches(&table));
    }

    #[test]
    fn test_category_filter_is_exact() {
        let sofa = named(1, "Sofá Milano", "Living");
        assert!(query(None, Some("living")).matches(&sofa));
        assert!(!query(None, Some("Liv")).matches(&sofa));
        assert!(query(Some(""), Some("")).matches(&sofa));
    }

    #[test]
    fn test_categories_are_distinct_and_sorted() {
        let products = vec![
            named(1, "a", "Living"),
            named(2, "b", "comedor"),
            named(3, "c", "living"),
            named(4, "d", " "),
        ];
        assert_eq!(categories(&products), vec!["comedor", "Living"]);
    }

    #[test]
    fn test_product_view_formatting() {
        let mut p = named(9, "Lámpara de pie", "Iluminación");
        p.stock = 3;
        p.min_stock = 5;
        let view = ProductView::from(&p);

        assert_eq!(view.price, "$100.00");
        assert!(view.last_units);
        assert_eq!(view.stock_label, p.stock_status().label());
        assert!(view.image.ends_with(".svg"));
    }
}

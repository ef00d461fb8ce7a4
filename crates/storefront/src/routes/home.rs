//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use super::catalog::ProductView;
use crate::filters;
use crate::state::AppState;

/// Number of products featured on the home page.
const FEATURED_PRODUCTS: usize = 8;

/// A room shortcut linking to a filtered catalog.
pub struct RoomLink {
    pub label: &'static str,
    pub category: &'static str,
    pub image: &'static str,
}

const ROOMS: &[RoomLink] = &[
    RoomLink {
        label: "Living room",
        category: "Living",
        image: "/static/img/sofa.svg",
    },
    RoomLink {
        label: "Dining room",
        category: "Comedor",
        image: "/static/img/table.svg",
    },
    RoomLink {
        label: "Bedroom",
        category: "Dormitorio",
        image: "/static/img/bed.svg",
    },
    RoomLink {
        label: "Home office",
        category: "Oficina",
        image: "/static/img/desk.svg",
    },
];

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub featured: Vec<ProductView>,
    pub rooms: &'static [RoomLink],
    pub error: Option<String>,
}

/// Display the home page with the first listed products.
#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> HomeTemplate {
    let (featured, error) = match state.api().listed_products().await {
        Ok(products) => (
            products
                .iter()
                .take(FEATURED_PRODUCTS)
                .map(ProductView::from)
                .collect(),
            None,
        ),
        Err(e) => {
            tracing::error!("Failed to fetch featured products: {e}");
            (Vec::new(), Some(e.user_message()))
        }
    };

    HomeTemplate {
        featured,
        rooms: ROOMS,
        error,
    }
}

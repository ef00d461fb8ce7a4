//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Each request loads the visitor's cart from the session, applies one
//! mutation (which persists it back) and renders a fragment. Without HTMX the
//! same endpoints redirect to the cart page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Response},
};
use palermo_core::ProductId;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{is_htmx, redirect};
use crate::cart::{CartEntry, CartState, CartStore, SessionStorage};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::state::AppState;

/// HTMX event fired after every cart change; the header badge listens for it.
const CART_UPDATED_EVENT: &str = "cart-updated";

// =============================================================================
// Views
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub product_id: i64,
    pub name: String,
    pub category: String,
    pub image: String,
    pub price: String,
    pub quantity: u32,
    pub subtotal: String,
    /// Whether the "+" control is enabled.
    pub can_increment: bool,
    pub next_quantity: u32,
    /// Whether the "-" control is enabled. Removing goes through "Remove".
    pub can_decrement: bool,
    pub previous_quantity: u32,
    /// Non-blocking note when the quantity passes known stock.
    pub warning: Option<String>,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<&CartState> for CartView {
    fn from(cart: &CartState) -> Self {
        Self {
            lines: cart
                .entries()
                .iter()
                .map(|entry| line_view(cart, entry))
                .collect(),
            total: cart.total().display(),
            item_count: cart.item_count(),
        }
    }
}

fn line_view(cart: &CartState, entry: &CartEntry) -> CartLineView {
    let product = &entry.product;
    CartLineView {
        product_id: product.id.as_i64(),
        name: product.name.clone(),
        category: product.category.clone(),
        image: product.image_path(),
        price: product.price.display(),
        quantity: entry.quantity,
        subtotal: entry.subtotal().display(),
        can_increment: entry.can_increment(),
        next_quantity: entry.quantity.saturating_add(1),
        can_decrement: entry.can_decrement(),
        previous_quantity: entry.quantity.saturating_sub(1),
        warning: cart.stock_check(product.id).warning(),
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the visitor's cart from their session.
pub(crate) async fn load_cart(session: &Session) -> CartStore<SessionStorage> {
    CartStore::load(SessionStorage::new(session.clone())).await
}

// =============================================================================
// Forms and Templates
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

/// Update cart form data. Zero or negative removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Respond to a cart mutation: the items fragment for HTMX, a redirect to
/// the cart page otherwise.
fn items_response(headers: &HeaderMap, cart: &CartState) -> Response {
    if !is_htmx(headers) {
        return redirect(headers, "/cart");
    }
    (
        AppendHeaders([("HX-Trigger", CART_UPDATED_EVENT)]),
        CartItemsTemplate {
            cart: CartView::from(cart),
        },
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(session))]
pub async fn show(session: Session) -> CartShowTemplate {
    let cart = load_cart(&session).await;
    CartShowTemplate {
        cart: CartView::from(cart.state()),
    }
}

/// Add item to cart (HTMX).
///
/// The product is read from the API at this moment; its price and stock are
/// stored with the cart line. Returns the updated count badge and triggers
/// `cart-updated`.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product = state.api().get_product(form.product_id).await?;
    if !product.is_listed() {
        return Err(AppError::BadRequest(format!(
            "{} is not available right now",
            product.name
        )));
    }

    let mut cart = load_cart(&session).await;
    let check = cart.add_to_cart(&product, form.quantity.unwrap_or(1)).await;
    if check.is_exceeded() {
        tracing::info!(product_id = %product.id, ?check, "Cart quantity above known stock");
    }

    let product_id = product.id.to_string();
    add_breadcrumb("cart", "Added product", Some(&[("product_id", product_id.as_str())]));

    if !is_htmx(&headers) {
        return Ok(redirect(&headers, "/cart"));
    }
    Ok((
        AppendHeaders([("HX-Trigger", CART_UPDATED_EVENT)]),
        CartCountTemplate {
            count: cart.item_count(),
        },
    )
        .into_response())
}

/// Update item quantity (HTMX). Returns the cart items fragment.
#[instrument(skip(session, headers))]
pub async fn update(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let mut cart = load_cart(&session).await;
    let check = cart.update_quantity(form.product_id, form.quantity).await;
    if check.is_exceeded() {
        tracing::info!(product_id = %form.product_id, ?check, "Cart quantity above known stock");
    }

    items_response(&headers, cart.state())
}

/// Remove item from cart (HTMX). Returns the cart items fragment.
#[instrument(skip(session, headers))]
pub async fn remove(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let mut cart = load_cart(&session).await;
    cart.remove_from_cart(form.product_id).await;

    items_response(&headers, cart.state())
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> CartCountTemplate {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        http::StatusCode,
        routing::{get, post},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::cart::tests::product;
    use crate::routes::testing::{body_text, cart_lines, form_post, seeded_cookie, with_sessions};

    fn app() -> Router {
        with_sessions(
            Router::new()
                .route("/cart/update", post(update))
                .route("/cart/remove", post(remove))
                .route("/cart/count", get(count)),
        )
    }

    #[tokio::test]
    async fn test_cart_survives_across_requests() {
        let app = app();
        let cookie = seeded_cookie(&app).await;

        assert_eq!(cart_lines(&app, &cookie).await, "2/3");

        let request = axum::http::Request::get("/cart/count")
            .header(axum::http::header::COOKIE, &cookie)
            .body(axum::body::Body::empty())
            .unwrap();
        let body = body_text(app.clone().oneshot(request).await.unwrap()).await;
        assert!(body.contains(">3</span>"));
    }

    #[tokio::test]
    async fn test_update_sets_quantity_and_returns_items_fragment() {
        let app = app();
        let cookie = seeded_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(form_post("/cart/update", &cookie, "product_id=1&quantity=5", true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("HX-Trigger").map(|v| v.as_bytes()),
            Some(&b"cart-updated"[..])
        );
        let body = body_text(response).await;
        assert!(body.contains("id=\"cart-items\""));
        assert!(body.contains("$550.00"));
        assert_eq!(cart_lines(&app, &cookie).await, "2/6");
    }

    #[tokio::test]
    async fn test_update_to_zero_or_negative_removes_line() {
        let app = app();
        let cookie = seeded_cookie(&app).await;

        app.clone()
            .oneshot(form_post("/cart/update", &cookie, "product_id=1&quantity=0", true))
            .await
            .unwrap();
        assert_eq!(cart_lines(&app, &cookie).await, "1/1");

        app.clone()
            .oneshot(form_post("/cart/update", &cookie, "product_id=2&quantity=-3", true))
            .await
            .unwrap();
        assert_eq!(cart_lines(&app, &cookie).await, "0/0");
    }

    #[tokio::test]
    async fn test_remove_without_htmx_redirects_to_cart() {
        let app = app();
        let cookie = seeded_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(form_post("/cart/remove", &cookie, "product_id=2", false))
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers().get("location").map(|v| v.as_bytes()),
            Some(&b"/cart"[..])
        );
        assert_eq!(cart_lines(&app, &cookie).await, "1/2");
    }

    #[test]
    fn test_minus_is_disabled_at_one_unit() {
        let cart = CartState::new()
            .with_added(&product(1, 100, 10), 1)
            .with_added(&product(2, 50, 10), 2);
        let html = CartItemsTemplate {
            cart: CartView::from(&cart),
        }
        .render()
        .unwrap();

        let minus_buttons: Vec<&str> = html
            .split("aria-label=\"One less\"")
            .skip(1)
            .map(|rest| rest.split('>').next().unwrap_or_default())
            .collect();
        assert_eq!(minus_buttons.len(), 2);
        assert!(minus_buttons[0].contains("disabled"));
        assert!(!minus_buttons[1].contains("disabled"));
    }

    #[test]
    fn test_cart_view_totals_and_controls() {
        let cart = CartState::new()
            .with_added(&product(1, 100, 2), 2)
            .with_added(&product(2, 50, 10), 1);
        let view = CartView::from(&cart);

        assert_eq!(view.total, "$250.00");
        assert_eq!(view.item_count, 3);
        assert!(!view.lines[0].can_increment);
        assert!(view.lines[1].can_increment);
        assert_eq!(view.lines[1].next_quantity, 2);
        assert!(view.lines[0].can_decrement);
        assert_eq!(view.lines[0].previous_quantity, 1);
        assert!(!view.lines[1].can_decrement);
        assert_eq!(view.lines[0].subtotal, "$200.00");
    }

    #[test]
    fn test_over_stock_line_carries_warning() {
        let p = product(1, 100, 2);
        let cart = CartState::new().with_added(&p, 1).with_quantity(p.id, 5);
        let view = CartView::from(&cart);

        assert!(view.lines[0].warning.is_some());
        assert!(!view.lines[0].can_increment);
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::from(&CartState::new());
        assert!(view.is_empty());
        assert_eq!(view.total, "$0.00");
    }
}

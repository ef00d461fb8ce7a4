//! Checkout route handlers.
//!
//! The form posts to `/checkout`. On success the confirmation is parked in
//! the session and the shopper is sent to `/checkout/success`; on failure the
//! form is rendered again with the API's message and field errors, and the
//! cart is left as it was.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::cart::{CartView, load_cart};
use super::{is_htmx, redirect};
use crate::api::FieldErrors;
use crate::cart::CartState;
use crate::checkout::{
    self, CheckoutError, CheckoutLocks, CustomerInfo, OrderConfirmation, OrderGateway,
};
use crate::error::Result;
use crate::filters;
use crate::models::session_keys;
use crate::state::AppState;

// =============================================================================
// Forms and Views
// =============================================================================

/// Checkout form data.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// Checkout form state for templates.
#[derive(Clone, Default)]
pub struct CheckoutFormView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub error: Option<String>,
    /// Flattened `"Field: message"` lines from the API.
    pub field_errors: Vec<String>,
}

impl CheckoutFormView {
    fn with_error(form: CheckoutForm, error: &CheckoutError) -> Self {
        Self {
            name: form.name,
            email: form.email,
            phone: form.phone,
            error: Some(error.user_message()),
            field_errors: error.field_errors().map(flatten_field_errors).unwrap_or_default(),
        }
    }
}

/// Human label for an API field name.
fn field_label(field: &str) -> &str {
    match field {
        "nombre_cliente" => "Name",
        "email_cliente" => "Email",
        "telefono_cliente" => "Phone",
        f if f.starts_with("productos") => "Products",
        other => other,
    }
}

fn flatten_field_errors(errors: &FieldErrors) -> Vec<String> {
    errors
        .iter()
        .flat_map(|(field, messages)| {
            messages
                .iter()
                .map(move |message| format!("{}: {message}", field_label(field)))
        })
        .collect()
}

/// Confirmation display data.
#[derive(Clone)]
pub struct ConfirmationView {
    pub sale_id: i64,
    pub total: String,
    pub message: String,
}

impl From<OrderConfirmation> for ConfirmationView {
    fn from(order: OrderConfirmation) -> Self {
        Self {
            sale_id: order.sale_id.as_i64(),
            total: order.total.display(),
            message: order.message,
        }
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub cart: CartView,
    pub form: CheckoutFormView,
}

/// Checkout form fragment (for HTMX re-render after an error).
#[derive(Template, WebTemplate)]
#[template(path = "partials/checkout_form.html")]
pub struct CheckoutFormTemplate {
    pub form: CheckoutFormView,
}

/// Shown instead of the form when the cart is empty.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/empty.html")]
pub struct CheckoutEmptyTemplate;

/// Order confirmation page.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct CheckoutSuccessTemplate {
    pub order: ConfirmationView,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the checkout form, or the empty-cart page.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Response {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return CheckoutEmptyTemplate.into_response();
    }

    CheckoutTemplate {
        cart: CartView::from(cart.state()),
        form: CheckoutFormView::default(),
    }
    .into_response()
}

/// Submit the order.
///
/// A second submission from the same session while one is pending is
/// rejected without calling the API.
#[instrument(skip(state, session, headers, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    place_order(state.checkout_locks(), state.api(), &session, &headers, form).await
}

/// Run one checkout for the visitor's session against `gateway`.
///
/// The in-flight slot is taken before the cart is read and held until the
/// emptied cart has been saved, so a concurrent submission either bounces
/// off the slot or reads the empty cart.
pub(crate) async fn place_order<G: OrderGateway>(
    locks: &CheckoutLocks,
    gateway: &G,
    session: &Session,
    headers: &HeaderMap,
    form: CheckoutForm,
) -> Result<Response> {
    // No session record means nothing was ever put in the cart
    let Some(owner) = session.id().map(|id| id.to_string()) else {
        return Ok(redirect(headers, "/checkout"));
    };

    let _guard = match locks.acquire(&owner) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::info!("Checkout already in flight for this session");
            let cart = load_cart(session).await;
            return Ok(rejected(headers, form, &e, cart.state()));
        }
    };

    let mut cart = load_cart(session).await;
    if cart.is_empty() {
        return Ok(redirect(headers, "/checkout"));
    }

    let outcome = match CustomerInfo::parse(&form.name, &form.email, Some(&form.phone)) {
        Ok(customer) => checkout::submit(&mut cart, gateway, &customer).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(confirmation) => {
            session
                .insert(session_keys::LAST_ORDER, &confirmation)
                .await?;
            session.save().await?;
            Ok(redirect(headers, "/checkout/success"))
        }
        Err(e) => {
            if e.is_server_error() {
                let event_id = sentry::capture_error(&e);
                tracing::error!(error = %e, sentry_event_id = %event_id, "Checkout failed");
            } else {
                tracing::info!(error = %e, "Checkout rejected");
            }
            Ok(rejected(headers, form, &e, cart.state()))
        }
    }
}

/// Re-render the form with `error`; the cart is left as it was.
fn rejected(
    headers: &HeaderMap,
    form: CheckoutForm,
    error: &CheckoutError,
    cart: &CartState,
) -> Response {
    let view = CheckoutFormView::with_error(form, error);
    // HTMX only swaps 2xx responses
    if is_htmx(headers) {
        return CheckoutFormTemplate { form: view }.into_response();
    }
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutTemplate {
            cart: CartView::from(cart),
            form: view,
        },
    )
        .into_response()
}

/// Show the confirmation of the order just placed, once.
#[instrument(skip(session))]
pub async fn success(session: Session) -> Result<Response> {
    let order = session
        .remove::<OrderConfirmation>(session_keys::LAST_ORDER)
        .await?;

    Ok(order.map_or_else(
        || Redirect::to("/").into_response(),
        |order| {
            CheckoutSuccessTemplate {
                order: order.into(),
            }
            .into_response()
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use axum::{
        Router,
        http::header,
        routing::{get, post},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::api::ApiError;
    use crate::checkout::tests::FakeGateway;
    use crate::routes::testing::{body_text, cart_lines, form_post, seeded_cookie, with_sessions};

    const CUSTOMER: &str = "name=Ana&email=ana%40palermo.com&phone=";

    fn app(gateway: Arc<FakeGateway>) -> Router {
        let locks = CheckoutLocks::new();
        let submit = move |session: Session, headers: HeaderMap, Form(form): Form<CheckoutForm>| {
            let locks = locks.clone();
            let gateway = Arc::clone(&gateway);
            async move { place_order(&locks, gateway.as_ref(), &session, &headers, form).await }
        };

        with_sessions(
            Router::new()
                .route("/checkout", post(submit))
                .route("/checkout/success", get(success)),
        )
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_cart_and_rerenders_form() {
        let gateway = Arc::new(FakeGateway::new(false));
        let app = app(Arc::clone(&gateway));
        let cookie = seeded_cookie(&app).await;

        let htmx = app
            .clone()
            .oneshot(form_post("/checkout", &cookie, CUSTOMER, true))
            .await
            .unwrap();
        assert_eq!(htmx.status(), StatusCode::OK);
        assert!(body_text(htmx).await.contains("Stock insuficiente"));

        let plain = app
            .clone()
            .oneshot(form_post("/checkout", &cookie, CUSTOMER, false))
            .await
            .unwrap();
        assert_eq!(plain.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cart_lines(&app, &cookie).await, "2/3");
    }

    #[tokio::test]
    async fn test_invalid_customer_never_reaches_gateway() {
        let gateway = Arc::new(FakeGateway::new(true));
        let app = app(Arc::clone(&gateway));
        let cookie = seeded_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(form_post("/checkout", &cookie, "name=&email=ana%40palermo.com", true))
            .await
            .unwrap();

        assert!(body_text(response).await.contains("Please enter your name"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cart_lines(&app, &cookie).await, "2/3");
    }

    #[tokio::test]
    async fn test_successful_checkout_clears_cart_and_shows_confirmation_once() {
        let gateway = Arc::new(FakeGateway::new(true));
        let app = app(Arc::clone(&gateway));
        let cookie = seeded_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(form_post("/checkout", &cookie, CUSTOMER, true))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("HX-Redirect").map(|v| v.as_bytes()),
            Some(&b"/checkout/success"[..])
        );
        assert_eq!(cart_lines(&app, &cookie).await, "0/0");

        let success = |cookie: &str| {
            axum::http::Request::get("/checkout/success")
                .header(header::COOKIE, cookie)
                .body(axum::body::Body::empty())
                .unwrap()
        };
        let page = app.clone().oneshot(success(&cookie)).await.unwrap();
        assert_eq!(page.status(), StatusCode::OK);
        assert!(body_text(page).await.contains("Order #77"));

        let again = app.clone().oneshot(success(&cookie)).await.unwrap();
        assert!(again.status().is_redirection());
    }

    #[tokio::test]
    async fn test_concurrent_submissions_place_one_order() {
        let gateway = Arc::new(FakeGateway::new(true).slow(Duration::from_millis(50)));
        let app = app(Arc::clone(&gateway));
        let cookie = seeded_cookie(&app).await;

        let (first, second) = tokio::join!(
            app.clone()
                .oneshot(form_post("/checkout", &cookie, CUSTOMER, false)),
            app.clone()
                .oneshot(form_post("/checkout", &cookie, CUSTOMER, false)),
        );
        let statuses = [first.unwrap().status(), second.unwrap().status()];

        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert!(statuses.contains(&StatusCode::SEE_OTHER));
        assert!(statuses.contains(&StatusCode::UNPROCESSABLE_ENTITY));
        assert_eq!(cart_lines(&app, &cookie).await, "0/0");

        // A retry after the order went through finds the emptied cart
        let retry = app
            .clone()
            .oneshot(form_post("/checkout", &cookie, CUSTOMER, false))
            .await
            .unwrap();
        assert!(retry.status().is_redirection());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_form_view_keeps_input_and_flattens_errors() {
        let form = CheckoutForm {
            name: "Ana".to_string(),
            email: "ana@palermo".to_string(),
            phone: String::new(),
        };
        let error = CheckoutError::Api(ApiError::Api {
            status: 422,
            message: "Los datos no son válidos".to_string(),
            code: None,
            field_errors: FieldErrors::from([
                (
                    "email_cliente".to_string(),
                    vec!["El email no es válido".to_string()],
                ),
                (
                    "productos.0.cantidad".to_string(),
                    vec!["Stock insuficiente".to_string()],
                ),
            ]),
        });

        let view = CheckoutFormView::with_error(form, &error);

        assert_eq!(view.name, "Ana");
        assert_eq!(view.error.as_deref(), Some("Los datos no son válidos"));
        assert_eq!(
            view.field_errors,
            vec![
                "Email: El email no es válido".to_string(),
                "Products: Stock insuficiente".to_string(),
            ]
        );
    }

    #[test]
    fn test_local_validation_error_has_no_field_errors() {
        let view = CheckoutFormView::with_error(CheckoutForm::default(), &CheckoutError::MissingName);
        assert_eq!(view.error.as_deref(), Some("Please enter your name"));
        assert!(view.field_errors.is_empty());
    }
}

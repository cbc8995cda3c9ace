//! Route definitions for the Tradeflow platform

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        // Exchange rates (public)
        .route("/exchange-rates", get(handlers::get_rate))
        // Stock updates stream; token is checked by the handler
        .route("/ws/stock", get(handlers::stock_updates))
        // Company verification link (public)
        .route("/companies/verify", post(handlers::verify_company))
        // Protected routes
        .merge(protected_routes(state))
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/verify-email", post(handlers::verify_email))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/me", get(handlers::me))
        .nest("/companies", company_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/orders", order_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Company routes (protected)
fn company_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_companies).post(handlers::create_company),
        )
        .route(
            "/me",
            get(handlers::get_my_company).put(handlers::update_my_company),
        )
        .route(
            "/me/members",
            get(handlers::list_members).post(handlers::add_member),
        )
        .route("/me/members/:user_id", delete(handlers::remove_member))
        .route("/me/leave", post(handlers::leave_company))
        .route("/:tax_id", get(handlers::get_company_by_tax_id))
        .route("/:tax_id/products", get(handlers::get_company_catalog))
}

/// Company product routes (protected)
fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route(
            "/:product_id/movements",
            get(handlers::list_movements).post(handlers::record_movement),
        )
}

/// Category routes (protected)
fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/tree", get(handlers::category_tree))
        .route("/:category_id/path", get(handlers::category_path))
}

/// Order routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route(
            "/:order_id",
            get(handlers::get_order).delete(handlers::delete_order),
        )
        .route("/:order_id/products", put(handlers::update_order_products))
        .route("/:order_id/accept", post(handlers::accept_order))
        .route("/:order_id/reject", post(handlers::reject_order))
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route("/:order_id/complete", post(handlers::complete_order))
}

use axum::routing::{any, get, post};
use axum::Router;

use super::*;

/// Assembles the full router from one builder per domain, the way the
/// teacher's `route_domains.rs` composes `add_*_routes` functions.
pub(super) fn build_internal_router() -> Router<AppState> {
    let router = Router::<AppState>::new();
    let router = add_health_routes(router);
    let router = add_gate_routes(router);
    let router = add_ops_routes(router);
    let router = add_webhook_routes(router);
    let router = add_wellknown_routes(router);
    add_proxy_routes(router)
}

fn add_health_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/healthz", get(health))
}

fn add_gate_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/x402/gate/create", post(create_gate))
        .route("/x402/gate/quote", post(quote_gate))
        .route("/x402/gate/authorize-payment", post(authorize_payment))
        .route("/x402/gate/verify", post(verify_gate))
        .route("/x402/gate/:id", get(get_gate))
}

fn add_ops_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/ops/maintenance/holdback/run", post(run_maintenance))
}

fn add_webhook_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/deliveries/nooterra", post(crate::webhook::receive))
}

fn add_wellknown_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/.well-known/settldpay-keyset", get(well_known_keyset))
}

/// The transparent x402 reverse proxy mounts at a catch-all path so any
/// client request not matching one of the gateway's own control-plane
/// routes above is forwarded upstream.
fn add_proxy_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/proxy/*path", any(crate::proxy::proxy))
}

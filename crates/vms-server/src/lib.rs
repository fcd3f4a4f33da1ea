//! # VMS Server
//!
//! REST surface over [`VmsCore`]. Every route except `/api/v1/health`
//! requires an `X-Company-Id` header; `X-User-Id` names the acting user.

mod error;
mod handlers;
mod tenant;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vms_core::VmsCore;

pub use error::{ApiResponse, AppError};
pub use tenant::{Tenant, COMPANY_HEADER, USER_HEADER};

pub type AppState = Arc<VmsCore>;

/// Build the full router with all routes and middleware
pub fn build_router(core: AppState) -> Router {
    use handlers::{admin, people, safety, visits};

    let api = Router::new()
        .route("/health", get(admin::health))
        // Employees
        .route("/employees", get(people::list_employees).post(people::register_employee))
        .route("/employees/:id", get(people::get_employee).patch(people::update_employee))
        .route("/employees/:id/deactivate", post(people::deactivate_employee))
        // Visitors
        .route("/visitors", get(people::list_visitors).post(people::register_visitor))
        .route("/visitors/:id", get(people::get_visitor).patch(people::update_visitor))
        .route("/visitors/:id/export", get(people::export_visitor))
        .route("/visitors/:id/erase", post(people::erase_visitor))
        .route("/visitors/:id/embedding", post(people::request_embedding))
        // Locations
        .route("/locations", get(people::list_locations).post(people::create_location))
        // Visits
        .route("/visits", get(visits::list_visits).post(visits::schedule_visit))
        .route("/visits/walk-in", post(visits::walk_in))
        .route("/visits/on-site", get(visits::on_site))
        .route("/visits/:id", get(visits::get_visit))
        .route("/visits/:id/check-in", post(visits::check_in))
        .route("/visits/:id/check-out", post(visits::check_out))
        .route("/visits/:id/cancel", post(visits::cancel_visit))
        // Approvals
        .route("/approvals", get(visits::pending_approvals))
        .route("/approvals/:id/decision", post(visits::decide_approval))
        // Watchlist
        .route("/watchlist", get(safety::list_watchlist).post(safety::add_watchlist_entry))
        .route("/watchlist/screen", post(safety::screen))
        .route("/watchlist/:id", delete(safety::deactivate_watchlist_entry))
        // Evacuations
        .route("/evacuations", post(safety::start_evacuation))
        .route("/evacuations/active", get(safety::active_evacuation))
        .route("/evacuations/:id/account", post(safety::account_person))
        .route("/evacuations/:id/close", post(safety::close_evacuation))
        // Residency and sync
        .route("/residency", get(admin::residency))
        .route("/residency/:entity", put(admin::set_residency))
        .route("/sync/stats", get(admin::sync_stats))
        .route("/sync/operations", get(admin::sync_operations))
        .route("/sync/operations/:id/retry", post(admin::retry_operation))
        // Reports and audit
        .route("/reports/visits", get(safety::visit_report))
        .route("/audit", get(admin::audit));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(core)
}

/// Serve until `shutdown` resolves, letting in-flight requests finish
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("VMS server listening on {}", addr);
    }
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

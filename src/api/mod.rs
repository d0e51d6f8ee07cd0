//! Admin HTTP API
//!
//! Every route sits behind the bearer token from `[admin]`:
//!
//! | Method | Path | Effect |
//! |---|---|---|
//! | POST | `/admin/sync/products` | queue a product sync |
//! | POST | `/admin/sync/inventory` | queue an inventory sync, optional `{"store_id"}` |
//! | POST | `/admin/export/orders` | queue an order export, optional `{"date_from","date_to"}` |
//! | GET | `/admin/tasks/{id}` | task state |
//! | DELETE | `/admin/tasks/{id}` | cancel a queued task |
//! | GET | `/admin/operations` | operation log, `?kind=&status=&limit=` |
//! | GET | `/admin/operations/{id}` | one operation record |

pub mod auth;
pub mod error;
pub mod routes;

use crate::config::schema::AdminConfig;
use crate::config::SecretString;
use crate::core::oplog::OperationLog;
use crate::core::scheduler::TaskDispatcher;
use crate::domain::{Result, SyncError};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: TaskDispatcher,
    pub oplog: OperationLog,
    pub token: Option<Arc<SecretString>>,
}

impl AppState {
    pub fn new(dispatcher: TaskDispatcher, oplog: OperationLog, token: Option<SecretString>) -> Self {
        Self {
            dispatcher,
            oplog,
            token: token.map(Arc::new),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/sync/products", post(routes::trigger_products))
        .route("/admin/sync/inventory", post(routes::trigger_inventory))
        .route("/admin/export/orders", post(routes::trigger_order_export))
        .route(
            "/admin/tasks/{id}",
            get(routes::get_task).delete(routes::cancel_task),
        )
        .route("/admin/operations", get(routes::list_operations))
        .route("/admin/operations/{id}", get(routes::get_operation))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the admin API until `shutdown` flips to `true`
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the listener cannot be bound or the server fails.
pub async fn serve(
    config: &AdminConfig,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|e| SyncError::Io(format!("Failed to bind {}: {e}", config.bind_address)))?;
    tracing::info!(address = %config.bind_address, "Admin API listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| SyncError::Io(format!("Admin API failed: {e}")))?;

    tracing::info!("Admin API stopped");
    Ok(())
}

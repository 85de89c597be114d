//! autoscaler-api — REST API for the autoscaler.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/up` | Scale a resource up |
//! | POST | `/api/v1/down` | Scale a resource down |
//! | POST | `/api/v1/keep` | Re-apply the current or a named plan |
//! | GET | `/api/v1/jobs` | List job statuses |
//! | GET | `/api/v1/jobs/{name}` | Job status for one resource name |
//! | GET | `/api/v1/resources` | Resource tree |
//! | GET | `/healthz` | Liveness |
//! | GET | `/metrics` | Prometheus exposition (unless the exporter is disabled) |

pub mod handlers;

use autoscaler_core::Core;
use axum::Router;
use axum::routing::{get, post};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub core: Core,
}

/// Build the complete API router.
pub fn build_router(core: Core) -> Router {
    let exporter = core.config().autoscaler.exporter.enabled;
    let state = ApiState { core };

    let api_routes = Router::new()
        .route("/up", post(handlers::scale_up))
        .route("/down", post(handlers::scale_down))
        .route("/keep", post(handlers::scale_keep))
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/{name}", get(handlers::get_job))
        .route("/resources", get(handlers::resource_tree))
        .with_state(state.clone());

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz));
    if exporter {
        router.route("/metrics", get(handlers::prometheus_metrics).with_state(state))
    } else {
        router
    }
}

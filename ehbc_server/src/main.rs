use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{routing::get, Router};
use ehbc_core::collection_client::Endpoints;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod route;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let addr = match env::var("EHBC_LISTEN") {
        Ok(listen) => listen.parse()?,
        Err(_) => SocketAddr::from(([0, 0, 0, 0], 8008)),
    };
    let app = app(endpoints_from_env());
    info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

fn app(endpoints: Endpoints) -> Router {
    Router::new()
        .route("/collection", get(route::collection::handler))
        .route("/collection/refuse", get(route::collection::refuse::handler))
        .route(
            "/collection/recycling",
            get(route::collection::recycling::handler),
        )
        .route(
            "/collection/organic",
            get(route::collection::organic::handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(endpoints))
}

/// Point the lookups elsewhere, e.g. at a recorded copy of the site.
fn endpoints_from_env() -> Endpoints {
    let mut endpoints = Endpoints::default();
    if let Ok(calendars_url) = env::var("EHBC_CALENDARS_URL") {
        endpoints.calendars_url = calendars_url;
    }
    if let Ok(search_url) = env::var("EHBC_SEARCH_URL") {
        endpoints.search_url = search_url;
    }
    endpoints
}

use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use slither_api::{AuthToken, Uuid};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod error;
mod extractors;
mod fuzz;
mod handlers;

use error::Error;
use extractors::AppState;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(long, env = "SLITHER_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Token allowing to create users, admin endpoints are disabled without it
    #[structopt(long, env = "ADMIN_TOKEN")]
    admin_token: Option<Uuid>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/admin/create-user", post(handlers::admin_create_user))
        .route("/unauth", post(handlers::unauth))
        .route("/whoami", get(handlers::whoami))
        .route("/posts", get(handlers::fetch_posts).post(handlers::create_post))
        .route("/posts/:post/comments", post(handlers::create_comment))
        .route(
            "/posts/:post/comments/:comment",
            put(handlers::edit_comment).delete(handlers::delete_comment),
        )
        .route(
            "/posts/:post/comments/:comment/react",
            post(handlers::react_to_comment),
        )
        .route("/posts/:post/react", post(handlers::react_to_post))
        .route("/posts/:post/like", post(handlers::like_post))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    if opt.admin_token.is_none() {
        tracing::warn!("no admin token set, users cannot be created");
    }

    let app = app(AppState::new(opt.admin_token.map(AuthToken)));

    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(?err, "failed listening for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("serving axum webserver")
}

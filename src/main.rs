use std::net::SocketAddr;

use axum::{
    body::Body,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router, Server,
};
use clap::Parser;
use hyper::Request;

use crate::options::Options;

mod misc;
mod options;

async fn logger(req: Request<Body>, next: Next<Body>) -> Response {
    log::info!("{} {}", req.method(), req.uri().path());
    next.run(req).await
}

async fn hello() -> &'static str {
    "Hello, World!"
}

#[tokio::main]
async fn main() {
    let options = Options::parse();
    env_logger::Builder::new()
        .filter_level(options.log_level())
        .init();

    let auth = ldapauth::middleware(options.config())
        .unwrap_or_else(|err| exit_error!("Invalid LDAP configuration: {}", err));

    let app = Router::new()
        .route("/", get(hello))
        .route("/health", get(|| async { "OK" }))
        .layer(middleware::from_fn(auth))
        .layer(middleware::from_fn(logger));

    let address = SocketAddr::new(options.address, options.port);
    log::info!("App is running on: {}", address);
    Server::bind(&address)
        .serve(app.into_make_service())
        .await
        .unwrap_or_else(|err| exit_error!("Server stopped: {}", err));
}

//! Minimal tagline example: a small JSON API with an access log on stdout.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Override the line from the environment:
//!   ACCESS_LOG_FORMAT='${method} ${uri} ${status} ${latency_human} ${body}\n' \
//!     cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/login \
//!        -H 'content-type: application/json' \
//!        -d '{"user":"alice","password":"hunter2"}'
//!   curl http://localhost:3000/boom
//!   curl http://localhost:3000/healthz        ← not logged

use http::{Method, StatusCode};
use tagline::{AccessLog, Config, Request, Response, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()
        .expect("invalid access log configuration")
        .skip("/healthz");

    Server::bind("0.0.0.0:3000")
        .serve(AccessLog::new(config).wrap(app))
        .await
        .expect("server error");
}

async fn app(req: Request) -> Response {
    if req.method() == Method::POST && req.path() == "/login" {
        return login(req);
    }

    match (req.method(), req.path()) {
        (&Method::GET, "/healthz") => Response::text("ok"),
        (&Method::GET, "/boom") => Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .error("inventory service unreachable")
            .app_id("demo")
            .no_body(),
        (&Method::GET, path) if path.starts_with("/users/") => {
            let id = &path["/users/".len()..];
            Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
        }
        _ => Response::status(StatusCode::NOT_FOUND),
    }
}

// The password in the request body never reaches the log: ${body} is redacted.
fn login(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }
    Response::json(br#"{"token":"t-123"}"#.to_vec())
}

//! Minimal api-router example: value-returning JSON endpoints and health checks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/users/abc          # 400 from an ApiError
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/users/42 # 500, formatted
//!   curl http://localhost:3000/healthz
//!   curl http://localhost:3000/                   # plain handler, HTML

use std::time::Duration;

use api_router::{
    ApiChain, ApiError, ApiRouter, ApiRouterOptions, ContentType, Error, ErrorFormatter, Next, Request,
    Response, Router, Server, Value, health,
};
use http::StatusCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = ApiRouterOptions::from_toml_str(
        r#"
        [internal_server_error]
        error = "Something went wrong"
        "#,
    )?;

    // Plain routes write the response themselves; the ApiRouter adds
    // value-returning ones on top.
    let plain = Router::new().get("/", index);

    let api = ApiRouter::wrap(plain, options)
        .get("/users/{id}",    ApiChain::new(log_request).then(get_user))
        .post("/users",        create_user)
        .delete("/users/{id}", delete_user)
        .get("/healthz",       health::liveness)
        .get("/readyz",        health::readiness);

    api.set_error_formatter(ErrorFormatter::new(|err, req, _res| {
        let body = serde_json::json!({ "message": err.to_string(), "path": req.path() });
        async move { body }
    }));

    Server::bind("0.0.0.0:3000").serve(api).await
}

async fn index(_req: Request, res: Response, _next: Next) -> Result<(), Error> {
    res.bytes(ContentType::Html, b"<h1>api-router demo</h1>".to_vec());
    Ok(())
}

// Passes control on without returning a value.
async fn log_request(req: Request, _res: Response, next: Next) {
    tracing::info!(path = req.path(), "incoming");
    next.call();
}

// GET /users/{id}
//
// `posts` resolves concurrently before the JSON body is written.
async fn get_user(req: Request, _res: Response, _next: Next) -> Result<Value, Error> {
    let id: u64 = req.param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| ApiError::bad_request("id must be numeric"))?;

    Ok(Value::object([
        ("id", Value::from(id)),
        ("name", Value::from("alice")),
        ("posts", Value::deferred(load_posts(id))),
    ]))
}

async fn load_posts(user: u64) -> Result<Vec<String>, Error> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok((1..=3).map(|n| format!("post {n} by user {user}")).collect())
}

// POST /users
async fn create_user(req: Request, res: Response, _next: Next) -> Result<serde_json::Value, Error> {
    if req.body().is_empty() {
        return Err(ApiError::bad_request("body required").into());
    }
    let input: serde_json::Value = serde_json::from_slice(req.body())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    res.status(StatusCode::CREATED).header("location", "/users/99");
    Ok(serde_json::json!({ "id": 99, "name": input["name"] }))
}

// DELETE /users/{id}: an unclassified failure, reformatted.
async fn delete_user(_req: Request, _res: Response, _next: Next) -> Result<Value, Error> {
    Err(Error::other("storage backend offline"))
}

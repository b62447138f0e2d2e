//! Demo handler: echoes POST bodies and greets GET targets.

use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};

/// Routes on the request method. Anything but GET and POST gets a 405.
pub async fn echo(req: Request) -> anyhow::Result<Response> {
    match req.method {
        Method::GET => get(req),
        Method::POST => Ok(post(req)),
        _ => Ok(Response::new(StatusCode::MethodNotAllowed, req.version)),
    }
}

/// Echoes the body back, transformed according to the target.
fn post(req: Request) -> Response {
    let mut body = req.body;

    match req.target.as_str() {
        "/reverse" => body.reverse(),
        "/uppercase" => body.make_ascii_uppercase(),
        "/lowercase" => body.make_ascii_lowercase(),
        "/yell" => body.extend_from_slice(b"!!"),
        _ => {}
    }

    ResponseBuilder::new(StatusCode::Ok)
        .version(req.version)
        .header("Content-Type", "text/plain")
        .body(body)
        .build()
}

fn get(req: Request) -> anyhow::Result<Response> {
    if req.target == "/not_found" {
        return Ok(Response::new(StatusCode::NotFound, req.version));
    }

    let greeting = format!("{{\"hello\": {}}}", serde_json::to_string(&req.target)?);

    Ok(ResponseBuilder::new(StatusCode::Ok)
        .version(req.version)
        .header("Content-Type", "application/json")
        .body(greeting)
        .build())
}

//! Counter and flash message demo

use salvo::prelude::*;
use salvo_cookie_session::{CookieSessionHandler, CookieSessionStorage, SessionConfig, SessionDepotExt};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Data {
    count: i64,
    user: Option<String>,
}

#[handler]
async fn index(depot: &mut Depot) -> String {
    let session = depot.session_mut().expect("Session not found");

    let notice = session
        .flash_as::<String>("success")
        .map(|msg| format!("\nFlash: {}", msg))
        .unwrap_or_default();

    match session.data_as::<Data>() {
        Ok(data) => format!(
            "Count: {}\nUser: {}{}",
            data.count,
            data.user.as_deref().unwrap_or("anonymous"),
            notice
        ),
        Err(e) => format!("Unexpected session data: {}", e),
    }
}

#[handler]
async fn add(depot: &mut Depot, res: &mut Response) {
    let session = depot.session_mut().expect("Session not found");
    if let Err(e) = session.update("count", |v: Option<i64>| v.unwrap_or(0) + 1) {
        tracing::error!("Failed to update count: {}", e);
    }
    res.render(Redirect::found("/"));
}

#[handler]
async fn flash(depot: &mut Depot, res: &mut Response) {
    let session = depot.session_mut().expect("Session not found");
    session.set_flash("success", "let's go!");
    res.render(Redirect::found("/"));
}

#[handler]
async fn login(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let session = depot.session_mut().expect("Session not found");
    let username = req.query::<String>("name").unwrap_or_else(|| "anonymous".to_string());
    session
        .set("user", username.as_str())
        .set_flash("success", format!("Welcome, {}", username));
    res.render(Redirect::found("/"));
}

#[handler]
async fn logout(depot: &mut Depot, res: &mut Response) {
    depot.destroy_session();
    res.render(Redirect::found("/"));
}

#[tokio::main]
async fn main() {
    // Set up logging
    tracing_subscriber::fmt::init();

    let config = SessionConfig::new("your-super-secret-key-change-in-production")
        .with_http_only(true)
        .with_max_age(3600);

    let storage = CookieSessionStorage::new(config)
        .with_default_data(&Data { count: 0, user: None })
        .expect("default data is a JSON object");

    let router = Router::new()
        .hoop(CookieSessionHandler::new(storage))
        .get(index)
        .push(Router::with_path("add").get(add))
        .push(Router::with_path("flash").get(flash))
        .push(Router::with_path("login").get(login))
        .push(Router::with_path("logout").get(logout));

    let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
    println!("Server running at http://127.0.0.1:5800");
    println!("Try these endpoints:");
    println!("  GET /                 - Show session");
    println!("  GET /add              - Increment the counter");
    println!("  GET /flash            - Set a one-time message");
    println!("  GET /login?name=alice - Set user");
    println!("  GET /logout           - Drop the session cookie");

    Server::new(acceptor).serve(router).await;
}

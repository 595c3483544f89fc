#![allow(dead_code)]

use afs_client::gateway::HttpGateway;
use afs_client::session::SessionStore;
use afs_client::storage::{KeyValueStore, MemoryStore, TOKEN_KEY, USER_KEY};
use axum::Router;
use std::sync::Arc;

// serve `router` on an ephemeral port, returns the api base url
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/api", addr)
}

pub fn anonymous_session() -> Arc<SessionStore> {
    Arc::new(SessionStore::open(MemoryStore::new()))
}

pub fn signed_in_session(token: &str) -> Arc<SessionStore> {
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, token).unwrap();
    store
        .set(USER_KEY, r#"{"username":"alice","userType":"ADMIN"}"#)
        .unwrap();
    Arc::new(SessionStore::open(store))
}

pub fn gateway(base_url: &str, session: Arc<SessionStore>) -> Arc<HttpGateway> {
    Arc::new(HttpGateway::new(base_url, session).unwrap())
}

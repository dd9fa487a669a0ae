#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::header::{COOKIE, SET_COOKIE};
use sessionkit_core::SessionHandler;
use sessionkit_demo::{RunningServer, Server};
use sessionkit_middleware::SessionConfig;

pub const SESSION_NAME: &str = "PYSESSIONID";

/// A demo server running on a random port.
pub struct TestServer {
    server: RunningServer,
    base_url: String,
}

impl TestServer {
    pub async fn start(handler: Arc<dyn SessionHandler>) -> Self {
        Self::start_with(
            handler,
            SessionConfig::default().with_session_name(SESSION_NAME),
        )
        .await
    }

    pub async fn start_with(handler: Arc<dyn SessionHandler>, config: SessionConfig) -> Self {
        let server = Server::builder()
            .listen(SocketAddr::from(([127, 0, 0, 1], 0)))
            .handler(handler)
            .config(config)
            .build()
            .await
            .expect("Failed to start test server")
            .spawn()
            .expect("Failed to spawn test server");

        let base_url = format!("http://{}", server.local_addr());

        Self { server, base_url }
    }

    /// A client that sends `cookie` as the session id, like a fresh
    /// browser that was handed that cookie.
    pub fn client(&self, cookie: Option<&str>) -> TestClient {
        TestClient {
            client: reqwest::Client::new(),
            base_url: self.base_url.clone(),
            cookie: cookie.map(ToOwned::to_owned),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn shutdown(self) {
        self.server
            .shutdown()
            .await
            .expect("Server shutdown failed");
    }
}

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
    cookie: Option<String>,
}

impl TestClient {
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match self.cookie.as_deref() {
            Some(id) => builder.header(COOKIE, format!("{SESSION_NAME}={id}")),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.request(reqwest::Method::GET, path)
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }
}

/// Value of the single `Set-Cookie` header, if any.
pub fn set_cookie(resp: &reqwest::Response) -> Option<String> {
    let mut values = resp.headers().get_all(SET_COOKIE).iter();
    let value = values
        .next()?
        .to_str()
        .expect("Set-Cookie is not ascii")
        .to_owned();
    assert!(values.next().is_none(), "Expected a single Set-Cookie");
    Some(value)
}

/// Session id carried by a `Set-Cookie` value.
pub fn cookie_session_id(set_cookie: &str) -> String {
    let (pair, _) = set_cookie
        .split_once(';')
        .expect("Set-Cookie has attributes");
    let (name, value) = pair.split_once('=').expect("Set-Cookie has a value");
    assert_eq!(name, SESSION_NAME);
    value.to_owned()
}

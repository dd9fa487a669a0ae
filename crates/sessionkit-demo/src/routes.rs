use axum::Router;
use axum::extract::{FromRequest, Query};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use sessionkit_middleware::SessionHandle;

use crate::error::{RequestError, RequestResult};

/// Key the demo keeps the posted payload under.
pub const DATA_KEY: &str = "test";

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RequestError))]
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

async fn set_session(
    session: SessionHandle,
    AppJson(data): AppJson<Value>,
) -> RequestResult<AppJson<Value>> {
    let mut session = session.lock().await;
    session.start(true).await?;
    session.set(DATA_KEY, data)?;

    Ok(AppJson(json!({ "session_id": session.id() })))
}

async fn get_session(session: SessionHandle) -> RequestResult<AppJson<Value>> {
    let mut session = session.lock().await;
    if !session.start(false).await? {
        return Ok(AppJson(json!({ "session": null })));
    }

    let data = session.get_value(DATA_KEY)?.cloned();
    Ok(AppJson(json!({ "session": data })))
}

#[derive(Deserialize)]
struct RegenerateQuery {
    #[serde(default = "default_delete_old")]
    delete_old: bool,
}

fn default_delete_old() -> bool {
    true
}

async fn regenerate_session_id(
    session: SessionHandle,
    Query(query): Query<RegenerateQuery>,
) -> RequestResult<AppJson<Value>> {
    let mut session = session.lock().await;
    session.start(false).await?;
    session.regenerate_session_id(query.delete_old).await?;

    Ok(AppJson(json!({ "session_id": session.id() })))
}

async fn destroy_session(session: SessionHandle) -> RequestResult<AppJson<Value>> {
    session.lock().await.destroy().await?;

    Ok(AppJson(json!({ "session": "deleted" })))
}

pub fn route_handler() -> Router {
    Router::new()
        .route("/session/set", post(set_session))
        .route("/session/get", get(get_session))
        .route(
            "/session/regenerate_session_id",
            post(regenerate_session_id),
        )
        .route("/session/destroy", get(destroy_session))
        // misspelled path served by older clients
        .route("/session/destory", get(destroy_session))
}

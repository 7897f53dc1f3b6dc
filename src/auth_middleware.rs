//! Middleware that resolves the request owner forwarded by the upstream
//! authentication layer.
//!
//! The authenticating front layer identifies the caller and forwards their
//! user ID in the [OWNER_ID_HEADER] header. This middleware parses the
//! header, verifies the owner exists, and makes the [UserId] available to
//! route handlers as a request extension.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    user::{UserId, get_user_by_id},
};

/// The request header carrying the authenticated owner's user ID.
pub const OWNER_ID_HEADER: &str = "x-user-id";

/// The state needed for the owner guard middleware.
#[derive(Debug, Clone)]
pub struct OwnerGuardState {
    /// The database connection for verifying owners.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for OwnerGuardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Middleware function that checks for a valid owner identity header.
///
/// The user ID is placed into the request and the request executed normally
/// if the owner is valid, otherwise an [Error::InvalidOwner] response is
/// returned and no handler work is attempted.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(user_id): Extension<UserId>` to receive the user ID.
///
/// # Panics
/// Panics if the lock for the database connection is already held by the same
/// thread.
pub async fn owner_guard(
    State(state): State<OwnerGuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user_id = match parse_owner_header(&request) {
        Some(user_id) => user_id,
        None => return Error::InvalidOwner.into_response(),
    };

    {
        let connection = state.db_connection.lock().unwrap();

        if let Err(error) = get_user_by_id(user_id, &connection) {
            tracing::debug!("rejecting request for unknown owner {user_id}: {error}");
            return Error::InvalidOwner.into_response();
        }
    }

    request.extensions_mut().insert(user_id);

    next.run(request).await
}

fn parse_owner_header(request: &Request) -> Option<UserId> {
    request
        .headers()
        .get(OWNER_ID_HEADER)?
        .to_str()
        .ok()?
        .parse::<i64>()
        .ok()
        .map(UserId::new)
}

#[cfg(test)]
mod owner_guard_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Router,
        http::StatusCode,
        middleware,
        routing::get,
    };
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{
        db::initialize,
        user::{UserId, create_user},
    };

    use super::{OWNER_ID_HEADER, OwnerGuardState, owner_guard};

    async fn whoami(Extension(user_id): Extension<UserId>) -> String {
        user_id.to_string()
    }

    fn get_test_server() -> TestServer {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("test@test.com", &conn).unwrap();

        let state = OwnerGuardState {
            db_connection: Arc::new(Mutex::new(conn)),
        };
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state, owner_guard));

        TestServer::new(app)
    }

    #[tokio::test]
    async fn request_without_owner_header_is_rejected() {
        let server = get_test_server();

        server
            .get("/whoami")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn request_with_malformed_owner_header_is_rejected() {
        let server = get_test_server();

        server
            .get("/whoami")
            .add_header(OWNER_ID_HEADER, "not-a-number")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn request_with_unknown_owner_is_rejected() {
        let server = get_test_server();

        server
            .get("/whoami")
            .add_header(OWNER_ID_HEADER, "999")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn request_with_valid_owner_reaches_handler() {
        let server = get_test_server();

        let response = server.get("/whoami").add_header(OWNER_ID_HEADER, "1").await;

        response.assert_status(StatusCode::OK);
        response.assert_text("1");
    }
}

//! WebSocket inbound adapter for the notification channel.
//!
//! On upgrade the authenticated user joins their `user:<id>` broadcast
//! group and is marked online; the session task then forwards hub
//! deliveries to the client and presence refreshes from the client's
//! heartbeats. Unauthenticated upgrades are refused before the handshake.

use actix_session::Session as AuthSession;
use actix_web::web::{self, Payload};
use actix_web::{get, HttpRequest, HttpResponse};
use tracing::error;
use uuid::Uuid;

use crate::domain::ids::UserId;

mod session;

pub mod messages;
pub mod state;

/// Handle WebSocket upgrade for the `/ws/notifications` endpoint.
#[get("/ws/notifications")]
pub async fn ws_entry(
    state: web::Data<state::WsState>,
    auth: AuthSession,
    req: HttpRequest,
    stream: Payload,
) -> actix_web::Result<HttpResponse> {
    let user = authenticated_user(&auth)?;

    let (response, session, stream) = actix_ws::handle(&req, stream).map_err(|err| {
        error!(error = %err, "WebSocket upgrade failed");
        err
    })?;

    let presence = state.presence.clone();
    let hub = state.hub.clone();
    actix_web::rt::spawn(async move {
        session::handle_ws_session(presence, hub, user, session, stream).await;
    });

    Ok(response)
}

fn authenticated_user(auth: &AuthSession) -> actix_web::Result<UserId> {
    match auth.get::<Uuid>("user_id") {
        Ok(Some(id)) => Ok(UserId::from_uuid(id)),
        Ok(None) => Err(actix_web::error::ErrorUnauthorized("login required")),
        Err(err) => {
            error!(error = %err, "session read failed during WebSocket upgrade");
            Err(actix_web::error::ErrorUnauthorized("login required"))
        }
    }
}

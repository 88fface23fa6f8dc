//! Guest session handlers.

use axum::Json;
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use pantry_core::GuestSessionId;

use crate::error::Result;
use crate::models::session_keys;

/// Response body of `POST /session/guest`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSessionResponse {
    pub guest_session_id: GuestSessionId,
    /// False when the session already had a guest id.
    pub created: bool,
}

/// `POST /session/guest`
///
/// Mints a guest session id unless the session already carries one.
#[instrument(skip(session))]
pub async fn guest(session: Session) -> Result<Json<GuestSessionResponse>> {
    if let Some(existing) = session
        .get::<GuestSessionId>(session_keys::GUEST_SESSION_ID)
        .await?
    {
        return Ok(Json(GuestSessionResponse {
            guest_session_id: existing,
            created: false,
        }));
    }

    let id = GuestSessionId::generate();
    session
        .insert(session_keys::GUEST_SESSION_ID, id)
        .await?;
    tracing::info!(guest = %id, "Started guest session");

    Ok(Json(GuestSessionResponse {
        guest_session_id: id,
        created: true,
    }))
}

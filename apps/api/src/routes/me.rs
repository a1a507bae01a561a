use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::resources;
use crate::session::guard::CurrentPrincipal;
use crate::state::AppState;

/// GET /api/v1/me
///
/// The enriched session as the client sees it. Doubles as the lazy
/// provisioning point for federated principals that signed in before ever
/// owning a resume.
pub async fn handle_me(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
) -> Result<Json<Value>, AppError> {
    resources::ensure_default_resume(state.store.as_ref(), session.id).await?;

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": session.id,
            "email": session.email,
            "name": session.name,
            "imageUrl": session.image_url,
        },
    })))
}

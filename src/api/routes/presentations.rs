//! Presentation endpoints.
//!
//! Upload is validated before anything touches storage; the completion
//! poller is spawned detached so its outcome never affects the upload
//! response.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::session::UserId;
use crate::api::{with_db, AppState};
use crate::db::PresentationRepository;
use crate::presentation::{Presentation, Preset, SlidesStatus};
use crate::storage::keys;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/presentations", post(create_presentation).get(list_presentations))
        .route(
            "/presentations/:id",
            get(get_presentation).patch(rename_presentation),
        )
        .route("/presentations/:id/poll", post(trigger_poll))
}

/// Parsed and validated create form.
struct CreateForm {
    name: String,
    pdf: Vec<u8>,
    preset: Preset,
}

async fn parse_create_form(mut multipart: Multipart) -> ApiResult<CreateForm> {
    let mut name: Option<String> = None;
    let mut pdf: Option<(Option<String>, Vec<u8>)> = None;
    let mut preset = Preset::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "pdf" => {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read 'pdf': {e}")))?;
                pdf = Some((content_type, data.to_vec()));
            }
            "name" => {
                name = Some(read_text(field, "name").await?);
            }
            "presentationDescription" => {
                preset.presentation_description =
                    read_text(field, "presentationDescription").await?;
            }
            "audienceDescription" => {
                preset.audience_description = read_text(field, "audienceDescription").await?;
            }
            "toneDescription" => {
                preset.tone_description = read_text(field, "toneDescription").await?;
            }
            _ => {}
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::validation("Missing 'pdf' file or 'name' field."))?;
    let (content_type, pdf) =
        pdf.ok_or_else(|| ApiError::validation("Missing 'pdf' file or 'name' field."))?;

    if content_type.as_deref() != Some("application/pdf") {
        return Err(ApiError::validation("Uploaded file must be a PDF."));
    }

    Ok(CreateForm { name, pdf, preset })
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::validation(format!("Failed to read '{name}': {e}")))
}

async fn create_presentation(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    multipart: Multipart,
) -> ApiResult<Response> {
    // All validation happens before any storage write
    let form = parse_create_form(multipart).await?;

    let presentation_id = Uuid::new_v4().to_string();
    let pdf_key = keys::pdf_key(&user_id, &presentation_id, &form.name);

    state
        .gateway
        .put(&pdf_key, form.pdf, "application/pdf")
        .await
        .map_err(|e| {
            error!(
                presentation_id = %presentation_id,
                "PDF upload failed: {e}"
            );
            ApiError::storage("Failed to upload PDF to storage.")
        })?;

    let presentation = Presentation::new(
        presentation_id.clone(),
        form.name,
        user_id.clone(),
        pdf_key,
        form.preset,
    );

    let record = presentation.clone();
    with_db(state.db_path.clone(), move |conn| {
        PresentationRepository::insert(conn, &record)
    })
    .await?;

    info!(
        presentation_id = %presentation_id,
        user_id = %user_id,
        "Presentation created, starting completion poller"
    );

    // Detached: the upload response does not wait on, or fail with, the poll
    let _ = state.poller.spawn(&state.pollers, &user_id, &presentation_id);

    Ok((StatusCode::CREATED, Json(presentation)).into_response())
}

async fn list_presentations(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Vec<Presentation>>> {
    let presentations = with_db(state.db_path.clone(), move |conn| {
        PresentationRepository::list(conn, &user_id)
    })
    .await?;

    Ok(Json(presentations))
}

async fn get_presentation(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let lookup_id = id.clone();
    let presentation = with_db(state.db_path.clone(), move |conn| {
        PresentationRepository::get(conn, &user_id, &lookup_id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Presentation not found."))?;

    match presentation.slides_status {
        SlidesStatus::Pending => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "message": "Presentation is still being processed." })),
        )
            .into_response()),
        SlidesStatus::Failed => Err(ApiError::processing_failed(
            "Presentation processing failed.",
        )),
        SlidesStatus::Completed if presentation.slides.is_empty() => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "no_slides",
            "Presentation has no slides.",
        )),
        SlidesStatus::Completed => Ok(Json(presentation).into_response()),
    }
}

#[derive(Debug, serde::Deserialize)]
struct RenameRequest {
    name: String,
}

async fn rename_presentation(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if request.name.is_empty() {
        return Err(ApiError::validation("Missing 'name' field."));
    }

    let renamed = with_db(state.db_path.clone(), move |conn| {
        PresentationRepository::rename(conn, &user_id, &id, &request.name)
    })
    .await?;

    if !renamed {
        return Err(ApiError::not_found("Presentation not found."));
    }

    Ok(Json(json!({ "message": "Presentation updated successfully." })))
}

/// Explicitly (re-)trigger completion polling for a presentation whose
/// conversion is still pending. Refused while a poller is already live.
async fn trigger_poll(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let lookup_user = user_id.clone();
    let lookup_id = id.clone();
    let presentation = with_db(state.db_path.clone(), move |conn| {
        PresentationRepository::get(conn, &lookup_user, &lookup_id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Presentation not found."))?;

    if presentation.slides_status != SlidesStatus::Pending {
        return Err(ApiError::conflict(format!(
            "Slide conversion already {}.",
            presentation.slides_status.as_str()
        )));
    }

    if state.poller.spawn(&state.pollers, &user_id, &id).is_none() {
        return Err(ApiError::conflict("A poll is already running."));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Polling started." })),
    )
        .into_response())
}

//! Clip submission endpoint.
//!
//! One request carries one slide's video+audio pair. Both uploads must
//! succeed before anything is recorded; a half-uploaded clip never
//! reaches the database.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde_json::json;
use tracing::{error, info};

use crate::api::error::{ApiError, ApiResult};
use crate::api::session::UserId;
use crate::api::{with_db, AppState};
use crate::db::PresentationRepository;
use crate::presentation::{Clip, PresentationStatus};
use crate::storage::keys;

pub fn router() -> Router<AppState> {
    Router::new().route("/presentations/:id/clip", post(submit_clip))
}

const VIDEO_TYPES: &[&str] = &["video/webm", "video/mp4"];
const AUDIO_TYPES: &[&str] = &["audio/webm", "audio/mp4"];

/// One media half of a clip, with the file extension derived from its
/// declared content type.
struct MediaPart {
    content_type: String,
    extension: String,
    data: Vec<u8>,
}

struct ClipForm {
    slide_index: u32,
    clip_index: u32,
    timestamp_ms: u64,
    is_end: bool,
    video: MediaPart,
    audio: MediaPart,
}

async fn parse_clip_form(mut multipart: Multipart) -> ApiResult<ClipForm> {
    let mut slide_index: Option<u32> = None;
    let mut clip_index: Option<u32> = None;
    let mut timestamp_ms: Option<u64> = None;
    let mut is_end: Option<bool> = None;
    let mut video: Option<MediaPart> = None;
    let mut audio: Option<MediaPart> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "slideIndex" => {
                slide_index = Some(parse_number(field, "slideIndex").await?);
            }
            "clipIndex" => {
                clip_index = Some(parse_number(field, "clipIndex").await?);
            }
            "clipTimestamp" => {
                timestamp_ms = Some(parse_number(field, "clipTimestamp").await?);
            }
            "isEnd" => {
                let text = read_text(field, "isEnd").await?;
                is_end = Some(match text.as_str() {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(ApiError::validation(format!(
                            "Field 'isEnd' must be 'true' or 'false', got '{other}'."
                        )))
                    }
                });
            }
            "videoFile" => {
                video = Some(read_media(field, "videoFile", VIDEO_TYPES).await?);
            }
            "audioFile" => {
                audio = Some(read_media(field, "audioFile", AUDIO_TYPES).await?);
            }
            _ => {}
        }
    }

    Ok(ClipForm {
        slide_index: require(slide_index, "slideIndex")?,
        clip_index: require(clip_index, "clipIndex")?,
        timestamp_ms: require(timestamp_ms, "clipTimestamp")?,
        is_end: require(is_end, "isEnd")?,
        video: require(video, "videoFile")?,
        audio: require(audio, "audioFile")?,
    })
}

fn require<T>(value: Option<T>, name: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::validation(format!("Missing required field '{name}'.")))
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::validation(format!("Failed to read '{name}': {e}")))
}

async fn parse_number<T: std::str::FromStr>(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> ApiResult<T> {
    let text = read_text(field, name).await?;
    text.parse().map_err(|_| {
        ApiError::validation(format!("Field '{name}' must be a number, got '{text}'."))
    })
}

async fn read_media(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
    allowed: &[&str],
) -> ApiResult<MediaPart> {
    let content_type = field
        .content_type()
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation(format!("File '{name}' has no content type.")))?;

    if !allowed.contains(&content_type.as_str()) {
        return Err(ApiError::validation(format!(
            "File '{name}' must be one of {allowed:?}, got '{content_type}'."
        )));
    }

    // "video/webm" -> "webm"
    let extension = content_type
        .split('/')
        .nth(1)
        .unwrap_or("bin")
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::validation(format!("Failed to read '{name}': {e}")))?
        .to_vec();

    Ok(MediaPart {
        content_type,
        extension,
        data,
    })
}

async fn submit_clip(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(presentation_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let form = parse_clip_form(multipart).await?;

    let lookup_user = user_id.clone();
    let lookup_id = presentation_id.clone();
    let presentation = with_db(state.db_path.clone(), move |conn| {
        PresentationRepository::get(conn, &lookup_user, &lookup_id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Presentation not found."))?;

    let prefix = keys::clip_prefix(
        &user_id,
        &presentation_id,
        form.clip_index,
        form.timestamp_ms,
        form.is_end,
        form.slide_index,
    );
    let video_key = format!("{prefix}video.{}", form.video.extension);
    let audio_key = format!("{prefix}audio.{}", form.audio.extension);

    // Upload both halves before touching the record; abort on either failure
    for (key, part, label) in [
        (&video_key, form.video, "video"),
        (&audio_key, form.audio, "audio"),
    ] {
        state
            .gateway
            .put(key, part.data, &part.content_type)
            .await
            .map_err(|e| {
                error!(
                    presentation_id = %presentation_id,
                    slide_index = form.slide_index,
                    "Clip {label} upload failed: {e}"
                );
                ApiError::storage(format!("Failed to upload {label} to storage."))
            })?;
    }

    let clip = Clip {
        slide_index: form.slide_index,
        video_key,
        audio_key,
        feedback: None,
    };

    let record_id = presentation_id.clone();
    let is_end = form.is_end;
    let current_status = presentation.presentation_status;
    with_db(state.db_path.clone(), move |conn| {
        PresentationRepository::upsert_clip(conn, &record_id, &clip)?;

        if current_status == PresentationStatus::Pending {
            PresentationRepository::advance_status(
                conn,
                &record_id,
                PresentationStatus::Pending,
                PresentationStatus::Processing,
            )?;
        }
        if is_end {
            PresentationRepository::advance_status(
                conn,
                &record_id,
                PresentationStatus::Processing,
                PresentationStatus::Complete,
            )?;
        }
        Ok(())
    })
    .await?;

    info!(
        presentation_id = %presentation_id,
        slide_index = form.slide_index,
        is_end = form.is_end,
        "Clip stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Video and audio uploaded successfully." })),
    ))
}

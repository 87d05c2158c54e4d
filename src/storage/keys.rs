//! Object key layout.
//!
//! These formats are shared with the external slide-conversion worker and
//! the feedback analyzer; existing buckets already hold data under them,
//! so they must not change.

/// Prefix all objects of one presentation live under.
pub fn presentation_prefix(user_id: &str, presentation_id: &str) -> String {
    format!("Users/{user_id}/presentations/{presentation_id}/")
}

/// Key of the uploaded source document.
pub fn pdf_key(user_id: &str, presentation_id: &str, name: &str) -> String {
    format!(
        "{}pdf/original_{name}.pdf",
        presentation_prefix(user_id, presentation_id)
    )
}

/// Sentinel object the conversion worker writes when all slides are rendered.
pub fn completion_marker_key(user_id: &str, presentation_id: &str) -> String {
    format!(
        "{}status_completed",
        presentation_prefix(user_id, presentation_id)
    )
}

/// Prefix the rendered slide images are listed under.
pub fn slides_prefix(user_id: &str, presentation_id: &str) -> String {
    format!("{}slides/", presentation_prefix(user_id, presentation_id))
}

/// Prefix for one clip's media pair.
pub fn clip_prefix(
    user_id: &str,
    presentation_id: &str,
    clip_index: u32,
    timestamp_ms: u64,
    is_end: bool,
    slide_index: u32,
) -> String {
    format!(
        "{}clips/{clip_index}_{timestamp_ms}_{is_end}/{slide_index}/",
        presentation_prefix(user_id, presentation_id)
    )
}

//! Presentation and clip repository.
//!
//! Mutations that race with the background poller are conditional field
//! updates (`UPDATE ... WHERE status = ...`), so concurrent writers can
//! never resurrect a terminal status or lose a slide list.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::presentation::{
    Clip, ClipFeedback, Presentation, PresentationStatus, Preset, SlidesStatus,
};

pub struct PresentationRepository;

impl PresentationRepository {
    pub fn insert(conn: &Connection, presentation: &Presentation) -> Result<()> {
        conn.execute(
            "INSERT INTO presentations \
             (id, user_id, name, pdf_key, preset_json, slides_status, slides_json, presentation_status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                presentation.id,
                presentation.user_id,
                presentation.name,
                presentation.pdf_key,
                serde_json::to_string(&presentation.preset)?,
                presentation.slides_status.as_str(),
                serde_json::to_string(&presentation.slides)?,
                presentation.presentation_status.as_str(),
                presentation.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert presentation")?;
        Ok(())
    }

    /// Get one presentation (with its clips) owned by `user_id`.
    pub fn get(conn: &Connection, user_id: &str, id: &str) -> Result<Option<Presentation>> {
        let row = conn
            .query_row(
                "SELECT id, user_id, name, pdf_key, preset_json, slides_status, slides_json, \
                 presentation_status, created_at \
                 FROM presentations WHERE user_id = ?1 AND id = ?2",
                params![user_id, id],
                Self::map_row,
            )
            .optional()
            .context("Failed to query presentation")?;

        let Some(mut presentation) = row.transpose()? else {
            return Ok(None);
        };
        presentation.clips = Self::clips(conn, id)?;
        Ok(Some(presentation))
    }

    /// All presentations owned by `user_id`, newest first, clips included.
    pub fn list(conn: &Connection, user_id: &str) -> Result<Vec<Presentation>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, name, pdf_key, preset_json, slides_status, slides_json, \
                 presentation_status, created_at \
                 FROM presentations WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .context("Failed to prepare list query")?;

        let rows = stmt
            .query_map(params![user_id], Self::map_row)
            .context("Failed to list presentations")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to map presentations")?;

        let mut presentations = Vec::with_capacity(rows.len());
        for row in rows {
            let mut presentation = row?;
            let id = presentation.id.clone();
            presentation.clips = Self::clips(conn, &id)?;
            presentations.push(presentation);
        }
        Ok(presentations)
    }

    pub fn rename(conn: &Connection, user_id: &str, id: &str, name: &str) -> Result<bool> {
        let touched = conn
            .execute(
                "UPDATE presentations SET name = ?1 WHERE user_id = ?2 AND id = ?3",
                params![name, user_id, id],
            )
            .context("Failed to rename presentation")?;
        Ok(touched > 0)
    }

    /// Record a finished slide conversion: slide URLs plus
    /// `slides_status = completed`, in one conditional update.
    ///
    /// Idempotent: an already-completed row is overwritten (last write
    /// wins on the slide list). A failed row is left alone. Never accepts
    /// an empty slide list.
    pub fn complete_slides(conn: &Connection, id: &str, slide_urls: &[String]) -> Result<bool> {
        if slide_urls.is_empty() {
            bail!("Refusing to mark slides completed with an empty slide list");
        }

        let touched = conn
            .execute(
                "UPDATE presentations SET slides_status = ?1, slides_json = ?2 \
                 WHERE id = ?3 AND slides_status IN (?4, ?1)",
                params![
                    SlidesStatus::Completed.as_str(),
                    serde_json::to_string(slide_urls)?,
                    id,
                    SlidesStatus::Pending.as_str(),
                ],
            )
            .context("Failed to complete slides")?;
        Ok(touched > 0)
    }

    /// Mark the slide conversion failed. Only a pending row can fail;
    /// `failed` is terminal.
    pub fn fail_slides(conn: &Connection, id: &str) -> Result<bool> {
        let touched = conn
            .execute(
                "UPDATE presentations SET slides_status = ?1 \
                 WHERE id = ?2 AND slides_status = ?3",
                params![
                    SlidesStatus::Failed.as_str(),
                    id,
                    SlidesStatus::Pending.as_str(),
                ],
            )
            .context("Failed to mark slides failed")?;
        Ok(touched > 0)
    }

    /// Advance `presentation_status` from `from` to `to`. The transition is
    /// validated by the state machine first, then applied conditionally so a
    /// concurrent writer cannot make it fire twice.
    pub fn advance_status(
        conn: &Connection,
        id: &str,
        from: PresentationStatus,
        to: PresentationStatus,
    ) -> Result<bool> {
        from.transition(to)?;

        let touched = conn
            .execute(
                "UPDATE presentations SET presentation_status = ?1 \
                 WHERE id = ?2 AND presentation_status = ?3",
                params![to.as_str(), id, from.as_str()],
            )
            .context("Failed to advance presentation status")?;
        Ok(touched > 0)
    }

    pub fn presentation_status(conn: &Connection, id: &str) -> Result<Option<PresentationStatus>> {
        let status: Option<String> = conn
            .query_row(
                "SELECT presentation_status FROM presentations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read presentation status")?;

        Ok(status.as_deref().and_then(PresentationStatus::parse))
    }

    /// Insert or overwrite the clip for one slide index.
    pub fn upsert_clip(conn: &Connection, presentation_id: &str, clip: &Clip) -> Result<()> {
        conn.execute(
            "INSERT INTO clips (presentation_id, slide_index, video_key, audio_key, feedback_json) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(presentation_id, slide_index) DO UPDATE SET \
             video_key = excluded.video_key, \
             audio_key = excluded.audio_key, \
             feedback_json = excluded.feedback_json",
            params![
                presentation_id,
                clip.slide_index,
                clip.video_key,
                clip.audio_key,
                clip.feedback
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
            ],
        )
        .context("Failed to upsert clip")?;
        Ok(())
    }

    pub fn clips(conn: &Connection, presentation_id: &str) -> Result<Vec<Clip>> {
        let mut stmt = conn
            .prepare(
                "SELECT slide_index, video_key, audio_key, feedback_json \
                 FROM clips WHERE presentation_id = ?1 ORDER BY slide_index ASC",
            )
            .context("Failed to prepare clips query")?;

        let clips = stmt
            .query_map(params![presentation_id], |row| {
                let slide_index: u32 = row.get(0)?;
                let video_key: String = row.get(1)?;
                let audio_key: String = row.get(2)?;
                let feedback_json: Option<String> = row.get(3)?;
                Ok((slide_index, video_key, audio_key, feedback_json))
            })
            .context("Failed to query clips")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to map clips")?;

        clips
            .into_iter()
            .map(|(slide_index, video_key, audio_key, feedback_json)| {
                let feedback: Option<ClipFeedback> = feedback_json
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .context("Failed to parse clip feedback")?;
                Ok(Clip {
                    slide_index,
                    video_key,
                    audio_key,
                    feedback,
                })
            })
            .collect()
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Presentation>> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let name: String = row.get(2)?;
        let pdf_key: String = row.get(3)?;
        let preset_json: String = row.get(4)?;
        let slides_status: String = row.get(5)?;
        let slides_json: String = row.get(6)?;
        let presentation_status: String = row.get(7)?;
        let created_at: String = row.get(8)?;

        Ok(Self::build(
            id,
            user_id,
            name,
            pdf_key,
            preset_json,
            slides_status,
            slides_json,
            presentation_status,
            created_at,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        id: String,
        user_id: String,
        name: String,
        pdf_key: String,
        preset_json: String,
        slides_status: String,
        slides_json: String,
        presentation_status: String,
        created_at: String,
    ) -> Result<Presentation> {
        let preset: Preset =
            serde_json::from_str(&preset_json).context("Failed to parse preset")?;
        let slides: Vec<String> =
            serde_json::from_str(&slides_json).context("Failed to parse slide list")?;
        let slides_status = SlidesStatus::parse(&slides_status)
            .with_context(|| format!("Unknown slides status: {slides_status}"))?;
        let presentation_status = PresentationStatus::parse(&presentation_status)
            .with_context(|| format!("Unknown presentation status: {presentation_status}"))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .context("Failed to parse created_at")?
            .with_timezone(&chrono::Utc);

        Ok(Presentation {
            id,
            name,
            user_id,
            created_at,
            pdf_key,
            preset,
            slides_status,
            slides,
            presentation_status,
            clips: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn sample_presentation(id: &str) -> Presentation {
        Presentation::new(
            id.to_string(),
            "Demo talk".to_string(),
            "user-1".to_string(),
            format!("Users/user-1/presentations/{id}/pdf/original_Demo talk.pdf"),
            Preset::default(),
        )
    }

    fn sample_clip(slide_index: u32) -> Clip {
        Clip {
            slide_index,
            video_key: format!("clips/{slide_index}/video.webm"),
            audio_key: format!("clips/{slide_index}/audio.webm"),
            feedback: None,
        }
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let conn = setup_test_db();
        let presentation = sample_presentation("p-1");
        PresentationRepository::insert(&conn, &presentation).unwrap();

        let loaded = PresentationRepository::get(&conn, "user-1", "p-1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, "p-1");
        assert_eq!(loaded.name, "Demo talk");
        assert_eq!(loaded.slides_status, SlidesStatus::Pending);
        assert!(loaded.slides.is_empty());

        // Wrong user sees nothing
        assert!(PresentationRepository::get(&conn, "user-2", "p-1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_complete_slides_requires_nonempty_list() {
        let conn = setup_test_db();
        PresentationRepository::insert(&conn, &sample_presentation("p-1")).unwrap();

        assert!(PresentationRepository::complete_slides(&conn, "p-1", &[]).is_err());

        let loaded = PresentationRepository::get(&conn, "user-1", "p-1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.slides_status, SlidesStatus::Pending);
    }

    #[test]
    fn test_complete_slides_sets_status_and_list_together() {
        let conn = setup_test_db();
        PresentationRepository::insert(&conn, &sample_presentation("p-1")).unwrap();

        let urls = vec!["http://cdn/slides/0001.png".to_string()];
        assert!(PresentationRepository::complete_slides(&conn, "p-1", &urls).unwrap());

        let loaded = PresentationRepository::get(&conn, "user-1", "p-1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.slides_status, SlidesStatus::Completed);
        assert_eq!(loaded.slides, urls);
    }

    #[test]
    fn test_complete_slides_is_idempotent_last_write_wins() {
        let conn = setup_test_db();
        PresentationRepository::insert(&conn, &sample_presentation("p-1")).unwrap();

        let first = vec!["http://cdn/a.png".to_string()];
        let second = vec!["http://cdn/a.png".to_string(), "http://cdn/b.png".to_string()];
        assert!(PresentationRepository::complete_slides(&conn, "p-1", &first).unwrap());
        assert!(PresentationRepository::complete_slides(&conn, "p-1", &second).unwrap());

        let loaded = PresentationRepository::get(&conn, "user-1", "p-1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.slides, second);
    }

    #[test]
    fn test_failed_is_terminal_for_completion() {
        let conn = setup_test_db();
        PresentationRepository::insert(&conn, &sample_presentation("p-1")).unwrap();

        assert!(PresentationRepository::fail_slides(&conn, "p-1").unwrap());
        // A late completion must not override the failure
        let urls = vec!["http://cdn/a.png".to_string()];
        assert!(!PresentationRepository::complete_slides(&conn, "p-1", &urls).unwrap());
        // Nor can it fail twice
        assert!(!PresentationRepository::fail_slides(&conn, "p-1").unwrap());

        let loaded = PresentationRepository::get(&conn, "user-1", "p-1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.slides_status, SlidesStatus::Failed);
        assert!(loaded.slides.is_empty());
    }

    #[test]
    fn test_advance_status_guards() {
        let conn = setup_test_db();
        PresentationRepository::insert(&conn, &sample_presentation("p-1")).unwrap();

        assert!(PresentationRepository::advance_status(
            &conn,
            "p-1",
            PresentationStatus::Pending,
            PresentationStatus::Processing
        )
        .unwrap());

        // Same transition again touches nothing (row no longer pending)
        assert!(!PresentationRepository::advance_status(
            &conn,
            "p-1",
            PresentationStatus::Pending,
            PresentationStatus::Processing
        )
        .unwrap());

        assert!(PresentationRepository::advance_status(
            &conn,
            "p-1",
            PresentationStatus::Processing,
            PresentationStatus::Complete
        )
        .unwrap());

        // Backwards transitions are rejected before touching the database
        assert!(PresentationRepository::advance_status(
            &conn,
            "p-1",
            PresentationStatus::Complete,
            PresentationStatus::Processing
        )
        .is_err());
    }

    #[test]
    fn test_upsert_clip_overwrites_not_duplicates() {
        let conn = setup_test_db();
        PresentationRepository::insert(&conn, &sample_presentation("p-1")).unwrap();

        PresentationRepository::upsert_clip(&conn, "p-1", &sample_clip(0)).unwrap();
        PresentationRepository::upsert_clip(&conn, "p-1", &sample_clip(1)).unwrap();

        let replacement = Clip {
            slide_index: 0,
            video_key: "clips/0-retake/video.webm".to_string(),
            audio_key: "clips/0-retake/audio.webm".to_string(),
            feedback: None,
        };
        PresentationRepository::upsert_clip(&conn, "p-1", &replacement).unwrap();

        let clips = PresentationRepository::clips(&conn, "p-1").unwrap();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].slide_index, 0);
        assert_eq!(clips[0].video_key, "clips/0-retake/video.webm");
        assert_eq!(clips[1].slide_index, 1);
    }

    #[test]
    fn test_rename() {
        let conn = setup_test_db();
        PresentationRepository::insert(&conn, &sample_presentation("p-1")).unwrap();

        assert!(PresentationRepository::rename(&conn, "user-1", "p-1", "Final title").unwrap());
        assert!(!PresentationRepository::rename(&conn, "user-2", "p-1", "Hijack").unwrap());

        let loaded = PresentationRepository::get(&conn, "user-1", "p-1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name, "Final title");
    }

    #[test]
    fn test_list_orders_newest_first() {
        let conn = setup_test_db();
        let mut older = sample_presentation("p-old");
        older.created_at = chrono::Utc::now() - chrono::Duration::hours(2);
        PresentationRepository::insert(&conn, &older).unwrap();
        PresentationRepository::insert(&conn, &sample_presentation("p-new")).unwrap();

        let presentations = PresentationRepository::list(&conn, "user-1").unwrap();
        assert_eq!(presentations.len(), 2);
        assert_eq!(presentations[0].id, "p-new");
        assert_eq!(presentations[1].id, "p-old");
    }
}

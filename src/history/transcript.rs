use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::context::Turn;
use crate::core::errors::ApiError;

/// Per-user transcript files under `chats/<id>.json`.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

#[derive(Deserialize)]
struct StoredMessage {
    role: String,
    #[serde(default)]
    content: String,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, user_id: &str) -> Result<PathBuf, ApiError> {
        let name = sanitize_user_id(user_id)
            .ok_or_else(|| ApiError::BadRequest("Invalid user id".to_string()))?;
        Ok(self.dir.join(format!("{}.json", name)))
    }

    /// Returns the stored user/assistant turns, or an empty list when no
    /// transcript exists yet. Other roles are skipped.
    pub fn load(&self, user_id: &str) -> Result<Vec<Turn>, ApiError> {
        let path = self.path_for(user_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&path).map_err(ApiError::internal)?;
        let messages: Vec<StoredMessage> = serde_json::from_str(&contents).map_err(|err| {
            ApiError::Internal(format!(
                "Failed to parse transcript {}: {}",
                path.display(),
                err
            ))
        })?;

        Ok(messages
            .into_iter()
            .filter_map(|message| match message.role.as_str() {
                "user" => Some(Turn::user(message.content)),
                "assistant" => Some(Turn::assistant(message.content)),
                _ => None,
            })
            .collect())
    }

    /// Replaces the transcript with `turns`. The new contents go to
    /// `<id>.json.tmp` first and are renamed over the old file, so a failed
    /// write never leaves a truncated transcript behind.
    pub fn save(&self, user_id: &str, turns: &[Turn]) -> Result<(), ApiError> {
        let path = self.path_for(user_id)?;
        fs::create_dir_all(&self.dir).map_err(ApiError::internal)?;
        let payload = serde_json::to_string_pretty(turns).map_err(ApiError::internal)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, payload).map_err(ApiError::internal)?;
        fs::rename(&tmp_path, &path).map_err(ApiError::internal)?;
        tracing::debug!(user_id, turns = turns.len(), "Transcript saved");
        Ok(())
    }
}

/// Identifiers become file names, so only `[A-Za-z0-9_-]` is accepted.
fn sanitize_user_id(user_id: &str) -> Option<&str> {
    let valid = !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_transcript_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path().join("chats"));

        assert!(store.load("happy-otter-204").unwrap().is_empty());
    }

    #[test]
    fn saved_transcript_reloads_identically() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path().join("chats"));
        let turns = vec![
            Turn::user("Is the moon made of cheese?"),
            Turn::assistant("What makes you think so?"),
            Turn::user("A cartoon."),
        ];

        store.save("happy-otter-204", &turns).unwrap();

        assert_eq!(store.load("happy-otter-204").unwrap(), turns);
        let raw = fs::read_to_string(store.path_for("happy-otter-204").unwrap()).unwrap();
        assert!(raw.contains("\"role\": \"assistant\""));
    }

    #[test]
    fn save_overwrites_previous_transcript() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path());

        store
            .save("brave-fox-512", &[Turn::user("one"), Turn::assistant("two")])
            .unwrap();
        store.save("brave-fox-512", &[Turn::user("three")]).unwrap();

        assert_eq!(store.load("brave-fox-512").unwrap(), vec![Turn::user("three")]);
    }

    #[test]
    fn interrupted_save_leaves_previous_transcript_readable() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path());
        let turns = vec![Turn::user("one"), Turn::assistant("two")];
        store.save("brave-fox-512", &turns).unwrap();

        // A write that died halfway only ever touches the temp file.
        let tmp_path = dir.path().join("brave-fox-512.json.tmp");
        fs::write(&tmp_path, r#"[{"role":"user","con"#).unwrap();
        assert_eq!(store.load("brave-fox-512").unwrap(), turns);

        store.save("brave-fox-512", &[Turn::user("three")]).unwrap();

        assert!(!tmp_path.exists());
        assert_eq!(store.load("brave-fox-512").unwrap(), vec![Turn::user("three")]);
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("brave-fox-512.json")]);
    }

    #[test]
    fn load_skips_non_conversation_roles() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path());
        fs::write(
            dir.path().join("calm-owl-101.json"),
            r#"[{"role":"system","content":"persona"},{"role":"user","content":"hi"}]"#,
        )
        .unwrap();

        assert_eq!(store.load("calm-owl-101").unwrap(), vec![Turn::user("hi")]);
    }

    #[test]
    fn rejects_path_like_identifiers() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path());

        assert!(matches!(
            store.load("../users"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(store.save("a/b", &[]).is_err());
        assert!(store.path_for("").is_err());
    }
}

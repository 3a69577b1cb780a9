//! Persistent OAuth credential storage.
//!
//! Credentials live in a JSON object keyed by `"<host>:<app-id>"`, the same
//! layout the official Copilot clients use for `apps.json`. Two files are
//! consulted on read: our own store first, then the co-installed Copilot
//! client's store as a read-only fallback. Writes only ever touch our own
//! file and preserve entries belonging to other applications.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{AuthError, Result};

/// Host component of the credential map keys.
pub const GITHUB_HOST: &str = "github.com";

/// OAuth application identifier used for device authorization and as the
/// credential map key.
pub const OAUTH_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";

/// A single credential entry as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub oauth_token: String,
    pub user: String,
    #[serde(rename = "githubAppId")]
    pub github_app_id: String,
}

/// Path of our own credential store (`~/.config/app.json`).
pub fn app_store_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("app.json"))
}

/// Path of the co-installed Copilot client's store, read-only fallback.
pub fn foreign_store_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".config")
            .join("github-copilot")
            .join("apps.json")
    })
}

/// Look up a stored OAuth token, trying our own store first and the foreign
/// store second. Any read or parse failure is treated as "not found".
pub fn read_oauth_token() -> Option<String> {
    for path in [app_store_path(), foreign_store_path()]
        .into_iter()
        .flatten()
    {
        if let Some(token) = read_oauth_token_from(&path) {
            tracing::debug!("loaded OAuth token from {}", path.display());
            return Some(token);
        }
    }
    None
}

/// Persist an OAuth token (with the authorizing user's login) to our own
/// store. Unrelated keys already present in the file are preserved.
pub fn save_oauth_token(token: &str, user: &str) -> Result<()> {
    let path = app_store_path().ok_or_else(|| {
        AuthError::Store("unable to resolve home directory for credential storage".to_string())
    })?;
    save_oauth_token_to(&path, token, user)
}

pub(crate) fn read_oauth_token_from(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text).ok()?;

    let exact = store_key();
    let host_prefix = format!("{GITHUB_HOST}:");
    let entry = entries.get(&exact).or_else(|| {
        entries
            .iter()
            .find(|(key, _)| key.starts_with(&host_prefix))
            .map(|(_, value)| value)
    })?;

    let credential: StoredCredential = serde_json::from_value(entry.clone()).ok()?;
    if credential.oauth_token.is_empty() {
        return None;
    }
    Some(credential.oauth_token)
}

pub(crate) fn save_oauth_token_to(path: &Path, token: &str, user: &str) -> Result<()> {
    // Keep whatever other applications stored alongside our entry.
    let mut entries: serde_json::Map<String, serde_json::Value> =
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Default::default(),
            Err(err) => return Err(AuthError::Io(err)),
        };

    let credential = StoredCredential {
        oauth_token: token.to_string(),
        user: user.to_string(),
        github_app_id: OAUTH_CLIENT_ID.to_string(),
    };
    entries.insert(
        store_key(),
        serde_json::to_value(&credential)
            .map_err(|err| AuthError::Store(format!("failed to encode credential: {err}")))?,
    );

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(&entries)
        .map_err(|err| AuthError::Store(format!("failed to encode credential store: {err}")))?;
    std::fs::write(path, text)?;
    Ok(())
}

fn store_key() -> String {
    format!("{GITHUB_HOST}:{OAUTH_CLIENT_ID}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("copilot-relay-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_read_exact_key() {
        let path = scratch_file("exact.json");
        std::fs::write(
            &path,
            format!(
                r#"{{"{GITHUB_HOST}:{OAUTH_CLIENT_ID}": {{"oauth_token": "gho_abc", "user": "octocat", "githubAppId": "{OAUTH_CLIENT_ID}"}}}}"#
            ),
        )
        .unwrap();

        assert_eq!(read_oauth_token_from(&path), Some("gho_abc".to_string()));
    }

    #[test]
    fn test_read_falls_back_to_host_prefix() {
        let path = scratch_file("prefix.json");
        std::fs::write(
            &path,
            r#"{"github.com:Iv1.someotherapp": {"oauth_token": "gho_other", "user": "octocat", "githubAppId": "Iv1.someotherapp"}}"#,
        )
        .unwrap();

        assert_eq!(read_oauth_token_from(&path), Some("gho_other".to_string()));
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let path = scratch_file("does-not-exist.json");
        assert_eq!(read_oauth_token_from(&path), None);
    }

    #[test]
    fn test_read_garbage_is_none() {
        let path = scratch_file("garbage.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert_eq!(read_oauth_token_from(&path), None);
    }

    #[test]
    fn test_save_preserves_unrelated_keys() {
        let path = scratch_file("preserve.json");
        std::fs::write(
            &path,
            r#"{"github.com:Iv1.unrelated": {"oauth_token": "gho_keep", "user": "other", "githubAppId": "Iv1.unrelated"}}"#,
        )
        .unwrap();

        save_oauth_token_to(&path, "gho_new", "octocat").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let entries: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries["github.com:Iv1.unrelated"]["oauth_token"],
            "gho_keep"
        );
        let own = &entries[&format!("{GITHUB_HOST}:{OAUTH_CLIENT_ID}")];
        assert_eq!(own["oauth_token"], "gho_new");
        assert_eq!(own["user"], "octocat");
        assert_eq!(own["githubAppId"], OAUTH_CLIENT_ID);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let path = scratch_file("nested/dir/app.json");
        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());

        save_oauth_token_to(&path, "gho_new", "octocat").unwrap();
        assert_eq!(read_oauth_token_from(&path), Some("gho_new".to_string()));
    }
}

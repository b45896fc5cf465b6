use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::UserProfile;

/// The scoring profile lives in a JSON file so keyword edits (and the
/// version bump that invalidates old triage decisions) don't require a
/// rebuild. A missing file yields the default version-1 profile.
pub fn load_profile(override_path: Option<&Path>) -> Result<UserProfile> {
    let path = match override_path {
        Some(path) => path.to_path_buf(),
        None => default_path()?,
    };

    if !path.exists() {
        return Ok(UserProfile::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read profile file: {}", path.display()))?;
    let profile: UserProfile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid profile JSON: {}", path.display()))?;
    Ok(profile)
}

pub fn profile_path(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(path.to_path_buf()),
        None => default_path(),
    }
}

fn default_path() -> Result<PathBuf> {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "pursuit") {
        Ok(proj_dirs.data_dir().join("profile.json"))
    } else {
        Ok(PathBuf::from("profile.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default_profile() {
        let dir = std::env::temp_dir().join("pursuit-profile-missing");
        let profile = load_profile(Some(&dir.join("nope.json"))).unwrap();
        assert_eq!(profile.profile_version, 1);
    }

    #[test]
    fn profile_file_round_trips() {
        let dir = std::env::temp_dir().join("pursuit-profile-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.json");
        fs::write(
            &path,
            r#"{
                "profile_version": 3,
                "must_have_keywords": ["react"],
                "hard_no_keywords": ["php"],
                "preferred_keywords": [],
                "excluded_keywords": [],
                "notes": "remote only"
            }"#,
        )
        .unwrap();

        let profile = load_profile(Some(&path)).unwrap();
        assert_eq!(profile.profile_version, 3);
        assert_eq!(profile.must_have_keywords, vec!["react".to_string()]);
        assert_eq!(profile.notes, "remote only");
    }

    #[test]
    fn partial_profile_fills_defaults() {
        let dir = std::env::temp_dir().join("pursuit-profile-partial");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.json");
        fs::write(&path, r#"{"profile_version": 7}"#).unwrap();

        let profile = load_profile(Some(&path)).unwrap();
        assert_eq!(profile.profile_version, 7);
        assert!(profile.hard_no_keywords.is_empty());
    }
}

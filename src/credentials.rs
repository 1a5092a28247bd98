use std::path::Path;

use chrono::SecondsFormat;

use crate::aws::Credentials;
use crate::profile_file::{self, Section};

pub async fn save(profile: &str, credentials: &Credentials) -> anyhow::Result<()> {
    let path = profile_file::aws_file_path("AWS_SHARED_CREDENTIALS_FILE", "credentials")?;
    save_to(&path, profile, credentials).await
}

pub async fn save_to(path: &Path, profile: &str, credentials: &Credentials) -> anyhow::Result<()> {
    let entries = Section::from([
        ("aws_access_key_id".to_string(), credentials.access_key_id.clone()),
        ("aws_secret_access_key".to_string(), credentials.secret_access_key.clone()),
        ("aws_session_token".to_string(), credentials.session_token.clone()),
        (
            "aws_session_expiration".to_string(),
            credentials.expiration.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    ]);
    profile_file::update_section(path, profile, entries).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn writes_profile_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(&path, "[prod]\naws_access_key_id = AKIAPROD\n").unwrap();

        let credentials = Credentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
        };
        save_to(&path, "dev", &credentials).await.unwrap();

        let sections = profile_file::load(&path).unwrap();
        assert_eq!(sections["prod"]["aws_access_key_id"], "AKIAPROD");
        assert_eq!(sections["dev"]["aws_access_key_id"], "ASIAEXAMPLE");
        assert_eq!(sections["dev"]["aws_secret_access_key"], "secret");
        assert_eq!(sections["dev"]["aws_session_token"], "token");
        assert_eq!(sections["dev"]["aws_session_expiration"], "2026-10-18T12:00:00Z");
    }
}

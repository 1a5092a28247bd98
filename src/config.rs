use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::AuthError;
use crate::profile_file::{self, Section};

const APP_ID_URI_KEY: &str = "app_id_uri";
const AZURE_TENANT_ID_KEY: &str = "azure_tenant_id";
const DEFAULT_SESSION_DURATION_HOURS_KEY: &str = "default_session_duration_hours";
const CHROME_USER_DATA_DIR_KEY: &str = "chrome_user_data_dir";

/// Per-profile settings kept in the AWS config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub app_id_uri: String,
    pub azure_tenant_id: String,
    pub default_session_duration_hours: u8,
    pub chrome_user_data_dir: PathBuf,
}

impl Config {
    pub fn load(profile: &str) -> anyhow::Result<Self> {
        Self::load_from(&config_file_path()?, profile)
    }

    pub fn load_from(path: &Path, profile: &str) -> anyhow::Result<Self> {
        let mut sections = profile_file::load(path)?;
        let section_name = section_name(profile);
        let section = sections
            .remove(&section_name)
            .with_context(|| format!("section [{}] not found in {}", section_name, path.display()))?;

        let get = |key: &str| {
            section
                .get(key)
                .cloned()
                .with_context(|| format!("key {} not found in [{}]", key, section_name))
        };

        Ok(Self {
            app_id_uri: get(APP_ID_URI_KEY)?,
            azure_tenant_id: get(AZURE_TENANT_ID_KEY)?,
            default_session_duration_hours: parse_session_duration_hours(&get(
                DEFAULT_SESSION_DURATION_HOURS_KEY,
            )?)?,
            chrome_user_data_dir: PathBuf::from(get(CHROME_USER_DATA_DIR_KEY)?),
        })
    }

    pub async fn save(&self, profile: &str) -> anyhow::Result<()> {
        self.save_to(&config_file_path()?, profile).await
    }

    pub async fn save_to(&self, path: &Path, profile: &str) -> anyhow::Result<()> {
        let entries = Section::from([
            (APP_ID_URI_KEY.to_string(), self.app_id_uri.clone()),
            (AZURE_TENANT_ID_KEY.to_string(), self.azure_tenant_id.clone()),
            (
                DEFAULT_SESSION_DURATION_HOURS_KEY.to_string(),
                self.default_session_duration_hours.to_string(),
            ),
            (
                CHROME_USER_DATA_DIR_KEY.to_string(),
                self.chrome_user_data_dir.display().to_string(),
            ),
        ]);
        profile_file::update_section(path, &section_name(profile), entries).await
    }
}

/// Session durations are whole hours between 1 and 12.
pub fn parse_session_duration_hours(value: &str) -> anyhow::Result<u8> {
    match value.trim().parse::<u8>() {
        Ok(hours) if (1..=12).contains(&hours) => Ok(hours),
        _ => Err(AuthError::InvalidSessionDuration(value.to_string()).into()),
    }
}

pub fn default_chrome_user_data_dir() -> anyhow::Result<PathBuf> {
    Ok(profile_file::home_dir()?
        .join(".config")
        .join(env!("CARGO_PKG_NAME"))
        .join("chrome-user-data"))
}

fn config_file_path() -> anyhow::Result<PathBuf> {
    profile_file::aws_file_path("AWS_CONFIG_FILE", "config")
}

fn section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {}", profile)
    }
}

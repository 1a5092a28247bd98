//! Shared AWS ini files (`~/.aws/config`, `~/.aws/credentials`), read and rewritten per section.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ini::{EscapePolicy, Ini, ParseOption, WriteOption};

pub type Section = BTreeMap<String, String>;
pub type Sections = BTreeMap<String, Section>;

pub fn home_dir() -> anyhow::Result<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let home = std::env::var(var).with_context(|| format!("{} is not set", var))?;
    Ok(PathBuf::from(home))
}

/// `$<env_var>` if set, otherwise `~/.aws/<file_name>`.
pub fn aws_file_path(env_var: &str, file_name: &str) -> anyhow::Result<PathBuf> {
    match std::env::var(env_var) {
        Ok(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(home_dir()?.join(".aws").join(file_name)),
    }
}

/// Values are kept verbatim: no quote stripping, no backslash escapes.
fn parse_option() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    }
}

fn read(path: &Path) -> anyhow::Result<Ini> {
    if !path.is_file() {
        return Ok(Ini::new());
    }
    Ini::load_from_file_opt(path, parse_option())
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Reads every named section of the file. A missing file has no sections.
pub fn load(path: &Path) -> anyhow::Result<Sections> {
    let ini = read(path)?;
    let sections = ini
        .iter()
        .filter_map(|(name, properties)| {
            let entries = properties
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect::<Section>();
            name.map(|name| (name.to_string(), entries))
        })
        .collect();
    Ok(sections)
}

/// Merges `entries` into `section` and writes the whole file back. Other sections keep their
/// order, names and values.
pub async fn update_section(path: &Path, section: &str, entries: Section) -> anyhow::Result<()> {
    let mut ini = read(path)?;
    for (key, value) in entries {
        ini.with_section(Some(section)).set(key, value);
    }

    let mut content = Vec::new();
    ini.write_to_opt(
        &mut content,
        WriteOption {
            escape_policy: EscapePolicy::Nothing,
            kv_separator: " = ",
            ..WriteOption::default()
        },
    )?;

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

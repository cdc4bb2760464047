//! JSON transcript export. Files are write-only; nothing is ever loaded back.

use crate::model::Session;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Serialize)]
struct ExportDocument<'a> {
    exported_at: String,
    client: &'static str,
    session: &'a Session,
}

/// Write `session` as pretty JSON to `path`, creating parent directories.
pub fn export_json(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let doc = ExportDocument {
        exported_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        client: concat!("gitoracle/", env!("CARGO_PKG_VERSION")),
        session,
    };
    let json = serde_json::to_string_pretty(&doc).context("serialize transcript")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), session_id = %session.id, "transcript exported");
    Ok(())
}

/// `gitoracle-<repo>-<id prefix>.json`, safe as a file name.
pub fn default_export_name(session: &Session) -> String {
    let repo: String = session
        .repository_name()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let id = session.id.simple().to_string();
    format!("gitoracle-{repo}-{}.json", &id[id.len() - 8..])
}

/// Export into the current directory under [`default_export_name`]; returns the absolute path.
pub fn export_to_current_dir(session: &Session) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().context("get current directory")?;
    let path = current_dir.join(default_export_name(session));
    export_json(&path, session)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;

    #[test]
    fn writes_session_with_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        let mut s = Session::new("acme/widgets".into(), "https://github.com/acme/widgets".into());
        s.messages.push(Message::user("What is this?"));
        s.messages.push(Message::failure("HTTP 500"));

        export_json(&path, &s).unwrap();
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["session"]["repository_label"], "acme/widgets");
        assert_eq!(v["session"]["messages"][0]["role"], "user");
        assert_eq!(v["session"]["messages"][1]["is_error"], true);
        assert!(v["exported_at"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[test]
    fn default_name_is_file_safe() {
        let s = Session::new(
            crate::model::UNKNOWN_REPOSITORY.into(),
            "https://example.com".into(),
        );
        let name = default_export_name(&s);
        assert!(name.starts_with("gitoracle-Unknown-Repository-"));
        assert!(name.ends_with(".json"));
        assert!(!name.contains(' '));
    }
}

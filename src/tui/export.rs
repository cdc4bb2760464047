use crate::store::StoreHandle;
use anyhow::{Context, Result};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Export the active conversation into the current directory.
/// Returns the absolute path of the exported file.
pub fn export_active_session(store: &StoreHandle) -> Result<std::path::PathBuf> {
    let session = store
        .lock()
        .active_session()
        .cloned()
        .context("no conversation selected")?;
    crate::export::export_to_current_dir(&session)
}

/// Export and update state.info with the result.
pub fn export_and_show_path(store: &StoreHandle, state: &mut UiState) {
    match export_active_session(store) {
        Ok(path) => {
            state.info = format!("Exported: {}", path.display());
        }
        Err(e) => {
            state.info = format!("Export failed: {e:#}");
        }
    }
}

/// Copy the active conversation's repository URL.
pub fn copy_source_url(store: &StoreHandle, state: &mut UiState) {
    let url = store.lock().active_session().map(|s| s.source_url.clone());
    state.info = match url {
        Some(url) => match copy_to_clipboard(&url) {
            Ok(()) => format!("Copied: {url}"),
            Err(e) => format!("Copy failed: {e:#}"),
        },
        None => "No conversation selected".into(),
    };
}

/// Initialize the clipboard manager thread if not already initialized.
/// Each clipboard instance is kept alive for a while so clipboard managers on Linux can read it.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                match Clipboard::new() {
                    Ok(mut clipboard) => {
                        if clipboard.set_text(&text).is_ok() {
                            std::thread::sleep(Duration::from_secs(2));
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue `text` for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

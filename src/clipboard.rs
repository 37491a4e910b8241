use anyhow::{anyhow, Result};
use copypasta::{ClipboardContext, ClipboardProvider};

/// Copy text to the system clipboard.
pub fn copy_to_clipboard(content: &str) -> Result<()> {
    let mut ctx = ClipboardContext::new().map_err(|e| anyhow!("Clipboard unavailable: {}", e))?;
    ctx.set_contents(content.to_string())
        .map_err(|e| anyhow!("Failed to write clipboard: {}", e))
}

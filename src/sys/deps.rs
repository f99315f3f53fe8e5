use anyhow::{bail, Context, Result};
use std::process::Command;

/// Runs `<program> --version` and returns the reported version.
pub fn check_yt_dlp(program: &str) -> Result<String> {
    let output = Command::new(program)
        .arg("--version")
        .output()
        .with_context(|| format!("Failed to execute {}. Is it installed and in your PATH?", program))?;

    if !output.status.success() {
        bail!("{} --version failed with status: {}", program, output.status);
    }

    let version_str = String::from_utf8(output.stdout)?.trim().to_string();
    Ok(version_str)
}

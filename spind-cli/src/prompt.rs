//! Terminal prompts. Reads run on the blocking pool so Ctrl-C stays responsive.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use zeroize::Zeroizing;

/// Prompt without echo.
pub async fn secret(label: &str) -> Result<Zeroizing<String>> {
    let label = format!("{}: ", label);
    let value = tokio::task::spawn_blocking(move || rpassword::prompt_password(label))
        .await
        .context("prompt task failed")??;
    Ok(Zeroizing::new(value))
}

/// Prompt twice without echo and require both to match.
pub async fn new_secret(label: &str) -> Result<Zeroizing<String>> {
    let first = secret(label).await?;
    if first.is_empty() {
        bail!("{} must not be empty", label);
    }
    let second = secret(&format!("Repeat {}", label.to_lowercase())).await?;
    if *first != *second {
        bail!("Entries do not match");
    }
    Ok(first)
}

/// Prompt with echo and return the trimmed line.
pub async fn line(label: &str) -> Result<String> {
    let label = label.to_string();
    tokio::task::spawn_blocking(move || -> Result<String> {
        print!("{}: ", label);
        std::io::stdout().flush()?;
        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().to_string())
    })
    .await
    .context("prompt task failed")?
}

/// Yes/no question, `default` on empty input.
pub async fn confirm(label: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let answer = line(&format!("{} {}", label, hint)).await?;
    Ok(match answer.to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    })
}

//! Background check for newer releases.
//!
//! Queries the GitHub latest-release endpoint and prints a hint when a newer
//! version exists. Notification only: nothing is downloaded or installed.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::config::{UpdateConfig, parse_bool};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    format!("combo-batch/{version} ({os}; {arch})")
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    html_url: String,
}

/// Launches an asynchronous update check without waiting for completion.
///
/// The returned handle can be awaited if the caller wants to observe the
/// outcome; otherwise, dropping it keeps the task running in the background.
pub fn check_for_updates_background(update_config: UpdateConfig) -> Option<JoinHandle<()>> {
    let skip = std::env::var("COMBO_BATCH_SKIP_UPDATE_CHECK")
        .ok()
        .map(|raw| parse_bool(&raw, "COMBO_BATCH_SKIP_UPDATE_CHECK").unwrap_or(true))
        .unwrap_or(false);
    if skip {
        println!("ℹ️ Update check disabled (COMBO_BATCH_SKIP_UPDATE_CHECK set).");
        return None;
    }

    Some(tokio::spawn(async move {
        if let Err(err) = check_for_updates(&update_config).await {
            eprintln!("⚠️ Update check failed: {err}");
        }
    }))
}

async fn check_for_updates(
    config: &UpdateConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let token = github_token();
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(user_agent())
        .build()?;

    let mut request = client.get(config.latest_release_endpoint());
    if let Some(ref token) = token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::FORBIDDEN {
        let headers = response.headers().clone();
        if is_rate_limit_response(&headers) {
            let mut message =
                String::from("⏱️ GitHub rate limit reached. The update check was skipped.");
            if let Some(wait) = rate_limit_reset_duration(&headers) {
                message.push_str(&format!(" Please try again in {}.", format_wait(wait)));
            }
            println!("{message}");
            if token.is_none() {
                println!(
                    "💡 Hint: Set COMBO_BATCH_GITHUB_TOKEN or GITHUB_TOKEN with a personal access token to raise the limit."
                );
            }
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("unknown response"));
        return Err(format!("GitHub API responded with 403 Forbidden: {body}").into());
    }

    if status == StatusCode::UNAUTHORIZED {
        eprintln!(
            "⚠️ GitHub rejected the supplied token (401 Unauthorized). Check COMBO_BATCH_GITHUB_TOKEN or GITHUB_TOKEN."
        );
        return Ok(());
    }

    if status == StatusCode::NOT_FOUND {
        println!(
            "ℹ️ No release found for {}/{} (404 Not Found).",
            config.owner(),
            config.repo()
        );
        return Ok(());
    }

    let response = response.error_for_status()?;
    let release: ReleaseResponse = response.json().await?;

    let latest = release.tag_name.trim_start_matches('v');
    let current = env!("CARGO_PKG_VERSION");

    match (
        semver::Version::parse(current),
        semver::Version::parse(latest),
    ) {
        (Ok(current_ver), Ok(latest_ver)) if latest_ver > current_ver => {
            println!(
                "✨ A newer version ({}) is available! Download it at {}.",
                release.tag_name, release.html_url
            );
        }
        (Ok(_), Ok(_)) => {
            println!("✅ You are running the latest version (v{current}).");
        }
        _ => {
            println!(
                "ℹ️ Could not compare versions. Current: v{current}, server: {}",
                release.tag_name
            );
        }
    }

    Ok(())
}

fn github_token() -> Option<String> {
    env_token("COMBO_BATCH_GITHUB_TOKEN").or_else(|| env_token("GITHUB_TOKEN"))
}

fn env_token(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                eprintln!("⚠️ Environment variable {} is set but empty.", name);
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(std::env::VarError::NotPresent) => None,
        Err(err) => {
            eprintln!("⚠️ Access to {} failed: {}. Ignoring value.", name, err);
            None
        }
    }
}

fn is_rate_limit_response(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .is_some_and(|remaining| remaining == 0)
}

fn rate_limit_reset_duration(headers: &HeaderMap) -> Option<Duration> {
    let reset_epoch = headers
        .get("x-ratelimit-reset")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())?;

    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();

    let wait_secs = reset_epoch.saturating_sub(now);
    if wait_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(wait_secs))
    }
}

fn format_wait(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

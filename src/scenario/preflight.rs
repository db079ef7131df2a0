use anyhow::{anyhow, Context, Result};
use std::time::Duration;

const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetch `url` and check it looks like a WSDL document. Runs the blocking
/// request off the runtime thread.
pub async fn check_wsdl_url(url: &str) -> Result<usize> {
    let owned = url.to_string();
    tokio::task::spawn_blocking(move || fetch_wsdl(&owned))
        .await
        .context("join WSDL preflight")?
        .with_context(|| format!("WSDL preflight {url}"))
}

fn fetch_wsdl(url: &str) -> Result<usize> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(PREFLIGHT_TIMEOUT))
        .build()
        .into();
    let mut response = agent.get(url).call().context("request WSDL")?;
    let body = response
        .body_mut()
        .read_to_string()
        .context("read WSDL body")?;
    if !body.contains("definitions") {
        return Err(anyhow!("response is not a WSDL document (no definitions element)"));
    }
    tracing::debug!(url, bytes = body.len(), "WSDL reachable");
    Ok(body.len())
}

use std::collections::BTreeMap;
use std::convert::TryFrom;
use tokio::time::Duration;

pub(super) const HTTP_API: &str = "httpapi";
pub(super) const STREAM_API: &str = "streamapi";
pub(super) const TIMEOUT_MS: &str = "timeout_ms";

pub(super) struct NginxOptions {
    pub http_apis: Vec<String>,
    pub stream_apis: Vec<String>,
    pub timeout: Duration,
}

impl TryFrom<&BTreeMap<String, String>> for NginxOptions {
    type Error = String;

    fn try_from(options: &BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let timeout = match options.get(TIMEOUT_MS) {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .map_err(|_| format!("'{}' must be a number of milliseconds", TIMEOUT_MS))?,
            ),
            None => Duration::from_secs(5),
        };

        Ok(NginxOptions {
            http_apis: endpoints(options, HTTP_API)?,
            stream_apis: endpoints(options, STREAM_API)?,
            timeout,
        })
    }
}

pub(super) fn check(options: &BTreeMap<String, String>) -> Result<(), String> {
    NginxOptions::try_from(options).map(|_| ())
}

// Lists are separated by ';' or ','.
fn endpoints(options: &BTreeMap<String, String>, key: &str) -> Result<Vec<String>, String> {
    let raw = options
        .get(key)
        .ok_or_else(|| format!("missing option '{}'", key))?;

    let urls: Vec<String> = raw
        .split(|c: char| c == ';' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect();

    if urls.is_empty() {
        return Err(format!("option '{}' has no endpoints", key));
    }
    if let Some(bad) = urls.iter().find(|u| !u.starts_with("http://")) {
        return Err(format!("'{}' endpoint '{}' must start with http://", key, bad));
    }

    Ok(urls)
}

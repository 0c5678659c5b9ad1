//! Request URL construction for the three endpoint families.

use crate::error::{DataApiError, Result};
use crate::options::EffectiveConfig;

/// Which endpoint family a command targets, plus the family-specific inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlTarget {
    /// `{endpoint}/api/json/{version}/{keyspace}[/{path..}]`
    Data { endpoint: String, path: Vec<String> },
    /// `{environment base}[/{path..}][/{keyspace}]`
    Admin { path: Vec<String> },
    /// `{endpoint}/api/json/{version}`
    Embedding { endpoint: String },
}

/// Endpoint family tag, used for header selection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlFamily {
    Data,
    Admin,
    Embedding,
}

impl UrlTarget {
    pub fn data(endpoint: impl Into<String>) -> Self {
        UrlTarget::Data { endpoint: endpoint.into(), path: Vec::new() }
    }

    pub fn data_path<I, S>(endpoint: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UrlTarget::Data {
            endpoint: endpoint.into(),
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn admin<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UrlTarget::Admin { path: path.into_iter().map(Into::into).collect() }
    }

    pub fn embedding(endpoint: impl Into<String>) -> Self {
        UrlTarget::Embedding { endpoint: endpoint.into() }
    }

    pub fn family(&self) -> UrlFamily {
        match self {
            UrlTarget::Data { .. } => UrlFamily::Data,
            UrlTarget::Admin { .. } => UrlFamily::Admin,
            UrlTarget::Embedding { .. } => UrlFamily::Embedding,
        }
    }

    /// Build the absolute URL for this target under a resolved config.
    pub fn build(&self, config: &EffectiveConfig) -> Result<String> {
        match self {
            UrlTarget::Data { endpoint, path } => {
                if config.keyspace.trim().is_empty() {
                    return Err(DataApiError::usage("data-plane commands require a keyspace"));
                }
                let mut url = api_root(endpoint, config)?;
                push_segment(&mut url, &config.keyspace);
                for segment in path {
                    push_segment(&mut url, segment);
                }
                Ok(url)
            }
            UrlTarget::Admin { path } => {
                let mut url = config.environment.admin_base_url().to_string();
                for segment in path {
                    push_segment(&mut url, segment);
                }
                if config.include_keyspace_in_url && !config.keyspace.trim().is_empty() {
                    push_segment(&mut url, &config.keyspace);
                }
                Ok(url)
            }
            UrlTarget::Embedding { endpoint } => api_root(endpoint, config),
        }
    }
}

fn api_root(endpoint: &str, config: &EffectiveConfig) -> Result<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(DataApiError::usage("database endpoint must not be empty"));
    }
    let mut url = endpoint.to_string();
    push_segment(&mut url, "api/json");
    push_segment(&mut url, config.api_version.as_str());
    Ok(url)
}

// Joins with exactly one slash; empty segments are skipped.
fn push_segment(url: &mut String, segment: &str) {
    let segment = segment.trim_matches('/');
    if segment.is_empty() {
        return;
    }
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(segment);
}

/// Extract the database id from an Astra data endpoint
/// (`https://<uuid>-<region>.apps.astra.datastax.com`).
pub fn database_id_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint.split("://").nth(1).unwrap_or(endpoint);
    let host = host.split(['/', ':']).next()?;
    let candidate = host.get(..36)?;
    let looks_like_uuid = candidate.char_indices().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => c == '-',
        _ => c.is_ascii_hexdigit(),
    });
    looks_like_uuid.then(|| candidate.to_ascii_lowercase())
}

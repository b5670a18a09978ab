//! Writing the finished archive somewhere the user can find it

use crate::DeliveryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// File-save collaborator that accepts the archive and a file name
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Stores `bytes` as `filename` and returns where it ended up
    async fn deliver(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, DeliveryError>;
}

/// Tries a list of directories in order until one write succeeds
#[derive(Debug, Clone)]
pub struct DeliveryChain {
    targets: Vec<PathBuf>,
}

impl DeliveryChain {
    /// `output_dir`, then the current directory, then the temp directory
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let mut targets: Vec<PathBuf> = Vec::new();
        for dir in [output_dir.into(), PathBuf::from("."), std::env::temp_dir()] {
            if !targets.contains(&dir) {
                targets.push(dir);
            }
        }
        Self { targets }
    }

    pub fn with_targets(targets: Vec<PathBuf>) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    async fn write_to(dir: &Path, bytes: &[u8], filename: &str) -> Result<PathBuf, DeliveryError> {
        let path = dir.join(filename);
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, bytes).await
        }
        .await;

        match result {
            Ok(()) => Ok(path),
            Err(source) => Err(DeliveryError::Write { path, source }),
        }
    }
}

#[async_trait]
impl Delivery for DeliveryChain {
    async fn deliver(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, DeliveryError> {
        for dir in &self.targets {
            match Self::write_to(dir, bytes, filename).await {
                Ok(path) => {
                    tracing::info!("Archive written to {}", path.display());
                    return Ok(path);
                }
                Err(e) => tracing::warn!("Delivery attempt failed: {}", e),
            }
        }
        Err(DeliveryError::Exhausted(self.targets.len()))
    }
}

/// Lowercase ASCII slug; runs of other characters become one `-`
fn slugify(value: &str) -> String {
    let mut slug = String::new();
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// `<site-slug>-docs-<UTC timestamp>.zip`
///
/// The slug comes from the site name hint, else the host, else
/// `docs-md-export`.
pub fn archive_filename(site_name: Option<&str>, host: Option<&str>, now: DateTime<Utc>) -> String {
    let slug = [site_name, host]
        .into_iter()
        .flatten()
        .map(slugify)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "docs-md-export".to_string());
    format!("{}-docs-{}.zip", slug, now.format("%Y%m%dT%H%M%SZ"))
}

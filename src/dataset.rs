//! Dataset metadata and image retrieval.

use std::path::{Path, PathBuf};

use anyhow::Context;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::ImageRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("entry {index} has no `url`, `coco_url` or `flickr_url`")]
    NoImageUrl { index: usize },

    #[error("cannot derive a file name from url {0}")]
    NoFileName(String),
}

/// One row of dataset metadata (COCO-style).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DatasetEntry {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub coco_url: Option<String>,
    #[serde(default)]
    pub flickr_url: Option<String>,
    /// Already-local copy of the image, if any
    #[serde(default)]
    pub image_path: Option<PathBuf>,
}

impl DatasetEntry {
    /// `url`, then `coco_url`, then `flickr_url`
    pub fn image_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.coco_url.as_deref())
            .or(self.flickr_url.as_deref())
    }
}

/// Last path segment of a URL, ignoring query and fragment
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path_segments()?.next_back()?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Read up to `limit` entries from a JSON array or JSON-lines file
pub fn load_entries(path: &Path, limit: usize) -> anyhow::Result<Vec<DatasetEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset metadata {}", path.display()))?;
    parse_entries(&text, limit).with_context(|| format!("Invalid dataset metadata {}", path.display()))
}

pub fn parse_entries(text: &str, limit: usize) -> anyhow::Result<Vec<DatasetEntry>> {
    if text.trim_start().starts_with('[') {
        let mut entries: Vec<DatasetEntry> = serde_json::from_str(text)?;
        entries.truncate(limit);
        return Ok(entries);
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .take(limit)
        .map(|(lineno, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", lineno + 1))
        })
        .collect()
}

/// Records for the images already sitting in `dir`, sorted by file name
pub fn records_from_dir(dir: &Path, limit: usize) -> anyhow::Result<Vec<ImageRecord>> {
    let mut records = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        records.push(ImageRecord::new(file_name, entry.path()));
    }
    records.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    records.truncate(limit);
    Ok(records)
}

/// Downloads dataset images one at a time into a local directory.
pub struct Retriever {
    client: reqwest::Client,
    image_dir: PathBuf,
}

impl Retriever {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            image_dir: image_dir.into(),
        }
    }

    /// Decide the record for an entry without touching the network
    pub fn plan(&self, index: usize, entry: &DatasetEntry) -> Result<(ImageRecord, Option<String>), DatasetError> {
        let url = entry.image_url().map(str::to_string);

        let file_name = match (&entry.file_name, &url) {
            (Some(name), _) => name.clone(),
            (None, Some(url)) => file_name_from_url(url).ok_or_else(|| DatasetError::NoFileName(url.clone()))?,
            (None, None) => return Err(DatasetError::NoImageUrl { index }),
        };

        if let Some(path) = &entry.image_path {
            if path.is_file() {
                return Ok((ImageRecord::new(file_name, path.clone()), None));
            }
        }

        let url = url.ok_or(DatasetError::NoImageUrl { index })?;
        let download_name = file_name_from_url(&url).ok_or_else(|| DatasetError::NoFileName(url.clone()))?;
        let local_path = self.image_dir.join(download_name);
        Ok((ImageRecord::new(file_name, local_path), Some(url)))
    }

    /// Fetch every entry in order.
    ///
    /// Download failures are logged and the record is still returned; the
    /// pipeline reports it when the file cannot be opened. Entries without
    /// any usable URL are dropped. Only a failure to create the image
    /// directory is an error.
    pub async fn fetch_all(&self, entries: &[DatasetEntry]) -> anyhow::Result<Vec<ImageRecord>> {
        tokio::fs::create_dir_all(&self.image_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.image_dir.display()))?;

        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let (record, url) = match self.plan(index, entry) {
                Ok(planned) => planned,
                Err(e) => {
                    warn!("Skipping dataset entry: {}", e);
                    continue;
                }
            };

            if let Some(url) = url {
                match self.download(&url, &record.local_path).await {
                    Ok(bytes) => debug!("Downloaded {} ({} bytes)", record.file_name, bytes),
                    Err(e) => warn!("Failed to download {}: {:#}", url, e),
                }
            }
            records.push(record);
        }

        info!("Retrieved {} of {} dataset entries", records.len(), entries.len());
        Ok(records)
    }

    async fn download(&self, url: &str, destination: &Path) -> anyhow::Result<usize> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &bytes).await?;
        Ok(bytes.len())
    }
}

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model {name} not found locally and no download URL configured")]
    NotFound { name: String },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for a model file, in priority order.
#[derive(Clone, Debug, Default)]
pub struct ModelSource {
    /// File name used for directory and cache lookups.
    pub name: String,
    /// An explicit path given by the operator. Wins when it exists.
    pub path: Option<PathBuf>,
    /// Directories searched for `name` (working directory, bundled assets).
    pub search_dirs: Vec<PathBuf>,
    /// Download location used when nothing is found locally.
    pub url: Option<String>,
}

impl ModelSource {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Resolve a model file, checking local locations before downloading.
///
/// Resolution order:
/// 1. Explicit path
/// 2. Search directories
/// 3. User cache directory (platform-specific)
/// 4. Download from URL to cache
pub fn resolve(source: &ModelSource, progress: Option<ProgressFn>) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = source.path.as_ref().filter(|p| p.exists()) {
        return Ok(path.clone());
    }

    for dir in &source.search_dirs {
        let candidate = dir.join(&source.name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let cache_dir = model_cache_dir();
    if let Some(cached_path) = cache_dir.as_ref().map(|d| d.join(&source.name)) {
        if cached_path.exists() {
            return Ok(cached_path);
        }
    }

    let (Some(url), Some(cache_dir)) = (source.url.as_deref(), cache_dir) else {
        return Err(ModelResolveError::NotFound {
            name: source.name.clone(),
        });
    };
    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    let cached_path = cache_dir.join(&source.name);
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Maskwatch/models/`
/// - Linux: `$XDG_CACHE_HOME/Maskwatch/models/` or `~/.cache/Maskwatch/models/`
/// - Windows: `%LOCALAPPDATA%/Maskwatch/models/`
pub fn model_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|d| d.join("Maskwatch").join("models"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir().map(|d| d.join("Maskwatch").join("models"))
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    log::info!("Downloading {url}");
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |path: &Path, e: std::io::Error| ModelResolveError::Write {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(temp_path).map_err(|e| write_err(temp_path, e))?;

    let mut reader = response;
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|e| write_err(temp_path, e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .map_err(|e| write_err(temp_path, e))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(|e| write_err(temp_path, e))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| write_err(dest, e))?;

    Ok(())
}

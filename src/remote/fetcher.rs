//! Resource transport for remote indexes
//!
//! `HttpFetcher` is a blocking reqwest client; `DirectoryFetcher` serves
//! `file://` repositories straight from disk. Both write into a caller-owned
//! sink and honour the cancellation token between buffer reads.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::INDEX_DIR;
use crate::error::{IndexError, Result};
use crate::model::{Credentials, RepositoryDescriptor};

const COPY_BUFFER_BYTES: usize = 8 * 1024;

fn default_timeout_secs() -> u64 {
    30
}

/// Proxy and timeout settings shared by every HTTP fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub proxy_username: Option<String>,
    #[serde(default)]
    pub proxy_password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            proxy: None,
            proxy_username: None,
            proxy_password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Fetches named resources below a repository's `.index/` directory.
pub trait ResourceFetcher: Send + Sync {
    /// Where resources come from, for log messages
    fn describe(&self) -> String;

    /// Stream `name` into `dest`, returning the byte count.
    fn fetch(&self, name: &str, dest: &mut dyn Write, cancel: &CancellationToken) -> Result<u64>;
}

/// Creates the fetcher for a repository. Swappable so tests can wrap or
/// replace transport.
pub trait FetcherFactory: Send + Sync {
    fn create(&self, repository: &RepositoryDescriptor) -> Result<Box<dyn ResourceFetcher>>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultFetcherFactory {
    pub http: HttpSettings,
}

impl DefaultFetcherFactory {
    pub fn new(http: HttpSettings) -> Self {
        Self { http }
    }
}

impl FetcherFactory for DefaultFetcherFactory {
    fn create(&self, repository: &RepositoryDescriptor) -> Result<Box<dyn ResourceFetcher>> {
        let url = repository.url.as_str();
        if url.starts_with("file://") {
            Ok(Box::new(DirectoryFetcher::from_url(url)?))
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Ok(Box::new(HttpFetcher::new(url, repository.credentials.clone(), &self.http)?))
        } else {
            Err(IndexError::Config(format!(
                "repository {} has unsupported url {}",
                repository.uid, url
            )))
        }
    }
}

/// Copy `src` into `dest`, checking `cancel` before every read.
pub fn copy_with_cancel(src: &mut dyn Read, dest: &mut dyn Write, cancel: &CancellationToken) -> Result<u64> {
    let mut buf = [0u8; COPY_BUFFER_BYTES];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        dest.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    base: String,
    credentials: Option<Credentials>,
}

impl HttpFetcher {
    pub fn new(base_url: &str, credentials: Option<Credentials>, settings: &HttpSettings) -> Result<Self> {
        let base = format!("{}/{}", base_url.trim_end_matches('/'), INDEX_DIR);
        let http_error = |e: reqwest::Error| IndexError::Http {
            url: base.clone(),
            message: e.to_string(),
        };

        let mut builder = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("artidex/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy_url) = &settings.proxy {
            let mut proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(http_error)?;
            if let Some(user) = &settings.proxy_username {
                proxy = proxy.basic_auth(user, settings.proxy_password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(http_error)?;
        Ok(Self {
            client,
            base,
            credentials,
        })
    }
}

impl ResourceFetcher for HttpFetcher {
    fn describe(&self) -> String {
        self.base.clone()
    }

    fn fetch(&self, name: &str, dest: &mut dyn Write, cancel: &CancellationToken) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let url = format!("{}/{}", self.base, name);
        let mut request = self.client.get(&url);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let mut response = request.send().map_err(|e| IndexError::Http {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexError::NotFound { url });
        }
        if !status.is_success() {
            return Err(IndexError::Http {
                url,
                message: format!("server responded {}", status),
            });
        }

        let bytes = copy_with_cancel(&mut response, dest, cancel)?;
        tracing::debug!("Fetched {} ({} bytes)", url, bytes);
        Ok(bytes)
    }
}

/// Reads `<basedir>/.index/<name>` from the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            root: basedir.into().join(INDEX_DIR),
        }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let path = url
            .strip_prefix("file://")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| IndexError::Config(format!("not a file url: {}", url)))?;
        Ok(Self::new(path))
    }
}

impl ResourceFetcher for DirectoryFetcher {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn fetch(&self, name: &str, dest: &mut dyn Write, cancel: &CancellationToken) -> Result<u64> {
        let path = self.root.join(name);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound {
                    url: format!("file://{}", path.display()),
                })
            }
            Err(e) => return Err(e.into()),
        };
        copy_with_cancel(&mut file, dest, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_fetcher_reads_index_dir() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join(INDEX_DIR)).unwrap();
        std::fs::write(repo.path().join(INDEX_DIR).join("hello.txt"), b"hello").unwrap();

        let fetcher = DirectoryFetcher::from_url(&format!("file://{}", repo.path().display())).unwrap();
        let mut out = Vec::new();
        let n = fetcher.fetch("hello.txt", &mut out, &CancellationToken::new()).unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, b"hello");

        let err = fetcher.fetch("missing.gz", &mut Vec::new(), &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, IndexError::NotFound { .. }));
    }

    #[test]
    fn test_copy_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut src: &[u8] = b"data";
        let mut out = Vec::new();
        let err = copy_with_cancel(&mut src, &mut out, &cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert!(out.is_empty());
    }

    #[test]
    fn test_factory_rejects_unknown_scheme() {
        let factory = DefaultFetcherFactory::default();
        let repo = RepositoryDescriptor::remote("odd", "ftp://example.org/repo");
        assert!(matches!(factory.create(&repo), Err(IndexError::Config(_))));
        assert!(factory
            .create(&RepositoryDescriptor::remote("central", "https://repo.example.org/maven2"))
            .is_ok());
    }
}

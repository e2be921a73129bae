//! Remote manifest entries: download into a local staging directory.
//!
//! The staging directory (default `net/`, relative to the working directory)
//! doubles as an at-most-once download cache. If the file derived from a URL
//! already exists there, it is reused without touching the network, so
//! re-running the same manifest is cheap. Nothing in staging is ever cleaned
//! up by this tool.
//!
//! Each URL gets exactly one attempt. Failures are returned to the caller
//! per URL and never abort sibling entries.
//!
//! Staged names come from the last URL path segment only, so
//! `https://a.test/cat.png` and `https://b.test/x/cat.png` share `cat.png`.
//! The fetcher remembers which URL claimed each name during a run and warns
//! when a second URL lands on it; the second URL then reuses the first file.

use crate::config::NetworkConfig;
use reqwest::Url;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("URL has no file name: {0}")]
    NoFileName(String),
    #[error("Server responded {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Remote entries are disabled for this run")]
    Offline,
}

/// A fetched URL and whether the staged copy was reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub path: PathBuf,
    pub reused: bool,
}

/// Capability to turn a URL into a local file.
pub trait Fetch: Sync {
    fn fetch(&self, url: &str) -> Result<Fetched, DownloadError>;
}

/// Local file name for a URL: the last non-empty path segment.
///
/// Query strings and fragments are ignored, so `https://x/a/cat.png?v=2`
/// stages as `cat.png`.
pub fn staged_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Parse `raw` and work out where it would be staged, without any I/O.
fn plan_download(raw: &str, staging_dir: &Path) -> Result<(Url, PathBuf), DownloadError> {
    let url = Url::parse(raw).map_err(|e| DownloadError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DownloadError::UnsupportedScheme(url.scheme().to_string()));
    }
    let name = staged_name(&url).ok_or_else(|| DownloadError::NoFileName(raw.to_string()))?;
    let target = staging_dir.join(name);
    Ok((url, target))
}

/// HTTP(S) fetcher backed by a blocking `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    staging_dir: PathBuf,
    /// Staged path -> first URL that mapped to it in this run.
    claims: Mutex<HashMap<PathBuf, String>>,
}

impl HttpFetcher {
    pub fn new(config: &NetworkConfig) -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config.staging_dir.clone()))
    }

    fn with_client(client: reqwest::blocking::Client, staging_dir: PathBuf) -> Self {
        Self {
            client,
            staging_dir,
            claims: Mutex::new(HashMap::new()),
        }
    }

    /// Record that `url` staged into `target`. Returns the earlier URL when a
    /// different one already claimed the same path.
    fn claim(&self, target: &Path, url: &str) -> Option<String> {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        match claims.get(target) {
            Some(previous) if previous != url => Some(previous.clone()),
            Some(_) => None,
            None => {
                claims.insert(target.to_path_buf(), url.to_string());
                None
            }
        }
    }

    fn note_claim(&self, target: &Path, url: &Url) {
        if let Some(previous) = self.claim(target, url.as_str()) {
            tracing::warn!(
                url = %url,
                previous = %previous,
                path = %target.display(),
                "staged file name already taken by another URL, reusing its file"
            );
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, raw: &str) -> Result<Fetched, DownloadError> {
        let (url, target) = plan_download(raw, &self.staging_dir)?;

        if target.exists() {
            tracing::debug!(url = %url, path = %target.display(), "staged copy exists, skipping download");
            self.note_claim(&target, &url);
            return Ok(Fetched {
                path: target,
                reused: true,
            });
        }

        fs::create_dir_all(&self.staging_dir)?;

        tracing::debug!(url = %url, "downloading");
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status,
            });
        }
        let bytes = response.bytes()?;

        // Write beside the target and rename, so an interrupted download never
        // leaves a partial file that the skip-if-exists check would trust.
        let mut partial_name = target.as_os_str().to_os_string();
        partial_name.push(".part");
        let partial = PathBuf::from(partial_name);
        let mut file = fs::File::create(&partial)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&partial, &target)?;

        tracing::info!(url = %url, path = %target.display(), bytes = bytes.len(), "downloaded");
        self.note_claim(&target, &url);
        Ok(Fetched {
            path: target,
            reused: false,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory fetcher for resolver tests: serves canned bodies into a
    /// staging directory and counts network hits.
    pub struct MockFetcher {
        pub staging_dir: PathBuf,
        pub bodies: HashMap<String, Vec<u8>>,
        pub hits: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
            Self {
                staging_dir: staging_dir.into(),
                bodies: HashMap::new(),
                hits: Mutex::new(Vec::new()),
            }
        }

        pub fn serve(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }

        pub fn hit_count(&self) -> usize {
            self.hits.lock().unwrap().len()
        }
    }

    impl Fetch for MockFetcher {
        fn fetch(&self, raw: &str) -> Result<Fetched, DownloadError> {
            let (_, target) = plan_download(raw, &self.staging_dir)?;
            if target.exists() {
                return Ok(Fetched {
                    path: target,
                    reused: true,
                });
            }
            self.hits.lock().unwrap().push(raw.to_string());
            let body = self.bodies.get(raw).ok_or_else(|| DownloadError::Status {
                url: raw.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            })?;
            fs::create_dir_all(&self.staging_dir)?;
            fs::write(&target, body)?;
            Ok(Fetched {
                path: target,
                reused: false,
            })
        }
    }

    fn fetcher_in(dir: &Path) -> HttpFetcher {
        HttpFetcher::new(&NetworkConfig {
            staging_dir: dir.to_path_buf(),
            timeout_secs: 2,
            ..NetworkConfig::default()
        })
        .unwrap()
    }

    /// One-request-per-connection HTTP server on a loopback port. Known paths
    /// answer 200 with their body, everything else 404. Returns the base URL
    /// and a request counter.
    fn serve_locally(routes: Vec<(&'static str, &'static [u8])>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap_or(0) <= 2 {
                        break;
                    }
                }
                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = match routes.iter().find(|(p, _)| *p == path) {
                    Some((_, body)) => ("200 OK", *body),
                    None => ("404 Not Found", &b"not here"[..]),
                };
                write!(
                    stream,
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
                .unwrap();
                stream.write_all(body).unwrap();
            }
        });
        (base, hits)
    }

    fn local_fetcher(dir: &Path) -> HttpFetcher {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpFetcher::with_client(client, dir.to_path_buf())
    }

    #[test]
    fn staged_name_uses_last_segment() {
        let url = Url::parse("https://example.com/img/cat.png?size=large#top").unwrap();
        assert_eq!(staged_name(&url).as_deref(), Some("cat.png"));
    }

    #[test]
    fn staged_name_skips_trailing_slash() {
        let url = Url::parse("https://example.com/img/dogs/").unwrap();
        assert_eq!(staged_name(&url).as_deref(), Some("dogs"));
    }

    #[test]
    fn staged_name_none_for_bare_host() {
        let url = Url::parse("https://example.com").unwrap();
        assert_eq!(staged_name(&url), None);
    }

    #[test]
    fn malformed_url_is_rejected_before_io() {
        let tmp = tempfile::TempDir::new().unwrap();
        let staging = tmp.path().join("net");
        let err = fetcher_in(&staging).fetch("http://").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }), "{err}");
        assert!(!staging.exists());
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = fetcher_in(tmp.path())
            .fetch("ftp://example.com/cat.png")
            .unwrap_err();
        assert!(matches!(err, DownloadError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn url_without_file_name_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = fetcher_in(tmp.path())
            .fetch("https://example.com/")
            .unwrap_err();
        assert!(matches!(err, DownloadError::NoFileName(_)));
    }

    #[test]
    fn existing_staged_file_is_reused_without_network() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("cat.png"), b"cached bytes").unwrap();

        // Unroutable host: a network attempt would fail, proving none is made.
        let fetched = fetcher_in(tmp.path())
            .fetch("http://unreachable.invalid/pics/cat.png")
            .unwrap();

        assert!(fetched.reused);
        assert_eq!(fetched.path, tmp.path().join("cat.png"));
        assert_eq!(fs::read(&fetched.path).unwrap(), b"cached bytes");
    }

    #[test]
    fn unreachable_host_fails_without_staging_a_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = fetcher_in(tmp.path())
            .fetch("http://unreachable.invalid/pics/cat.png")
            .unwrap_err();
        // Transport error directly, or a gateway status when a proxy is configured.
        assert!(
            matches!(err, DownloadError::Transport(_) | DownloadError::Status { .. }),
            "{err}"
        );
        assert!(!tmp.path().join("cat.png").exists());
    }

    #[test]
    fn download_is_staged_then_reused() {
        let tmp = tempfile::TempDir::new().unwrap();
        let staging = tmp.path().join("net");
        let (base, hits) = serve_locally(vec![("/pics/cat.png", &b"meow bytes"[..])]);
        let fetcher = local_fetcher(&staging);
        let url = format!("{base}/pics/cat.png");

        let first = fetcher.fetch(&url).unwrap();
        assert!(!first.reused);
        assert_eq!(first.path, staging.join("cat.png"));
        assert_eq!(fs::read(&first.path).unwrap(), b"meow bytes");
        assert!(!staging.join("cat.png.part").exists());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let second = fetcher.fetch(&url).unwrap();
        assert!(second.reused);
        assert_eq!(second.path, first.path);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn not_found_is_a_status_error_and_stages_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (base, hits) = serve_locally(vec![]);

        let err = local_fetcher(tmp.path())
            .fetch(&format!("{base}/gone.png"))
            .unwrap_err();

        assert!(
            matches!(
                err,
                DownloadError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND
            ),
            "{err}"
        );
        assert!(!tmp.path().join("gone.png").exists());
        assert!(!tmp.path().join("gone.png.part").exists());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_url_with_same_name_reuses_first_download() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (base, hits) = serve_locally(vec![
            ("/a/cat.png", &b"from a"[..]),
            ("/b/cat.png", &b"from b"[..]),
        ]);
        let fetcher = local_fetcher(tmp.path());

        fetcher.fetch(&format!("{base}/a/cat.png")).unwrap();
        let second = fetcher.fetch(&format!("{base}/b/cat.png")).unwrap();

        assert!(second.reused);
        assert_eq!(fs::read(&second.path).unwrap(), b"from a");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn claim_reports_only_a_different_url() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fetcher = fetcher_in(tmp.path());
        let target = tmp.path().join("cat.png");

        assert_eq!(fetcher.claim(&target, "https://a.test/cat.png"), None);
        assert_eq!(fetcher.claim(&target, "https://a.test/cat.png"), None);
        assert_eq!(
            fetcher.claim(&target, "https://b.test/x/cat.png").as_deref(),
            Some("https://a.test/cat.png")
        );
        assert_eq!(
            fetcher.claim(&tmp.path().join("dog.png"), "https://b.test/dog.png"),
            None
        );
    }

    #[test]
    fn mock_fetcher_downloads_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fetcher = MockFetcher::new(tmp.path().join("net")).serve("https://x.test/a.png", "png");

        let first = fetcher.fetch("https://x.test/a.png").unwrap();
        let second = fetcher.fetch("https://x.test/a.png").unwrap();
        assert!(!first.reused);
        assert!(second.reused);
        assert_eq!(fetcher.hit_count(), 1);
    }
}

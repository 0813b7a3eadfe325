use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;
use url::Url;

// Escape everything reqwest would choke on but keep `/` literal so the
// remote directory structure survives in the request path.
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum DavError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Response metadata read back from a HEAD (or final chunk PUT): the HTTP
/// status, the `ETag` with surrounding quotes stripped, and the server's
/// stable `OC-FileId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavMeta {
    pub status: StatusCode,
    pub etag: Option<String>,
    pub file_id: Option<String>,
}

/// Outcome of a single chunk PUT. `mtime_accepted` is true when the server
/// answered `X-OC-Mtime: accepted`, meaning it stored the client-provided
/// modification time and no PROPPATCH round trip is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub status: StatusCode,
    pub etag: Option<String>,
    pub file_id: Option<String>,
    pub mtime_accepted: bool,
}

#[derive(Clone)]
pub struct DavClient {
    http: Client,
    base_url: Url,
}

impl DavClient {
    pub fn with_base_url(base_url: &str) -> Result<Self, DavError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn with_http(http: Client, base_url: &str) -> Result<Self, DavError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Percent-escapes a sync-root-relative path and appends it to the base
    /// URL, preserving `/` separators.
    pub fn url_for(&self, path: &str) -> Result<Url, DavError> {
        let escaped = utf8_percent_encode(path.trim_start_matches('/'), PATH_ESCAPE).to_string();
        let mut joined = self.base_url.as_str().trim_end_matches('/').to_string();
        joined.push('/');
        joined.push_str(&escaped);
        Ok(Url::parse(&joined)?)
    }

    /// The per-chunk URL: `<url>-chunking-<transfer id>-<chunk index>-<chunk count>`.
    pub fn chunk_url(
        &self,
        path: &str,
        transfer_id: u64,
        chunk: u32,
        count: u32,
    ) -> Result<Url, DavError> {
        let base = self.url_for(path)?;
        Ok(Url::parse(&format!(
            "{}-chunking-{}-{}-{}",
            base, transfer_id, chunk, count
        ))?)
    }

    pub async fn delete(&self, path: &str) -> Result<StatusCode, DavError> {
        let response = self.http.delete(self.url_for(path)?).send().await?;
        Ok(response.status())
    }

    pub async fn mkcol(&self, path: &str) -> Result<StatusCode, DavError> {
        let response = self
            .http
            .request(method("MKCOL"), self.url_for(path)?)
            .send()
            .await?;
        Ok(response.status())
    }

    /// WebDAV MOVE with overwrite.
    pub async fn move_to(&self, from: &str, to: &str) -> Result<StatusCode, DavError> {
        let destination = self.url_for(to)?;
        let response = self
            .http
            .request(method("MOVE"), self.url_for(from)?)
            .header("Destination", destination.as_str())
            .header("Overwrite", "T")
            .send()
            .await?;
        Ok(response.status())
    }

    /// PROPPATCH setting `DAV:lastmodified` to the given epoch seconds.
    pub async fn proppatch_mtime(&self, path: &str, mtime: i64) -> Result<StatusCode, DavError> {
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\
             <D:propertyupdate xmlns:D=\"DAV:\"><D:set><D:prop>\
             <D:lastmodified>{mtime}</D:lastmodified>\
             </D:prop></D:set></D:propertyupdate>"
        );
        let response = self
            .http
            .request(method("PROPPATCH"), self.url_for(path)?)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body)
            .send()
            .await?;
        Ok(response.status())
    }

    /// HEAD reading back the `ETag` and `OC-FileId` headers.
    pub async fn head(&self, path: &str) -> Result<DavMeta, DavError> {
        let response = self.http.head(self.url_for(path)?).send().await?;
        Ok(DavMeta {
            status: response.status(),
            etag: etag_from_headers(response.headers()),
            file_id: header_str(response.headers(), "OC-FileId"),
        })
    }

    /// GET with `Accept-Encoding: gzip` and, for a resumed transfer, a
    /// `Range: bytes=<offset>-` header. The body is left unconsumed so the
    /// caller can install its own reader.
    pub async fn get(
        &self,
        path: &str,
        resume_from: Option<u64>,
    ) -> Result<reqwest::Response, DavError> {
        let mut request = self
            .http
            .get(self.url_for(path)?)
            .header("Accept-Encoding", "gzip");
        if let Some(offset) = resume_from {
            request = request
                .header("Range", format!("bytes={offset}-"))
                .header("Accept-Ranges", "bytes");
        }
        Ok(request.send().await?)
    }

    /// PUT one chunk of a chunked upload. `if_match` is the previous ETag
    /// (sent quoted, the way the server hands them out); `mtime` travels in
    /// `X-OC-Mtime` so the server can adopt the client modification time.
    pub async fn put_chunk(
        &self,
        path: &str,
        transfer_id: u64,
        chunk: u32,
        count: u32,
        body: Vec<u8>,
        if_match: Option<&str>,
        mtime: i64,
    ) -> Result<ChunkOutcome, DavError> {
        let url = self.chunk_url(path, transfer_id, chunk, count)?;
        let mut request = self
            .http
            .put(url)
            .header("OC-Chunked", "1")
            .header("X-OC-Mtime", mtime.to_string())
            .body(body);
        if let Some(etag) = if_match {
            request = request.header("If-Match", format!("\"{etag}\""));
        }
        let response = request.send().await?;
        let mtime_accepted = header_str(response.headers(), "X-OC-Mtime")
            .is_some_and(|value| value == "accepted");
        Ok(ChunkOutcome {
            status: response.status(),
            etag: etag_from_headers(response.headers()),
            file_id: header_str(response.headers(), "OC-FileId"),
            mtime_accepted,
        })
    }
}

fn method(name: &str) -> Method {
    Method::from_bytes(name.as_bytes()).expect("static method token")
}

fn header_str(headers: &HeaderMap<HeaderValue>, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Reads the `ETag` header, stripping the quotes the server wraps it in.
pub fn etag_from_headers(headers: &HeaderMap<HeaderValue>) -> Option<String> {
    header_str(headers, "etag").map(|raw| strip_quotes(&raw))
}

pub fn strip_quotes(etag: &str) -> String {
    etag.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(etag)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_escapes_but_keeps_slashes() {
        let client = DavClient::with_base_url("http://server/remote.php/webdav/").unwrap();
        let url = client.url_for("Docs/Hello World.txt").unwrap();
        assert_eq!(
            url.as_str(),
            "http://server/remote.php/webdav/Docs/Hello%20World.txt"
        );
    }

    #[test]
    fn chunk_url_carries_transfer_id_index_and_count() {
        let client = DavClient::with_base_url("http://server/dav").unwrap();
        let url = client.chunk_url("a.bin", 42, 3, 10).unwrap();
        assert_eq!(url.as_str(), "http://server/dav/a.bin-chunking-42-3-10");
    }

    #[test]
    fn strip_quotes_only_removes_surrounding_pair() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("abc"), "abc");
        assert_eq!(strip_quotes("\"abc"), "\"abc");
    }
}

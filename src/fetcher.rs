pub mod bounded;
pub mod chunked;
pub mod depth;
pub mod transport;

use std::io::Read;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::{JSON_NESTING_LIMIT, MAX_REDIRECTS, MEDALS_AUTH_HEADER, USER_AGENT};
use crate::error::{AppError, Result};
use crate::fetcher::chunked::ChunkedReader;
use crate::fetcher::depth::NestingGuard;
use crate::fetcher::transport::{RawResponse, Transport};

/// Whether a resource needs the medal service's auth header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
}

/// Fetches JSON documents and decodes only the fields the caller asks for.
///
/// The decode target is the field allow-list: serde skips every field the
/// target type does not name while parsing, so nothing outside it is kept.
/// Decode into `serde_json::Value` to keep the whole document.
pub struct DocumentFetcher<T> {
    transport: T,
    auth_key: String,
}

impl<T: Transport> DocumentFetcher<T> {
    pub fn new(transport: T, auth_key: String) -> Self {
        Self { transport, auth_key }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// GET `url` and decode a 200 response body into `D`.
    ///
    /// Redirects are followed; any other non-200 status is an error. No
    /// partial value is ever returned.
    pub fn fetch_json<D: DeserializeOwned>(&self, url: &str, access: Access) -> Result<D> {
        let mut headers = vec![
            ("User-Agent", USER_AGENT),
            ("Accept", "application/json"),
            ("Connection", "close"),
        ];
        if access == Access::Authenticated {
            headers.push((MEDALS_AUTH_HEADER, self.auth_key.as_str()));
        }

        let response = self.get_following_redirects(url, &headers)?;
        if response.status != 200 {
            warn!(url, status = response.status, "HTTP {}: {url}", response.status);
            return Err(AppError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }
        decode_body(response)
    }

    fn get_following_redirects(&self, url: &str, headers: &[(&str, &str)]) -> Result<RawResponse> {
        let mut current = Url::parse(url)?;
        for _ in 0..=MAX_REDIRECTS {
            let response = self.transport.get(&current, headers)?;
            if !is_redirect(response.status) {
                return Ok(response);
            }
            let Some(location) = response.header("location") else {
                return Ok(response);
            };
            let next = current.join(location)?;
            debug!(from = %current, to = %next, status = response.status, "Following redirect");
            current = next;
        }
        Err(AppError::TooManyRedirects(url.to_string()))
    }
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Pick the body framing from the response head and stream it into serde.
///
/// Chunked, or no usable length, goes through the chunk decoder; otherwise
/// exactly the declared length is read.
fn decode_body<D: DeserializeOwned>(response: RawResponse) -> Result<D> {
    let sized = response.content_length().filter(|_| !response.is_chunked());
    if let Some(len) = sized {
        return decode_guarded(response.body.take(len));
    }

    let mut chunked = ChunkedReader::new(response.body);
    if chunked.peek()?.is_none() {
        return Err(AppError::MalformedResponse("empty chunked body".to_string()));
    }
    debug!(buffered = chunked.available(), "Decoding chunked body");
    decode_guarded(chunked)
}

fn decode_guarded<D: DeserializeOwned, R: Read>(body: R) -> Result<D> {
    let guarded = NestingGuard::new(body, JSON_NESTING_LIMIT);
    Ok(serde_json::from_reader(guarded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::transport::fake::{Reply, ScriptedTransport};
    use serde::Deserialize;

    const URL: &str = "https://api.test/v1/doc";

    #[derive(Debug, Deserialize, PartialEq)]
    struct Slim {
        gold: u32,
    }

    fn fetcher(transport: ScriptedTransport) -> DocumentFetcher<ScriptedTransport> {
        DocumentFetcher::new(transport, "secret".to_string())
    }

    #[test]
    fn decodes_chunked_body_through_allow_list() {
        let f = fetcher(ScriptedTransport::new().route(
            URL,
            Reply::chunked(r#"{"gold":4,"silver":2,"huge":{"nested":[1,2,3]}}"#),
        ));
        let doc: Slim = f.fetch_json(URL, Access::Public).unwrap();
        assert_eq!(doc, Slim { gold: 4 });
    }

    #[test]
    fn decodes_sized_body_directly() {
        let f = fetcher(ScriptedTransport::new().route(URL, Reply::sized(r#"{"gold":1}"#)));
        let doc: serde_json::Value = f.fetch_json(URL, Access::Public).unwrap();
        assert_eq!(doc["gold"], 1);
    }

    #[test]
    fn missing_length_is_treated_as_chunked() {
        let mut reply = Reply::chunked(r#"{"gold":9}"#);
        reply.headers.clear();
        let f = fetcher(ScriptedTransport::new().route(URL, reply));
        let doc: Slim = f.fetch_json(URL, Access::Public).unwrap();
        assert_eq!(doc.gold, 9);
    }

    #[test]
    fn chunked_header_wins_over_length() {
        let mut reply = Reply::chunked(r#"{"gold":5}"#);
        reply.headers.push(("Content-Length".to_string(), "3".to_string()));
        let f = fetcher(ScriptedTransport::new().route(URL, reply));
        let doc: Slim = f.fetch_json(URL, Access::Public).unwrap();
        assert_eq!(doc.gold, 5);
    }

    #[test]
    fn empty_chunked_body_is_malformed() {
        let f = fetcher(ScriptedTransport::new().route(URL, Reply::chunked("")));
        assert!(matches!(
            f.fetch_json::<Slim>(URL, Access::Public),
            Err(AppError::MalformedResponse(_))
        ));
    }

    #[test]
    fn non_200_is_an_error() {
        let f = fetcher(ScriptedTransport::new().route(URL, Reply::status(503)));
        let err = f.fetch_json::<Slim>(URL, Access::Public).unwrap_err();
        assert!(matches!(err, AppError::HttpStatus { status: 503, .. }));
    }

    #[test]
    fn parse_error_is_an_error() {
        let f = fetcher(ScriptedTransport::new().route(URL, Reply::sized(r#"{"gold":"#)));
        assert!(matches!(
            f.fetch_json::<Slim>(URL, Access::Public),
            Err(AppError::Json(_))
        ));
    }

    #[test]
    fn too_deep_document_is_rejected() {
        let deep = format!("{{\"gold\":1,\"x\":{}{}}}", "[".repeat(30), "]".repeat(30));
        let f = fetcher(ScriptedTransport::new().route(URL, Reply::chunked(&deep)));
        assert!(f.fetch_json::<Slim>(URL, Access::Public).is_err());
    }

    #[test]
    fn follows_relative_redirect() {
        let f = fetcher(
            ScriptedTransport::new()
                .route(URL, Reply::redirect("/v2/doc"))
                .route("https://api.test/v2/doc", Reply::sized(r#"{"gold":2}"#)),
        );
        let doc: Slim = f.fetch_json(URL, Access::Public).unwrap();
        assert_eq!(doc.gold, 2);
        assert_eq!(
            f.transport().requested_urls(),
            vec![URL.to_string(), "https://api.test/v2/doc".to_string()]
        );
    }

    #[test]
    fn redirect_loop_gives_up() {
        let f = fetcher(ScriptedTransport::new().route(URL, Reply::redirect(URL)));
        assert!(matches!(
            f.fetch_json::<Slim>(URL, Access::Public),
            Err(AppError::TooManyRedirects(_))
        ));
        assert_eq!(f.transport().requested_urls().len(), MAX_REDIRECTS + 1);
    }

    #[test]
    fn auth_header_only_when_authenticated() {
        let f = fetcher(ScriptedTransport::new().route(URL, Reply::sized(r#"{"gold":0}"#)));
        let _: Slim = f.fetch_json(URL, Access::Public).unwrap();
        let _: Slim = f.fetch_json(URL, Access::Authenticated).unwrap();

        let requests = f.transport().requests.lock().unwrap();
        let has_auth = |i: usize| {
            requests[i]
                .1
                .iter()
                .any(|(k, v)| k == MEDALS_AUTH_HEADER && v == "secret")
        };
        assert!(!has_auth(0));
        assert!(has_auth(1));
    }
}

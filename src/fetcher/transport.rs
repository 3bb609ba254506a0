use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::TlsConnector;
use tracing::debug;
use url::{Position, Url};

use crate::error::{AppError, Result};

/// Longest status or header line accepted from a server.
const MAX_HEAD_LINE: u64 = 8 * 1024;
const MAX_HEADERS: usize = 100;

/// Status line and headers of a response, with the body still on the wire.
///
/// `body` yields the body bytes exactly as sent: chunk framing, if any, is
/// left for the caller to decode.
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl RawResponse {
    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared `Content-Length`, `None` when absent or unparsable.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding").is_some_and(|v| {
            v.split(',').any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        })
    }
}

/// One blocking HTTP GET. Implementations must not follow redirects.
pub trait Transport {
    fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<RawResponse>;
}

/// HTTP/1.1 over TCP, with TLS for `https` URLs.
///
/// Certificate and hostname validation are off: the upstream chains are not
/// always complete and the device has no way to update a trust store.
pub struct TlsTransport {
    connector: TlsConnector,
    timeout: Duration,
}

impl TlsTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut builder = TlsConnector::builder();
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
        Ok(Self {
            connector: builder.build()?,
            timeout,
        })
    }

    fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| AppError::UnsupportedUrl(format!("{host}:{port} did not resolve")))?;
        let tcp = TcpStream::connect_timeout(&addr, self.timeout)?;
        tcp.set_read_timeout(Some(self.timeout))?;
        tcp.set_write_timeout(Some(self.timeout))?;
        Ok(tcp)
    }
}

impl Transport for TlsTransport {
    fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<RawResponse> {
        let host = url
            .host_str()
            .ok_or_else(|| AppError::UnsupportedUrl(url.to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| AppError::UnsupportedUrl(url.to_string()))?;
        let request = build_request(url, host, headers);

        debug!(url = %url, "HTTP GET");
        let tcp = self.connect(host, port)?;
        match url.scheme() {
            "https" => {
                let tls = self
                    .connector
                    .connect(host, tcp)
                    .map_err(|e| AppError::TlsHandshake(e.to_string()))?;
                exchange(tls, &request)
            }
            "http" => exchange(tcp, &request),
            other => Err(AppError::UnsupportedUrl(format!("scheme {other}"))),
        }
    }
}

fn build_request(url: &Url, host: &str, headers: &[(&str, &str)]) -> String {
    let target = &url[Position::BeforePath..Position::AfterQuery];
    let host_header = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut request = format!("GET {target} HTTP/1.1\r\nHost: {host_header}\r\n");
    for (name, value) in headers {
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    request
}

/// Send the request and read the response head, leaving the body unread.
fn exchange<S>(mut stream: S, request: &str) -> Result<RawResponse>
where
    S: Read + Write + Send + 'static,
{
    stream.write_all(request.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(stream);
    let (status, headers) = read_head(&mut reader)?;
    Ok(RawResponse {
        status,
        headers,
        body: Box::new(reader),
    })
}

/// Parse a status line and header block from `reader`.
pub fn read_head<R: BufRead>(reader: &mut R) -> Result<(u16, Vec<(String, String)>)> {
    let status_line = read_line(reader)?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| AppError::MalformedResponse(format!("status line {status_line:?}")))?;

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)?;
        if line.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(AppError::MalformedResponse("too many headers".to_string()));
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(AppError::MalformedResponse(format!("header line {line:?}")));
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok((status, headers))
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut raw = Vec::new();
    let n = reader.take(MAX_HEAD_LINE).read_until(b'\n', &mut raw)?;
    if n == 0 {
        return Err(AppError::MalformedResponse(
            "connection closed before headers ended".to_string(),
        ));
    }
    let line = String::from_utf8_lossy(&raw);
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, VecDeque};
    use std::io::Cursor;
    use std::sync::Mutex;

    use super::*;
    use crate::fetcher::chunked::tests::encode_chunked;

    /// A canned response. `body` is sent exactly as given.
    #[derive(Clone)]
    pub(crate) struct Reply {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl Reply {
        pub fn chunked(json: &str) -> Self {
            Self {
                status: 200,
                headers: vec![("Transfer-Encoding".to_string(), "chunked".to_string())],
                body: encode_chunked(json.as_bytes(), &[7, 3, 64], true),
            }
        }

        pub fn sized(json: &str) -> Self {
            Self {
                status: 200,
                headers: vec![("Content-Length".to_string(), json.len().to_string())],
                body: json.as_bytes().to_vec(),
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                headers: Vec::new(),
                body: Vec::new(),
            }
        }

        pub fn redirect(location: &str) -> Self {
            Self {
                status: 302,
                headers: vec![("Location".to_string(), location.to_string())],
                body: Vec::new(),
            }
        }
    }

    /// Replays scripted replies per URL. The last reply for a URL repeats;
    /// unknown URLs fail like a refused connection.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        routes: Mutex<HashMap<String, VecDeque<Reply>>>,
        pub requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(self, url: &str, reply: Reply) -> Self {
            self.routes
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        pub fn set_route(&self, url: &str, reply: Reply) {
            self.routes
                .lock()
                .unwrap()
                .insert(url.to_string(), VecDeque::from([reply]));
        }

        pub fn requested_urls(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<RawResponse> {
            self.requests.lock().unwrap().push((
                url.to_string(),
                headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ));

            let mut routes = self.routes.lock().unwrap();
            let Some(queue) = routes.get_mut(url.as_str()) else {
                return Err(AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("no route for {url}"),
                )));
            };
            let reply = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            };
            Ok(RawResponse {
                status: reply.status,
                headers: reply.headers,
                body: Box::new(Cursor::new(reply.body)),
            })
        }
    }
}

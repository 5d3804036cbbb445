//! Blocking HTTP client for checking a running server.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use objcentric_core::{PredictRequest, PredictResponse};
use reqwest::StatusCode;
use url::Url;

pub const DOCS_PATH: &str = "docs";
pub const PREDICT_PATH: &str = "predict";

/// Side of the synthetic test image.
pub const TEST_IMAGE_SIZE: u32 = 224;

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("Invalid server URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Failed to build the HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("Request to {url} failed: {source}")]
    Request { url: Url, source: reqwest::Error },
    #[error("{url} answered {status}: {body}")]
    Status {
        url: Url,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read image {}: {source}", .path.display())]
    ReadImage {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode the test image: {0}")]
    EncodeImage(#[from] image::ImageError),
    #[error("Inconsistent response from {url}: {reason}")]
    InvalidResponse { url: Url, reason: String },
}

trait ResponseExt {
    fn require_success(self, url: &Url) -> Result<reqwest::blocking::Response, ProbeError>;
}

impl ResponseExt for reqwest::blocking::Response {
    fn require_success(self, url: &Url) -> Result<reqwest::blocking::Response, ProbeError> {
        let status = self.status();
        if status.is_success() {
            Ok(self)
        } else {
            Err(ProbeError::Status {
                url: url.clone(),
                status,
                body: self.text().unwrap_or_default(),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeClient {
    http_client: reqwest::blocking::Client,
    base_url: Url,
}

impl ProbeClient {
    /// Every request made through this client gives up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProbeError> {
        // A trailing slash keeps `join` from replacing the last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|source| ProbeError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProbeError::Client)?;
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ProbeError> {
        self.base_url
            .join(path)
            .map_err(|source| ProbeError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                source,
            })
    }

    /// GET the documentation page; any non-success status is an error.
    pub fn health(&self) -> Result<StatusCode, ProbeError> {
        let url = self.url(DOCS_PATH)?;
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .map_err(|source| ProbeError::Request {
                url: url.clone(),
                source,
            })?
            .require_success(&url)?;
        Ok(response.status())
    }

    pub fn predict(&self, image_base64: String) -> Result<PredictResponse, ProbeError> {
        let url = self.url(PREDICT_PATH)?;
        let request_err = |source| ProbeError::Request {
            url: url.clone(),
            source,
        };
        let response: PredictResponse = self
            .http_client
            .post(url.clone())
            .json(&PredictRequest { image_base64 })
            .send()
            .map_err(request_err)?
            .require_success(&url)?
            .json()
            .map_err(request_err)?;

        if response.matched_kernel_ids.len() != response.matched_scores.len() {
            return Err(ProbeError::InvalidResponse {
                url,
                reason: format!(
                    "{} kernel ids but {} scores",
                    response.matched_kernel_ids.len(),
                    response.matched_scores.len()
                ),
            });
        }
        Ok(response)
    }
}

/// Red square with a blue rectangle in the middle.
pub fn synthetic_image() -> DynamicImage {
    let mut image = RgbImage::from_pixel(TEST_IMAGE_SIZE, TEST_IMAGE_SIZE, Rgb([255, 0, 0]));
    for x in 50..174 {
        for y in 50..174 {
            image.put_pixel(x, y, Rgb([0, 0, 255]));
        }
    }
    DynamicImage::ImageRgb8(image)
}

pub fn png_base64(image: &DynamicImage) -> Result<String, ProbeError> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes.into_inner()))
}

/// Base64 of the raw file; the server sniffs the format.
pub fn file_base64(path: &Path) -> Result<String, ProbeError> {
    let bytes = std::fs::read(path).map_err(|source| ProbeError::ReadImage {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned HTTP response per accepted connection.
    fn serve(responses: Vec<String>) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap();
                    }
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                }
                let mut body = vec![0; content_length];
                std::io::Read::read_exact(&mut reader, &mut body).unwrap();
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        (url, handle)
    }

    fn http_response(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn base_url_keeps_its_path() {
        let client = ProbeClient::new("http://example.com/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url(DOCS_PATH).unwrap().as_str(),
            "http://example.com/api/docs"
        );
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            ProbeClient::new("not a url", Duration::from_secs(1)),
            Err(ProbeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn healthy_docs_page_passes() {
        let (url, server) = serve(vec![http_response("200 OK", "text/html", "<html></html>")]);
        let client = ProbeClient::new(&url, Duration::from_secs(5)).unwrap();
        assert_eq!(client.health().unwrap(), StatusCode::OK);
        server.join().unwrap();
    }

    #[test]
    fn server_error_fails_the_health_check() {
        let (url, server) = serve(vec![http_response(
            "500 Internal Server Error",
            "text/plain",
            "boom",
        )]);
        let client = ProbeClient::new(&url, Duration::from_secs(5)).unwrap();
        match client.health() {
            Err(ProbeError::Status { status, body, .. }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected result {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn predict_decodes_the_response() {
        let body = r#"{"num_kernels":1,"matched_kernel_ids":["67e55044-10b1-426f-9247-bb680e5fe0c8"],"matched_scores":[1.0]}"#;
        let (url, server) = serve(vec![http_response("200 OK", "application/json", body)]);
        let client = ProbeClient::new(&url, Duration::from_secs(5)).unwrap();

        let response = client.predict(png_base64(&synthetic_image()).unwrap()).unwrap();
        assert_eq!(response.num_kernels, 1);
        assert_eq!(response.matched_scores, vec![1.0]);
        server.join().unwrap();
    }

    #[test]
    fn misaligned_predict_response_is_rejected() {
        let body = r#"{"num_kernels":1,"matched_kernel_ids":[],"matched_scores":[0.5]}"#;
        let (url, server) = serve(vec![http_response("200 OK", "application/json", body)]);
        let client = ProbeClient::new(&url, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            client.predict("aGVsbG8=".into()),
            Err(ProbeError::InvalidResponse { .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn synthetic_image_has_a_blue_centre() {
        let image = synthetic_image().to_rgb8();
        assert_eq!(image.dimensions(), (TEST_IMAGE_SIZE, TEST_IMAGE_SIZE));
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(112, 112), &Rgb([0, 0, 255]));
    }

    #[test]
    fn missing_image_file_is_reported() {
        assert!(matches!(
            file_base64(Path::new("/nonexistent/image.png")),
            Err(ProbeError::ReadImage { .. })
        ));
    }
}

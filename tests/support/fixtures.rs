//! Manifest builders, image bytes, converters and misbehaving servers.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use evidencias_core::normalize::{FormatConverter, NormalizeError, write_canonical_jpeg};
use evidencias_core::{Normalizer, PipelineConfig};
use image::{DynamicImage, ImageFormat, RgbImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::{Request, Respond, ResponseTemplate};

use super::socket_guard::should_skip_socket_bound_test;

/// Header row with every recognized column, `;`-delimited.
pub const HEADER: &str =
    "Código del grupo;Sesión;Archivo asistencia;Archivo foto inicial;Archivo foto final";

/// Writes a `;`-delimited manifest with [`HEADER`] and the given rows.
pub fn write_manifest(dir: &Path, name: &str, rows: &[[&str; 5]]) -> PathBuf {
    let mut text = String::from(HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(";"));
        text.push('\n');
    }
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write manifest");
    path
}

/// A small PNG image.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 4, image::Rgb([200, 30, 30])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

/// Stands in for libheif: decodes whatever the `image` crate can sniff.
#[derive(Debug)]
pub struct SniffingHeicConverter;

impl FormatConverter for SniffingHeicConverter {
    fn name(&self) -> &'static str {
        "heic-test"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["heic", "heif"]
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), NormalizeError> {
        let image = image::ImageReader::open(source)
            .map_err(|e| NormalizeError::io(source, e))?
            .with_guessed_format()
            .map_err(|e| NormalizeError::io(source, e))?
            .decode()
            .map_err(|e| NormalizeError::decode(source, e.to_string()))?;
        write_canonical_jpeg(&image, target)
    }
}

/// Normalizer whose HEIC converter works without libheif.
pub fn test_normalizer(enabled: bool) -> Normalizer {
    Normalizer::with_converters(enabled, vec![Arc::new(SniffingHeicConverter)])
}

/// Pipeline settings with millisecond backoff.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        workers: 4,
        max_retries: 3,
        backoff_base: Duration::from_millis(5),
        request_timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    }
}

/// Answers with the given statuses in order, then 200 with `body` forever.
pub struct StatusSequence {
    statuses: Vec<u16>,
    body: Vec<u8>,
    calls: Arc<AtomicUsize>,
}

impl StatusSequence {
    pub fn new(statuses: Vec<u16>, body: &[u8]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let responder = Self {
            statuses,
            body: body.to_vec(),
            calls: Arc::clone(&calls),
        };
        (responder, calls)
    }
}

impl Respond for StatusSequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.statuses.get(n) {
            Some(&status) => ResponseTemplate::new(status),
            None => ResponseTemplate::new(200).set_body_bytes(self.body.clone()),
        }
    }
}

/// Starts a raw HTTP server that promises `declared` bytes but sends only
/// `sent` before closing the connection. Returns the file URL, or `None`
/// when localhost sockets are unavailable.
pub async fn serve_truncated_body(declared: usize, sent: &'static [u8]) -> Option<String> {
    if should_skip_socket_bound_test() {
        return None;
    }
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {declared}\r\n\r\n"
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(sent).await;
                let _ = socket.flush().await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Some(format!("http://{addr}/cortado.jpg"))
}

//! Upload service tests driven through the router.

mod support;

use std::io::Read;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use evidencias_core::server::create_router_with_normalizer;
use evidencias_core::{ServiceConfig, create_router};
use support::fixtures::{HEADER, fast_config, png_bytes, test_normalizer};
use support::socket_guard::start_mock_server_or_skip;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const BOUNDARY: &str = "evidencias-test-boundary";

fn upload(uri: &str, files: &[(&str, String)]) -> Request<Body> {
    let mut body = String::new();
    for (name, content) in files {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        body.push_str(&format!(
            "Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n"
        ));
        body.push_str("Content-Type: text/csv\r\n\r\n");
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn service_config() -> ServiceConfig {
    ServiceConfig {
        pipeline: fast_config(),
        conversion_enabled: true,
        ..ServiceConfig::default()
    }
}

#[tokio::test]
async fn test_process_returns_zip_of_result_tree() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/lista.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inicio.heic"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
        .mount(&mock_server)
        .await;

    let base = mock_server.uri();
    let manifest = format!("{HEADER}\nGrupo A;Sesión 1;{base}/lista.pdf;{base}/inicio.heic;\n");
    let app = create_router_with_normalizer(&service_config(), test_normalizer(true));

    let response = app
        .oneshot(upload("/process", &[("curso 1.csv", manifest)]))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).expect("zip");
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        [
            "curso 1/Grupo A/Sesion_1_asistencia.pdf",
            "curso 1/Grupo A/Sesion_1_foto_inicial.jpg",
        ]
    );

    let mut pdf = Vec::new();
    zip.by_name("curso 1/Grupo A/Sesion_1_asistencia.pdf")
        .expect("entry")
        .read_to_end(&mut pdf)
        .expect("read");
    assert_eq!(pdf, b"%PDF-1.4");
}

#[tokio::test]
async fn test_process_without_files_is_bad_request() {
    let app = create_router(&service_config());

    let response = app
        .oneshot(upload("/process-folder", &[]))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(json["error"], "no files were uploaded");
}

#[tokio::test]
async fn test_health_reports_ready() {
    let app = create_router(&service_config());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

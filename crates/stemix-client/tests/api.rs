//! Client behavior against a scripted local HTTP server.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stemix_client::{ApiClient, ClientConfig, HttpStemSource, StemMode};
use stemix_core::{Error, HttpError, JobStatus, StemSource};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One canned response per path; repeated paths pop responses in order and
/// keep serving the last one.
#[derive(Default)]
struct Script {
    routes: HashMap<String, Vec<(u16, &'static str, String)>>,
    requests: Vec<String>,
}

async fn serve(script: Script) -> (String, Arc<Mutex<Script>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let script = Arc::new(Mutex::new(script));
    let shared = Arc::clone(&script);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let script = Arc::clone(&shared);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let header_end = buf.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
                let content_length = String::from_utf8_lossy(&buf[..header_end])
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                while buf.len() < header_end + content_length {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request = String::from_utf8_lossy(&buf).to_string();
                let target = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let path = target.split('?').next().unwrap_or("/").to_string();

                let (status, content_type, body) = {
                    let mut script = script.lock().unwrap();
                    script.requests.push(request);
                    match script.routes.get_mut(&path) {
                        Some(responses) if responses.len() > 1 => responses.remove(0),
                        Some(responses) => responses[0].clone(),
                        None => (404, "text/plain", "not found".to_string()),
                    }
                };
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            });
        }
    });

    (format!("http://{addr}/api/v1"), script)
}

fn route(script: &mut Script, path: &str, status: u16, content_type: &'static str, body: &str) {
    script
        .routes
        .entry(path.to_string())
        .or_default()
        .push((status, content_type, body.to_string()));
}

#[tokio::test]
async fn test_job_status_sends_credentials() {
    let mut script = Script::default();
    route(
        &mut script,
        "/api/v1/jobs/j1",
        200,
        "application/json",
        r#"{"job_id":"j1","status":"separating","filename":"song.mp3"}"#,
    );
    let (base, script) = serve(script).await;

    let client =
        ApiClient::with_config(ClientConfig::new(base).with_token("tok").with_api_key("k")).unwrap();
    let status = client.job_status("j1").await.unwrap();
    assert_eq!(status.status, JobStatus::Separating);
    assert_eq!(status.filename.as_deref(), Some("song.mp3"));

    let request = script.lock().unwrap().requests[0].to_lowercase();
    assert!(request.contains("authorization: bearer tok"));
    assert!(request.contains("x-api-key: k"));
}

#[tokio::test]
async fn test_wait_for_result_polls_until_complete() {
    let mut script = Script::default();
    for status in ["pending", "separating", "completed"] {
        route(
            &mut script,
            "/api/v1/jobs/j2",
            200,
            "application/json",
            &format!(r#"{{"job_id":"j2","status":"{status}"}}"#),
        );
    }
    route(
        &mut script,
        "/api/v1/jobs/j2/result",
        200,
        "application/json",
        r#"{"job_id":"j2","status":"completed","stems":{"vocals":"/api/v1/jobs/j2/stems/vocals.wav","piano":""},"metadata":{"title":"Song"}}"#,
    );
    let (base, _script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base)).unwrap();
    let result = client
        .wait_for_result_every("j2", Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(result.stems.len(), 1);
    assert_eq!(result.metadata.title.as_deref(), Some("Song"));
}

#[tokio::test]
async fn test_failed_job() {
    let mut script = Script::default();
    route(
        &mut script,
        "/api/v1/jobs/j3",
        200,
        "application/json",
        r#"{"job_id":"j3","status":"failed","error":"model crashed"}"#,
    );
    let (base, _script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base)).unwrap();
    let err = client
        .wait_for_result_every("j3", Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::JobFailed(ref m) if m == "model crashed"));
}

#[tokio::test]
async fn test_library_query_and_shape() {
    let mut script = Script::default();
    route(
        &mut script,
        "/api/v1/library",
        200,
        "application/json",
        r#"{"items":[{"job_id":"a","status":"completed"},{"job_id":"b","status":"paused"}],"total":2}"#,
    );
    let (base, script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base)).unwrap();
    let jobs = client.library(20, 40).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].status, JobStatus::Paused);

    let request = script.lock().unwrap().requests[0].clone();
    assert!(request.contains("limit=20"));
    assert!(request.contains("offset=40"));
}

#[tokio::test]
async fn test_status_error_is_not_retried() {
    let mut script = Script::default();
    route(&mut script, "/api/v1/jobs/j4", 403, "text/plain", "forbidden");
    let (base, script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base)).unwrap();
    let err = client.job_status("j4").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Http(HttpError::StatusError { status: 403, ref message }) if message == "forbidden"
    ));
    assert_eq!(script.lock().unwrap().requests.len(), 1);
}

#[tokio::test]
async fn test_stem_source_strips_api_prefix() {
    let mut script = Script::default();
    route(&mut script, "/api/v1/jobs/j5/stems/vocals.wav", 200, "audio/wav", "RIFF");
    let (base, script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base).with_token("tok")).unwrap();
    let source = HttpStemSource::new(client);
    let payload = source.fetch("/api/v1/jobs/j5/stems/vocals.wav").await.unwrap();
    assert_eq!(&payload.data[..], b"RIFF");
    assert_eq!(payload.mime_type.as_deref(), Some("audio/wav"));

    let request = script.lock().unwrap().requests[0].clone();
    assert!(request.starts_with("GET /api/v1/jobs/j5/stems/vocals.wav "));
}

#[tokio::test]
async fn test_absolute_stem_urls_skip_credentials() {
    let mut script = Script::default();
    route(&mut script, "/public/drums.wav", 200, "audio/wav", "RIFF");
    let (base, script) = serve(script).await;
    let origin = base.trim_end_matches("/api/v1").to_string();

    let client = ApiClient::with_config(ClientConfig::new(base).with_token("tok")).unwrap();
    let payload = HttpStemSource::new(client)
        .fetch(&format!("{origin}/public/drums.wav"))
        .await
        .unwrap();
    assert_eq!(payload.data.len(), 4);

    let request = script.lock().unwrap().requests[0].to_lowercase();
    assert!(!request.contains("authorization"));
}

#[tokio::test]
async fn test_upload_sends_multipart_form() {
    let mut script = Script::default();
    route(
        &mut script,
        "/api/v1/process",
        200,
        "application/json",
        r#"{"job_id":"new","status":"pending","message":"queued"}"#,
    );
    let (base, script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base).with_token("tok")).unwrap();
    let job = client
        .upload_audio("song.mp3", b"ID3 fake audio".to_vec(), StemMode::default())
        .await
        .unwrap();
    assert_eq!(job.job_id, "new");
    assert_eq!(job.status, JobStatus::Pending);

    let request = script.lock().unwrap().requests[0].clone();
    assert!(request.starts_with("POST /api/v1/process "));
    assert!(request.to_lowercase().contains("content-type: multipart/form-data"));
    assert!(request.contains("filename=\"song.mp3\""));
    assert!(request.contains("ID3 fake audio"));
    assert!(request.contains("name=\"stem_mode\""));
    assert!(request.contains("htdemucs_6s"));
}

#[tokio::test]
async fn test_job_control_methods() {
    let mut script = Script::default();
    route(&mut script, "/api/v1/jobs/j6/pause", 204, "text/plain", "");
    route(&mut script, "/api/v1/jobs/j6/resume", 204, "text/plain", "");
    route(&mut script, "/api/v1/jobs/j6", 204, "text/plain", "");
    let (base, script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base).with_api_key("k")).unwrap();
    client.pause_job("j6").await.unwrap();
    client.resume_job("j6").await.unwrap();
    client.delete_job("j6").await.unwrap();

    let requests = script.lock().unwrap().requests.clone();
    assert!(requests[0].starts_with("PATCH /api/v1/jobs/j6/pause "));
    assert!(requests[1].starts_with("PATCH /api/v1/jobs/j6/resume "));
    assert!(requests[2].starts_with("DELETE /api/v1/jobs/j6 "));
    assert!(requests.iter().all(|r| r.to_lowercase().contains("x-api-key: k")));
}

#[tokio::test]
async fn test_failed_job_control_is_not_retried() {
    let mut script = Script::default();
    route(&mut script, "/api/v1/jobs/j7", 503, "text/plain", "busy");
    let (base, script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base)).unwrap();
    let err = client.delete_job("j7").await.unwrap_err();
    assert!(matches!(err, Error::Http(HttpError::StatusError { status: 503, .. })));
    assert_eq!(script.lock().unwrap().requests.len(), 1);
}

#[tokio::test]
async fn test_export_returns_archive() {
    let mut script = Script::default();
    route(&mut script, "/api/v1/jobs/j8/export", 200, "application/zip", "PK\u{3}\u{4}");
    let (base, _script) = serve(script).await;

    let client = ApiClient::with_config(ClientConfig::new(base)).unwrap();
    let archive = client.export_stems("j8").await.unwrap();
    assert_eq!(&archive[..2], b"PK");
}

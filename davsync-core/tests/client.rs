use davsync_core::DavClient;
use reqwest::StatusCode;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn delete_hits_percent_escaped_path() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/Docs/Hello%20World.txt"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = DavClient::with_base_url(&server.uri()).unwrap();
    let status = client.delete("Docs/Hello World.txt").await.unwrap();

    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn mkcol_reports_already_exists_status() {
    let server = MockServer::start().await;
    Mock::given(method("MKCOL"))
        .and(path("/Docs"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let client = DavClient::with_base_url(&server.uri()).unwrap();
    let status = client.mkcol("Docs").await.unwrap();

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn move_sends_destination_and_overwrite() {
    let server = MockServer::start().await;
    let destination = format!("{}/Docs/B.txt", server.uri());
    Mock::given(method("MOVE"))
        .and(path("/Docs/A.txt"))
        .and(header("destination", destination.as_str()))
        .and(header("overwrite", "T"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let client = DavClient::with_base_url(&server.uri()).unwrap();
    let status = client.move_to("Docs/A.txt", "Docs/B.txt").await.unwrap();

    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn proppatch_sets_dav_lastmodified() {
    let server = MockServer::start().await;
    Mock::given(method("PROPPATCH"))
        .and(path("/Docs/A.txt"))
        .and(body_string_contains("<D:lastmodified>1700000000</D:lastmodified>"))
        .respond_with(ResponseTemplate::new(207))
        .mount(&server)
        .await;

    let client = DavClient::with_base_url(&server.uri()).unwrap();
    let status = client.proppatch_mtime("Docs/A.txt", 1_700_000_000).await.unwrap();

    assert_eq!(status, StatusCode::MULTI_STATUS);
}

#[tokio::test]
async fn head_strips_etag_quotes_and_reads_file_id() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/Docs/A.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"5afabc\"")
                .insert_header("OC-FileId", "00001234oc"),
        )
        .mount(&server)
        .await;

    let client = DavClient::with_base_url(&server.uri()).unwrap();
    let meta = client.head("Docs/A.txt").await.unwrap();

    assert_eq!(meta.status, StatusCode::OK);
    assert_eq!(meta.etag.as_deref(), Some("5afabc"));
    assert_eq!(meta.file_id.as_deref(), Some("00001234oc"));
}

#[tokio::test]
async fn get_requests_gzip_and_range_for_resume() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Docs/A.txt"))
        .and(header("accept-encoding", "gzip"))
        .and(header("range", "bytes=1024-"))
        .and(header("accept-ranges", "bytes"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"tail"))
        .mount(&server)
        .await;

    let client = DavClient::with_base_url(&server.uri()).unwrap();
    let response = client.get("Docs/A.txt", Some(1024)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"tail");
}

#[tokio::test]
async fn put_chunk_uses_chunk_url_and_upload_headers() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/a.bin-chunking-42-3-10"))
        .and(header("oc-chunked", "1"))
        .and(header("x-oc-mtime", "1700000000"))
        .and(header("if-match", "\"oldetag\""))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("etag", "\"newetag\"")
                .insert_header("OC-FileId", "fid9")
                .insert_header("X-OC-Mtime", "accepted"),
        )
        .mount(&server)
        .await;

    let client = DavClient::with_base_url(&server.uri()).unwrap();
    let outcome = client
        .put_chunk("a.bin", 42, 3, 10, b"data".to_vec(), Some("oldetag"), 1_700_000_000)
        .await
        .unwrap();

    assert_eq!(outcome.status, StatusCode::CREATED);
    assert_eq!(outcome.etag.as_deref(), Some("newetag"));
    assert_eq!(outcome.file_id.as_deref(), Some("fid9"));
    assert!(outcome.mtime_accepted);
}

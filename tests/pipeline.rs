use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use github_corpus::{
    Anonymous, ArchiveFilter, CorpusDownloader, CorpusError, CorpusIndex, GitHubSearcher,
    ReqwestTransport, RepositoryReference, SearchOptions, SearchQueryBuilder, SearcherState,
    SourceLanguage, StaticToken, TreeSitterValidator,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn queries(server: &MockServer) -> SearchQueryBuilder {
    SearchQueryBuilder::new(
        format!("{}/search/repositories", server.uri()),
        server.uri(),
    )
}

fn transport() -> Arc<ReqwestTransport> {
    Arc::new(ReqwestTransport::new().unwrap())
}

fn python_downloader(server: &MockServer) -> CorpusDownloader {
    CorpusDownloader::new(
        transport(),
        Arc::new(Anonymous),
        ArchiveFilter::zip(TreeSitterValidator::new(SourceLanguage::Python)),
    )
    .with_queries(queries(server))
}

fn search_body(items: &[(&str, &str, Option<&str>)]) -> String {
    let items: Vec<_> = items
        .iter()
        .map(|(owner, name, branch)| {
            let mut item = serde_json::json!({
                "name": name,
                "full_name": format!("{}/{}", owner, name),
                "owner": { "login": owner },
            });
            if let Some(branch) = branch {
                item["default_branch"] = serde_json::json!(branch);
            }
            item
        })
        .collect();
    serde_json::json!({ "total_count": items.len(), "items": items }).to_string()
}

fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

async fn mount_search_page(server: &MockServer, page: &str, body: String, link: Option<String>) {
    let mut response = ResponseTemplate::new(200).set_body_raw(body, "application/json");
    if let Some(link) = link {
        response = response.insert_header("Link", link.as_str());
    }
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", page))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_archive(server: &MockServer, archive_path: &str, body: Vec<u8>, mime: &str) {
    Mock::given(method("GET"))
        .and(path(archive_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, mime))
        .mount(server)
        .await;
}

fn read_index(root: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(root.join("index.json")).unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collects_pages_in_api_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "language:java"))
        .and(query_param("sort", "stars"))
        .and(query_param("page", "1"))
        .and(header("Accept", "application/vnd.github.v3+json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(search_body(&[("herp", "derp", None)]), "application/json")
                .insert_header("X-RateLimit-Remaining", "59")
                .insert_header(
                    "Link",
                    format!(
                        r#"<{}/search/repositories?page=2>; rel="next", <{}/search/repositories?page=2>; rel="last""#,
                        server.uri(),
                        server.uri()
                    )
                    .as_str(),
                ),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_search_page(
        &server,
        "2",
        search_body(&[("foo", "bar", None)]),
        Some(format!(
            r#"<{}/search/repositories?page=1>; rel="first""#,
            server.uri()
        )),
    )
    .await;

    let mut searcher = GitHubSearcher::new(
        transport(),
        Arc::new(Anonymous),
        &queries(&server),
        "java",
        SearchOptions::default(),
    )
    .unwrap();

    let repos = searcher.collect(100).await.unwrap();

    assert_eq!(
        repos,
        vec![
            RepositoryReference::new("herp", "derp", None),
            RepositoryReference::new("foo", "bar", None),
        ]
    );
    assert_eq!(searcher.state(), SearcherState::Exhausted);
}

#[tokio::test]
async fn rate_limited_search_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_raw(r#"{"message":"API rate limit exceeded"}"#, "application/json")
                .insert_header("X-RateLimit-Remaining", "0"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut searcher = GitHubSearcher::new(
        transport(),
        Arc::new(Anonymous),
        &queries(&server),
        "java",
        SearchOptions::default(),
    )
    .unwrap();

    assert!(searcher.collect(100).await.unwrap().is_empty());
    assert_eq!(searcher.state(), SearcherState::Exhausted);
}

#[tokio::test]
async fn token_is_sent_as_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(header("Authorization", "token s3cret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(search_body(&[("a", "b", None)]), "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut searcher = GitHubSearcher::new(
        transport(),
        Arc::new(StaticToken("s3cret".into())),
        &queries(&server),
        "python",
        SearchOptions::default(),
    )
    .unwrap();

    assert_eq!(searcher.collect(10).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

#[tokio::test]
async fn downloads_only_valid_files() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_search_page(
        &server,
        "1",
        search_body(&[
            ("herp", "derp", None),
            ("foo", "bar", Some("main")),
            ("baz", "qux", None),
        ]),
        None,
    )
    .await;
    mount_archive(
        &server,
        "/herp/derp/archive/master.zip",
        zip_bytes(&[
            ("derp-master/dev.py", b"import sys\n\nprint(sys.argv)\n"),
            (
                "derp-master/README.rst",
                b"derp\n====\n\nInstall with `pip install derp`.\n",
            ),
            ("derp-master/broken.py", b"def broken(:\n"),
            ("derp-master/pkg/core.py", b"class Core:\n    pass\n"),
        ]),
        "application/zip",
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/foo/bar/archive/main.zip"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_archive(
        &server,
        "/baz/qux/archive/master.zip",
        b"<html>moved</html>".to_vec(),
        "text/html",
    )
    .await;

    let report = python_downloader(&server)
        .download_corpus("python", root.path(), 10)
        .await
        .unwrap();

    assert_eq!(report.indexed, 3);
    assert_eq!(report.extracted, 1);
    assert_eq!(report.files_written, 2);
    let failed: Vec<_> = report
        .failures
        .iter()
        .map(|f| f.repository.full_name())
        .collect();
    assert_eq!(failed, vec!["foo/bar", "baz/qux"]);

    let repo_dir = root.path().join("herp").join("derp");
    assert_eq!(
        std::fs::read(repo_dir.join("dev.py")).unwrap(),
        b"import sys\n\nprint(sys.argv)\n"
    );
    assert!(repo_dir.join("pkg").join("core.py").is_file());
    assert!(!repo_dir.join("README.rst").exists());
    assert!(!repo_dir.join("broken.py").exists());
    assert!(!repo_dir.join("derp-master").exists());
    assert!(root.path().join("foo").join("bar").is_dir());

    assert_eq!(
        read_index(root.path()),
        serde_json::json!([
            {"owner": "herp", "name": "derp", "default_branch": "master"},
            {"owner": "foo", "name": "bar", "default_branch": "main"},
            {"owner": "baz", "name": "qux", "default_branch": "master"},
        ])
    );
    assert_eq!(
        CorpusIndex::load(root.path()).await.unwrap().len(),
        report.indexed
    );
}

#[tokio::test]
async fn quantity_caps_the_index() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_search_page(
        &server,
        "1",
        search_body(&[("a", "one", None), ("b", "two", None), ("c", "three", None)]),
        Some(format!(
            r#"<{}/search/repositories?page=2>; rel="next""#,
            server.uri()
        )),
    )
    .await;
    mount_archive(
        &server,
        "/a/one/archive/master.zip",
        zip_bytes(&[("one-master/a.py", b"a = 1\n")]),
        "application/zip",
    )
    .await;
    mount_archive(
        &server,
        "/b/two/archive/master.zip",
        zip_bytes(&[("two-master/b.py", b"b = 2\n")]),
        "application/zip",
    )
    .await;

    let report = python_downloader(&server)
        .download_corpus("python", root.path(), 2)
        .await
        .unwrap();

    assert_eq!(report.indexed, 2);
    assert_eq!(report.files_written, 2);
    assert!(report.failures.is_empty());
    assert!(!root.path().join("c").exists());
}

#[tokio::test]
async fn rerun_over_existing_corpus() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(search_body(&[("herp", "derp", None)]), "application/json"),
        )
        .mount(&server)
        .await;
    mount_archive(
        &server,
        "/herp/derp/archive/master.zip",
        zip_bytes(&[("derp-master/src/app.py", b"app = object()\n")]),
        "application/zip",
    )
    .await;

    let downloader = python_downloader(&server);
    let first = downloader
        .download_corpus("python", root.path(), 5)
        .await
        .unwrap();
    let second = downloader
        .download_corpus("python", root.path(), 5)
        .await
        .unwrap();

    assert_eq!(first.files_written, 1);
    assert_eq!(second.files_written, 1);
    let entries: Vec<_> = std::fs::read_dir(root.path().join("herp/derp/src"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec!["app.py"]);
}

#[tokio::test]
async fn rate_limited_run_writes_empty_index() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(403).insert_header("X-RateLimit-Remaining", "0"))
        .mount(&server)
        .await;

    let report = python_downloader(&server)
        .download_corpus("python", root.path(), 10)
        .await
        .unwrap();

    assert_eq!(report.indexed, 0);
    assert_eq!(read_index(root.path()), serde_json::json!([]));
}

#[tokio::test]
async fn unusable_root_is_fatal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"").unwrap();

    let result = python_downloader(&server)
        .download_corpus("python", &blocker.join("corpus"), 10)
        .await;

    assert!(matches!(result, Err(CorpusError::Io { .. })));
}

#[tokio::test]
async fn unwritable_index_is_fatal() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("index.json")).unwrap();

    mount_search_page(&server, "1", search_body(&[("herp", "derp", None)]), None).await;
    Mock::given(method("GET"))
        .and(path("/herp/derp/archive/master.zip"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = python_downloader(&server)
        .download_corpus("python", root.path(), 10)
        .await;

    match result {
        Err(CorpusError::Io { path, .. }) => assert_eq!(path, root.path().join("index.json")),
        other => panic!("expected Io error, got {:?}", other),
    }
    assert!(!root.path().join("herp").exists());
}

#[tokio::test]
async fn malformed_link_header_aborts_run() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_search_page(
        &server,
        "1",
        search_body(&[("herp", "derp", None)]),
        Some(format!(
            r#"{}/search/repositories?page=2; rel="next""#,
            server.uri()
        )),
    )
    .await;

    let result = python_downloader(&server)
        .download_corpus("python", root.path(), 10)
        .await;

    assert!(matches!(result, Err(CorpusError::MalformedHeader { .. })));
    assert!(!root.path().join("index.json").exists());
    assert!(!root.path().join("herp").exists());
}

#[tokio::test]
async fn archive_requests_send_accept_header() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    mount_search_page(&server, "1", search_body(&[("herp", "derp", None)]), None).await;
    Mock::given(method("GET"))
        .and(path("/herp/derp/archive/master.zip"))
        .and(header("Accept", "application/vnd.github.v3+json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                zip_bytes(&[("derp-master/a.py", b"a = 1\n")]),
                "application/zip",
            ),
        )
        .expect(1)
        .mount(&server)
        .await;

    let report = python_downloader(&server)
        .download_corpus("python", root.path(), 10)
        .await
        .unwrap();

    assert_eq!(report.extracted, 1);
    assert!(report.failures.is_empty());
}

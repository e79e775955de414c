//! End-to-end chart synchronization against a mock HTTP repository

use flate2::Compression;
use flate2::write::GzEncoder;
use helmet_core::digest_dir;
use helmet_repo::{ChartManifest, ChartSynchronizer, ChartUpdateOutcome, RepoError};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chart_tgz(name: &str, version: &str) -> Vec<u8> {
    let files = [
        (
            format!("{}/Chart.yaml", name),
            format!("apiVersion: v2\nname: {}\nversion: {}\n", name, version),
        ),
        (format!("{}/values.yaml", name), "replicas: 1\n".to_string()),
        (
            format!("{}/templates/deployment.yaml", name),
            "kind: Deployment\n".to_string(),
        ),
    ];

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in &files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn chart_zip(top: &str, subpath: &str, name: &str, version: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer
        .start_file(format!("{}/README.md", top), options)
        .unwrap();
    writer.write_all(b"readme").unwrap();
    writer
        .start_file(format!("{}/{}/Chart.yaml", top, subpath), options)
        .unwrap();
    writer
        .write_all(format!("name: {}\nversion: {}\n", name, version).as_bytes())
        .unwrap();
    writer.finish().unwrap().into_inner()
}

const INDEX: &str = r#"
apiVersion: v1
entries:
  alpha:
    - name: alpha
      version: 1.3.0
      urls: [charts/alpha-1.3.0.tgz]
    - name: alpha
      version: 1.2.0
      urls: [charts/alpha-1.2.0.tgz]
    - name: alpha
      version: 2.0.0
      urls: [charts/alpha-2.0.0.tgz]
  beta:
    - name: beta
      version: 0.4.0
      urls: [charts/beta-0.4.0.tgz]
"#;

fn manifest(server: &MockServer, alpha_constraint: &str) -> ChartManifest {
    ChartManifest::from_yaml(&format!(
        r#"
alpha:
  source: helmRepo
  remoteName: alpha
  remoteRepoUrl: {url}
  version: "{alpha_constraint}"
beta:
  source: helmRepo
  remoteName: beta
  remoteRepoUrl: {url}/index.yaml
  version: ">=0.1.0 <1.0.0"
"#,
        url = server.uri(),
        alpha_constraint = alpha_constraint,
    ))
    .unwrap()
}

fn dirs() -> (TempDir, TempDir) {
    (TempDir::new().unwrap(), TempDir::new().unwrap())
}

fn version_of(chart: &Path) -> String {
    helmet_core::ChartMetadata::load(chart).unwrap().version
}

#[tokio::test]
async fn test_shared_index_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/charts/alpha-1.3.0.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(chart_tgz("alpha", "1.3.0")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/charts/beta-0.4.0.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(chart_tgz("beta", "0.4.0")))
        .expect(1)
        .mount(&server)
        .await;

    let (charts, types) = dirs();
    let manifest = manifest(&server, "^1.2.0");
    let sync = ChartSynchronizer::new(charts.path(), types.path()).unwrap();

    let reports = sync.sync(manifest.select(None)).await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].name, "alpha");
    assert_eq!(
        reports[0].result.as_ref().unwrap(),
        &ChartUpdateOutcome::Updated {
            from: None,
            to: "1.3.0".to_string()
        }
    );
    assert!(reports[1].result.is_ok());

    assert_eq!(version_of(&charts.path().join("alpha")), "1.3.0");
    assert!(charts.path().join("beta/templates/deployment.yaml").is_file());
}

#[tokio::test]
async fn test_failing_index_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.yaml"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (charts, types) = dirs();
    let manifest = manifest(&server, "^1.2.0");
    let sync = ChartSynchronizer::new(charts.path(), types.path()).unwrap();

    let reports = sync.sync(manifest.select(None)).await;
    assert_eq!(reports.len(), 2);
    for report in &reports {
        let err = report.result.as_ref().unwrap_err();
        assert!(err.is_fetch_error(), "got {:?}", err);
    }
    assert!(!charts.path().join("alpha").exists());
}

#[tokio::test]
async fn test_second_run_is_up_to_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/charts/alpha-1.3.0.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(chart_tgz("alpha", "1.3.0")))
        .expect(1)
        .mount(&server)
        .await;

    let (charts, types) = dirs();
    let manifest = manifest(&server, "^1.2.0");

    let first = ChartSynchronizer::new(charts.path(), types.path()).unwrap();
    let reports = first.sync(manifest.select(Some("alpha"))).await;
    assert!(reports[0].result.is_ok());

    let second = ChartSynchronizer::new(charts.path(), types.path()).unwrap();
    let reports = second.sync(manifest.select(Some("alpha"))).await;
    assert_eq!(
        reports[0].result.as_ref().unwrap(),
        &ChartUpdateOutcome::UpToDate {
            version: "1.3.0".to_string()
        }
    );
}

#[tokio::test]
async fn test_failed_download_leaves_chart_intact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/charts/alpha-2.0.0.tgz"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (charts, types) = dirs();
    let alpha = charts.path().join("alpha");
    std::fs::create_dir_all(alpha.join("templates")).unwrap();
    std::fs::write(alpha.join("Chart.yaml"), "name: alpha\nversion: 1.3.0\n").unwrap();
    std::fs::write(alpha.join("templates/local.yaml"), "kind: Local\n").unwrap();
    let before = digest_dir(&alpha).unwrap();

    let manifest = manifest(&server, "^2.0.0");
    let sync = ChartSynchronizer::new(charts.path(), types.path()).unwrap();
    let reports = sync.sync(manifest.select(Some("alpha"))).await;

    let err = reports[0].result.as_ref().unwrap_err();
    assert!(err.is_fetch_error(), "unexpected error: {}", err);
    assert_eq!(before, digest_dir(&alpha).unwrap());

    // No staging directory left behind
    let entries: Vec<_> = std::fs::read_dir(charts.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_unsatisfiable_constraint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
        .mount(&server)
        .await;

    let (charts, types) = dirs();
    let manifest = manifest(&server, "^3.0.0");
    let sync = ChartSynchronizer::new(charts.path(), types.path()).unwrap();
    let reports = sync.sync(manifest.select(Some("alpha"))).await;

    match reports[0].result.as_ref().unwrap_err() {
        RepoError::VersionResolution { available, .. } => {
            assert_eq!(available.len(), 3);
            assert!(available.contains(&"1.2.0".to_string()));
            assert!(available.contains(&"2.0.0".to_string()));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!charts.path().join("alpha").exists());
}

#[tokio::test]
async fn test_remote_archive_with_extract_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/archive/v0.8.0.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(chart_zip("repo-0.8.0", "deploy/charts/csi", "csi", "0.8.0")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manifest = ChartManifest::from_yaml(&format!(
        r#"
csi:
  source: remoteArchive
  archiveUrl: {}/archive/v0.8.0.zip
  extractPath: deploy/charts/csi
  version: 0.8.0
  hooks:
    downloaded: test -f "$HELMET_CHART_PATH/Chart.yaml"
"#,
        server.uri()
    ))
    .unwrap();

    let (charts, types) = dirs();
    let sync = ChartSynchronizer::new(charts.path(), types.path()).unwrap();
    let reports = sync.sync(manifest.select(None)).await;

    assert!(reports[0].result.is_ok(), "{:?}", reports[0].result);
    assert_eq!(version_of(&charts.path().join("csi")), "0.8.0");
    assert!(!charts.path().join("csi/README.md").exists());
}

#[tokio::test]
async fn test_failing_downloaded_hook_aborts_update() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/archive/v0.8.0.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(chart_zip("repo-0.8.0", "chart", "csi", "0.8.0")),
        )
        .mount(&server)
        .await;

    let manifest = ChartManifest::from_yaml(&format!(
        r#"
csi:
  source: remoteArchive
  archiveUrl: {}/archive/v0.8.0.zip
  extractPath: chart
  version: 0.8.0
  hooks:
    downloaded: exit 1
"#,
        server.uri()
    ))
    .unwrap();

    let (charts, types) = dirs();
    let sync = ChartSynchronizer::new(charts.path(), types.path()).unwrap();
    let reports = sync.sync(manifest.select(None)).await;

    assert!(matches!(
        reports[0].result,
        Err(RepoError::HookFailed { .. })
    ));
    assert!(!charts.path().join("csi").exists());
}

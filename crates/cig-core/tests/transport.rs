//! End-to-end flow transport against mock tenants

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cig_core::session::CSRF_HEADER;
use cig_core::{
    transport_flow, update_configurations, Authorization, ConfigurationParameter, Destination, Published,
    TenantClient, TenantConfig, TransportOptions,
};
use serde_json::{json, Value};
use std::io::{Cursor, Read, Write};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const SOURCE_ID: &str = "PurchaseOrder";
const SOURCE_PACKAGE: &str = "POscenario";

fn flow_path(id: &str) -> String {
    format!("/IntegrationDesigntimeArtifacts(Id='{}',Version='active')", id)
}

fn tenant(key: &str, server: &MockServer) -> TenantConfig {
    TenantConfig::new(key, server.uri(), Authorization::basic("operator", "secret"))
}

fn flow_entity(id: &str, name: &str, package: &str) -> Value {
    json!({ "d": {
        "__metadata": { "id": "x", "uri": "x", "type": "com.sap.hci.api.IntegrationDesigntimeArtifact" },
        "Id": id,
        "Version": "1.0.3",
        "PackageId": package,
        "Name": name
    } })
}

fn flow_archive(id: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();

    writer.add_directory("META-INF/", opts).unwrap();
    writer.start_file("META-INF/MANIFEST.MF", opts).unwrap();
    write!(
        writer,
        "Manifest-Version: 1.0\r\nBundle-ManifestVersion: 2\r\nBundle-Name: {id}\r\nBundle-SymbolicName: {id}; singleton:=true\r\nBundle-Version: 1.0.3\r\n\r\n"
    )
    .unwrap();
    writer.start_file(".project", opts).unwrap();
    write!(
        writer,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<projectDescription>\n\t<name>{id}</name>\n</projectDescription>\n"
    )
    .unwrap();
    writer
        .start_file("src/main/resources/scenarioflows/integrationflow/PurchaseOrder.iflw", opts)
        .unwrap();
    writer.write_all(b"<bpmn2:definitions/>").unwrap();

    writer.finish().unwrap().into_inner()
}

async fn mount_source(server: &MockServer, archive: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(flow_path(SOURCE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(flow_entity(SOURCE_ID, "Purchase Order", SOURCE_PACKAGE)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/$value", flow_path(SOURCE_ID))))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(server)
        .await;
}

async fn mount_handshake(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(CSRF_HEADER, "csrf-token")
                .insert_header("Set-Cookie", "JSESSIONID=session; Path=/"),
        )
        .mount(server)
        .await;
}

async fn requests(server: &MockServer, verb: &str, request_path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == request_path)
        .collect()
}

fn uploaded_archive(request: &Request) -> Vec<u8> {
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    let content = body["ArtifactContent"].as_str().unwrap();
    BASE64.decode(content).unwrap()
}

fn member(archive: &[u8], name: &str) -> String {
    let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut content = String::new();
    zip.by_name(name).unwrap().read_to_string(&mut content).unwrap();
    content
}

#[tokio::test]
async fn test_identity_transport_updates_with_downloaded_bytes() {
    let server = MockServer::start().await;
    let archive = flow_archive(SOURCE_ID);
    mount_source(&server, archive.clone()).await;
    mount_handshake(&server).await;
    Mock::given(method("PUT"))
        .and(path(flow_path(SOURCE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/IntegrationDesigntimeArtifacts"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let config = tenant("dev", &server);
    let mut out = Vec::new();
    let outcome = transport_flow(
        &mut out,
        &config,
        SOURCE_ID,
        &Destination::new(&config, SOURCE_ID),
        TransportOptions::default(),
    )
    .await
    .unwrap();

    assert!(outcome.is_update());
    assert!(!outcome.renamed);
    assert!(outcome.bytes > 0);
    assert_eq!(outcome.flow_name, "Purchase Order");

    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("PurchaseOrder"), "{report}");
    assert!(report.contains(&format!("number of bytes: {}", archive.len())), "{report}");

    let puts = requests(&server, "PUT", &flow_path(SOURCE_ID)).await;
    assert_eq!(puts.len(), 1);
    assert_eq!(uploaded_archive(&puts[0]), archive);
    assert_eq!(puts[0].headers[CSRF_HEADER], "csrf-token");
}

#[tokio::test]
async fn test_renamed_transport_creates_on_destination() {
    const DEST_ID: &str = "PurchaseOrderCopy1";

    let source = MockServer::start().await;
    mount_source(&source, flow_archive(SOURCE_ID)).await;

    let destination = MockServer::start().await;
    mount_handshake(&destination).await;
    Mock::given(method("GET"))
        .and(path(flow_path(DEST_ID)))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            r#"{"error":{"code":"Not Found","message":{"lang":"en","value":"Integration design time artifact not found"}}}"#,
        ))
        .mount(&destination)
        .await;
    Mock::given(method("POST"))
        .and(path("/IntegrationDesigntimeArtifacts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(flow_entity(DEST_ID, "Purchase Order", SOURCE_PACKAGE)))
        .expect(1)
        .mount(&destination)
        .await;

    let source_config = tenant("dev", &source);
    let destination_config = tenant("qa", &destination);
    let work = tempfile::tempdir().unwrap();
    let mut out = Vec::new();
    let outcome = transport_flow(
        &mut out,
        &source_config,
        SOURCE_ID,
        &Destination::new(&destination_config, DEST_ID),
        TransportOptions {
            work_dir: Some(work.path().to_path_buf()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Download, extraction directory and rewritten archive are all gone
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    assert!(outcome.renamed);
    match &outcome.published {
        Published::Created { flow } => assert_eq!(flow.id, DEST_ID),
        other => panic!("expected create, got {other:?}"),
    }

    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("Integration flow created."));
    assert!(report.contains(r#""Id": "PurchaseOrderCopy1""#), "{report}");

    let posts = requests(&destination, "POST", "/IntegrationDesigntimeArtifacts").await;
    assert_eq!(posts.len(), 1);
    let body: Value = serde_json::from_slice(&posts[0].body).unwrap();
    assert_eq!(body["Id"], DEST_ID);
    assert_eq!(body["Name"], "Purchase Order");
    assert_eq!(body["PackageId"], SOURCE_PACKAGE);

    let uploaded = uploaded_archive(&posts[0]);
    assert!(member(&uploaded, "META-INF/MANIFEST.MF").contains("SymbolicName: PurchaseOrderCopy1;"));
    assert!(member(&uploaded, ".project").contains("<name>PurchaseOrderCopy1</name>"));

    let zip = ZipArchive::new(Cursor::new(uploaded.as_slice())).unwrap();
    assert!(zip.file_names().all(|name| !name.contains("..")));
}

#[tokio::test]
async fn test_batch_configuration_update() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    Mock::given(method("POST"))
        .and(path("/$batch"))
        .respond_with(ResponseTemplate::new(202).set_body_string(
            "--batchresponse_1\r\nContent-Type: multipart/mixed; boundary=changesetresponse_1\r\n\r\n--changesetresponse_1--\r\n--batchresponse_1--\r\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = TenantClient::new(&tenant("dev", &server)).unwrap();
    let params = [
        ConfigurationParameter::new("APIKey", "abc", "xsd:string"),
        ConfigurationParameter::new("bodySize", "105", "xsd:integer"),
    ];
    let response = update_configurations(&client, SOURCE_ID, &params).await.unwrap();
    assert!(!response.trim().is_empty());

    let posts = requests(&server, "POST", "/$batch").await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].headers["Content-Type"], "multipart/mixed; boundary=batch_request");

    let body = String::from_utf8(posts[0].body.clone()).unwrap();
    assert_eq!(body.matches("--changeset_abc\r\n").count(), 2);
    assert_eq!(body.matches("--changeset_abc--\r\n").count(), 1);
    assert!(body.contains(
        "PUT IntegrationDesigntimeArtifacts(Id='PurchaseOrder',Version='active')/$links/Configurations('APIKey') HTTP/1.1\r\n"
    ));
    assert!(body.contains(
        "PUT IntegrationDesigntimeArtifacts(Id='PurchaseOrder',Version='active')/$links/Configurations('bodySize') HTTP/1.1\r\n"
    ));
    assert!(body.contains(r#"{"ParameterValue":"105","DataType":"xsd:integer"}"#));
}

#[tokio::test]
async fn test_repeated_transport_updates_once_destination_exists() {
    const DEST_ID: &str = "PurchaseOrderCopy2";

    let source = MockServer::start().await;
    mount_source(&source, flow_archive(SOURCE_ID)).await;

    let destination = MockServer::start().await;
    mount_handshake(&destination).await;
    // Absent on the first probe, present afterwards
    Mock::given(method("GET"))
        .and(path(flow_path(DEST_ID)))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&destination)
        .await;
    Mock::given(method("GET"))
        .and(path(flow_path(DEST_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(flow_entity(DEST_ID, "PO Copy", SOURCE_PACKAGE)))
        .mount(&destination)
        .await;
    Mock::given(method("POST"))
        .and(path("/IntegrationDesigntimeArtifacts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(flow_entity(DEST_ID, "Purchase Order", SOURCE_PACKAGE)))
        .expect(1)
        .mount(&destination)
        .await;
    Mock::given(method("PUT"))
        .and(path(flow_path(DEST_ID)))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&destination)
        .await;

    let source_config = tenant("dev", &source);
    let destination_config = tenant("qa", &destination);
    let target = Destination::new(&destination_config, DEST_ID);

    let mut updates = Vec::new();
    for _ in 0..3 {
        let outcome = transport_flow(&mut Vec::new(), &source_config, SOURCE_ID, &target, TransportOptions::default())
            .await
            .unwrap();
        updates.push(outcome.is_update());
    }
    assert_eq!(updates, vec![false, true, true]);

    for put in requests(&destination, "PUT", &flow_path(DEST_ID)).await {
        let body: Value = serde_json::from_slice(&put.body).unwrap();
        assert_eq!(body["Name"], "PO Copy");
        assert!(member(&uploaded_archive(&put), "META-INF/MANIFEST.MF").contains("SymbolicName: PurchaseOrderCopy2;"));
    }
}

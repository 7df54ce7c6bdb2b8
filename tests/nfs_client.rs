use base64::Engine as _;
use serde_json::json;

mod support;

use support::{get, post, registry, Behavior, MockServer, BLOB, EXPORT, GREETING};

#[tokio::test]
async fn probe_reports_versions_per_program() {
    let server = MockServer::start().await;
    let response = get(&registry(), "nfs.probe", server.params(json!({}))).await;
    assert_eq!(response.status, 200);
    let body = &response.body;
    assert!(body.success, "{body:?}");

    let versions = body.get("versions").unwrap();
    let mount = &versions["mount"];
    assert_eq!(mount["supported"], json!(true));
    assert_eq!(mount["preferred"], json!(3));
    for v in ["1", "2", "3"] {
        assert_eq!(mount["versions"][v]["ok"], json!(true));
    }

    let nfs = &versions["nfs"];
    assert_eq!(nfs["port"], json!(server.port));
    assert_eq!(nfs["preferred"], json!(3));
    assert_eq!(nfs["versions"]["3"]["ok"], json!(true));
    assert_eq!(nfs["versions"]["4"]["ok"], json!(false));
    assert_eq!(nfs["versions"]["4"]["mismatch"], json!({"low": 3, "high": 3}));
    assert_eq!(nfs["versions"]["2"]["mismatch"]["high"], json!(3));
}

#[tokio::test]
async fn probe_without_any_service_fails() {
    let port = support::closed_port().await;
    let params = serde_json::Map::from_iter([
        ("host".to_string(), json!("127.0.0.1")),
        ("port".to_string(), json!(port)),
    ]);
    let response = get(&registry(), "nfs.probe", params.into()).await;
    assert_eq!(response.status, 200);
    assert!(!response.body.success);
    assert_eq!(
        response.body.error.as_deref(),
        Some("No MOUNT or NFS service responded on 127.0.0.1")
    );
    let nfs = &response.body.get("versions").unwrap()["nfs"];
    assert_eq!(nfs["supported"], json!(false));
    assert!(nfs["versions"]["3"]["error"].as_str().unwrap().contains("refused"));
}

#[tokio::test]
async fn null_ping() {
    let server = MockServer::start().await;
    let response = get(&registry(), "nfs.null", server.params(json!({"auth": "none"}))).await;
    assert!(response.body.success);
    assert_eq!(response.body.get("alive"), Some(&json!(true)));
    assert_eq!(response.body.get("version"), Some(&json!(3)));
}

#[tokio::test]
async fn exports_are_listed() {
    let server = MockServer::start().await;
    let response = get(&registry(), "nfs.exports", server.params(json!({}))).await;
    let body = &response.body;
    assert!(body.success, "{body:?}");
    assert_eq!(body.get("count"), Some(&json!(2)));
    let exports = body.get("exports").unwrap();
    assert_eq!(exports[0], json!({"directory": EXPORT, "groups": ["*"]}));
    assert_eq!(exports[1]["groups"], json!(["10.0.0.0/8", "admin"]));
}

#[tokio::test]
async fn exports_over_fragmented_replies() {
    let server = MockServer::with_behavior(Behavior {
        fragment_size: Some(5),
        ..Default::default()
    })
    .await;
    let response = get(&registry(), "nfs.exports", server.params(json!({"version": 1}))).await;
    assert!(response.body.success, "{:?}", response.body);
    assert_eq!(response.body.get("count"), Some(&json!(2)));
}

#[tokio::test]
async fn lookup_finds_a_file_and_unmounts() {
    let server = MockServer::start().await;
    let response =
        get(&registry(), "nfs.lookup", server.params(json!({"path": "/test.txt"}))).await;
    let body = &response.body;
    assert!(body.success, "{body:?}");
    assert_eq!(body.get("found"), Some(&json!(true)));
    assert_eq!(body.get("type"), Some(&json!("regular")));
    let attributes = body.get("attributes").unwrap();
    assert_eq!(attributes["size"], json!(GREETING.len()));
    assert_eq!(attributes["modeOctal"], json!("0644"));
    assert_eq!(attributes["mtime"]["seconds"], json!(1_700_000_000));
    // Handle is the hex of the mock's 8-byte file id.
    assert_eq!(body.get("fileHandle"), Some(&json!("0000000000000002")));

    assert_eq!(server.mounts(), 1);
    assert_eq!(server.unmounts(), 1);
}

#[tokio::test]
async fn lookup_of_missing_entry_is_a_finding() {
    let server = MockServer::start().await;
    let response =
        get(&registry(), "nfs.lookup", server.params(json!({"path": "docs/nothing.txt"}))).await;
    assert_eq!(response.status, 200);
    let body = &response.body;
    assert!(body.success);
    assert!(body.error.is_none());
    assert_eq!(body.get("found"), Some(&json!(false)));
    assert_eq!(body.get("nfsStatus"), Some(&json!("NFS3ERR_NOENT")));
    assert_eq!(body.get("statusCode"), Some(&json!(2)));
    assert!(body.get("statusMessage").is_some());
    assert_eq!(server.unmounts(), 1);
}

#[tokio::test]
async fn unknown_export_reports_mount_status() {
    let server = MockServer::start().await;
    let response = get(
        &registry(),
        "nfs.read",
        server.params(json!({"exportPath": "/missing", "path": "test.txt"})),
    )
    .await;
    assert_eq!(response.status, 200);
    let body = &response.body;
    assert!(!body.success);
    assert_eq!(body.get("mountStatus"), Some(&json!("MNT3ERR_NOENT")));
    assert_eq!(body.get("statusCode"), Some(&json!(2)));
    assert!(body.error.is_some());
}

#[tokio::test]
async fn getattr_is_repeatable() {
    let server = MockServer::start().await;
    let registry = registry();
    let first = get(&registry, "nfs.getattr", server.params(json!({"path": "docs"}))).await;
    let second = get(&registry, "nfs.getattr", server.params(json!({"path": "docs"}))).await;
    assert!(first.body.success, "{:?}", first.body);
    assert_eq!(first.body.get("type"), Some(&json!("directory")));
    for key in ["fileHandle", "fileId", "mode", "size", "mtime"] {
        assert_eq!(first.body.get(key), second.body.get(key), "{key}");
    }

    // The export root when no path is given.
    let root = get(&registry, "nfs.getattr", server.params(json!({}))).await;
    assert_eq!(root.body.get("fileId"), Some(&json!(1)));
}

#[tokio::test]
async fn read_text_and_binary() {
    let server = MockServer::start().await;
    let registry = registry();

    let text = get(&registry, "nfs.read", server.params(json!({"path": "test.txt"}))).await;
    let body = &text.body;
    assert!(body.success, "{body:?}");
    assert_eq!(body.get("encoding"), Some(&json!("utf-8")));
    assert_eq!(body.get("data"), Some(&json!(std::str::from_utf8(GREETING).unwrap())));
    assert_eq!(body.get("bytesRead"), Some(&json!(GREETING.len())));
    assert_eq!(body.get("eof"), Some(&json!(true)));

    let blob = get(&registry, "nfs.read", server.params(json!({"path": "blob.bin"}))).await;
    assert_eq!(blob.body.get("encoding"), Some(&json!("base64")));
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(blob.body.get("data").unwrap().as_str().unwrap())
        .unwrap();
    assert_eq!(decoded, BLOB);

    let partial = get(
        &registry,
        "nfs.read",
        server.params(json!({"path": "test.txt", "offset": 6, "count": 4, "encoding": "base64"})),
    )
    .await;
    assert_eq!(partial.body.get("eof"), Some(&json!(false)));
    assert_eq!(partial.body.get("data"), Some(&json!("ZnJvbQ==")));
}

#[tokio::test]
async fn read_of_empty_file_is_eof() {
    let server = MockServer::start().await;
    let response = get(&registry(), "nfs.read", server.params(json!({"path": "/empty.bin"}))).await;
    let body = &response.body;
    assert!(body.success, "{body:?}");
    assert_eq!(body.get("bytesRead"), Some(&json!(0)));
    assert_eq!(body.get("eof"), Some(&json!(true)));
    assert_eq!(body.get("data"), Some(&json!("")));
}

#[tokio::test]
async fn read_of_directory_fails_with_status() {
    let server = MockServer::start().await;
    let response = get(&registry(), "nfs.read", server.params(json!({"path": "docs"}))).await;
    assert_eq!(response.status, 200);
    assert!(!response.body.success);
    assert_eq!(response.body.get("nfsStatus"), Some(&json!("NFS3ERR_ISDIR")));
}

#[tokio::test]
async fn readdir_lists_and_pages() {
    let server = MockServer::start().await;
    let registry = registry();

    let all = get(&registry, "nfs.readdir", server.params(json!({}))).await;
    let body = &all.body;
    assert!(body.success, "{body:?}");
    assert_eq!(body.get("count"), Some(&json!(4)));
    assert_eq!(body.get("eof"), Some(&json!(true)));
    assert_eq!(body.get("cookieVerifier"), Some(&json!(hex::encode(support::COOKIE_VERIFIER))));
    let names: Vec<&str> = body.get("entries").unwrap().as_array().unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["blob.bin", "docs", "empty.bin", "test.txt"]);

    let page = get(
        &registry,
        "nfs.readdir",
        server.params(json!({
            "cookie": 1,
            "count": 16,
            "cookieVerifier": hex::encode(support::COOKIE_VERIFIER),
        })),
    )
    .await;
    assert_eq!(page.body.get("count"), Some(&json!(1)));
    assert_eq!(page.body.get("eof"), Some(&json!(false)));
    assert_eq!(page.body.get("entries").unwrap()[0]["name"], json!("docs"));
    assert_eq!(page.body.get("entries").unwrap()[0]["cookie"], json!(2));

    let bad = get(&registry, "nfs.readdir", server.params(json!({"cookieVerifier": "zz"}))).await;
    assert_eq!(bad.status, 400);
}

#[tokio::test]
async fn write_then_read_back() {
    let server = MockServer::start().await;
    let registry = registry();

    let response = post(
        &registry,
        "nfs.write",
        server.params(json!({"path": "test.txt", "data": "HELLO"})),
    )
    .await;
    let body = &response.body;
    assert!(body.success, "{body:?}");
    assert_eq!(body.get("bytesWritten"), Some(&json!(5)));
    assert_eq!(body.get("committed"), Some(&json!("file_sync")));
    assert_eq!(body.get("verifier"), Some(&json!(hex::encode(support::WRITE_VERIFIER))));
    assert_eq!(server.file("test.txt").unwrap(), b"HELLO from nfs\n");

    let response = post(
        &registry,
        "nfs.write",
        server.params(json!({
            "path": "empty.bin",
            "data": "AAEC",
            "encoding": "base64",
            "offset": 2,
        })),
    )
    .await;
    assert!(response.body.success, "{:?}", response.body);
    assert_eq!(server.file("empty.bin").unwrap(), vec![0, 0, 0, 1, 2]);
}

#[tokio::test]
async fn write_is_refused_without_post() {
    let server = MockServer::start().await;
    let request = server.params(json!({"path": "test.txt", "data": "x"}));
    let response = get(&registry(), "nfs.write", request).await;
    assert_eq!(response.status, 405);
    assert_eq!(server.mounts(), 0);
    assert_eq!(server.file("test.txt").unwrap(), GREETING);
}

#[tokio::test]
async fn write_validates_payload() {
    let server = MockServer::start().await;
    let registry = registry();
    let cases = [
        (json!({"path": "test.txt"}), "data is required"),
        (
            json!({"path": "test.txt", "data": "***", "encoding": "base64"}),
            "data is not valid base64",
        ),
        (json!({"path": "test.txt", "data": "x", "stable": "SOMETIMES"}), "unknown stable mode"),
    ];
    for (request, message) in cases {
        let response = post(&registry, "nfs.write", server.params(request)).await;
        assert_eq!(response.status, 400);
        assert!(response.body.error.unwrap().contains(message));
    }
    assert_eq!(server.mounts(), 0);
}

#[tokio::test]
async fn create_mkdir_rename_remove() {
    let server = MockServer::start().await;
    let registry = registry();

    let request = server.params(json!({"path": "docs/new.txt", "mode": "0600"}));
    let created = post(&registry, "nfs.create", request).await;
    assert!(created.body.success, "{:?}", created.body);
    assert_eq!(created.body.get("created"), Some(&json!(true)));
    assert_eq!(created.body.get("attributes").unwrap()["modeOctal"], json!("0600"));
    assert!(server.exists("docs/new.txt"));

    // Guarded create refuses an existing name.
    let again = post(&registry, "nfs.create", server.params(json!({"path": "docs/new.txt"}))).await;
    assert!(!again.body.success);
    assert_eq!(again.body.get("nfsStatus"), Some(&json!("NFS3ERR_EXIST")));
    let unchecked = post(
        &registry,
        "nfs.create",
        server.params(json!({"path": "docs/new.txt", "guarded": false})),
    )
    .await;
    assert!(unchecked.body.success);

    let mkdir = post(&registry, "nfs.mkdir", server.params(json!({"path": "archive"}))).await;
    assert!(mkdir.body.success, "{:?}", mkdir.body);
    assert_eq!(mkdir.body.get("attributes").unwrap()["type"], json!("directory"));
    assert_eq!(mkdir.body.get("attributes").unwrap()["modeOctal"], json!("0755"));

    let renamed = post(
        &registry,
        "nfs.rename",
        server.params(json!({"path": "docs/new.txt", "newPath": "archive/old.txt"})),
    )
    .await;
    assert_eq!(renamed.body.get("renamed"), Some(&json!(true)));
    assert!(!server.exists("docs/new.txt"));
    assert!(server.exists("archive/old.txt"));

    let not_empty = post(&registry, "nfs.rmdir", server.params(json!({"path": "archive"}))).await;
    assert!(!not_empty.body.success);
    assert_eq!(not_empty.body.get("nfsStatus"), Some(&json!("NFS3ERR_NOTEMPTY")));

    let removed =
        post(&registry, "nfs.remove", server.params(json!({"path": "archive/old.txt"}))).await;
    assert_eq!(removed.body.get("removed"), Some(&json!(true)));
    let rmdir = post(&registry, "nfs.rmdir", server.params(json!({"path": "archive"}))).await;
    assert!(rmdir.body.success, "{:?}", rmdir.body);
    assert!(!server.exists("archive"));

    assert_eq!(server.mounts(), server.unmounts());
}

#[tokio::test]
async fn path_traversal_is_rejected() {
    let server = MockServer::start().await;
    let registry = registry();
    for (op, request) in [
        ("nfs.lookup", json!({"path": "../etc/passwd"})),
        ("nfs.read", json!({"path": "docs/../../x"})),
        ("nfs.rename", json!({"path": "test.txt", "newPath": "../x"})),
    ] {
        let response = post(&registry, op, server.params(request)).await;
        assert_eq!(response.status, 400, "{op}");
    }
    let relative = get(
        &registry,
        "nfs.lookup",
        server.params(json!({"exportPath": "export", "path": "test.txt"})),
    )
    .await;
    assert_eq!(relative.status, 400);
    assert_eq!(server.mounts(), 0);
}

#[tokio::test]
async fn too_many_groups_is_invalid() {
    let server = MockServer::start().await;
    let gids: Vec<u32> = (0..17).collect();
    let response = get(&registry(), "nfs.null", server.params(json!({"gids": gids}))).await;
    assert_eq!(response.status, 400);
    let response = get(&registry(), "nfs.null", server.params(json!({"auth": "kerberos"}))).await;
    assert_eq!(response.status, 400);
}

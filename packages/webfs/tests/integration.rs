use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use webfs_http::{
    Capabilities, Capability, Connection, DirMount, Error, HeaderLookup, HttpClient,
    HttpRequest, MemoryMount, MemoryResponse, MountConfig, Opener, Peer, RemotePeer, WebOpener,
};

/// Lay out a mount directory the way the transport would after allocating
/// connection `name`.
fn prepared_mount(name: &str, body: &[u8], headers: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("clone"), format!("{}\n", name)).unwrap();
    fs::create_dir(dir.path().join(name)).unwrap();
    fs::write(dir.path().join(name).join("body"), body).unwrap();
    for (file, value) in headers {
        fs::write(dir.path().join(name).join(file), value).unwrap();
    }
    dir
}

#[test]
fn test_get_over_directory_mount() {
    let dir = prepared_mount("0", b"exact body bytes", &[("contenttype", "text/plain")]);
    let opener = WebOpener::new(DirMount::new(dir.path()));

    let mut conn = opener.open(HttpRequest::get("http://x/y")).unwrap();
    assert_eq!(conn.url(), "http://x/y");

    let mut body = Vec::new();
    loop {
        let chunk = conn.read(5).unwrap();
        if chunk.is_empty() {
            break;
        }
        body.extend(chunk);
    }
    assert_eq!(body, b"exact body bytes");
    assert_eq!(
        conn.header("Content-Type"),
        HeaderLookup::Found("text/plain".to_string())
    );

    conn.close().unwrap();
    assert!(matches!(conn.read(1), Err(Error::Closed)));
    assert_eq!(
        fs::read_to_string(dir.path().join("clone")).unwrap(),
        "url http://x/y"
    );
}

#[test]
fn test_post_over_directory_mount() {
    let dir = prepared_mount("5", b"accepted", &[]);
    let client = HttpClient::from_config(&MountConfig::default().with_root(dir.path())).unwrap();

    let payload: Vec<u8> = (0..10000u32).map(|i| (i % 251) as u8).collect();
    let response = client
        .fetch(HttpRequest::post("http://x/upload", Cursor::new(payload.clone())))
        .unwrap();

    assert_eq!(response.text(), "accepted");
    assert_eq!(fs::read(dir.path().join("5/postdata")).unwrap(), payload);
}

#[test]
fn test_headers_are_announced_in_order() {
    let mount = MemoryMount::new().with_default_response(MemoryResponse::new("ok"));
    let client = HttpClient::new(WebOpener::new(mount.clone()));

    client
        .fetch(
            HttpRequest::get("http://x/y")
                .with_header("A", "1")
                .with_header("B", "2"),
        )
        .unwrap();

    let exchanges = mount.recorded_exchanges();
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].url, "http://x/y");
    assert_eq!(exchanges[0].headers, "A: 1\r\nB: 2\r\n");
}

#[test]
fn test_post_chunking() {
    let mount = MemoryMount::new().with_default_response(MemoryResponse::new(""));
    let opener = WebOpener::new(mount.clone());

    opener
        .open(HttpRequest::post("http://x/", Cursor::new(vec![0xAB; 10000])))
        .unwrap();

    let exchange = &mount.recorded_exchanges()[0];
    assert_eq!(exchange.postdata.len(), 10000);
    assert_eq!(exchange.postdata_writes, vec![4096, 4096, 1808]);
}

#[test]
fn test_response_header_lookup() {
    let mount = MemoryMount::new().with_default_response(
        MemoryResponse::new("")
            .with_header("A", "1")
            .with_header("B", "2")
            .with_header("X-Foo", "bar"),
    );
    let opener = WebOpener::new(mount);
    let conn = opener.open(HttpRequest::get("http://x/")).unwrap();

    assert_eq!(conn.header("a").into_option(), Some("1".to_string()));
    assert_eq!(conn.header("A").into_option(), Some("1".to_string()));
    assert_eq!(conn.header("B").into_option(), Some("2".to_string()));
    assert_eq!(conn.header("X-Foo"), conn.header("xfoo"));
    assert_eq!(conn.header("C"), HeaderLookup::Absent);
}

#[test]
fn test_concurrent_openers_get_distinct_connections() {
    let mount = MemoryMount::new().with_default_response(MemoryResponse::new("shared"));
    let opener = Arc::new(WebOpener::new(mount.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let opener = Arc::clone(&opener);
            thread::spawn(move || {
                let mut conn = opener
                    .open(HttpRequest::get(format!("http://x/{}", i)))
                    .unwrap();
                let body = conn.read(64).unwrap();
                conn.close().unwrap();
                body
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), b"shared");
    }

    let exchanges = mount.recorded_exchanges();
    assert_eq!(exchanges.len(), 8);
    let connections: BTreeSet<_> = exchanges.iter().map(|e| e.connection.clone()).collect();
    assert_eq!(connections.len(), 8);
    let urls: BTreeSet<_> = exchanges.iter().map(|e| e.url.clone()).collect();
    assert_eq!(urls.len(), 8);
}

#[test]
fn test_remote_peer_capabilities() {
    let mount = MemoryMount::new().with_response(
        "http://hg/repo?cmd=capabilities",
        MemoryResponse::new("lookup branchmap unbundle=HG10GZ,HG10BZ,HG10UN"),
    );
    let client = HttpClient::new(WebOpener::new(mount));
    let peer = RemotePeer::connect(&client, "http://hg/repo").unwrap();

    assert_eq!(peer.capable("lookup"), Some(&Capability::Boolean));
    assert_eq!(
        peer.capable("unbundle").and_then(Capability::value),
        Some("HG10GZ,HG10BZ,HG10UN")
    );
    assert_eq!(peer.capable("pushkey"), None);
    assert!(peer.requirecap("branchmap", "fetch branch heads").is_ok());

    let err = peer.requirecap("pushkey", "push bookmarks").unwrap_err();
    assert!(err.to_string().contains("push bookmarks"));
    assert!(err.to_string().contains("pushkey"));

    assert_eq!(peer.rjoin("raw-file/tip"), "http://hg/repo/raw-file/tip");
}

#[test]
fn test_peer_without_transport() {
    let peer = RemotePeer::new("http://x/", Capabilities::parse("x=v"));
    assert_eq!(
        peer.capable("x"),
        Some(&Capability::StringValued("v".to_string()))
    );
    assert_eq!(peer.rjoin("y"), "http://x/y");
    assert!(!peer.cancopy());
}

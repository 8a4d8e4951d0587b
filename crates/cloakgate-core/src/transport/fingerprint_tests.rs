use boring::asn1::Asn1Time;
use boring::bn::BigNum;
use boring::ec::{EcGroup, EcKey};
use boring::hash::MessageDigest;
use boring::nid::Nid;
use boring::pkey::{PKey, Private};
use boring::ssl::{select_next_proto, AlpnError, SslAcceptor, SslMethod};
use boring::x509::{X509NameBuilder, X509};
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use hyper::server::conn::{http1 as server_http1, http2 as server_http2};
use hyper::service::service_fn;
use std::convert::Infallible;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::*;

fn transport(server_name: &str) -> FingerprintTransport {
    FingerprintTransport::new(FingerprintTransportConfig {
        server_name: server_name.to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn request(uri: &str) -> Request<FingerprintBody> {
    Request::builder().method(Method::POST).uri(uri).body(Full::new(Bytes::from_static(b"{}"))).unwrap()
}

/// HTTP/2 sender over an in-memory pipe; the server half is returned so the
/// test controls when the connection dies.
async fn in_memory_h2_sender() -> (http2::SendRequest<FingerprintBody>, JoinHandle<()>, tokio::io::DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (sender, conn) = http2::Builder::new(TokioExecutor::new()).handshake(TokioIo::new(client)).await.unwrap();
    let driver = tokio::spawn(async move {
        let _ = conn.await;
    });
    (sender, driver, server)
}

#[tokio::test]
async fn test_http_scheme_rejected() {
    let transport = transport("");
    let err = transport.send(request("http://api.example.com/v1/messages")).await.unwrap_err();
    assert_eq!(err, TransportError::InsecureScheme { scheme: "http".to_string() });
    assert!(transport.cached_hosts().is_empty());
}

#[tokio::test]
async fn test_relative_uri_rejected() {
    let transport = transport("");
    let err = transport.send(request("/v1/messages")).await.unwrap_err();
    assert!(matches!(err, TransportError::InsecureScheme { .. }));
}

#[test]
fn test_host_normalization() {
    let uri = |s: &str| s.parse::<Uri>().unwrap();
    assert_eq!(normalize_host(&uri("https://api.example.com/v1")).unwrap(), "api.example.com:443");
    assert_eq!(normalize_host(&uri("https://api.example.com:8443/")).unwrap(), "api.example.com:8443");
    assert_eq!(normalize_host(&uri("https://[::1]/")).unwrap(), "[::1]:443");
}

#[test]
fn test_server_name_derivation() {
    let target = Target::from_uri(&"https://api.example.com:8443/x".parse().unwrap()).unwrap();
    assert_eq!(transport("").server_name_for(&target), "api.example.com");
    assert_eq!(transport("sni.example.org").server_name_for(&target), "sni.example.org");

    let v6 = Target::from_uri(&"https://[::1]/".parse().unwrap()).unwrap();
    assert_eq!(transport("").server_name_for(&v6), "::1");
}

#[test]
fn test_origin_form_rewrite() {
    let target = Target::from_uri(&"https://api.example.com:8443/v1".parse().unwrap()).unwrap();
    let req = into_origin_form(request("https://api.example.com:8443/v1/messages?beta=true"), &target).unwrap();
    assert_eq!(req.uri(), "/v1/messages?beta=true");
    assert_eq!(req.headers()[header::HOST], "api.example.com:8443");
    assert_eq!(req.version(), Version::HTTP_11);

    let default_port = Target::from_uri(&"https://api.example.com/".parse().unwrap()).unwrap();
    let req = into_origin_form(request("https://api.example.com"), &default_port).unwrap();
    assert_eq!(req.uri(), "/");
    assert_eq!(req.headers()[header::HOST], "api.example.com");
}

#[test]
fn test_unsupported_proxy_fails_construction() {
    let result = FingerprintTransport::new(FingerprintTransportConfig {
        proxy_url: "ftp://proxy:21".to_string(),
        ..Default::default()
    });
    assert!(matches!(result, Err(TransportError::UnsupportedProxyScheme { .. })));
}

#[test]
fn test_from_config() {
    let config = TlsFingerprintConfig {
        enabled: true,
        use_custom_spec: true,
        handshake_timeout_secs: 5,
        ..Default::default()
    };
    let transport = FingerprintTransport::from_config(&config).unwrap();
    assert!(transport.config().use_custom_profile);
    assert_eq!(transport.config().server_name, "api.anthropic.com");
    assert_eq!(transport.config().handshake_timeout, Duration::from_secs(5));
}

#[tokio::test]
async fn test_close_empties_cache() {
    let transport = transport("");
    let (sender, driver, _server) = in_memory_h2_sender().await;
    transport.cache_connection("api.example.com:443".to_string(), sender, driver);
    assert_eq!(transport.cached_hosts(), vec!["api.example.com:443".to_string()]);
    assert!(transport.reusable_sender("api.example.com:443").is_some());

    transport.close();
    assert!(transport.cached_hosts().is_empty());
    assert!(transport.reusable_sender("api.example.com:443").is_none());
}

#[tokio::test]
async fn test_dead_connection_is_evicted() {
    let transport = transport("");
    let (sender, driver, server) = in_memory_h2_sender().await;
    transport.cache_connection("dead.example.com:443".to_string(), sender, driver);

    drop(server);
    let deadline = Instant::now() + Duration::from_secs(2);
    while transport.reusable_sender("dead.example.com:443").is_some() {
        assert!(Instant::now() < deadline, "closed connection still reported reusable");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(transport.cached_hosts().is_empty());
}

#[tokio::test]
async fn test_evict_keeps_replacement_connection() {
    let transport = transport("");
    let host = "api.example.com:443";

    let (old_sender, old_driver, _old_server) = in_memory_h2_sender().await;
    let old_id = transport.cache_connection(host.to_string(), old_sender, old_driver);
    let (new_sender, new_driver, _new_server) = in_memory_h2_sender().await;
    let new_id = transport.cache_connection(host.to_string(), new_sender.clone(), new_driver);
    assert_ne!(old_id, new_id);

    // a request that failed on the replaced connection must not drop the fresh one
    transport.evict(host, old_id);
    assert_eq!(transport.reusable_sender(host).map(|(id, _)| id), Some(new_id));

    transport.evict(host, new_id);
    assert!(transport.cached_hosts().is_empty());

    // evicting aborts the driver, which closes the connection
    let deadline = Instant::now() + Duration::from_secs(2);
    while !new_sender.is_closed() {
        assert!(Instant::now() < deadline, "evicted connection still open");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

const ALPN_H2: &[u8] = b"\x02h2";
const ALPN_HTTP11: &[u8] = b"\x08http/1.1";

fn self_signed_cert() -> (PKey<Private>, X509) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, "localhost").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

/// Local TLS server that answers every request with its negotiated protocol
/// after `delay`. Returns the port and the number of accepted TCP connections.
async fn spawn_tls_server(alpn: &'static [u8], delay: Duration) -> (u16, Arc<AtomicUsize>) {
    let (key, cert) = self_signed_cert();
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    acceptor.set_alpn_select_callback(move |_, client| select_next_proto(alpn, client).ok_or(AlpnError::NOACK));
    let acceptor = Arc::new(acceptor.build());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else { return };
            counter.fetch_add(1, Ordering::SeqCst);
            let acceptor = Arc::clone(&acceptor);
            tokio::spawn(async move {
                let Ok(tls) = tokio_boring::accept(&acceptor, tcp).await else { return };
                let h2 = tls.ssl().selected_alpn_protocol() == Some(b"h2".as_slice());
                let service = service_fn(move |_req: Request<Incoming>| async move {
                    tokio::time::sleep(delay).await;
                    let body = if h2 { "h2" } else { "http/1.1" };
                    Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(body.as_bytes()))))
                });
                let io = TokioIo::new(tls);
                let _ = if h2 {
                    server_http2::Builder::new(TokioExecutor::new()).serve_connection(io, service).await
                } else {
                    server_http1::Builder::new().serve_connection(io, service).await
                };
            });
        }
    });

    (port, accepted)
}

fn local_transport() -> FingerprintTransport {
    FingerprintTransport::new(FingerprintTransportConfig {
        server_name: "localhost".to_string(),
        tls: TlsSettings { insecure_skip_verify: true, root_certs: Vec::new() },
        ..Default::default()
    })
    .unwrap()
}

async fn body_text(response: Response<Incoming>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_silent_peer_hits_handshake_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });

    let transport = local_transport();
    let started = Instant::now();
    let err = transport
        .send_with_deadline(request(&format!("https://127.0.0.1:{port}/")), started + Duration::from_millis(200))
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::HandshakeTimeout { addr: format!("127.0.0.1:{port}") });
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(transport.cached_hosts().is_empty());
}

#[tokio::test]
async fn test_h2_connection_is_cached_and_reused() {
    let (port, accepted) = spawn_tls_server(ALPN_H2, Duration::ZERO).await;
    let transport = local_transport();
    let uri = format!("https://127.0.0.1:{port}/v1/messages");

    let first = transport.send(request(&uri)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.version(), Version::HTTP_2);
    assert_eq!(body_text(first).await, "h2");
    assert_eq!(transport.cached_hosts(), vec![format!("127.0.0.1:{port}")]);

    let second = transport.send(request(&uri)).await.unwrap();
    assert_eq!(body_text(second).await, "h2");
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    transport.close();
    assert!(transport.cached_hosts().is_empty());
}

#[tokio::test]
async fn test_http11_fallback_is_not_cached() {
    let (port, accepted) = spawn_tls_server(ALPN_HTTP11, Duration::ZERO).await;
    let transport = local_transport();

    let response = transport.send(request(&format!("https://127.0.0.1:{port}/v1/messages"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.version(), Version::HTTP_11);
    assert_eq!(body_text(response).await, "http/1.1");
    assert!(transport.cached_hosts().is_empty());
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deadline_only_bounds_handshake() {
    let (port, _) = spawn_tls_server(ALPN_HTTP11, Duration::from_millis(600)).await;
    let transport = local_transport();

    let deadline = Instant::now() + Duration::from_millis(250);
    let response = transport
        .send_with_deadline(request(&format!("https://127.0.0.1:{port}/")), deadline)
        .await
        .unwrap();
    assert!(Instant::now() > deadline);
    assert_eq!(body_text(response).await, "http/1.1");
}

//! 默认 `rustls` 引擎的回环闭环测试。
//!
//! # 教案式说明
//! - **Why**：状态机测试用 Mock 引擎隔离了适配器逻辑，这里补上真实引擎的
//!   端到端验证：握手、加密读写与信任锚配置；
//! - **How**：用 `rcgen` 生成 `localhost` 自签证书，在回环地址上起一个
//!   单连接的 rustls 回显服务线程，不访问外部网络；
//! - **What**：断言失败即 panic；握手失败用例同时验证句柄仍可安全销毁。

use std::io::{Read as _, Write as _};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig, ServerConnection};

use flint_transport::{ConnectStatus, Transport, TransportError, TransportHandle};
use flint_transport_tls::{install_global_ca_store, RustlsEngine, TlsTransport};

const STEP_BUDGET: usize = 500;

struct TestPki {
    cert_der: CertificateDer<'static>,
    cert_pem: String,
    key_der: PrivatePkcs8KeyDer<'static>,
}

fn test_pki() -> TestPki {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("生成自签证书失败");
    TestPki {
        cert_der: certified.cert.der().clone(),
        cert_pem: certified.cert.pem(),
        key_der: PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()),
    }
}

fn server_config(pki: &TestPki) -> Arc<ServerConfig> {
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(
            vec![pki.cert_der.clone()],
            PrivateKeyDer::Pkcs8(pki.key_der.clone_key()),
        )
        .expect("服务端证书配置失败");
    Arc::new(config)
}

/// 单连接回显服务：握手后读一段明文并原样写回；任何失败都静默结束线程，
/// 由客户端断言承担判定职责。
fn spawn_echo_server(config: Arc<ServerConfig>) -> (u16, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("localhost:0").expect("绑定回环监听失败");
    let port = listener.local_addr().expect("读取监听地址失败").port();
    let handle = thread::spawn(move || {
        let Ok((mut tcp, _)) = listener.accept() else {
            return;
        };
        let Ok(mut conn) = ServerConnection::new(config) else {
            return;
        };
        let mut tls = rustls::Stream::new(&mut conn, &mut tcp);
        let mut buf = [0u8; 128];
        if let Ok(read) = tls.read(&mut buf) {
            if read > 0 {
                let _ = tls.write_all(&buf[..read]);
            }
        }
    });
    (port, handle)
}

/// 阻塞建连 + 加密回显往返：引擎恰好分配一次，成功返回 `Ok(())`。
#[test]
fn blocking_connect_and_echo() {
    let pki = test_pki();
    let (port, server) = spawn_echo_server(server_config(&pki));

    let mut handle = TransportHandle::new(TlsTransport::<RustlsEngine>::new());
    handle.backend_mut().set_ca_cert(pki.cert_pem.into_bytes());
    handle
        .connect("localhost", port, Duration::from_secs(10))
        .expect("阻塞 TLS 建连失败");

    let payload = b"hello over tls";
    let written = handle
        .write(payload, Duration::from_secs(5))
        .expect("加密写失败");
    assert_eq!(written, payload.len());

    let mut buf = [0u8; 64];
    let read = handle
        .read(&mut buf, Duration::from_secs(5))
        .expect("加密读失败");
    assert_eq!(&buf[..read], payload);

    handle.close().expect("关闭失败");
    server.join().expect("服务端线程异常");
}

/// 增量建连：反复驱动 `connect_step` 直到握手完成，再做一次回显。
#[test]
fn incremental_connect_and_echo() {
    let pki = test_pki();
    let (port, server) = spawn_echo_server(server_config(&pki));

    let mut transport = TlsTransport::<RustlsEngine>::new();
    transport.set_ca_cert(pki.cert_pem.into_bytes());

    let mut steps = 0usize;
    loop {
        match transport
            .connect_step("localhost", port, Duration::from_millis(50))
            .expect("connect_step 失败")
        {
            ConnectStatus::Ready => break,
            ConnectStatus::InProgress => {
                steps += 1;
                assert!(steps < STEP_BUDGET, "握手步数超出预算");
                // 外部事件循环的最小替身：稍候重试。
                thread::sleep(Duration::from_millis(2));
            }
        }
    }

    let payload = b"incremental tls";
    transport
        .write(payload, Duration::from_secs(5))
        .expect("加密写失败");
    let mut buf = [0u8; 64];
    let read = transport
        .read(&mut buf, Duration::from_secs(5))
        .expect("加密读失败");
    assert_eq!(&buf[..read], payload);

    transport.close().expect("关闭失败");
    server.join().expect("服务端线程异常");
}

/// 全局 CA 存储：安装一次后，启用它的句柄无需逐个携带证书材料。
#[test]
fn global_ca_store_supplies_trust_anchor() {
    let pki = test_pki();
    let (port, server) = spawn_echo_server(server_config(&pki));

    let mut roots = RootCertStore::empty();
    roots.add(pki.cert_der.clone()).expect("信任锚安装失败");
    install_global_ca_store(roots);

    let mut transport = TlsTransport::<RustlsEngine>::new();
    transport.enable_global_ca_store();
    transport
        .connect("localhost", port, Duration::from_secs(10))
        .expect("基于全局 CA 存储的建连失败");

    transport
        .write(b"trusted", Duration::from_secs(5))
        .expect("加密写失败");
    let mut buf = [0u8; 32];
    let read = transport
        .read(&mut buf, Duration::from_secs(5))
        .expect("加密读失败");
    assert_eq!(&buf[..read], b"trusted");

    transport.close().expect("关闭失败");
    server.join().expect("服务端线程异常");
}

/// 未配置信任锚时握手失败：错误归类为建连失败，句柄保持可销毁。
#[test]
fn handshake_without_trust_anchor_fails_cleanly() {
    let pki = test_pki();
    let (port, server) = spawn_echo_server(server_config(&pki));

    let mut transport = TlsTransport::<RustlsEngine>::new();
    match transport.connect("localhost", port, Duration::from_secs(10)) {
        Err(TransportError::Connect(err)) => {
            assert!(err.to_string().contains("localhost"), "错误应携带目标主机: {err}");
        }
        other => panic!("期望握手失败，实际为 {other:?}"),
    }
    transport.close().expect("失败后的 close 应为无操作");
    drop(transport);
    let _ = server.join();
}

//! Adapter throughput benchmarks.
//!
//! Run with: cargo bench
//!
//! No criterion dependency, matching the pack's own manual-timing bench
//! harness (`harness = false`, a plain `fn main()`, `std::hint::black_box`).

use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tls_adapter::buffer::ScratchBuffer;
use tls_adapter::{Engine, RustlsEngine};

macro_rules! bench {
    ($name:expr, $iterations:expr, $code:block) => {{
        let start = Instant::now();
        for _ in 0..$iterations {
            black_box($code);
        }
        let elapsed = start.elapsed();
        println!(
            "{}: {} iterations in {:?} ({:?}/iter, {:.0} ops/sec)",
            $name,
            $iterations,
            elapsed,
            elapsed / $iterations,
            $iterations as f64 / elapsed.as_secs_f64()
        );
    }};
}

/// Self-signed server config plus a client config that trusts only that
/// cert, mirroring the pack's loopback TLS test helper.
fn loopback_configs() -> (Arc<ServerConfig>, Arc<ClientConfig>) {
    let certified_key = rcgen::generate_simple_self_signed(vec!["example.test".to_string()]).unwrap();
    let cert_der = rustls_pki_types::CertificateDer::from(certified_key.cert.der().to_vec());
    let key_der =
        rustls_pki_types::PrivateKeyDer::try_from(certified_key.key_pair.serialize_der()).unwrap();

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(cert_der).unwrap();
    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    (Arc::new(server_config), Arc::new(client_config))
}

fn main() {
    println!("==============================================");
    println!("  tls-adapter benchmarks");
    println!("==============================================\n");

    bench!("ScratchBuffer::with_capacity(16KiB)", 100_000, {
        ScratchBuffer::with_capacity(RustlsEngine::DEFAULT_PACKET_SIZE)
    });

    {
        let mut buf = ScratchBuffer::with_capacity(64);
        bench!("ScratchBuffer::grow()", 20, { buf.grow() });
    }

    let (server_config, client_config) = loopback_configs();
    bench!("RustlsEngine::server() construction", 1_000, {
        RustlsEngine::server(server_config.clone()).unwrap()
    });

    bench!("RustlsEngine::client() construction", 1_000, {
        RustlsEngine::client(client_config.clone(), Some("example.test")).unwrap()
    });

    // End-to-end in-process handshake throughput: drive two engines directly
    // against each other's wrap() output, bypassing Connection's queueing so
    // this measures the underlying engine cost alone.
    bench!("in-process client<->server handshake", 200, {
        let mut client = RustlsEngine::client(client_config.clone(), Some("example.test")).unwrap();
        let mut server = RustlsEngine::server(server_config.clone()).unwrap();
        let mut a = ScratchBuffer::with_capacity(RustlsEngine::DEFAULT_PACKET_SIZE);
        let mut b = ScratchBuffer::with_capacity(RustlsEngine::DEFAULT_PACKET_SIZE);

        for _ in 0..8 {
            let cr = client.wrap(&[], &mut a).unwrap();
            if cr.bytes_produced > 0 {
                server.unwrap(&a.take_filled(), &mut b).unwrap();
            }
            let sr = server.wrap(&[], &mut b).unwrap();
            if sr.bytes_produced > 0 {
                client.unwrap(&b.take_filled(), &mut a).unwrap();
            }
        }
    });

    println!("\nBenchmarks complete.");
}

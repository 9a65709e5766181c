//! Peer-certificate verification, run once per handshake completion.
//!
//! `rustls` already builds and checks the trust chain internally whenever a
//! `ClientCertVerifier`/`ServerCertVerifier` is wired into the engine's
//! config; this module re-runs that same check manually against the
//! negotiated session so the result can be stored as *data* in
//! `verify_error` instead of aborting the handshake, per the spec's policy
//! model (reject-or-allow is an upstream decision, not an engine one).

use std::sync::Arc;
use std::time::SystemTime;

use rustls::client::WebPkiServerVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use rustls_pki_types::{ServerName, UnixTime};

use crate::engine::{PeerCertificates, Role, SessionInfo};
use crate::error::VerifyError;

/// Maps a negotiated cipher-suite name to the legacy key-exchange/auth
/// algorithm name used by classic trust-manager APIs. Retained for
/// diagnostic parity (see DESIGN.md); `rustls`'s webpki verifiers already
/// perform algorithm-correct signature checks regardless of this value.
pub fn algorithm_for_cipher_suite(cipher_suite: &str) -> &'static str {
    const TABLE: &[(&str, &str)] = &[
        ("TLS_ECDHE_ECDSA", "ECDHE_ECDSA"),
        ("TLS_ECDHE_RSA", "ECDHE_RSA"),
        ("TLS_ECDH_ECDSA", "ECDH_ECDSA"),
        ("TLS_DHE_DSS", "DHE_DSS"),
        ("TLS_DHE_RSA", "DHE_RSA"),
        ("TLS_ECDH_RSA", "ECDH_RSA"),
        ("SSL_RSA_EXPORT", "RSA_EXPORT"),
        ("TLS_RSA", "RSA"),
        ("SSL_RSA", "RSA"),
    ];
    for (prefix, algo) in TABLE {
        if cipher_suite.starts_with(prefix) {
            return algo;
        }
    }
    "UNKNOWN"
}

/// Runs the §4.7 verification algorithm against a completed handshake.
/// Returns `Ok(())` when verification either succeeds or is intentionally
/// suppressed (anonymous server-mode cipher without `request_cert`), and
/// `Err(VerifyError)` in every other failure case.
pub fn verify_peer(
    role: Role,
    session: &SessionInfo,
    trust_store: Option<&Arc<RootCertStore>>,
    server_name: Option<&str>,
    request_cert: bool,
) -> Result<(), VerifyError> {
    let chain = match &session.peer_certificates {
        PeerCertificates::Unverified => {
            let must_verify = matches!(role, Role::Client) || request_cert;
            return if must_verify {
                Err(VerifyError::Unverified)
            } else {
                Ok(())
            };
        }
        PeerCertificates::Presented(chain) => chain,
    };

    if chain.is_empty() {
        return Err(VerifyError::NoCertificates);
    }

    let Some(trust_store) = trust_store else {
        return Err(VerifyError::NoTrustedCas);
    };

    let algorithm = session
        .cipher_suite
        .as_deref()
        .map(algorithm_for_cipher_suite)
        .unwrap_or("UNKNOWN");

    let now = UnixTime::since_unix_epoch(
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default(),
    );
    let end_entity = &chain[0];
    let intermediates = &chain[1..];

    match role {
        Role::Server => {
            let verifier = WebPkiClientVerifier::builder(trust_store.clone())
                .build()
                .map_err(|e| VerifyError::Rejected(format!("[{algorithm}] verifier init: {e}")))?;
            verifier
                .verify_client_cert(end_entity, intermediates, now)
                .map(|_| ())
                .map_err(|e| VerifyError::Rejected(format!("[{algorithm}] {e}")))
        }
        Role::Client => {
            let verifier = WebPkiServerVerifier::builder(trust_store.clone())
                .build()
                .map_err(|e| VerifyError::Rejected(format!("[{algorithm}] verifier init: {e}")))?;
            let name: ServerName<'static> = server_name
                .unwrap_or_default()
                .to_string()
                .try_into()
                .map_err(|_| VerifyError::Rejected(format!("[{algorithm}] invalid server name")))?;
            verifier
                .verify_server_cert(end_entity, intermediates, &name, &[], now)
                .map(|_| ())
                .map_err(|e| VerifyError::Rejected(format!("[{algorithm}] {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_prefixes() {
        assert_eq!(algorithm_for_cipher_suite("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"), "ECDHE_ECDSA");
        assert_eq!(algorithm_for_cipher_suite("TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256"), "ECDHE_RSA");
        assert_eq!(algorithm_for_cipher_suite("TLS_DHE_RSA_WITH_AES_256_CBC_SHA"), "DHE_RSA");
        assert_eq!(algorithm_for_cipher_suite("SSL_RSA_EXPORT_WITH_RC4_40_MD5"), "RSA_EXPORT");
        assert_eq!(algorithm_for_cipher_suite("TLS_RSA_WITH_AES_128_CBC_SHA"), "RSA");
    }

    #[test]
    fn unknown_prefix_falls_back() {
        assert_eq!(algorithm_for_cipher_suite("TLS13_AES_128_GCM_SHA256"), "UNKNOWN");
        assert_eq!(algorithm_for_cipher_suite("SOMETHING_ELSE"), "UNKNOWN");
    }

    #[test]
    fn unverified_server_role_without_request_cert_is_suppressed() {
        let session = SessionInfo {
            peer_certificates: PeerCertificates::Unverified,
            cipher_suite: None,
            protocol: None,
        };
        assert_eq!(verify_peer(Role::Server, &session, None, None, false), Ok(()));
    }

    #[test]
    fn unverified_client_role_is_an_error() {
        let session = SessionInfo {
            peer_certificates: PeerCertificates::Unverified,
            cipher_suite: None,
            protocol: None,
        };
        assert_eq!(verify_peer(Role::Client, &session, None, Some("example.test"), false), Err(VerifyError::Unverified));
    }

    #[test]
    fn empty_chain_is_an_error() {
        let session = SessionInfo {
            peer_certificates: PeerCertificates::Presented(Vec::new()),
            cipher_suite: None,
            protocol: None,
        };
        assert_eq!(verify_peer(Role::Server, &session, None, None, true), Err(VerifyError::NoCertificates));
    }

    #[test]
    fn no_trust_store_is_an_error() {
        use rustls_pki_types::CertificateDer;
        let session = SessionInfo {
            peer_certificates: PeerCertificates::Presented(vec![CertificateDer::from(vec![0u8; 4])]),
            cipher_suite: None,
            protocol: None,
        };
        assert_eq!(verify_peer(Role::Server, &session, None, None, true), Err(VerifyError::NoTrustedCas));
    }
}

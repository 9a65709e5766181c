//! Engine construction knobs.
//!
//! Generalizes the performance-oriented `TlsClientConfig`/`TlsServerConfig`
//! pair from the pack's async TLS stream wrapper (ALPN negotiation, session
//! ticket counts, session-cache size, TLS 1.2 resumption mode) into a single
//! config struct shared by both roles. Certificate/key/trust-store loading
//! from disk itself stays an external collaborator per the spec; this only
//! covers the ambient performance knobs of building the underlying `rustls`
//! configs, plus a default (embedded, not disk-loaded) trust store.

use std::sync::Arc;

use rustls::client::Resumption;
use rustls::server::{NoServerSessionStorage, ServerSessionMemoryCache};
use rustls::{ClientConfig, RootCertStore, ServerConfig};

/// ALPN protocol identifiers, in preference order.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub alpn_protocols: Vec<Vec<u8>>,
    /// Size of the server-side session cache (`ServerSessionMemoryCache`).
    pub session_cache_size: usize,
    /// Number of TLS 1.3 session tickets a server sends per connection.
    pub send_tls13_tickets: usize,
    /// Whether a TLS 1.2 session may be resumed by session id or ticket.
    pub tls12_resumption: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpn_protocols: Vec::new(),
            session_cache_size: 256,
            send_tls13_tickets: 2,
            tls12_resumption: true,
        }
    }
}

impl EngineConfig {
    /// Applies the ALPN and resumption knobs to an already-built client
    /// config, mirroring the teacher's `TlsClientConfig::apply` step.
    pub fn apply_to_client(&self, config: &mut ClientConfig) {
        config.alpn_protocols = self.alpn_protocols.clone();
        config.resumption = if self.tls12_resumption {
            Resumption::in_memory_sessions(self.session_cache_size)
        } else {
            Resumption::disabled()
        };
    }

    /// Applies the ALPN, ticket-count, and session-cache knobs to an
    /// already-built server config.
    pub fn apply_to_server(&self, config: &mut ServerConfig) {
        config.alpn_protocols = self.alpn_protocols.clone();
        config.send_tls13_tickets = self.send_tls13_tickets;
        config.session_storage = if self.tls12_resumption {
            ServerSessionMemoryCache::new(self.session_cache_size)
        } else {
            Arc::new(NoServerSessionStorage {})
        };
    }
}

/// A trust store seeded from the Mozilla root program embedded in
/// `webpki-roots`, for callers with no bespoke CA of their own. Disk-based
/// trust-store loading remains an external collaborator per the spec.
pub fn default_trust_store() -> Arc<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_trust_store_is_nonempty() {
        assert!(default_trust_store().roots.len() > 0);
    }

    #[test]
    fn apply_to_client_sets_alpn_and_resumption() {
        let cfg = EngineConfig {
            alpn_protocols: vec![b"h2".to_vec()],
            tls12_resumption: false,
            ..EngineConfig::default()
        };
        let mut client = ClientConfig::builder()
            .with_root_certificates(RootCertStore::empty())
            .with_no_client_auth();
        cfg.apply_to_client(&mut client);
        assert_eq!(client.alpn_protocols, vec![b"h2".to_vec()]);
    }
}

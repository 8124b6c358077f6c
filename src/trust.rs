//! Trust store for broker certificate verification
//!
//! Holds the CA certificates (PEM) used to authenticate the broker during the
//! TLS handshake. Loaded once before the first session start and read-only
//! afterwards; the session layer shares it through an `Arc`.

use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// A single CA certificate, kept as DER for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    der: Vec<u8>,
}

impl TrustAnchor {
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

/// Immutable set of trust anchors plus the PEM bundle they came from
#[derive(Debug, Clone)]
pub struct TrustStore {
    anchors: Vec<TrustAnchor>,
    pem: Vec<u8>,
}

impl TrustStore {
    /// Parse every `CERTIFICATE` block from a PEM bundle
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Result<Self, TrustError> {
        let pem = pem.into();
        let mut reader = BufReader::new(pem.as_slice());

        let anchors = rustls_pemfile::certs(&mut reader)
            .map(|cert| {
                cert.map(|der| TrustAnchor {
                    der: der.as_ref().to_vec(),
                })
                .map_err(TrustError::MalformedPem)
            })
            .collect::<Result<Vec<_>, _>>()?;

        if anchors.is_empty() {
            return Err(TrustError::NoCertificates);
        }

        debug!(count = anchors.len(), "Parsed trust anchors");
        Ok(Self { anchors, pem })
    }

    /// Read a PEM bundle from disk
    pub fn load(path: &Path) -> Result<Self, TrustError> {
        let pem = std::fs::read(path).map_err(|source| TrustError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let store = Self::from_pem(pem)?;
        info!(
            path = %path.display(),
            anchors = store.len(),
            "Loaded trust store"
        );
        Ok(store)
    }

    pub fn anchors(&self) -> &[TrustAnchor] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Original PEM bundle, as handed to the TLS layer
    pub fn pem_bundle(&self) -> &[u8] {
        &self.pem
    }
}

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("Failed to read trust store {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed PEM data: {0}")]
    MalformedPem(#[source] std::io::Error),
    #[error("No CERTIFICATE blocks found in trust store")]
    NoCertificates,
}

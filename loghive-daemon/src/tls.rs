//! TCP 수집기의 상호 TLS 설정
//!
//! 서버 인증서와 키에서 `TlsAcceptor`를 만듭니다. 클라이언트 인증서는
//! 서버 인증서와 같은 CA 체인으로 검증합니다 (클라이언트 인증 필수).

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;
use tracing::info;

/// 인증서/키 PEM 파일에서 상호 TLS acceptor를 만듭니다.
pub fn build_acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    if certs.is_empty() {
        bail!("no certificates found in '{cert_path}'");
    }
    let key = load_key(key_path)?;

    // 클라이언트 검증 루트는 서버 인증서 체인과 동일
    let mut roots = RootCertStore::empty();
    for cert in &certs {
        roots
            .add(cert.clone())
            .with_context(|| format!("invalid certificate in '{cert_path}'"))?;
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .context("failed to build client certificate verifier")?;

    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .context("invalid certificate/key pair")?;

    info!(cert = %cert_path, "mutual TLS configured");
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("cannot open certificate '{path}'"))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("cannot parse certificates from '{path}'"))
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("cannot open private key '{path}'"))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("cannot parse private key from '{path}'"))?
        .with_context(|| format!("no private key found in '{path}'"))
}

use anyhow::{Context, Result};
use rcgen::generate_simple_self_signed;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls;

/// WebSocket 升级只能走 HTTP/1.1
const WEBSOCKET_ALPN: &[u8] = b"http/1.1";

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open cert file: {:?}", path))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse certificates in {:?}", path))
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("Failed to open key file: {:?}", path))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .context("Failed to parse private key")?
        .context("No private key found")
}

/// 加载客户端 TLS 配置
///
/// 优先使用 `ca_cert_path` 中的 CA；否则加载系统证书。`skip_verify` 仅用于测试。
pub fn load_client_config(
    ca_cert_path: Option<&Path>,
    skip_verify: bool,
) -> Result<Arc<rustls::ClientConfig>> {
    let mut root_store = rustls::RootCertStore::empty();

    if let Some(ca_path) = ca_cert_path {
        for cert in read_certs(ca_path)? {
            root_store
                .add(cert)
                .context("Failed to add CA certificate")?;
        }
    } else if !skip_verify {
        let native_certs = rustls_native_certs::load_native_certs();
        for cert in native_certs.certs {
            root_store.add(cert).ok();
        }
        if root_store.is_empty() {
            anyhow::bail!("No system CA certificates found; set tls.ca_cert_path");
        }
    }

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if skip_verify {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertificateVerification));
    }

    config.alpn_protocols = vec![WEBSOCKET_ALPN.to_vec()];

    Ok(Arc::new(config))
}

/// 加载服务器 TLS 配置（用于本地测试服务器）
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<rustls::ServerConfig>> {
    let certs = read_certs(cert_path)?;
    let key = read_private_key(key_path)?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Failed to create server config")?;
    config.alpn_protocols = vec![WEBSOCKET_ALPN.to_vec()];

    Ok(Arc::new(config))
}

/// 生成自签名证书和私钥并写入指定路径
pub fn generate_self_signed_cert(
    common_name: &str,
    alt_names: &[String],
    cert_out: &Path,
    key_out: &Path,
) -> Result<()> {
    let mut names: Vec<String> = alt_names.to_vec();
    if !names.iter().any(|n| n == common_name) {
        names.push(common_name.to_string());
    }

    let cert =
        generate_simple_self_signed(names).context("Failed to generate self-signed certificate")?;

    std::fs::write(cert_out, cert.cert.pem())
        .with_context(|| format!("Failed to write certificate to {:?}", cert_out))?;
    std::fs::write(key_out, cert.signing_key.serialize_pem())
        .with_context(|| format!("Failed to write private key to {:?}", key_out))?;

    Ok(())
}

/// 不验证证书的验证器（仅用于测试）
#[derive(Debug)]
struct NoCertificateVerification;

impl rustls::client::danger::ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer,
        _intermediates: &[CertificateDer],
        _server_name: &rustls::pki_types::ServerName,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::CryptoProvider::get_default()
            .map(|provider| {
                provider
                    .signature_verification_algorithms
                    .supported_schemes()
            })
            .unwrap_or_else(|| {
                vec![
                    rustls::SignatureScheme::RSA_PKCS1_SHA256,
                    rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
                    rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
                    rustls::SignatureScheme::ED25519,
                    rustls::SignatureScheme::RSA_PSS_SHA256,
                ]
            })
    }
}

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::parse_x509_certificate;

/// TLS 客户端上下文：根证书集合与据此构建的 `rustls` 配置。
///
/// # 教案式说明
///
/// ## 意图（Why）
/// - 将 "信任哪些根证书" 从会话逻辑中剥离成独立的可注入配置，生产路径
///   使用公开信任锚，测试路径注入自签名证书，互不感染；
/// - 缓存信任锚数量，供握手日志向运维展示当前信任面的规模。
///
/// ## 契约（What）
/// - [`with_webpki_roots`](TlsContext::with_webpki_roots)（亦为
///   `Default`）：装载 `webpki-roots` 打包的公开信任锚；
/// - [`from_root_store`](TlsContext::from_root_store)：使用调用方组装
///   好的 [`RootCertStore`]，适合自签名或私有 CA 场景；
/// - 生成的配置不启用客户端证书，证书链校验始终开启——对端证书巡检
///   仅是观测钩子，从不放宽校验。
///
/// ## 风险与权衡（Trade-offs）
/// - 配置在构造时即完整建立并以 `Arc` 共享，克隆零成本；代价是即使
///   会话最终未启用 TLS，信任锚也已装载，属于可接受的常数开销。
#[derive(Clone, Debug)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
    anchors: usize,
}

impl TlsContext {
    /// 装载 `webpki-roots` 公开信任锚。
    pub fn with_webpki_roots() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::from_root_store(roots)
    }

    /// 使用调用方组装好的根证书集合。
    pub fn from_root_store(roots: RootCertStore) -> Self {
        let anchors = roots.roots.len();
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            config: Arc::new(config),
            anchors,
        }
    }

    /// 当前装载的信任锚数量。
    pub fn trust_anchor_count(&self) -> usize {
        self.anchors
    }

    pub(crate) fn connector(&self) -> TlsConnector {
        TlsConnector::from(Arc::clone(&self.config))
    }
}

impl Default for TlsContext {
    fn default() -> Self {
        Self::with_webpki_roots()
    }
}

/// 逐张记录对端出示的证书链，供运维巡检。
///
/// - **契约 (What)**：仅观测，不参与任何校验决策；单张证书解析失败
///   记为告警后继续处理下一张，绝不使握手由成功转为失败。
pub(crate) fn log_peer_chain(stream: &tokio_rustls::client::TlsStream<TcpStream>) {
    let (_, connection) = stream.get_ref();
    let Some(chain) = connection.peer_certificates() else {
        tracing::warn!("握手已完成但未取得对端证书链");
        return;
    };
    tracing::info!(certificates = chain.len(), "开始巡检对端证书链");
    for (index, certificate) in chain.iter().enumerate() {
        match parse_x509_certificate(certificate.as_ref()) {
            Ok((_, parsed)) => tracing::info!(
                index = index + 1,
                subject = %parsed.subject(),
                issuer = %parsed.issuer(),
                "对端证书"
            ),
            Err(err) => tracing::warn!(
                index = index + 1,
                error = %err,
                "对端证书无法解析，跳过巡检"
            ),
        }
    }
}

use std::io;

use pulse_core::{EndpointDescriptor, Transaction};
use rustls_pki_types::ServerName;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::error::{ExecError, SessionError};
use crate::executor::TransactionExecutor;
use crate::tls::{self, TlsContext};

/// 传输会话：独占持有一条连接的原始句柄与升级后的加密句柄。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 流句柄的生命周期是本引擎最容易出错的环节，全部收敛到一个类型里：
///   建连写入原始句柄，升级将原始句柄的所有权移交给加密流，拆线清空
///   两者；
/// - 句柄对外不可见（`pub(crate)` 边界），执行器按次借用，调用方只能
///   通过状态查询方法观察会话。
///
/// ## 契约 (What)
/// - `connect`：成功后原始句柄为 `Some`；
/// - `upgrade`：TLS 关闭时为无操作；开启时握手成功后加密句柄为 `Some`
///   且原始句柄为 `None`（所有权已移交）；
/// - `shutdown`：幂等，两个句柄最终都为 `None`，关闭失败只记日志；
/// - 加密句柄在握手成功之前恒为 `None`。
///
/// ## 注意事项 (Trade-offs)
/// - 会话不做重连：任何失败后的唯一出路是拆线，这与 "探测一次、如实
///   汇报" 的用途一致。
#[derive(Debug)]
pub struct TransportSession {
    descriptor: EndpointDescriptor,
    tls: TlsContext,
    raw: Option<TcpStream>,
    secured: Option<TlsStream<TcpStream>>,
}

impl TransportSession {
    /// 以描述符与 TLS 上下文创建尚未建连的会话。
    pub fn new(descriptor: EndpointDescriptor, tls: TlsContext) -> Self {
        Self {
            descriptor,
            tls,
            raw: None,
            secured: None,
        }
    }

    /// 会话绑定的端点描述符。
    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    /// 是否持有任一打开的流句柄。
    pub fn is_connected(&self) -> bool {
        self.raw.is_some() || self.secured.is_some()
    }

    /// 是否已完成 TLS 升级。
    pub fn is_secured(&self) -> bool {
        self.secured.is_some()
    }

    /// 建立到 `host:port` 的 TCP 连接（主机名经 Tokio 解析）。
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        let authority = self.descriptor.authority();
        tracing::info!(authority = %authority, "开始建立 TCP 连接");
        match TcpStream::connect((self.descriptor.host(), self.descriptor.port())).await {
            Ok(stream) => {
                tracing::info!(authority = %authority, "TCP 连接已建立");
                self.raw = Some(stream);
                Ok(())
            }
            Err(source) => {
                tracing::error!(authority = %authority, error = %source, "TCP 连接失败");
                Err(SessionError::Connect { authority, source })
            }
        }
    }

    /// 在已建立的连接上执行 TLS 握手；TLS 关闭时为无操作。
    ///
    /// # 教案式注释
    /// - **执行 (How)**：以端点主机名为待校验身份构造 `ServerName`，
    ///   将原始句柄的所有权交给 `tokio-rustls` 完成握手；成功后巡检
    ///   对端证书链并记录主体/签发者文本；
    /// - **契约 (What)**：握手失败（含证书链被拒）返回
    ///   [`SessionError::Handshake`]；证书巡检仅观测，永不改变结果。
    pub async fn upgrade(&mut self) -> Result<(), SessionError> {
        if !self.descriptor.use_tls() {
            return Ok(());
        }
        let host = self.descriptor.host().to_string();

        let server_name = ServerName::try_from(host.clone()).map_err(|err| {
            SessionError::Handshake {
                host: host.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, err),
            }
        })?;
        let Some(stream) = self.raw.take() else {
            return Err(SessionError::Handshake {
                host,
                source: io::Error::new(io::ErrorKind::NotConnected, "no open connection to upgrade"),
            });
        };

        tracing::info!(
            host = %host,
            trust_anchors = self.tls.trust_anchor_count(),
            "开始 TLS 握手"
        );
        match self.tls.connector().connect(server_name, stream).await {
            Ok(tls_stream) => {
                tracing::info!(host = %host, "TLS 握手完成");
                tls::log_peer_chain(&tls_stream);
                self.secured = Some(tls_stream);
                Ok(())
            }
            Err(source) => {
                tracing::error!(host = %host, error = %source, "TLS 握手失败");
                Err(SessionError::Handshake { host, source })
            }
        }
    }

    /// 幂等拆线：先加密句柄后原始句柄，关闭失败只记日志不上抛。
    pub async fn shutdown(&mut self) {
        if let Some(mut stream) = self.secured.take() {
            tracing::info!(host = %self.descriptor.host(), "关闭 TLS 连接");
            if let Err(err) = stream.shutdown().await {
                tracing::warn!(error = %err, "关闭 TLS 连接时出错");
            }
        }
        if let Some(mut stream) = self.raw.take() {
            tracing::info!(authority = %self.descriptor.authority(), "关闭 TCP 连接");
            if let Err(err) = stream.shutdown().await {
                tracing::warn!(error = %err, "关闭 TCP 连接时出错");
            }
        }
    }

    /// 在当前活跃的流上执行一条事务：升级后走加密流，否则走原始流。
    pub(crate) async fn run_transaction(
        &mut self,
        executor: &TransactionExecutor,
        transaction: &Transaction,
    ) -> Result<(), ExecError> {
        if let Some(stream) = self.secured.as_mut() {
            executor.execute(stream, transaction).await
        } else if let Some(stream) = self.raw.as_mut() {
            executor.execute(stream, transaction).await
        } else {
            Err(ExecError::Send(io::Error::new(
                io::ErrorKind::NotConnected,
                "session has no open stream",
            )))
        }
    }
}

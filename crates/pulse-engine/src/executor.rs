use std::io;

use bytes::BytesMut;
use pulse_core::{MatchPolicy, Transaction};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ExecError;

/// 接收缓冲区的默认下限，同时用于容忍超出期望长度的响应。
pub const DEFAULT_RECV_BUFFER_BYTES: usize = 1024 * 1024;

/// 事务执行器：对借入的流执行一次 "发送-接收-核对"。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 把单条事务的收发与核对从管线编排中剥离出来，使其可以在任意实现
///   `AsyncRead + AsyncWrite` 的流上独立测试；
/// - 精确区分 "字节数对不上" 与 "底层 IO 报错"：前者意味着对端行为与
///   脚本预期不符，是探测的有效结论而非环境故障。
///
/// ## 逻辑 (How)
/// - **发送阶段**（请求为空时整体跳过）：循环写出请求切片，零长度写入
///   或流关闭类错误终止循环；未写满判短写；写满后刷新，刷新时的流关闭
///   按显式分支分类（见 [`execute`](TransactionExecutor::execute)）；
/// - **接收阶段**（期望响应为空时整体跳过）：按
///   `max(期望长度, 缓冲下限)` 分配缓冲并执行恰好一次读取，字节数不足
///   判短读，足额后按配置的 [`MatchPolicy`] 核对。
///
/// ## 契约 (What)
/// - 执行器对流只借用不持有，单次调用结束后不保留任何连接状态；
/// - 每个阶段都记录字节数与 ASCII 转义后的原始载荷，供诊断回放。
///
/// ## 注意事项 (Trade-offs)
/// - 接收只读一次：跨多个分段到达的响应会被判短读，需要聚合语义的
///   调用方应在脚本侧拆分事务。
#[derive(Clone, Debug)]
pub struct TransactionExecutor {
    policy: MatchPolicy,
    recv_floor: usize,
}

impl TransactionExecutor {
    /// 以指定匹配策略与默认接收缓冲下限构造执行器。
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            recv_floor: DEFAULT_RECV_BUFFER_BYTES,
        }
    }

    /// 覆盖接收缓冲下限（期望响应更长时仍按期望长度分配）。
    pub fn with_recv_floor(mut self, bytes: usize) -> Self {
        self.recv_floor = bytes;
        self
    }

    /// 当前配置的响应匹配策略。
    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// 对借入的流执行一条事务。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：请求为空只收不发，响应为空只发不收；
    /// - **边界 (Gotchas)**：请求写满后若流已关闭且期望响应为空，按
    ///   成功处理——对端完整收下请求后立即关闭是合法的收尾方式；期望
    ///   响应非空时同样的关闭则记作零字节短读。
    pub async fn execute<S>(&self, stream: &mut S, transaction: &Transaction) -> Result<(), ExecError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.send_request(stream, transaction).await?;
        self.receive_response(stream, transaction).await
    }

    async fn send_request<S>(&self, stream: &mut S, transaction: &Transaction) -> Result<(), ExecError>
    where
        S: AsyncWrite + Unpin,
    {
        let request = transaction.request();
        if request.is_empty() {
            return Ok(());
        }
        let expected = request.len();
        tracing::debug!(bytes = expected, payload = %escape_bytes(request), "发送请求");

        let mut sent = 0usize;
        let mut closed = false;
        while sent < expected {
            match stream.write(&request[sent..]).await {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(written) => sent += written,
                Err(err) if stream_closed(&err) => {
                    closed = true;
                    break;
                }
                Err(err) => return Err(ExecError::Send(err)),
            }
        }
        if !closed {
            match stream.flush().await {
                Ok(()) => {}
                Err(err) if stream_closed(&err) => closed = true,
                Err(err) => return Err(ExecError::Send(err)),
            }
        }
        tracing::debug!(sent, expected, "请求阶段结束");

        if sent < expected {
            return Err(ExecError::ShortWrite { sent, expected });
        }
        if closed {
            let awaiting = transaction.response().len();
            if awaiting > 0 {
                // 请求已完整写出，但流在响应到达前关闭。
                return Err(ExecError::ShortRead {
                    received: 0,
                    expected: awaiting,
                });
            }
            // 无响应可等：对端收完请求立即关闭，按成功处理。
            tracing::debug!("对端在完整接收请求后关闭连接");
        }
        Ok(())
    }

    async fn receive_response<S>(
        &self,
        stream: &mut S,
        transaction: &Transaction,
    ) -> Result<(), ExecError>
    where
        S: AsyncRead + Unpin,
    {
        let expected = transaction.response();
        if expected.is_empty() {
            return Ok(());
        }
        let capacity = expected.len().max(self.recv_floor);
        let mut buffer = BytesMut::zeroed(capacity);
        tracing::debug!(capacity, expected = expected.len(), "等待响应");

        let received = stream.read(&mut buffer).await.map_err(ExecError::Receive)?;
        buffer.truncate(received);
        tracing::debug!(
            received,
            expected = expected.len(),
            payload = %escape_bytes(&buffer),
            "收到响应"
        );

        if received < expected.len() {
            return Err(ExecError::ShortRead {
                received,
                expected: expected.len(),
            });
        }
        if !self.policy.matches(expected, &buffer) {
            return Err(ExecError::ResponseMismatch {
                expected: escape_bytes(expected),
                received: escape_bytes(&buffer),
            });
        }
        Ok(())
    }
}

impl Default for TransactionExecutor {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}

/// 判断 IO 错误是否属于 "流已关闭" 一类。
fn stream_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
    )
}

/// 将载荷转义为可安全写入日志的 ASCII 文本。
fn escape_bytes(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn transaction(request: &str, response: &str) -> Transaction {
        Transaction::new(request, response).expect("测试事务应合法")
    }

    /// 单元测试使用小缓冲下限，避免每条用例分配 1 MiB。
    fn executor(policy: MatchPolicy) -> TransactionExecutor {
        TransactionExecutor::new(policy).with_recv_floor(4096)
    }

    #[tokio::test]
    async fn echo_round_trip_succeeds() {
        let (mut local, mut peer) = duplex(4096);
        let echo = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            peer.read_exact(&mut buf).await.expect("对端读取失败");
            peer.write_all(&buf).await.expect("对端回写失败");
        });

        executor(MatchPolicy::Prefix)
            .execute(&mut local, &transaction("ping", "ping"))
            .await
            .expect("回显事务应成功");
        echo.await.expect("对端任务未正常结束");
    }

    #[tokio::test]
    async fn truncated_response_is_a_short_read() {
        let (mut local, mut peer) = duplex(4096);
        let partial = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            peer.read_exact(&mut buf).await.expect("对端读取失败");
            peer.write_all(b"pin").await.expect("对端写入失败");
        });

        let err = executor(MatchPolicy::Prefix)
            .execute(&mut local, &transaction("ping", "ping"))
            .await
            .expect_err("截断的响应应判失败");
        assert!(matches!(
            err,
            ExecError::ShortRead {
                received: 3,
                expected: 4
            }
        ));
        partial.await.expect("对端任务未正常结束");
    }

    #[tokio::test]
    async fn prefix_policy_tolerates_trailing_bytes() {
        let (mut local, mut peer) = duplex(4096);
        let chatty = tokio::spawn(async move {
            let mut buf = [0u8; 2];
            peer.read_exact(&mut buf).await.expect("对端读取失败");
            peer.write_all(b"OK extra").await.expect("对端写入失败");
        });

        executor(MatchPolicy::Prefix)
            .execute(&mut local, &transaction("go", "OK"))
            .await
            .expect("前缀策略应容忍尾部多余字节");
        chatty.await.expect("对端任务未正常结束");
    }

    #[tokio::test]
    async fn wrong_response_is_a_mismatch() {
        let (mut local, mut peer) = duplex(4096);
        let liar = tokio::spawn(async move {
            let mut buf = [0u8; 2];
            peer.read_exact(&mut buf).await.expect("对端读取失败");
            peer.write_all(b"NO").await.expect("对端写入失败");
        });

        let err = executor(MatchPolicy::Prefix)
            .execute(&mut local, &transaction("go", "OK"))
            .await
            .expect_err("错误响应应判失败");
        assert!(matches!(err, ExecError::ResponseMismatch { .. }));
        liar.await.expect("对端任务未正常结束");
    }

    #[tokio::test]
    async fn exact_policy_rejects_trailing_bytes() {
        let (mut local, mut peer) = duplex(4096);
        let chatty = tokio::spawn(async move {
            let mut buf = [0u8; 2];
            peer.read_exact(&mut buf).await.expect("对端读取失败");
            peer.write_all(b"OK extra").await.expect("对端写入失败");
        });

        let err = executor(MatchPolicy::Exact)
            .execute(&mut local, &transaction("go", "OK"))
            .await
            .expect_err("全等策略应拒绝尾部多余字节");
        assert!(matches!(err, ExecError::ResponseMismatch { .. }));
        chatty.await.expect("对端任务未正常结束");
    }

    #[tokio::test]
    async fn fire_and_forget_tolerates_peer_close() {
        let (mut local, mut peer) = duplex(4096);
        let consumer = tokio::spawn(async move {
            let mut buf = [0u8; 3];
            peer.read_exact(&mut buf).await.expect("对端读取失败");
            // 读完即断开。
        });

        executor(MatchPolicy::Prefix)
            .execute(&mut local, &transaction("bye", ""))
            .await
            .expect("只发不收的事务应容忍对端关闭");
        consumer.await.expect("对端任务未正常结束");
    }

    #[tokio::test]
    async fn receive_only_transaction_skips_send_phase() {
        let (mut local, mut peer) = duplex(4096);
        let announcer = tokio::spawn(async move {
            peer.write_all(b"hello").await.expect("对端写入失败");
        });

        executor(MatchPolicy::Prefix)
            .execute(&mut local, &transaction("", "hello"))
            .await
            .expect("纯接收事务应成功");
        announcer.await.expect("对端任务未正常结束");
    }

    #[tokio::test]
    async fn closed_peer_causes_short_write() {
        let (mut local, peer) = duplex(16);
        drop(peer);

        let request = "x".repeat(64);
        let err = executor(MatchPolicy::Prefix)
            .execute(&mut local, &transaction(request.as_str(), "ok"))
            .await
            .expect_err("对端缺席时写入应判失败");
        assert!(matches!(err, ExecError::ShortWrite { expected: 64, .. }));
    }
}

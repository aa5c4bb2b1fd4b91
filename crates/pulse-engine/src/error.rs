//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义执行引擎的三个错误域：会话（建连/握手）、单事务执行与
//!   管线聚合；
//! - 每个变体对应一种稳定的失败分类，字节计数类失败携带精确的
//!   "实际/期望" 数值供诊断。
//!
//! ## 设计要求（What）
//! - 底层 `io::Error` 一律作为 `source` 保留，错误链完整可追溯；
//! - 管线错误通过 `#[from]`/显式包装聚合下游错误域，首个失败原样上抛。

use std::io;

use pulse_core::Phase;
use thiserror::Error;

/// 传输会话的失败分类。
#[derive(Debug, Error)]
pub enum SessionError {
    /// 建立 TCP 连接失败。
    #[error("failed to connect to `{authority}`: {source}")]
    Connect {
        authority: String,
        #[source]
        source: io::Error,
    },

    /// TLS 握手失败，包括证书链校验被拒绝与身份名不合法。
    #[error("tls handshake with `{host}` failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: io::Error,
    },
}

/// 单条事务执行的失败分类。
///
/// # 教案式说明
/// - **意图 (Why)**：区分 "字节数对不上"（短写/短读）与 "底层 IO 报错"
///   （发送/接收失败）两类本质不同的失败，前者说明对端行为与脚本预期
///   不符，后者说明链路本身出了问题；
/// - **契约 (What)**：短写/短读变体携带实际与期望字节数；响应不符携带
///   ASCII 转义后的双方载荷；IO 变体保留原始错误作为 `source`。
#[derive(Debug, Error)]
pub enum ExecError {
    /// 流在请求写完之前关闭。
    #[error("request truncated: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    /// 写路径上除关闭之外的 IO 失败。
    #[error("transaction failed on request: {0}")]
    Send(#[source] io::Error),

    /// 收到的字节数少于期望响应长度（含对端直接关闭）。
    #[error("response truncated: received {received} of {expected} bytes")]
    ShortRead { received: usize, expected: usize },

    /// 收到的字节不满足配置的匹配策略。
    #[error("received response does not match expected response: expected `{expected}`, received `{received}`")]
    ResponseMismatch { expected: String, received: String },

    /// 读路径上的 IO 失败。
    #[error("transaction failed on response: {0}")]
    Receive(#[source] io::Error),
}

/// 管线整体的失败分类：首个失败经拆线后原样上抛。
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 建连或握手阶段失败。
    #[error(transparent)]
    Session(#[from] SessionError),

    /// 某条事务执行失败；`index` 为该事务在所属阶段序列内的下标。
    #[error("transaction at index {index} in the {phase} phase failed: {source}")]
    Transaction {
        phase: Phase,
        index: usize,
        #[source]
        source: ExecError,
    },
}

//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义数据层的两个错误域：端点校验与事务入队；
//! - 每个变体对应一种稳定的失败分类，调用方可以精确匹配而无需解析文案。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error`，兼容 `std::error::Error` 生态；
//! - 端点错误携带原始输入，便于运维在日志中直接定位出错的命令行参数；
//! - 反序列化失败保留 `serde_json` 原始原因作为 `source`。

use thiserror::Error;

/// 端点字符串校验的失败分类。
///
/// # 教案式说明
/// - **意图 (Why)**：`scheme://host:port` 的每一种缺陷都有独立变体，
///   调用方与测试可以断言具体失败原因而非笼统的 "解析失败"；
/// - **契约 (What)**：校验按固定顺序执行——空输入、结构合法性、主机、
///   端口、协议存在性、协议受支持性——首个失败即返回；
/// - **风险 (Trade-offs)**：变体携带 `String` 上下文，牺牲少量堆分配
///   换取可读的错误文案。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum EndpointError {
    /// 输入字符串为空。
    #[error("endpoint string is empty")]
    EmptyInput,

    /// 输入无法按 `scheme://host:port` 结构拆解。
    ///
    /// - **契约 (What)**：`reason` 描述具体缺陷，例如包含空白字符或
    ///   端口超出数值范围。
    #[error("endpoint `{input}` cannot be parsed: {reason}")]
    MalformedInput { input: String, reason: String },

    /// 缺少主机名。
    #[error("endpoint `{input}` is missing a hostname")]
    MissingHost { input: String },

    /// 缺少端口号。
    #[error("endpoint `{input}` is missing a port number")]
    MissingPort { input: String },

    /// 缺少协议标识。
    #[error("endpoint `{input}` is missing a scheme")]
    MissingScheme { input: String },

    /// 协议标识语法合法但不在受支持集合内。
    #[error("endpoint `{input}` uses unsupported scheme `{scheme}`")]
    UnsupportedScheme { input: String, scheme: String },
}

/// 事务入队的失败分类。
///
/// # 教案式说明
/// - **意图 (Why)**：入队是事务不变量的唯一校验点，失败必须保证队列
///   不发生任何变化；
/// - **契约 (What)**：
///   - [`EmptyTransaction`](QueueError::EmptyTransaction)：请求与响应
///     同时为空；
///   - [`TlsDisabledForPhase`](QueueError::TlsDisabledForPhase)：会话
///     未启用 TLS 却尝试排入升级后序列；
///   - [`Deserialization`](QueueError::Deserialization)：文本形式解码
///     失败，先于任何不变量检查发生。
#[derive(Debug, Error)]
pub enum QueueError {
    /// 请求与响应不能同时为空。
    #[error("transaction request and response are both empty")]
    EmptyTransaction,

    /// 会话未启用 TLS 时不接受升级后事务。
    #[error("post-upgrade transaction rejected: TLS is disabled for this session")]
    TlsDisabledForPhase,

    /// 事务的文本序列化形式无法解码。
    #[error("transaction failed deserialization: {0}")]
    Deserialization(#[from] serde_json::Error),
}

use serde::Deserialize;

use crate::error::QueueError;
use std::fmt;

/// 事务相对于 TLS 升级点的阶段。
///
/// # 教案式说明
/// - **意图 (Why)**：同一条连接上的事务按 "升级前明文 / 升级后密文"
///   分属两条序列，阶段决定事务最终跑在哪条流上；
/// - **契约 (What)**：满足 `Copy + Eq + Hash`，可直接用作日志字段与
///   错误上下文。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
    /// TLS 握手之前，走原始明文流。
    PreUpgrade,
    /// TLS 握手之后，走加密流（会话未启用 TLS 时退回原始流）。
    PostUpgrade,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreUpgrade => f.write_str("pre-upgrade"),
            Self::PostUpgrade => f.write_str("post-upgrade"),
        }
    }
}

/// 响应匹配策略。
///
/// # 教案式说明
/// - **意图 (Why)**：把 "收到的字节如何与期望响应比较" 做成显式、可
///   测试的配置项，而不是埋在执行器内部的硬编码分支；
/// - **契约 (What)**：
///   - [`Prefix`](MatchPolicy::Prefix)（默认）：收到的字节必须以期望
///     响应开头，尾部多余字节被容忍——适合响应尾部携带不定内容的服务；
///   - [`Exact`](MatchPolicy::Exact)：收到的字节必须与期望响应完全
///     相等；
/// - **风险 (Trade-offs)**：前缀策略可能放过 "前缀巧合" 的错误响应，
///   对严格的一致性探测应显式选择 `Exact`。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MatchPolicy {
    /// 前缀比较：尾部多余字节被容忍。
    #[default]
    Prefix,
    /// 全等比较：长度与内容都必须一致。
    Exact,
}

impl MatchPolicy {
    /// 判断收到的字节是否满足期望响应。
    pub fn matches(self, expected: &[u8], received: &[u8]) -> bool {
        match self {
            Self::Prefix => received.starts_with(expected),
            Self::Exact => received == expected,
        }
    }
}

/// 一次 "发送请求并核对响应" 的工作单元。
///
/// # 教案式说明
/// - **意图 (Why)**：请求与响应都是调用方提供的不透明字节串，引擎不做
///   任何协议层解析；
/// - **契约 (What)**：请求或响应可以为空（分别表示纯接收与只发不收的
///   事务），但不可同时为空；构造成功后不可变；
/// - **风险 (Trade-offs)**：载荷以 `Vec<u8>` 持有，超大载荷的拷贝成本
///   由调用方自行权衡。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
    request: Vec<u8>,
    response: Vec<u8>,
}

impl Transaction {
    /// 构造事务并校验 "请求响应不可同时为空" 不变量。
    pub fn new(
        request: impl Into<Vec<u8>>,
        response: impl Into<Vec<u8>>,
    ) -> Result<Self, QueueError> {
        let request = request.into();
        let response = response.into();
        if request.is_empty() && response.is_empty() {
            return Err(QueueError::EmptyTransaction);
        }
        Ok(Self { request, response })
    }

    /// 待发送的请求载荷，可能为空。
    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// 期望收到的响应载荷，可能为空。
    pub fn response(&self) -> &[u8] {
        &self.response
    }
}

/// 事务的文本序列化形式：两个字段都是原始文本，CR/LF 等控制字符按
/// 字面值携带，缺失字段回退为空载荷。
#[derive(Debug, Deserialize)]
struct TransactionForm {
    #[serde(default)]
    request: String,
    #[serde(default)]
    response: String,
}

/// 升级前/升级后两条有序事务序列。
///
/// # 教案式说明
///
/// ## 意图 (Why)
/// - 入队顺序即执行顺序，队列是事务不变量的唯一校验点：执行引擎遍历
///   序列时无需重复检查；
/// - 队列携带会话的 TLS 开关，"未启用 TLS 不接受升级后事务" 在入队时
///   即被拒绝，而不是等到执行阶段才暴露。
///
/// ## 契约 (What)
/// - [`enqueue`](TransactionQueue::enqueue)：校验失败时两条序列保持
///   原样，成功时追加到对应序列尾部；
/// - [`enqueue_serialized`](TransactionQueue::enqueue_serialized)：先
///   解码文本形式再委托给 `enqueue`，解码失败先于任何不变量检查；
/// - 队列只增不减，随会话一起销毁。
#[derive(Debug)]
pub struct TransactionQueue {
    tls_enabled: bool,
    pre: Vec<Transaction>,
    post: Vec<Transaction>,
}

impl TransactionQueue {
    /// 创建空队列；`tls_enabled` 应与端点描述符的 TLS 开关一致。
    pub fn new(tls_enabled: bool) -> Self {
        Self {
            tls_enabled,
            pre: Vec::new(),
            post: Vec::new(),
        }
    }

    /// 队列是否允许升级后事务。
    pub fn tls_enabled(&self) -> bool {
        self.tls_enabled
    }

    /// 校验并追加一条事务。
    pub fn enqueue(
        &mut self,
        phase: Phase,
        request: impl Into<Vec<u8>>,
        response: impl Into<Vec<u8>>,
    ) -> Result<(), QueueError> {
        let transaction = Transaction::new(request, response)?;
        if phase == Phase::PostUpgrade && !self.tls_enabled {
            return Err(QueueError::TlsDisabledForPhase);
        }
        match phase {
            Phase::PreUpgrade => self.pre.push(transaction),
            Phase::PostUpgrade => self.post.push(transaction),
        }
        Ok(())
    }

    /// 解码文本形式的事务并入队。
    pub fn enqueue_serialized(&mut self, phase: Phase, raw: &str) -> Result<(), QueueError> {
        let form: TransactionForm = serde_json::from_str(raw)?;
        self.enqueue(phase, form.request.into_bytes(), form.response.into_bytes())
    }

    /// 升级前事务序列，入队顺序即执行顺序。
    pub fn pre(&self) -> &[Transaction] {
        &self.pre
    }

    /// 升级后事务序列。
    pub fn post(&self) -> &[Transaction] {
        &self.post
    }

    /// 两条序列是否都为空。
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

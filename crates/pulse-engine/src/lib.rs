#![doc = r#"
# pulse-engine

## 设计动机（Why）
- **定位**：该 crate 提供脉冲探测客户端在 Tokio 运行时上的事务执行
  引擎——建连、明文事务、TLS 升级、密文事务与拆线的完整管线；
- **架构角色**：消费 `pulse-core` 校验完成的端点描述符与事务队列，
  产出结构化的成功摘要或首个失败；
- **设计理念**：流句柄的所有权收敛在传输会话内部，执行器按次借用，
  管线以显式状态机推进并保证拆线恰好执行一次。

## 核心契约（What）
- [`TransportSession`]：独占持有原始 `TcpStream` 与升级后的加密流，
  握手成功前加密句柄恒为空，拆线后两个句柄都被清空；
- [`TransactionExecutor`]：对借入的流执行一次 "发送-接收-核对"，精确
  区分短写、短读、响应不符与底层 IO 失败；
- [`PipelineController`]：驱动五阶段操作序列，任一阶段失败立即短路，
  拆线无条件执行且不覆盖先前的失败。

## 实现策略（How）
- 完全依赖 Tokio 的 `TcpStream` 与 `tokio-rustls` 的客户端握手；
- 对端证书链在握手完成后逐张解析并记录主体/签发者文本（`x509-parser`），
  该巡检仅供观测，解析失败不影响握手结果；
- 错误域以 `thiserror` 枚举表达，底层 `io::Error` 作为 `source` 保留。

## 风险与考量（Trade-offs）
- 建连、握手与收发均为无超时的阻塞式等待；需要截止时间的调用方应在
  [`PipelineController::run`] 外层包裹 `tokio::time::timeout`；
- 接收阶段只执行一次读取，跨多个 TCP 分段到达的响应会被判为短读——
  这是对 "单次读取" 契约的忠实实现，而不是缺陷。
"#]

mod error;
mod executor;
mod pipeline;
mod session;
mod tls;

pub use error::{ExecError, PipelineError, SessionError};
pub use executor::{DEFAULT_RECV_BUFFER_BYTES, TransactionExecutor};
pub use pipeline::{PipelineController, PipelineReport, PipelineState};
pub use session::TransportSession;
pub use tls::TlsContext;

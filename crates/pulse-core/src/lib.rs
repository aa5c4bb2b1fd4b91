#![doc = r#"
# pulse-core

## 设计动机（Why）
- **定位**：该 crate 承载脉冲探测客户端的纯数据层——端点描述符的校验、
  事务与事务队列的不变量，以及响应匹配策略；
- **架构角色**：作为执行引擎（`pulse-engine`）的叶子依赖，不引入任何
  异步运行时或网络类型，保证校验逻辑可以在任意环境下独立测试；
- **设计理念**：所有不变量在构造点一次性校验，构造成功后的值不可变，
  执行期不再需要防御性检查。

## 核心契约（What）
- [`EndpointDescriptor`]：经过逐级校验的 `scheme://host:port` 三元组加
  TLS 开关，校验顺序与失败分类稳定（见 [`EndpointError`]）；
- [`TransactionQueue`]：升级前/升级后两条有序事务序列，入队即校验
  "请求响应不可同时为空" 与 "升级后事务要求启用 TLS" 两条不变量；
- [`MatchPolicy`]：响应匹配策略的显式配置，前缀匹配为默认值。

## 实现策略（How）
- 错误域以 `thiserror` 枚举表达，每个变体对应一种稳定的失败分类；
- 事务的文本序列化形式由 `serde`/`serde_json` 解码，缺失字段回退为空
  载荷，控制字符按字面值携带。

## 风险与考量（Trade-offs）
- 端点解析为手写的最小 authority 拆分而非通用 URL 解析器：通用解析器
  会在 `//host:port` 这类缺失 scheme 的输入上提前报错，无法维持本 crate
  承诺的 "主机 → 端口 → 协议" 校验顺序。
"#]

mod endpoint;
mod error;
mod transaction;

pub use endpoint::{EndpointDescriptor, Scheme};
pub use error::{EndpointError, QueueError};
pub use transaction::{MatchPolicy, Phase, Transaction, TransactionQueue};

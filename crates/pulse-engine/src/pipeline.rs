use pulse_core::{Phase, TransactionQueue};

use crate::error::PipelineError;
use crate::executor::TransactionExecutor;
use crate::session::TransportSession;

/// 管线状态。
///
/// # 教案式说明
/// - **意图 (Why)**：五阶段操作序列以显式状态机表达，而不是迭代一张
///   函数指针列表——状态可独立检视，迁移表可独立测试；
/// - **契约 (What)**：合法迁移为
///   `Idle → Connected → PreTlsDone → SecureDone → PostTlsDone`，此外
///   任意状态都可迁入 [`ShutDown`](PipelineState::ShutDown)，对应
///   "任一阶段失败立即拆线" 的短路语义；
/// - **风险 (Trade-offs)**：枚举标记 `#[non_exhaustive]`，未来插入新
///   阶段不破坏下游匹配。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PipelineState {
    /// 初始状态，尚未建连。
    Idle,
    /// TCP 连接已建立。
    Connected,
    /// 升级前事务全部执行完毕。
    PreTlsDone,
    /// TLS 升级完成（TLS 关闭时立即迁入）。
    SecureDone,
    /// 升级后事务全部执行完毕。
    PostTlsDone,
    /// 会话已拆线，终态。
    ShutDown,
}

impl PipelineState {
    /// 判断状态是否允许迁移至 `target`。
    pub fn can_transition_to(self, target: PipelineState) -> bool {
        matches!(
            (self, target),
            (PipelineState::Idle, PipelineState::Connected)
                | (PipelineState::Connected, PipelineState::PreTlsDone)
                | (PipelineState::PreTlsDone, PipelineState::SecureDone)
                | (PipelineState::SecureDone, PipelineState::PostTlsDone)
                | (_, PipelineState::ShutDown)
        )
    }

    /// 状态是否为终态。
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::ShutDown)
    }
}

/// 管线成功时的执行摘要。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PipelineReport {
    /// 升级前阶段执行的事务条数。
    pub pre_executed: usize,
    /// 升级后阶段执行的事务条数。
    pub post_executed: usize,
    /// 本次运行是否完成了 TLS 升级。
    pub tls_upgraded: bool,
}

/// 管线控制器：驱动 "建连 → 明文事务 → TLS 升级 → 密文事务 → 拆线"。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 编排逻辑与收发逻辑分离：控制器只关心阶段推进与短路，单条事务的
///   字节语义完全委托给 [`TransactionExecutor`]；
/// - 拆线是无条件的终结步骤：无论哪一阶段失败，会话句柄都不会泄露。
///
/// ## 契约 (What)
/// - [`run`](PipelineController::run)：一次性消费队列并推进状态机，
///   成功返回 [`PipelineReport`]，失败返回首个 [`PipelineError`]；
///   两种出路都保证拆线恰好执行一次，且拆线期的关闭失败从不覆盖先前
///   的失败；
/// - 同一控制器只应运行一次；运行后可通过
///   [`state`](PipelineController::state) 与
///   [`session`](PipelineController::session) 检视终局。
///
/// ## 注意事项 (Trade-offs)
/// - 阶段内事务严格串行，队列顺序即执行顺序，首个失败丢弃同阶段的
///   剩余事务；
/// - 控制器不做重试：探测工具的职责是如实汇报首个偏差。
#[derive(Debug)]
pub struct PipelineController {
    session: TransportSession,
    queue: TransactionQueue,
    executor: TransactionExecutor,
    state: PipelineState,
}

impl PipelineController {
    /// 以默认执行器（前缀匹配、默认接收缓冲）构造控制器。
    pub fn new(session: TransportSession, queue: TransactionQueue) -> Self {
        Self {
            session,
            queue,
            executor: TransactionExecutor::default(),
            state: PipelineState::Idle,
        }
    }

    /// 替换事务执行器（匹配策略、接收缓冲下限）。
    pub fn with_executor(mut self, executor: TransactionExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// 当前管线状态。
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// 检视底层会话（只读；句柄本身不可见）。
    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    /// 运行完整管线。
    pub async fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        let outcome = self.drive().await;
        // 拆线无条件执行；其内部错误只记日志，不会改写 outcome。
        self.session.shutdown().await;
        self.transition(PipelineState::ShutDown);
        match &outcome {
            Ok(report) => tracing::info!(
                pre = report.pre_executed,
                post = report.post_executed,
                tls = report.tls_upgraded,
                "管线执行成功"
            ),
            Err(err) => tracing::error!(error = %err, "管线执行失败"),
        }
        outcome
    }

    async fn drive(&mut self) -> Result<PipelineReport, PipelineError> {
        self.session.connect().await?;
        self.transition(PipelineState::Connected);

        let pre_executed = self.run_phase(Phase::PreUpgrade).await?;
        self.transition(PipelineState::PreTlsDone);

        self.session.upgrade().await?;
        self.transition(PipelineState::SecureDone);

        let post_executed = self.run_phase(Phase::PostUpgrade).await?;
        self.transition(PipelineState::PostTlsDone);

        Ok(PipelineReport {
            pre_executed,
            post_executed,
            tls_upgraded: self.session.is_secured(),
        })
    }

    async fn run_phase(&mut self, phase: Phase) -> Result<usize, PipelineError> {
        let total = match phase {
            Phase::PreUpgrade => self.queue.pre().len(),
            Phase::PostUpgrade => self.queue.post().len(),
        };
        for index in 0..total {
            let transaction = match phase {
                Phase::PreUpgrade => &self.queue.pre()[index],
                Phase::PostUpgrade => &self.queue.post()[index],
            };
            tracing::info!(phase = %phase, number = index + 1, total, "执行事务");
            self.session
                .run_transaction(&self.executor, transaction)
                .await
                .map_err(|source| PipelineError::Transaction {
                    phase,
                    index,
                    source,
                })?;
        }
        Ok(total)
    }

    fn transition(&mut self, target: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "非法状态迁移: {:?} -> {:?}",
            self.state,
            target
        );
        tracing::debug!(from = ?self.state, to = ?target, "管线状态迁移");
        self.state = target;
    }
}

//! `pulse`：面向字节级协议行为的脚本化探测客户端。
//!
//! # 设计动机（Why）
//! - 向执行引擎（`pulse-engine`）喂入校验完成的端点与事务脚本，并把
//!   整体结果映射为进程退出码，供 CI 与运维脚本直接消费。
//! - 参数解析保持零第三方依赖的手写循环，与引擎的职责边界清晰：解析
//!   失败不会触碰任何网络资源。
//!
//! # 使用契约（What）
//! - `--url tcp://host:port` 为必填项；`--tls` 启用管线中段的 TLS 升级；
//! - `--pre` / `--post` 以 JSON 文本（`{"request":"...","response":"..."}`）
//!   追加升级前/升级后事务，可重复出现，出现顺序即执行顺序；
//! - `--match prefix|exact` 选择响应匹配策略，缺省为前缀匹配；
//! - 退出码：管线整体成功为 0，任何失败为 1。
//!
//! # 风险提示（Trade-offs & Gotchas）
//! - 日志经 `tracing-subscriber` 输出到标准错误，过滤级别由
//!   `RUST_LOG` 控制，缺省 `info`。

use std::env;
use std::process::ExitCode;

use pulse_core::{EndpointDescriptor, MatchPolicy, Phase, TransactionQueue};
use pulse_engine::{PipelineController, TlsContext, TransactionExecutor, TransportSession};
use tracing_subscriber::EnvFilter;

const APP_NAME: &str = "pulse";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 解析完成的运行参数。
#[derive(Debug, Default, Eq, PartialEq)]
struct RunOptions {
    url: String,
    use_tls: bool,
    pre: Vec<String>,
    post: Vec<String>,
    policy: MatchPolicy,
}

/// 命令行入口的三种走向。
#[derive(Debug, Eq, PartialEq)]
enum Command {
    Run(RunOptions),
    Version,
    Help,
}

fn usage() {
    eprintln!("{APP_NAME} 用法:\n");
    eprintln!("  --url <scheme://host:port>   探测目标端点（必填，例如 tcp://127.0.0.1:443）");
    eprintln!("  --tls                        在明文事务之后执行 TLS 升级");
    eprintln!("  --pre <json>                 追加一条升级前事务，可重复");
    eprintln!("  --post <json>                追加一条升级后事务，可重复（需要 --tls）");
    eprintln!("  --match <prefix|exact>       响应匹配策略，缺省 prefix");
    eprintln!("  --version                    打印版本信息");
    eprintln!("  --help                       打印本说明");
    eprintln!();
    eprintln!("  事务 JSON 形如 {{\"request\":\"PING\\r\\n\",\"response\":\"PONG\"}}，");
    eprintln!("  请求或响应可以为空，但不可同时为空。");
}

/// 手写的参数循环：首个错误即返回，不触碰任何网络资源。
fn parse_args<I>(mut args: I) -> Result<Command, String>
where
    I: Iterator<Item = String>,
{
    let mut options = RunOptions::default();
    let mut saw_url = false;

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--url" | "-u" => {
                options.url = args.next().ok_or("`--url` 缺少取值")?;
                saw_url = true;
            }
            "--tls" => options.use_tls = true,
            "--pre" => options.pre.push(args.next().ok_or("`--pre` 缺少取值")?),
            "--post" => options.post.push(args.next().ok_or("`--post` 缺少取值")?),
            "--match" => {
                let token = args.next().ok_or("`--match` 缺少取值")?;
                options.policy = match token.as_str() {
                    "prefix" => MatchPolicy::Prefix,
                    "exact" => MatchPolicy::Exact,
                    other => return Err(format!("未知的匹配策略 `{other}`")),
                };
            }
            "--version" | "-V" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(format!("未知参数 `{other}`")),
        }
    }

    if !saw_url {
        return Err("缺少必填参数 `--url`".to_string());
    }
    Ok(Command::Run(options))
}

async fn run(options: RunOptions) -> ExitCode {
    let descriptor = match EndpointDescriptor::parse(&options.url, options.use_tls) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            tracing::error!(error = %err, "端点校验失败");
            return ExitCode::FAILURE;
        }
    };

    let mut queue = TransactionQueue::new(options.use_tls);
    for (phase, scripts) in [
        (Phase::PreUpgrade, &options.pre),
        (Phase::PostUpgrade, &options.post),
    ] {
        for script in scripts {
            if let Err(err) = queue.enqueue_serialized(phase, script) {
                tracing::error!(phase = %phase, error = %err, "事务入队失败");
                return ExitCode::FAILURE;
            }
        }
    }

    let session = TransportSession::new(descriptor, TlsContext::default());
    let mut controller = PipelineController::new(session, queue)
        .with_executor(TransactionExecutor::new(options.policy));

    match controller.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            // 首个失败已由管线记录；此处只负责退出码。
            tracing::debug!(error = %err, "以非零退出码结束");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match parse_args(env::args().skip(1)) {
        Ok(Command::Run(options)) => run(options).await,
        Ok(Command::Version) => {
            println!("{APP_NAME} version {VERSION}");
            ExitCode::SUCCESS
        }
        Ok(Command::Help) => {
            usage();
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{APP_NAME}: {message}\n");
            usage();
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> std::vec::IntoIter<String> {
        items
            .iter()
            .map(|item| item.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn url_with_scripts_parses_into_run_command() {
        let command = parse_args(args(&[
            "--url",
            "tcp://127.0.0.1:443",
            "--tls",
            "--pre",
            r#"{"request":"STARTTLS\r\n","response":"OK"}"#,
            "--post",
            r#"{"request":"ping","response":"pong"}"#,
            "--match",
            "exact",
        ]))
        .expect("合法参数应解析成功");

        let Command::Run(options) = command else {
            panic!("应得到 Run 命令");
        };
        assert_eq!(options.url, "tcp://127.0.0.1:443");
        assert!(options.use_tls);
        assert_eq!(options.pre.len(), 1);
        assert_eq!(options.post.len(), 1);
        assert_eq!(options.policy, MatchPolicy::Exact);
    }

    #[test]
    fn missing_url_is_rejected() {
        let err = parse_args(args(&["--tls"])).expect_err("缺少 --url 应报错");
        assert!(err.contains("--url"));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = parse_args(args(&["--url", "tcp://h:1", "--bogus"]))
            .expect_err("未知参数应报错");
        assert!(err.contains("--bogus"));
    }

    #[test]
    fn unknown_match_policy_is_rejected() {
        let err = parse_args(args(&["--url", "tcp://h:1", "--match", "fuzzy"]))
            .expect_err("未知策略应报错");
        assert!(err.contains("fuzzy"));
    }

    #[test]
    fn version_flag_wins_over_run() {
        let command = parse_args(args(&["--version"])).expect("版本参数应解析成功");
        assert_eq!(command, Command::Version);
    }
}

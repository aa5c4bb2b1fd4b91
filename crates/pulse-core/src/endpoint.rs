use std::fmt;

use crate::error::EndpointError;

/// 受支持的传输协议标识。
///
/// # 教案式说明
/// - **意图 (Why)**：以封闭枚举表达受支持集合，拼写合法但未收录的协议
///   在校验阶段即被拒绝，执行引擎无需再处理未知协议分支；
/// - **契约 (What)**：当前仅收录面向字节流的 `tcp`；事务执行模型围绕
///   单条有序字节流与其上的 TLS 升级展开，数据报协议无法满足该契约；
/// - **风险 (Trade-offs)**：标记 `#[non_exhaustive]`，未来扩展新协议时
///   下游的 `match` 不会被破坏。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Scheme {
    /// 可靠字节流传输。
    Tcp,
}

impl Scheme {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }

    /// 返回协议的规范小写标识。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 校验完成的目标端点描述符。
///
/// # 教案式说明
///
/// ## 意图 (Why)
/// - 将 "命令行传入的一段字符串" 收敛为执行引擎可以直接信赖的结构化
///   目标：协议、主机、端口与 TLS 开关缺一不可；
/// - 构造即校验：[`parse`](EndpointDescriptor::parse) 成功返回后描述符
///   不可变，会话生命周期内不再出现半合法状态。
///
/// ## 契约 (What)
/// - `scheme`：受支持的传输协议；
/// - `host`：非空主机名或 IP 字面量（IPv6 以去括号形式存储）；
/// - `port`：1..=65535 范围内的端口（`0` 在语法上被接受，交由操作系统
///   拒绝）；
/// - `use_tls`：是否在管线中段执行 TLS 升级。
///
/// ## 注意事项 (Trade-offs)
/// - 描述符不持有原始输入字符串；错误路径才需要它，成功路径保持精简。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EndpointDescriptor {
    scheme: Scheme,
    host: String,
    port: u16,
    use_tls: bool,
}

/// 未经语义校验的 authority 拆分结果。
struct RawParts<'a> {
    scheme: &'a str,
    host: &'a str,
    port: Option<u16>,
}

impl EndpointDescriptor {
    /// 解析并校验 `scheme://host:port` 形式的端点字符串。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：所有失败分类在此一次性暴露，后续阶段拿到的
    ///   描述符保证可用；
    /// - **执行 (How)**：先做结构拆分（空白/控制字符、端口数值范围在
    ///   这一步被拒绝），再按 "主机 → 端口 → 协议存在 → 协议受支持"
    ///   的顺序检查语义，首个失败即返回；
    /// - **契约 (What)**：纯函数，无任何副作用；`use_tls` 原样写入
    ///   描述符，不参与校验。
    pub fn parse(raw: &str, use_tls: bool) -> Result<Self, EndpointError> {
        if raw.is_empty() {
            return Err(EndpointError::EmptyInput);
        }

        let parts = split_authority(raw).map_err(|reason| EndpointError::MalformedInput {
            input: raw.to_string(),
            reason,
        })?;

        if parts.host.is_empty() {
            return Err(EndpointError::MissingHost {
                input: raw.to_string(),
            });
        }
        let Some(port) = parts.port else {
            return Err(EndpointError::MissingPort {
                input: raw.to_string(),
            });
        };
        if parts.scheme.is_empty() {
            return Err(EndpointError::MissingScheme {
                input: raw.to_string(),
            });
        }
        let Some(scheme) = Scheme::from_token(parts.scheme) else {
            return Err(EndpointError::UnsupportedScheme {
                input: raw.to_string(),
                scheme: parts.scheme.to_string(),
            });
        };

        Ok(Self {
            scheme,
            host: parts.host.to_string(),
            port,
            use_tls,
        })
    }

    /// 返回传输协议。
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// 返回主机名（IPv6 不含方括号）。
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 返回端口号。
    pub fn port(&self) -> u16 {
        self.port
    }

    /// 是否在管线中段执行 TLS 升级。
    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// 返回适合拨号与日志展示的 `host:port` 形式，IPv6 自动补回方括号。
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}

/// 将输入拆成 scheme / host / port 三段，只做结构检查。
///
/// - **执行 (How)**：依次识别 `scheme://authority`、缺省协议的
///   `//authority` 以及 `scheme:opaque`（无 authority，主机视为空）；
///   authority 内再按方括号或最后一个冒号拆出主机与端口；
/// - **契约 (What)**：返回 `Err(reason)` 表示结构层面不可解析；端口
///   token 为空视为 "缺少端口" 交给语义层，非数字或越界则在此拒绝。
fn split_authority(raw: &str) -> Result<RawParts<'_>, String> {
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("contains whitespace or control characters".to_string());
    }

    let (scheme, rest) = if let Some(index) = raw.find("://") {
        (&raw[..index], &raw[index + 3..])
    } else if let Some(stripped) = raw.strip_prefix("//") {
        ("", stripped)
    } else if let Some(index) = raw.find(':') {
        // `scheme:opaque` 形式：存在协议但没有 authority。
        (&raw[..index], "")
    } else {
        ("", "")
    };

    // 丢弃 authority 之后的路径部分。
    let authority = rest.split('/').next().unwrap_or("");

    let (host, port_token) = if let Some(bracketed) = authority.strip_prefix('[') {
        let Some((host, tail)) = bracketed.split_once(']') else {
            return Err("bracketed host is not terminated".to_string());
        };
        match tail.strip_prefix(':') {
            Some(token) => (host, Some(token)),
            None if tail.is_empty() => (host, None),
            None => return Err("unexpected characters after bracketed host".to_string()),
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, token)) => (host, Some(token)),
            None => (authority, None),
        }
    };

    let port = match port_token {
        None | Some("") => None,
        Some(token) => Some(
            token
                .parse::<u16>()
                .map_err(|_| format!("invalid port `{token}`"))?,
        ),
    };

    Ok(RawParts { scheme, host, port })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            EndpointDescriptor::parse("", false),
            Err(EndpointError::EmptyInput)
        );
    }

    #[test]
    fn leading_whitespace_is_malformed() {
        let err = EndpointDescriptor::parse(" https://host:443", false).unwrap_err();
        assert!(matches!(err, EndpointError::MalformedInput { .. }));
    }

    #[test]
    fn non_numeric_port_is_malformed() {
        let err = EndpointDescriptor::parse("tcp://host:abc", false).unwrap_err();
        assert!(matches!(err, EndpointError::MalformedInput { .. }));
    }

    #[test]
    fn missing_host_is_reported_before_scheme_checks() {
        let err = EndpointDescriptor::parse("tcp://:443", true).unwrap_err();
        assert!(matches!(err, EndpointError::MissingHost { .. }));
    }

    #[test]
    fn missing_port_is_reported() {
        let err = EndpointDescriptor::parse("tcp://host", true).unwrap_err();
        assert!(matches!(err, EndpointError::MissingPort { .. }));
    }

    #[test]
    fn empty_port_token_counts_as_missing_port() {
        let err = EndpointDescriptor::parse("tcp://host:", true).unwrap_err();
        assert!(matches!(err, EndpointError::MissingPort { .. }));
    }

    #[test]
    fn scheme_less_authority_reports_missing_scheme() {
        let err = EndpointDescriptor::parse("//host:443", true).unwrap_err();
        assert!(matches!(err, EndpointError::MissingScheme { .. }));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = EndpointDescriptor::parse("smb://host:139", true).unwrap_err();
        assert!(matches!(
            err,
            EndpointError::UnsupportedScheme { scheme, .. } if scheme == "smb"
        ));
    }

    #[test]
    fn datagram_scheme_is_rejected() {
        let err = EndpointDescriptor::parse("udp://host:5060", false).unwrap_err();
        assert!(matches!(err, EndpointError::UnsupportedScheme { .. }));
    }

    #[test]
    fn valid_endpoint_produces_immutable_descriptor() {
        let descriptor =
            EndpointDescriptor::parse("tcp://host:12345", true).expect("合法端点应通过校验");
        assert_eq!(descriptor.scheme(), Scheme::Tcp);
        assert_eq!(descriptor.host(), "host");
        assert_eq!(descriptor.port(), 12345);
        assert!(descriptor.use_tls());
        assert_eq!(descriptor.authority(), "host:12345");
    }

    #[test]
    fn bracketed_ipv6_host_is_accepted() {
        let descriptor =
            EndpointDescriptor::parse("tcp://[::1]:443", false).expect("IPv6 字面量应通过校验");
        assert_eq!(descriptor.host(), "::1");
        assert_eq!(descriptor.port(), 443);
        assert_eq!(descriptor.authority(), "[::1]:443");
    }

    #[test]
    fn bare_word_reports_missing_host() {
        let err = EndpointDescriptor::parse("justhost", false).unwrap_err();
        assert!(matches!(err, EndpointError::MissingHost { .. }));
    }
}

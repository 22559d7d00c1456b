/// SIP 工具函数模块
///
/// 本地地址探测、Call-ID 生成、目标 URI 拼接和日志初始化

use std::net::IpAddr;
use uuid::Uuid;

/// 获取第一个非回环的网络接口 IP 地址
///
/// 遍历系统所有网络接口，返回第一个非回环的 IPv4 地址
///
/// # 示例
/// ```rust,no_run
/// use sip_softphone::utils::get_first_non_loopback_interface;
///
/// let local_ip = get_first_non_loopback_interface().unwrap();
/// println!("本地IP: {}", local_ip);
/// ```
pub fn get_first_non_loopback_interface() -> Result<IpAddr, std::io::Error> {
    for interface in get_if_addrs::get_if_addrs()? {
        if !interface.is_loopback() {
            match interface.addr {
                get_if_addrs::IfAddr::V4(ref addr) => return Ok(IpAddr::V4(addr.ip)),
                _ => continue,
            }
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "未找到 IPv4 接口",
    ))
}

/// 生成基于 UUID 的 Call-ID
///
/// # 示例
/// ```rust
/// use sip_softphone::utils::make_call_id;
///
/// let call_id = make_call_id(Some("example.com"));
/// // 生成类似: "550e8400-e29b-41d4-a716-446655440000@example.com"
/// ```
pub fn make_call_id(domain: Option<&str>) -> rsip::headers::CallId {
    let uuid = Uuid::new_v4();

    match domain {
        Some(d) => format!("{}@{}", uuid, d).into(),
        None => uuid.to_string().into(),
    }
}

/// 把号码或地址转换成 SIP URI
///
/// - `sip:` 开头的原样解析
/// - 含 `@` 的补上 `sip:` 前缀
/// - 纯号码拼接配置的域名
pub fn make_uri(target: &str, domain: &str) -> Result<rsip::Uri, rsip::Error> {
    let target = target.trim();
    let uri = if target.starts_with("sip:") || target.starts_with("sips:") {
        target.to_string()
    } else if target.contains('@') {
        format!("sip:{}", target)
    } else {
        format!("sip:{}@{}", target, domain)
    };
    rsip::Uri::try_from(uri)
}

/// 初始化日志
///
/// 无法识别的级别按 info 处理；重复初始化会被忽略
pub fn initialize_logging(level: &str) {
    let level = level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

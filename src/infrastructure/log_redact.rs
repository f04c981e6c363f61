//! 日志脱敏
//! 私钥、已签名原始交易等长十六进制串不得原样进入日志或错误消息

use once_cell::sync::Lazy;
use regex::Regex;

/// 64 个以上十六进制字符（私钥、签名交易、calldata）
static HEX_BLOB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(0x)?[0-9a-fA-F]{64,}").expect("hex blob pattern is valid"));

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    if hex.len() <= show_chars * 2 {
        return "*".repeat(hex.len());
    }

    let prefix = &hex[..show_chars];
    let suffix = &hex[hex.len() - show_chars..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 {
        return "*".repeat(address.len());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

/// 将文本中的长十六进制串替换为缩略形式
///
/// 用于节点返回的错误信息：部分节点会把原始交易回显在错误里。
pub fn redact_hex_blobs(text: &str) -> String {
    HEX_BLOB
        .replace_all(text, |caps: &regex::Captures| redact_hex_string(&caps[0], 6))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_hex_string() {
        let hex = "0x1234567890abcdef1234567890abcdef12345678";
        let redacted = redact_hex_string(hex, 10);
        assert_eq!(redacted, "0x12345678...ef12345678");
    }

    #[test]
    fn test_redact_address() {
        let address = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bFd2";
        let redacted = redact_address(address);
        assert_eq!(redacted, "0x742d...bFd2");
    }

    #[test]
    fn test_redact_hex_blobs() {
        let raw = format!("0xf86c{}", "ab".repeat(60));
        let message = format!("rejected transaction {}: nonce too low", raw);
        let redacted = redact_hex_blobs(&message);

        assert!(!redacted.contains(&raw));
        assert!(redacted.starts_with("rejected transaction 0xf86c"));
        assert!(redacted.ends_with(": nonce too low"));
    }

    #[test]
    fn test_short_hex_untouched() {
        // 地址只有 40 个十六进制字符，保持原样
        let message = "sender 0x742d35Cc6634C0532925a3b844Bc9e7595f0bFd2 unknown";
        assert_eq!(redact_hex_blobs(message), message);
    }
}

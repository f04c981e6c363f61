//! 金额单位换算
//!
//! 十进制字符串与链上最小单位（wei / token base unit）之间的精确换算。
//! 全程使用 256 位整数，不经过浮点数。

use ethers::types::U256;

use super::error::CoreError;

/// ETH 精度
pub const ETH_DECIMALS: u8 = 18;
/// Gwei 精度（gas price 展示用）
pub const GWEI_DECIMALS: u8 = 9;
/// 10^78 超出 U256 表示范围
pub const MAX_DECIMALS: u8 = 77;

/// 十进制字符串 -> 最小单位整数
///
/// 仅接受 `123`、`0.5`、`1.250` 这类纯十进制写法：
/// 不允许符号、指数、空白，有效小数位（去掉末尾 0 后）不得超过 `decimals`。
pub fn to_base_units(value: &str, decimals: u8) -> Result<U256, CoreError> {
    if decimals > MAX_DECIMALS {
        return Err(CoreError::InvalidAmount(format!(
            "decimals {} exceeds supported maximum {}",
            decimals, MAX_DECIMALS
        )));
    }
    let (int_part, frac_part) = split_decimal(value)?;
    // 末尾的 0 不占精度，"1.0" 在 0 位精度下合法
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.len() > decimals as usize {
        return Err(CoreError::InvalidAmount(format!(
            "{} has more than {} fractional digits",
            value, decimals
        )));
    }

    // 右侧补零后整体作为一个整数解析
    let padding = "0".repeat(decimals as usize - frac_part.len());
    let digits = format!("{}{}{}", int_part, frac_part, padding);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(digits)
        .map_err(|_| CoreError::InvalidAmount(format!("amount out of range: {}", value)))
}

/// 只校验写法（非负纯十进制），不关心精度与范围
pub fn validate_decimal(value: &str) -> Result<(), CoreError> {
    split_decimal(value).map(|_| ())
}

fn split_decimal(value: &str) -> Result<(&str, &str), CoreError> {
    if value.is_empty() {
        return Err(CoreError::InvalidAmount("amount is empty".into()));
    }
    if value.starts_with('-') {
        return Err(CoreError::InvalidAmount(format!(
            "negative amount not allowed: {}",
            value
        )));
    }

    let (int_part, frac_part, has_dot) = match value.split_once('.') {
        Some((i, f)) => (i, f, true),
        None => (value, "", false),
    };

    if int_part.is_empty()
        || (has_dot && frac_part.is_empty())
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(CoreError::InvalidAmount(format!(
            "not a plain decimal number: {}",
            value
        )));
    }
    Ok((int_part, frac_part))
}

/// 最小单位整数 -> 规范化十进制字符串
///
/// 去掉小数部分末尾的 0；小数部分为空时不输出小数点。
pub fn from_base_units(amount: U256, decimals: u8) -> String {
    let decimals = decimals.min(MAX_DECIMALS) as usize;
    if decimals == 0 {
        return amount.to_string();
    }

    let unit = U256::exp10(decimals);
    let int_part = amount / unit;
    let frac_part = amount % unit;

    if frac_part.is_zero() {
        return int_part.to_string();
    }

    let frac = format!("{:0>width$}", frac_part.to_string(), width = decimals);
    format!("{}.{}", int_part, frac.trim_end_matches('0'))
}

/// 将任意合法十进制字符串规范化（去掉多余的前导/尾随 0）
pub fn canonicalize(value: &str, decimals: u8) -> Result<String, CoreError> {
    to_base_units(value, decimals).map(|v| from_base_units(v, decimals))
}

pub fn wei_to_gwei(wei: U256) -> String {
    from_base_units(wei, GWEI_DECIMALS)
}

pub fn gwei_to_wei(gwei: &str) -> Result<U256, CoreError> {
    to_base_units(gwei, GWEI_DECIMALS)
}

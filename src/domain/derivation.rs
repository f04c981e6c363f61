//! 以太坊地址派生与解析
//!
//! 地址 = Keccak256(未压缩公钥去掉 0x04 前缀)[12..]，输出 EIP-55 校验和格式。

use ethers::{types::Address, utils::to_checksum};
use sha3::{Digest, Keccak256};

use super::error::CoreError;

/// 从公钥派生地址
///
/// 接受 65 字节（0x04 前缀）或 64 字节未压缩公钥。
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address, CoreError> {
    let point = match public_key.len() {
        65 if public_key[0] == 0x04 => &public_key[1..],
        64 => public_key,
        n => {
            return Err(CoreError::Signing(format!(
                "expected uncompressed secp256k1 public key, got {} bytes",
                n
            )))
        }
    };

    let hash = Keccak256::digest(point);
    Ok(Address::from_slice(&hash[12..]))
}

/// EIP-55 校验和地址字符串
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

/// 解析用户提交的地址
///
/// 全小写/全大写视为无校验和；大小写混合时必须满足 EIP-55。
pub fn parse_address(input: &str) -> Result<Address, CoreError> {
    let hex_part = input
        .strip_prefix("0x")
        .ok_or_else(|| CoreError::InvalidAddress(format!("{} is missing 0x prefix", input)))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidAddress(format!(
            "{} is not a 20-byte hex address",
            input
        )));
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(hex_part, &mut bytes)
        .map_err(|e| CoreError::InvalidAddress(format!("{}: {}", input, e)))?;
    let address = Address::from(bytes);

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && checksum(&address) != input {
        return Err(CoreError::InvalidAddress(format!(
            "{} fails EIP-55 checksum",
            input
        )));
    }

    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 私钥 0x...01 对应的公钥（secp256k1 生成元 G）
    const G_UNCOMPRESSED: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    #[test]
    fn test_address_from_generator_point() {
        let public_key = hex::decode(G_UNCOMPRESSED).unwrap();
        let address = address_from_public_key(&public_key).unwrap();
        assert_eq!(
            checksum(&address),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );

        // 64 字节形式得到相同结果
        let raw = address_from_public_key(&public_key[1..]).unwrap();
        assert_eq!(raw, address);
    }

    #[test]
    fn test_rejects_compressed_key() {
        let compressed = [0x02u8; 33];
        assert!(address_from_public_key(&compressed).is_err());
    }

    #[test]
    fn test_parse_address_variants() {
        let checksummed = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
        let lower = checksummed.to_lowercase();
        let a = parse_address(checksummed).unwrap();
        let b = parse_address(&lower).unwrap();
        assert_eq!(a, b);
        assert_eq!(checksum(&b), checksummed);
    }

    #[test]
    fn test_parse_address_rejects_bad_input() {
        assert!(parse_address("7E5F4552091A69125d5DfCb7b8C2659029395Bdf").is_err());
        assert!(parse_address("0x123").is_err());
        assert!(parse_address("0xGGGG4552091A69125d5DfCb7b8C2659029395Bdf").is_err());
        // 错误的大小写组合
        assert!(matches!(
            parse_address("0x7e5F4552091A69125d5DfCb7b8C2659029395Bdf"),
            Err(CoreError::InvalidAddress(_))
        ));
    }
}

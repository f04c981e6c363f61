//! 密钥对生成能力
//!
//! 核心只依赖 `KeyGenerator` trait；默认实现 `LocalKeyGenerator`
//! 在进程内用操作系统随机源生成 secp256k1 私钥。

use k256::ecdsa::SigningKey;

use crate::domain::{entities::PrivateKey, error::CoreError};

/// 生成结果：私钥 + 65 字节未压缩公钥（0x04 前缀）
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: Vec<u8>,
}

pub trait KeyGenerator: Send + Sync {
    fn generate_key_pair(&self) -> Result<KeyPair, CoreError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalKeyGenerator;

impl KeyGenerator for LocalKeyGenerator {
    fn generate_key_pair(&self) -> Result<KeyPair, CoreError> {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false) // 未压缩格式
            .as_bytes()
            .to_vec();

        Ok(KeyPair {
            private_key: PrivateKey::new(signing_key.to_bytes().to_vec()),
            public_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::derivation::address_from_public_key;

    #[test]
    fn test_generates_uncompressed_keys() {
        let pair = LocalKeyGenerator.generate_key_pair().unwrap();
        assert_eq!(pair.private_key.as_bytes().len(), 32);
        assert_eq!(pair.public_key.len(), 65);
        assert_eq!(pair.public_key[0], 0x04);
    }

    #[test]
    fn test_public_key_matches_private_key() {
        let pair = LocalKeyGenerator.generate_key_pair().unwrap();

        let restored = SigningKey::from_slice(pair.private_key.as_bytes()).unwrap();
        let expected = restored.verifying_key().to_encoded_point(false);
        assert_eq!(expected.as_bytes(), pair.public_key.as_slice());

        // 与 ethers 钱包派生的地址一致
        let wallet =
            ethers::signers::LocalWallet::from_bytes(pair.private_key.as_bytes()).unwrap();
        let derived = address_from_public_key(&pair.public_key).unwrap();
        assert_eq!(ethers::signers::Signer::address(&wallet), derived);
    }

    #[test]
    fn test_keys_are_unique() {
        let a = LocalKeyGenerator.generate_key_pair().unwrap();
        let b = LocalKeyGenerator.generate_key_pair().unwrap();
        assert_ne!(a.private_key.as_bytes(), b.private_key.as_bytes());
    }
}

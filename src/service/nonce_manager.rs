//! Nonce 管理器
//!
//! 每个发送地址一把异步锁，覆盖"取 nonce → 签名 → 广播"全过程。
//! 锁内记住本地最后一次成功广播使用的 nonce：
//! 节点的 pending nonce 滞后时，仍取 max(链上 nonce, 本地 + 1)。

use std::{collections::HashMap, sync::Arc};

use ethers::types::{Address, U256};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct NonceManager {
    slots: Mutex<HashMap<Address, Arc<Mutex<Option<U256>>>>>,
}

/// 持有期间同一地址的其他构建请求会等待
pub struct NonceGuard {
    address: Address,
    last_used: OwnedMutexGuard<Option<U256>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取地址的独占锁
    pub async fn lock(&self, address: Address) -> NonceGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(address).or_default().clone()
        };

        NonceGuard {
            address,
            last_used: slot.lock_owned().await,
        }
    }
}

impl NonceGuard {
    /// 计算本次应使用的 nonce
    pub fn next(&self, chain_nonce: U256) -> U256 {
        match *self.last_used {
            Some(last) if last + U256::one() > chain_nonce => {
                tracing::debug!(
                    address = ?self.address,
                    chain_nonce = %chain_nonce,
                    local_next = %(last + U256::one()),
                    "Node pending nonce lags local state"
                );
                last + U256::one()
            }
            _ => chain_nonce,
        }
    }

    /// 广播成功后记录已使用的 nonce
    pub fn commit(&mut self, used: U256) {
        *self.last_used = Some(used);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_next_prefers_higher_value() {
        let manager = NonceManager::new();
        let address = Address::repeat_byte(1);

        let mut guard = manager.lock(address).await;
        assert_eq!(guard.next(U256::from(5)), U256::from(5));
        guard.commit(U256::from(5));
        // 节点仍返回 5
        assert_eq!(guard.next(U256::from(5)), U256::from(6));
        // 节点领先于本地
        assert_eq!(guard.next(U256::from(9)), U256::from(9));
    }

    #[tokio::test]
    async fn test_uncommitted_nonce_is_reused() {
        let manager = NonceManager::new();
        let address = Address::repeat_byte(2);

        {
            let guard = manager.lock(address).await;
            assert_eq!(guard.next(U256::from(3)), U256::from(3));
            // 广播失败，不提交
        }

        let guard = manager.lock(address).await;
        assert_eq!(guard.next(U256::from(3)), U256::from(3));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_per_address() {
        let manager = Arc::new(NonceManager::new());
        let address = Address::repeat_byte(3);

        let guard = manager.lock(address).await;

        let contender = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.lock(address).await.next(U256::zero()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // 其他地址不受影响
        let _other = manager.lock(Address::repeat_byte(4)).await;

        drop(guard);
        assert_eq!(contender.await.unwrap(), U256::zero());
    }
}

//! 代币精度解析
//! ETH 固定 18 位；ERC-20 通过 `decimals()` 只读调用查询并按合约缓存

use std::{collections::HashMap, sync::Arc};

use ethers::types::Address;
use tokio::sync::RwLock;

use crate::{
    domain::{
        derivation::checksum,
        entities::Asset,
        error::CoreError,
        transfer_codec::{decode_decimals, encode_decimals_call},
        units::{ETH_DECIMALS, MAX_DECIMALS},
    },
    service::chain_gateway::{ChainGateway, GatewayError},
};

pub struct TokenService {
    gateway: Arc<dyn ChainGateway>,
    decimals_cache: RwLock<HashMap<Address, u8>>,
}

impl TokenService {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self {
            gateway,
            decimals_cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn decimals(&self, asset: &Asset) -> Result<u8, CoreError> {
        let contract = match asset {
            Asset::Eth => return Ok(ETH_DECIMALS),
            Asset::Erc20(contract) => *contract,
        };

        if let Some(decimals) = self.decimals_cache.read().await.get(&contract) {
            return Ok(*decimals);
        }

        let output = match self.gateway.call(contract, encode_decimals_call()).await {
            Ok(output) => output,
            // 合约未实现 decimals()
            Err(GatewayError::Rpc(msg)) if msg.contains("revert") => {
                return Err(CoreError::UnsupportedToken(checksum(&contract)));
            }
            Err(e) => return Err(e.into()),
        };
        let decimals = decode_decimals(&output)
            .filter(|d| *d <= MAX_DECIMALS)
            .ok_or_else(|| CoreError::UnsupportedToken(checksum(&contract)))?;

        tracing::debug!(contract = %checksum(&contract), decimals, "Resolved token decimals");
        self.decimals_cache.write().await.insert(contract, decimals);
        Ok(decimals)
    }
}

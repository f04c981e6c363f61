//! 交易构建、签名与广播
//!
//! 流程：
//! 1. 校验输入、查找发送方私钥
//! 2. 解析精度并换算金额
//! 3. 计算 gas price（legacy：节点报价 × (100 + margin) / 100）与 gas limit
//! 4. 在发送方锁内：取 nonce → 签名（EIP-155）→ 广播
//! 5. 广播成功后写入 pending 记录
//!
//! 广播失败不会自动重试，也不会落库。

use std::sync::Arc;

use chrono::Utc;
use ethers::{
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, U256,
    },
};
use uuid::Uuid;

use crate::{
    domain::{
        derivation::{checksum, parse_address},
        entities::{hash_hex, Asset, PendingTransaction, PrivateKey},
        error::CoreError,
        transaction_status::TransactionStatus,
        transfer_codec::encode_transfer_call,
        units::{from_base_units, to_base_units, validate_decimal, wei_to_gwei},
    },
    infrastructure::log_redact::redact_address,
    metrics,
    repository::PendingTransactionRepository,
    service::{
        address_book::AddressBook,
        chain_gateway::{ChainGateway, GatewayError},
        nonce_manager::NonceManager,
        token_service::TokenService,
    },
};

/// 原生 ETH 转账固定 gas
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Gas 策略（legacy 交易）
#[derive(Debug, Clone)]
pub struct GasPolicy {
    pub chain_id: u64,
    /// 在节点报价基础上上浮的百分比
    pub gas_price_margin_percent: u64,
    /// ERC-20 估算失败时使用
    pub erc20_fallback_gas_limit: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            chain_id: 11_155_111,
            gas_price_margin_percent: 20,
            erc20_fallback_gas_limit: 100_000,
        }
    }
}

/// 转账请求（金额为人类可读单位）
#[derive(Debug, Clone, Default)]
pub struct TransferRequest {
    pub from_address: String,
    pub to_address: String,
    pub asset: String,
    pub value: String,
}

pub struct TransactionBuilder {
    gateway: Arc<dyn ChainGateway>,
    address_book: Arc<AddressBook>,
    tokens: Arc<TokenService>,
    nonces: Arc<NonceManager>,
    repo: Arc<dyn PendingTransactionRepository>,
    policy: GasPolicy,
}

impl TransactionBuilder {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        address_book: Arc<AddressBook>,
        tokens: Arc<TokenService>,
        nonces: Arc<NonceManager>,
        repo: Arc<dyn PendingTransactionRepository>,
        policy: GasPolicy,
    ) -> Self {
        Self {
            gateway,
            address_book,
            tokens,
            nonces,
            repo,
            policy,
        }
    }

    pub async fn build(&self, request: &TransferRequest) -> Result<PendingTransaction, CoreError> {
        // 1. 输入校验（无副作用）
        let from = parse_address(required("from_address", &request.from_address)?)?;
        let to = parse_address(required("to_address", &request.to_address)?)?;
        let asset: Asset = required("asset", &request.asset)?.parse()?;
        let value = required("value", &request.value)?;
        validate_decimal(value)?;

        let key = self
            .address_book
            .signing_key(&from)
            .await?
            .ok_or_else(|| CoreError::UnknownSenderKey(checksum(&from)))?;

        // 2. 金额换算
        let decimals = self.tokens.decimals(&asset).await?;
        let amount = to_base_units(value, decimals)?;

        // 3. Gas
        let gas_price = self.gas_price().await?;
        let draft = self.draft(from, to, &asset, amount, gas_price);
        let gas_limit = self.gas_limit(&asset, &draft).await;

        // 4. 发送方锁内：nonce → 签名 → 广播
        let mut guard = self.nonces.lock(from).await;
        let chain_nonce = self.gateway.get_nonce(from).await?;
        let nonce = guard.next(chain_nonce);

        let tx: TypedTransaction = draft.gas(gas_limit).nonce(nonce).into();
        let raw = sign(&key, self.policy.chain_id, &tx)?;

        let tx_hash = match self.gateway.submit_raw(raw).await {
            Ok(hash) => hash,
            Err(e) => {
                metrics::record_broadcast(false);
                tracing::warn!(
                    from = %redact_address(&checksum(&from)),
                    nonce = %nonce,
                    error = %e,
                    "Transaction broadcast failed"
                );
                return Err(broadcast_error(e));
            }
        };
        guard.commit(nonce);
        drop(guard);
        metrics::record_broadcast(true);

        let tx_hash = hash_hex(&tx_hash);
        tracing::info!(
            tx_hash = %tx_hash,
            from = %checksum(&from),
            asset = %asset,
            nonce = %nonce,
            "Transaction broadcast"
        );

        // 5. 落库
        let now = Utc::now();
        let record = PendingTransaction {
            id: Uuid::new_v4(),
            tx_hash: tx_hash.clone(),
            from_address: checksum(&from),
            to_address: checksum(&to),
            asset: asset.to_string(),
            value: from_base_units(amount, decimals),
            status: TransactionStatus::Pending,
            gas_price_gwei: wei_to_gwei(gas_price),
            gas_limit,
            nonce: nonce.low_u64(),
            effective_cost_wei: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.repo.save(&record).await {
            // 交易已广播但记录缺失，需人工补录
            tracing::error!(
                tx_hash = %tx_hash,
                error = ?e,
                "Broadcast transaction could not be recorded"
            );
            return Err(CoreError::Storage(e));
        }

        Ok(record)
    }

    async fn gas_price(&self) -> Result<U256, CoreError> {
        let quoted = self.gateway.get_gas_price().await?;
        let multiplier = U256::from(100 + self.policy.gas_price_margin_percent);
        quoted
            .checked_mul(multiplier)
            .map(|v| v / U256::from(100))
            .ok_or_else(|| CoreError::Gateway(format!("gas price {} out of range", quoted)))
    }

    fn draft(
        &self,
        from: Address,
        to: Address,
        asset: &Asset,
        amount: U256,
        gas_price: U256,
    ) -> TransactionRequest {
        let base = TransactionRequest::new()
            .from(from)
            .gas_price(gas_price)
            .chain_id(self.policy.chain_id);

        match asset {
            Asset::Eth => base.to(to).value(amount),
            Asset::Erc20(contract) => base
                .to(*contract)
                .value(U256::zero())
                .data(encode_transfer_call(to, amount)),
        }
    }

    async fn gas_limit(&self, asset: &Asset, draft: &TransactionRequest) -> u64 {
        if asset.is_native() {
            return NATIVE_TRANSFER_GAS;
        }

        let fallback = self.policy.erc20_fallback_gas_limit;
        let typed: TypedTransaction = draft.clone().into();
        match self.gateway.estimate_gas(&typed).await {
            Ok(estimate) if estimate <= U256::from(u64::MAX) => estimate.as_u64(),
            Ok(estimate) => {
                tracing::warn!(%estimate, fallback, "Gas estimate out of range, using fallback");
                fallback
            }
            Err(e) => {
                tracing::warn!(error = %e, fallback, "Gas estimation failed, using fallback");
                fallback
            }
        }
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::MissingField(field));
    }
    Ok(trimmed)
}

fn sign(key: &PrivateKey, chain_id: u64, tx: &TypedTransaction) -> Result<Bytes, CoreError> {
    let wallet = LocalWallet::from_bytes(key.as_bytes())
        .map_err(|e| CoreError::Signing(e.to_string()))?
        .with_chain_id(chain_id);
    let signature = wallet
        .sign_transaction_sync(tx)
        .map_err(|e| CoreError::Signing(e.to_string()))?;
    Ok(tx.rlp_signed(&signature))
}

/// 广播阶段的错误分类：非余额、非超时的拒绝一律视为广播失败
fn broadcast_error(err: GatewayError) -> CoreError {
    match err {
        GatewayError::Timeout(op) => CoreError::GatewayTimeout(op),
        GatewayError::InsufficientFunds(msg) => CoreError::InsufficientFunds(msg),
        GatewayError::Rpc(msg) => CoreError::BroadcastFailure(msg),
    }
}

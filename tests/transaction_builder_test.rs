//! 交易构建、签名与广播集成测试

mod common;

use std::{collections::HashSet, sync::Arc, time::Duration};

use common::{addr, test_config, Harness, GWEI};
use ethers::types::{Address, U256};
use ethflow::{
    domain::{derivation::checksum, error::CoreError, transaction_status::TransactionStatus},
    service::{chain_gateway::GatewayError, transaction_builder::TransferRequest},
};

fn eth_request(from: Address, to: Address, value: &str) -> TransferRequest {
    TransferRequest {
        from_address: checksum(&from),
        to_address: checksum(&to),
        asset: "ETH".into(),
        value: value.into(),
    }
}

async fn recorded(h: &Harness) -> usize {
    h.state.repositories.pending.find_all().await.unwrap().len()
}

#[tokio::test]
async fn test_eth_transfer_is_signed_broadcast_and_recorded() {
    let h = Harness::new();
    let from = h.managed_address().await;
    let to = addr(0x22);
    h.gateway.with(|s| s.chain_nonce = U256::from(4));

    let record = h
        .state
        .builder
        .build(&eth_request(from, to, "1.5"))
        .await
        .unwrap();

    assert_eq!(record.status, TransactionStatus::Pending);
    assert_eq!(record.from_address, checksum(&from));
    assert_eq!(record.to_address, checksum(&to));
    assert_eq!(record.asset, "ETH");
    assert_eq!(record.value, "1.5");
    assert_eq!(record.gas_limit, 21_000);
    assert_eq!(record.nonce, 4);
    // 20 gwei × 1.2
    assert_eq!(record.gas_price_gwei, "24");
    assert!(record.effective_cost_wei.is_none());

    let submitted = h.gateway.submitted();
    assert_eq!(submitted.len(), 1);
    let tx = &submitted[0];
    assert_eq!(tx.recover_from().unwrap(), from);
    assert_eq!(tx.to, Some(to));
    assert_eq!(tx.value, U256::from(1_500_000_000_000_000_000u64));
    assert_eq!(tx.nonce, U256::from(4));
    assert_eq!(tx.gas, U256::from(21_000));
    assert_eq!(tx.gas_price, Some(U256::from(24 * GWEI)));
    assert_eq!(format!("{:#x}", tx.hash), record.tx_hash);

    let stored = h
        .state
        .repositories
        .pending
        .find_by_hash(&record.tx_hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
async fn test_erc20_transfer_uses_token_decimals_and_fallback_gas() {
    let h = Harness::new();
    let from = h.managed_address().await;
    let token = addr(0xaa);
    let to = addr(0x33);
    h.gateway.set_decimals(token, 6);

    let record = h
        .state
        .builder
        .build(&TransferRequest {
            from_address: checksum(&from),
            to_address: checksum(&to),
            asset: checksum(&token),
            value: "2.5".into(),
        })
        .await
        .unwrap();

    assert_eq!(record.asset, checksum(&token));
    assert_eq!(record.value, "2.5");
    assert_eq!(record.gas_limit, 100_000);
    assert_eq!(
        h.gateway
            .estimate_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );

    let tx = &h.gateway.submitted()[0];
    assert_eq!(tx.to, Some(token));
    assert!(tx.value.is_zero());
    assert_eq!(&tx.input[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
    assert_eq!(&tx.input[16..36], to.as_bytes());
    assert_eq!(U256::from_big_endian(&tx.input[36..68]), U256::from(2_500_000));
}

#[tokio::test]
async fn test_erc20_uses_node_estimate_when_available() {
    let h = Harness::new();
    let from = h.managed_address().await;
    let token = addr(0xab);
    h.gateway.set_decimals(token, 18);
    h.gateway.with(|s| s.estimate = Some(U256::from(52_000)));

    let record = h
        .state
        .builder
        .build(&TransferRequest {
            from_address: checksum(&from),
            to_address: checksum(&addr(0x34)),
            asset: checksum(&token),
            value: "1".into(),
        })
        .await
        .unwrap();

    assert_eq!(record.gas_limit, 52_000);
}

#[tokio::test]
async fn test_invalid_amounts_have_no_side_effects() {
    let h = Harness::new();
    let from = h.managed_address().await;

    for value in ["1.23456789012345678901", "-1", "1e18", "abc", "1.2.3"] {
        let err = h
            .state
            .builder
            .build(&eth_request(from, addr(0x22), value))
            .await
            .unwrap_err();
        assert!(
            matches!(err, CoreError::InvalidAmount(_)),
            "{} -> {:?}",
            value,
            err
        );
    }

    assert_eq!(h.gateway.submit_calls(), 0);
    assert_eq!(recorded(&h).await, 0);
}

#[tokio::test]
async fn test_missing_fields_and_bad_addresses() {
    let h = Harness::new();
    let from = h.managed_address().await;

    let mut request = eth_request(from, addr(0x22), "1");
    request.asset = "  ".into();
    assert!(matches!(
        h.state.builder.build(&request).await,
        Err(CoreError::MissingField("asset"))
    ));

    let mut request = eth_request(from, addr(0x22), "1");
    request.to_address = "0x1234".into();
    assert!(matches!(
        h.state.builder.build(&request).await,
        Err(CoreError::InvalidAddress(_))
    ));

    assert_eq!(h.gateway.submit_calls(), 0);
}

#[tokio::test]
async fn test_unknown_sender_is_rejected_before_broadcast() {
    let h = Harness::new();

    let err = h
        .state
        .builder
        .build(&eth_request(addr(0x11), addr(0x22), "1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::UnknownSenderKey(ref a) if *a == checksum(&addr(0x11))));
    assert_eq!(h.gateway.submit_calls(), 0);
}

#[tokio::test]
async fn test_broadcast_failure_is_not_retried_or_recorded() {
    let h = Harness::new();
    let from = h.managed_address().await;
    h.gateway
        .with(|s| s.submit_error = Some(GatewayError::Rpc("nonce too low".into())));

    let err = h
        .state
        .builder
        .build(&eth_request(from, addr(0x22), "1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::BroadcastFailure(_)));
    assert_eq!(h.gateway.submit_calls(), 1);
    assert_eq!(recorded(&h).await, 0);
}

#[tokio::test]
async fn test_insufficient_funds_is_surfaced() {
    let h = Harness::new();
    let from = h.managed_address().await;
    h.gateway.with(|s| {
        s.submit_error = Some(GatewayError::InsufficientFunds(
            "insufficient funds for gas * price + value".into(),
        ))
    });

    let err = h
        .state
        .builder
        .build(&eth_request(from, addr(0x22), "100"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InsufficientFunds(_)));
    assert_eq!(recorded(&h).await, 0);
}

#[tokio::test]
async fn test_broadcast_timeout_leaves_no_record() {
    let mut config = test_config();
    config.blockchain.request_timeout_secs = 1;
    let h = Harness::with_config(config);
    let from = h.managed_address().await;
    h.gateway.with(|s| s.submit_delay = Duration::from_secs(3));

    let err = h
        .state
        .builder
        .build(&eth_request(from, addr(0x22), "1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::GatewayTimeout("submit_raw")));
    assert!(err.is_retryable());
    assert_eq!(recorded(&h).await, 0);
}

#[tokio::test]
async fn test_concurrent_builds_never_share_a_nonce() {
    let h = Harness::new();
    let from = h.managed_address().await;
    // 节点始终返回 7，模拟 pending nonce 滞后
    h.gateway.with(|s| s.chain_nonce = U256::from(7));

    let builder = h.state.builder.clone();
    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let builder = Arc::clone(&builder);
            let request = eth_request(from, addr(0x40 + i), "0.1");
            tokio::spawn(async move { builder.build(&request).await })
        })
        .collect();

    let mut nonces = HashSet::new();
    for task in tasks {
        let record = task.await.unwrap().unwrap();
        assert!(nonces.insert(record.nonce), "nonce {} reused", record.nonce);
    }

    assert_eq!(nonces, (7..12).collect::<HashSet<u64>>());
    assert_eq!(recorded(&h).await, 5);
}

#[tokio::test]
async fn test_failed_broadcast_does_not_consume_nonce() {
    let h = Harness::new();
    let from = h.managed_address().await;
    h.gateway.with(|s| {
        s.chain_nonce = U256::from(3);
        s.submit_error = Some(GatewayError::Rpc("replacement underpriced".into()));
    });
    assert!(h
        .state
        .builder
        .build(&eth_request(from, addr(0x22), "1"))
        .await
        .is_err());

    h.gateway.with(|s| s.submit_error = None);
    let record = h
        .state
        .builder
        .build(&eth_request(from, addr(0x22), "1"))
        .await
        .unwrap();
    assert_eq!(record.nonce, 3);
}

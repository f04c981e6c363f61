//! 地址生成集成测试

mod common;

use std::collections::HashSet;

use common::Harness;
use ethflow::domain::{derivation::parse_address, error::CoreError};

#[tokio::test]
async fn test_generate_zero_is_invalid_count() {
    let h = Harness::new();

    assert!(matches!(
        h.state.address_book.generate(0).await,
        Err(CoreError::InvalidCount(0))
    ));
    assert!(matches!(
        h.state.address_book.generate(1001).await,
        Err(CoreError::InvalidCount(1001))
    ));
    assert!(h.state.address_book.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_generate_three_distinct_addresses() {
    let h = Harness::new();

    let created = h.state.address_book.generate(3).await.unwrap();
    assert_eq!(created.len(), 3);

    let unique: HashSet<_> = created.iter().map(|a| a.address.clone()).collect();
    assert_eq!(unique.len(), 3);

    let stored = h.state.address_book.list().await.unwrap();
    assert_eq!(stored, created);

    for record in &created {
        // EIP-55 校验和格式
        assert!(parse_address(&record.address).is_ok());
        assert!(h
            .state
            .repositories
            .addresses
            .find_private_key(&record.address)
            .await
            .unwrap()
            .is_some());
    }

    // 返回值只包含公开字段
    let json = serde_json::to_value(&created).unwrap();
    for item in json.as_array().unwrap() {
        let keys: HashSet<_> = item.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            ["id", "address", "created_at"]
                .iter()
                .map(|k| k.to_string())
                .collect()
        );
    }
}

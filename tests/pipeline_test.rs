//! Whole pipeline: config files, address file, subscribe, ingest, show, clean

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use datamarket_bundle::{BundleData, BundleStore, ParquetBundleStore, Row};
use datamarket_config::{validate_config, ConfigLoader};
use datamarket_ledger::MockLedger;
use datamarket_marketplace::{AutoConfirm, MarketplaceError, MarketplaceSession};
use datamarket_orchestrator::{LoopbackSigner, NoProgress};
use datamarket_types::{DataFrequency, DatasetId};
use std::path::Path;
use std::sync::Arc;

const OWNER: &str = "0x00000000000000000000000000000000000000f0";
const BOUNDARY: &str = "pipeline-test-boundary-7f3a";
const SUBSCRIBER: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

fn part(rows: Vec<Row>) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("part.parquet");
    let data = BundleData::new(DataFrequency::Hourly, vec!["price".into()], rows).unwrap();
    ParquetBundleStore.write(&path, &data).unwrap();
    std::fs::read(path).unwrap()
}

async fn ingest(headers: HeaderMap) -> Response {
    if headers.get("key").and_then(|v| v.to_str().ok()) != Some("sub-key") {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut body = Vec::new();
    let parts = [
        ("2024-01.parquet", part(vec![Row::new(3600, "BTC", vec![Some(1.0)])])),
        ("2024-02.parquet", part(vec![Row::new(7200, "BTC", vec![Some(2.0)])])),
    ];
    for (name, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: attachment; filename=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/mixed; boundary={BOUNDARY}"),
        )],
        body,
    )
        .into_response()
}

async fn spawn_service() -> String {
    let app = Router::new().route("/marketplace/ingest", post(ingest));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[test]
fn test_shipped_configs_are_valid() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("config");

    let testnet = ConfigLoader::from_file(&root.join("testnet.toml")).unwrap();
    validate_config(&testnet).unwrap();
    assert!(testnet.network.is_testnet());
    assert_eq!(testnet.network.gas_ceiling, 4_700_000);

    let mainnet = ConfigLoader::from_file(&root.join("mainnet.toml")).unwrap();
    validate_config(&mainnet).unwrap();
    assert!(!mainnet.network.is_testnet());
    assert_eq!(mainnet.ledger.token_decimals, 8);
}

#[tokio::test]
async fn test_subscribe_ingest_show_clean() {
    let url = spawn_service().await;
    let mock = Arc::new(MockLedger::new());
    let dir = tempfile::tempdir().unwrap();

    let addresses_file = dir.path().join("addresses.json");
    std::fs::write(
        &addresses_file,
        format!(r#"[{{"pubAddr": "{SUBSCRIBER}", "desc": "main", "key": "sub-key", "secret": "sub-secret"}}]"#),
    )
    .unwrap();

    let config = ConfigLoader::from_toml(&format!(
        r#"
        [network]
        environment = "testnet"

        [ledger]
        rpc_url = "http://127.0.0.1:1"
        registry_contract = "{}"
        token_contract = "{}"

        [ingestion]
        base_url = "{}"

        [storage]
        root = '{}'

        [polling]
        interval_secs = 1
        batch_size = 1
        max_wait_secs = 30

        [addresses]
        path = '{}'
        "#,
        mock.registry_address(),
        mock.token_address(),
        url,
        dir.path().join("bundles").display(),
        addresses_file.display(),
    ))
    .unwrap();
    validate_config(&config).unwrap();

    let addresses = ConfigLoader::load_addresses(&config.addresses.path).unwrap();
    let session = MarketplaceSession::from_config(
        &config,
        addresses,
        mock.clone(),
        Arc::new(LoopbackSigner),
        Arc::new(NoProgress),
    )
    .unwrap();

    let dataset = DatasetId::new("BTC-Prices").unwrap();
    let subscriber = SUBSCRIBER.parse().unwrap();
    mock.register_provider(&dataset, OWNER.parse().unwrap(), 5);
    mock.set_balance(subscriber, 6 * 10u128.pow(8));

    assert_eq!(session.list().await.unwrap(), vec![dataset.clone()]);

    // Not subscribed yet
    let err = session.ingest(&dataset, 0).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::SubscriptionExpired { .. }));

    session.subscribe(&dataset, 0, &AutoConfirm).await.unwrap();
    let report = session.ingest(&dataset, 0).await.unwrap();
    assert_eq!(report.parts.len(), 2);

    let bundle = session
        .show(&dataset, DataFrequency::Hourly, None)
        .await
        .unwrap();
    let dates: Vec<_> = bundle.rows.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![3600, 7200]);

    assert!(session
        .clean(&dataset, Some(DataFrequency::Hourly))
        .await
        .unwrap());
    assert!(session
        .show(&dataset, DataFrequency::Hourly, None)
        .await
        .is_err());
}

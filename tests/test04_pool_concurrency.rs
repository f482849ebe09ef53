use std::sync::Arc;
use std::time::Duration;

use sql_warehouse::prelude::*;
use sql_warehouse::test_utils::mock::MockDriver;
use tokio::runtime::Runtime;

fn postgres_creds() -> Credentials {
    Credentials::new("svc", "secret", "pg1", 5432).with_database("warehouse")
}

#[test]
fn pool_opens_min_connections_up_front() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::postgres();
        let db = ConnectionManager::connect(
            driver.clone(),
            ManagerConfig::pooled()
                .with_min_connections(2)
                .with_max_connections(5),
            postgres_creds(),
        )
        .await?;

        assert_eq!(driver.connect_attempts(), 2);
        let status = db.status().await;
        assert_eq!(status.mode, ConnectionMode::Pooled);
        assert_eq!(status.pool_size, Some(2));
        assert_eq!(status.pool_available, Some(2));
        assert_eq!(status.pool_max_size, Some(5));
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn checkouts_never_exceed_max_connections() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::postgres();
        driver.set_rows(&["n"], vec![vec![RowValues::Int(1)]]);
        driver.set_hold(Duration::from_millis(50));
        let db = Arc::new(
            ConnectionManager::connect(
                driver.clone(),
                ManagerConfig::pooled()
                    .with_min_connections(2)
                    .with_max_connections(5),
                postgres_creds(),
            )
            .await?,
        );

        let mut handles = Vec::new();
        for _ in 0..6 {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                db.fetch("SELECT 1 AS n", Params::None).await
            }));
        }
        for handle in handles {
            let rows = handle.await??;
            assert_eq!(rows.len(), 1);
        }

        assert_eq!(driver.max_in_flight(), 5);
        assert!(driver.connect_attempts() <= 5);
        let status = db.status().await;
        assert_eq!(status.pool_available, status.pool_size);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn pool_close_stops_checkouts() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::postgres();
        let db = ConnectionManager::connect(driver.clone(), ManagerConfig::pooled(), postgres_creds())
            .await?;
        let conn = db.get_connection().await?;
        assert!(conn.is_pooled());
        db.release(conn);

        db.close().await?;
        let err = db.get_connection().await.unwrap_err();
        assert!(matches!(err, SqlWarehouseError::NotConnected(_)));

        db.reconnect().await?;
        db.execute("DELETE FROM items").await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn invalid_pool_sizes_are_rejected() {
    let zero = ConnectionManager::new(
        MockDriver::postgres(),
        ManagerConfig::pooled().with_max_connections(0),
    );
    assert!(matches!(zero, Err(SqlWarehouseError::ConfigError(_))));

    let inverted = ConnectionManager::new(
        MockDriver::postgres(),
        ManagerConfig::pooled()
            .with_min_connections(6)
            .with_max_connections(5),
    );
    assert!(matches!(inverted, Err(SqlWarehouseError::ConfigError(_))));
}

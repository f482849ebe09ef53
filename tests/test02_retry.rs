use std::sync::Arc;
use std::time::Duration;

use sql_warehouse::prelude::*;
use sql_warehouse::test_utils::init_test_tracing;
use sql_warehouse::test_utils::mock::{MockDriver, MockEvent, RecordingSleeper};
use tokio::runtime::Runtime;

fn oracle_creds() -> Credentials {
    Credentials::new("svc", "secret", "db1", 1521).with_service("ORCL")
}

async fn oracle_manager(
    driver: &MockDriver,
    retry_limit: u32,
    sleeper: Arc<RecordingSleeper>,
) -> Result<ConnectionManager<MockDriver>, SqlWarehouseError> {
    let db = ConnectionManager::new(
        driver.clone(),
        ManagerConfig::default().with_retry_limit(retry_limit),
    )?
    .with_sleeper(sleeper);
    db.set_user(oracle_creds()).await?;
    driver.clear_events();
    Ok(db)
}

fn attempts(driver: &MockDriver) -> usize {
    driver.statements().len()
}

#[test]
fn transient_failures_are_retried_until_success() -> Result<(), Box<dyn std::error::Error>> {
    init_test_tracing();
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::oracle();
        let sleeper = RecordingSleeper::new();
        let db = oracle_manager(&driver, 3, Arc::clone(&sleeper)).await?;

        driver.fail_statements("ORA-01033", 2);
        let affected = db.execute("DELETE FROM ITEMS").await?;

        assert_eq!(affected, 1);
        assert_eq!(attempts(&driver), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(300), Duration::from_secs(300)]
        );
        // Each failed attempt was rolled back, the last one committed.
        assert_eq!(driver.count(|e| matches!(e, MockEvent::Rollback)), 2);
        assert_eq!(driver.count(|e| matches!(e, MockEvent::Commit)), 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn retries_stop_at_the_limit_with_the_original_error() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::oracle();
        let sleeper = RecordingSleeper::new();
        let db = oracle_manager(&driver, 3, Arc::clone(&sleeper)).await?;

        driver.fail_statements("ORA-03113", 10);
        let err = db.execute("DELETE FROM ITEMS").await.unwrap_err();

        assert_eq!(err.error_code().as_deref(), Some("ORA-03113"));
        assert_eq!(attempts(&driver), 4);
        assert_eq!(sleeper.delays().len(), 3);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn zero_limit_fails_on_first_transient_error() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::oracle();
        let sleeper = RecordingSleeper::new();
        let db = oracle_manager(&driver, 0, Arc::clone(&sleeper)).await?;

        driver.fail_statements("ORA-01033", 1);
        assert!(db.execute("DELETE FROM ITEMS").await.is_err());
        assert_eq!(attempts(&driver), 1);
        assert!(sleeper.delays().is_empty());
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn non_transient_and_uncoded_errors_are_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::oracle();
        let sleeper = RecordingSleeper::new();
        let db = oracle_manager(&driver, 5, Arc::clone(&sleeper)).await?;

        driver.fail_statements("ORA-00942", 1);
        let err = db.fetch("SELECT * FROM MISSING", Params::None).await.unwrap_err();
        assert_eq!(err.error_code().as_deref(), Some("ORA-00942"));
        assert_eq!(attempts(&driver), 1);

        driver.clear_events();
        driver.fail_statement_uncoded("socket reset by peer");
        let err = db.execute("DELETE FROM ITEMS").await.unwrap_err();
        assert_eq!(err.error_code(), None);
        assert_eq!(attempts(&driver), 1);

        assert!(sleeper.delays().is_empty());
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn attempt_counter_resets_for_each_call() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::oracle();
        let sleeper = RecordingSleeper::new();
        let db = oracle_manager(&driver, 2, Arc::clone(&sleeper)).await?;

        driver.fail_statements("ORA-08103", 2);
        db.execute("DELETE FROM A").await?;
        driver.fail_statements("ORA-08103", 2);
        db.execute("DELETE FROM B").await?;

        assert_eq!(attempts(&driver), 6);
        assert_eq!(sleeper.delays().len(), 4);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn connecting_is_retried_too() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::oracle();
        let sleeper = RecordingSleeper::new();
        let db = ConnectionManager::new(driver.clone(), ManagerConfig::default())?
            .with_sleeper(Arc::clone(&sleeper) as Arc<dyn Sleeper>);

        driver.fail_connects("ORA-01033", 2);
        db.set_user(oracle_creds()).await?;

        assert_eq!(driver.connect_attempts(), 3);
        assert_eq!(sleeper.delays().len(), 2);
        assert!(db.is_connected().await);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn postgres_codes_and_overrides() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::postgres();
        let sleeper = RecordingSleeper::new();
        let db = ConnectionManager::new(driver.clone(), ManagerConfig::default())?
            .with_sleeper(Arc::clone(&sleeper) as Arc<dyn Sleeper>);
        db.set_user(Credentials::new("svc", "x", "pg1", 5432).with_database("warehouse"))
            .await?;

        driver.fail_statements("40001", 1);
        db.execute("UPDATE items SET n = n + 1").await?;
        assert_eq!(sleeper.delays().len(), 1);

        driver.fail_statements("42P01", 1);
        assert!(db.execute("UPDATE missing SET n = 1").await.is_err());
        assert_eq!(sleeper.delays().len(), 1);

        // An explicit code list replaces the dialect's.
        let custom_sleeper = RecordingSleeper::new();
        let custom = ConnectionManager::new(
            driver.clone(),
            ManagerConfig::default().with_retry_error_codes(["42P01"]),
        )?
        .with_sleeper(Arc::clone(&custom_sleeper) as Arc<dyn Sleeper>);
        custom
            .set_user(Credentials::new("svc", "x", "pg1", 5432).with_database("warehouse"))
            .await?;
        driver.fail_statements("42P01", 1);
        custom.execute("UPDATE missing SET n = 1").await?;
        driver.fail_statements("40001", 1);
        assert!(custom.execute("UPDATE items SET n = 1").await.is_err());
        assert_eq!(custom_sleeper.delays().len(), 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

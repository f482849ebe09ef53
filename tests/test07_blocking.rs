use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sql_warehouse::blocking::ConnectionManager as BlockingManager;
use sql_warehouse::prelude::*;
use sql_warehouse::test_utils::mock::{MockDriver, MockEvent, RecordingSleeper};

fn oracle_creds() -> Credentials {
    Credentials::new("svc", "secret", "db1", 1521).with_service("ORCL")
}

#[test]
fn blocking_calls_match_async_behaviour() -> Result<(), Box<dyn std::error::Error>> {
    let driver = MockDriver::oracle();
    driver.set_rows(&["ID"], vec![vec![RowValues::Int(7)]]);
    let db = BlockingManager::connect(driver.clone(), ManagerConfig::default(), oracle_creds())?;
    assert!(db.is_connected());

    assert_eq!(db.execute("DELETE FROM ITEMS")?, 1);
    let rows = db.fetch("SELECT ID FROM ITEMS WHERE ID = :ID", Params::named([("ID", 7)]))?;
    assert_eq!(rows.len(), 1);

    let data = Table::new(["ID"], vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]])?;
    assert_eq!(db.export(&data, "ITEMS", &["ID"], false)?, 2);
    assert_eq!(db.remove_matching(&data, "ITEMS", &["ID"])?, 2);
    db.truncate("ITEMS")?;

    assert_eq!(driver.count(|e| matches!(e, MockEvent::Commit)), 5);
    db.close()?;
    assert!(!db.is_connected());
    assert!(matches!(
        db.execute("DELETE FROM ITEMS"),
        Err(SqlWarehouseError::NotConnected(_))
    ));
    Ok(())
}

#[test]
fn blocking_retry_uses_the_same_policy() -> Result<(), Box<dyn std::error::Error>> {
    let driver = MockDriver::oracle();
    let sleeper = RecordingSleeper::new();
    let db = BlockingManager::new(driver.clone(), ManagerConfig::default().with_retry_limit(2))?
        .with_sleeper(sleeper.clone());
    db.set_user(oracle_creds())?;

    driver.fail_statements("ORA-01652", 5);
    let err = db.execute("INSERT INTO T SELECT * FROM BIG").unwrap_err();
    assert_eq!(err.error_code().as_deref(), Some("ORA-01652"));
    assert_eq!(driver.statements().len(), 3);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(300); 2]);
    Ok(())
}

#[test]
fn blocking_thread_sleeper_blocks_the_caller() -> Result<(), Box<dyn std::error::Error>> {
    let driver = MockDriver::oracle();
    let db = BlockingManager::new(
        driver.clone(),
        ManagerConfig::default().with_retry_delay(Duration::from_millis(20)),
    )?;
    db.set_user(oracle_creds())?;

    driver.fail_statements("ORA-01033", 2);
    let started = std::time::Instant::now();
    db.execute("DELETE FROM ITEMS")?;
    assert!(started.elapsed() >= Duration::from_millis(40));
    Ok(())
}

#[test]
fn shared_pool_across_threads() -> Result<(), Box<dyn std::error::Error>> {
    let driver = MockDriver::oracle();
    driver.set_hold(Duration::from_millis(20));
    let db = Arc::new(BlockingManager::connect(
        driver.clone(),
        ManagerConfig::pooled().with_max_connections(2).with_min_connections(1),
        oracle_creds(),
    )?);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let db = Arc::clone(&db);
            thread::spawn(move || db.execute(&format!("DELETE FROM T{i}")))
        })
        .collect();
    for handle in handles {
        handle.join().map_err(|_| "worker thread panicked")??;
    }

    assert_eq!(driver.statements().len(), 4);
    assert!(driver.max_in_flight() <= 2);
    Ok(())
}

#[test]
fn blocking_scoped_closes() -> Result<(), Box<dyn std::error::Error>> {
    let driver = MockDriver::oracle();
    let db = BlockingManager::connect(driver.clone(), ManagerConfig::default(), oracle_creds())?;
    let affected = db.scoped(|db| db.execute("DELETE FROM ITEMS"))?;
    assert_eq!(affected, 1);
    assert!(!db.is_connected());
    assert_eq!(driver.open_connections(), 0);
    Ok(())
}

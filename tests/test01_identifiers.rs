use sql_warehouse::prelude::*;
use sql_warehouse::test_utils::mock::MockDriver;
use tokio::runtime::Runtime;

fn oracle_creds() -> Credentials {
    Credentials::new("svc", "secret", "db1", 1521).with_service("ORCL")
}

#[test]
fn oracle_quoting_uppercases_each_part() -> Result<(), Box<dyn std::error::Error>> {
    assert_eq!(quote_oracle_identifier("STAGE.items")?, "\"STAGE\".\"ITEMS\"");
    assert_eq!(quote_oracle_identifier("col_1#$")?, "\"COL_1#$\"");

    // Quoting is deterministic: the same raw name always yields the same text.
    assert_eq!(
        quote_oracle_identifier("stage.items")?,
        quote_oracle_identifier("STAGE.ITEMS")?
    );
    Ok(())
}

#[test]
fn rejects_names_outside_the_grammar() {
    for bad in [
        "",
        "1abc",
        "_items",
        "a.b.c",
        "items;DROP TABLE users",
        "items --",
        "\"items\"",
        "schema.",
        ".items",
        "it ems",
    ] {
        let err = quote_oracle_identifier(bad).unwrap_err();
        assert!(
            matches!(err, SqlWarehouseError::InvalidIdentifier(_)),
            "{bad:?} gave {err:?}"
        );
        assert!(err.is_validation());
    }
}

#[test]
fn postgres_quoting_escapes_embedded_quotes() -> Result<(), Box<dyn std::error::Error>> {
    assert_eq!(quote_postgres_identifier("public.Items")?, "\"public\".\"Items\"");
    assert_eq!(quote_postgres_identifier("we\"ird")?, "\"we\"\"ird\"");
    assert!(quote_postgres_identifier("").is_err());
    assert!(quote_postgres_identifier("a.b.c").is_err());
    assert!(quote_postgres_identifier("nul\0byte").is_err());
    Ok(())
}

#[test]
fn bad_names_never_reach_the_database() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = MockDriver::oracle();
        let db = ConnectionManager::new(driver.clone(), ManagerConfig::default())?;
        db.set_user(oracle_creds()).await?;
        let table = Table::new(
            ["ID", "NAME"],
            vec![vec![RowValues::Int(1), RowValues::from("a")]],
        )?;

        let err = db
            .export(&table, "items; DROP TABLE users", &["ID"], false)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlWarehouseError::InvalidIdentifier(_)));

        let err = db.truncate("1items").await.unwrap_err();
        assert!(matches!(err, SqlWarehouseError::InvalidIdentifier(_)));

        let err = db.empty("").await.unwrap_err();
        assert!(matches!(err, SqlWarehouseError::InvalidIdentifier(_)));

        // Same names, empty table: still rejected before the short circuit.
        let empty = Table::new(["ID", "BAD COL"], vec![])?;
        let err = db
            .export(&empty, "ITEMS", &["ID", "BAD COL"], false)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlWarehouseError::InvalidIdentifier(_)));

        assert!(driver.statements().is_empty());
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

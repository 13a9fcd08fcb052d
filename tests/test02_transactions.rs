use sql_session::{ConnectionProvider, Profiles, Session, SessionError, SqlValue, TxOutcome};
use tokio::runtime::Runtime;

fn provider_for(path: &str) -> ConnectionProvider {
    let profiles = Profiles::new("dev").with_entry("dev", path);
    ConnectionProvider::new(profiles)
}

async fn count(session: &mut Session, table: &str) -> Result<i64, SessionError> {
    let rs = session
        .read(&format!("SELECT COUNT(*) AS cnt FROM {table}"))
        .await?;
    Ok(*rs.rows()[0].get("cnt").and_then(SqlValue::as_int).expect("count"))
}

#[test]
fn commit_and_rollback_without_transaction_are_warnings() -> Result<(), Box<dyn std::error::Error>>
{
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("warn.db").to_string_lossy().to_string();

    rt.block_on(async {
        // Never an error, even before any connection exists
        let mut session = Session::new(provider_for(&db_path), "dev");
        assert_eq!(session.commit().await?, TxOutcome::NoTransaction);
        assert_eq!(session.rollback().await?, TxOutcome::NoTransaction);

        // Same once connected
        session.write("CREATE TABLE t (ID INTEGER)").await?;
        let outcome = session.commit().await?;
        assert!(outcome.is_no_transaction());
        assert_eq!(session.rollback().await?, TxOutcome::NoTransaction);

        Ok::<(), SessionError>(())
    })?;

    Ok(())
}

#[test]
fn begin_requires_an_open_connection() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("begin.db").to_string_lossy().to_string();

    rt.block_on(async {
        let mut session = Session::new(provider_for(&db_path), "dev");
        let err = session.begin_transaction().await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectionError(_)), "{err}");

        // Eager connect makes it work
        let mut session = Session::connect(provider_for(&db_path), "dev").await?;
        session.begin_transaction().await?;
        assert!(session.in_transaction());

        // Only one transaction at a time
        let err = session.begin_transaction().await.unwrap_err();
        assert!(matches!(err, SessionError::ExecutionError(_)), "{err}");

        session.rollback().await?;
        assert!(!session.in_transaction());

        Ok::<(), SessionError>(())
    })?;

    Ok(())
}

#[test]
fn rollback_discards_writes_and_commit_persists_them() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("txn.db").to_string_lossy().to_string();

    rt.block_on(async {
        let mut session = Session::connect(provider_for(&db_path), "dev").await?;
        session.write("CREATE TABLE t (ID INTEGER, NOTE TEXT)").await?;

        // Write inside a transaction, then roll back: nothing persists
        session.begin_transaction().await?;
        let affected = session
            .write_with(
                "INSERT INTO t (ID, NOTE) VALUES (:ID, :NOTE)",
                &[("ID", SqlValue::Int(1)), ("NOTE", SqlValue::Text("gone".into()))],
            )
            .await?;
        assert_eq!(affected, 1);
        assert_eq!(session.rollback().await?, TxOutcome::RolledBack);
        assert_eq!(count(&mut session, "t").await?, 0);

        // Same write, committed: it persists
        session.begin_transaction().await?;
        session
            .write_with(
                "INSERT INTO t (ID, NOTE) VALUES (:ID, :NOTE)",
                &[("ID", SqlValue::Int(2)), ("NOTE", SqlValue::Text("kept".into()))],
            )
            .await?;
        assert_eq!(session.commit().await?, TxOutcome::Committed);
        assert_eq!(count(&mut session, "t").await?, 1);

        // Writes outside a transaction auto-commit
        session.write("INSERT INTO t (ID, NOTE) VALUES (3, 'auto')").await?;
        assert_eq!(count(&mut session, "t").await?, 2);

        Ok::<(), SessionError>(())
    })?;

    Ok(())
}

#[test]
fn close_rolls_back_the_open_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("close.db").to_string_lossy().to_string();

    rt.block_on(async {
        let mut session = Session::connect(provider_for(&db_path), "dev").await?;
        session.write("CREATE TABLE t (ID INTEGER)").await?;

        session.begin_transaction().await?;
        session.write("INSERT INTO t (ID) VALUES (1)").await?;
        session.close().await?;
        assert!(!session.is_connected());

        // The next operation acquires a fresh connection; the uncommitted
        // write is gone
        assert_eq!(count(&mut session, "t").await?, 0);
        assert!(session.is_connected());

        Ok::<(), SessionError>(())
    })?;

    Ok(())
}

#[test]
fn dropping_a_session_mid_transaction_poisons_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("drop.db").to_string_lossy().to_string();

    rt.block_on(async {
        let provider = provider_for(&db_path);

        {
            let mut session = Session::connect(provider.clone(), "dev").await?;
            session.write("CREATE TABLE t (ID INTEGER)").await?;
            session.begin_transaction().await?;
            session.write("INSERT INTO t (ID) VALUES (1)").await?;
            // Dropped with the transaction still open
        }

        // A fresh session sees no leftover transaction state and no row
        let mut session = Session::connect(provider, "dev").await?;
        assert!(!session.in_transaction());
        assert_eq!(count(&mut session, "t").await?, 0);

        Ok::<(), SessionError>(())
    })?;

    Ok(())
}

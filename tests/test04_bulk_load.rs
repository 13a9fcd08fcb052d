use sql_session::{ConnectionProvider, Profiles, ResultSet, Session, SessionError, SqlValue};
use tokio::runtime::Runtime;

fn provider_for(path: &str) -> ConnectionProvider {
    let profiles = Profiles::new("dev").with_entry("dev", path);
    ConnectionProvider::new(profiles)
}

#[test]
fn bulk_load_streams_a_result_set_into_a_table() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("bulk.db").to_string_lossy().to_string();

    rt.block_on(async {
        let mut session = Session::connect(provider_for(&db_path), "dev").await?;
        session
            .write("CREATE TABLE source (ID INTEGER, NAME TEXT, SCORE REAL)")
            .await?;
        session
            .write("CREATE TABLE dest (ID INTEGER, NAME TEXT, SCORE REAL)")
            .await?;
        session
            .write(
                "INSERT INTO source (ID, NAME, SCORE) VALUES
                    (1, 'a', 0.5),
                    (2, 'b', NULL),
                    (3, NULL, 2.25)",
            )
            .await?;

        let rows = session.read("SELECT ID, NAME, SCORE FROM source").await?;
        let loaded = session.bulk_load(&rows, "dest").await?;
        assert_eq!(loaded, 3);

        let rs = session
            .read("SELECT ID, NAME, SCORE FROM dest ORDER BY ID")
            .await?;
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.rows()[0].get("NAME").and_then(SqlValue::as_text), Some("a"));
        assert!(rs.rows()[1].get("SCORE").is_some_and(SqlValue::is_null));
        assert_eq!(rs.rows()[2].get("SCORE"), Some(&SqlValue::Float(2.25)));

        // An empty source result set still carries column names and loads
        // zero rows successfully
        let empty = session
            .read("SELECT ID, NAME, SCORE FROM source WHERE ID = 0")
            .await?;
        assert_eq!(session.bulk_load(&empty, "dest").await?, 0);

        Ok::<(), SessionError>(())
    })?;

    Ok(())
}

#[test]
fn bulk_load_preconditions() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("bulk_pre.db").to_string_lossy().to_string();

    rt.block_on(async {
        // Requires an already-open connection; it will not acquire one
        let mut cold = Session::new(provider_for(&db_path), "dev");
        let err = cold.bulk_load(&ResultSet::default(), "dest").await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectionError(_)), "{err}");

        let mut session = Session::connect(provider_for(&db_path), "dev").await?;
        session.write("CREATE TABLE dest (ID INTEGER)").await?;

        // A result set with no columns has nothing to map onto the table
        let err = session.bulk_load(&ResultSet::default(), "dest").await.unwrap_err();
        assert!(matches!(err, SessionError::ParameterError(_)), "{err}");

        // Not permitted while a session transaction is open
        let rows = session.read("SELECT 1 AS ID").await?;
        session.begin_transaction().await?;
        let err = session.bulk_load(&rows, "dest").await.unwrap_err();
        assert!(matches!(err, SessionError::ExecutionError(_)), "{err}");
        session.rollback().await?;

        // And with the transaction closed it loads
        assert_eq!(session.bulk_load(&rows, "dest").await?, 1);

        Ok::<(), SessionError>(())
    })?;

    Ok(())
}

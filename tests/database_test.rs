//! Tests for the shared database handle and its JSON helpers
//! Run with: cargo test --test database_test

use pretty_assertions::assert_eq;
use serde_json::json;
use sqlite_typed::{ConnectionConfig, Database, Error, TransactionMode, Value};

fn seeded() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.exec(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, avatar BLOB);
         INSERT INTO users (name) VALUES ('ann'), ('bob');",
    )
    .unwrap();
    db
}

mod json_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exec_reports_last_statement() {
        let db = Database::open_in_memory().unwrap();
        let result = db
            .exec("CREATE TABLE t (n); INSERT INTO t VALUES (1), (2);")
            .unwrap();
        assert_eq!(result.changes, 2);
        assert_eq!(result.last_insert_rowid, 2);
    }

    #[test]
    fn test_all_get_values() {
        let db = seeded();
        assert_eq!(
            db.all("SELECT id, name FROM users ORDER BY id", &json!(null))
                .unwrap(),
            json!([{"id": 1, "name": "ann"}, {"id": 2, "name": "bob"}])
        );
        assert_eq!(
            db.get("SELECT name FROM users WHERE id = ?", &json!([2]))
                .unwrap(),
            json!({"name": "bob"})
        );
        assert_eq!(
            db.get("SELECT name FROM users WHERE id = :id", &json!({"id": 9}))
                .unwrap(),
            json!(null)
        );
        assert_eq!(
            db.values("SELECT id, name FROM users ORDER BY id", &json!([]))
                .unwrap(),
            json!([[1, "ann"], [2, "bob"]])
        );
    }

    #[test]
    fn test_run_json_with_named_params() {
        let db = seeded();
        let result = db
            .run_json(
                "INSERT INTO users (name) VALUES ($name)",
                &json!({"name": "cy"}),
            )
            .unwrap();
        assert_eq!(result.changes, 1);
        assert_eq!(result.last_insert_rowid, 3);
    }

    #[test]
    fn test_blob_as_base64() {
        let db = seeded();
        db.with(|conn| {
            conn.run(
                "UPDATE users SET avatar = ? WHERE id = 1",
                &[Value::from(vec![1_u8, 2, 3])],
            )
        })
        .unwrap();
        assert_eq!(
            db.get("SELECT avatar FROM users WHERE id = 1", &json!(null))
                .unwrap(),
            json!({"avatar": "AQID"})
        );
    }

    #[test]
    fn test_bad_params() {
        let db = seeded();
        let err = db
            .all("SELECT * FROM users WHERE id = ?", &json!([1, 2]))
            .unwrap_err();
        assert!(matches!(err, Error::BindingCountMismatch { .. }));

        let err = db
            .all("SELECT * FROM users WHERE id = :id", &json!({"nope": 1}))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameterName(_)));
    }
}

mod sharing_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clones_share_connection() {
        let db = seeded();
        let other = db.clone();
        other.exec("INSERT INTO users (name) VALUES ('dee')").unwrap();
        let count = db
            .with(|conn| conn.scalar_as::<i64>("SELECT count(*) FROM users", &[]))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_transaction_through_handle() {
        let db = seeded();
        let result: Result<(), Error> = db.transaction(TransactionMode::Immediate, |conn| {
            conn.run("DELETE FROM users", &[])?;
            Err(Error::Config("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(
            db.values("SELECT count(*) FROM users", &json!(null)).unwrap(),
            json!([[2]])
        );
    }

    #[test]
    fn test_threads_share_handle() {
        let db = Database::open_in_memory().unwrap();
        db.exec("CREATE TABLE hits (n INTEGER)").unwrap();

        let handles: Vec<_> = (0..4_i64)
            .map(|i| {
                let db = db.clone();
                std::thread::spawn(move || {
                    db.with(|conn| {
                        conn.run("INSERT INTO hits VALUES (?)", &[Value::Integer(i)])
                    })
                    .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            db.values("SELECT sum(n) FROM hits", &json!(null)).unwrap(),
            json!([[6]])
        );
    }

    #[tokio::test]
    async fn test_call_runs_off_runtime() {
        let db = seeded();
        let names = db
            .call(|conn| {
                conn.query_rows("SELECT name FROM users ORDER BY id", &[])?
                    .iter()
                    .map(|row| row.get::<String>(0))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await
            .unwrap();
        assert_eq!(names, vec!["ann".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_open_with_config() {
        let config = ConnectionConfig::from_toml_str(
            r#"
            busy_timeout_ms = 250

            [[pragmas]]
            name = "foreign_keys"
            value = "ON"
            "#,
        )
        .unwrap();
        let db = Database::open(&config).unwrap();
        assert_eq!(
            db.values("PRAGMA foreign_keys", &json!(null)).unwrap(),
            json!([[1]])
        );
    }
}

//! Tests for prepared statements, binding and row decoding
//! Run with: cargo test --test statement_test

use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use sqlite_typed::{Connection, ConnectionConfig, ConversionError, Error, State, Value};

fn conn() -> Connection {
    Connection::open_in_memory().unwrap()
}

mod binding_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_count_mismatch_keeps_previous_bindings() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT ?").unwrap();
        stmt.bind(&[Value::Integer(1)]).unwrap();

        let err = stmt
            .bind(&[Value::Integer(2), Value::Integer(3)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::BindingCountMismatch {
                expected: 1,
                actual: 2
            }
        ));
        assert_eq!(stmt.state(), State::Bound);
        assert_eq!(stmt.scalar().unwrap(), Some(Value::Integer(1)));
    }

    #[test]
    fn test_rebinding_replaces_values() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT ? * 2").unwrap();
        assert_eq!(
            stmt.scalar_with(&[Value::Integer(2)]).unwrap(),
            Some(Value::Integer(4))
        );
        assert_eq!(
            stmt.scalar_with(&[Value::Integer(5)]).unwrap(),
            Some(Value::Integer(10))
        );
    }

    #[test]
    fn test_named_parameters() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT :a + @b + $c").unwrap();
        stmt.bind_named(&[
            ("a", Value::Integer(1)),
            ("@b", Value::Integer(2)),
            ("c", Value::Integer(3)),
        ])
        .unwrap();
        assert_eq!(stmt.scalar().unwrap(), Some(Value::Integer(6)));
    }

    #[test]
    fn test_unknown_parameter_name() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT :a").unwrap();
        stmt.bind_named(&[("a", Value::Integer(1))]).unwrap();

        let err = stmt
            .bind_named(&[("a", Value::Integer(2)), ("missing", Value::Integer(3))])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameterName(ref name) if name == "missing"));
        assert_eq!(stmt.scalar().unwrap(), Some(Value::Integer(1)));
    }

    #[test]
    fn test_run_named() {
        let conn = conn();
        conn.execute("CREATE TABLE p (name TEXT)").unwrap();
        let result = conn
            .run_named("INSERT INTO p VALUES (:name)", &[("name", Value::from("ann"))])
            .unwrap();
        assert_eq!(result.changes, 1);
        assert_eq!(result.last_insert_rowid, 1);
    }
}

mod value_round_trip_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn echo(conn: &Connection, value: Value) -> Value {
        conn.scalar("SELECT ?", &[value]).unwrap().unwrap()
    }

    #[test]
    fn test_text_with_quotes() {
        let conn = conn();
        assert_eq!(echo(&conn, Value::from("O'Brien")), Value::from("O'Brien"));
        assert_eq!(echo(&conn, Value::from("")), Value::from(""));
        assert_eq!(echo(&conn, Value::from("héllo ✓")), Value::from("héllo ✓"));
    }

    #[test]
    fn test_integer_extremes() {
        let conn = conn();
        for n in [i64::MIN, -1, 0, 1, i64::MAX] {
            assert_eq!(conn.scalar_as::<i64>("SELECT ?", &[Value::Integer(n)]).unwrap(), n);
        }
    }

    #[test]
    fn test_float_specials() {
        let conn = conn();
        assert_eq!(
            echo(&conn, Value::Float(f64::INFINITY)),
            Value::Float(f64::INFINITY)
        );
        assert_eq!(
            echo(&conn, Value::Float(f64::NEG_INFINITY)),
            Value::Float(f64::NEG_INFINITY)
        );
        match echo(&conn, Value::Float(-0.0)) {
            Value::Float(f) => assert!(f == 0.0 && f.is_sign_negative()),
            other => panic!("expected a float, got {other:?}"),
        }
        // SQLite stores NaN as NULL.
        assert_eq!(echo(&conn, Value::Float(f64::NAN)), Value::Null);
    }

    #[test]
    fn test_empty_blob_is_not_null() {
        let conn = conn();
        let kind = conn
            .scalar_as::<String>("SELECT typeof(?)", &[Value::from(Vec::<u8>::new())])
            .unwrap();
        assert_eq!(kind, "blob");
        assert_eq!(
            echo(&conn, Value::from(Vec::<u8>::new())),
            Value::from(Vec::<u8>::new())
        );

        let kind = conn
            .scalar_as::<String>("SELECT typeof(?)", &[Value::Null])
            .unwrap();
        assert_eq!(kind, "null");
    }

    #[test]
    fn test_typed_decoding() {
        let conn = conn();
        assert!(conn.scalar_as::<bool>("SELECT 1", &[]).unwrap());
        assert_eq!(conn.scalar_as::<f64>("SELECT 3", &[]).unwrap(), 3.0);
        assert_eq!(conn.scalar_as::<Option<i64>>("SELECT NULL", &[]).unwrap(), None);
        assert_eq!(
            conn.scalar_as::<Option<i64>>("SELECT 1 WHERE 0", &[]).unwrap(),
            None
        );

        let err = conn.scalar_as::<i64>("SELECT 'x'", &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Conversion(ConversionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_dates_round_trip() {
        let conn = conn();
        conn.execute("CREATE TABLE d (at TEXT, day TEXT)").unwrap();
        let at = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(23, 59, 58, 125)
            .unwrap();
        let day = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        conn.run(
            "INSERT INTO d VALUES (?, ?)",
            &[
                Value::from(at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
                Value::from("1999-12-31"),
            ],
        )
        .unwrap();

        let row = conn
            .query_rows("SELECT at, day FROM d", &[])
            .unwrap()
            .remove(0);
        assert_eq!(row.get::<NaiveDateTime>(0).unwrap(), at);
        assert_eq!(row.get_by_name::<NaiveDate>("DAY").unwrap(), day);
    }

    #[test]
    fn test_connection_date_format() {
        let config = ConnectionConfig::from_toml_str(
            r#"
            [date_format]
            datetime = "%d.%m.%Y %H:%M"
            date = "%d.%m.%Y"
            "#,
        )
        .unwrap();
        let conn = Connection::open(&config).unwrap();
        conn.execute("CREATE TABLE d (at TEXT, day TEXT)").unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let at = day.and_hms_opt(13, 45, 0).unwrap();
        conn.run(
            "INSERT INTO d VALUES (?, ?)",
            &[conn.datetime_value(&at), conn.date_value(&day)],
        )
        .unwrap();

        assert_eq!(
            conn.scalar_as::<String>("SELECT day FROM d", &[]).unwrap(),
            "02.01.2024"
        );
        let row = conn
            .query_rows("SELECT at, day FROM d", &[])
            .unwrap()
            .remove(0);
        assert_eq!(row.get::<String>(0).unwrap(), "02.01.2024 13:45");
        assert_eq!(row.get_datetime(0).unwrap(), at);
        assert_eq!(row.get_date(1).unwrap(), day);
    }
}

mod cursor_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_step_error_is_yielded_once() {
        let conn = conn();
        let mut stmt = conn
            .prepare(
                "SELECT CASE WHEN column1 = 2 \
                 THEN abs(column1 * 0 - 9223372036854775807 - 1) ELSE column1 END \
                 FROM (VALUES (1), (2), (3))",
            )
            .unwrap();
        let mut rows = stmt.query().unwrap();

        let first = rows.next().unwrap().unwrap();
        assert_eq!(first.get::<i64>(0).unwrap(), 1);
        assert!(matches!(rows.next(), Some(Err(Error::Engine { .. }))));
        assert!(rows.next().is_none());
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_dropping_cursor_resets_statement() {
        let conn = conn();
        let mut stmt = conn
            .prepare("SELECT column1 FROM (VALUES (1), (2), (3))")
            .unwrap();
        {
            let mut rows = stmt.query().unwrap();
            assert!(rows.next_row().unwrap().is_some());
        }
        assert_eq!(stmt.state(), State::Prepared);

        let all: Vec<i64> = stmt
            .query()
            .unwrap()
            .map(|row| row.and_then(|row| row.get::<i64>(0)))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn test_rows_carry_column_names() {
        let conn = conn();
        let rows = conn
            .query_rows("SELECT 1 AS id, 'a' AS label", &[])
            .unwrap();
        assert_eq!(rows[0].column_names(), &["id".to_string(), "label".to_string()]);
        assert_eq!(rows[0].get_by_name::<String>("Label").unwrap(), "a");
        assert!(matches!(
            rows[0].get_by_name::<String>("nope"),
            Err(Error::InvalidColumnName(_))
        ));
        assert!(matches!(rows[0].get::<i64>(5), Err(Error::InvalidColumnIndex(5))));
    }
}

mod connection_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_statement() {
        let conn = conn();
        assert!(matches!(conn.prepare("   "), Err(Error::EmptyStatement)));
        assert!(matches!(
            conn.prepare("-- only a comment"),
            Err(Error::EmptyStatement)
        ));
        conn.execute("  ").unwrap();
    }

    #[test]
    fn test_execute_runs_every_statement() {
        let conn = conn();
        conn.execute(
            "CREATE TABLE e (n INTEGER);
             INSERT INTO e VALUES (1);
             INSERT INTO e VALUES (2);
             -- trailing comment",
        )
        .unwrap();
        assert_eq!(conn.scalar_as::<i64>("SELECT sum(n) FROM e", &[]).unwrap(), 3);
        assert_eq!(conn.last_insert_rowid(), Some(2));
        assert_eq!(conn.total_changes(), 2);
    }

    #[test]
    fn test_syntax_error_carries_sql() {
        let conn = conn();
        let err = conn.prepare("SELEKT 1").unwrap_err();
        assert_eq!(err.sql(), Some("SELEKT 1"));
        assert_eq!(err.code(), Some(1));
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        let conn = conn();
        assert!(matches!(conn.prepare("SELECT 1\0"), Err(Error::InvalidSql(_))));
    }

    #[test]
    fn test_custom_function_and_collation() {
        let conn = conn();
        let twice = conn
            .create_function("twice", 1, true, |args| match args {
                [Value::Integer(i)] => Value::Integer(i * 2),
                _ => Value::Null,
            })
            .unwrap();
        let call: sqlite_typed::Expression<i64> =
            twice.call(vec![sqlite_typed::Expression::value(21_i64).untyped()]);
        let (template, bindings) = call.into_parts();
        assert_eq!(
            conn.scalar_as::<i64>(&format!("SELECT {template}"), &bindings)
                .unwrap(),
            42
        );

        conn.create_collation("reverse", |a, b| b.cmp(a)).unwrap();
        assert!(conn.has_collation("reverse"));
        let rows = conn
            .query_rows(
                "SELECT column1 FROM (VALUES ('a'), ('c'), ('b')) ORDER BY column1 COLLATE reverse",
                &[],
            )
            .unwrap();
        let ordered: Vec<String> = rows.iter().map(|r| r.get::<String>(0).unwrap()).collect();
        assert_eq!(ordered, vec!["c", "b", "a"]);
    }
}

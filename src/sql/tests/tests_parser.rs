#[cfg(test)]
mod tests {
    use crate::schema::{DataType, Value};
    use crate::sql::{Condition, IndexKind, SqlError, Statement, parse};

    fn parse_create(sql: &str) -> crate::sql::CreateTableStatement {
        match parse(sql).unwrap() {
            Statement::CreateTable(stmt) => stmt,
            other => panic!("expected CREATE TABLE, got {other:?}"),
        }
    }

    #[test]
    fn test_create_table_full_form() {
        let stmt = parse_create(
            "CREATE TABLE Restaurants (
                id INT PRIMARY KEY INDEX HASH,
                name VARCHAR[20] INDEX BTREE,
                opened DATE,
                location ARRAY INDEX RTREE
            )",
        );
        assert_eq!(stmt.table_name, "Restaurants");
        assert_eq!(stmt.primary_key, "id");
        assert_eq!(stmt.primary_index_type, IndexKind::Hash);
        assert_eq!(stmt.columns.len(), 4);

        let name = &stmt.columns[1];
        assert_eq!(name.data_type, DataType::Varchar);
        assert_eq!(name.size, Some(20));
        assert_eq!(name.index_type, Some(IndexKind::BTree));
        assert!(!name.is_primary_key);

        let opened = &stmt.columns[2];
        assert_eq!(opened.data_type, DataType::Date);
        assert!(!opened.has_index);

        let location = &stmt.columns[3];
        assert_eq!(location.data_type, DataType::ArrayFloat);
        assert_eq!(location.index_type, Some(IndexKind::RTree));
    }

    #[test]
    fn test_create_table_key_shorthand_and_defaults() {
        let stmt = parse_create("create table t ( id int key, v float )");
        assert_eq!(stmt.primary_key, "id");
        // No index clause, no USING INDEX: btree is the default.
        assert_eq!(stmt.primary_index_type, IndexKind::BTree);
        assert!(stmt.columns[0].has_index);
    }

    #[test]
    fn test_create_table_using_index_fallback() {
        let stmt =
            parse_create("CREATE TABLE t ( id INT KEY, v INT ) USING INDEX isam");
        assert_eq!(stmt.primary_index_type, IndexKind::Isam);
        assert_eq!(stmt.using_index, Some(IndexKind::Isam));
    }

    #[test]
    fn test_create_table_from_file() {
        let stmt = parse_create(
            "CREATE TABLE t ( id INT KEY ) FROM FILE \"/tmp/rows.csv\" USING INDEX hash",
        );
        assert_eq!(stmt.from_file.as_deref(), Some("/tmp/rows.csv"));
        assert_eq!(stmt.primary_index_type, IndexKind::Hash);
    }

    #[test]
    fn test_create_table_requires_primary_key() {
        let err = parse("CREATE TABLE t ( a INT, b INT )").unwrap_err();
        assert!(matches!(err, SqlError::InvalidColumnDef(_)));
    }

    #[test]
    fn test_create_table_rejects_varchar_without_size() {
        let err = parse("CREATE TABLE t ( id INT KEY, name VARCHAR )").unwrap_err();
        assert!(matches!(err, SqlError::InvalidColumnDef(_)));
    }

    #[test]
    fn test_create_table_rejects_two_primary_keys() {
        let err = parse("CREATE TABLE t ( a INT KEY, b INT KEY )").unwrap_err();
        assert!(matches!(err, SqlError::InvalidColumnDef(_)));
    }

    #[test]
    fn test_insert_positional_multi_row() {
        let Statement::Insert(stmt) = parse(
            "INSERT INTO t VALUES (1, \"a\", 2.5), (2, 'b', 3.5)",
        )
        .unwrap() else {
            panic!("expected INSERT");
        };
        assert_eq!(stmt.table_name, "t");
        assert!(stmt.columns.is_none());
        assert_eq!(stmt.values.len(), 2);
        assert_eq!(
            stmt.values[0],
            vec![Value::Int(1), Value::Str("a".into()), Value::Float(2.5)]
        );
        assert_eq!(stmt.values[1][1], Value::Str("b".into()));
    }

    #[test]
    fn test_insert_named_columns() {
        let Statement::Insert(stmt) =
            parse("INSERT INTO t (id, name) VALUES (7, \"x\")").unwrap()
        else {
            panic!("expected INSERT");
        };
        assert_eq!(stmt.columns, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(stmt.values, vec![vec![Value::Int(7), Value::Str("x".into())]]);
    }

    #[test]
    fn test_insert_array_and_negative_literals() {
        let Statement::Insert(stmt) =
            parse("INSERT INTO p VALUES (1, ARRAY[-12.06, -77.03], -5)").unwrap()
        else {
            panic!("expected INSERT");
        };
        assert_eq!(stmt.values[0][1], Value::Point(-12.06, -77.03));
        assert_eq!(stmt.values[0][2], Value::Int(-5));
    }

    #[test]
    fn test_select_star_and_projection() {
        let Statement::Select(stmt) = parse("SELECT * FROM t").unwrap() else {
            panic!("expected SELECT");
        };
        assert_eq!(stmt.columns, vec!["*".to_string()]);
        assert!(stmt.condition.is_none());

        let Statement::Select(stmt) = parse("SELECT id, name FROM t WHERE id = 3").unwrap()
        else {
            panic!("expected SELECT");
        };
        assert_eq!(stmt.columns, vec!["id".to_string(), "name".to_string()]);
        match stmt.condition {
            Some(Condition::Equal { column, value }) => {
                assert_eq!(column, "id");
                assert_eq!(value, Value::Int(3));
            }
            other => panic!("expected equality, got {other:?}"),
        }
    }

    #[test]
    fn test_where_between() {
        let Statement::Select(stmt) =
            parse("SELECT * FROM t WHERE name BETWEEN \"A\" AND \"M\"").unwrap()
        else {
            panic!("expected SELECT");
        };
        match stmt.condition {
            Some(Condition::Between { column, low, high }) => {
                assert_eq!(column, "name");
                assert_eq!(low, Value::Str("A".into()));
                assert_eq!(high, Value::Str("M".into()));
            }
            other => panic!("expected BETWEEN, got {other:?}"),
        }
    }

    #[test]
    fn test_where_spatial() {
        let Statement::Select(stmt) =
            parse("SELECT * FROM p WHERE loc IN (ARRAY[-12.07, -77.05], 0.03)").unwrap()
        else {
            panic!("expected SELECT");
        };
        match stmt.condition {
            Some(Condition::Spatial {
                column,
                point,
                radius,
            }) => {
                assert_eq!(column, "loc");
                assert_eq!(point, (-12.07, -77.05));
                assert_eq!(radius, 0.03);
            }
            other => panic!("expected spatial, got {other:?}"),
        }
    }

    #[test]
    fn test_delete_with_and_without_where() {
        let Statement::Delete(stmt) = parse("DELETE FROM t").unwrap() else {
            panic!("expected DELETE");
        };
        assert!(stmt.condition.is_none());

        let Statement::Delete(stmt) = parse("delete from t where id = 1").unwrap() else {
            panic!("expected DELETE");
        };
        assert!(matches!(stmt.condition, Some(Condition::Equal { .. })));
    }

    #[test]
    fn test_unsupported_statement_rejected() {
        assert!(matches!(parse("UPDATE t SET x = 1").unwrap_err(), SqlError::Unsupported(_)));
        assert!(matches!(parse("").unwrap_err(), SqlError::UnexpectedEnd(_)));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse("SELECT * FROM t extra tokens").is_err());
    }

    #[test]
    fn test_unterminated_string_rejected() {
        assert!(matches!(
            parse("INSERT INTO t VALUES (\"oops)").unwrap_err(),
            SqlError::UnexpectedEnd(_)
        ));
    }
}

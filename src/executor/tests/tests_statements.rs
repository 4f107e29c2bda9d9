#[cfg(test)]
mod tests {
    use crate::catalog::Catalog;
    use crate::executor::{Executor, QueryOutcome};
    use crate::schema::Value;
    use crate::sql::{self, Statement};
    use tempfile::TempDir;

    struct Harness {
        catalog: Catalog,
        executor: Executor,
        _tmp: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            Self {
                catalog: Catalog::open(tmp.path()).unwrap(),
                executor: Executor::new(),
                _tmp: tmp,
            }
        }

        fn run(&mut self, sql_text: &str) -> QueryOutcome {
            let statement: Statement = sql::parse(sql_text).unwrap();
            self.executor.execute(&mut self.catalog, &statement)
        }
    }

    #[test]
    fn test_create_insert_select_cycle() {
        let mut h = Harness::new();

        let res = h.run("CREATE TABLE shops ( id INT KEY INDEX HASH, name VARCHAR[20] )");
        assert!(res.success, "{:?}", res.error);

        let res = h.run("INSERT INTO shops VALUES (1, \"alfa\"), (2, \"beta\"), (3, \"gamma\")");
        assert!(res.success);
        assert_eq!(res.count, 3);
        assert!(res.error.is_none());

        let res = h.run("SELECT * FROM shops WHERE id = 2");
        assert!(res.success);
        assert_eq!(res.count, 1);
        let rows = res.data.unwrap();
        assert_eq!(rows[0]["id"], Value::Int(2));
        assert_eq!(rows[0]["name"], Value::Str("beta".into()));

        let explain = res.explain.unwrap();
        assert_eq!(explain.operation, "index_scan");
        assert_eq!(explain.cost, 1);
    }

    #[test]
    fn test_create_rejects_existing_table() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY )");
        let res = h.run("CREATE TABLE t ( id INT KEY )");
        assert!(!res.success);
        assert!(res.error.unwrap().contains("already exists"));
    }

    #[test]
    fn test_insert_continues_past_bad_rows() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX HASH, v INT )");

        // The middle row has a non-numeric id; the others must land.
        let res = h.run("INSERT INTO t VALUES (1, 10), (\"oops\", 20), (3, 30)");
        assert!(res.success);
        assert_eq!(res.count, 2);
        assert!(res.error.unwrap().contains("oops"));

        let res = h.run("SELECT * FROM t");
        assert_eq!(res.count, 2);
    }

    #[test]
    fn test_insert_named_columns_fill_null() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX HASH, a INT, b INT )");

        let res = h.run("INSERT INTO t (b, id) VALUES (42, 1)");
        assert!(res.success, "{:?}", res.error);
        assert_eq!(res.count, 1);

        let res = h.run("SELECT * FROM t WHERE id = 1");
        let rows = res.data.unwrap();
        assert_eq!(rows[0]["b"], Value::Int(42));
        // Unnamed INT columns read back as the zero cell.
        assert_eq!(rows[0]["a"], Value::Int(0));
    }

    #[test]
    fn test_insert_value_count_mismatch_is_row_error() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY, v INT )");
        let res = h.run("INSERT INTO t VALUES (1)");
        assert!(res.success);
        assert_eq!(res.count, 0);
        assert!(res.error.is_some());
    }

    #[test]
    fn test_select_projection() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX HASH, a INT, b INT )");
        h.run("INSERT INTO t VALUES (1, 10, 100)");

        let res = h.run("SELECT b FROM t WHERE id = 1");
        let rows = res.data.unwrap();
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0]["b"], Value::Int(100));
    }

    #[test]
    fn test_select_without_index_filters_scan() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX HASH, v INT )");
        h.run("INSERT INTO t VALUES (1, 7), (2, 8), (3, 7)");

        let res = h.run("SELECT * FROM t WHERE v = 7");
        assert_eq!(res.count, 2);
        let explain = res.explain.unwrap();
        assert_eq!(explain.operation, "sequential_scan");
        assert_eq!(explain.cost, 500);
    }

    #[test]
    fn test_select_between_via_btree() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX BTREE, v INT )");
        h.run("INSERT INTO t VALUES (1,10),(2,20),(3,30),(4,40),(5,50)");

        let res = h.run("SELECT * FROM t WHERE id BETWEEN 2 AND 4");
        assert!(res.success);
        assert_eq!(res.count, 3);
        let mut ids: Vec<i32> = res
            .data
            .unwrap()
            .iter()
            .map(|r| match r["id"] {
                Value::Int(v) => v,
                _ => panic!("bad id"),
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(res.explain.unwrap().cost, 10);
    }

    #[test]
    fn test_delete_equality_tombstones_and_hides_row() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX HASH, n VARCHAR[5] )");
        h.run("INSERT INTO t VALUES (1, \"x\"), (2, \"y\")");

        let res = h.run("DELETE FROM t WHERE id = 1");
        assert!(res.success);
        assert_eq!(res.count, 1);

        let res = h.run("SELECT * FROM t");
        assert_eq!(res.count, 1);
        assert_eq!(res.data.unwrap()[0]["id"], Value::Int(2));

        // Idempotent: the key is gone from the hash and the heap.
        let res = h.run("DELETE FROM t WHERE id = 1");
        assert_eq!(res.count, 0);
    }

    #[test]
    fn test_delete_without_where_counts_live_only() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX HASH )");
        h.run("INSERT INTO t VALUES (1), (2), (3)");
        h.run("DELETE FROM t WHERE id = 2");

        let res = h.run("DELETE FROM t");
        assert_eq!(res.count, 2);

        let res = h.run("SELECT * FROM t");
        assert_eq!(res.count, 0);
    }

    #[test]
    fn test_delete_without_where_clears_deletion_capable_indices() {
        // A blanket DELETE must drop keys from the indices that support
        // deletion, so a previously-deleted key can be inserted again and
        // found at its new slot.
        for index in ["ISAM", "HASH", "AVL"] {
            let mut h = Harness::new();
            h.run(&format!("CREATE TABLE t ( id INT KEY INDEX {index}, v INT )"));
            h.run("INSERT INTO t VALUES (1, 10), (2, 20)");

            let res = h.run("DELETE FROM t");
            assert_eq!(res.count, 2, "{index}");

            // Re-inserting a deleted key must not trip a duplicate check
            // or shadow the new row behind a stale entry.
            let res = h.run("INSERT INTO t VALUES (1, 99)");
            assert_eq!(res.count, 1, "{index}: {:?}", res.error);
            assert!(res.error.is_none(), "{index}: {:?}", res.error);

            let res = h.run("SELECT * FROM t WHERE id = 1");
            assert_eq!(res.count, 1, "{index}");
            let rows = res.data.unwrap();
            assert_eq!(rows[0]["v"], Value::Int(99), "{index}");
        }
    }

    #[test]
    fn test_delete_between_via_avl() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX AVL, v INT )");
        h.run("INSERT INTO t VALUES (1,1),(2,2),(3,3),(4,4),(5,5)");

        let res = h.run("DELETE FROM t WHERE id BETWEEN 2 AND 4");
        assert_eq!(res.count, 3);

        let res = h.run("SELECT * FROM t");
        assert_eq!(res.count, 2);
    }

    #[test]
    fn test_stale_btree_entries_filtered_by_heap() {
        // B+ keeps its entries on delete; reads must treat tombstoned
        // slots as absent.
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX BTREE, v INT )");
        h.run("INSERT INTO t VALUES (1, 10), (2, 20)");
        h.run("DELETE FROM t WHERE id = 1");

        let res = h.run("SELECT * FROM t WHERE id = 1");
        assert!(res.success);
        assert_eq!(res.count, 0);

        let res = h.run("SELECT * FROM t WHERE id BETWEEN 1 AND 2");
        assert_eq!(res.count, 1);
    }

    #[test]
    fn test_spatial_select_without_rtree_uses_linear_filter() {
        let mut h = Harness::new();
        h.run("CREATE TABLE p ( id INT KEY INDEX HASH, loc ARRAY )");
        h.run("INSERT INTO p VALUES (1, ARRAY[0.0, 0.0]), (2, ARRAY[0.5, 0.0]), (3, ARRAY[3.0, 3.0])");

        let res = h.run("SELECT * FROM p WHERE loc IN (ARRAY[0.0, 0.0], 1.0)");
        assert!(res.success);
        assert_eq!(res.count, 2);
        assert_eq!(res.explain.unwrap().operation, "sequential_scan");
    }

    #[test]
    fn test_unknown_table_fails_cleanly() {
        let mut h = Harness::new();
        for sql_text in [
            "SELECT * FROM ghost",
            "INSERT INTO ghost VALUES (1)",
            "DELETE FROM ghost",
        ] {
            let res = h.run(sql_text);
            assert!(!res.success, "{sql_text}");
            assert!(res.error.unwrap().contains("does not exist"), "{sql_text}");
        }
    }

    #[test]
    fn test_date_columns_roundtrip_through_sql() {
        let mut h = Harness::new();
        h.run("CREATE TABLE t ( id INT KEY INDEX HASH, d DATE )");
        let res = h.run("INSERT INTO t VALUES (1, \"2024-03-15\")");
        assert!(res.success);
        assert_eq!(res.count, 1);

        let res = h.run("SELECT * FROM t WHERE id = 1");
        let rows = res.data.unwrap();
        match &rows[0]["d"] {
            Value::Date(epoch) => {
                assert_eq!(crate::schema::format_date(*epoch), "2024-03-15");
            }
            other => panic!("expected date, got {other:?}"),
        }
    }
}

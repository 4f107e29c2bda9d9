#[cfg(test)]
mod tests {
    use crate::catalog::Table;
    use crate::optimizer::{
        COST_HASH_LOOKUP, COST_RTREE_SPATIAL, COST_SEQUENTIAL_FILTER, COST_SEQUENTIAL_SCAN,
        Optimizer, PlanOperation,
    };
    use crate::schema::{Column, DataType};
    use crate::sql::{self, IndexKind, Statement};
    use tempfile::TempDir;

    fn table(tmp: &TempDir) -> Table {
        let mut id = Column::new("id", DataType::Int);
        id.has_index = true;
        id.index_type = Some(IndexKind::Hash);

        let mut name = Column::new("name", DataType::Varchar);
        name.size = Some(50);
        name.has_index = true;
        name.index_type = Some(IndexKind::BTree);

        let mut price = Column::new("price", DataType::Float);
        price.has_index = true;
        price.index_type = Some(IndexKind::Avl);

        let mut day = Column::new("day", DataType::Date);
        day.has_index = true;
        day.index_type = Some(IndexKind::Isam);

        let mut loc = Column::new("loc", DataType::ArrayFloat);
        loc.has_index = true;
        loc.index_type = Some(IndexKind::RTree);

        let mut plain = Column::new("note", DataType::Varchar);
        plain.size = Some(100);

        Table::new(
            "products",
            vec![id, name, price, day, loc, plain],
            "id",
            IndexKind::Hash,
            tmp.path(),
        )
        .unwrap()
    }

    fn select_plan(optimizer: &Optimizer, table: &Table, sql_text: &str) -> crate::optimizer::ExecutionPlan {
        let Statement::Select(stmt) = sql::parse(sql_text).unwrap() else {
            panic!("expected SELECT");
        };
        optimizer.optimize_select(&stmt, table)
    }

    #[test]
    fn test_no_where_is_sequential_scan() {
        let tmp = TempDir::new().unwrap();
        let plan = select_plan(&Optimizer::new(), &table(&tmp), "SELECT * FROM products");
        assert_eq!(plan.operation, PlanOperation::SequentialScan);
        assert_eq!(plan.estimated_cost, COST_SEQUENTIAL_SCAN);
        assert!(plan.index_type.is_none());
    }

    #[test]
    fn test_equality_prefers_each_index_kind() {
        let tmp = TempDir::new().unwrap();
        let table = table(&tmp);
        let optimizer = Optimizer::new();

        let cases = [
            ("SELECT * FROM products WHERE id = 1", IndexKind::Hash, 1),
            ("SELECT * FROM products WHERE name = \"a\"", IndexKind::BTree, 3),
            ("SELECT * FROM products WHERE price = 1.5", IndexKind::Avl, 3),
            ("SELECT * FROM products WHERE day = \"2024-01-01\"", IndexKind::Isam, 5),
        ];
        for (sql_text, kind, cost) in cases {
            let plan = select_plan(&optimizer, &table, sql_text);
            assert_eq!(plan.operation, PlanOperation::IndexScan, "{sql_text}");
            assert_eq!(plan.index_type, Some(kind), "{sql_text}");
            assert_eq!(plan.estimated_cost, cost, "{sql_text}");
        }
    }

    #[test]
    fn test_equality_without_index_filters_sequentially() {
        let tmp = TempDir::new().unwrap();
        let plan = select_plan(
            &Optimizer::new(),
            &table(&tmp),
            "SELECT * FROM products WHERE note = \"x\"",
        );
        assert_eq!(plan.operation, PlanOperation::SequentialScan);
        assert_eq!(plan.estimated_cost, COST_SEQUENTIAL_FILTER);
    }

    #[test]
    fn test_equality_never_beats_sequential_scan_cost() {
        let tmp = TempDir::new().unwrap();
        let table = table(&tmp);
        let optimizer = Optimizer::new();
        for column in ["id", "name", "price", "day", "note"] {
            let plan = select_plan(
                &optimizer,
                &table,
                &format!("SELECT * FROM products WHERE {column} = 1"),
            );
            assert!(
                plan.estimated_cost <= COST_SEQUENTIAL_SCAN,
                "{column}: {}",
                plan.estimated_cost
            );
        }
    }

    #[test]
    fn test_range_uses_ordered_indices() {
        let tmp = TempDir::new().unwrap();
        let table = table(&tmp);
        let optimizer = Optimizer::new();

        let cases = [
            ("SELECT * FROM products WHERE name BETWEEN \"a\" AND \"m\"", IndexKind::BTree, 10),
            ("SELECT * FROM products WHERE price BETWEEN 1.0 AND 2.0", IndexKind::Avl, 10),
            ("SELECT * FROM products WHERE day BETWEEN 1 AND 9", IndexKind::Isam, 15),
        ];
        for (sql_text, kind, cost) in cases {
            let plan = select_plan(&optimizer, &table, sql_text);
            assert_eq!(plan.operation, PlanOperation::RangeScan, "{sql_text}");
            assert_eq!(plan.index_type, Some(kind), "{sql_text}");
            assert_eq!(plan.estimated_cost, cost, "{sql_text}");
        }
    }

    #[test]
    fn test_between_on_hash_column_falls_back_to_filter() {
        let tmp = TempDir::new().unwrap();
        let plan = select_plan(
            &Optimizer::new(),
            &table(&tmp),
            "SELECT * FROM products WHERE id BETWEEN 1 AND 9",
        );
        assert_eq!(plan.operation, PlanOperation::SequentialScan);
        assert_eq!(plan.estimated_cost, COST_SEQUENTIAL_FILTER);
        assert!(plan.index_type.is_none());
    }

    #[test]
    fn test_spatial_uses_rtree() {
        let tmp = TempDir::new().unwrap();
        let plan = select_plan(
            &Optimizer::new(),
            &table(&tmp),
            "SELECT * FROM products WHERE loc IN (ARRAY[0.0, 0.0], 0.5)",
        );
        assert_eq!(plan.operation, PlanOperation::SpatialScan);
        assert_eq!(plan.index_type, Some(IndexKind::RTree));
        assert_eq!(plan.estimated_cost, COST_RTREE_SPATIAL);
        assert_eq!(plan.index_column.as_deref(), Some("loc"));
    }

    #[test]
    fn test_spatial_without_rtree_filters_sequentially() {
        let tmp = TempDir::new().unwrap();
        let plan = select_plan(
            &Optimizer::new(),
            &table(&tmp),
            "SELECT * FROM products WHERE note IN (ARRAY[0.0, 0.0], 0.5)",
        );
        assert_eq!(plan.operation, PlanOperation::SequentialScan);
        assert_eq!(plan.estimated_cost, COST_SEQUENTIAL_FILTER);
    }

    #[test]
    fn test_unknown_column_degrades_to_scan() {
        let tmp = TempDir::new().unwrap();
        let plan = select_plan(
            &Optimizer::new(),
            &table(&tmp),
            "SELECT * FROM products WHERE ghost = 1",
        );
        assert_eq!(plan.operation, PlanOperation::SequentialScan);
        assert_eq!(plan.estimated_cost, COST_SEQUENTIAL_SCAN);
    }

    #[test]
    fn test_delete_plans_mirror_select() {
        let tmp = TempDir::new().unwrap();
        let table = table(&tmp);
        let optimizer = Optimizer::new();

        let Statement::Delete(stmt) = sql::parse("DELETE FROM products WHERE id = 1").unwrap()
        else {
            panic!("expected DELETE");
        };
        let plan = optimizer.optimize_delete(&stmt, &table);
        assert_eq!(plan.operation, PlanOperation::IndexScan);
        assert_eq!(plan.estimated_cost, COST_HASH_LOOKUP);

        let Statement::Delete(stmt) = sql::parse("DELETE FROM products").unwrap() else {
            panic!("expected DELETE");
        };
        let plan = optimizer.optimize_delete(&stmt, &table);
        assert_eq!(plan.operation, PlanOperation::SequentialScan);
    }

    #[test]
    fn test_selectivity_buckets() {
        let tmp = TempDir::new().unwrap();
        let table = table(&tmp);
        let optimizer = Optimizer::new();

        let parse_cond = |sql_text: &str| {
            let Statement::Select(stmt) = sql::parse(sql_text).unwrap() else {
                panic!("expected SELECT");
            };
            stmt.condition
        };

        assert_eq!(optimizer.estimate_selectivity(None, &table), 1.0);
        assert_eq!(
            optimizer.estimate_selectivity(
                parse_cond("SELECT * FROM products WHERE id = 1").as_ref(),
                &table
            ),
            0.01
        );
        // Integer ranges scale with their span. The id column is INT.
        assert_eq!(
            optimizer.estimate_selectivity(
                parse_cond("SELECT * FROM products WHERE id BETWEEN 1 AND 50").as_ref(),
                &table
            ),
            0.1
        );
        assert_eq!(
            optimizer.estimate_selectivity(
                parse_cond("SELECT * FROM products WHERE id BETWEEN 0 AND 500").as_ref(),
                &table
            ),
            0.3
        );
        assert_eq!(
            optimizer.estimate_selectivity(
                parse_cond("SELECT * FROM products WHERE id BETWEEN 0 AND 5000").as_ref(),
                &table
            ),
            0.5
        );
        // Spatial scales with the radius.
        assert_eq!(
            optimizer.estimate_selectivity(
                parse_cond("SELECT * FROM products WHERE loc IN (ARRAY[0.0,0.0], 0.005)").as_ref(),
                &table
            ),
            0.05
        );
        assert_eq!(
            optimizer.estimate_selectivity(
                parse_cond("SELECT * FROM products WHERE loc IN (ARRAY[0.0,0.0], 0.5)").as_ref(),
                &table
            ),
            0.3
        );
    }
}

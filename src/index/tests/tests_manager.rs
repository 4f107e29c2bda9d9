#[cfg(test)]
mod tests {
    use crate::index::manager::IndexManager;
    use crate::schema::{Column, DataType, Record, Value};
    use crate::sql::IndexKind;
    use tempfile::TempDir;

    fn columns() -> Vec<Column> {
        let mut id = Column::new("id", DataType::Int);
        id.is_primary_key = true;
        id.has_index = true;
        id.index_type = Some(IndexKind::Hash);

        let mut name = Column::new("name", DataType::Varchar);
        name.size = Some(20);
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

        vec![id, name, price, day, Column::new("note", DataType::Int), loc]
    }

    fn record(id: i32, name: &str, price: f32, day: i64, point: (f32, f32)) -> Record {
        let mut r = Record::new();
        r.insert("id".into(), Value::Int(id));
        r.insert("name".into(), Value::Str(name.into()));
        r.insert("price".into(), Value::Float(price));
        r.insert("day".into(), Value::Date(day));
        r.insert("note".into(), Value::Int(0));
        r.insert("loc".into(), Value::Point(point.0, point.1));
        r
    }

    fn manager(tmp: &TempDir) -> IndexManager {
        IndexManager::open("shops", columns(), tmp.path()).unwrap()
    }

    #[test]
    fn test_opens_an_index_per_indexed_column() {
        let tmp = TempDir::new().unwrap();
        let m = manager(&tmp);

        for col in ["id", "name", "price", "day", "loc"] {
            assert!(m.has_index(col), "missing index for {col}");
        }
        assert!(!m.has_index("note"));
        assert_eq!(m.index_kind("id"), Some(IndexKind::Hash));
        assert_eq!(m.index_kind("name"), Some(IndexKind::BTree));
        assert!(tmp.path().join("indices").is_dir());
    }

    #[test]
    fn test_index_files_follow_naming_scheme() {
        let tmp = TempDir::new().unwrap();
        let mut m = manager(&tmp);
        m.insert(&record(1, "a", 1.0, 100, (0.0, 0.0)), 0);
        m.save_all();

        let indices = tmp.path().join("indices");
        for file in [
            "id_hash_dir.bin",
            "id_hash_data.bin",
            "name_btree.dat",
            "name_btree_meta.json",
            "price_avl.dat",
            "day_isam_index1.dat",
            "day_isam_index2.dat",
            "day_isam_data.dat",
            "loc_rtree.dat",
            "loc_rtree_meta.json",
        ] {
            assert!(indices.join(file).exists(), "missing {file}");
        }
    }

    #[test]
    fn test_insert_fans_out_and_search_routes() {
        let tmp = TempDir::new().unwrap();
        let mut m = manager(&tmp);

        for i in 0..5 {
            let r = record(i, &format!("shop{i}"), i as f32 * 1.5, 1000 + i64::from(i), (i as f32, 0.0));
            m.insert(&r, i as u64);
        }

        assert_eq!(m.search("id", &Value::Int(3)).unwrap(), Some(3));
        assert_eq!(m.search("name", &Value::Str("shop2".into())).unwrap(), Some(2));
        assert_eq!(m.search("price", &Value::Float(6.0)).unwrap(), Some(4));
        assert_eq!(m.search("day", &Value::Date(1001)).unwrap(), Some(1));
        // Unindexed column and the point index answer no point lookups.
        assert_eq!(m.search("note", &Value::Int(0)).unwrap(), None);
        assert_eq!(m.search("loc", &Value::Int(0)).unwrap(), None);
    }

    #[test]
    fn test_range_routes_to_ordered_structures() {
        let tmp = TempDir::new().unwrap();
        let mut m = manager(&tmp);

        for i in 0..8 {
            let r = record(i, &format!("n{i}"), i as f32, 100 + i64::from(i), (0.0, 0.0));
            m.insert(&r, i as u64);
        }

        let mut avl = m.range_search("price", &Value::Float(2.0), &Value::Float(5.0)).unwrap();
        avl.sort_unstable();
        assert_eq!(avl, vec![2, 3, 4, 5]);

        let btree = m
            .range_search(
                "name",
                &Value::Str("n2".into()),
                &Value::Str("n4".into()),
            )
            .unwrap();
        assert_eq!(btree.len(), 3);

        let mut isam = m.range_search("day", &Value::Date(103), &Value::Date(106)).unwrap();
        isam.sort_unstable();
        assert_eq!(isam, vec![3, 4, 5, 6]);

        // Hash is point-only.
        assert!(m.range_search("id", &Value::Int(0), &Value::Int(9)).unwrap().is_empty());
    }

    #[test]
    fn test_spatial_routes_to_rtree_only() {
        let tmp = TempDir::new().unwrap();
        let mut m = manager(&tmp);

        m.insert(&record(1, "a", 0.0, 1, (0.0, 0.0)), 0);
        m.insert(&record(2, "b", 0.0, 2, (5.0, 5.0)), 1);

        let hits = m.spatial_search("loc", (0.1, 0.1), 1.0).unwrap();
        assert_eq!(hits, vec![0]);
        assert!(m.spatial_search("id", (0.0, 0.0), 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_delete_updates_only_deletion_capable_indices() {
        let tmp = TempDir::new().unwrap();
        let mut m = manager(&tmp);

        let r = record(7, "gone", 7.5, 777, (1.0, 1.0));
        m.insert(&r, 0);
        m.delete(&r);

        // AVL, hash, and ISAM dropped the key.
        assert_eq!(m.search("id", &Value::Int(7)).unwrap(), None);
        assert_eq!(m.search("price", &Value::Float(7.5)).unwrap(), None);
        assert_eq!(m.search("day", &Value::Date(777)).unwrap(), None);
        // B+ and R-tree entries stay; readers filter via heap tombstones.
        assert_eq!(m.search("name", &Value::Str("gone".into())).unwrap(), Some(0));
        assert_eq!(m.spatial_search("loc", (1.0, 1.0), 0.1).unwrap(), vec![0]);
    }

    #[test]
    fn test_null_keys_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut m = manager(&tmp);

        let mut r = record(1, "a", 1.0, 1, (0.0, 0.0));
        r.insert("price".into(), Value::Null);
        m.insert(&r, 0);

        assert_eq!(m.search("id", &Value::Int(1)).unwrap(), Some(0));
        assert_eq!(m.search("price", &Value::Float(0.0)).unwrap(), None);
    }

    #[test]
    fn test_saved_indices_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let mut m = manager(&tmp);
            for i in 0..4 {
                m.insert(&record(i, &format!("n{i}"), i as f32, 10 + i64::from(i), (0.0, 0.0)), i as u64);
            }
            m.save_all();
        }

        let mut m = manager(&tmp);
        assert_eq!(m.search("id", &Value::Int(2)).unwrap(), Some(2));
        assert_eq!(m.search("name", &Value::Str("n3".into())).unwrap(), Some(3));
        assert_eq!(m.search("day", &Value::Date(11)).unwrap(), Some(1));
    }
}

#[cfg(test)]
mod tests {
    use crate::index::isam::IsamFile;
    use crate::index::{Index, IndexError, Key, KeyCodec, KeyType};
    use crate::schema::Value;
    use tempfile::TempDir;

    fn open_int(tmp: &TempDir) -> IsamFile {
        IsamFile::open(
            tmp.path().join("k_isam_index1.dat"),
            tmp.path().join("k_isam_index2.dat"),
            tmp.path().join("k_isam_data.dat"),
            KeyCodec::new(KeyType::Int),
        )
        .unwrap()
    }

    fn built(tmp: &TempDir, keys: &[i32]) -> IsamFile {
        let mut isam = open_int(tmp);
        let entries: Vec<(Key, i32)> = keys.iter().map(|k| (Key::Int(*k), *k)).collect();
        isam.build(entries).unwrap();
        isam
    }

    #[test]
    fn test_build_and_search() {
        let tmp = TempDir::new().unwrap();
        let isam = built(&tmp, &[10, 20, 30, 40, 50, 60, 70, 80]);

        for key in [10, 40, 70, 80] {
            assert_eq!(isam.search_entry(&Key::Int(key)).unwrap(), Some(key), "key {key}");
        }
        assert_eq!(isam.search_entry(&Key::Int(999)).unwrap(), None);
        assert_eq!(isam.search_entry(&Key::Int(15)).unwrap(), None);
    }

    #[test]
    fn test_pages_are_sorted() {
        let tmp = TempDir::new().unwrap();
        // Build from unsorted input; pages must come out ordered.
        let isam = built(&tmp, &[70, 10, 50, 30, 80, 20, 60, 40]);

        let mut last: Option<i32> = None;
        for page in isam.page_keys().unwrap() {
            let mut prev: Option<i32> = None;
            for key in page {
                let Key::Int(v) = key else { panic!("unexpected key") };
                if let Some(p) = prev {
                    assert!(p <= v, "page keys out of order: {p} > {v}");
                }
                prev = Some(v);
                last = Some(v);
            }
        }
        assert_eq!(last, Some(80));
    }

    #[test]
    fn test_overflow_chain_grows_on_inserts() {
        // Scenario: build from 8 keys (BLOCK_FACTOR = 3), then push four
        // keys that all land on the last page.
        let tmp = TempDir::new().unwrap();
        let mut isam = built(&tmp, &[10, 20, 30, 40, 50, 60, 70, 80]);

        for key in [85, 86, 87, 88] {
            isam.insert_entry(Key::Int(key), key).unwrap();
        }
        for key in [10, 20, 30, 40, 50, 60, 70, 80, 85, 86, 87, 88] {
            assert_eq!(isam.search_entry(&Key::Int(key)).unwrap(), Some(key), "key {key}");
        }

        // The page holding the last built group now has overflow, and the
        // chain visits each page exactly once.
        let base = isam.locate(&Key::Int(85)).unwrap();
        let chain = isam.chain_offsets(base).unwrap();
        assert!(chain.len() > 1, "no overflow chain grew");
        let mut dedup = chain.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), chain.len(), "overflow chain revisits a page");

        let keys: Vec<i32> = isam
            .range_entries(&Key::Int(10), &Key::Int(90))
            .unwrap()
            .into_iter()
            .map(|(k, _)| match k {
                Key::Int(v) => v,
                other => panic!("unexpected key {other}"),
            })
            .collect();
        assert_eq!(keys, vec![10, 20, 30, 40, 50, 60, 70, 80, 85, 86, 87, 88]);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut isam = built(&tmp, &[10, 20, 30]);

        let err = isam.insert_entry(Key::Int(20), 99).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey(_)));
        // The original slot is untouched.
        assert_eq!(isam.search_entry(&Key::Int(20)).unwrap(), Some(20));
    }

    #[test]
    fn test_remove_marks_without_restructuring() {
        let tmp = TempDir::new().unwrap();
        let mut isam = built(&tmp, &[10, 20, 30, 40, 50]);

        assert!(isam.remove_entry(&Key::Int(30)).unwrap());
        assert_eq!(isam.search_entry(&Key::Int(30)).unwrap(), None);
        assert!(!isam.remove_entry(&Key::Int(30)).unwrap());

        // Neighbours survive.
        assert_eq!(isam.search_entry(&Key::Int(20)).unwrap(), Some(20));
        assert_eq!(isam.search_entry(&Key::Int(40)).unwrap(), Some(40));

        let keys: Vec<i32> = isam
            .range_entries(&Key::Int(10), &Key::Int(50))
            .unwrap()
            .into_iter()
            .map(|(k, _)| match k {
                Key::Int(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![10, 20, 40, 50]);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let tmp = TempDir::new().unwrap();
        let isam = built(&tmp, &[10, 20, 30, 40, 50, 60, 70, 80]);

        let keys: Vec<i32> = isam
            .range_entries(&Key::Int(30), &Key::Int(80))
            .unwrap()
            .into_iter()
            .map(|(k, _)| match k {
                Key::Int(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![30, 40, 50, 60, 70, 80]);

        // Swapped bounds are normalized.
        let swapped = isam.range_entries(&Key::Int(80), &Key::Int(30)).unwrap();
        assert_eq!(swapped.len(), 6);
    }

    #[test]
    fn test_first_insert_bootstraps_empty_structure() {
        let tmp = TempDir::new().unwrap();
        let mut isam = open_int(&tmp);

        assert_eq!(isam.search_entry(&Key::Int(5)).unwrap(), None);
        isam.insert_entry(Key::Int(5), 50).unwrap();
        isam.insert_entry(Key::Int(3), 30).unwrap();
        isam.insert_entry(Key::Int(8), 80).unwrap();

        assert_eq!(isam.search_entry(&Key::Int(5)).unwrap(), Some(50));
        assert_eq!(isam.search_entry(&Key::Int(3)).unwrap(), Some(30));
        let entries = isam.range_entries(&Key::Int(0), &Key::Int(10)).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_string_keys_through_index_trait() {
        let tmp = TempDir::new().unwrap();
        let mut isam = IsamFile::open(
            tmp.path().join("n_isam_index1.dat"),
            tmp.path().join("n_isam_index2.dat"),
            tmp.path().join("n_isam_data.dat"),
            KeyCodec::new(KeyType::Str(8)),
        )
        .unwrap();

        for (i, name) in ["ana", "luis", "carla"].iter().enumerate() {
            isam.insert(&Value::Str((*name).into()), i as u64).unwrap();
        }
        assert_eq!(isam.find(&Value::Str("luis".into())).unwrap(), Some(1));
        let slots = isam
            .range(&Value::Str("a".into()), &Value::Str("z".into()))
            .unwrap();
        assert_eq!(slots.len(), 3);
    }
}

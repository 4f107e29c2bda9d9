#[cfg(test)]
mod tests {
    use crate::index::avl::AvlFile;
    use crate::index::{Index, Key, KeyCodec, KeyType};
    use crate::schema::Value;
    use rand::seq::SliceRandom;
    use tempfile::TempDir;

    fn int_avl(tmp: &TempDir) -> AvlFile {
        AvlFile::open(tmp.path().join("k_avl.dat"), KeyCodec::new(KeyType::Int)).unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let tmp = TempDir::new().unwrap();
        let mut avl = int_avl(&tmp);

        for (i, key) in [50, 20, 80, 10, 30, 70, 90].iter().enumerate() {
            avl.insert_entry(Key::Int(*key), i as i32).unwrap();
        }
        assert_eq!(avl.find_entry(&Key::Int(30)).unwrap(), Some(4));
        assert_eq!(avl.find_entry(&Key::Int(90)).unwrap(), Some(6));
        assert_eq!(avl.find_entry(&Key::Int(55)).unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_updates_slot() {
        let tmp = TempDir::new().unwrap();
        let mut avl = int_avl(&tmp);

        avl.insert_entry(Key::Int(7), 1).unwrap();
        avl.insert_entry(Key::Int(7), 99).unwrap();

        assert_eq!(avl.find_entry(&Key::Int(7)).unwrap(), Some(99));
        // No second node was created.
        assert_eq!(avl.inorder().unwrap().len(), 1);
    }

    #[test]
    fn test_inorder_is_sorted_and_balance_holds() {
        let tmp = TempDir::new().unwrap();
        let mut avl = int_avl(&tmp);

        let mut keys: Vec<i32> = (0..64).collect();
        keys.shuffle(&mut rand::rng());
        for key in &keys {
            avl.insert_entry(Key::Int(*key), *key).unwrap();
            assert_eq!(avl.verify_balance().unwrap(), None, "unbalanced after {key}");
        }

        let inorder: Vec<i32> = avl
            .inorder()
            .unwrap()
            .into_iter()
            .map(|(k, _)| match k {
                Key::Int(v) => v,
                other => panic!("unexpected key {other}"),
            })
            .collect();
        let expected: Vec<i32> = (0..64).collect();
        assert_eq!(inorder, expected);
    }

    #[test]
    fn test_ascending_inserts_stay_balanced() {
        // Worst case for an unbalanced BST; rotations must kick in.
        let tmp = TempDir::new().unwrap();
        let mut avl = int_avl(&tmp);

        for key in 0..128 {
            avl.insert_entry(Key::Int(key), key).unwrap();
        }
        assert_eq!(avl.verify_balance().unwrap(), None);
        for key in 0..128 {
            assert_eq!(avl.find_entry(&Key::Int(key)).unwrap(), Some(key));
        }
    }

    #[test]
    fn test_remove_keeps_balance_and_find_agreement() {
        let tmp = TempDir::new().unwrap();
        let mut avl = int_avl(&tmp);

        let mut keys: Vec<i32> = (0..40).collect();
        keys.shuffle(&mut rand::rng());
        for key in &keys {
            avl.insert_entry(Key::Int(*key), *key * 10).unwrap();
        }

        let mut removed = Vec::new();
        for key in keys.iter().take(20) {
            avl.remove_entry(&Key::Int(*key)).unwrap();
            removed.push(*key);
            assert_eq!(avl.verify_balance().unwrap(), None, "unbalanced after removing {key}");
        }

        for key in 0..40 {
            let found = avl.find_entry(&Key::Int(key)).unwrap();
            if removed.contains(&key) {
                assert_eq!(found, None, "key {key} should be gone");
            } else {
                assert_eq!(found, Some(key * 10), "key {key} lost its slot");
            }
        }
    }

    #[test]
    fn test_remove_two_child_node_keeps_successor_slot() {
        let tmp = TempDir::new().unwrap();
        let mut avl = int_avl(&tmp);

        for (key, slot) in [(50, 1), (30, 2), (70, 3), (60, 4), (80, 5)] {
            avl.insert_entry(Key::Int(key), slot).unwrap();
        }
        // 70 has two children; its successor 80 must arrive with slot 5.
        avl.remove_entry(&Key::Int(70)).unwrap();
        assert_eq!(avl.find_entry(&Key::Int(80)).unwrap(), Some(5));
        assert_eq!(avl.find_entry(&Key::Int(70)).unwrap(), None);
    }

    #[test]
    fn test_range_search_inclusive() {
        let tmp = TempDir::new().unwrap();
        let mut avl = int_avl(&tmp);

        for key in [5, 10, 15, 20, 25, 30] {
            avl.insert_entry(Key::Int(key), key).unwrap();
        }
        let mut slots = avl.range_entries(&Key::Int(10), &Key::Int(25)).unwrap();
        slots.sort_unstable();
        assert_eq!(slots, vec![10, 15, 20, 25]);

        assert!(avl.range_entries(&Key::Int(31), &Key::Int(99)).unwrap().is_empty());
    }

    #[test]
    fn test_string_keys() {
        let tmp = TempDir::new().unwrap();
        let mut avl = AvlFile::open(
            tmp.path().join("name_avl.dat"),
            KeyCodec::new(KeyType::Str(10)),
        )
        .unwrap();

        for (i, name) in ["pear", "apple", "mango", "fig"].iter().enumerate() {
            avl.insert(&Value::Str((*name).into()), i as u64).unwrap();
        }
        assert_eq!(avl.find(&Value::Str("mango".into())).unwrap(), Some(2));
        assert_eq!(avl.find(&Value::Str("kiwi".into())).unwrap(), None);

        let slots = avl
            .range(&Value::Str("apple".into()), &Value::Str("mango".into()))
            .unwrap();
        // apple, fig, mango.
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn test_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("k_avl.dat");

        let mut avl = AvlFile::open(&path, KeyCodec::new(KeyType::Int)).unwrap();
        for key in [3, 1, 4, 1, 5, 9, 2, 6] {
            avl.insert_entry(Key::Int(key), key).unwrap();
        }
        drop(avl);

        let avl = AvlFile::open(&path, KeyCodec::new(KeyType::Int)).unwrap();
        assert_eq!(avl.find_entry(&Key::Int(9)).unwrap(), Some(9));
        assert_eq!(avl.verify_balance().unwrap(), None);
    }
}

use std::time::Duration;

use hostwatch::cluster::consistent_hashing::jump_consistent_hash;
use hostwatch::expiring_map::ExpiringMap;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_consistent_hashing_bounds_property(
        key in "[a-zA-Z0-9.:-]+",
        bucket_count in 1u32..100
    ) {
        let result = jump_consistent_hash(&key, bucket_count);
        prop_assert!(result < bucket_count);
    }

    #[test]
    fn test_consistent_hashing_deterministic_property(
        key in "[a-zA-Z0-9.:-]+",
        bucket_count in 1u32..100
    ) {
        let result1 = jump_consistent_hash(&key, bucket_count);
        let result2 = jump_consistent_hash(&key, bucket_count);
        prop_assert_eq!(result1, result2);
    }

    #[test]
    fn test_consistent_hashing_growth_moves_keys_only_to_new_bucket(
        key in "[a-zA-Z0-9.:-]+",
        bucket_count in 1u32..50
    ) {
        let before = jump_consistent_hash(&key, bucket_count);
        let after = jump_consistent_hash(&key, bucket_count + 1);
        prop_assert!(after == before || after == bucket_count);
    }

    #[test]
    fn test_insert_if_absent_first_writer_wins(
        key in 0u32..1000,
        values in proptest::collection::vec("[a-z]{1,8}", 1..20)
    ) {
        let mut map = ExpiringMap::new(Duration::from_secs(3600));
        let mut winners = 0;
        for value in values.iter() {
            if map.insert_if_absent(key, value.clone(), Duration::from_secs(3600)) {
                winners += 1;
            }
        }
        prop_assert_eq!(winners, 1);
        prop_assert_eq!(map.get(&key), Some(&values[0]));
        prop_assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_put_is_last_write_wins(
        keys in proptest::collection::vec(0u8..16, 1..64)
    ) {
        let mut map = ExpiringMap::new(Duration::from_secs(3600));
        for (i, key) in keys.iter().enumerate() {
            map.insert(*key, i);
        }
        for key in keys.iter() {
            let last = keys.iter().rposition(|k| k == key).unwrap();
            prop_assert_eq!(map.get(key), Some(&last));
        }
        let mut distinct = keys.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(map.len(), distinct.len());
        prop_assert_eq!(map.expire_keys(), 0);
    }
}

//! Cache key generation utilities
//!
//! This module provides consistent key generation for everything the
//! cache-and-contention layer writes to the KV store.

/// Namespace of shop entries written with a hard TTL
pub const SHOP_PREFIX: &str = "cache:shop:";

/// Namespace of hot shop entries written with a logical expiry
pub const SHOP_HOT_PREFIX: &str = "cache:shop:hot:";

/// Namespace of seckill voucher metadata
pub const SECKILL_VOUCHER_PREFIX: &str = "cache:seckill:voucher:";

/// Prefix shared by every distributed lock
pub const LOCK_PREFIX: &str = "lock:";

/// Build the cache key for an entity id under a namespace
pub fn entity(prefix: &str, id: impl std::fmt::Display) -> String {
    format!("{}{}", prefix, id)
}

/// Full KV key of a named lock. Rebuild locks are named after the cache key
/// they guard, so `cache:shop:7` is protected by `lock:cache:shop:7`.
pub fn lock(name: &str) -> String {
    format!("{}{}", LOCK_PREFIX, name)
}

/// Name of the per-user order lock
pub fn order_lock_name(user_id: i64) -> String {
    format!("order:{}", user_id)
}

/// Daily counter behind the id generator (`date` is `yyyy:MM:dd`)
pub fn id_counter(sequence: &str, date: &str) -> String {
    format!("counter:{}:{}", sequence, date)
}

/// Stock counter read by the admission script
pub fn seckill_stock(voucher_id: i64) -> String {
    format!("seckill:stock:{}", voucher_id)
}

/// Set of users that already passed admission for a voucher
pub fn seckill_ordered(voucher_id: i64) -> String {
    format!("seckill:order:{}", voucher_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(entity(SHOP_PREFIX, 7), "cache:shop:7");
        assert_eq!(lock(&entity(SHOP_PREFIX, 7)), "lock:cache:shop:7");
        assert_eq!(lock(&order_lock_name(42)), "lock:order:42");
        assert_eq!(id_counter("order", "2026:10:16"), "counter:order:2026:10:16");
        assert_ne!(seckill_stock(3), seckill_ordered(3));
    }
}

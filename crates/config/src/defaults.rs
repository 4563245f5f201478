//! Default values for engine configuration

pub fn default_max_cycle_depth() -> usize {
    10
}

pub fn default_max_proposals() -> u32 {
    10
}

pub fn default_cache_ttl_seconds() -> u64 {
    300
}

pub fn default_cache_max_entries() -> u64 {
    10000
}

pub fn default_sweep_batch_size() -> u32 {
    100
}

pub fn default_retry_reads() -> bool {
    true
}

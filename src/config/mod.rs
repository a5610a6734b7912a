use derive_with::With;

#[derive(Debug, Clone, Copy, With)]
pub struct BufferPoolConfig {
    /// Number of page frames kept in memory per open file.
    pub buffer_pool_size: usize,
    pub lru_k_k: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig {
            buffer_pool_size: 1024,
            lru_k_k: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, With)]
pub struct IndexConfig {
    pub buffer_pool: BufferPoolConfig,
    /// Start EQ/GE/GT scans at the first candidate leaf instead of the leftmost
    /// leaf, and stop EQ/LT/LE scans once keys pass the scan value.
    pub scan_seek_enable: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            buffer_pool: BufferPoolConfig::default(),
            scan_seek_enable: true,
        }
    }
}

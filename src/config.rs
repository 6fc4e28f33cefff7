/// Runtime configuration consumed by `Runtime::new`.

/// Tunables for a runtime embedding. Generated programs use the
/// defaults; hosts can size pages for their workload.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Usable bytes per arena page (clamped up to 64 by the arena).
    pub page_size: usize,
    /// Capacity hint for tables created through the runtime handle.
    pub table_capacity: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig { page_size: 4096, table_capacity: 8 }
    }
}

//! Configuration for CanopyKV data structures
//!
//! Centralized configuration with sensible defaults. Both structures are
//! self-describing once persisted: the capacities stored with the root/head
//! node override these values when an existing structure is reopened.

/// Configuration for a [`crate::BTree`]
#[derive(Debug, Clone, Copy)]
pub struct BTreeConfig {
    /// Minimum number of keys a non-root node may hold. A node holds at
    /// most `2 * min_data + 1` keys and `2 * min_data + 2` children.
    pub min_data: usize,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        Self { min_data: 100 }
    }
}

impl BTreeConfig {
    /// Create a new config builder
    pub fn builder() -> BTreeConfigBuilder {
        BTreeConfigBuilder::default()
    }
}

/// Builder for BTreeConfig
#[derive(Default)]
pub struct BTreeConfigBuilder {
    config: BTreeConfig,
}

impl BTreeConfigBuilder {
    /// Set the minimum per-node key count
    pub fn min_data(mut self, min_data: usize) -> Self {
        self.config.min_data = min_data;
        self
    }

    pub fn build(self) -> BTreeConfig {
        self.config
    }
}

/// Configuration for a [`crate::PagedList`]
#[derive(Debug, Clone, Copy)]
pub struct PagedListConfig {
    /// Maximum number of value references a page may hold.
    pub page_size: usize,
}

impl Default for PagedListConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

impl PagedListConfig {
    /// Create a new config builder
    pub fn builder() -> PagedListConfigBuilder {
        PagedListConfigBuilder::default()
    }
}

/// Builder for PagedListConfig
#[derive(Default)]
pub struct PagedListConfigBuilder {
    config: PagedListConfig,
}

impl PagedListConfigBuilder {
    /// Set the per-page capacity
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn build(self) -> PagedListConfig {
        self.config
    }
}

use pglens_gateway::SchemaFilter;
use pglens_model::SchemaSnapshot;

/// Optional snapshot cache keyed by the catalog fetch filter.
///
/// TTL and eviction semantics belong to the implementation; the engine only
/// observes hit or miss. Snapshots are immutable once stored.
pub trait SchemaCache: Send + Sync {
    /// Cached snapshot for a filter, when fresh enough.
    fn get(&self, filter: &SchemaFilter) -> Option<SchemaSnapshot>;
    /// Store a freshly fetched snapshot.
    fn put(&self, filter: &SchemaFilter, snapshot: &SchemaSnapshot);
}

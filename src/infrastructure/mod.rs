//! Lock-guarded tables and identifier pools backing the coordinator.

pub mod id_pool;
pub mod in_memory;

//! Memory utilities: aligned page buffers and NUMA awareness.

mod buffer;
mod numa;

pub use buffer::{PageBuffer, IO_ALIGNMENT};
pub use numa::{
    bind_thread_to_node, create_allocator, create_topology, numa_available, platform_node_count,
    FallbackAllocator, FallbackTopology, NumaAllocator, NumaTopology,
};

//! NUMA topology probing, node-local allocation, and thread binding.
//!
//! NUMA systems attach memory to CPU sockets; touching local memory is
//! cheaper than reaching across the interconnect. This module exposes the
//! two capabilities the buffer pool and worker pool need:
//!
//! - [`NumaTopology`]: how many nodes exist and which one the current
//!   thread runs on
//! - [`NumaAllocator`]: page buffers whose physical memory prefers a node
//!
//! Both are traits with a platform implementation (Linux, via sysfs and
//! `mbind`) and a fallback that degrades to node-agnostic behaviour without
//! error. Construction goes through [`create_topology`] and
//! [`create_allocator`], which consult [`NumaOptions`]; nothing else reads
//! the environment.

use std::sync::Arc;

use crate::config::NumaOptions;

use super::buffer::PageBuffer;

/// Reports the NUMA node layout of the machine.
pub trait NumaTopology: Send + Sync {
    /// Number of usable NUMA nodes (always at least 1).
    fn node_count(&self) -> usize;

    /// Node the calling thread is currently scheduled on.
    fn current_node(&self) -> usize;
}

/// Allocates page buffers with node affinity.
pub trait NumaAllocator: Send + Sync {
    /// Allocates a zeroed buffer of `size` bytes preferring `node`.
    ///
    /// Returns `None` when the underlying allocator fails. The node
    /// preference is best effort; the buffer is usable either way.
    fn allocate(&self, size: usize, node: usize) -> Option<PageBuffer>;
}

/// Returns whether the platform exposes NUMA information.
#[must_use]
pub fn numa_available() -> bool {
    #[cfg(target_os = "linux")]
    {
        std::path::Path::new("/sys/devices/system/node").exists()
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Returns the node count reported by the platform, or 1.
#[must_use]
pub fn platform_node_count() -> usize {
    #[cfg(target_os = "linux")]
    {
        let count = std::fs::read_dir("/sys/devices/system/node")
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| {
                        let name = e.file_name();
                        let name = name.to_string_lossy();
                        name.starts_with("node")
                            && name[4..].chars().all(|c| c.is_ascii_digit())
                            && name.len() > 4
                    })
                    .count()
            })
            .unwrap_or(0);
        count.max(1)
    }
    #[cfg(not(target_os = "linux"))]
    {
        1
    }
}

/// Topology that trusts a caller-supplied node count.
///
/// Used when NUMA is disabled or the platform has no NUMA information.
/// `current_node` spreads threads across the pseudo-nodes by CPU index so
/// sharding still distributes work.
pub struct FallbackTopology {
    nodes: usize,
}

impl FallbackTopology {
    /// Creates a fallback topology with the given node count (min 1).
    #[must_use]
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes: nodes.max(1),
        }
    }
}

impl NumaTopology for FallbackTopology {
    fn node_count(&self) -> usize {
        self.nodes
    }

    fn current_node(&self) -> usize {
        #[cfg(target_os = "linux")]
        {
            let cpu = unsafe { libc::sched_getcpu() };
            if cpu < 0 {
                0
            } else {
                cpu as usize % self.nodes
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            0
        }
    }
}

/// Topology backed by the Linux sysfs node directory.
#[cfg(target_os = "linux")]
pub struct PlatformTopology {
    nodes: usize,
    /// cpu index -> node index, built from nodeN/cpulist files.
    cpu_to_node: Vec<usize>,
}

#[cfg(target_os = "linux")]
impl PlatformTopology {
    /// Probes sysfs; a non-zero `preferred` overrides the detected count.
    #[must_use]
    pub fn probe(preferred: usize) -> Self {
        let configured = platform_node_count();
        let nodes = if preferred > 0 { preferred } else { configured };

        let mut cpu_to_node = Vec::new();
        for node in 0..configured {
            let path = format!("/sys/devices/system/node/node{node}/cpulist");
            let Ok(list) = std::fs::read_to_string(path) else {
                continue;
            };
            for cpu in parse_cpu_list(&list) {
                if cpu >= cpu_to_node.len() {
                    cpu_to_node.resize(cpu + 1, 0);
                }
                cpu_to_node[cpu] = node;
            }
        }

        Self { nodes, cpu_to_node }
    }
}

#[cfg(target_os = "linux")]
impl NumaTopology for PlatformTopology {
    fn node_count(&self) -> usize {
        self.nodes.max(1)
    }

    fn current_node(&self) -> usize {
        let cpu = unsafe { libc::sched_getcpu() };
        if cpu < 0 {
            return 0;
        }
        let node = self
            .cpu_to_node
            .get(cpu as usize)
            .copied()
            .unwrap_or(cpu as usize);
        node % self.node_count()
    }
}

/// Allocator that ignores the node preference.
pub struct FallbackAllocator;

impl NumaAllocator for FallbackAllocator {
    fn allocate(&self, size: usize, _node: usize) -> Option<PageBuffer> {
        PageBuffer::try_page_aligned(size)
    }
}

/// Allocator that asks the kernel to place buffers on a specific node.
///
/// Allocation itself is ordinary aligned allocation; the node preference is
/// applied with `mbind(MPOL_PREFERRED)` on the buffer's pages. The kernel
/// may still place pages elsewhere under memory pressure, matching the
/// best-effort contract of [`NumaAllocator::allocate`].
#[cfg(target_os = "linux")]
pub struct NodeBoundAllocator {
    forced_node: Option<usize>,
}

#[cfg(target_os = "linux")]
impl NodeBoundAllocator {
    /// Creates the allocator; `forced_node` overrides every request.
    #[must_use]
    pub fn new(forced_node: Option<usize>) -> Self {
        Self { forced_node }
    }
}

#[cfg(target_os = "linux")]
impl NumaAllocator for NodeBoundAllocator {
    fn allocate(&self, size: usize, node: usize) -> Option<PageBuffer> {
        let mut buffer = PageBuffer::try_page_aligned(size)?;
        let target = self.forced_node.unwrap_or(node);
        if !bind_region(buffer.as_mut_ptr(), buffer.len(), target) {
            tracing::debug!(node = target, size, "mbind failed, buffer unpinned");
        }
        Some(buffer)
    }
}

/// Applies a preferred-node memory policy to `[ptr, ptr + len)`.
#[cfg(target_os = "linux")]
fn bind_region(ptr: *mut u8, len: usize, node: usize) -> bool {
    let bits = 8 * std::mem::size_of::<libc::c_ulong>();
    let words = node / bits + 1;
    let mut mask = vec![0 as libc::c_ulong; words];
    mask[node / bits] |= 1 << (node % bits);
    let maxnode = (words * bits) as libc::c_ulong;
    let ret = unsafe {
        libc::syscall(
            libc::SYS_mbind,
            ptr,
            len as libc::c_ulong,
            libc::MPOL_PREFERRED,
            mask.as_ptr(),
            maxnode,
            0 as libc::c_ulong,
        )
    };
    ret == 0
}

/// Builds the topology for the given options and preferred node count.
///
/// Resolution order: `preferred` when non-zero, else `MINI_DB_NUMA_NODES`
/// (already captured in `options`), else the platform query, else 1.
#[must_use]
pub fn create_topology(options: &NumaOptions, preferred: usize) -> Box<dyn NumaTopology> {
    let requested = if preferred > 0 {
        preferred
    } else {
        options.env_nodes
    };

    #[cfg(target_os = "linux")]
    {
        if options.enabled && numa_available() {
            // An explicit count wins even over the platform layout.
            return Box::new(PlatformTopology::probe(requested));
        }
    }

    Box::new(FallbackTopology::new(requested.max(1)))
}

/// Builds the allocator for the given options.
#[must_use]
pub fn create_allocator(options: &NumaOptions) -> Arc<dyn NumaAllocator> {
    #[cfg(target_os = "linux")]
    {
        if numa_available() && (options.enabled || options.forced_alloc_node.is_some()) {
            return Arc::new(NodeBoundAllocator::new(options.forced_alloc_node));
        }
    }
    let _ = options;
    Arc::new(FallbackAllocator)
}

/// Pins the calling thread to the CPUs of one NUMA node.
///
/// Best effort: callers treat failure as advisory and keep running on
/// whatever CPU the scheduler picks.
pub fn bind_thread_to_node(node: usize) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/devices/system/node/node{node}/cpulist");
        let list = std::fs::read_to_string(path)?;
        let cpus = parse_cpu_list(&list);
        if cpus.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no CPUs listed for NUMA node {node}"),
            ));
        }
        // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set.
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe {
            libc::CPU_ZERO(&mut set);
            for cpu in cpus {
                if cpu < libc::CPU_SETSIZE as usize {
                    libc::CPU_SET(cpu, &mut set);
                }
            }
        }
        let ret =
            unsafe { libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) };
        if ret != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = node;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "NUMA thread binding is unavailable on this platform",
        ))
    }
}

/// Parses a sysfs cpulist such as `0-3,8,10-11` into CPU indices.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cpu_list(list: &str) -> Vec<usize> {
    let mut cpus = Vec::new();
    for part in list.trim().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                cpus.extend(start..=end);
            }
        } else if let Ok(cpu) = part.parse::<usize>() {
            cpus.push(cpu);
        }
    }
    cpus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cpu_list_handles_ranges_and_singles() {
        assert_eq!(parse_cpu_list("0-3"), vec![0, 1, 2, 3]);
        assert_eq!(parse_cpu_list("0,2,4"), vec![0, 2, 4]);
        assert_eq!(parse_cpu_list("0-1,8-9"), vec![0, 1, 8, 9]);
        assert_eq!(parse_cpu_list(" 5 \n"), vec![5]);
        assert!(parse_cpu_list("").is_empty());
    }

    #[test]
    fn fallback_topology_floors_at_one() {
        assert_eq!(FallbackTopology::new(0).node_count(), 1);
        assert_eq!(FallbackTopology::new(4).node_count(), 4);
    }

    #[test]
    fn fallback_current_node_in_range() {
        let topology = FallbackTopology::new(3);
        assert!(topology.current_node() < 3);
    }

    #[test]
    fn preferred_count_wins() {
        let options = NumaOptions {
            enabled: true,
            env_nodes: 8,
            forced_alloc_node: None,
        };
        let topology = create_topology(&options, 2);
        assert_eq!(topology.node_count(), 2);
    }

    #[test]
    fn env_count_used_when_preferred_is_zero() {
        let options = NumaOptions {
            enabled: false,
            env_nodes: 3,
            forced_alloc_node: None,
        };
        let topology = create_topology(&options, 0);
        assert_eq!(topology.node_count(), 3);
    }

    #[test]
    fn allocator_always_yields_usable_buffers() {
        let allocator = create_allocator(&NumaOptions::default());
        let buffer = allocator.allocate(4096, 0).unwrap();
        assert_eq!(buffer.len(), 4096);
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn platform_count_is_positive() {
        assert!(platform_node_count() >= 1);
    }
}

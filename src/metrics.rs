//! Metrics for [Prometheus][prometheus].
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, Gauge, MetricBuilder};

/// Metrics of an allocator.
///
/// `ArenaAllocator` instances use the `arena` subsystem,
/// and `StackAllocator` instances use the `stack` subsystem.
#[derive(Debug, Clone)]
pub struct AllocatorMetrics {
    pub(crate) capacity_bytes: Gauge,
    pub(crate) usage_bytes: Gauge,
    pub(crate) allocations: Counter,
    pub(crate) allocated_bytes: Counter,
    pub(crate) nospace_failures: Counter,
    pub(crate) deallocations: Counter,
    pub(crate) rollbacks: Counter,
    pub(crate) clears: Counter,
    pub(crate) reallocations: Counter,
    pub(crate) copies: Counter,
    pub(crate) contract_violations: Counter,
}
impl AllocatorMetrics {
    /// Size of the reserved buffer.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_capacity_bytes <GAUGE>
    /// ```
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes.value() as u64
    }

    /// Number of bytes currently consumed, including headers and alignment padding.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_usage_bytes <GAUGE>
    /// ```
    pub fn usage_bytes(&self) -> u64 {
        self.usage_bytes.value() as u64
    }

    /// Number of successful allocations.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_allocations_total <COUNTER>
    /// ```
    pub fn allocations(&self) -> u64 {
        self.allocations.value() as u64
    }

    /// Total number of bytes consumed by successful allocations.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_allocated_bytes_total <COUNTER>
    /// ```
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.value() as u64
    }

    /// Number of allocations which failed due to insufficient free space.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_nospace_failures_total <COUNTER>
    /// ```
    pub fn nospace_failures(&self) -> u64 {
        self.nospace_failures.value() as u64
    }

    /// Number of single block deallocations.
    ///
    /// Always zero for arenas.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_stack_deallocations_total <COUNTER>
    /// ```
    pub fn deallocations(&self) -> u64 {
        self.deallocations.value() as u64
    }

    /// Number of rollbacks to a mark.
    ///
    /// Always zero for arenas.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_stack_rollbacks_total <COUNTER>
    /// ```
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.value() as u64
    }

    /// Number of `clear` calls.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_clears_total <COUNTER>
    /// ```
    pub fn clears(&self) -> u64 {
        self.clears.value() as u64
    }

    /// Number of times the buffer was actually moved to a larger one.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_reallocations_total <COUNTER>
    /// ```
    pub fn reallocations(&self) -> u64 {
        self.reallocations.value() as u64
    }

    /// Number of successful `copy_to` calls made from this allocator.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_copies_total <COUNTER>
    /// ```
    pub fn copies(&self) -> u64 {
        self.copies.value() as u64
    }

    /// Number of contract violations detected.
    ///
    /// Under `ViolationPolicy::Strict` the violation is counted right before the panic.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// bufalloc_<arena|stack>_contract_violations_total <COUNTER>
    /// ```
    pub fn contract_violations(&self) -> u64 {
        self.contract_violations.value() as u64
    }

    pub(crate) fn new(builder: &MetricBuilder, subsystem: &str) -> Self {
        let mut builder = builder.clone();
        builder.namespace("bufalloc").subsystem(subsystem);
        AllocatorMetrics {
            capacity_bytes: builder
                .gauge("capacity_bytes")
                .help("Size of the reserved buffer")
                .finish()
                .expect("Never fails"),
            usage_bytes: builder
                .gauge("usage_bytes")
                .help("Number of bytes currently consumed")
                .finish()
                .expect("Never fails"),
            allocations: builder
                .counter("allocations_total")
                .help("Number of successful allocations")
                .finish()
                .expect("Never fails"),
            allocated_bytes: builder
                .counter("allocated_bytes_total")
                .help("Number of bytes consumed by allocations")
                .finish()
                .expect("Never fails"),
            nospace_failures: builder
                .counter("nospace_failures_total")
                .help("Number of allocation failures due to insufficient free space")
                .finish()
                .expect("Never fails"),
            deallocations: builder
                .counter("deallocations_total")
                .help("Number of single block deallocations")
                .finish()
                .expect("Never fails"),
            rollbacks: builder
                .counter("rollbacks_total")
                .help("Number of rollbacks to a mark")
                .finish()
                .expect("Never fails"),
            clears: builder
                .counter("clears_total")
                .help("Number of clear operations")
                .finish()
                .expect("Never fails"),
            reallocations: builder
                .counter("reallocations_total")
                .help("Number of buffer reallocations")
                .finish()
                .expect("Never fails"),
            copies: builder
                .counter("copies_total")
                .help("Number of copies into another allocator")
                .finish()
                .expect("Never fails"),
            contract_violations: builder
                .counter("contract_violations_total")
                .help("Number of detected contract violations")
                .finish()
                .expect("Never fails"),
        }
    }

    pub(crate) fn set_capacity(&self, size: usize) {
        self.capacity_bytes.set(size as f64);
    }

    pub(crate) fn set_usage(&self, allocated: usize) {
        self.usage_bytes.set(allocated as f64);
    }

    pub(crate) fn count_allocation(&self, footprint: usize, allocated: usize) {
        self.allocations.increment();
        self.allocated_bytes.add_u64(footprint as u64);
        self.set_usage(allocated);
    }
}

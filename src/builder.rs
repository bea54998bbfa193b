use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};

use crate::arena::ArenaAllocator;
use crate::buffer::{Alignment, ReservedBuffer};
use crate::metrics::AllocatorMetrics;
use crate::policy::{Contract, ViolationPolicy};
use crate::stack::StackAllocator;
use crate::Result;

/// Builder of `ArenaAllocator` and `StackAllocator`.
#[derive(Debug, Clone)]
pub struct AllocatorBuilder {
    alignment: Option<Alignment>,
    policy: ViolationPolicy,
    logger: Logger,
    metrics: MetricBuilder,
}
impl AllocatorBuilder {
    /// Makes a new `AllocatorBuilder` with the default settings.
    pub fn new() -> Self {
        AllocatorBuilder {
            alignment: None,
            policy: ViolationPolicy::default(),
            logger: Logger::root(Discard, o!()),
            metrics: MetricBuilder::new(),
        }
    }

    /// Sets the alignment of the buffer base.
    ///
    /// The meaning differs depending on who owns the buffer:
    ///
    /// - Owned (`arena`, `stack`):
    ///   - the acquired buffer starts on this boundary
    ///   - if this method is not called, no alignment is required
    /// - Borrowed (`arena_in`, `stack_in`):
    ///   - if the given buffer does not start on this boundary, its head is skipped
    ///     and the usable size shrinks by the skipped bytes
    ///   - if this method is not called, the given buffer is used as is
    pub fn alignment(&mut self, alignment: Alignment) -> &mut Self {
        self.alignment = Some(alignment);
        self
    }

    /// Sets how the built allocators react to contract violations.
    ///
    /// The default value is `ViolationPolicy::Lenient`.
    pub fn policy(&mut self, policy: ViolationPolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Sets the logger of the built allocators.
    ///
    /// The default value is `Logger::root(Discard, o!())`.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// Registers the common settings for metrics.
    ///
    /// The default value is `MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// Builds an `ArenaAllocator` owning a newly acquired buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// If `size` is `0`, or too large to be acquired (see `AlignedBytes::new`),
    /// an error will be returned (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn arena<'a>(&self, size: usize) -> Result<ArenaAllocator<'a>> {
        let instrumentation = self.instrumentation("arena");
        let buffer = track!(instrumentation.contract.enforce(ReservedBuffer::acquire(
            size,
            self.alignment.unwrap_or_default()
        )))?;
        Ok(ArenaAllocator::from_parts(buffer, instrumentation))
    }

    /// Builds an `ArenaAllocator` over the caller supplied `buf`.
    ///
    /// # Errors
    ///
    /// If `buf` has no usable byte after the alignment adjustment,
    /// an error which has the kind `ErrorKind::InvalidInput` will be returned
    /// (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn arena_in<'a>(&self, buf: &'a mut [u8]) -> Result<ArenaAllocator<'a>> {
        let instrumentation = self.instrumentation("arena");
        let buffer = track!(instrumentation
            .contract
            .enforce(ReservedBuffer::borrow(buf, self.alignment)))?;
        Ok(ArenaAllocator::from_parts(buffer, instrumentation))
    }

    /// Builds a `StackAllocator` owning a newly acquired buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// See `arena`.
    pub fn stack<'a>(&self, size: usize) -> Result<StackAllocator<'a>> {
        let instrumentation = self.instrumentation("stack");
        let buffer = track!(instrumentation.contract.enforce(ReservedBuffer::acquire(
            size,
            self.alignment.unwrap_or_default()
        )))?;
        Ok(StackAllocator::from_parts(buffer, instrumentation))
    }

    /// Builds a `StackAllocator` over the caller supplied `buf`.
    ///
    /// # Errors
    ///
    /// See `arena_in`.
    pub fn stack_in<'a>(&self, buf: &'a mut [u8]) -> Result<StackAllocator<'a>> {
        let instrumentation = self.instrumentation("stack");
        let buffer = track!(instrumentation
            .contract
            .enforce(ReservedBuffer::borrow(buf, self.alignment)))?;
        Ok(StackAllocator::from_parts(buffer, instrumentation))
    }

    fn instrumentation(&self, kind: &'static str) -> Instrumentation {
        let logger = self.logger.new(o!("allocator" => kind));
        let metrics = AllocatorMetrics::new(&self.metrics, kind);
        let contract = Contract::new(
            self.policy,
            logger.clone(),
            metrics.contract_violations.clone(),
        );
        Instrumentation {
            contract,
            logger,
            metrics,
        }
    }
}
impl Default for AllocatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The parts every allocator carries besides its buffer.
#[derive(Debug)]
pub(crate) struct Instrumentation {
    pub contract: Contract,
    pub logger: Logger,
    pub metrics: AllocatorMetrics,
}

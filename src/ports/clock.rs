use std::time::Instant;

/// Server-side time source; answer latency is always measured against it.
pub trait Clock {
    fn now(&self) -> Instant;
}

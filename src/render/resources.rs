//! GPU resource lifecycle tracking.
//!
//! There is no garbage collection of GPU memory: every buffer and texture the
//! viewer creates is registered here and must be explicitly released before
//! teardown completes. `TextureSlot` carries the replacement protocol for the
//! avatar surface texture, where a slow decode finishing after a newer one
//! must never be bound.

use std::collections::HashMap;

/// Handle for a tracked GPU-backed object.
pub type ResourceId = u64;

/// What kind of GPU object an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
}

/// Registry of live GPU-backed objects for one viewer instance.
///
/// Creation registers, destruction releases; whatever is still live at
/// teardown is a leak.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    next_id: ResourceId,
    live: HashMap<ResourceId, ResourceKind>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created GPU object.
    pub fn register(&mut self, kind: ResourceKind) -> ResourceId {
        self.next_id += 1;
        self.live.insert(self.next_id, kind);
        self.next_id
    }

    /// Record destruction of a GPU object. Returns false if the id was
    /// unknown (double release or foreign id).
    pub fn release(&mut self, id: ResourceId) -> bool {
        self.live.remove(&id).is_some()
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of live objects of one kind.
    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.live.values().filter(|&&k| k == kind).count()
    }

    /// True when nothing remains registered.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// Monotonic generation tag for texture load requests.
pub type Generation = u64;

/// Outcome of completing a texture load against the slot.
#[derive(Debug, PartialEq)]
pub enum SwapOutcome<T> {
    /// The load was the most recent request; the new texture is now bound
    /// and `retired` (if any) must be destroyed by the caller.
    Applied { retired: Option<T> },
    /// A newer request superseded this load while it was in flight. The
    /// rejected texture is handed back so the caller can destroy it; it must
    /// never be bound.
    Stale(T),
}

/// The single bound avatar surface texture, with last-write-wins replacement.
///
/// Each load request captures a generation at call time; a completion is
/// applied only if its captured generation is still current. The previously
/// bound texture is retired only after the replacement is applied, never
/// before, so the render loop can never sample a freed resource and a failed
/// decode leaves the visible state untouched.
#[derive(Debug, Default)]
pub struct TextureSlot<T> {
    current: Option<T>,
    generation: Generation,
}

impl<T> TextureSlot<T> {
    pub fn new() -> Self {
        Self {
            current: None,
            generation: 0,
        }
    }

    /// Start a new load request, superseding any still in flight.
    pub fn begin_load(&mut self) -> Generation {
        self.generation += 1;
        self.generation
    }

    /// Whether a request started with `generation` is still the newest.
    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    /// Complete a load. Binds the texture only if no newer request exists.
    pub fn complete(&mut self, generation: Generation, texture: T) -> SwapOutcome<T> {
        if !self.is_current(generation) {
            return SwapOutcome::Stale(texture);
        }
        let retired = self.current.replace(texture);
        SwapOutcome::Applied { retired }
    }

    /// Record a failed load. The bound texture is untouched; returns true if
    /// the failure belonged to the newest request.
    pub fn fail(&mut self, generation: Generation) -> bool {
        self.is_current(generation)
    }

    /// The currently bound texture, if any.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Drain the bound texture for disposal at teardown.
    pub fn take(&mut self) -> Option<T> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_register_release() {
        let mut reg = ResourceRegistry::new();
        let a = reg.register(ResourceKind::Buffer);
        let b = reg.register(ResourceKind::Texture);
        assert_eq!(reg.live_count(), 2);
        assert_eq!(reg.count_of(ResourceKind::Buffer), 1);

        assert!(reg.release(a));
        assert!(reg.release(b));
        assert!(reg.is_empty());

        // double release is flagged
        assert!(!reg.release(a));
    }

    #[test]
    fn test_slot_basic_replace_retires_previous() {
        let mut slot = TextureSlot::new();

        let g1 = slot.begin_load();
        assert_eq!(slot.complete(g1, "first"), SwapOutcome::Applied { retired: None });
        assert_eq!(slot.current(), Some(&"first"));

        let g2 = slot.begin_load();
        assert_eq!(
            slot.complete(g2, "second"),
            SwapOutcome::Applied {
                retired: Some("first")
            }
        );
        assert_eq!(slot.current(), Some(&"second"));
    }

    #[test]
    fn test_slot_last_write_wins_under_race() {
        let mut slot = TextureSlot::new();

        // Decode A starts before decode B...
        let gen_a = slot.begin_load();
        let gen_b = slot.begin_load();

        // ...but B completes first and is bound.
        assert_eq!(slot.complete(gen_b, "b"), SwapOutcome::Applied { retired: None });

        // A's late completion is stale: handed back for disposal, never bound.
        assert_eq!(slot.complete(gen_a, "a"), SwapOutcome::Stale("a"));
        assert_eq!(slot.current(), Some(&"b"));
    }

    #[test]
    fn test_slot_failure_preserves_bound_texture() {
        let mut slot = TextureSlot::new();
        let g1 = slot.begin_load();
        slot.complete(g1, "visible");

        let g2 = slot.begin_load();
        assert!(slot.fail(g2));
        // previous state fully intact
        assert_eq!(slot.current(), Some(&"visible"));

        // a failure from a superseded request is not even current
        let g3 = slot.begin_load();
        assert!(!slot.fail(g2));
        assert!(slot.is_current(g3));
    }

    #[test]
    fn test_slot_take_drains_for_disposal() {
        let mut slot = TextureSlot::new();
        let g = slot.begin_load();
        slot.complete(g, "tex");

        assert_eq!(slot.take(), Some("tex"));
        assert_eq!(slot.current(), None);
        assert_eq!(slot.take(), None);
    }
}

//! Rendered-list cache
//!
//! Slots are addressed by a numeric id derived from a coarse list code and a
//! small suffix:
//!
//! ```text
//! slot id = coarse code * suffix space + suffix
//! ```
//!
//! Two configurations sharing a coarse code but differing in filters or
//! options probe the suffixes linearly until they find their equal or a free
//! suffix. When every suffix under the code is taken, the oldest assignment
//! is reused and its rendered payload dropped.
//!
//! Rendering is lazy and memoized per assignment: a list view stays pinned to
//! what was rendered on first request until the cache is cleared.

use std::collections::HashMap;

/// Numeric identifier of a cache slot
pub type SlotId = u64;

/// Default number of suffixes probed under one coarse code
pub const DEFAULT_SUFFIX_SPACE: u32 = 100;

/// A configuration that can be stored in a [`RenderCache`]
///
/// Equality must be structural: two keys are equal only if they would render
/// the same list.
pub trait SlotKey: PartialEq + Clone {
    /// Coarse code grouping configurations of the same list type
    fn coarse_code(&self) -> u32;
}

#[derive(Debug)]
struct Slot<C, P> {
    config: C,
    rendered: Option<P>,
    assigned: u64,
}

/// Cache from list configuration to lazily rendered payload
///
/// # Examples
///
/// ```rust
/// use restbridge::cache::{RenderCache, SlotKey};
///
/// #[derive(Clone, PartialEq)]
/// struct Key(u32, &'static str);
///
/// impl SlotKey for Key {
///     fn coarse_code(&self) -> u32 {
///         self.0
///     }
/// }
///
/// let mut cache: RenderCache<Key, String> = RenderCache::new();
/// let a = cache.get_or_create_slot(&Key(2, "class 1"));
/// let b = cache.get_or_create_slot(&Key(2, "class 2"));
/// assert_ne!(a, b);
/// assert_eq!(cache.get_or_create_slot(&Key(2, "class 1")), a);
///
/// let rendered = cache
///     .get_rendered(a, |key| Ok::<_, ()>(key.1.to_uppercase()))
///     .unwrap()
///     .unwrap();
/// assert_eq!(rendered, "CLASS 1");
/// ```
#[derive(Debug)]
pub struct RenderCache<C, P> {
    slots: HashMap<SlotId, Slot<C, P>>,
    suffix_space: u32,
    assignments: u64,
    renders: u64,
}

impl<C: SlotKey, P> Default for RenderCache<C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SlotKey, P> RenderCache<C, P> {
    /// Create an empty cache with the default suffix space
    pub fn new() -> Self {
        Self::with_suffix_space(DEFAULT_SUFFIX_SPACE)
    }

    /// Create an empty cache probing `suffix_space` suffixes per coarse code
    ///
    /// # Panics
    ///
    /// Panics if `suffix_space` is 0
    pub fn with_suffix_space(suffix_space: u32) -> Self {
        assert!(suffix_space > 0, "Suffix space must be greater than 0");
        Self {
            slots: HashMap::new(),
            suffix_space,
            assignments: 0,
            renders: 0,
        }
    }

    /// Find the slot holding an equal configuration, or assign one
    pub fn get_or_create_slot(&mut self, config: &C) -> SlotId {
        let base = SlotId::from(config.coarse_code()) * SlotId::from(self.suffix_space);

        // Suffixes are handed out in order and only released by `clear`, so
        // the first gap ends the probe.
        let mut victim = (base, u64::MAX);
        let mut free = None;
        for suffix in 0..SlotId::from(self.suffix_space) {
            let id = base + suffix;
            match self.slots.get(&id) {
                Some(slot) if slot.config == *config => return id,
                Some(slot) => {
                    if slot.assigned < victim.1 {
                        victim = (id, slot.assigned);
                    }
                }
                None => {
                    free = Some(id);
                    break;
                }
            }
        }

        let id = free.unwrap_or(victim.0);
        self.assignments += 1;
        self.slots.insert(
            id,
            Slot {
                config: config.clone(),
                rendered: None,
                assigned: self.assignments,
            },
        );
        id
    }

    /// Configuration stored in a slot
    pub fn configuration(&self, id: SlotId) -> Option<&C> {
        self.slots.get(&id).map(|slot| &slot.config)
    }

    /// Rendered payload of a slot, rendering it on first access
    ///
    /// `render` runs at most once per slot assignment; a failed render is not
    /// memoized and will be retried on the next call. Returns `None` for an
    /// unknown slot.
    pub fn get_rendered<E, F>(&mut self, id: SlotId, render: F) -> Option<Result<&P, E>>
    where
        F: FnOnce(&C) -> Result<P, E>,
    {
        let slot = self.slots.get_mut(&id)?;
        if slot.rendered.is_none() {
            self.renders += 1;
            match render(&slot.config) {
                Ok(payload) => slot.rendered = Some(payload),
                Err(err) => return Some(Err(err)),
            }
        }
        slot.rendered.as_ref().map(Ok)
    }

    /// Whether the slot has a memoized payload
    pub fn is_rendered(&self, id: SlotId) -> bool {
        self.slots
            .get(&id)
            .map_or(false, |slot| slot.rendered.is_some())
    }

    /// Number of render calls made so far
    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Number of assigned slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is assigned
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop all slots and payloads
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

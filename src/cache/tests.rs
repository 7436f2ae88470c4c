//! Tests for the render and image caches

use super::*;

#[derive(Debug, Clone, PartialEq)]
struct ListKey {
    code: u32,
    classes: Vec<u32>,
    leg: Option<u32>,
}

impl ListKey {
    fn new(code: u32, classes: &[u32]) -> Self {
        Self {
            code,
            classes: classes.to_vec(),
            leg: None,
        }
    }
}

impl SlotKey for ListKey {
    fn coarse_code(&self) -> u32 {
        self.code
    }
}

#[test]
fn test_equal_configurations_share_slot_and_render_once() {
    let mut cache: RenderCache<ListKey, String> = RenderCache::new();
    let mut calls = 0;

    let first = cache.get_or_create_slot(&ListKey::new(2, &[1, 3]));
    let rendered = cache
        .get_rendered(first, |key| {
            calls += 1;
            Ok::<_, ()>(format!("{:?}", key.classes))
        })
        .unwrap()
        .unwrap()
        .clone();

    let second = cache.get_or_create_slot(&ListKey::new(2, &[1, 3]));
    assert_eq!(first, second);
    let again = cache
        .get_rendered(second, |_| {
            calls += 1;
            Ok::<_, ()>("rerendered".to_string())
        })
        .unwrap()
        .unwrap()
        .clone();

    assert_eq!(rendered, again);
    assert_eq!(calls, 1);
    assert_eq!(cache.renders(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_colliding_configurations_get_distinct_slots() {
    let mut cache: RenderCache<ListKey, String> = RenderCache::new();
    let a = cache.get_or_create_slot(&ListKey::new(7, &[1]));
    let b = cache.get_or_create_slot(&ListKey::new(7, &[2]));
    let mut with_leg = ListKey::new(7, &[1]);
    with_leg.leg = Some(2);
    let c = cache.get_or_create_slot(&with_leg);

    assert_eq!(a, 7 * SlotId::from(DEFAULT_SUFFIX_SPACE));
    assert_eq!(b, a + 1);
    assert_eq!(c, a + 2);
    assert_eq!(cache.configuration(b), Some(&ListKey::new(7, &[2])));
}

#[test]
fn test_different_codes_do_not_collide() {
    let mut cache: RenderCache<ListKey, String> = RenderCache::with_suffix_space(10);
    let a = cache.get_or_create_slot(&ListKey::new(1, &[1]));
    let b = cache.get_or_create_slot(&ListKey::new(2, &[1]));
    assert_eq!(a, 10);
    assert_eq!(b, 20);
}

#[test]
fn test_exhausted_suffix_space_reuses_oldest_slot() {
    let mut cache: RenderCache<ListKey, String> = RenderCache::with_suffix_space(2);
    let a = cache.get_or_create_slot(&ListKey::new(1, &[1]));
    let b = cache.get_or_create_slot(&ListKey::new(1, &[2]));
    cache
        .get_rendered(a, |_| Ok::<_, ()>("a".to_string()))
        .unwrap()
        .unwrap();
    assert!(cache.is_rendered(a));

    let c = cache.get_or_create_slot(&ListKey::new(1, &[3]));
    assert_eq!(c, a);
    assert!(!cache.is_rendered(c));
    assert_eq!(cache.configuration(c), Some(&ListKey::new(1, &[3])));
    assert_eq!(cache.configuration(b), Some(&ListKey::new(1, &[2])));

    // Next eviction takes the slot that is now oldest
    let d = cache.get_or_create_slot(&ListKey::new(1, &[4]));
    assert_eq!(d, b);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_failed_render_is_retried() {
    let mut cache: RenderCache<ListKey, String> = RenderCache::new();
    let slot = cache.get_or_create_slot(&ListKey::new(3, &[]));

    let failed = cache.get_rendered(slot, |_| Err::<String, _>("no event"));
    assert_eq!(failed, Some(Err("no event")));
    assert!(!cache.is_rendered(slot));

    let rendered = cache.get_rendered(slot, |_| Ok::<_, &str>("list".to_string()));
    assert_eq!(rendered, Some(Ok(&"list".to_string())));
    assert_eq!(cache.renders(), 2);
}

#[test]
fn test_unknown_slot() {
    let mut cache: RenderCache<ListKey, String> = RenderCache::new();
    assert!(cache
        .get_rendered(42, |_| Ok::<_, ()>(String::new()))
        .is_none());
    assert!(cache.configuration(42).is_none());
}

#[test]
fn test_clear_drops_slots() {
    let mut cache: RenderCache<ListKey, String> = RenderCache::new();
    cache.get_or_create_slot(&ListKey::new(1, &[1]));
    cache.get_or_create_slot(&ListKey::new(1, &[2]));
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.get_or_create_slot(&ListKey::new(1, &[2])), 100);
}

#[test]
fn test_image_cache_loads_once() {
    let mut cache = ImageCache::new();
    let first = cache
        .get_or_load("meos", |_| Ok::<_, ()>(vec![1, 2, 3]))
        .unwrap();
    let second = cache
        .get_or_load("meos", |_| Ok::<_, ()>(vec![9, 9, 9]))
        .unwrap();

    assert_eq!(&first[..], &[1, 2, 3]);
    assert_eq!(first, second);
    assert_eq!(cache.loads(), 1);
    assert!(cache.contains("meos"));
}

#[test]
fn test_image_cache_failed_load_not_cached() {
    let mut cache = ImageCache::new();
    assert!(cache.get_or_load("17", |_| Err::<Vec<u8>, _>("missing")).is_err());
    assert!(!cache.contains("17"));
    assert!(cache.get_or_load("17", |_| Ok::<_, &str>(vec![0])).is_ok());
    assert_eq!(cache.loads(), 2);
    cache.clear();
    assert!(cache.is_empty());
}

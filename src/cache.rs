//! A reference-counted interning cache with activity-based eviction.
//!
//! A [Cache] stores every structurally distinct value once and hands out [CacheRef]s to
//! it. Holders register their interest with [Cache::reg] and give it up with
//! [Cache::dereg]. Entries that nobody has registered are eligible for eviction once the
//! cache grows past its maximal size, in which case the least active ones go first.
//!
//! The activity of an entry follows the VSIDS heuristic: strengthening adds the current
//! increment, and decaying grows the increment, so that recent activity weighs more.

use std::hash::Hash;
use std::sync::{Arc, Mutex};

use ahash::{HashMap, HashMapExt, RandomState};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// A reference to a cache entry. References are stable under merges: when two entries
/// are merged, the references of both point to the surviving entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheRef(usize);

impl CacheRef {
    /// The reference that never points to an entry.
    pub const NO_REF: CacheRef = CacheRef(0);

    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Settings for a [Cache].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheSettings {
    /// The number of entries after which unused entries are evicted.
    pub max_size: usize,
    /// The fraction of `max_size` that is freed by a clean.
    pub reduction_amount: f64,
    /// The decay factor of the activities, in `(0, 1]`.
    pub decay: f64,
    /// The activity above which all activities are rescaled.
    pub activity_threshold: f64,
    /// The factor with which all activities are rescaled.
    pub activity_rescale_factor: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            max_size: 10000,
            reduction_amount: 0.2,
            decay: 0.98,
            activity_threshold: 1e100,
            activity_rescale_factor: 1e-100,
        }
    }
}

impl CacheSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("The maximal cache size must be positive".to_owned());
        }
        if !(0. ..=1.).contains(&self.reduction_amount) {
            return Err(format!(
                "The reduction amount {} is not in [0, 1]",
                self.reduction_amount
            ));
        }
        if !(self.decay > 0. && self.decay <= 1.) {
            return Err(format!("The decay {} is not in (0, 1]", self.decay));
        }
        if !(self.activity_rescale_factor > 0. && self.activity_rescale_factor < 1.) {
            return Err(format!(
                "The activity rescale factor {} is not in (0, 1)",
                self.activity_rescale_factor
            ));
        }
        Ok(())
    }

    /// The size that a clean reduces the cache to.
    pub fn target_size(&self) -> usize {
        self.max_size - (self.max_size as f64 * self.reduction_amount).floor() as usize
    }
}

struct CacheEntry<T> {
    value: Arc<T>,
    hash: u64,
    usage_count: usize,
    activity: f64,
    refs: SmallVec<[CacheRef; 1]>,
}

struct CacheData<T> {
    entries: Vec<Option<CacheEntry<T>>>,
    free_entries: Vec<usize>,
    lookup: HashMap<u64, SmallVec<[usize; 1]>>,
    refs: Vec<Option<usize>>,
    free_refs: Vec<CacheRef>,
    len: usize,
    unused_entries: usize,
    activity_increment: f64,
    settings: CacheSettings,
    hasher: RandomState,
}

impl<T: Hash + Eq + Clone> CacheData<T> {
    fn new(settings: CacheSettings) -> CacheData<T> {
        CacheData {
            entries: vec![],
            free_entries: vec![],
            lookup: HashMap::new(),
            refs: vec![None],
            free_refs: vec![],
            len: 0,
            unused_entries: 0,
            activity_increment: 1.,
            settings,
            hasher: RandomState::new(),
        }
    }

    fn entry_index(&self, r: CacheRef) -> usize {
        match self.refs.get(r.0) {
            Some(Some(e)) => *e,
            _ => panic!("Cache reference {} is not live", r.0),
        }
    }

    fn entry_mut(&mut self, r: CacheRef) -> &mut CacheEntry<T> {
        let e = self.entry_index(r);
        self.entries[e].as_mut().unwrap()
    }

    fn entry(&self, r: CacheRef) -> &CacheEntry<T> {
        let e = self.entry_index(r);
        self.entries[e].as_ref().unwrap()
    }

    fn find_impl(&self, hash: u64, value: &T, exclude: Option<usize>) -> Option<usize> {
        self.lookup.get(&hash).and_then(|ids| {
            ids.iter().cloned().find(|e| {
                Some(*e) != exclude && *self.entries[*e].as_ref().unwrap().value == *value
            })
        })
    }

    fn unlink_impl(&mut self, e: usize, hash: u64) {
        if let Some(ids) = self.lookup.get_mut(&hash) {
            ids.retain(|x| *x != e);
            if ids.is_empty() {
                self.lookup.remove(&hash);
            }
        }
    }

    fn new_ref_impl(&mut self, e: usize) -> CacheRef {
        match self.free_refs.pop() {
            Some(r) => {
                self.refs[r.0] = Some(e);
                r
            }
            None => {
                self.refs.push(Some(e));
                CacheRef(self.refs.len() - 1)
            }
        }
    }

    fn insert_impl(&mut self, value: T, hash: u64) -> CacheRef {
        let e = match self.free_entries.pop() {
            Some(e) => e,
            None => {
                self.entries.push(None);
                self.entries.len() - 1
            }
        };

        let r = self.new_ref_impl(e);
        let mut refs = SmallVec::new();
        refs.push(r);

        self.entries[e] = Some(CacheEntry {
            value: Arc::new(value),
            hash,
            usage_count: 0,
            activity: 0.,
            refs,
        });
        self.lookup.entry(hash).or_default().push(e);
        self.len += 1;
        self.unused_entries += 1;

        trace!("Inserted cache entry {} with reference {}", e, r.0);
        r
    }

    fn erase_impl(&mut self, e: usize) {
        let Some(entry) = self.entries[e].take() else {
            return;
        };
        assert_eq!(entry.usage_count, 0, "Cannot erase a cache entry that is in use");

        self.unlink_impl(e, entry.hash);
        for r in entry.refs {
            self.refs[r.0] = None;
            self.free_refs.push(r);
        }
        self.free_entries.push(e);
        self.len -= 1;
        self.unused_entries -= 1;
    }

    /// Recompute the hash of the entry of `r`. If the entry is now equal to another
    /// entry, the two are merged into the other one.
    fn rehash_impl(&mut self, r: CacheRef) {
        let e = self.entry_index(r);
        let (old_hash, new_hash) = {
            let entry = self.entries[e].as_ref().unwrap();
            (entry.hash, self.hasher.hash_one(&*entry.value))
        };

        self.unlink_impl(e, old_hash);

        let value = self.entries[e].as_ref().unwrap().value.clone();
        match self.find_impl(new_hash, &value, Some(e)) {
            Some(survivor) => {
                let Some(moved) = self.entries[e].take() else {
                    unreachable!()
                };

                if moved.usage_count == 0 {
                    self.unused_entries -= 1;
                }

                let target = self.entries[survivor].as_mut().unwrap();
                if target.usage_count == 0 && moved.usage_count > 0 {
                    self.unused_entries -= 1;
                }
                target.usage_count += moved.usage_count;
                target.activity = target.activity.max(moved.activity);
                target.refs.extend(moved.refs.iter().cloned());

                for x in &moved.refs {
                    self.refs[x.0] = Some(survivor);
                }

                self.free_entries.push(e);
                self.len -= 1;

                trace!("Merged cache entry {} into {}", e, survivor);
            }
            None => {
                self.entries[e].as_mut().unwrap().hash = new_hash;
                self.lookup.entry(new_hash).or_default().push(e);
            }
        }
    }

    fn rescale_impl(&mut self) {
        let factor = self.settings.activity_rescale_factor;
        for entry in self.entries.iter_mut().flatten() {
            entry.activity *= factor;
        }
        self.activity_increment *= factor;

        debug!("Rescaled cache activities by {}", factor);
    }

    /// Remove unused entries, least active first, until at most `target` entries remain.
    fn clean_impl(&mut self, target: usize) -> usize {
        if self.len <= target || self.unused_entries == 0 {
            return 0;
        }

        let mut candidates: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                Some(e) if e.usage_count == 0 => Some((i, e.activity)),
                _ => None,
            })
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        let before = self.len;
        for (e, _) in candidates {
            if self.len <= target {
                break;
            }
            self.erase_impl(e);
        }

        debug!(
            "Cleaned cache: removed {} entries, size {} -> {}",
            before - self.len,
            before,
            self.len
        );
        before - self.len
    }
}

/// A thread-safe interning cache. See the [module documentation](self).
pub struct Cache<T> {
    data: Mutex<CacheData<T>>,
}

impl<T: Hash + Eq + Clone> Default for Cache<T> {
    fn default() -> Self {
        Cache::new(CacheSettings::default())
    }
}

impl<T: Hash + Eq + Clone> Cache<T> {
    /// Create a new cache. Panics when the settings are invalid.
    pub fn new(settings: CacheSettings) -> Cache<T> {
        if let Err(e) = settings.validate() {
            panic!("Invalid cache settings: {}", e);
        }

        Cache {
            data: Mutex::new(CacheData::new(settings)),
        }
    }

    /// Cache `value`. If an equal value is already present, a reference to it is returned,
    /// along with `false`. Otherwise the value is inserted and the returned flag is `true`.
    pub fn cache(&self, value: T) -> (CacheRef, bool) {
        self.cache_with(value, |_, _| false, |_, _| {})
    }

    /// Cache `value`. If an equal value is already present and `can_update(existing, value)`
    /// holds, the existing value is refined with `update` and rehashed.
    pub fn cache_with<C: FnOnce(&T, &T) -> bool, U: FnOnce(&mut T, &T)>(
        &self,
        value: T,
        can_update: C,
        update: U,
    ) -> (CacheRef, bool) {
        let mut data = self.data.lock().unwrap();

        let hash = data.hasher.hash_one(&value);
        if let Some(e) = data.find_impl(hash, &value, None) {
            let entry = data.entries[e].as_mut().unwrap();
            let r = entry.refs[0];

            if can_update(&*entry.value, &value) {
                update(Arc::make_mut(&mut entry.value), &value);
                data.rehash_impl(r);
            }

            return (r, false);
        }

        if data.len >= data.settings.max_size {
            let target = data.settings.target_size().min(data.settings.max_size - 1);
            data.clean_impl(target);
        }

        (data.insert_impl(value, hash), true)
    }

    /// Register a usage of the entry of `r`.
    pub fn reg(&self, r: CacheRef) {
        let mut data = self.data.lock().unwrap();
        let usage_count = {
            let entry = data.entry_mut(r);
            entry.usage_count += 1;
            entry.usage_count
        };
        if usage_count == 1 {
            data.unused_entries -= 1;
        }
    }

    /// Deregister a usage of the entry of `r`. An entry without usages can be evicted.
    pub fn dereg(&self, r: CacheRef) {
        let mut data = self.data.lock().unwrap();
        let usage_count = {
            let entry = data.entry_mut(r);
            if entry.usage_count == 0 {
                panic!("Deregistered cache reference {} that is not in use", r.0);
            }
            entry.usage_count -= 1;
            entry.usage_count
        };
        if usage_count == 0 {
            data.unused_entries += 1;
        }
    }

    /// Get the value of the entry of `r`.
    pub fn get(&self, r: CacheRef) -> Arc<T> {
        self.data.lock().unwrap().entry(r).value.clone()
    }

    /// Increase the activity of the entry of `r`.
    pub fn strengthen_activity(&self, r: CacheRef) {
        let mut data = self.data.lock().unwrap();
        let increment = data.activity_increment;
        let activity = {
            let entry = data.entry_mut(r);
            entry.activity += increment;
            entry.activity
        };

        if activity > data.settings.activity_threshold {
            data.rescale_impl();
        }
    }

    /// Let all activities decay, by increasing the activity increment.
    pub fn decay_activity(&self) {
        let mut data = self.data.lock().unwrap();
        data.activity_increment /= data.settings.decay;

        if data.activity_increment > data.settings.activity_threshold {
            data.rescale_impl();
        }
    }

    /// If the cache holds more than `max_size` entries, remove unused entries, least
    /// active first, until the cache is reduced to its target size. Returns the number
    /// of removed entries.
    pub fn clean(&self) -> usize {
        let mut data = self.data.lock().unwrap();
        if data.len <= data.settings.max_size {
            return 0;
        }

        let target = data.settings.target_size();
        data.clean_impl(target)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of entries without usages.
    pub fn num_unused(&self) -> usize {
        self.data.lock().unwrap().unused_entries
    }

    pub fn usage_count(&self, r: CacheRef) -> usize {
        self.data.lock().unwrap().entry(r).usage_count
    }

    pub fn activity(&self, r: CacheRef) -> f64 {
        self.data.lock().unwrap().entry(r).activity
    }

    /// Returns `true` iff `r` points to an entry.
    pub fn contains(&self, r: CacheRef) -> bool {
        matches!(self.data.lock().unwrap().refs.get(r.0), Some(Some(_)))
    }

    pub fn settings(&self) -> CacheSettings {
        self.data.lock().unwrap().settings
    }
}

#[cfg(test)]
mod test {
    use std::hash::{Hash, Hasher};

    use super::{Cache, CacheRef, CacheSettings};

    #[derive(Clone, Debug)]
    struct Item {
        key: i32,
        info: u32,
    }

    impl PartialEq for Item {
        fn eq(&self, other: &Self) -> bool {
            self.key == other.key
        }
    }

    impl Eq for Item {}

    impl Hash for Item {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.key.hash(state);
        }
    }

    fn small(max_size: usize) -> CacheSettings {
        CacheSettings {
            max_size,
            ..CacheSettings::default()
        }
    }

    #[test]
    fn deduplicate() {
        let cache = Cache::default();
        let (a, inserted) = cache.cache(vec![1, 2, 3]);
        assert!(inserted);
        let (b, inserted) = cache.cache(vec![1, 2, 3]);
        assert!(!inserted);
        assert_eq!(a, b);
        assert_ne!(a, CacheRef::NO_REF);
        assert_eq!(*cache.get(a), vec![1, 2, 3]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.num_unused(), 1);
    }

    #[test]
    fn update_in_place() {
        let cache = Cache::default();
        let (a, _) = cache.cache(Item { key: 1, info: 0 });
        let (b, inserted) = cache.cache_with(
            Item { key: 1, info: 7 },
            |old, new| new.info > old.info,
            |old, new| old.info = new.info,
        );
        assert!(!inserted);
        assert_eq!(a, b);
        assert_eq!(cache.get(a).info, 7);
    }

    #[test]
    fn update_merges_with_equal_entry() {
        let cache = Cache::default();
        let (a, _) = cache.cache(Item { key: 1, info: 0 });
        let (b, _) = cache.cache(Item { key: 2, info: 3 });
        cache.reg(a);
        cache.reg(b);
        cache.strengthen_activity(a);

        let (c, inserted) = cache.cache_with(
            Item { key: 1, info: 0 },
            |_, _| true,
            |old, _| old.key = 2,
        );
        assert!(!inserted);
        assert_eq!(c, a);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(a).key, 2);
        assert_eq!(cache.get(a).info, 3);
        assert_eq!(cache.usage_count(a), 2);
        assert_eq!(cache.usage_count(b), 2);
        assert_eq!(cache.activity(b), 1.);

        cache.dereg(a);
        cache.dereg(b);
        assert_eq!(cache.num_unused(), 1);
    }

    #[test]
    fn clean_keeps_registered() {
        let cache = Cache::new(small(2));
        let (a, _) = cache.cache(1);
        cache.reg(a);
        cache.cache(2);
        cache.cache(3);
        let (d, _) = cache.cache(4);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.num_unused(), 1);
        assert!(cache.contains(a));
        assert_eq!(*cache.get(a), 1);
        assert_eq!(*cache.get(d), 4);

        // 2 and 3 were evicted
        let (_, inserted) = cache.cache(2);
        assert!(inserted);
    }

    #[test]
    fn clean_by_activity() {
        let cache = Cache::new(CacheSettings {
            max_size: 10,
            reduction_amount: 0.5,
            ..CacheSettings::default()
        });

        // registered entries let the cache grow past its maximal size
        let refs: Vec<_> = (0..12)
            .map(|i| {
                let (r, _) = cache.cache(i);
                cache.reg(r);
                r
            })
            .collect();
        assert_eq!(cache.len(), 12);
        assert_eq!(cache.clean(), 0);

        for (i, r) in refs.iter().enumerate() {
            for _ in 0..i {
                cache.strengthen_activity(*r);
            }
            cache.dereg(*r);
        }

        assert_eq!(cache.clean(), 7);
        for (i, r) in refs.iter().enumerate() {
            assert_eq!(cache.contains(*r), i >= 7);
        }

        // freed references are recycled
        let (n, inserted) = cache.cache(100);
        assert!(inserted);
        assert!(refs[..7].contains(&n));
    }

    #[test]
    fn clean_within_max_size_keeps_everything() {
        let cache = Cache::new(small(10));
        let refs: Vec<_> = (0..9).map(|i| cache.cache(i).0).collect();

        assert_eq!(cache.clean(), 0);
        assert_eq!(cache.len(), 9);
        cache.cache(9);
        assert_eq!(cache.clean(), 0);
        assert_eq!(cache.len(), 10);
        assert!(refs.iter().all(|r| cache.contains(*r)));
    }

    #[test]
    fn rescale() {
        let cache = Cache::new(CacheSettings {
            decay: 0.5,
            activity_threshold: 1e3,
            activity_rescale_factor: 1e-3,
            ..CacheSettings::default()
        });
        let (a, _) = cache.cache("x");

        cache.strengthen_activity(a);
        for _ in 0..9 {
            cache.decay_activity();
        }
        assert_eq!(cache.activity(a), 1.);

        // the increment is now 512, the next decay exceeds the threshold
        cache.decay_activity();
        assert!((cache.activity(a) - 1e-3).abs() < 1e-12);

        cache.strengthen_activity(a);
        assert!((cache.activity(a) - 1.025).abs() < 1e-9);
    }

    #[test]
    #[should_panic]
    fn dereg_unused() {
        let cache = Cache::default();
        let (a, _) = cache.cache(1u8);
        cache.dereg(a);
    }

    #[test]
    fn invalid_settings() {
        assert!(small(0).validate().is_err());
        assert!(CacheSettings {
            decay: 1.5,
            ..CacheSettings::default()
        }
        .validate()
        .is_err());
        assert_eq!(CacheSettings::default().target_size(), 8000);
    }

    #[test]
    fn concurrent() {
        let cache = Cache::default();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for i in 0..100 {
                        let (r, _) = cache.cache(i % 10);
                        cache.reg(r);
                    }
                });
            }
        });

        assert_eq!(cache.len(), 10);
        for i in 0..10 {
            let (r, inserted) = cache.cache(i);
            assert!(!inserted);
            assert_eq!(cache.usage_count(r), 40);
        }
    }
}

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::cell::Cell;
use core::fmt::Debug;
use core::mem;

use crate::primes;

/// Hash value consumed and produced by table policies.
///
/// Policies may return weak hashes; the table compensates with its probing
/// scheme and resize policy rather than requiring high-quality hashing.
pub type Hashval = u32;

/// Slot arrays larger than this many bytes are dropped and reallocated small
/// by [`HashTable::clear`] instead of being rewritten in place.
const CLEAR_REALLOC_BYTES: usize = 1024 * 1024;

/// Byte budget for the replacement slot array after a reallocating clear.
const CLEAR_REPLACEMENT_BYTES: usize = 1024;

/// The behavior contract a [`HashTable`] instantiation must supply.
///
/// A policy describes how to hash stored elements, how to compare a stored
/// element against a lookup key, and how to release an element's resources
/// when it leaves the table. Policies are stateless: the table re-derives
/// hashes itself while resizing, so `hash` must be a pure function of the
/// element's comparison-relevant content for the element's whole lifetime in
/// the table.
///
/// The lookup key type [`Compare`] may differ from the stored element type,
/// so a table of records can be probed by id without materializing a record.
/// When the two types differ, callers generally precompute hashes and use the
/// `*_with_hash` operations.
///
/// # Examples
///
/// ```rust
/// use prime_hash::hash_table::Hashval;
/// use prime_hash::hash_table::Policy;
///
/// struct ById;
///
/// impl Policy for ById {
///     type Value = (u32, &'static str);
///     type Compare = u32;
///
///     fn hash(record: &(u32, &'static str)) -> Hashval {
///         record.0.wrapping_mul(0x9E37_79B9)
///     }
///
///     fn equal(record: &(u32, &'static str), id: &u32) -> bool {
///         record.0 == *id
///     }
/// }
/// ```
///
/// [`Compare`]: Policy::Compare
pub trait Policy {
    /// The element type stored and owned by the table.
    type Value;

    /// The lookup key type; usually `Value` itself, but may be narrower.
    type Compare: ?Sized;

    /// Numerator of the occupancy fraction (tombstones included) at which an
    /// insert expands the table first.
    const MAX_LOAD_NUM: usize = 3;

    /// Denominator of the insert-time occupancy fraction.
    const MAX_LOAD_DEN: usize = 4;

    /// A resize grows to twice the live count once live entries exceed
    /// capacity divided by this.
    const GROW_DIVISOR: usize = 2;

    /// A resize (or a resize-aware traversal) compacts once live entries fall
    /// below capacity divided by this.
    const SHRINK_DIVISOR: usize = 8;

    /// Tables at or below this capacity are never compacted automatically.
    const SHRINK_FLOOR: usize = 32;

    /// Hashes an element's comparison-relevant content.
    fn hash(value: &Self::Value) -> Hashval;

    /// Whether a stored element matches a lookup key.
    fn equal(value: &Self::Value, candidate: &Self::Compare) -> bool;

    /// Releases an element leaving the table.
    ///
    /// Invoked exactly once per element, whether it leaves through
    /// [`HashTable::remove`], [`OccupiedEntry::clear`], [`HashTable::clear`],
    /// or the table being dropped; never invoked on an element still in the
    /// table. The default takes ownership and drops, which releases anything
    /// the element owns.
    fn remove(value: Self::Value) {
        drop(value);
    }
}

/// One cell of the backing array.
///
/// `Empty` terminates probe sequences; `Tombstone` must not, since a live
/// element may have probed past it before the vacating removal happened.
enum Slot<V> {
    Empty,
    Tombstone,
    Occupied(V),
}

fn alloc_slots<V>(size: usize) -> Box<[Slot<V>]> {
    // Allocation failure here is fatal through the global alloc-error hook;
    // there is no recoverable out-of-memory path at this layer.
    let mut slots = Vec::with_capacity(size);
    slots.resize_with(size, || Slot::Empty);
    slots.into_boxed_slice()
}

/// Outcome of a staging probe: either the matching occupied slot, or the slot
/// a new element should be deposited into.
enum Probe {
    Hit(usize),
    Miss(usize),
}

/// An open-addressing hash table over prime-sized slot arrays.
///
/// `HashTable<P>` stores owned elements of type `P::Value` and resolves
/// collisions by double hashing: the primary index and the probe stride are
/// both reduced from the element's hash, division-free, modulo a prime
/// capacity. Because the capacity is prime and the stride is nonzero and
/// smaller, the two are always coprime and a probe walk visits every slot
/// before repeating.
///
/// Removal leaves tombstones so unrelated probe chains stay intact; inserts
/// reuse the first tombstone they walk past, and resizes purge tombstones
/// wholesale. Occupancy above 3/4 of capacity (tombstones included) triggers
/// a resize on insert.
///
/// The table is single-threaded by contract: no internal locking is provided,
/// and any cross-thread sharing requires external mutual exclusion around the
/// whole table.
///
/// # Examples
///
/// ```rust
/// use prime_hash::hash_table::HashTable;
/// use prime_hash::hash_table::Hashval;
/// use prime_hash::hash_table::Policy;
///
/// struct ById;
///
/// impl Policy for ById {
///     type Value = (u32, &'static str);
///     type Compare = u32;
///
///     fn hash(record: &(u32, &'static str)) -> Hashval {
///         record.0.wrapping_mul(0x9E37_79B9)
///     }
///
///     fn equal(record: &(u32, &'static str), id: &u32) -> bool {
///         record.0 == *id
///     }
/// }
///
/// let mut table: HashTable<ById> = HashTable::new();
///
/// let record = (7, "seven");
/// let hash = ById::hash(&record);
/// table.entry_with_hash(&7, hash).or_insert(record);
///
/// assert_eq!(table.find_with_hash(&7, hash), Some(&(7, "seven")));
/// assert_eq!(table.len(), 1);
/// ```
pub struct HashTable<P: Policy> {
    slots: Box<[Slot<P::Value>]>,

    /// Position of the current capacity within the fixed prime table; gives
    /// O(1) access to that prime's reduction constants.
    size_prime_index: usize,

    /// Occupied slots including tombstones.
    n_entries: usize,

    /// Tombstoned slots.
    n_tombstones: usize,

    searches: Cell<u64>,
    collisions: Cell<u64>,
}

impl<P: Policy> HashTable<P> {
    /// Creates an empty table at the smallest prime capacity.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty table sized for at least `capacity` elements.
    ///
    /// The hint is rounded up to the next prime from the fixed capacity
    /// table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use prime_hash::hash_table::{HashTable, Hashval, Policy};
    /// # struct ById;
    /// # impl Policy for ById {
    /// #     type Value = u32;
    /// #     type Compare = u32;
    /// #     fn hash(value: &u32) -> Hashval { *value }
    /// #     fn equal(value: &u32, candidate: &u32) -> bool { value == candidate }
    /// # }
    /// let table: HashTable<ById> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        let size_prime_index = primes::higher_prime_index(capacity);
        Self {
            slots: alloc_slots(primes::prime_at(size_prime_index)),
            size_prime_index,
            n_entries: 0,
            n_tombstones: 0,
            searches: Cell::new(0),
            collisions: Cell::new(0),
        }
    }

    /// Current slot-array size; always one of the fixed table primes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_entries - self.n_tombstones
    }

    /// Number of non-empty slots, tombstones included.
    ///
    /// This is the count the insert-time load factor is computed from.
    #[inline]
    pub fn len_with_tombstones(&self) -> usize {
        self.n_entries
    }

    /// Whether the table holds no live elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Probe collisions observed per lookup, as a ratio.
    ///
    /// A diagnostic for hash quality and load tuning; `0.0` before any
    /// lookup has happened.
    pub fn collisions(&self) -> f64 {
        let searches = self.searches.get();
        if searches == 0 {
            0.0
        } else {
            self.collisions.get() as f64 / searches as f64
        }
    }

    /// Looks up the element matching `key` under a precomputed `hash`.
    ///
    /// Cannot insert or delete; use [`entry_with_hash`] or
    /// [`remove_with_hash`] for those.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use prime_hash::hash_table::{HashTable, Hashval, Policy};
    /// # struct Words;
    /// # impl Policy for Words {
    /// #     type Value = String;
    /// #     type Compare = str;
    /// #     fn hash(word: &String) -> Hashval {
    /// #         word.bytes().fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
    /// #     }
    /// #     fn equal(word: &String, candidate: &str) -> bool { word == candidate }
    /// # }
    /// let mut table: HashTable<Words> = HashTable::new();
    /// let hash = Words::hash(&"apple".to_string());
    ///
    /// table.entry_with_hash("apple", hash).or_insert("apple".to_string());
    ///
    /// // Probing by the narrow key type, no String required.
    /// assert_eq!(table.find_with_hash("apple", hash).map(String::as_str), Some("apple"));
    /// assert!(table.find_with_hash("pear", 0).is_none());
    /// ```
    ///
    /// [`entry_with_hash`]: HashTable::entry_with_hash
    /// [`remove_with_hash`]: HashTable::remove_with_hash
    pub fn find_with_hash(&self, key: &P::Compare, hash: Hashval) -> Option<&P::Value> {
        self.searches.set(self.searches.get() + 1);
        let size = self.slots.len();
        let mut index = primes::mod1(hash, self.size_prime_index) as usize;

        match &self.slots[index] {
            Slot::Empty => return None,
            Slot::Occupied(value) if P::equal(value, key) => return Some(value),
            _ => {}
        }

        let stride = primes::mod2(hash, self.size_prime_index) as usize;
        loop {
            // Stride and capacity are coprime, so this walk visits every
            // slot; occupancy is capped below capacity, so an empty slot
            // terminates every miss.
            self.collisions.set(self.collisions.get() + 1);
            index += stride;
            if index >= size {
                index -= size;
            }

            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Occupied(value) if P::equal(value, key) => return Some(value),
                _ => {}
            }
        }
    }

    /// Looks up `value`, deriving its hash through the policy.
    pub fn find(&self, value: &P::Value) -> Option<&P::Value>
    where
        P::Value: Borrow<P::Compare>,
    {
        self.find_with_hash(value.borrow(), P::hash(value))
    }

    /// Stages an insert for `key` under a precomputed `hash`.
    ///
    /// If occupancy (tombstones included) has reached the policy's load
    /// limit, the table expands before probing; any slot position obtained
    /// earlier is invalid after that. A hit yields [`Entry::Occupied`]; a
    /// miss yields [`Entry::Vacant`] targeting the first tombstone
    /// encountered on the probe path, if any, so chains bloated by heavy
    /// churn get reused rather than extended.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use prime_hash::hash_table::{Entry, HashTable, Hashval, Policy};
    /// # struct ById;
    /// # impl Policy for ById {
    /// #     type Value = (u32, &'static str);
    /// #     type Compare = u32;
    /// #     fn hash(record: &(u32, &'static str)) -> Hashval {
    /// #         record.0.wrapping_mul(0x9E37_79B9)
    /// #     }
    /// #     fn equal(record: &(u32, &'static str), id: &u32) -> bool { record.0 == *id }
    /// # }
    /// let mut table: HashTable<ById> = HashTable::new();
    /// let hash = ById::hash(&(3, ""));
    ///
    /// match table.entry_with_hash(&3, hash) {
    ///     Entry::Vacant(slot) => {
    ///         slot.insert((3, "three"));
    ///     }
    ///     Entry::Occupied(_) => unreachable!("table is empty"),
    /// }
    ///
    /// match table.entry_with_hash(&3, hash) {
    ///     Entry::Occupied(found) => assert_eq!(found.get().1, "three"),
    ///     Entry::Vacant(_) => unreachable!("just inserted"),
    /// }
    /// ```
    pub fn entry_with_hash(&mut self, key: &P::Compare, hash: Hashval) -> Entry<'_, P> {
        if self.slots.len() * P::MAX_LOAD_NUM <= self.n_entries * P::MAX_LOAD_DEN {
            self.expand();
        }

        match self.find_slot_index(key, hash) {
            Probe::Hit(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            Probe::Miss(index) => Entry::Vacant(VacantEntry { table: self, index }),
        }
    }

    /// Stages an insert for `value`, deriving its hash through the policy.
    pub fn entry(&mut self, value: &P::Value) -> Entry<'_, P>
    where
        P::Value: Borrow<P::Compare>,
    {
        let hash = P::hash(value);
        self.entry_with_hash(value.borrow(), hash)
    }

    /// Removes the element matching `key` under a precomputed `hash`.
    ///
    /// The policy's `remove` runs on the element and its slot becomes a
    /// tombstone. Absence is not an error: the call is a no-op returning
    /// `false`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use prime_hash::hash_table::{HashTable, Hashval, Policy};
    /// # struct ById;
    /// # impl Policy for ById {
    /// #     type Value = (u32, &'static str);
    /// #     type Compare = u32;
    /// #     fn hash(record: &(u32, &'static str)) -> Hashval {
    /// #         record.0.wrapping_mul(0x9E37_79B9)
    /// #     }
    /// #     fn equal(record: &(u32, &'static str), id: &u32) -> bool { record.0 == *id }
    /// # }
    /// let mut table: HashTable<ById> = HashTable::new();
    /// let hash = ById::hash(&(3, ""));
    /// table.entry_with_hash(&3, hash).or_insert((3, "three"));
    ///
    /// assert!(table.remove_with_hash(&3, hash));
    /// assert!(!table.remove_with_hash(&3, hash));
    /// assert!(table.find_with_hash(&3, hash).is_none());
    /// ```
    pub fn remove_with_hash(&mut self, key: &P::Compare, hash: Hashval) -> bool {
        match self.find_slot_index(key, hash) {
            Probe::Hit(index) => {
                match mem::replace(&mut self.slots[index], Slot::Tombstone) {
                    Slot::Occupied(value) => P::remove(value),
                    _ => unreachable!("probe hit a slot that is not occupied"),
                }
                self.n_tombstones += 1;
                true
            }
            Probe::Miss(_) => false,
        }
    }

    /// Removes `value`, deriving its hash through the policy.
    pub fn remove(&mut self, value: &P::Value) -> bool
    where
        P::Value: Borrow<P::Compare>,
    {
        self.remove_with_hash(value.borrow(), P::hash(value))
    }

    /// Releases every element and resets the table.
    ///
    /// Every live element goes through the policy's `remove`. A small slot
    /// array is rewritten in place; a large one is dropped and replaced by a
    /// small fresh allocation instead of being rewritten, so clearing a big
    /// scratch table costs the release scan and nothing more. Both element
    /// and tombstone counts are zero afterward.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use prime_hash::hash_table::{HashTable, Hashval, Policy};
    /// # struct ById;
    /// # impl Policy for ById {
    /// #     type Value = u32;
    /// #     type Compare = u32;
    /// #     fn hash(value: &u32) -> Hashval { *value }
    /// #     fn equal(value: &u32, candidate: &u32) -> bool { value == candidate }
    /// # }
    /// let mut table: HashTable<ById> = HashTable::new();
    /// for id in 0..4 {
    ///     table.entry_with_hash(&id, id).or_insert(id);
    /// }
    ///
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert_eq!(table.len_with_tombstones(), 0);
    /// ```
    pub fn clear(&mut self) {
        let slot_bytes = mem::size_of::<Slot<P::Value>>().max(1);
        if self.slots.len() * slot_bytes > CLEAR_REALLOC_BYTES {
            let size_prime_index = primes::higher_prime_index(CLEAR_REPLACEMENT_BYTES / slot_bytes);
            let old_slots = mem::replace(
                &mut self.slots,
                alloc_slots(primes::prime_at(size_prime_index)),
            );
            self.size_prime_index = size_prime_index;
            for slot in old_slots.into_vec() {
                if let Slot::Occupied(value) = slot {
                    P::remove(value);
                }
            }
        } else {
            for slot in self.slots.iter_mut() {
                if let Slot::Occupied(value) = mem::replace(slot, Slot::Empty) {
                    P::remove(value);
                }
            }
        }

        self.n_entries = 0;
        self.n_tombstones = 0;
    }

    /// Returns an iterator over the live elements, in arbitrary order.
    ///
    /// The iterator is forward-only and single-pass; empty and tombstoned
    /// slots are never surfaced. Holding it borrows the table, so any
    /// operation that could reallocate the slot array is a compile-time
    /// conflict for as long as the iterator lives.
    pub fn iter(&self) -> Iter<'_, P> {
        Iter {
            slots: self.slots.iter(),
        }
    }

    /// Runs `callback` on every live element until it returns `false`.
    ///
    /// The scan never resizes; pair with [`traverse`] when repeated scans
    /// over a churned table should pay for compaction once instead of
    /// walking tombstones forever.
    ///
    /// [`traverse`]: HashTable::traverse
    pub fn traverse_noresize<F>(&self, mut callback: F)
    where
        F: FnMut(&P::Value) -> bool,
    {
        for slot in self.slots.iter() {
            if let Slot::Occupied(value) = slot {
                if !callback(value) {
                    break;
                }
            }
        }
    }

    /// Like [`traverse_noresize`], but first compacts the table when live
    /// elements occupy less than the shrink fraction of a capacity above the
    /// shrink floor.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use prime_hash::hash_table::{HashTable, Hashval, Policy};
    /// # struct ById;
    /// # impl Policy for ById {
    /// #     type Value = u32;
    /// #     type Compare = u32;
    /// #     fn hash(value: &u32) -> Hashval { *value }
    /// #     fn equal(value: &u32, candidate: &u32) -> bool { value == candidate }
    /// # }
    /// let mut table: HashTable<ById> = HashTable::new();
    /// for id in 0..3 {
    ///     table.entry_with_hash(&id, id).or_insert(id);
    /// }
    ///
    /// let mut total = 0;
    /// table.traverse(|id| {
    ///     total += id;
    ///     true
    /// });
    /// assert_eq!(total, 0 + 1 + 2);
    /// ```
    ///
    /// [`traverse_noresize`]: HashTable::traverse_noresize
    pub fn traverse<F>(&mut self, callback: F)
    where
        F: FnMut(&P::Value) -> bool,
    {
        let size = self.slots.len();
        if self.len() * P::SHRINK_DIVISOR < size && size > P::SHRINK_FLOOR {
            self.expand();
        }

        self.traverse_noresize(callback);
    }

    /// The staging probe behind [`entry_with_hash`] and
    /// [`remove_with_hash`]: finds the matching occupied slot, or the slot a
    /// new element belongs in, remembering the first tombstone on the path
    /// for reuse.
    ///
    /// [`entry_with_hash`]: HashTable::entry_with_hash
    /// [`remove_with_hash`]: HashTable::remove_with_hash
    fn find_slot_index(&self, key: &P::Compare, hash: Hashval) -> Probe {
        self.searches.set(self.searches.get() + 1);
        let size = self.slots.len();
        let mut index = primes::mod1(hash, self.size_prime_index) as usize;
        let mut first_tombstone = None;

        match &self.slots[index] {
            Slot::Empty => return Probe::Miss(index),
            Slot::Tombstone => first_tombstone = Some(index),
            Slot::Occupied(value) => {
                if P::equal(value, key) {
                    return Probe::Hit(index);
                }
            }
        }

        let stride = primes::mod2(hash, self.size_prime_index) as usize;
        loop {
            self.collisions.set(self.collisions.get() + 1);
            index += stride;
            if index >= size {
                index -= size;
            }

            match &self.slots[index] {
                Slot::Empty => return Probe::Miss(first_tombstone.unwrap_or(index)),
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Slot::Occupied(value) => {
                    if P::equal(value, key) {
                        return Probe::Hit(index);
                    }
                }
            }
        }
    }

    /// Rebuilds the slot array, rehashing every live element and purging all
    /// tombstones.
    ///
    /// The target capacity is the prime covering twice the live count when
    /// the table is more than half live (growth) or emptier than the shrink
    /// threshold (compaction to a smaller prime); otherwise the capacity is
    /// kept and the rebuild only purges tombstones.
    fn expand(&mut self) {
        let old_size = self.slots.len();
        let live = self.len();

        let size_prime_index = if live * P::GROW_DIVISOR > old_size
            || (live * P::SHRINK_DIVISOR < old_size && old_size > P::SHRINK_FLOOR)
        {
            primes::higher_prime_index(live * 2)
        } else {
            self.size_prime_index
        };

        let old_slots = mem::replace(
            &mut self.slots,
            alloc_slots(primes::prime_at(size_prime_index)),
        );
        self.size_prime_index = size_prime_index;
        self.n_entries -= self.n_tombstones;
        self.n_tombstones = 0;

        for slot in old_slots.into_vec() {
            if let Slot::Occupied(value) = slot {
                let index = self.find_empty_slot_for_expand(P::hash(&value));
                self.slots[index] = Slot::Occupied(value);
            }
        }
    }

    /// Probe specialized for reinsertion into a freshly rebuilt array: no
    /// equality calls, no counter updates, and no tombstones can exist yet.
    fn find_empty_slot_for_expand(&self, hash: Hashval) -> usize {
        let size = self.slots.len();
        let mut index = primes::mod1(hash, self.size_prime_index) as usize;

        match &self.slots[index] {
            Slot::Empty => return index,
            Slot::Tombstone => panic!("tombstone in a freshly rebuilt slot array"),
            Slot::Occupied(_) => {}
        }

        let stride = primes::mod2(hash, self.size_prime_index) as usize;
        loop {
            index += stride;
            if index >= size {
                index -= size;
            }

            match &self.slots[index] {
                Slot::Empty => return index,
                Slot::Tombstone => panic!("tombstone in a freshly rebuilt slot array"),
                Slot::Occupied(_) => {}
            }
        }
    }
}

impl<P: Policy> Default for HashTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Policy> Drop for HashTable<P> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Slot::Occupied(value) = mem::replace(slot, Slot::Empty) {
                P::remove(value);
            }
        }
    }
}

impl<P: Policy> Debug for HashTable<P>
where
    P::Value: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("tombstones", &self.n_tombstones)
            .field("elements", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl<'a, P: Policy> IntoIterator for &'a HashTable<P> {
    type Item = &'a P::Value;
    type IntoIter = Iter<'a, P>;

    fn into_iter(self) -> Iter<'a, P> {
        self.iter()
    }
}

/// A staged insert position in a [`HashTable`].
///
/// Created by [`entry_with_hash`]; resolves the probe once and lets the
/// caller decide what to do with the outcome without a second lookup.
///
/// [`entry_with_hash`]: HashTable::entry_with_hash
pub enum Entry<'a, P: Policy> {
    /// No element matched; the entry targets the slot an insert should use.
    Vacant(VacantEntry<'a, P>),
    /// An element matching the key is already present.
    Occupied(OccupiedEntry<'a, P>),
}

impl<'a, P: Policy> Entry<'a, P> {
    /// Inserts `default` if the entry is vacant; returns the element either
    /// way.
    pub fn or_insert(self, default: P::Value) -> &'a mut P::Value {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the computed value if the entry is vacant; returns the element
    /// either way. The closure only runs when an insert happens.
    pub fn or_insert_with(self, default: impl FnOnce() -> P::Value) -> &'a mut P::Value {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }
}

/// A staged vacant slot in a [`HashTable`].
///
/// Dropping it without inserting leaves the table exactly as it was.
pub struct VacantEntry<'a, P: Policy> {
    table: &'a mut HashTable<P>,
    index: usize,
}

impl<'a, P: Policy> VacantEntry<'a, P> {
    /// Deposits `value` into the staged slot.
    ///
    /// Reusing a tombstoned slot shortens the probe chain it sat on; a fresh
    /// empty slot grows the entry count instead.
    pub fn insert(self, value: P::Value) -> &'a mut P::Value {
        let table = self.table;
        match &table.slots[self.index] {
            Slot::Tombstone => table.n_tombstones -= 1,
            Slot::Empty => table.n_entries += 1,
            Slot::Occupied(_) => unreachable!("vacant entry staged on an occupied slot"),
        }

        table.slots[self.index] = Slot::Occupied(value);
        match &mut table.slots[self.index] {
            Slot::Occupied(value) => value,
            _ => unreachable!(),
        }
    }
}

/// A located occupied slot in a [`HashTable`].
///
/// Lets a caller that already paid for the lookup read, update, or clear the
/// element without probing again.
pub struct OccupiedEntry<'a, P: Policy> {
    table: &'a mut HashTable<P>,
    index: usize,
}

impl<'a, P: Policy> OccupiedEntry<'a, P> {
    /// The matched element.
    pub fn get(&self) -> &P::Value {
        match &self.table.slots[self.index] {
            Slot::Occupied(value) => value,
            _ => unreachable!("occupied entry staged on a vacant slot"),
        }
    }

    /// The matched element, mutably.
    ///
    /// Mutation must not change the content the policy hashes and compares,
    /// or the element becomes unreachable.
    pub fn get_mut(&mut self) -> &mut P::Value {
        match &mut self.table.slots[self.index] {
            Slot::Occupied(value) => value,
            _ => unreachable!("occupied entry staged on a vacant slot"),
        }
    }

    /// Converts the entry into a reference bound to the table's borrow.
    pub fn into_mut(self) -> &'a mut P::Value {
        let table = self.table;
        match &mut table.slots[self.index] {
            Slot::Occupied(value) => value,
            _ => unreachable!("occupied entry staged on a vacant slot"),
        }
    }

    /// Clears the located slot without probing again.
    ///
    /// The policy's `remove` runs on the element and the slot becomes a
    /// tombstone, exactly as [`HashTable::remove_with_hash`] would.
    pub fn clear(self) {
        let table = self.table;
        match mem::replace(&mut table.slots[self.index], Slot::Tombstone) {
            Slot::Occupied(value) => P::remove(value),
            _ => unreachable!("occupied entry staged on a vacant slot"),
        }
        table.n_tombstones += 1;
    }
}

/// A forward-only cursor over a table's live elements.
///
/// Created by [`HashTable::iter`]; skips empty and tombstoned slots.
pub struct Iter<'a, P: Policy> {
    slots: core::slice::Iter<'a, Slot<P::Value>>,
}

impl<'a, P: Policy> Iterator for Iter<'a, P> {
    type Item = &'a P::Value;

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Slot::Occupied(value) = slot {
                return Some(value);
            }
        }
        None
    }
}

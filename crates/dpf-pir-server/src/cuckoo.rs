//! Cuckoo-hashed bucket store
//!
//! Fixed-size items live in one of two buckets picked by keyed HMAC-SHA256
//! PRFs over the item's sequence number. A bucket holds up to `bucket_depth`
//! items back to back and is served as a single PIR record, so a client that
//! knows both PRF keys fetches an item by privately retrieving its two
//! buckets and scanning them.

use std::sync::Mutex;

use hmac::{Hmac, Mac};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::Sha256;

use crate::error::{Result, ServerError};
use crate::state::RecordStore;

type HmacSha256 = Hmac<Sha256>;

/// Evictions attempted before an insert gives up
pub const MAX_EVICTIONS: usize = 500;
pub const DEFAULT_BUCKET_DEPTH: usize = 4;
/// Seed for the eviction victim choice
pub const DEFAULT_RANDOM_SEED: u64 = 12345;

/// First eight bytes, big-endian, of HMAC-SHA256(key, seq_no as big-endian)
pub fn prf(key: &[u8], seq_no: u64) -> Result<u64> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ServerError::Internal(format!("hmac key rejected: {}", e)))?;
    mac.update(&seq_no.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    Ok(u64::from_be_bytes(head))
}

/// An item together with the two buckets its sequence number maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuckooItem {
    pub id: u64,
    pub data: Vec<u8>,
    pub seq_no: u64,
    pub bucket1: usize,
    pub bucket2: usize,
}

impl CuckooItem {
    fn other_bucket(&self, bucket: usize) -> usize {
        if self.bucket1 == bucket {
            self.bucket2
        } else {
            self.bucket1
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: u64,
    seq_no: u64,
    bucket1: usize,
    bucket2: usize,
}

/// `num_buckets` buckets of `bucket_depth` slots, each `item_size` bytes
///
/// Empty slots are zero bytes.
#[derive(Clone)]
pub struct CuckooTable {
    num_buckets: usize,
    bucket_depth: usize,
    item_size: usize,
    data: Vec<u8>,
    slots: Vec<Option<Slot>>,
    rng: ChaCha8Rng,
    key1: Vec<u8>,
    key2: Vec<u8>,
    evictions: u64,
}

impl std::fmt::Debug for CuckooTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuckooTable")
            .field("num_buckets", &self.num_buckets)
            .field("bucket_depth", &self.bucket_depth)
            .field("item_size", &self.item_size)
            .field("items", &self.len())
            .finish()
    }
}

impl CuckooTable {
    pub fn new(
        num_buckets: usize,
        bucket_depth: usize,
        item_size: usize,
        key1: impl Into<Vec<u8>>,
        key2: impl Into<Vec<u8>>,
        rand_seed: u64,
    ) -> Result<Self> {
        if num_buckets == 0 || bucket_depth == 0 || item_size == 0 {
            return Err(ServerError::InvalidArgument(format!(
                "cuckoo table needs non-zero dimensions, got {} buckets x {} slots x {} bytes",
                num_buckets, bucket_depth, item_size
            )));
        }
        let slot_count = num_buckets
            .checked_mul(bucket_depth)
            .ok_or_else(|| ServerError::InvalidArgument("too many cuckoo slots".to_string()))?;
        let bytes = slot_count
            .checked_mul(item_size)
            .ok_or_else(|| ServerError::InvalidArgument("cuckoo table too large".to_string()))?;

        Ok(Self {
            num_buckets,
            bucket_depth,
            item_size,
            data: vec![0u8; bytes],
            slots: vec![None; slot_count],
            rng: ChaCha8Rng::seed_from_u64(rand_seed),
            key1: key1.into(),
            key2: key2.into(),
            evictions: 0,
        })
    }

    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    pub fn bucket_depth(&self) -> usize {
        self.bucket_depth
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Bytes per bucket
    pub fn bucket_width(&self) -> usize {
        self.bucket_depth * self.item_size
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Items moved out of a full bucket so far
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// The two candidate buckets of `seq_no`
    pub fn buckets_for(&self, seq_no: u64) -> Result<(usize, usize)> {
        let n = self.num_buckets as u64;
        Ok((
            (prf(&self.key1, seq_no)? % n) as usize,
            (prf(&self.key2, seq_no)? % n) as usize,
        ))
    }

    /// Build an item with its buckets derived from `seq_no`
    pub fn item(&self, id: u64, seq_no: u64, data: Vec<u8>) -> Result<CuckooItem> {
        let (bucket1, bucket2) = self.buckets_for(seq_no)?;
        Ok(CuckooItem {
            id,
            data,
            seq_no,
            bucket1,
            bucket2,
        })
    }

    fn check(&self, item: &CuckooItem) -> Result<()> {
        if item.data.len() != self.item_size {
            return Err(ServerError::ItemSize {
                expected: self.item_size,
                actual: item.data.len(),
            });
        }
        if self.buckets_for(item.seq_no)? != (item.bucket1, item.bucket2) {
            return Err(ServerError::BucketMismatch { id: item.id });
        }
        Ok(())
    }

    /// Place `item`, evicting along a chain when both of its buckets are full
    ///
    /// Returns `Ok(None)` once every item has a slot. `Ok(Some(item))` means
    /// the chain ran out: the returned item (not necessarily the one passed
    /// in) is no longer in the table.
    pub fn insert(&mut self, item: &CuckooItem) -> Result<Option<CuckooItem>> {
        self.check(item)?;

        if self.try_insert(item.bucket1, item) || self.try_insert(item.bucket2, item) {
            return Ok(None);
        }

        let mut current = item.clone();
        let mut next = item.bucket2;
        for _ in 0..MAX_EVICTIONS {
            if self.try_insert(next, &current) {
                return Ok(None);
            }
            match self.evict_into(next, &current) {
                Some(evicted) => {
                    next = evicted.other_bucket(next);
                    current = evicted;
                }
                None => return Ok(None),
            }
        }

        tracing::debug!(
            id = current.id,
            max_evictions = MAX_EVICTIONS,
            "Cuckoo eviction chain exhausted"
        );
        Ok(Some(current))
    }

    /// Item stored with exactly this bucket pair, searching both buckets
    pub fn get(&self, bucket1: usize, bucket2: usize) -> Option<CuckooItem> {
        let search = |bucket: usize| -> Option<usize> {
            self.bucket_slots(bucket)?.find(|&i| {
                matches!(self.slots[i], Some(s) if s.bucket1 == bucket1 && s.bucket2 == bucket2)
            })
        };
        search(bucket1)
            .or_else(|| search(bucket2))
            .and_then(|i| self.item_at(i))
    }

    /// Take the item with `id` out of the table, zeroing its slot
    pub fn remove(&mut self, id: u64) -> Option<CuckooItem> {
        let index = self
            .slots
            .iter()
            .position(|s| matches!(s, Some(s) if s.id == id))?;
        let item = self.item_at(index);
        self.slots[index] = None;
        self.slot_bytes_mut(index).fill(0);
        item
    }

    /// Raw bytes of one bucket
    pub fn bucket(&self, bucket: usize) -> Option<&[u8]> {
        let width = self.bucket_width();
        self.data.get(bucket * width..(bucket + 1) * width)
    }

    /// Raw bytes of every bucket, in bucket order
    pub fn buckets(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(self.bucket_width())
    }

    fn bucket_slots(&self, bucket: usize) -> Option<std::ops::Range<usize>> {
        if bucket >= self.num_buckets {
            return None;
        }
        let start = bucket * self.bucket_depth;
        Some(start..start + self.bucket_depth)
    }

    fn slot_bytes_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.item_size;
        &mut self.data[start..start + self.item_size]
    }

    fn item_at(&self, index: usize) -> Option<CuckooItem> {
        let slot = self.slots.get(index).copied().flatten()?;
        let start = index * self.item_size;
        Some(CuckooItem {
            id: slot.id,
            data: self.data[start..start + self.item_size].to_vec(),
            seq_no: slot.seq_no,
            bucket1: slot.bucket1,
            bucket2: slot.bucket2,
        })
    }

    fn place(&mut self, index: usize, item: &CuckooItem) {
        self.slot_bytes_mut(index).copy_from_slice(&item.data);
        self.slots[index] = Some(Slot {
            id: item.id,
            seq_no: item.seq_no,
            bucket1: item.bucket1,
            bucket2: item.bucket2,
        });
    }

    fn try_insert(&mut self, bucket: usize, item: &CuckooItem) -> bool {
        let free = self
            .bucket_slots(bucket)
            .and_then(|mut range| range.find(|&i| self.slots[i].is_none()));
        match free {
            Some(index) => {
                self.place(index, item);
                true
            }
            None => false,
        }
    }

    /// Replace a random slot of `bucket` with `item`, returning the previous occupant
    fn evict_into(&mut self, bucket: usize, item: &CuckooItem) -> Option<CuckooItem> {
        let range = self.bucket_slots(bucket)?;
        let index = range.start + self.rng.gen_range(0..self.bucket_depth);
        let evicted = self.item_at(index);
        self.place(index, item);
        self.evictions += 1;
        evicted
    }
}

/// Cuckoo table whose buckets are served as PIR records
///
/// Bucket `b` is record `b` of a [`RecordStore`] with `num_buckets` records of
/// `bucket_depth * item_size` bytes. Attach [`records`](Self::records) to the
/// servers; inserts rebuild and swap the store.
pub struct BucketStore {
    table: Mutex<CuckooTable>,
    records: RecordStore,
}

impl std::fmt::Debug for BucketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketStore")
            .field("records", &self.records)
            .finish()
    }
}

impl BucketStore {
    pub fn new(table: CuckooTable) -> Result<Self> {
        let records = RecordStore::from_records(table.buckets().map(<[u8]>::to_vec).collect())?;
        Ok(Self {
            table: Mutex::new(table),
            records,
        })
    }

    /// Handle to the record store the servers answer from
    pub fn records(&self) -> RecordStore {
        self.records.clone()
    }

    pub fn num_buckets(&self) -> usize {
        self.records.capacity()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CuckooTable>> {
        self.table
            .lock()
            .map_err(|_| ServerError::Internal("cuckoo table lock poisoned".to_string()))
    }

    pub fn buckets_for(&self, seq_no: u64) -> Result<(usize, usize)> {
        self.lock()?.buckets_for(seq_no)
    }

    pub fn get(&self, bucket1: usize, bucket2: usize) -> Result<Option<CuckooItem>> {
        Ok(self.lock()?.get(bucket1, bucket2))
    }

    /// Insert one item and return its bucket pair
    pub fn insert(
        &self,
        id: u64,
        seq_no: u64,
        data: impl Into<Vec<u8>>,
    ) -> Result<(usize, usize)> {
        let buckets = self.buckets_for(seq_no)?;
        self.batch_insert([(id, seq_no, data.into())])?;
        Ok(buckets)
    }

    /// Insert `(id, seq_no, data)` items with a single store rebuild
    ///
    /// All or nothing: a wrong item size or a full table leaves both the
    /// table and the served records untouched.
    pub fn batch_insert(
        &self,
        items: impl IntoIterator<Item = (u64, u64, Vec<u8>)>,
    ) -> Result<()> {
        let mut table = self.lock()?;
        let mut staged = table.clone();

        let mut inserted = 0usize;
        for (id, seq_no, data) in items {
            let item = staged.item(id, seq_no, data)?;
            if let Some(displaced) = staged.insert(&item)? {
                tracing::warn!(
                    id = displaced.id,
                    items = staged.len(),
                    num_buckets = staged.num_buckets(),
                    "Cuckoo table full"
                );
                return Err(ServerError::TableFull {
                    displaced: displaced.id,
                });
            }
            inserted += 1;
        }

        self.records.batch_write(
            staged
                .buckets()
                .enumerate()
                .map(|(bucket, bytes)| (bucket, bytes.to_vec())),
        )?;
        *table = staged;

        tracing::info!(
            inserted,
            items = table.len(),
            evictions = table.evictions(),
            "Cuckoo buckets updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpf_pir_core::StatusKind;

    const ITEM_SIZE: usize = 8;
    const KEY1: &[u8] = b"bucket key one for the prf";
    const KEY2: &[u8] = b"bucket key two for the prf";

    fn table(num_buckets: usize, bucket_depth: usize) -> CuckooTable {
        CuckooTable::new(num_buckets, bucket_depth, ITEM_SIZE, KEY1, KEY2, DEFAULT_RANDOM_SEED)
            .unwrap()
    }

    fn payload(tag: u64) -> Vec<u8> {
        tag.to_le_bytes().to_vec()
    }

    #[test]
    fn test_prf_is_keyed_and_deterministic() {
        assert_eq!(prf(KEY1, 7).unwrap(), prf(KEY1, 7).unwrap());
        assert_ne!(prf(KEY1, 7).unwrap(), prf(KEY2, 7).unwrap());
        assert_ne!(prf(KEY1, 7).unwrap(), prf(KEY1, 8).unwrap());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        for (n, d, s) in [(0, 4, 8), (4, 0, 8), (4, 4, 0)] {
            let err = CuckooTable::new(n, d, s, KEY1, KEY2, 1).unwrap_err();
            assert_eq!(err.kind(), StatusKind::InvalidArgument);
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = table(16, DEFAULT_BUCKET_DEPTH);
        for seq_no in 0..20u64 {
            let item = table.item(seq_no + 100, seq_no, payload(seq_no)).unwrap();
            assert!(table.insert(&item).unwrap().is_none());
        }
        assert_eq!(table.len(), 20);

        for seq_no in 0..20u64 {
            let (b1, b2) = table.buckets_for(seq_no).unwrap();
            let found = table.get(b1, b2).unwrap();
            assert_eq!(found.bucket1, b1);
            assert_eq!(found.bucket2, b2);
        }

        let (b1, b2) = table.buckets_for(3).unwrap();
        let stored = table.get(b1, b2).unwrap();
        let bucket = table.bucket(b1).unwrap();
        let other = table.bucket(b2).unwrap();
        assert!(bucket
            .chunks(ITEM_SIZE)
            .chain(other.chunks(ITEM_SIZE))
            .any(|chunk| chunk == stored.data.as_slice()));
    }

    #[test]
    fn test_full_buckets_evict_along_chain() {
        let mut table = table(8, 1);
        let pair = |s: u64| table.buckets_for(s).unwrap();

        // s3 maps to (a, b); s1 fills a, s2 fills b and can move on to c
        let s3 = (0..10_000u64).find(|&s| pair(s).0 != pair(s).1).unwrap();
        let (a, b) = pair(s3);
        let s1 = (0..10_000u64)
            .find(|&s| s != s3 && pair(s).0 == a && pair(s).1 != b)
            .unwrap();
        let s2 = (0..10_000u64)
            .find(|&s| {
                let (first, second) = pair(s);
                ![s1, s3].contains(&s) && first == b && second != a && second != b
            })
            .unwrap();
        let c = pair(s2).1;

        for (id, seq_no) in [(1, s1), (2, s2), (3, s3)] {
            let item = table.item(id, seq_no, payload(id)).unwrap();
            assert!(table.insert(&item).unwrap().is_none());
        }

        assert_eq!(table.evictions(), 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.bucket(a).unwrap(), payload(1).as_slice());
        assert_eq!(table.bucket(b).unwrap(), payload(3).as_slice());
        assert_eq!(table.bucket(c).unwrap(), payload(2).as_slice());
        assert_eq!(table.get(b, c).unwrap().id, 2);
    }

    #[test]
    fn test_overfull_table_reports_displaced_item() {
        let mut table = table(2, 1);
        let outcomes: Vec<Option<CuckooItem>> = (0..3u64)
            .map(|seq_no| {
                let item = table.item(seq_no, seq_no, payload(seq_no)).unwrap();
                table.insert(&item).unwrap()
            })
            .collect();
        assert!(outcomes.iter().any(Option::is_some));
        assert!(table.len() <= 2);
    }

    #[test]
    fn test_item_size_and_buckets_checked() {
        let mut table = table(4, 2);
        let short = table.item(1, 5, vec![0u8; ITEM_SIZE - 1]).unwrap();
        let err = table.insert(&short).unwrap_err();
        assert!(matches!(err, ServerError::ItemSize { expected: ITEM_SIZE, actual: 7 }));
        assert_eq!(err.kind(), StatusKind::InvalidArgument);

        let mut moved = table.item(2, 5, payload(2)).unwrap();
        moved.bucket1 = (moved.bucket1 + 1) % 4;
        let err = table.insert(&moved).unwrap_err();
        assert!(matches!(err, ServerError::BucketMismatch { id: 2 }));
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_zeroes_slot() {
        let mut table = table(4, 2);
        let item = table.item(9, 11, payload(9)).unwrap();
        table.insert(&item).unwrap();
        assert_eq!(table.remove(9).unwrap().data, payload(9));
        assert!(table.is_empty());
        assert!(table.buckets().all(|b| b.iter().all(|&x| x == 0)));
        assert!(table.remove(9).is_none());
    }

    #[test]
    fn test_bucket_store_serves_buckets_as_records() {
        let store = BucketStore::new(table(8, 2)).unwrap();
        assert_eq!(store.num_buckets(), 8);
        let records = store.records();

        let (b1, b2) = store.insert(42, 1234, payload(42)).unwrap();
        let db = records.snapshot();
        assert_eq!(db.size(), 8);

        let served: Vec<Vec<u8>> = [b1, b2]
            .iter()
            .map(|&b| db.get(b).unwrap().unwrap())
            .collect();
        assert!(served.iter().all(|r| r.len() == 2 * ITEM_SIZE));
        assert!(served
            .iter()
            .flat_map(|r| r.chunks(ITEM_SIZE))
            .any(|chunk| chunk == payload(42).as_slice()));
        assert_eq!(store.get(b1, b2).unwrap().unwrap().id, 42);
    }

    #[test]
    fn test_bucket_store_rejects_wrong_item_size() {
        let store = BucketStore::new(table(4, 2)).unwrap();
        let err = store
            .batch_insert(vec![(1, 1, payload(1)), (2, 2, vec![1u8; ITEM_SIZE + 1])])
            .unwrap_err();
        assert_eq!(err.kind(), StatusKind::InvalidArgument);

        let db = store.records().snapshot();
        assert_eq!(db.get(0).unwrap().unwrap(), vec![0u8; 2 * ITEM_SIZE]);
        let (b1, b2) = store.buckets_for(1).unwrap();
        assert!(store.get(b1, b2).unwrap().is_none());
    }

    #[test]
    fn test_bucket_store_table_full_is_all_or_nothing() {
        let store = BucketStore::new(table(2, 1)).unwrap();
        let before = store.records().snapshot();

        let err = store
            .batch_insert((0..3u64).map(|i| (i, i, payload(i))))
            .unwrap_err();
        assert!(matches!(err, ServerError::TableFull { .. }));
        assert_eq!(err.kind(), StatusKind::ResourceExhausted);

        let after = store.records().snapshot();
        for bucket in 0..2 {
            assert_eq!(after.get(bucket).unwrap(), before.get(bucket).unwrap());
            assert_eq!(after.get(bucket).unwrap().unwrap(), vec![0u8; ITEM_SIZE]);
        }
    }
}

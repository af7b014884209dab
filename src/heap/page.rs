//! Slotted heap page with an occupancy bitmap.
//!
//! The on-disk image of a heap page is:
//!
//! ```text
//! +------------------+ offset 0
//! | occupancy bitmap |  ceil(N / 8) bytes, bit i of byte i/8 set
//! +------------------+  iff slot i holds a tuple
//! | slot 0           |  tuple_width bytes
//! | slot 1           |
//! | ...              |
//! | slot N-1         |
//! +------------------+
//! | padding          |  unspecified contents
//! +------------------+ offset page_size
//! ```
//!
//! where `N = (page_size * 8) / (tuple_width * 8 + 1)`: each slot costs its
//! payload plus one bitmap bit. Tuples are fixed-width (see
//! [`TupleDesc::width`]), so a slot index fully determines a byte range.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::DbError;
use crate::storage::error::StorageError;
use crate::storage::page::PageId;
use crate::tuple::{RecordId, Tuple, TupleDesc};
use crate::tx::TransactionId;

/// Returns the number of tuple slots a page of `page_size` bytes can hold
/// for tuples of schema `desc`.
pub fn slots_per_page(desc: &TupleDesc, page_size: usize) -> usize {
    (page_size * 8) / (desc.width() * 8 + 1)
}

/// Returns the size of the occupancy bitmap for `slots` slots, in bytes.
pub fn header_size(slots: usize) -> usize {
    slots.div_ceil(8)
}

/// An in-memory heap page: decoded slots plus the dirty/before-image
/// metadata the buffer pool relies on.
///
/// A page is born by file read or empty-page allocation, mutated only while
/// its transaction holds an exclusive lock, evicted only while clean, and
/// dropped from the cache on discard. The before-image is captured at the
/// last clean point (construction, or [`set_before_image`](Self::set_before_image)
/// at commit) and is what an aborting transaction conceptually reverts to.
#[derive(Debug)]
pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    page_size: usize,
    slots: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
    before_image: Bytes,
}

impl HeapPage {
    /// Creates an empty page with all slots free.
    pub fn empty(pid: PageId, desc: TupleDesc, page_size: usize) -> Self {
        let slots = vec![None; slots_per_page(&desc, page_size)];
        let mut page = Self {
            pid,
            desc,
            page_size,
            slots,
            dirtier: None,
            before_image: Bytes::new(),
        };
        page.before_image = page.page_data();
        page
    }

    /// Decodes a page from its on-disk image.
    ///
    /// The image also becomes the page's before-image.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if `data` is not exactly
    /// `page_size` bytes or an occupied slot fails to decode.
    pub fn from_bytes(
        pid: PageId,
        desc: TupleDesc,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self, StorageError> {
        if data.len() != page_size {
            return Err(StorageError::Corrupted(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                page_size
            )));
        }

        let slot_count = slots_per_page(&desc, page_size);
        let header = header_size(slot_count);
        let width = desc.width();

        let mut slots = Vec::with_capacity(slot_count);
        for slot in 0..slot_count {
            let occupied = (data[slot / 8] >> (slot % 8)) & 1 == 1;
            if !occupied {
                slots.push(None);
                continue;
            }
            let start = header + slot * width;
            let mut tuple = Tuple::read(&desc, &mut &data[start..start + width])?;
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            slots.push(Some(tuple));
        }

        Ok(Self {
            pid,
            desc,
            page_size,
            slots,
            dirtier: None,
            before_image: Bytes::copy_from_slice(data),
        })
    }

    /// Returns this page's identifier.
    pub fn pid(&self) -> PageId {
        self.pid
    }

    /// Returns the tuple schema of this page.
    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Returns the total number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of free slots.
    pub fn free_slot_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Inserts a tuple into the lowest-index free slot and stamps its
    /// record id.
    ///
    /// # Errors
    ///
    /// Returns `DbError::TupleDescMismatch` if the tuple's schema differs
    /// from the page's, and `DbError::CapacityFull` if no slot is free.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId, DbError> {
        if *tuple.desc() != self.desc {
            return Err(DbError::TupleDescMismatch(format!(
                "tuple is {}, page holds {}",
                tuple.desc(),
                self.desc
            )));
        }
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(DbError::CapacityFull)?;
        let rid = RecordId::new(self.pid, slot);
        tuple.set_record_id(Some(rid));
        self.slots[slot] = Some(tuple);
        Ok(rid)
    }

    /// Deletes the tuple at `tuple.record_id()` by clearing its slot.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NoSuchTuple` if the tuple has no record id, the
    /// record id names another page, or the slot is already free.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), DbError> {
        let rid = tuple.record_id().ok_or(DbError::NoSuchTuple)?;
        if rid.page_id != self.pid || rid.slot >= self.slots.len() {
            return Err(DbError::NoSuchTuple);
        }
        if self.slots[rid.slot].is_none() {
            return Err(DbError::NoSuchTuple);
        }
        self.slots[rid.slot] = None;
        Ok(())
    }

    /// Iterates the occupied slots in ascending order.
    ///
    /// Every yielded tuple carries the record id of the slot it occupies.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Produces the canonical on-disk image of this page.
    ///
    /// Free slots and trailing padding are zeroed, so the image is a pure
    /// function of the occupied slots.
    pub fn page_data(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.page_size);
        let width = self.desc.width();

        for chunk in self.slots.chunks(8) {
            let mut byte = 0u8;
            for (bit, slot) in chunk.iter().enumerate() {
                if slot.is_some() {
                    byte |= 1 << bit;
                }
            }
            buf.put_u8(byte);
        }

        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.write(&mut buf),
                None => buf.put_bytes(0, width),
            }
        }

        buf.put_bytes(0, self.page_size - buf.len());
        buf.freeze()
    }

    /// Reconstructs the page as of its before-image.
    pub fn before_image(&self) -> Result<HeapPage, StorageError> {
        HeapPage::from_bytes(
            self.pid,
            self.desc.clone(),
            self.page_size,
            &self.before_image,
        )
    }

    /// Resets the before-image to the current bytes. Called when the page
    /// reaches a clean point (commit flush).
    pub fn set_before_image(&mut self) {
        self.before_image = self.page_data();
    }

    /// Records `tid` as the transaction that dirtied this page.
    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirtier = Some(tid);
    }

    /// Clears the dirty marker.
    pub fn mark_clean(&mut self) {
        self.dirtier = None;
    }

    /// Returns the transaction that dirtied this page, or `None` if clean.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Field, Type};
    use crate::storage::page::TableId;

    fn int_desc() -> TupleDesc {
        TupleDesc::new(vec![Type::Int])
    }

    fn pid() -> PageId {
        PageId::new(TableId::new(7), 0)
    }

    fn int_tuple(v: i32) -> Tuple {
        Tuple::new(int_desc(), vec![Field::Int(v)]).unwrap()
    }

    #[test]
    fn test_slot_math() {
        // 64-byte page, 4-byte tuples: 512 bits / 33 bits-per-slot = 15.
        assert_eq!(slots_per_page(&int_desc(), 64), 15);
        assert_eq!(header_size(15), 2);
        // Header plus slots must fit the page.
        assert!(header_size(15) + 15 * 4 <= 64);

        assert_eq!(slots_per_page(&int_desc(), 4096), 32768 / 33);
    }

    #[test]
    fn test_insert_uses_lowest_free_slot() {
        let mut page = HeapPage::empty(pid(), int_desc(), 64);

        let r0 = page.insert_tuple(int_tuple(10)).unwrap();
        let r1 = page.insert_tuple(int_tuple(20)).unwrap();
        assert_eq!(r0.slot, 0);
        assert_eq!(r1.slot, 1);

        let t0 = page.iter().next().unwrap().clone();
        page.delete_tuple(&t0).unwrap();

        let r2 = page.insert_tuple(int_tuple(30)).unwrap();
        assert_eq!(r2.slot, 0);
    }

    #[test]
    fn test_capacity_full() {
        let mut page = HeapPage::empty(pid(), int_desc(), 64);
        for v in 0..15 {
            page.insert_tuple(int_tuple(v)).unwrap();
        }
        assert_eq!(page.free_slot_count(), 0);
        assert!(matches!(
            page.insert_tuple(int_tuple(99)),
            Err(DbError::CapacityFull)
        ));
    }

    #[test]
    fn test_insert_type_check() {
        let mut page = HeapPage::empty(pid(), int_desc(), 64);
        let text = Tuple::new(TupleDesc::new(vec![Type::Text]), vec![Field::text("x")]).unwrap();
        assert!(matches!(
            page.insert_tuple(text),
            Err(DbError::TupleDescMismatch(_))
        ));
    }

    #[test]
    fn test_delete_rejects_foreign_and_free_slots() {
        let mut page = HeapPage::empty(pid(), int_desc(), 64);
        let rid_less = int_tuple(1);
        assert!(matches!(
            page.delete_tuple(&rid_less),
            Err(DbError::NoSuchTuple)
        ));

        page.insert_tuple(int_tuple(1)).unwrap();
        let mut foreign = int_tuple(1);
        foreign.set_record_id(Some(RecordId::new(
            PageId::new(TableId::new(7), 1),
            0,
        )));
        assert!(matches!(
            page.delete_tuple(&foreign),
            Err(DbError::NoSuchTuple)
        ));

        let stored = page.iter().next().unwrap().clone();
        page.delete_tuple(&stored).unwrap();
        assert!(matches!(
            page.delete_tuple(&stored),
            Err(DbError::NoSuchTuple)
        ));
    }

    #[test]
    fn test_bitmap_layout() {
        let mut page = HeapPage::empty(pid(), int_desc(), 64);
        for v in 0..9 {
            page.insert_tuple(int_tuple(v)).unwrap();
        }
        let data = page.page_data();
        // Slots 0..=7 fill byte 0 bit-by-bit, slot 8 is bit 0 of byte 1.
        assert_eq!(data[0], 0xFF);
        assert_eq!(data[1], 0x01);
        // First slot payload starts right after the 2-byte header.
        assert_eq!(&data[2..6], &[0, 0, 0, 0]);
        assert_eq!(&data[6..10], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_page_data_roundtrip() {
        let mut page = HeapPage::empty(pid(), int_desc(), 64);
        for v in [3, 1, 4, 1, 5] {
            page.insert_tuple(int_tuple(v)).unwrap();
        }
        let second = page.iter().nth(1).unwrap().clone();
        page.delete_tuple(&second).unwrap();

        let data = page.page_data();
        assert_eq!(data.len(), 64);

        let parsed = HeapPage::from_bytes(pid(), int_desc(), 64, &data).unwrap();
        assert_eq!(parsed.page_data(), data);

        let values: Vec<i32> = parsed
            .iter()
            .map(|t| match t.field(0) {
                Some(Field::Int(v)) => *v,
                other => panic!("unexpected field {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![3, 4, 1, 5]);

        // Every scanned tuple points back at its slot.
        for tuple in parsed.iter() {
            let rid = tuple.record_id().unwrap();
            assert_eq!(rid.page_id, pid());
        }
    }

    #[test]
    fn test_from_bytes_rejects_wrong_size() {
        assert!(matches!(
            HeapPage::from_bytes(pid(), int_desc(), 64, &[0u8; 63]),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn test_empty_page_image_is_zeroed() {
        let page = HeapPage::empty(pid(), int_desc(), 64);
        let data = page.page_data();
        assert_eq!(data.len(), 64);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_before_image_tracks_clean_points() {
        let mut page = HeapPage::empty(pid(), int_desc(), 64);
        page.insert_tuple(int_tuple(42)).unwrap();
        page.mark_dirty(TransactionId::new());

        // Before-image still reflects the empty page it was born as.
        let before = page.before_image().unwrap();
        assert_eq!(before.iter().count(), 0);

        // A commit-time reset captures the current contents.
        page.set_before_image();
        page.mark_clean();
        let before = page.before_image().unwrap();
        assert_eq!(before.iter().count(), 1);
    }

    #[test]
    fn test_dirty_marker() {
        let mut page = HeapPage::empty(pid(), int_desc(), 64);
        assert_eq!(page.dirtier(), None);

        let tid = TransactionId::new();
        page.mark_dirty(tid);
        assert_eq!(page.dirtier(), Some(tid));

        page.mark_clean();
        assert_eq!(page.dirtier(), None);
    }
}

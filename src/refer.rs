//! Reference tables shared by the encoder and decoder sessions.
//!
//! Both sides number reference-eligible values in the order they appear on the
//! wire. The encoder remembers which values it has written so that a repeated
//! value becomes `r<ordinal>;`; the decoder remembers where each value started
//! so that a back-reference can be read again into whatever type is requested.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Identity of a shared allocation: its address and the pointee type.
pub(crate) type Identity = (usize, TypeId);

#[derive(Debug, Default)]
pub(crate) struct EncoderRefer {
    ptrs: HashMap<Identity, usize>,
    strings: HashMap<Box<str>, usize>,
    expected: Option<Identity>,
    last: usize,
}

impl EncoderRefer {
    /// Skips `n` ordinals that can never be referenced (class field names).
    pub fn add_count(&mut self, n: usize) {
        self.last += n;
    }

    /// Takes the next ordinal for a value that is written by value.
    pub fn set(&mut self) {
        let index = self.next();
        if let Some(id) = self.expected.take() {
            self.ptrs.insert(id, index);
        }
    }

    /// Takes the next ordinal for a string and remembers its content.
    pub fn set_str(&mut self, s: &str) {
        let index = self.next();
        if let Some(id) = self.expected.take() {
            self.ptrs.insert(id, index);
        }
        self.strings.insert(s.into(), index);
    }

    pub fn find_ptr(&self, id: &Identity) -> Option<usize> {
        self.ptrs.get(id).copied()
    }

    pub fn find_str(&self, s: &str) -> Option<usize> {
        self.strings.get(s).copied()
    }

    /// The next ordinal taken belongs to the allocation `id`.
    pub fn expect(&mut self, id: Identity) {
        self.expected = Some(id);
    }

    pub fn clear_expected(&mut self) {
        self.expected = None;
    }

    pub fn reset(&mut self) {
        self.ptrs.clear();
        self.strings.clear();
        self.expected = None;
        self.last = 0;
    }

    fn next(&mut self) -> usize {
        let index = self.last;
        self.last += 1;
        index
    }
}

/// One decoded reference-eligible value.
pub(crate) struct Slot {
    /// Offset of the value's tag in the input.
    pub start: usize,
    /// Shared handle produced when the value was decoded behind an `Arc`.
    pub shared: Option<Box<dyn Any + Send>>,
}

#[derive(Default)]
pub(crate) struct DecoderRefer {
    slots: Vec<Slot>,
    expected: Option<(usize, Box<dyn Any + Send>)>,
}

impl DecoderRefer {
    pub fn add(&mut self, start: usize) {
        let index = self.slots.len();
        let shared = match self.expected.take() {
            Some((expected, handle)) if expected == index => Some(handle),
            other => {
                self.expected = other;
                None
            }
        };
        self.slots.push(Slot { start, shared });
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn shared<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.slots
            .get(index)?
            .shared
            .as_ref()?
            .downcast_ref::<T>()
            .cloned()
    }

    pub fn attach(&mut self, index: usize, handle: Box<dyn Any + Send>) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.shared.is_none() {
                slot.shared = Some(handle);
            }
        }
    }

    /// Publishes `handle` for the slot that will be appended at `index`.
    pub fn expect(&mut self, index: usize, handle: Box<dyn Any + Send>) {
        self.expected = Some((index, handle));
    }

    pub fn clear_expected(&mut self) {
        self.expected = None;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn reset(&mut self) {
        self.slots.clear();
        self.expected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_refer_shares_one_counter() {
        let mut refer = EncoderRefer::default();
        refer.set_str("hello");
        refer.add_count(3);
        refer.expect((0x1000, TypeId::of::<u8>()));
        refer.set();
        refer.set_str("world");
        assert_eq!(refer.find_str("hello"), Some(0));
        assert_eq!(refer.find_ptr(&(0x1000, TypeId::of::<u8>())), Some(4));
        assert_eq!(refer.find_str("world"), Some(5));
        refer.reset();
        assert_eq!(refer.find_str("hello"), None);
    }

    #[test]
    fn decoder_refer_attaches_expected_handle_to_matching_slot() {
        let mut refer = DecoderRefer::default();
        refer.add(0);
        refer.expect(2, Box::new(7u32));
        refer.add(5);
        assert_eq!(refer.shared::<u32>(1), None);
        refer.add(9);
        assert_eq!(refer.shared::<u32>(2), Some(7));
        assert_eq!(refer.get(2).map(|slot| slot.start), Some(9));
    }
}

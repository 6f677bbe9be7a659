// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Sparse breakpoint index over the full 32-bit address space.
//!
//! Two levels: the high 16 address bits pick a page, the low 16 a bit
//! inside it. Pages are allocated on the first breakpoint set in them and
//! freed again once their last bit clears, so lookup during execution is
//! one indirection and a bit test, and an empty map costs one page-table
//! scan per program, not per cycle.

use common::numutil::NumExt;

const PAGE_BITS: u32 = 16;
const PAGE_MASK: u32 = (1 << PAGE_BITS) - 1;
const PAGE_WORDS: usize = 1 << (PAGE_BITS - 6);

type Page = Box<[u64; PAGE_WORDS]>;

pub struct Breakpoints {
    pages: Vec<Option<Page>>,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            pages: vec![None; 1 << (32 - PAGE_BITS)],
        }
    }
}

impl Breakpoints {
    /// Set a breakpoint on the given address.
    pub fn add(&mut self, addr: u32) {
        let page = self.pages[(addr >> PAGE_BITS).us()]
            .get_or_insert_with(|| Box::new([0; PAGE_WORDS]));
        let bit = addr & PAGE_MASK;
        page[(bit >> 6).us()] |= 1 << (bit & 63);
    }

    /// Clear a breakpoint. Frees the page if it was the last one in it.
    pub fn remove(&mut self, addr: u32) {
        let slot = &mut self.pages[(addr >> PAGE_BITS).us()];
        if let Some(page) = slot {
            let bit = addr & PAGE_MASK;
            page[(bit >> 6).us()] &= !(1 << (bit & 63));
            if page.iter().all(|word| *word == 0) {
                *slot = None;
            }
        }
    }

    /// Is there a breakpoint on this address?
    #[inline]
    pub fn hit(&self, addr: u32) -> bool {
        match &self.pages[(addr >> PAGE_BITS).us()] {
            Some(page) => {
                let bit = addr & PAGE_MASK;
                page[(bit >> 6).us()].is_bit((bit & 63) as u16)
            }
            None => false,
        }
    }

    /// How many pages are currently allocated.
    pub fn allocated_pages(&self) -> usize {
        self.pages.iter().filter(|page| page.is_some()).count()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_and_clear() {
        let mut map = Breakpoints::default();
        assert!(!map.hit(0x0800_0120));

        map.add(0x0800_0120);
        assert!(map.hit(0x0800_0120));
        assert!(!map.hit(0x0800_0124));
        assert!(!map.hit(0x0900_0120));

        map.remove(0x0800_0120);
        assert!(!map.hit(0x0800_0120));
    }

    #[test]
    fn pages_free_when_empty() {
        let mut map = Breakpoints::default();
        assert_eq!(0, map.allocated_pages());

        map.add(0x0800_0000);
        map.add(0x0800_FFFC);
        map.add(0x0300_0000);
        assert_eq!(2, map.allocated_pages());

        map.remove(0x0800_0000);
        assert_eq!(2, map.allocated_pages());
        map.remove(0x0800_FFFC);
        assert_eq!(1, map.allocated_pages());
        map.remove(0x0300_0000);
        assert_eq!(0, map.allocated_pages());

        // Clearing an address with no page is fine
        map.remove(0x0300_0000);
    }
}

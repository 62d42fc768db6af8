//! Region search over the interleaved symbol table.
//!
//! Records of different kinds share one array, so a probe at `mid` first has
//! to walk back to the nearest record of the kind being searched. The search
//! then narrows in two phases:
//!
//! 1. a modified binary search that records the last record `<= address` as
//!    the left edge and the record before the first overshoot as the right
//!    edge (an exact hit keeps going with `address + 1` so that a run of equal
//!    addresses resolves to its last record);
//! 2. a backward scan from the right edge to the nearest record of the kind,
//!    which becomes the final left edge.
//!
//! Indices are signed: an empty result is encoded as `right == left - 1`,
//! which can go to -1.

use std::cmp::Ordering;

use tracing::trace;

use crate::types::{SymbolEntry, SymbolKind};

/// Inclusive index range `[left, right]` into the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region
{
    /// First index of the region.
    pub left: isize,
    /// Last index of the region.
    pub right: isize,
}

impl Region
{
    /// The region `[left, right]`.
    pub const fn new(left: isize, right: isize) -> Self
    {
        Self { left, right }
    }

    /// The whole of a table with `len` records.
    pub fn whole(len: usize) -> Self
    {
        Self::new(0, isize::try_from(len).unwrap_or(isize::MAX) - 1)
    }

    /// Returns `true` when `right < left`.
    pub const fn is_empty(&self) -> bool
    {
        self.right < self.left
    }

    /// The region as unsigned bounds, if it is non-empty and starts on a
    /// record of `kind`.
    ///
    /// The second check rejects results whose left edge never moved off the
    /// initial bound, such as a table's leading header record or a file with
    /// no function covering the address.
    pub fn matched(&self, entries: &[SymbolEntry], kind: SymbolKind) -> Option<(usize, usize)>
    {
        if self.is_empty() {
            return None;
        }
        let left = usize::try_from(self.left).ok()?;
        let right = usize::try_from(self.right).ok()?;
        (entries.get(left)?.kind == kind && right < entries.len()).then_some((left, right))
    }
}

/// Find the region of `kind` records covering `address` within `bounds`.
///
/// `bounds` must lie inside `entries`. The result is the tightest run of
/// `kind` records whose value is the greatest one `<= address`, or an empty
/// region when no record of `kind` in `bounds` was compared at all.
pub fn region_search(entries: &[SymbolEntry], bounds: Region, kind: SymbolKind, address: u32) -> Region
{
    let mut region = bounds;
    let mut l = bounds.left;
    let mut r = bounds.right;
    let mut address = u64::from(address);
    let mut found_any = false;

    while l <= r {
        let true_mid = (l + r) / 2;
        let mut m = true_mid;

        while m >= l && entries[m as usize].kind != kind {
            m -= 1;
        }
        if m < l {
            l = true_mid + 1;
            continue;
        }

        found_any = true;
        let value = u64::from(entries[m as usize].value);
        trace!(%kind, probe = m, value, address, "region search probe");
        match value.cmp(&address) {
            Ordering::Less => {
                region.left = m;
                l = true_mid + 1;
            }
            Ordering::Greater => {
                region.right = m - 1;
                r = m - 1;
            }
            Ordering::Equal => {
                region.left = m;
                l = m;
                address += 1;
            }
        }
    }

    if found_any {
        let mut l = region.right;
        while l > region.left && entries[l as usize].kind != kind {
            l -= 1;
        }
        region.left = l;
    } else {
        region.right = region.left - 1;
    }
    region
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn entry(kind: SymbolKind, value: u32) -> SymbolEntry
    {
        SymbolEntry::new(kind, value, 0, 0)
    }

    fn lines(values: &[u32]) -> Vec<SymbolEntry>
    {
        values.iter().map(|&v| entry(SymbolKind::SourceLine, v)).collect()
    }

    #[test]
    fn test_homogeneous_array()
    {
        let entries = lines(&[0x10, 0x20, 0x30, 0x40]);
        let whole = Region::whole(entries.len());
        let found = region_search(&entries, whole, SymbolKind::SourceLine, 0x25);
        assert_eq!(found, Region::new(1, 1));
        let found = region_search(&entries, whole, SymbolKind::SourceLine, 0x40);
        assert_eq!(found, Region::new(3, 3));
        let found = region_search(&entries, whole, SymbolKind::SourceLine, 0xffff_ffff);
        assert_eq!(found, Region::new(3, 3));
    }

    #[test]
    fn test_exact_boundary_hits_region_start()
    {
        let entries = lines(&[0x10, 0x20, 0x30]);
        let found = region_search(&entries, Region::whole(3), SymbolKind::SourceLine, 0x20);
        assert_eq!(found.matched(&entries, SymbolKind::SourceLine), Some((1, 1)));
    }

    #[test]
    fn test_duplicate_addresses_pick_rightmost()
    {
        let entries = lines(&[0x10, 0x20, 0x20, 0x20, 0x30]);
        let found = region_search(&entries, Region::whole(5), SymbolKind::SourceLine, 0x20);
        assert_eq!(found, Region::new(3, 3));
    }

    #[test]
    fn test_below_first_record_is_unmatched()
    {
        let entries = lines(&[0x10, 0x20]);
        let found = region_search(&entries, Region::whole(2), SymbolKind::SourceLine, 0x0f);
        assert_eq!(found.matched(&entries, SymbolKind::SourceLine), None);
    }

    #[test]
    fn test_no_record_of_kind_gives_empty_region()
    {
        let entries = lines(&[0x10, 0x20]);
        let found = region_search(&entries, Region::whole(2), SymbolKind::Function, 0x15);
        assert!(found.is_empty());
        assert_eq!(found, Region::new(0, -1));
    }

    #[test]
    fn test_interleaved_kinds()
    {
        let entries = vec![
            entry(SymbolKind::SourceFile, 0x100),
            entry(SymbolKind::Function, 0x100),
            entry(SymbolKind::SourceLine, 0x0),
            entry(SymbolKind::SourceLine, 0x8),
            entry(SymbolKind::Function, 0x120),
            entry(SymbolKind::SourceLine, 0x0),
            entry(SymbolKind::SourceFile, 0x200),
            entry(SymbolKind::Function, 0x200),
            entry(SymbolKind::SourceLine, 0x0),
        ];
        let whole = Region::whole(entries.len());

        let files = region_search(&entries, whole, SymbolKind::SourceFile, 0x125);
        assert_eq!(files, Region::new(0, 5));

        let funs = region_search(&entries, files, SymbolKind::Function, 0x125);
        assert_eq!(funs, Region::new(4, 5));

        let files = region_search(&entries, whole, SymbolKind::SourceFile, 0x200);
        assert_eq!(files, Region::new(6, 8));
    }

    #[test]
    fn test_empty_bounds()
    {
        let found = region_search(&[], Region::whole(0), SymbolKind::SourceFile, 0x10);
        assert!(found.is_empty());
    }
}

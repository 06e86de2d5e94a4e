//! Detection of aliasing file regions within one Mach-O image.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    offset: u64,
    size: u64,
    label: &'static str,
}

impl Region {
    fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

/// Sorted, non-overlapping set of declared regions.
///
/// Lives for one object check and is dropped with it.
#[derive(Debug, Default)]
pub struct OverlapTracker {
    regions: Vec<Region>,
}

impl OverlapTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `[offset, offset + size)`, failing if it intersects a region
    /// already recorded. Empty regions are ignored.
    pub fn register(&mut self, offset: u64, size: u64, label: &'static str) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let region = Region { offset, size, label };
        let at = self.regions.partition_point(|r| r.offset < offset);

        let previous = at.checked_sub(1).and_then(|i| self.regions.get(i));
        let conflict = previous
            .filter(|p| p.end() > offset)
            .or_else(|| self.regions.get(at).filter(|n| n.offset < region.end()));
        if let Some(existing) = conflict {
            return Err(Error::Overlap {
                first: label,
                first_offset: offset,
                first_size: size,
                second: existing.label,
                second_offset: existing.offset,
                second_size: existing.size,
            });
        }

        self.regions.insert(at, region);
        Ok(())
    }

    /// Number of recorded regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if no region is recorded.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_regions_accepted_in_any_order() {
        let mut tracker = OverlapTracker::new();
        tracker.register(100, 10, "b").unwrap();
        tracker.register(0, 32, "headers").unwrap();
        tracker.register(110, 5, "c").unwrap();
        tracker.register(50, 50, "a").unwrap();
        assert_eq!(tracker.len(), 4);
    }

    #[test]
    fn test_zero_size_is_noop() {
        let mut tracker = OverlapTracker::new();
        tracker.register(0, 100, "headers").unwrap();
        tracker.register(50, 0, "empty").unwrap();
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_overlaps_rejected() {
        let mut tracker = OverlapTracker::new();
        tracker.register(100, 50, "section contents").unwrap();

        // tail, head, contained, containing, same start
        for (offset, size) in [(140, 20), (90, 20), (110, 10), (50, 200), (100, 1)] {
            let err = tracker.register(offset, size, "symbol table").unwrap_err();
            match err {
                Error::Overlap { first, second, second_offset, .. } => {
                    assert_eq!(first, "symbol table");
                    assert_eq!(second, "section contents");
                    assert_eq!(second_offset, 100);
                }
                other => panic!("unexpected error {other}"),
            }
        }
        assert_eq!(tracker.len(), 1);
    }
}

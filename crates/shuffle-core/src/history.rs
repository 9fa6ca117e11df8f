//! Navigable shuffle history.
//!
//! `entries` holds catalog indices in the order they were chosen; `cursor`
//! marks the one currently selected.  Going back and then forward replays
//! the same entries.  Drawing a new index from anywhere but the tip drops the
//! abandoned branch first.
//!
//! Navigation is split into *plan* and *apply* so callers can act on the
//! planned index (e.g. tell the player to load it) and only commit the move
//! once that succeeded.

use rand::Rng;

use crate::{Result, ShuffleError};

/// A navigation step computed by [`ShuffleHistory::plan_advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move the cursor forward onto an existing entry.
    Replay { position: usize, index: usize },
    /// Truncate after the cursor and append a freshly drawn index.
    Draw { index: usize },
}

impl Step {
    pub fn index(&self) -> usize {
        match *self {
            Step::Replay { index, .. } | Step::Draw { index } => index,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShuffleHistory {
    entries: Vec<usize>,
    cursor: Option<usize>,
}

impl ShuffleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot and prune it against a catalog of
    /// `catalog_size` items.
    pub fn restore(entries: &[i64], position: i64, catalog_size: usize) -> Self {
        let mut kept = Vec::with_capacity(entries.len());
        // Number of surviving entries at or before the saved cursor.
        let mut kept_through_cursor = 0usize;
        for (i, &value) in entries.iter().enumerate() {
            if value < 0 || value as u64 >= catalog_size as u64 {
                continue;
            }
            kept.push(value as usize);
            if (i as i64) <= position {
                kept_through_cursor += 1;
            }
        }

        let cursor = if kept.is_empty() {
            None
        } else {
            Some(kept_through_cursor.saturating_sub(1).min(kept.len() - 1))
        };
        Self {
            entries: kept,
            cursor,
        }
    }

    pub fn entries(&self) -> &[usize] {
        &self.entries
    }

    /// Cursor position, or -1 when empty.
    pub fn position(&self) -> i64 {
        self.cursor.map_or(-1, |c| c as i64)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Catalog index under the cursor.
    pub fn current(&self) -> Option<usize> {
        self.cursor.map(|c| self.entries[c])
    }

    pub fn at_tip(&self) -> bool {
        match self.cursor {
            None => true,
            Some(c) => c + 1 == self.entries.len(),
        }
    }

    pub fn can_retreat(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn plan_advance<R: Rng + ?Sized>(&self, catalog_size: usize, rng: &mut R) -> Result<Step> {
        if catalog_size == 0 {
            return Err(ShuffleError::EmptyCatalog);
        }
        if let Some(c) = self.cursor {
            if c + 1 < self.entries.len() {
                return Ok(Step::Replay {
                    position: c + 1,
                    index: self.entries[c + 1],
                });
            }
        }
        Ok(Step::Draw {
            index: rng.gen_range(0..catalog_size),
        })
    }

    /// Commit a planned step; returns the now-current catalog index.
    pub fn apply(&mut self, step: Step) -> usize {
        match step {
            Step::Replay { position, index } => {
                self.cursor = Some(position);
                index
            }
            Step::Draw { index } => {
                let keep = self.cursor.map_or(0, |c| c + 1);
                self.entries.truncate(keep);
                self.entries.push(index);
                self.cursor = Some(self.entries.len() - 1);
                index
            }
        }
    }

    /// Step forward: replay the next entry, or draw a new one at the tip.
    pub fn advance_with<R: Rng + ?Sized>(&mut self, catalog_size: usize, rng: &mut R) -> Result<usize> {
        let step = self.plan_advance(catalog_size, rng)?;
        Ok(self.apply(step))
    }

    pub fn advance(&mut self, catalog_size: usize) -> Result<usize> {
        self.advance_with(catalog_size, &mut rand::thread_rng())
    }

    /// Cursor position after a retreat, or `None` when already at the start.
    pub fn plan_retreat(&self) -> Option<usize> {
        match self.cursor {
            Some(c) if c > 0 => Some(c - 1),
            _ => None,
        }
    }

    /// Step back one entry.  At the start (or when empty) this is a no-op
    /// returning the current index.
    pub fn retreat(&mut self) -> Option<usize> {
        if let Some(position) = self.plan_retreat() {
            self.cursor = Some(position);
        }
        self.current()
    }

    pub(crate) fn set_cursor(&mut self, position: usize) {
        debug_assert!(position < self.entries.len());
        self.cursor = Some(position);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Drop entries that no longer index into a catalog of `catalog_size`.
    pub fn reconcile(&mut self, catalog_size: usize) {
        let entries: Vec<i64> = self.entries.iter().map(|&e| e as i64).collect();
        *self = Self::restore(&entries, self.position(), catalog_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn history(entries: &[usize], cursor: usize) -> ShuffleHistory {
        ShuffleHistory {
            entries: entries.to_vec(),
            cursor: Some(cursor),
        }
    }

    #[test]
    fn test_advance_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [1usize, 2, 5, 97] {
            let mut h = ShuffleHistory::new();
            for _ in 0..n {
                let idx = h.advance_with(n, &mut rng).unwrap();
                assert!(idx < n);
            }
            assert_eq!(h.len(), n);
            assert_eq!(h.position(), n as i64 - 1);
        }
    }

    #[test]
    fn test_advance_empty_catalog_fails() {
        let mut h = ShuffleHistory::new();
        assert!(matches!(h.advance(0), Err(ShuffleError::EmptyCatalog)));
        assert!(h.is_empty());
        assert_eq!(h.position(), -1);
    }

    #[test]
    fn test_fresh_history_retreat_is_noop() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut h = ShuffleHistory::new();
        let i0 = h.advance_with(5, &mut rng).unwrap();
        assert_eq!(h.entries(), &[i0]);
        assert_eq!(h.position(), 0);

        assert_eq!(h.retreat(), Some(i0));
        assert_eq!(h.position(), 0);

        let i1 = h.advance_with(5, &mut rng).unwrap();
        assert_eq!(h.entries(), &[i0, i1]);
        assert_eq!(h.position(), 1);
    }

    #[test]
    fn test_retreat_then_replay() {
        let mut h = history(&[2, 4, 1], 2);
        assert_eq!(h.retreat(), Some(4));
        assert_eq!(h.retreat(), Some(2));
        assert_eq!(h.position(), 0);

        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(h.advance_with(10, &mut rng).unwrap(), 4);
        assert_eq!(h.position(), 1);
        assert_eq!(h.entries(), &[2, 4, 1]);
    }

    #[test]
    fn test_branch_truncates_after_cursor() {
        let mut h = history(&[2, 4, 1, 3], 1);
        let step = Step::Draw { index: 0 };
        assert_eq!(h.apply(step), 0);
        assert_eq!(h.entries(), &[2, 4, 0]);
        assert_eq!(h.position(), 2);
    }

    #[test]
    fn test_advance_from_middle_replays_before_drawing() {
        let mut h = history(&[2, 4, 1], 1);
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(h.advance_with(8, &mut rng).unwrap(), 1);
        assert_eq!(h.position(), 2);

        let drawn = h.advance_with(8, &mut rng).unwrap();
        assert!(drawn < 8);
        assert_eq!(&h.entries()[..3], &[2, 4, 1]);
        assert_eq!(h.len(), 4);
        assert_eq!(h.position(), 3);
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let h = history(&[2, 4, 1], 2);
        let mut rng = StdRng::seed_from_u64(5);
        let before = h.clone();
        let _ = h.plan_advance(6, &mut rng).unwrap();
        assert_eq!(h.plan_retreat(), Some(1));
        assert_eq!(h, before);
    }

    #[test]
    fn test_reset() {
        let mut h = history(&[1, 2], 1);
        h.reset();
        assert!(h.is_empty());
        assert_eq!(h.position(), -1);
        assert_eq!(h.current(), None);
    }

    #[test]
    fn test_reconcile_drops_out_of_range() {
        let mut h = history(&[2, 9, 4, 7, 1], 4);
        h.reconcile(5);
        assert_eq!(h.entries(), &[2, 4, 1]);
        assert_eq!(h.position(), 2);
        assert_eq!(h.current(), Some(1));
    }

    #[test]
    fn test_reconcile_keeps_cursor_on_surviving_entry() {
        // cursor sat on 4; the 9 before it disappears
        let mut h = history(&[2, 9, 4, 3], 2);
        h.reconcile(5);
        assert_eq!(h.entries(), &[2, 4, 3]);
        assert_eq!(h.current(), Some(4));
    }

    #[test]
    fn test_reconcile_to_empty() {
        let mut h = history(&[8, 9], 1);
        h.reconcile(3);
        assert!(h.is_empty());
        assert_eq!(h.position(), -1);
    }

    #[test]
    fn test_restore_clamps_position() {
        let h = ShuffleHistory::restore(&[0, 1, 2], 10, 3);
        assert_eq!(h.position(), 2);

        let h = ShuffleHistory::restore(&[0, 1, 2], -1, 3);
        assert_eq!(h.position(), 0);

        let h = ShuffleHistory::restore(&[-3, 1], 1, 3);
        assert_eq!(h.entries(), &[1]);
        assert_eq!(h.position(), 0);
    }
}

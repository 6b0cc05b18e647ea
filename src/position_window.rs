//! The sliding cardinality position window shared by the
//! intersect-within-range posting join (spec §4.2) and the proximity
//! weighting context (spec §4.3): given up to `MaxNofArguments` position
//! streams, find spans of length `<= range` containing at least
//! `cardinality` distinct streams. Grounded in
//! `original_source/src/queryproc/utils/positionWindow.hpp`.

use std::collections::HashMap;

/// Bitset width backing the proximity context's per-node `touched` field;
/// bounds how many feature iterators a single query may combine.
pub const MAX_NOF_ARGUMENTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Smallest span covering `>= cardinality` distinct members.
    MinWin,
    /// Largest span `<= range` covering `>= cardinality` distinct members.
    MaxWin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMatch {
    pub start: u32,
    pub end: u32,
    pub members: Vec<usize>,
}

impl WindowMatch {
    pub fn span(&self) -> u32 {
        self.end - self.start
    }
}

/// Scans the union of every child's positions for windows of span
/// `<= range` touching at least `cardinality` distinct children.
/// `children_positions[i]` must already be sorted ascending.
pub fn scan_cardinality_windows(
    children_positions: &[Vec<u32>],
    range: u32,
    cardinality: usize,
    mode: WindowMode,
) -> Vec<WindowMatch> {
    if children_positions.is_empty() || cardinality == 0 {
        return Vec::new();
    }

    let mut events: Vec<(u32, usize)> = Vec::new();
    for (idx, positions) in children_positions.iter().enumerate() {
        for &pos in positions {
            events.push((pos, idx));
        }
    }
    events.sort_unstable();

    let mut matches = Vec::new();
    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut left = 0usize;

    for right in 0..events.len() {
        *counts.entry(events[right].1).or_insert(0) += 1;

        while events[right].0 - events[left].0 > range {
            let entry = counts.get_mut(&events[left].1).expect("left member counted");
            *entry -= 1;
            if *entry == 0 {
                counts.remove(&events[left].1);
            }
            left += 1;
        }

        if counts.len() < cardinality {
            continue;
        }

        let mut window_left = left;
        if mode == WindowMode::MinWin {
            // Shrink further from the left while cardinality still holds,
            // to report the tightest span ending at `right`.
            let mut shrink_counts = counts.clone();
            while window_left + 1 <= right {
                let candidate = events[window_left].1;
                let count = *shrink_counts.get(&candidate).unwrap_or(&0);
                if count > 1 {
                    *shrink_counts.get_mut(&candidate).unwrap() -= 1;
                    window_left += 1;
                } else {
                    break;
                }
            }
        }

        let members: Vec<usize> = events[window_left..=right]
            .iter()
            .map(|(_, idx)| *idx)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        matches.push(WindowMatch {
            start: events[window_left].0,
            end: events[right].0,
            members,
        });
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_window_meeting_cardinality() {
        let children = vec![vec![10, 50], vec![12, 60], vec![100]];
        let matches = scan_cardinality_windows(&children, 5, 2, WindowMode::MaxWin);
        assert!(matches.iter().any(|m| m.start == 10 && m.end == 12));
    }

    #[test]
    fn empty_input_yields_no_matches() {
        let matches = scan_cardinality_windows(&[], 5, 1, WindowMode::MinWin);
        assert!(matches.is_empty());
    }

    #[test]
    fn cardinality_above_member_count_yields_nothing() {
        let children = vec![vec![1, 2]];
        let matches = scan_cardinality_windows(&children, 10, 2, WindowMode::MaxWin);
        assert!(matches.is_empty());
    }
}

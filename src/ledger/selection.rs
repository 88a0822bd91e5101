// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deterministic coin selection.
//!
//! Policy: candidates are sorted ascending by `(value, id)` and accumulated
//! until the target is covered, then the accumulated set is pruned
//! front-to-back, dropping every unit the remainder still covers without.
//! The result is the smallest covering set that prefers the smallest
//! denominations, and it is fully determined by the candidate set and
//! target.
//!
//! Example: candidates `[100, 50, 10]`: target 60 selects `{10, 50}`,
//! target 100 selects `{100}`, target 150 selects `{50, 100}`.

/// A selectable unit: identifier and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub value: u64,
}

/// Select units covering `target` from `candidates`.
///
/// Returns the ids of the chosen units, or `None` when the candidates cannot
/// cover the target. A zero target selects nothing.
pub fn select_covering(candidates: &[Candidate], target: u64) -> Option<Vec<String>> {
    if target == 0 {
        return Some(Vec::new());
    }

    let mut sorted: Vec<&Candidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| a.id.cmp(&b.id)));

    let mut selected: Vec<&Candidate> = Vec::new();
    let mut covered: u64 = 0;
    for candidate in sorted {
        selected.push(candidate);
        covered += candidate.value;
        if covered >= target {
            break;
        }
    }

    if covered < target {
        return None;
    }

    // Prune smallest-first: a unit is redundant when the rest still cover.
    let mut index = 0;
    while index < selected.len() {
        let without = covered - selected[index].value;
        if without >= target {
            covered = without;
            selected.remove(index);
        } else {
            index += 1;
        }
    }

    Some(selected.into_iter().map(|c| c.id.clone()).collect())
}

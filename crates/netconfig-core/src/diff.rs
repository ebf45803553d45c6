//! Line-based configuration diffs.

use std::collections::{HashMap, HashSet};

/// Compute a line diff from `running` to `candidate`.
///
/// Unchanged lines are prefixed with two spaces, removed lines with `- `,
/// added lines with `+ `. Identical inputs produce an empty string.
///
/// The common prefix and suffix are emitted directly; the middle is aligned
/// with Hirschberg's algorithm, so memory stays linear in the input size.
pub fn line_diff(running: &str, candidate: &str) -> String {
    let old: Vec<&str> = running.lines().collect();
    let new: Vec<&str> = candidate.lines().collect();
    if old == new {
        return String::new();
    }

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    // Intern lines so the alignment compares integers.
    let mut ids = HashMap::new();
    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    let a = intern(&mut ids, old_mid);
    let b = intern(&mut ids, new_mid);

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    out.extend(old[..prefix].iter().map(|l| format!("  {l}")));
    let mut edits = Vec::with_capacity(a.len() + b.len());
    let shared: HashSet<usize> = a.iter().copied().collect();
    if b.iter().any(|id| shared.contains(id)) {
        align(&a, &b, 0, 0, &mut edits);
    } else {
        edits.extend((0..a.len()).map(Edit::Remove));
        edits.extend((0..b.len()).map(Edit::Add));
    }
    for edit in edits {
        out.push(match edit {
            Edit::Keep(i) => format!("  {}", old_mid[i]),
            Edit::Remove(i) => format!("- {}", old_mid[i]),
            Edit::Add(j) => format!("+ {}", new_mid[j]),
        });
    }
    out.extend(old[old.len() - suffix..].iter().map(|l| format!("  {l}")));
    out.join("\n")
}

fn intern<'t>(ids: &mut HashMap<&'t str, usize>, lines: &[&'t str]) -> Vec<usize> {
    lines
        .iter()
        .map(|&line| {
            let next = ids.len();
            *ids.entry(line).or_insert(next)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Edit {
    Keep(usize),
    Remove(usize),
    Add(usize),
}

/// Hirschberg alignment of `a` against `b`; indices in `out` are offset by
/// `ai` and `bi`.
fn align(a: &[usize], b: &[usize], ai: usize, bi: usize, out: &mut Vec<Edit>) {
    if a.is_empty() {
        out.extend((0..b.len()).map(|j| Edit::Add(bi + j)));
        return;
    }
    if b.is_empty() {
        out.extend((0..a.len()).map(|i| Edit::Remove(ai + i)));
        return;
    }
    if a.len() == 1 {
        match b.iter().position(|&x| x == a[0]) {
            Some(j) => {
                out.extend((0..j).map(|k| Edit::Add(bi + k)));
                out.push(Edit::Keep(ai));
                out.extend((j + 1..b.len()).map(|k| Edit::Add(bi + k)));
            }
            None => {
                out.push(Edit::Remove(ai));
                out.extend((0..b.len()).map(|k| Edit::Add(bi + k)));
            }
        }
        return;
    }

    let mid = a.len() / 2;
    let forward = lcs_row(a[..mid].iter(), b.iter(), b.len());
    let backward = lcs_row(a[mid..].iter().rev(), b.iter().rev(), b.len());
    let split = (0..=b.len())
        .max_by_key(|&k| (forward[k] + backward[b.len() - k], std::cmp::Reverse(k)))
        .unwrap_or(0);

    align(&a[..mid], &b[..split], ai, bi, out);
    align(&a[mid..], &b[split..], ai + mid, bi + split, out);
}

/// Last row of the LCS length table of `a` against every prefix of `b`.
fn lcs_row<'x>(
    a: impl Iterator<Item = &'x usize>,
    b: impl Iterator<Item = &'x usize> + Clone,
    b_len: usize,
) -> Vec<usize> {
    let mut row = vec![0usize; b_len + 1];
    for x in a {
        let mut diag = 0;
        for (j, y) in b.clone().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if x == y { diag + 1 } else { above.max(row[j]) };
            diag = above;
        }
    }
    row
}

/// Merge `incoming` into `running`: lines not already present are appended.
pub fn merge_lines(running: &str, incoming: &str) -> String {
    let mut merged: Vec<&str> = running.lines().collect();
    let mut seen: HashSet<&str> = merged.iter().copied().collect();
    for line in incoming.lines() {
        if seen.insert(line) {
            merged.push(line);
        }
    }
    let mut text = merged.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

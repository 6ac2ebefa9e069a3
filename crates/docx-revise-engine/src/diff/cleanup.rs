//! Post-processing of raw diff scripts.
//!
//! These follow the cleanup passes of diff-match-patch: [`merge`] normalizes
//! a script, [`semantic`] removes coincidental short equalities and then calls
//! [`semantic_lossless`], which slides each lone edit sideways until its edges
//! sit on word, whitespace or line boundaries.

use super::DiffOp;

/// Byte length of the common prefix, on a char boundary.
pub(crate) fn common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

/// Byte length of the common suffix, on a char boundary.
pub(crate) fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

/// Byte length of the longest suffix of `a` that is a prefix of `b`.
fn common_overlap(a: &str, b: &str) -> usize {
    let limit = a.len().min(b.len());
    b.char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= limit)
        .filter(|&end| a.ends_with(&b[..end]))
        .last()
        .unwrap_or(0)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_equal(ops: &mut Vec<DiffOp>, text: &str) {
    if text.is_empty() {
        return;
    }
    match ops.last_mut() {
        Some(DiffOp::Equal(prev)) => prev.push_str(text),
        _ => ops.push(DiffOp::Equal(text.to_string())),
    }
}

/// Join neighbours of the same kind and drop empty ops.
fn coalesce(ops: &mut Vec<DiffOp>) {
    let mut out: Vec<DiffOp> = Vec::with_capacity(ops.len());
    for op in ops.drain(..) {
        if op.text().is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if std::mem::discriminant(last) == std::mem::discriminant(&op) => {
                last.text_mut().push_str(op.text())
            }
            _ => out.push(op),
        }
    }
    *ops = out;
}

/// Normalize a script: every stretch of edits between two equalities
/// becomes at most one delete followed by one insert, with any common
/// prefix or suffix moved out into the surrounding equalities. Lone edits
/// that can swallow a neighbouring equality by sliding are slid, and the
/// whole pass repeats until nothing moves.
pub fn merge(ops: &mut Vec<DiffOp>) {
    loop {
        let mut out: Vec<DiffOp> = Vec::with_capacity(ops.len());
        let mut deleted = String::new();
        let mut inserted = String::new();

        for op in ops.drain(..).chain(std::iter::once(DiffOp::Equal(String::new()))) {
            match op {
                DiffOp::Delete(t) => deleted.push_str(&t),
                DiffOp::Insert(t) => inserted.push_str(&t),
                DiffOp::Equal(t) => {
                    let mut tail = t;
                    if !deleted.is_empty() && !inserted.is_empty() {
                        let prefix = common_prefix(&deleted, &inserted);
                        if prefix > 0 {
                            push_equal(&mut out, &deleted[..prefix]);
                            deleted.drain(..prefix);
                            inserted.drain(..prefix);
                        }
                        let suffix = common_suffix(&deleted, &inserted);
                        if suffix > 0 {
                            tail.insert_str(0, &deleted[deleted.len() - suffix..]);
                            deleted.truncate(deleted.len() - suffix);
                            inserted.truncate(inserted.len() - suffix);
                        }
                    }
                    if !deleted.is_empty() {
                        out.push(DiffOp::Delete(std::mem::take(&mut deleted)));
                    }
                    if !inserted.is_empty() {
                        out.push(DiffOp::Insert(std::mem::take(&mut inserted)));
                    }
                    push_equal(&mut out, &tail);
                }
            }
        }

        *ops = out;
        if !shift_lone_edits(ops) {
            break;
        }
    }
}

/// `A<ins>BA</ins>C` becomes `<ins>AB</ins>AC`, and `A<ins>CB</ins>C`
/// becomes `AC<ins>BC</ins>`. Returns whether anything moved.
fn shift_lone_edits(ops: &mut Vec<DiffOp>) -> bool {
    let mut changed = false;
    let mut i = 1;
    while i + 1 < ops.len() {
        if let (DiffOp::Equal(prev), DiffOp::Equal(next)) = (&ops[i - 1], &ops[i + 1]) {
            let text = ops[i].text();
            if !prev.is_empty() && text.ends_with(prev.as_str()) {
                let moved = format!("{prev}{}", &text[..text.len() - prev.len()]);
                let next = format!("{prev}{next}");
                ops[i] = ops[i].with_text(moved);
                ops[i + 1] = DiffOp::Equal(next);
                ops.remove(i - 1);
                changed = true;
            } else if !next.is_empty() && text.starts_with(next.as_str()) {
                let prev = format!("{prev}{next}");
                let moved = format!("{}{next}", &text[next.len()..]);
                ops[i - 1] = DiffOp::Equal(prev);
                ops[i] = ops[i].with_text(moved);
                ops.remove(i + 1);
                changed = true;
            }
        }
        i += 1;
    }
    changed
}

/// Remove equalities that are no longer than the edits on either side of
/// them, then align edges ([`semantic_lossless`]) and pull shared text out
/// of overlapping delete/insert pairs.
pub fn semantic(ops: &mut Vec<DiffOp>) {
    let mut changed = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<String> = None;
    // edit lengths before and after the last equality
    let (mut ins_before, mut del_before) = (0usize, 0usize);
    let (mut ins_after, mut del_after) = (0usize, 0usize);

    let mut pointer = 0usize;
    while pointer < ops.len() {
        if let DiffOp::Equal(text) = &ops[pointer] {
            equalities.push(pointer);
            ins_before = ins_after;
            del_before = del_after;
            ins_after = 0;
            del_after = 0;
            last_equality = Some(text.clone());
            pointer += 1;
            continue;
        }

        let len = char_len(ops[pointer].text());
        if matches!(ops[pointer], DiffOp::Insert(_)) {
            ins_after += len;
        } else {
            del_after += len;
        }
        let eliminate = last_equality.as_ref().is_some_and(|eq| {
            let len = char_len(eq);
            len > 0 && len <= ins_before.max(del_before) && len <= ins_after.max(del_after)
        });
        if eliminate && let Some(at) = equalities.pop() {
            let text = ops[at].text().to_string();
            ops[at] = DiffOp::Insert(text.clone());
            ops.insert(at, DiffOp::Delete(text));
            // the equality before it has to be looked at again
            equalities.pop();
            pointer = equalities.last().map(|&i| i + 1).unwrap_or(0);
            ins_before = 0;
            del_before = 0;
            ins_after = 0;
            del_after = 0;
            last_equality = None;
            changed = true;
        } else {
            pointer += 1;
        }
    }

    if changed {
        merge(ops);
    }
    if semantic_lossless(ops) {
        coalesce(ops);
    }
    extract_overlaps(ops);
}

/// Where a delete is followed by an insert and one ends with what the other
/// starts with, and the overlap is at least half of either, turn the overlap
/// into an equality.
fn extract_overlaps(ops: &mut Vec<DiffOp>) {
    let mut pointer = 1;
    while pointer < ops.len() {
        if let (DiffOp::Delete(deletion), DiffOp::Insert(insertion)) =
            (&ops[pointer - 1], &ops[pointer])
        {
            let (deletion, insertion) = (deletion.clone(), insertion.clone());
            let forward = common_overlap(&deletion, &insertion);
            let backward = common_overlap(&insertion, &deletion);
            let del_len = char_len(&deletion);
            let ins_len = char_len(&insertion);

            if forward >= backward {
                let overlap = char_len(&insertion[..forward]);
                if forward > 0 && (2 * overlap >= del_len || 2 * overlap >= ins_len) {
                    ops[pointer - 1] = DiffOp::Delete(deletion[..deletion.len() - forward].to_string());
                    ops[pointer] = DiffOp::Insert(insertion[forward..].to_string());
                    ops.insert(pointer, DiffOp::Equal(insertion[..forward].to_string()));
                    pointer += 1;
                }
            } else {
                let overlap = char_len(&deletion[..backward]);
                if 2 * overlap >= del_len || 2 * overlap >= ins_len {
                    ops[pointer - 1] = DiffOp::Insert(insertion[..insertion.len() - backward].to_string());
                    ops[pointer] = DiffOp::Delete(deletion[backward..].to_string());
                    ops.insert(pointer, DiffOp::Equal(deletion[..backward].to_string()));
                    pointer += 1;
                }
            }
            pointer += 1;
        }
        pointer += 1;
    }
    ops.retain(|op| !op.text().is_empty());
}

/// How good a place the boundary between `one` and `two` is for the edge of
/// an edit. 6 is best (an end of the text), 0 is mid-word.
fn boundary_score(one: &str, two: &str) -> u8 {
    let (Some(c1), Some(c2)) = (one.chars().last(), two.chars().next()) else {
        return 6;
    };
    let non_alnum1 = !c1.is_alphanumeric();
    let non_alnum2 = !c2.is_alphanumeric();
    let space1 = non_alnum1 && c1.is_whitespace();
    let space2 = non_alnum2 && c2.is_whitespace();
    let break1 = space1 && (c1 == '\n' || c1 == '\r');
    let break2 = space2 && (c2 == '\n' || c2 == '\r');
    let blank1 = break1 && (one.ends_with("\n\n") || one.ends_with("\n\r\n"));
    let blank2 = break2
        && (two.starts_with("\n\n")
            || two.starts_with("\r\n\n")
            || two.starts_with("\n\r\n")
            || two.starts_with("\r\n\r\n"));

    if blank1 || blank2 {
        5
    } else if break1 || break2 {
        4
    } else if non_alnum1 && !space1 && space2 {
        3
    } else if space1 || space2 {
        2
    } else if non_alnum1 || non_alnum2 {
        1
    } else {
        0
    }
}

/// Slide every edit that sits alone between two equalities to the position
/// with the best [`boundary_score`]. Returns whether anything moved.
pub fn semantic_lossless(ops: &mut Vec<DiffOp>) -> bool {
    let mut changed = false;
    let mut pointer = 1;
    while pointer + 1 < ops.len() {
        let (DiffOp::Equal(before), DiffOp::Equal(after)) = (&ops[pointer - 1], &ops[pointer + 1])
        else {
            pointer += 1;
            continue;
        };
        let mut eq1 = before.clone();
        let mut edit = ops[pointer].text().to_string();
        let mut eq2 = after.clone();

        // shift as far left as possible first
        let shift = common_suffix(&eq1, &edit);
        if shift > 0 {
            let common = edit[edit.len() - shift..].to_string();
            eq1.truncate(eq1.len() - shift);
            edit = format!("{common}{}", &edit[..edit.len() - shift]);
            eq2 = format!("{common}{eq2}");
        }

        let mut best = (eq1.clone(), edit.clone(), eq2.clone());
        let mut best_score = boundary_score(&eq1, &edit) + boundary_score(&edit, &eq2);
        while let (Some(a), Some(b)) = (edit.chars().next(), eq2.chars().next()) {
            if a != b {
                break;
            }
            eq1.push(a);
            edit = format!("{}{a}", &edit[a.len_utf8()..]);
            eq2.drain(..a.len_utf8());
            let score = boundary_score(&eq1, &edit) + boundary_score(&edit, &eq2);
            // >= prefers the rightmost of equally good positions
            if score >= best_score {
                best_score = score;
                best = (eq1.clone(), edit.clone(), eq2.clone());
            }
        }

        let (best_eq1, best_edit, best_eq2) = best;
        if ops[pointer - 1].text() != best_eq1 {
            changed = true;
            ops[pointer] = ops[pointer].with_text(best_edit);
            if best_eq2.is_empty() {
                ops.remove(pointer + 1);
            } else {
                ops[pointer + 1] = DiffOp::Equal(best_eq2);
            }
            if best_eq1.is_empty() {
                ops.remove(pointer - 1);
                pointer -= 1;
            } else {
                ops[pointer - 1] = DiffOp::Equal(best_eq1);
            }
        }
        pointer += 1;
    }
    changed
}

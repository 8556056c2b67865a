use std::cmp::min;

use crate::cond::CondKey;
use crate::key::Key;

/// A piece of the key axis produced by [`range_pairs`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RangePair {
    InFirst { index: usize, low: Key, high: Key },
    InSecond { index: usize, low: Key, high: Key },
    Overlap { first: usize, second: usize, low: Key, high: Key },
}

/// Walks two sorted, non-overlapping range lists together and splits them
/// into pieces covered by only one list or by both.
///
/// Pieces come out in key order and never straddle a range boundary of
/// either list.
pub(crate) fn range_pairs(first: &[(Key, Key)], second: &[(Key, Key)]) -> Vec<RangePair> {
    let mut res = Vec::with_capacity(first.len() + second.len());
    let (mut i, mut j) = (0, 0);
    let mut cur1 = first.first().copied();
    let mut cur2 = second.first().copied();

    loop {
        match (cur1, cur2) {
            (None, None) => break,
            (Some((low, high)), None) => {
                res.push(RangePair::InFirst { index: i, low, high });
                i += 1;
                cur1 = first.get(i).copied();
            }
            (None, Some((low, high))) => {
                res.push(RangePair::InSecond { index: j, low, high });
                j += 1;
                cur2 = second.get(j).copied();
            }
            (Some((l1, h1)), Some((l2, h2))) => {
                if h1 < l2 {
                    res.push(RangePair::InFirst { index: i, low: l1, high: h1 });
                    i += 1;
                    cur1 = first.get(i).copied();
                } else if h2 < l1 {
                    res.push(RangePair::InSecond { index: j, low: l2, high: h2 });
                    j += 1;
                    cur2 = second.get(j).copied();
                } else if l1 < l2 {
                    res.push(RangePair::InFirst { index: i, low: l1, high: l2.dec() });
                    cur1 = Some((l2, h1));
                } else if l2 < l1 {
                    res.push(RangePair::InSecond { index: j, low: l2, high: l1.dec() });
                    cur2 = Some((l1, h2));
                } else {
                    let high = min(h1, h2);
                    res.push(RangePair::Overlap { first: i, second: j, low: l1, high });
                    if h1 == high {
                        i += 1;
                        cur1 = first.get(i).copied();
                    } else {
                        cur1 = Some((high.inc(), h1));
                    }
                    if h2 == high {
                        j += 1;
                        cur2 = second.get(j).copied();
                    } else {
                        cur2 = Some((high.inc(), h2));
                    }
                }
            }
        }
    }
    res
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ValPair {
    InFirst(usize),
    InSecond(usize),
    Both(usize, usize),
}

/// Merges two sorted condition key lists.
pub(crate) fn val_pairs(first: &[CondKey], second: &[CondKey]) -> Vec<ValPair> {
    let mut res = Vec::with_capacity(first.len().max(second.len()));
    let (mut i, mut j) = (0, 0);
    while i < first.len() || j < second.len() {
        if j == second.len() || (i < first.len() && first[i] < second[j]) {
            res.push(ValPair::InFirst(i));
            i += 1;
        } else if i == first.len() || second[j] < first[i] {
            res.push(ValPair::InSecond(j));
            j += 1;
        } else {
            res.push(ValPair::Both(i, j));
            i += 1;
            j += 1;
        }
    }
    res
}

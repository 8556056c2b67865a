// mutable utils (mutils)

pub enum IndexTwice<T> {
    Both(T, T),
    One(T),
    None,
}

/// Borrows two elements of the same slice mutably.
pub fn index_twice<T>(slc: &mut [T], a: usize, b: usize) -> IndexTwice<&mut T> {
    if a == b {
        slc.get_mut(a).map_or(IndexTwice::None, IndexTwice::One)
    } else if a >= slc.len() || b >= slc.len() {
        IndexTwice::None
    } else if a < b {
        let (low, high) = slc.split_at_mut(b);
        IndexTwice::Both(&mut low[a], &mut high[0])
    } else {
        let (low, high) = slc.split_at_mut(a);
        IndexTwice::Both(&mut high[0], &mut low[b])
    }
}

//! Helpers for flat `x, y, x, y, ...` coordinate lists, as produced by
//! pattern loaders and by `LifeGen::list_cells_with_mode`.

/// `(min_x, min_y, max_x, max_y)` of the pairs, or `None` for an empty list.
/// A trailing unpaired value is ignored.
pub fn coords_bounds(coords: &[i64]) -> Option<(i64, i64, i64, i64)> {
    let mut pairs = coords.chunks_exact(2);
    let first = pairs.next()?;
    let mut b = (first[0], first[1], first[0], first[1]);
    for pair in pairs {
        b.0 = b.0.min(pair[0]);
        b.1 = b.1.min(pair[1]);
        b.2 = b.2.max(pair[0]);
        b.3 = b.3.max(pair[1]);
    }
    Some(b)
}

/// Shift the pairs so the smallest x and the smallest y become 0.
pub fn normalise_coords(coords: &[i64]) -> Vec<i64> {
    let Some((min_x, min_y, _, _)) = coords_bounds(coords) else {
        return Vec::new();
    };
    coords
        .chunks_exact(2)
        .flat_map(|pair| [pair[0] - min_x, pair[1] - min_y])
        .collect()
}

/// Offset from a pattern's origin to its centre cell (rounded down).
///
/// Subtract it from a target cell to paste the pattern centred there.
pub fn coords_centre(coords: &[i64]) -> (i64, i64) {
    match coords_bounds(coords) {
        Some((min_x, min_y, max_x, max_y)) => (
            min_x + (max_x - min_x) / 2,
            min_y + (max_y - min_y) / 2,
        ),
        None => (0, 0),
    }
}

//! Circular sound range test on the horizontal (x, z) plane

/// Check whether (px, pz) lies within `radius` of (cx, cz).
///
/// Compares squared distances, so the boundary itself counts as inside and a
/// zero radius only admits the exact center.
pub fn is_within_range(px: f64, pz: f64, cx: f64, cz: f64, radius: f64) -> bool {
    let dx = px - cx;
    let dz = pz - cz;
    dx * dx + dz * dz <= radius * radius
}

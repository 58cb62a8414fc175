//! Direction helpers with explicit fallbacks for degenerate input.

use nalgebra::Vector3;

/// Length below which a vector is treated as zero.
pub const DIRECTION_EPSILON: f64 = 1e-9;

/// Normalize `v`, or return `fallback` if `v` is (nearly) zero or not finite.
#[must_use]
pub fn normalize_or(v: &Vector3<f64>, fallback: Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > DIRECTION_EPSILON && norm.is_finite() {
        v / norm
    } else {
        fallback
    }
}

/// Two unit vectors completing `axis` to a right-handed orthonormal basis.
///
/// `axis` is normalized first (falling back to +Z). The reference vector is
/// world X unless `axis` is nearly parallel to it, in which case world Y.
#[must_use]
pub fn orthonormal_basis(axis: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let n = normalize_or(axis, Vector3::z());
    let reference = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let p = normalize_or(&n.cross(&reference), Vector3::y());
    let q = n.cross(&p);
    (p, q)
}

/// Component of `v` perpendicular to unit `axis`, normalized.
///
/// Falls back to the first vector of [`orthonormal_basis`] when `v` is
/// parallel to `axis`.
#[must_use]
pub fn perpendicular_component(v: &Vector3<f64>, axis: &Vector3<f64>) -> Vector3<f64> {
    let projected = v - axis * axis.dot(v);
    normalize_or(&projected, orthonormal_basis(axis).0)
}

/// Signed angle from `from` to `to` about `axis`, in `[-π, π]`.
///
/// Both vectors are projected onto the plane perpendicular to `axis`. The
/// magnitude is `acos` of their dot product (clamped to `[-1, 1]`) and the
/// sign is that of `axis · (from × to)`.
#[must_use]
pub fn signed_angle(axis: &Vector3<f64>, from: &Vector3<f64>, to: &Vector3<f64>) -> f64 {
    let n = normalize_or(axis, Vector3::z());
    let t1 = perpendicular_component(from, &n);
    let t2 = perpendicular_component(to, &n);
    let magnitude = t1.dot(&t2).clamp(-1.0, 1.0).acos();
    if n.dot(&t1.cross(&t2)) < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

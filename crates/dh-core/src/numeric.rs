/// Floating point type used throughout the analysis
pub type Real = f64;

/// Why a value cannot serve as a tolerance, if it cannot.
///
/// Zero is accepted: it means "exact" for every check that takes a tolerance.
pub fn tolerance_defect(v: Real) -> Option<&'static str> {
    if !v.is_finite() {
        Some("must be finite")
    } else if v < 0.0 {
        Some("must be non-negative")
    } else {
        None
    }
}

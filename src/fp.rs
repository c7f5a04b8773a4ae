//! Provides floating point utilities.

/// MACHINE_EPSILON is the numerical analysis definition of machine epsilon,
/// where it is interchangeble with unit roundoff. In Rust the built-in
/// EPSILON constant is the difference between 1 and the next larger floating
/// point number, i.e. twice the unit roundoff.
///
/// See https://en.wikipedia.org/wiki/Machine_epsilon and
/// http://www.pbr-book.org/3ed-2018/Shapes/Managing_Rounding_Error.html#x1-ArithmeticOperations.
pub const MACHINE_EPSILON: f32 = f32::EPSILON * 0.5_f32;

/// gamma_eb computes a tight bound for products of (1 +/- machine epislon)
/// error terms. See http://www.pbr-book.org/3ed-2018/Shapes/Managing_Rounding_Error.html#x1-ErrorPropagation.
pub const fn gamma_eb(n: i32) -> f32 {
  let n = n as f32;
  (n * MACHINE_EPSILON) / (1_f32 - n * MACHINE_EPSILON)
}

/// Near distance of rays that continue a path from a surface.
pub const RAY_EPSILON: f32 = 1e-4;

/// Per-component threshold below which a vector counts as degenerate.
pub const NEAR_ZERO: f32 = 1e-8;

/// Determinants smaller than this make a ray parallel to a triangle.
pub const PARALLEL_EPSILON: f32 = 1e-12;

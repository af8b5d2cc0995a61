//! Shared test utilities for domain testing
//!
//! - `TestDatabase`: PostgreSQL + pgvector container with automatic cleanup (feature: "postgres")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let image_name = builder.name("upload", "jpg");
//!     let embedding = builder.vector(1408, 0);
//! }
//! ```

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

use rand::SeedableRng;
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded random data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_nearest_neighbors");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a unique name for testing
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.name("upload", "main"), "test-upload-7-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Pseudo-random vector with components in [-1, 1)
    ///
    /// The same seed and `salt` always produce the same vector.
    pub fn vector(&self, dimension: usize, salt: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ salt);
        let range = Uniform::new(-1.0_f32, 1.0).expect("valid component range");
        range.sample_iter(&mut rng).take(dimension).collect()
    }

    /// Vector that is zero except for `value` at `axis`
    pub fn axis_vector(dimension: usize, axis: usize, value: f32) -> Vec<f32> {
        let mut values = vec![0.0; dimension];
        values[axis] = value;
        values
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Assert that `values` never decrease
    pub fn assert_non_decreasing(values: &[f32], context: &str) {
        for pair in values.windows(2) {
            assert!(
                pair[0] <= pair[1],
                "{}: {} comes before smaller {} in {:?}",
                context,
                pair[0],
                pair[1],
                values
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let builder1 = TestDataBuilder::new(42);
        let builder2 = TestDataBuilder::new(42);

        assert_eq!(builder1.vector(16, 3), builder2.vector(16, 3));
        assert_eq!(builder1.name("upload", "a"), builder2.name("upload", "a"));
    }

    #[test]
    fn test_vectors_differ_by_salt_and_stay_in_range() {
        let builder = TestDataBuilder::from_test_name("my_test");
        let a = builder.vector(1408, 1);
        let b = builder.vector(1408, 2);

        assert_eq!(a.len(), 1408);
        assert_ne!(a, b);
        assert!(a.iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn test_data_builder_different_names() {
        let builder1 = TestDataBuilder::from_test_name("test1");
        let builder2 = TestDataBuilder::from_test_name("test2");

        assert_ne!(builder1.vector(8, 0), builder2.vector(8, 0));
    }

    #[test]
    fn test_axis_vector() {
        let v = TestDataBuilder::axis_vector(4, 2, 3.5);
        assert_eq!(v, vec![0.0, 0.0, 3.5, 0.0]);
    }

    #[test]
    fn test_assert_non_decreasing_accepts_ties() {
        assertions::assert_non_decreasing(&[0.0, 1.0, 1.0, 2.5], "distances");
    }
}

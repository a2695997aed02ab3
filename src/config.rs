//! Runtime configuration of an allocator instance.
//!
//! Chunk size bounds and block alignment are compile-time parameters of
//! [`Segalloc`](crate::Segalloc); the values here may differ between two
//! instances of the same type.

/// How `release` checks that a block is returned to its own size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    /// Trust the caller. A size that maps to the wrong class corrupts the
    /// free list of that class.
    #[default]
    Unchecked,
    /// Keep the class index in a tag in front of every block, and reject
    /// releases whose size maps to another class.
    SizeTag,
}

/// Configuration for the segregated allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Multiplier applied to the budget given to `seed`.
    ///
    /// Default: 2, i.e. seeding a 10MB workload preallocates up to 20MB.
    pub over_provision: usize,

    /// Release-time validation mode. Default: [`Validation::Unchecked`].
    pub validation: Validation,
}

impl Config {
    /// Default over-provisioning factor.
    pub const DEFAULT_OVER_PROVISION: usize = 2;

    /// The default configuration.
    pub const DEFAULT: Config = Config {
        over_provision: Self::DEFAULT_OVER_PROVISION,
        validation: Validation::Unchecked,
    };

    /// Set the over-provisioning factor.
    pub const fn with_over_provision(mut self, factor: usize) -> Self {
        self.over_provision = factor;
        self
    }

    /// Set the release-time validation mode.
    pub const fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_over_provisions_twice() {
        let config = Config::default();
        assert_eq!(config.over_provision, 2);
        assert_eq!(config.validation, Validation::Unchecked);
    }

    #[test]
    fn builders_override_fields() {
        let config = Config::DEFAULT
            .with_over_provision(3)
            .with_validation(Validation::SizeTag);
        assert_eq!(config.over_provision, 3);
        assert_eq!(config.validation, Validation::SizeTag);
    }
}

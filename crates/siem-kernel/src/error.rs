use thiserror::Error;

/// Errors produced by the pure core. Nothing in this crate talks to disk,
/// network, or a clock of its own, so this taxonomy is small: a directive
/// that cannot be resolved is the only failure mode.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CoreError {
    /// A `:N` back-reference was out of range while resolving `stage`'s
    /// `field`. `n` is the raw (unvalidated) reference; `stage` is the
    /// 1-based index of the rule being resolved.
    #[error("directive {directive_id} stage {stage}: back-reference :{n} in {field} is out of range (must be 1..={max})")]
    BadReference {
        directive_id: u64,
        stage: usize,
        field: &'static str,
        n: u32,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum MerkleError {
    #[error("leaf index {0} exceeds tree capacity")]
    IndexOutOfRange(u64),

    #[error("unsupported tree depth {0}")]
    UnsupportedDepth(usize),
}

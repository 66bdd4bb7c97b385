use std::fmt;

/// How a file is written to the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Buffer every chunk, then write once.
    SinglePart,
    /// Upload each chunk as one part of a multipart session.
    MultiPart,
}

impl Strategy {
    /// Picks the strategy from the declared size.
    ///
    /// Non-final multipart parts must meet the store's minimum part size,
    /// so anything below `threshold` is written in one go.
    pub fn select(declared_size: u64, threshold: u64) -> Self {
        if declared_size < threshold {
            Strategy::SinglePart
        } else {
            Strategy::MultiPart
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::SinglePart => f.write_str("single-part"),
            Strategy::MultiPart => f.write_str("multipart"),
        }
    }
}

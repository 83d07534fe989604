pub type Result<T> = std::result::Result<T, Error>;
impl<T> From<Error> for Result<T> {
    fn from(e: Error) -> Self {
        Err(e)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Invalid data, which typically includes decoding errors or unexpected internal values.
    InvalidData(String),
    /// Invalid user input, such as an out-of-range record id or a record of the wrong size.
    InvalidInput(String),
    /// An IO error has occurred.
    IO(String),
    /// An out-of-bounds access has occurred.
    OutOfBounds,
    /// The page cache has no free frame and nothing evictable; retry once pins are released.
    CacheExhausted,
    /// The operation targeted a page identity that is not resident in the cache.
    NotResident(String),
    /// The page cannot be deleted because it is still pinned.
    PagePinned(String),
}

impl std::error::Error for Error {}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::IO(msg) => write!(f, "IO error: {}", msg),
            Error::OutOfBounds => write!(f, "Out of bounds"),
            Error::CacheExhausted => write!(f, "Page cache exhausted: no free or evictable frame"),
            Error::NotResident(page_id) => {
                write!(f, "Page {} is not resident in the cache", page_id)
            }
            Error::PagePinned(page_id) => {
                write!(f, "Cannot delete page {}: Page is still pinned", page_id)
            }
        }
    }
}

impl serde::de::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::InvalidData(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::InvalidInput(msg.to_string())
    }
}

impl From<std::array::TryFromSliceError> for Error {
    fn from(e: std::array::TryFromSliceError) -> Self {
        Error::InvalidData(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IO(e.to_string())
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(e: std::num::TryFromIntError) -> Self {
        Error::InvalidData(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        // This occurs when a different thread panics when holding a mutex. Since this is
        // fatal, we should panic here too.
        panic!("{e}")
    }
}

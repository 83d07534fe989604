pub mod buffer_pool;
pub mod disk;
pub mod frame;
pub mod frame_handle;
pub(crate) mod page;
pub mod record;
pub mod record_id;
pub mod replacer;
pub mod typedef;

pub use page::PAGE_SIZE;
pub(crate) type Result<T> = std::result::Result<T, pagedb_error::Error>;

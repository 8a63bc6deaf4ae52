mod bind_group;
mod bindable;
mod mapped_storage_buffer;
mod mapped_uniform_buffer;
mod readback_buffer;
mod unmapped_storage_buffer;

pub use self::bind_group::*;
pub use self::bindable::*;
pub use self::mapped_storage_buffer::*;
pub use self::mapped_uniform_buffer::*;
pub use self::readback_buffer::*;
pub use self::unmapped_storage_buffer::*;

mod utils {
    /// Rounds buffer sizes up so that reallocation for slightly-grown data
    /// can be skipped, and so that zero-length uploads still get a legal
    /// binding.
    pub fn pad_size(size: usize) -> usize {
        ((size + 31) & !31).max(32)
    }
}

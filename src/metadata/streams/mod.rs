//! Metadata streams: the stream directory, the `#Strings`, `#Blob` and `#GUID` heaps and the
//! tables stream.

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use guid::{format_guid, Guid};
pub use streamheader::{StreamHeader, VALID_STREAM_NAMES};
pub use strings::Strings;
pub use tablesheader::{TablesHeader, HEAP_SIZES_EXTRA_DATA};

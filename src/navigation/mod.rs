mod codec;
mod path;

pub use codec::{PathCodec, PathEntry};
pub use path::{EncodedPath, NavigationPath, PhysicalPath};

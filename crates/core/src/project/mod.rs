pub mod changes;

pub use changes::FileSystemChangesDetector;

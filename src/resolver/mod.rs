//! Cross-file import resolution and recursive property-chain resolution.
//! Both are invoked by query handlers, never by indexing.

pub mod imports;
pub mod recursive;

pub use imports::{FileRecords, ImportResolver};
pub use recursive::{FsReader, RecursiveResolver, SourceReader, SymbolFinder, TypeFallback};

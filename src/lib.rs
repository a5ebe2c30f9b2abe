pub mod config;
pub mod error;
pub mod extractor;
pub mod index;
pub mod intern;
pub mod logging;
pub mod pool;
pub mod query;
pub mod resolver;
pub mod scanner;
pub mod search;
pub mod storage;
pub mod symbol;
pub mod types;
pub mod utils;
pub mod watcher;

pub use config::Settings;
pub use error::{IndexError, IndexResult};
pub use extractor::{ExtractorFactory, Language, SymbolExtractor};
pub use index::{
    BackgroundIndex, BackgroundStats, DynamicIndex, FindReferencesOptions, IndexStats, MergedIndex,
};
pub use intern::Interner;
pub use pool::{ParseTask, WorkerPool};
pub use query::{QueryContext, QueryEngine};
pub use resolver::{ImportResolver, RecursiveResolver};
pub use scanner::{FileScanner, FolderHasher};
pub use storage::{SHARD_VERSION, ShardStore};
pub use symbol::{Import, IndexedFile, ReExport, Reference, ShardMetadata, Symbol};
pub use types::{CancellationToken, Location, Range, SymbolKind};
pub use watcher::FileWatcher;

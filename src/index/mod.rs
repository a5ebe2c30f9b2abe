//! The three-tier index: persistent background index, in-memory dynamic
//! overlay, and the merged query facade.

pub mod background;
pub mod dynamic;
pub mod merged;
pub mod stats;

pub use background::{BackgroundIndex, FindReferencesOptions, REFERENCE_CANDIDATE_CAP};
pub use dynamic::DynamicIndex;
pub use merged::MergedIndex;
pub use stats::{BackgroundStats, IndexStats};

use crate::symbol::{IndexedFile, Reference};

/// Shared reference filter used by both index tiers: direct name matches
/// plus the import-aware path where the file imported `name` under a
/// different local binding.
pub(crate) fn collect_references_matching(
    file: &IndexedFile,
    name: &str,
    options: &FindReferencesOptions,
    out: &mut Vec<Reference>,
) {
    let matches_options = |r: &Reference| {
        if options.exclude_local && r.is_local {
            return false;
        }
        if let Some(scope) = &options.scope_id
            && r.scope_id.as_ref() != scope.as_str()
        {
            return false;
        }
        true
    };

    for reference in file
        .references
        .iter()
        .filter(|r| r.symbol_name.as_ref() == name)
    {
        if matches_options(reference) {
            out.push(reference.clone());
        }
    }

    for import in &file.imports {
        let Some(exported) = import.exported_name.as_deref() else {
            continue;
        };
        if exported != name || import.local_name.as_ref() == name {
            continue;
        }
        let local = import.local_name.as_ref();
        for reference in file
            .references
            .iter()
            .filter(|r| r.symbol_name.as_ref() == local && !r.is_import)
        {
            if matches_options(reference) {
                out.push(reference.clone());
            }
        }
    }
}

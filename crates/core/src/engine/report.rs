//! Plain-text capability report.

use crate::availability::AvailabilityTracker;
use crate::debug::{ext_column, file_size};
use crate::mimetype::MimetypeLookup;
use crate::registry::RegistrySnapshot;

const BLANK_PAIR: &str = "          ";

/// Renders the capability table grouped by mimetype pair, best transformer
/// first within each pair. Transformers last seen down are marked.
pub(crate) fn render(
    snapshot: &RegistrySnapshot,
    lookup: &dyn MimetypeLookup,
    tracker: &AvailabilityTracker,
    source_extension: Option<&str>,
    target_extension: Option<&str>,
) -> String {
    let source = match source_extension.map(|ext| (ext, lookup.mimetype_for(ext))) {
        Some((ext, None)) => return format!("Unknown source extension {}", ext),
        Some((_, mimetype)) => mimetype,
        None => None,
    };
    let target = match target_extension.map(|ext| (ext, lookup.mimetype_for(ext))) {
        Some((ext, None)) => return format!("Unknown target extension {}", ext),
        Some((_, mimetype)) => mimetype,
        None => None,
    };

    let entries = snapshot.supported_transforms(source.as_deref(), target.as_deref());
    if entries.is_empty() {
        return "No transformations".to_string();
    }

    let mut lines = Vec::with_capacity(entries.len());
    let mut previous: Option<(&str, &str)> = None;
    for entry in &entries {
        let pair = (entry.source_mimetype.as_str(), entry.target_mimetype.as_str());
        let mut line = if previous == Some(pair) {
            BLANK_PAIR.to_string()
        } else {
            format!(
                "{}{}",
                ext_column(lookup.extension_for(pair.0).as_deref()),
                ext_column(lookup.extension_for(pair.1).as_deref())
            )
        };
        previous = Some(pair);

        line.push_str(&format!(
            "{} {} priority={}",
            file_size(entry.max_source_size_bytes),
            entry.transformer_name,
            entry.priority
        ));
        if tracker
            .state(&entry.transformer_name)
            .is_some_and(|s| !s.available)
        {
            line.push_str(" (unavailable)");
        }
        lines.push(line);
    }
    lines.join("\n")
}

//! Registry construction and the immutable snapshot it produces.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::error::RegistryError;
use super::types::{
    CapabilityEntry, RegisteredTransformer, TransformerDefinition, TransformerSpec,
    PASS_THROUGH_NAME,
};

/// Accumulates transformer definitions in declaration order.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    transformers: Vec<Arc<RegisteredTransformer>>,
    by_name: HashMap<String, usize>,
    entries: Vec<CapabilityEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers one transformer.
    pub fn register(&mut self, spec: TransformerSpec) -> Result<(), RegistryError> {
        self.validate(&spec)?;

        let mut all_option_names: HashSet<String> = spec.option_names.iter().cloned().collect();
        for child in spec.definition.children() {
            if let Some(registered) = self.get(child) {
                all_option_names.extend(registered.all_option_names.iter().cloned());
            }
        }
        let all_option_names = Arc::new(all_option_names);

        for supported in &spec.supported {
            self.entries.push(CapabilityEntry {
                transformer_name: spec.name.clone(),
                source_mimetype: supported.source_mimetype.to_ascii_lowercase(),
                target_mimetype: supported.target_mimetype.to_ascii_lowercase(),
                max_source_size_bytes: supported.max_source_size_bytes,
                declared_option_names: Arc::clone(&all_option_names),
                priority: supported.priority,
                order: self.entries.len(),
            });
        }

        debug!(
            transformer = %spec.name,
            kind = spec.definition.kind(),
            supported = spec.supported.len(),
            options = all_option_names.len(),
            "Registered transformer"
        );

        let order = self.transformers.len();
        self.by_name.insert(spec.name.clone(), order);
        self.transformers.push(Arc::new(RegisteredTransformer {
            name: spec.name,
            definition: spec.definition,
            order,
            all_option_names,
        }));
        Ok(())
    }

    /// Registers every spec, logging and skipping the invalid ones.
    pub fn register_all(
        &mut self,
        specs: impl IntoIterator<Item = TransformerSpec>,
    ) -> Vec<RegistryError> {
        let mut skipped = Vec::new();
        for spec in specs {
            if let Err(e) = self.register(spec) {
                warn!(
                    transformer = e.transformer_name(),
                    error = %e,
                    "Skipping transformer definition"
                );
                skipped.push(e);
            }
        }
        skipped
    }

    pub fn build(self) -> RegistrySnapshot {
        RegistrySnapshot {
            transformers: self.transformers,
            by_name: self.by_name,
            entries: self.entries,
        }
    }

    fn get(&self, name: &str) -> Option<&Arc<RegisteredTransformer>> {
        self.by_name.get(name).map(|&i| &self.transformers[i])
    }

    fn validate(&self, spec: &TransformerSpec) -> Result<(), RegistryError> {
        let name = spec.name.as_str();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }

        match &spec.definition {
            TransformerDefinition::PassThrough => {}
            _ if name == PASS_THROUGH_NAME => {
                return Err(RegistryError::ReservedName {
                    name: name.to_string(),
                });
            }
            TransformerDefinition::Simple { base_url, .. } => {
                if base_url.trim().is_empty() {
                    return Err(RegistryError::MissingBaseUrl {
                        name: name.to_string(),
                    });
                }
            }
            TransformerDefinition::Pipeline { steps } => {
                if steps.len() < 2 {
                    return Err(RegistryError::TooFewSteps {
                        name: name.to_string(),
                        count: steps.len(),
                    });
                }
                let last = steps.len() - 1;
                for (index, step) in steps.iter().enumerate() {
                    if index < last && step.target_mimetype.is_none() {
                        return Err(RegistryError::MissingIntermediateMimetype {
                            name: name.to_string(),
                            index,
                            step: step.transformer.clone(),
                        });
                    }
                }
            }
            TransformerDefinition::Failover { candidates } => {
                if candidates.len() < 2 {
                    return Err(RegistryError::TooFewCandidates {
                        name: name.to_string(),
                        count: candidates.len(),
                    });
                }
            }
        }

        for child in spec.definition.children() {
            if self.get(child).is_none() {
                return Err(RegistryError::UnknownChild {
                    name: name.to_string(),
                    child: child.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Immutable view of the registered transformers and their capabilities.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    transformers: Vec<Arc<RegisteredTransformer>>,
    by_name: HashMap<String, usize>,
    entries: Vec<CapabilityEntry>,
}

impl RegistrySnapshot {
    /// A snapshot with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn transformer(&self, name: &str) -> Option<&Arc<RegisteredTransformer>> {
        self.by_name.get(name).map(|&i| &self.transformers[i])
    }

    /// Transformers in registration order.
    pub fn transformers(&self) -> &[Arc<RegisteredTransformer>] {
        &self.transformers
    }

    /// Capability entries in declaration order.
    pub fn entries(&self) -> &[CapabilityEntry] {
        &self.entries
    }

    pub fn all_option_names(&self, name: &str) -> Option<&HashSet<String>> {
        self.transformer(name).map(|t| t.all_option_names.as_ref())
    }

    /// Entries able to convert `source` of `size` bytes to `target`, best first.
    pub fn candidates(&self, source: &str, size: i64, target: &str) -> Vec<&CapabilityEntry> {
        let mut matching: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.matches(source, target) && e.accepts_size(size))
            .collect();
        matching.sort_by_key(|e| (e.priority, e.order));
        matching
    }

    /// Entries filtered by optional source and target mimetype, grouped by
    /// pair and ordered by priority within each pair.
    pub fn supported_transforms(
        &self,
        source: Option<&str>,
        target: Option<&str>,
    ) -> Vec<&CapabilityEntry> {
        let mut listed: Vec<_> = self
            .entries
            .iter()
            .filter(|e| source.map_or(true, |s| e.source_mimetype.eq_ignore_ascii_case(s)))
            .filter(|e| target.map_or(true, |t| e.target_mimetype.eq_ignore_ascii_case(t)))
            .collect();
        listed.sort_by(|a, b| {
            (&a.source_mimetype, &a.target_mimetype, a.priority, a.order).cmp(&(
                &b.source_mimetype,
                &b.target_mimetype,
                b.priority,
                b.order,
            ))
        });
        listed
    }

    /// Number of entries, or of distinct source/target pairs when `unique`.
    pub fn count_supported_transforms(&self, unique: bool) -> usize {
        if unique {
            self.entries
                .iter()
                .map(|e| (e.source_mimetype.as_str(), e.target_mimetype.as_str()))
                .collect::<HashSet<_>>()
                .len()
        } else {
            self.entries.len()
        }
    }
}

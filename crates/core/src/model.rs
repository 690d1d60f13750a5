use std::collections::BTreeSet;

/// ABI summary of one compiled top-level type, nested types folded in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFileAbi {
    pub class_name: String,
    pub source_file_name: Option<String>,
    pub inner_class_names: BTreeSet<String>,
    pub public_types: BTreeSet<String>,
    pub private_types: BTreeSet<String>,
}

impl SourceFileAbi {
    /// Builds an ABI, resolving types present in both sets to public.
    pub fn new(
        class_name: impl Into<String>,
        public_types: impl IntoIterator<Item = impl Into<String>>,
        private_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let public_types: BTreeSet<String> = public_types.into_iter().map(Into::into).collect();
        let private_types = private_types
            .into_iter()
            .map(Into::into)
            .filter(|t| !public_types.contains(t))
            .collect();

        Self {
            class_name: class_name.into(),
            source_file_name: None,
            inner_class_names: BTreeSet::new(),
            public_types,
            private_types,
        }
    }

    pub fn with_source_file_name(mut self, name: impl Into<String>) -> Self {
        self.source_file_name = Some(name.into());
        self
    }

    pub fn with_inner_class_names(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.inner_class_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Every referenced type, paired with its `is_private` flag.
    pub fn referenced_types(&self) -> impl Iterator<Item = (&str, bool)> {
        self.public_types
            .iter()
            .map(|t| (t.as_str(), false))
            .chain(self.private_types.iter().map(|t| (t.as_str(), true)))
    }
}

/// State of a source file relative to the previous successful compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFileState {
    Added,
    Removed,
    Changed,
    NotChanged,
}

use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryFailureKind {
    Unreadable,
    Unresolvable,
    AddDirectory,
    AddFile,
    Walk,
}

/// One entry left out of the archive because of an error.
#[derive(Clone, Debug)]
pub struct EntryFailure {
    pub path: PathBuf,
    pub kind: EntryFailureKind,
    pub detail: String,
}

/// Outcome of a successful build.
#[derive(Clone, Debug, Default)]
pub struct BuildReport {
    pub files_added: usize,
    pub directories_added: usize,
    pub excluded: usize,
    pub bytes_added: u64,
    pub failures: Vec<EntryFailure>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn fail(&mut self, path: impl Into<PathBuf>, kind: EntryFailureKind, detail: impl ToString) {
        self.failures.push(EntryFailure {
            path: path.into(),
            kind,
            detail: detail.to_string(),
        });
    }
}

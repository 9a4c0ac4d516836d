use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::{Error, Filesystem, Result};

const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Clone, Debug)]
enum Node {
    Dir,
    File(Vec<u8>),
    Symlink(PathBuf),
}

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<PathBuf, Node>,
    unreadable: BTreeSet<PathBuf>,
    read_only: BTreeSet<PathBuf>,
}

/// In-memory filesystem for tests.
///
/// Paths must be absolute. The root directory always exists.
#[derive(Debug)]
pub struct MemoryFs {
    tree: Mutex<Tree>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            tree: Mutex::new(tree),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a file and all of its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> &Self {
        let path = lexical(path.as_ref());
        let mut tree = self.lock();
        if let Some(parent) = path.parent() {
            insert_dirs(&mut tree, parent);
        }
        tree.nodes.insert(path, Node::File(content.into()));
        drop(tree);
        self
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        let path = lexical(path.as_ref());
        insert_dirs(&mut self.lock(), &path);
        self
    }

    pub fn add_symlink(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) -> &Self {
        let link = lexical(link.as_ref());
        let mut tree = self.lock();
        if let Some(parent) = link.parent() {
            insert_dirs(&mut tree, parent);
        }
        tree.nodes
            .insert(link, Node::Symlink(target.as_ref().to_path_buf()));
        drop(tree);
        self
    }

    pub fn set_unreadable(&self, path: impl AsRef<Path>) -> &Self {
        self.lock().unreadable.insert(lexical(path.as_ref()));
        self
    }

    pub fn set_read_only(&self, path: impl AsRef<Path>) -> &Self {
        self.lock().read_only.insert(lexical(path.as_ref()));
        self
    }

    /// Contents of a regular file, without following symlinks.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().nodes.get(&lexical(path.as_ref())) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    fn resolve(&self, path: &Path) -> Result<(PathBuf, Node)> {
        let tree = self.lock();
        let resolved = resolve_in(&tree, path)?;
        let node = tree
            .nodes
            .get(&resolved)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
        Ok((resolved, node))
    }
}

fn insert_dirs(tree: &mut Tree, path: &Path) {
    for ancestor in path.ancestors() {
        tree.nodes
            .entry(ancestor.to_path_buf())
            .or_insert(Node::Dir);
    }
}

/// Collapse `.` and `..` without consulting the tree.
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out
}

fn resolve_in(tree: &Tree, path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(Error::NotAbsolute(path.to_path_buf()));
    }

    let mut pending: Vec<PathBuf> = path
        .components()
        .rev()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(PathBuf::from(part)),
            Component::ParentDir => Some(PathBuf::from("..")),
            _ => None,
        })
        .collect();
    let mut current = PathBuf::from("/");
    let mut hops = 0;

    while let Some(part) = pending.pop() {
        if part.as_os_str() == ".." {
            current.pop();
            continue;
        }
        let candidate = current.join(&part);
        match tree.nodes.get(&candidate) {
            None => return Err(Error::NotFound(path.to_path_buf())),
            Some(Node::Symlink(target)) => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(Error::SymlinkLoop(path.to_path_buf()));
                }
                if target.is_absolute() {
                    current = PathBuf::from("/");
                }
                for component in target.components().rev() {
                    match component {
                        Component::Normal(p) => pending.push(PathBuf::from(p)),
                        Component::ParentDir => pending.push(PathBuf::from("..")),
                        _ => {}
                    }
                }
            }
            Some(Node::File(_)) if !pending.is_empty() => {
                return Err(Error::NotADirectory(candidate));
            }
            Some(_) => current = candidate,
        }
    }

    Ok(current)
}

impl Filesystem for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_ok()
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.resolve(path), Ok((_, Node::File(_))))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.resolve(path), Ok((_, Node::Dir)))
    }

    fn is_readable(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok((resolved, _)) => !self.lock().unreadable.contains(&resolved),
            Err(_) => false,
        }
    }

    fn is_writable(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok((resolved, _)) => !self.lock().read_only.contains(&resolved),
            Err(_) => false,
        }
    }

    fn size(&self, path: &Path) -> Result<u64> {
        match self.resolve(path)? {
            (_, Node::File(data)) => Ok(data.len() as u64),
            _ => Err(Error::NotAFile(path.to_path_buf())),
        }
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.resolve(path).map(|(resolved, _)| resolved)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        if !path.is_absolute() {
            return Err(Error::NotAbsolute(path.to_path_buf()));
        }
        self.add_dir(path);
        Ok(())
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::NotAbsolute(path.to_path_buf()))?;
        let (parent, node) = self.resolve(parent)?;
        if !matches!(node, Node::Dir) {
            return Err(Error::NotADirectory(parent));
        }
        let mut tree = self.lock();
        if tree.read_only.contains(&parent) {
            return Err(Error::PermissionDenied(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .ok_or_else(|| Error::NotAFile(path.to_path_buf()))?;
        tree.nodes
            .insert(parent.join(name), Node::File(content.to_vec()));
        Ok(())
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let (resolved, node) = self.resolve(path)?;
        if self.lock().unreadable.contains(&resolved) {
            return Err(Error::PermissionDenied(path.to_path_buf()));
        }
        match node {
            Node::File(data) => Ok(Box::new(Cursor::new(data))),
            _ => Err(Error::NotAFile(path.to_path_buf())),
        }
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        let path = lexical(path);
        let mut tree = self.lock();
        match tree.nodes.get(&path) {
            None => Ok(false),
            Some(Node::Dir) => Err(Error::NotAFile(path)),
            Some(_) => {
                tree.nodes.remove(&path);
                Ok(true)
            }
        }
    }
}

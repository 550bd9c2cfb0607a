//! Trie Directory & Persistence (spec §4.1).
//!
//! A byte-keyed radix tree over the full filename string (including the
//! single optional `folder/base` segment — folders are just another
//! terminal node whose `is_folder` flag is set). Grounded on the original's
//! 128-entry-array node (`ns_utils.h::FileNode::children[128]`), redesigned
//! per spec §9 as a `HashMap<u8, Box<Node>>` per node and an explicit
//! recursive prune on delete instead of the original's lazy leak.

use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use docstore_common::time::now_secs;

const MAGIC: &[u8; 8] = b"NMTRIE02";

/// A resolved name's access level (spec §4.4 permission check).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Perm {
    None,
    Read,
    Write,
}

/// A terminal node's durable and runtime metadata (spec §3 File/Folder Node).
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub owner: String,
    pub replicas: Vec<String>,
    pub read_users: HashSet<String>,
    pub write_users: HashSet<String>,
    pub size: u64,
    pub word_count: u64,
    pub char_count: u64,
    pub creation_time: i64,
    pub last_modified: i64,
    pub last_access: i64,
    pub is_folder: bool,
    pub is_in_trash: bool,
}

impl FileEntry {
    fn new(owner: String, replicas: Vec<String>, is_folder: bool) -> Self {
        let now = now_secs();
        Self {
            owner,
            replicas,
            read_users: HashSet::new(),
            write_users: HashSet::new(),
            size: 0,
            word_count: 0,
            char_count: 0,
            creation_time: now,
            last_modified: now,
            last_access: now,
            is_folder,
            is_in_trash: false,
        }
    }

    /// Permission check (spec §4.4): owner and `write_users` get write
    /// access, `read_users` get read access, everyone else gets none. The
    /// owner is implicit and never duplicated into `write_users`.
    pub fn permission(&self, username: &str) -> Perm {
        if self.owner == username || self.write_users.contains(username) {
            Perm::Write
        } else if self.read_users.contains(username) {
            Perm::Read
        } else {
            Perm::None
        }
    }

    pub fn primary(&self) -> Option<&str> {
        self.replicas.first().map(String::as_str)
    }
}

#[derive(Default)]
struct Node {
    children: HashMap<u8, Box<Node>>,
    entry: Option<FileEntry>,
}

impl Node {
    fn is_empty_interior(&self) -> bool {
        self.entry.is_none() && self.children.is_empty()
    }
}

/// Errors raised by directory operations, translated to [`ErrCode`] at the
/// dispatcher boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("name not found")]
    NotFound,
    #[error("name already exists")]
    Exists { is_folder: bool },
    #[error("operation not valid on a folder")]
    IsFolder,
    #[error("file is in trash")]
    InTrash,
    #[error("file is not in trash")]
    NotInTrash,
    #[error("file already in trash")]
    AlreadyInTrash,
    #[error("caller is not the owner")]
    NotOwner,
    #[error("caller already has this access level")]
    AlreadyHasAccess,
    #[error("caller is already the owner")]
    AlreadyOwner,
    #[error("ACL is full")]
    AclFull,
    #[error("user not present in ACL")]
    UserNotInAcl,
}

/// Splits `"folder/base"` into `(Some("folder"), "base")`, or `"base"` into
/// `(None, "base")`. Deeper nesting is out of scope (spec §9).
pub fn split_folder(name: &str) -> (Option<&str>, &str) {
    match name.split_once('/') {
        Some((folder, base)) => (Some(folder), base),
        None => (None, name),
    }
}

/// The trie directory plus its on-disk snapshot path. Holds a single
/// [`Mutex`] guarding the whole tree — the "directory lock" of spec §5:
/// callers must copy out what they need and drop the guard before any I/O.
pub struct Directory {
    root: Mutex<Node>,
    path: PathBuf,
}

impl Directory {
    /// Load from `path` if it exists and starts with the expected magic;
    /// otherwise start empty without failing startup (spec §4.1).
    pub fn load(path: PathBuf) -> Self {
        let root = match std::fs::read(&path) {
            Ok(bytes) => match decode_snapshot(&bytes) {
                Ok(root) => root,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "discarding unreadable trie snapshot");
                    Node::default()
                }
            },
            Err(_) => Node::default(),
        };
        Self { root: Mutex::new(root), path }
    }

    /// Full-rewrite persistence under the directory lock (spec §4.1). Logs
    /// a warning on failure rather than propagating (spec §7: "Directory
    /// snapshot I/O failures log a warning; the directory remains in
    /// memory"). The write+rename runs on the blocking thread pool so it
    /// never stalls the worker thread driving other connections.
    pub async fn persist(&self) {
        let bytes = {
            let root = self.root.lock().unwrap();
            encode_snapshot(&root)
        };
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("tmp");
            std::fs::write(&tmp, &bytes)?;
            std::fs::rename(&tmp, &path)?;
            Ok::<usize, io::Error>(bytes.len())
        })
        .await;
        match result {
            Ok(Ok(len)) => tracing::debug!(bytes = len, "persisted trie snapshot"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to persist trie snapshot"),
            Err(e) => tracing::warn!(error = %e, "persist task panicked"),
        }
    }

    pub fn find(&self, name: &str, include_trashed: bool) -> Option<FileEntry> {
        let root = self.root.lock().unwrap();
        let node = walk(&root, name)?;
        match &node.entry {
            Some(e) if include_trashed || !e.is_in_trash => Some(e.clone()),
            _ => None,
        }
    }

    /// Any node regardless of trash state — used by owner-facing ops like
    /// RESTORE that must see trashed files.
    pub fn find_any(&self, name: &str) -> Option<FileEntry> {
        let root = self.root.lock().unwrap();
        walk(&root, name).and_then(|n| n.entry.clone())
    }

    fn insert(
        &self,
        name: &str,
        owner: String,
        replicas: Vec<String>,
        is_folder: bool,
    ) -> Result<(), DirectoryError> {
        let mut root = self.root.lock().unwrap();
        if let Some(existing) = walk(&root, name).and_then(|n| n.entry.as_ref()) {
            return Err(DirectoryError::Exists { is_folder: existing.is_folder });
        }
        let node = walk_mut(&mut root, name);
        node.entry = Some(FileEntry::new(owner, replicas, is_folder));
        Ok(())
    }

    pub fn insert_file(
        &self,
        name: &str,
        owner: String,
        replicas: Vec<String>,
    ) -> Result<(), DirectoryError> {
        self.insert(name, owner, replicas, false)
    }

    pub fn insert_folder(
        &self,
        name: &str,
        owner: String,
        replicas: Vec<String>,
    ) -> Result<(), DirectoryError> {
        self.insert(name, owner, replicas, true)
    }

    /// TRASH (`flag = true`) / RESTORE (`flag = false`), spec §4.4.
    pub fn mark_trash(
        &self,
        name: &str,
        flag: bool,
        acting_user: &str,
    ) -> Result<(), DirectoryError> {
        let mut root = self.root.lock().unwrap();
        let node = walk_mut(&mut root, name);
        let entry = node.entry.as_mut().ok_or(DirectoryError::NotFound)?;
        if entry.is_folder {
            return Err(DirectoryError::IsFolder);
        }
        if entry.owner != acting_user {
            return Err(DirectoryError::NotOwner);
        }
        if flag {
            if entry.is_in_trash {
                return Err(DirectoryError::AlreadyInTrash);
            }
            entry.is_in_trash = true;
        } else {
            if !entry.is_in_trash {
                return Err(DirectoryError::NotInTrash);
            }
            entry.is_in_trash = false;
        }
        entry.last_modified = now_secs();
        Ok(())
    }

    /// Hard delete (spec §4.1 `delete`): clears the terminal entry and
    /// recursively prunes any ancestor left childless and non-terminal.
    pub fn delete(&self, name: &str) -> Result<(), DirectoryError> {
        let mut root = self.root.lock().unwrap();
        if walk(&root, name).and_then(|n| n.entry.as_ref()).is_none() {
            return Err(DirectoryError::NotFound);
        }
        prune(&mut root, name.as_bytes());
        Ok(())
    }

    /// MOVE (spec §4.1/§4.4): rewrites `src`'s name to `dest/base(src)`, or
    /// to `base(src)` if `dest == "."`. Returns the new full name.
    pub fn move_entry(
        &self,
        src: &str,
        dest: &str,
        acting_user: &str,
    ) -> Result<String, DirectoryError> {
        let mut root = self.root.lock().unwrap();
        let entry = walk(&root, src)
            .and_then(|n| n.entry.clone())
            .ok_or(DirectoryError::NotFound)?;
        if entry.permission(acting_user) < Perm::Write {
            return Err(DirectoryError::NotOwner);
        }
        let (_, base) = split_folder(src);
        let new_name = if dest == "." {
            base.to_string()
        } else {
            let folder = walk(&root, dest).and_then(|n| n.entry.as_ref());
            match folder {
                Some(f) if f.is_folder => format!("{dest}/{base}"),
                _ => return Err(DirectoryError::NotFound),
            }
        };
        if new_name != src && walk(&root, &new_name).and_then(|n| n.entry.as_ref()).is_some() {
            return Err(DirectoryError::Exists { is_folder: false });
        }
        prune(&mut root, src.as_bytes());
        let mut moved = entry;
        moved.last_modified = now_secs();
        walk_mut(&mut root, &new_name).entry = Some(moved);
        Ok(new_name)
    }

    /// VIEW (spec §4.4): every non-trashed, non-folder... actually folders
    /// are listed too (folders can be browsed/moved into); filtered by
    /// read access unless `include_all`.
    pub fn list(&self, username: &str, include_all: bool) -> Vec<(String, FileEntry)> {
        let root = self.root.lock().unwrap();
        let mut out = Vec::new();
        collect(&root, Vec::new(), &mut |path, entry| {
            if entry.is_in_trash {
                return;
            }
            if include_all || entry.permission(username) >= Perm::Read {
                out.push((path, entry.clone()));
            }
        });
        out
    }

    pub fn list_trash(&self, username: &str) -> Vec<(String, FileEntry)> {
        let root = self.root.lock().unwrap();
        let mut out = Vec::new();
        collect(&root, Vec::new(), &mut |path, entry| {
            if entry.is_in_trash && entry.owner == username {
                out.push((path, entry.clone()));
            }
        });
        out
    }

    /// VIEWFOLDER (spec §4.4): `foldername`'s direct, one-level children.
    pub fn list_folder(
        &self,
        foldername: &str,
        username: &str,
    ) -> Result<Vec<(String, FileEntry)>, DirectoryError> {
        let root = self.root.lock().unwrap();
        let folder = walk(&root, foldername)
            .and_then(|n| n.entry.clone())
            .ok_or(DirectoryError::NotFound)?;
        if !folder.is_folder {
            return Err(DirectoryError::IsFolder);
        }
        if folder.permission(username) < Perm::Read {
            return Err(DirectoryError::NotOwner);
        }
        let prefix = format!("{foldername}/");
        let mut out = Vec::new();
        collect(&root, Vec::new(), &mut |path, entry| {
            if entry.is_in_trash {
                return;
            }
            if let Some(rest) = path.strip_prefix(prefix.as_str()) {
                if !rest.contains('/') {
                    out.push((path.clone(), entry.clone()));
                }
            }
        });
        Ok(out)
    }

    pub fn add_acl(
        &self,
        name: &str,
        acting_user: &str,
        write: bool,
        target: &str,
        max_users: usize,
    ) -> Result<(), DirectoryError> {
        let mut root = self.root.lock().unwrap();
        let node = walk_mut(&mut root, name);
        let entry = node.entry.as_mut().ok_or(DirectoryError::NotFound)?;
        if entry.owner != acting_user {
            return Err(DirectoryError::NotOwner);
        }
        if target == entry.owner {
            return Err(DirectoryError::AlreadyOwner);
        }
        if entry.read_users.contains(target) || entry.write_users.contains(target) {
            return Err(DirectoryError::AlreadyHasAccess);
        }
        let set = if write { &mut entry.write_users } else { &mut entry.read_users };
        if set.len() >= max_users {
            return Err(DirectoryError::AclFull);
        }
        set.insert(target.to_string());
        Ok(())
    }

    pub fn remove_acl(
        &self,
        name: &str,
        acting_user: &str,
        target: &str,
    ) -> Result<(), DirectoryError> {
        let mut root = self.root.lock().unwrap();
        let node = walk_mut(&mut root, name);
        let entry = node.entry.as_mut().ok_or(DirectoryError::NotFound)?;
        if entry.owner != acting_user {
            return Err(DirectoryError::NotOwner);
        }
        if entry.write_users.remove(target) {
            return Ok(());
        }
        if entry.read_users.remove(target) {
            return Ok(());
        }
        Err(DirectoryError::UserNotInAcl)
    }

    /// Every non-trashed node whose replica list includes `ss_id` (spec
    /// §4.6 recovery synchronizer fan-in).
    pub fn list_with_replica(&self, ss_id: &str) -> Vec<(String, FileEntry)> {
        let root = self.root.lock().unwrap();
        let mut out = Vec::new();
        collect(&root, Vec::new(), &mut |path, entry| {
            if !entry.is_in_trash && entry.replicas.iter().any(|r| r == ss_id) {
                out.push((path, entry.clone()));
            }
        });
        out
    }

    /// NM_FILE_MODIFIED notification handling (spec §4.8 step 5).
    pub fn update_stats(&self, name: &str, size: u64, words: u64, chars: u64, last_access: i64) {
        let mut root = self.root.lock().unwrap();
        if let Some(entry) = walk_mut(&mut root, name).entry.as_mut() {
            entry.size = size;
            entry.word_count = words;
            entry.char_count = chars;
            entry.last_access = last_access;
            entry.last_modified = now_secs();
        }
    }
}

fn walk<'a>(root: &'a Node, name: &str) -> Option<&'a Node> {
    let mut node = root;
    for b in name.bytes() {
        node = node.children.get(&b)?;
    }
    Some(node)
}

fn walk_mut<'a>(root: &'a mut Node, name: &str) -> &'a mut Node {
    let mut node = root;
    for b in name.bytes() {
        node = node.children.entry(b).or_default();
    }
    node
}

/// Clears the terminal entry at `path` and recursively removes any
/// ancestor left with no children and no entry of its own.
fn prune(root: &mut Node, path: &[u8]) -> bool {
    if path.is_empty() {
        root.entry = None;
        return root.is_empty_interior();
    }
    let (head, rest) = (path[0], &path[1..]);
    let drop_child = if let Some(child) = root.children.get_mut(&head) {
        prune(child, rest)
    } else {
        false
    };
    if drop_child {
        root.children.remove(&head);
    }
    root.is_empty_interior()
}

fn collect(node: &Node, prefix: Vec<u8>, f: &mut dyn FnMut(String, &FileEntry)) {
    if let Some(entry) = &node.entry {
        if let Ok(name) = String::from_utf8(prefix.clone()) {
            f(name, entry);
        }
    }
    for (&b, child) in node.children.iter() {
        let mut next = prefix.clone();
        next.push(b);
        collect(child, next, f);
    }
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_i32::<BigEndian>(s.len() as i32)?;
    w.write_all(s.as_bytes())
}

fn read_str<R: Read>(r: &mut R) -> io::Result<String> {
    let len = r.read_i32::<BigEndian>()?;
    if len < 0 {
        return Ok(String::new());
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn encode_snapshot(root: &Node) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    collect(root, Vec::new(), &mut |path, entry| {
        out.push(b'F');
        write_str(&mut out, &path).unwrap();
        write_str(&mut out, &entry.owner).unwrap();
        out.write_u32::<BigEndian>(entry.replicas.len() as u32).unwrap();
        for r in &entry.replicas {
            write_str(&mut out, r).unwrap();
        }
        out.write_i64::<BigEndian>(entry.size as i64).unwrap();
        out.write_i64::<BigEndian>(entry.creation_time).unwrap();
        out.write_i64::<BigEndian>(entry.last_modified).unwrap();
        out.write_i32::<BigEndian>(entry.is_folder as i32).unwrap();
        out.write_i32::<BigEndian>(entry.is_in_trash as i32).unwrap();
        out.write_u32::<BigEndian>(entry.read_users.len() as u32).unwrap();
        for u in &entry.read_users {
            write_str(&mut out, u).unwrap();
        }
        out.write_u32::<BigEndian>(entry.write_users.len() as u32).unwrap();
        for u in &entry.write_users {
            write_str(&mut out, u).unwrap();
        }
    });
    out.push(b'E');
    out
}

fn decode_snapshot(bytes: &[u8]) -> io::Result<Node> {
    let mut cur = io::Cursor::new(bytes);
    let mut magic = [0u8; 8];
    cur.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }
    let mut root = Node::default();
    loop {
        let mut marker = [0u8; 1];
        if cur.read_exact(&mut marker).is_err() {
            break;
        }
        match marker[0] {
            b'E' => break,
            b'F' => {
                let path = read_str(&mut cur)?;
                let owner = read_str(&mut cur)?;
                let replica_count = cur.read_u32::<BigEndian>()?;
                let mut replicas = Vec::with_capacity(replica_count as usize);
                for _ in 0..replica_count {
                    replicas.push(read_str(&mut cur)?);
                }
                let size = cur.read_i64::<BigEndian>()?.max(0) as u64;
                let creation_time = cur.read_i64::<BigEndian>()?;
                let last_modified = cur.read_i64::<BigEndian>()?;
                let is_folder = cur.read_i32::<BigEndian>()? != 0;
                let is_in_trash = cur.read_i32::<BigEndian>()? != 0;
                let read_count = cur.read_u32::<BigEndian>()?;
                let mut read_users = HashSet::with_capacity(read_count as usize);
                for _ in 0..read_count {
                    read_users.insert(read_str(&mut cur)?);
                }
                let write_count = cur.read_u32::<BigEndian>()?;
                let mut write_users = HashSet::with_capacity(write_count as usize);
                for _ in 0..write_count {
                    write_users.insert(read_str(&mut cur)?);
                }
                let entry = FileEntry {
                    owner,
                    replicas,
                    read_users,
                    write_users,
                    size,
                    word_count: 0,
                    char_count: 0,
                    creation_time,
                    last_modified,
                    last_access: creation_time,
                    is_folder,
                    is_in_trash,
                };
                walk_mut(&mut root, &path).entry = Some(entry);
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown record marker {other}"),
                ))
            }
        }
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir() -> Directory {
        Directory { root: Mutex::new(Node::default()), path: PathBuf::from("/dev/null/unused") }
    }

    #[test]
    fn create_then_delete_round_trip() {
        let d = dir();
        d.insert_file("a.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        assert!(d.find("a.txt", false).is_some());
        d.delete("a.txt").unwrap();
        assert!(d.find("a.txt", false).is_none());
        assert_eq!(d.delete("a.txt"), Err(DirectoryError::NotFound));
    }

    #[test]
    fn trash_then_restore_preserves_fields() {
        let d = dir();
        d.insert_file("b.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        d.add_acl("b.txt", "alice", false, "bob", 50).unwrap();
        let before = d.find("b.txt", false).unwrap();

        d.mark_trash("b.txt", true, "alice").unwrap();
        assert!(d.find("b.txt", false).is_none());
        assert!(d.find("b.txt", true).unwrap().is_in_trash);

        d.mark_trash("b.txt", false, "alice").unwrap();
        let after = d.find("b.txt", false).unwrap();
        assert_eq!(before.owner, after.owner);
        assert_eq!(before.replicas, after.replicas);
        assert_eq!(before.read_users, after.read_users);
        assert_eq!(before.creation_time, after.creation_time);
    }

    #[test]
    fn double_trash_is_rejected() {
        let d = dir();
        d.insert_file("c.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        d.mark_trash("c.txt", true, "alice").unwrap();
        assert_eq!(d.mark_trash("c.txt", true, "alice"), Err(DirectoryError::AlreadyInTrash));
    }

    #[test]
    fn move_into_folder_then_back_restores_base_name() {
        let d = dir();
        d.insert_folder("docs", "alice".into(), vec!["ss1".into()]).unwrap();
        d.insert_file("report.txt", "alice".into(), vec!["ss1".into()]).unwrap();

        let moved = d.move_entry("report.txt", "docs", "alice").unwrap();
        assert_eq!(moved, "docs/report.txt");
        assert!(d.find("report.txt", false).is_none());

        let back = d.move_entry("docs/report.txt", ".", "alice").unwrap();
        assert_eq!(back, "report.txt");
        assert!(d.find("report.txt", false).is_some());
    }

    #[test]
    fn move_rejects_existing_destination() {
        let d = dir();
        d.insert_folder("docs", "alice".into(), vec!["ss1".into()]).unwrap();
        d.insert_file("report.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        d.insert_file("docs/report.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        assert!(matches!(
            d.move_entry("report.txt", "docs", "alice"),
            Err(DirectoryError::Exists { .. })
        ));
    }

    #[test]
    fn acl_grant_and_revoke_round_trip() {
        let d = dir();
        d.insert_file("d.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        let entry = d.find("d.txt", false).unwrap();
        assert_eq!(entry.permission("bob"), Perm::None);

        d.add_acl("d.txt", "alice", false, "bob", 50).unwrap();
        let entry = d.find("d.txt", false).unwrap();
        assert_eq!(entry.permission("bob"), Perm::Read);

        d.remove_acl("d.txt", "alice", "bob").unwrap();
        let entry = d.find("d.txt", false).unwrap();
        assert_eq!(entry.permission("bob"), Perm::None);
    }

    #[test]
    fn acl_grant_rejects_duplicate() {
        let d = dir();
        d.insert_file("e.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        d.add_acl("e.txt", "alice", false, "bob", 50).unwrap();
        assert_eq!(
            d.add_acl("e.txt", "alice", false, "bob", 50),
            Err(DirectoryError::AlreadyHasAccess)
        );
    }

    #[test]
    fn list_folder_is_one_level_only() {
        let d = dir();
        d.insert_folder("docs", "alice".into(), vec!["ss1".into()]).unwrap();
        d.insert_file("docs/a.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        d.insert_file("docs/sub/b.txt", "alice".into(), vec!["ss1".into()]).unwrap();
        let children = d.list_folder("docs", "alice").unwrap();
        let names: Vec<_> = children.iter().map(|(n, _)| n.clone()).collect();
        assert!(names.contains(&"docs/a.txt".to_string()));
        assert!(!names.contains(&"docs/sub/b.txt".to_string()));
    }

    #[test]
    fn snapshot_round_trips_through_bytes() {
        let d = dir();
        d.insert_file("f.txt", "alice".into(), vec!["ss1".into(), "ss2".into()]).unwrap();
        d.add_acl("f.txt", "alice", true, "bob", 50).unwrap();
        d.insert_folder("docs", "alice".into(), vec!["ss1".into()]).unwrap();
        d.mark_trash("f.txt", true, "alice").unwrap();

        let bytes = encode_snapshot(&d.root.lock().unwrap());
        let root2 = decode_snapshot(&bytes).unwrap();
        let reloaded = Directory { root: Mutex::new(root2), path: PathBuf::new() };

        let entry = reloaded.find("f.txt", true).unwrap();
        assert_eq!(entry.owner, "alice");
        assert_eq!(entry.replicas, vec!["ss1", "ss2"]);
        assert!(entry.write_users.contains("bob"));
        assert!(entry.is_in_trash);
        assert!(reloaded.find("docs", false).unwrap().is_folder);
    }

    #[test]
    fn bad_magic_yields_empty_directory() {
        let bytes = b"NOTMAGIC".to_vec();
        assert!(decode_snapshot(&bytes).is_err());
    }
}

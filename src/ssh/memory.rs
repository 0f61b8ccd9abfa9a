//! In-memory `RemoteFs` used by the client tests.

use super::path;
use super::remote_fs::{RemoteEntry, RemoteFs, RemoteMetadata, RemoteReader, RemoteWriter};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub const HOME: &str = "/home/tester";

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    /// Paths whose mutation fails with a permission-style error
    locked: HashSet<String>,
    /// Paths whose reads fail after the first chunk
    broken: HashSet<String>,
    /// Paths another client creates just before our `create_dir` lands
    raced: HashSet<String>,
    created_dirs: Vec<String>,
}

#[derive(Clone)]
pub struct MemoryFs {
    state: Arc<Mutex<State>>,
}

fn denied(path: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        format!("permission denied: {}", path),
    ))
}

impl MemoryFs {
    pub fn new() -> Self {
        let fs = Self {
            state: Arc::new(Mutex::new(State::default())),
        };
        fs.add_dir("/");
        fs.add_dir("/home");
        fs.add_dir(HOME);
        fs
    }

    fn resolve(path: &str) -> String {
        let normalized = path::normalize(path);
        if normalized.starts_with('/') {
            normalized
        } else if normalized == "." {
            HOME.to_string()
        } else {
            path::normalize(&path::join(HOME, normalized.trim_start_matches("./")))
        }
    }

    fn parent(path: &str) -> String {
        match path.rsplit_once('/') {
            Some(("", _)) => "/".to_string(),
            Some((parent, _)) => parent.to_string(),
            None => "/".to_string(),
        }
    }

    pub fn add_dir(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(Self::resolve(path), Node::Dir);
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state
            .nodes
            .insert(Self::resolve(path), Node::File(data.to_vec()));
    }

    pub fn lock_path(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.locked.insert(Self::resolve(path));
    }

    pub fn break_reads(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.broken.insert(Self::resolve(path));
    }

    pub fn race_create(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.raced.insert(Self::resolve(path));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(&Self::resolve(path)) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.nodes.get(&Self::resolve(path)), Some(Node::Dir))
    }

    /// Directories created through `create_dir`, in call order
    pub fn created_dirs(&self) -> Vec<String> {
        self.state.lock().unwrap().created_dirs.clone()
    }
}

fn metadata_of(node: &Node) -> RemoteMetadata {
    match node {
        Node::Dir => RemoteMetadata {
            is_dir: true,
            size: 4096,
            permissions: Some(0o040755),
            mtime: Some(1_700_000_000),
        },
        Node::File(data) => RemoteMetadata {
            is_dir: false,
            size: data.len() as u64,
            permissions: Some(0o100644),
            mtime: Some(1_700_000_000),
        },
    }
}

/// Writes straight through into the backing file
struct MemoryWriter {
    state: Arc<Mutex<State>>,
    path: String,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let mut state = self.state.lock().unwrap();
        match state.nodes.get_mut(&self.path) {
            Some(Node::File(data)) => {
                data.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            _ => Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "file vanished",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Serves one chunk, then fails as if the connection dropped
struct BrokenReader {
    data: Vec<u8>,
    served: bool,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.served {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection lost",
            )));
        }
        let n = buf.remaining().min(self.data.len());
        buf.put_slice(&self.data[..n]);
        self.served = true;
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl RemoteFs for MemoryFs {
    async fn canonicalize(&self, path: &str) -> Result<String> {
        let resolved = Self::resolve(path);
        let state = self.state.lock().unwrap();
        if state.nodes.contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(Error::NotFound(path.to_string()))
        }
    }

    async fn metadata(&self, path: &str) -> Result<RemoteMetadata> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(&Self::resolve(path))
            .map(metadata_of)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let dir = Self::resolve(path);
        let state = self.state.lock().unwrap();
        match state.nodes.get(&dir) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(Error::NotADirectory(path.to_string())),
            None => return Err(Error::NotFound(path.to_string())),
        }

        // Servers report the dot entries too
        let mut entries = vec![
            RemoteEntry {
                name: ".".to_string(),
                metadata: metadata_of(&Node::Dir),
            },
            RemoteEntry {
                name: "..".to_string(),
                metadata: metadata_of(&Node::Dir),
            },
        ];
        for (child, node) in &state.nodes {
            if child != &dir && Self::parent(child) == dir {
                let name = child.rsplit('/').next().unwrap_or_default().to_string();
                entries.push(RemoteEntry {
                    name,
                    metadata: metadata_of(node),
                });
            }
        }
        Ok(entries)
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let resolved = Self::resolve(path);
        let mut state = self.state.lock().unwrap();
        state.created_dirs.push(path.to_string());

        if state.locked.contains(&resolved) {
            return Err(denied(path));
        }
        if state.raced.remove(&resolved) {
            state.nodes.insert(resolved, Node::Dir);
            return Err(denied(path));
        }
        if state.nodes.contains_key(&resolved) {
            return Err(denied(path));
        }
        if !matches!(state.nodes.get(&Self::parent(&resolved)), Some(Node::Dir)) {
            return Err(Error::NotFound(path.to_string()));
        }
        state.nodes.insert(resolved, Node::Dir);
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let resolved = Self::resolve(path);
        let mut state = self.state.lock().unwrap();
        if state.locked.contains(&resolved) {
            return Err(denied(path));
        }
        match state.nodes.get(&resolved) {
            Some(Node::File(_)) => {
                state.nodes.remove(&resolved);
                Ok(())
            }
            Some(Node::Dir) => Err(denied(path)),
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    async fn open(&self, path: &str) -> Result<RemoteReader> {
        let broken = self
            .state
            .lock()
            .unwrap()
            .broken
            .contains(&Self::resolve(path));
        match self.file(path) {
            Some(data) if broken => Ok(Box::pin(BrokenReader { data, served: false })),
            Some(data) => Ok(Box::pin(Cursor::new(data))),
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    async fn create(&self, path: &str) -> Result<RemoteWriter> {
        let resolved = Self::resolve(path);
        let mut state = self.state.lock().unwrap();
        if state.locked.contains(&resolved) {
            return Err(denied(path));
        }
        if !matches!(state.nodes.get(&Self::parent(&resolved)), Some(Node::Dir)) {
            return Err(Error::NotFound(path.to_string()));
        }
        if matches!(state.nodes.get(&resolved), Some(Node::Dir)) {
            return Err(denied(path));
        }
        state.nodes.insert(resolved.clone(), Node::File(Vec::new()));
        Ok(Box::pin(MemoryWriter {
            state: Arc::clone(&self.state),
            path: resolved,
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

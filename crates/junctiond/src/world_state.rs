//! World-State Client
//!
//! Talks to the shared world-state store over a single persistent stream,
//! opened once at startup and held for the life of the process.
//!
//! Wire protocol (one request in flight at a time):
//! ```text
//! SET <key> <value>\n   -> no reply
//! GET <key>\n           -> <marker><value>   (marker 'X' = key not found)
//! ```
//!
//! The stream is usually a Unix domain socket; TCP is accepted for stores
//! running on another host.

use junction_common::constants::wire::{MAX_REPLY_LEN, NOT_FOUND_MARKER};
use junction_common::{BranchCounts, Direction, JunctionError, JunctionId, JunctionPaths, Light, Lights};
use std::future::Future;
use std::io;
use std::marker::PhantomData;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Key/value access to the world-state store
pub trait WorldStore {
    /// Fetch the raw bytes stored at `key`
    fn get(&mut self, key: &str) -> impl Future<Output = Result<Vec<u8>, JunctionError>> + Send;

    /// Replace the value stored at `key`
    fn set(
        &mut self,
        key: &str,
        value: &[u8],
    ) -> impl Future<Output = Result<(), JunctionError>> + Send;
}

/// Any bidirectional byte stream the client can run over
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Where the world-state store listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldStateEndpoint {
    /// Unix domain socket path
    Unix(String),
    /// TCP `host:port`
    Tcp(String),
}

impl std::fmt::Display for WorldStateEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path),
            Self::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

/// Persistent connection to the world-state store
pub struct WorldStateClient {
    stream: Box<dyn Transport>,
}

impl WorldStateClient {
    /// Open the connection described by `endpoint`
    pub async fn connect(endpoint: &WorldStateEndpoint) -> Result<Self, JunctionError> {
        let client = match endpoint {
            WorldStateEndpoint::Unix(path) => Self::from_stream(connect_unix(path).await?),
            WorldStateEndpoint::Tcp(addr) => Self::from_stream(
                tokio::net::TcpStream::connect(addr)
                    .await
                    .map_err(JunctionError::ConnectionFailure)?,
            ),
        };

        tracing::debug!(endpoint = %endpoint, "World-state stream opened");

        Ok(client)
    }

    /// Wrap an already-open stream
    pub fn from_stream(stream: impl Transport + 'static) -> Self {
        Self {
            stream: Box::new(stream),
        }
    }

    async fn send(&mut self, request: &[u8]) -> Result<(), JunctionError> {
        self.stream
            .write_all(request)
            .await
            .map_err(JunctionError::ConnectionFailure)?;
        self.stream
            .flush()
            .await
            .map_err(JunctionError::ConnectionFailure)
    }
}

#[cfg(unix)]
async fn connect_unix(path: &str) -> Result<tokio::net::UnixStream, JunctionError> {
    tokio::net::UnixStream::connect(path)
        .await
        .map_err(JunctionError::ConnectionFailure)
}

#[cfg(not(unix))]
async fn connect_unix(path: &str) -> Result<tokio::net::TcpStream, JunctionError> {
    Err(JunctionError::ConnectionFailure(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("Unix sockets are not available on this platform: {}", path),
    )))
}

impl WorldStore for WorldStateClient {
    async fn get(&mut self, key: &str) -> Result<Vec<u8>, JunctionError> {
        self.send(format!("GET {}\n", key).as_bytes()).await?;

        let mut buf = [0u8; MAX_REPLY_LEN];
        let len = self
            .stream
            .read(&mut buf)
            .await
            .map_err(JunctionError::ConnectionFailure)?;

        if len == 0 {
            return Err(JunctionError::ConnectionFailure(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "world-state store closed the connection",
            )));
        }

        let reply = &buf[..len];
        if reply[0] == NOT_FOUND_MARKER {
            return Err(JunctionError::NotFound(key.to_string()));
        }

        Ok(reply[1..].to_vec())
    }

    async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), JunctionError> {
        let mut request = Vec::with_capacity(key.len() + value.len() + 6);
        request.extend_from_slice(b"SET ");
        request.extend_from_slice(key.as_bytes());
        request.push(b' ');
        request.extend_from_slice(value);
        request.push(b'\n');

        self.send(&request).await
    }
}

/// Encoding of a typed value to and from its stored bytes
pub trait StoreValue: Sized {
    fn encode(&self) -> Vec<u8>;
    fn decode(raw: &[u8]) -> Option<Self>;
}

fn decode_text(raw: &[u8]) -> Option<&str> {
    std::str::from_utf8(raw).ok().map(str::trim)
}

impl StoreValue for u32 {
    fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        decode_text(raw)?.parse().ok()
    }
}

impl StoreValue for i64 {
    fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        decode_text(raw)?.parse().ok()
    }
}

impl StoreValue for f64 {
    fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        decode_text(raw)?.parse().ok()
    }
}

impl StoreValue for String {
    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        String::from_utf8(raw.to_vec()).ok()
    }
}

// Raw bytes pass through untouched.
impl StoreValue for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        self.clone()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        Some(raw.to_vec())
    }
}

/// Lights are stored as their flow bit: `1` green, `0` red
impl StoreValue for Light {
    fn encode(&self) -> Vec<u8> {
        if self.is_green() { b"1".to_vec() } else { b"0".to_vec() }
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        match decode_text(raw)? {
            "1" => Some(Light::Green),
            "0" => Some(Light::Red),
            _ => None,
        }
    }
}

/// Typed handle on one world-state key
#[derive(Debug, Clone)]
pub struct Field<V> {
    path: String,
    _value: PhantomData<fn() -> V>,
}

impl<V: StoreValue> Field<V> {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            _value: PhantomData,
        }
    }

    pub async fn get<S: WorldStore>(&self, store: &mut S) -> Result<V, JunctionError> {
        let raw = store.get(&self.path).await?;
        V::decode(&raw).ok_or_else(|| JunctionError::InvalidValue {
            key: self.path.clone(),
            value: String::from_utf8_lossy(&raw).into_owned(),
        })
    }

    pub async fn set<S: WorldStore>(&self, store: &mut S, value: &V) -> Result<(), JunctionError> {
        store.set(&self.path, &value.encode()).await
    }
}

/// Typed fields of one branch
#[derive(Debug, Clone)]
pub struct BranchState {
    pub vehicle_count: Field<u32>,
    pub light: Field<Light>,
}

/// Typed fields of a junction's four branches
#[derive(Debug, Clone)]
pub struct JunctionState {
    branches: [BranchState; 4],
}

impl JunctionState {
    pub fn new(id: JunctionId) -> Self {
        let paths = JunctionPaths::new(id);
        let branches = Direction::ALL.map(|direction| {
            let branch = paths.branch(direction);
            BranchState {
                vehicle_count: Field::new(branch.vehicle_count.clone()),
                light: Field::new(branch.light.clone()),
            }
        });
        Self { branches }
    }

    pub fn branch(&self, direction: Direction) -> &BranchState {
        &self.branches[direction.index()]
    }

    /// Read all four vehicle counts; any missing key aborts the read
    pub async fn read_counts<S: WorldStore>(&self, store: &mut S) -> Result<BranchCounts, JunctionError> {
        Ok(BranchCounts {
            north: self.branch(Direction::North).vehicle_count.get(store).await?,
            south: self.branch(Direction::South).vehicle_count.get(store).await?,
            east: self.branch(Direction::East).vehicle_count.get(store).await?,
            west: self.branch(Direction::West).vehicle_count.get(store).await?,
        })
    }

    /// Write all four lights (north, south, east, west)
    pub async fn write_lights<S: WorldStore>(&self, store: &mut S, lights: &Lights) -> Result<(), JunctionError> {
        for direction in [Direction::North, Direction::South, Direction::East, Direction::West] {
            self.branch(direction)
                .light
                .set(store, &lights.get(direction))
                .await?;
        }
        Ok(())
    }
}

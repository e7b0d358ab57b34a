//! Host tensor descriptors
//!
//! A [`HostTensor`] names a block of caller-owned host memory together with
//! its shape and element type. The bytes are held behind a shared handle so
//! the caller keeps a view of the same buffer the session writes outputs
//! into; the session never copies tensor contents at registration time.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    F32,
    F16,
    I32,
    I64,
}

impl ElementType {
    /// Size of one element in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F16 => 2,
            ElementType::I32 => 4,
            ElementType::I64 => 8,
        }
    }
}

/// Shared handle to caller-owned host bytes
pub type HostBuffer = Arc<RwLock<Vec<u8>>>;

/// A named tensor backed by caller-owned host memory
#[derive(Debug, Clone)]
pub struct HostTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub element_type: ElementType,
    data: HostBuffer,
}

impl HostTensor {
    /// Create a tensor over an existing host buffer handle
    pub fn new(
        name: impl Into<String>,
        shape: Vec<usize>,
        element_type: ElementType,
        data: HostBuffer,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            element_type,
            data,
        }
    }

    /// Create an f32 tensor, copying the given values into a fresh buffer.
    /// The returned tensor and any clone of it share that buffer.
    pub fn from_f32(name: impl Into<String>, shape: Vec<usize>, values: &[f32]) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Self::new(
            name,
            shape,
            ElementType::F32,
            Arc::new(RwLock::new(bytes)),
        )
    }

    /// Create a zero-filled f32 tensor sized to the shape, for outputs.
    pub fn zeroed_f32(name: impl Into<String>, shape: Vec<usize>) -> Self {
        let count: usize = shape.iter().product();
        Self::new(
            name,
            shape,
            ElementType::F32,
            Arc::new(RwLock::new(vec![0u8; count * 4])),
        )
    }

    /// Number of elements
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Byte footprint implied by shape and element type
    pub fn byte_len(&self) -> usize {
        self.element_count() * self.element_type.byte_size()
    }

    /// Shared handle to the underlying host bytes
    pub fn buffer(&self) -> HostBuffer {
        Arc::clone(&self.data)
    }

    /// Copy of the current host bytes
    pub fn read_bytes(&self) -> Vec<u8> {
        self.data.read().expect("host buffer lock poisoned").clone()
    }

    /// Overwrite the host bytes. Length is the caller's responsibility here;
    /// the session validates footprints before every run.
    pub fn write_bytes(&self, bytes: &[u8]) {
        let mut guard = self.data.write().expect("host buffer lock poisoned");
        guard.clear();
        guard.extend_from_slice(bytes);
    }

    /// Interpret the host bytes as little-endian f32 values
    pub fn to_f32_vec(&self) -> Vec<f32> {
        let guard = self.data.read().expect("host buffer lock poisoned");
        guard
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

//! Exhaustive inner-product index stored in the FAISS `IndexFlatIP` layout.
//!
//! On-disk layout (little-endian):
//!
//! | field        | type       | value                   |
//! |--------------|------------|-------------------------|
//! | fourcc       | `[u8; 4]`  | `IxFI`                  |
//! | d            | `i32`      | vector dimension        |
//! | ntotal       | `i64`      | vector count            |
//! | dummy x2     | `i64`      | `1 << 20`               |
//! | is_trained   | `u8`       | `1`                     |
//! | metric_type  | `i32`      | `0` (inner product)     |
//! | codes length | `u64`      | `ntotal * d`            |
//! | codes        | `f32 * n`  | vectors, row-major      |

use std::io::{Read, Write};

use crate::domain::{DomainError, Embedding};

const FOURCC_FLAT_IP: [u8; 4] = *b"IxFI";
const METRIC_INNER_PRODUCT: i32 = 0;
const HEADER_DUMMY: i64 = 1 << 20;

/// A search result slot. Slots the index could not fill carry label `-1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub label: i64,
    pub score: f32,
}

impl Neighbor {
    pub const MISSING: Neighbor = Neighbor {
        label: -1,
        score: f32::MIN,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Result<Self, DomainError> {
        if dimension == 0 {
            return Err(DomainError::validation("index dimension must be positive"));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn vector(&self, label: usize) -> Option<&[f32]> {
        let start = label.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Appends vectors in order; their labels continue from the current count.
    /// Nothing is appended if any vector has the wrong dimension.
    pub fn add(&mut self, vectors: &[Embedding]) -> Result<(), DomainError> {
        if let Some(bad) = vectors.iter().find(|v| v.dimension() != self.dimension) {
            return Err(DomainError::validation(format!(
                "vector dimension mismatch: expected {}, got {}",
                self.dimension,
                bad.dimension()
            )));
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector.as_slice());
        }
        Ok(())
    }

    /// Drops every vector from position `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dimension);
    }

    /// Returns exactly `k` slots ordered by descending inner product (ties by
    /// lower label). Slots beyond the stored count are [`Neighbor::MISSING`].
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, DomainError> {
        if query.len() != self.dimension {
            return Err(DomainError::validation(format!(
                "query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let order = |a: &Neighbor, b: &Neighbor| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.label.cmp(&b.label))
        };

        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(label, row)| Neighbor {
                label: label as i64,
                score: row.iter().zip(query).map(|(a, b)| a * b).sum(),
            })
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k, order);
            scored.truncate(k);
        }
        scored.sort_by(order);
        scored.resize(k, Neighbor::MISSING);

        Ok(scored)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let ntotal = self.len() as i64;

        writer.write_all(&FOURCC_FLAT_IP)?;
        writer.write_all(&(self.dimension as i32).to_le_bytes())?;
        writer.write_all(&ntotal.to_le_bytes())?;
        writer.write_all(&HEADER_DUMMY.to_le_bytes())?;
        writer.write_all(&HEADER_DUMMY.to_le_bytes())?;
        writer.write_all(&[1u8])?;
        writer.write_all(&METRIC_INNER_PRODUCT.to_le_bytes())?;

        writer.write_all(&(self.data.len() as u64).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, DomainError> {
        let fourcc: [u8; 4] = read_bytes(reader)?;
        if fourcc != FOURCC_FLAT_IP {
            return Err(DomainError::storage(format!(
                "unsupported index type {:?}",
                String::from_utf8_lossy(&fourcc)
            )));
        }

        let dimension = i32::from_le_bytes(read_bytes(reader)?);
        let ntotal = i64::from_le_bytes(read_bytes(reader)?);
        let _dummy: [u8; 16] = read_bytes(reader)?;
        let _is_trained: [u8; 1] = read_bytes(reader)?;
        let metric = i32::from_le_bytes(read_bytes(reader)?);

        if metric != METRIC_INNER_PRODUCT {
            return Err(DomainError::storage(format!(
                "unsupported metric type {metric}, expected inner product"
            )));
        }
        let (Ok(dimension), Ok(ntotal)) = (usize::try_from(dimension), usize::try_from(ntotal))
        else {
            return Err(DomainError::storage("negative index header field"));
        };
        if dimension == 0 {
            return Err(DomainError::storage("index dimension is zero"));
        }

        let codes = u64::from_le_bytes(read_bytes(reader)?);
        let expected = ntotal
            .checked_mul(dimension)
            .ok_or_else(|| DomainError::storage("index size overflow"))?;
        if codes != expected as u64 {
            return Err(DomainError::storage(format!(
                "index holds {codes} values, header implies {expected}"
            )));
        }

        let mut raw = vec![0u8; expected * 4];
        reader.read_exact(&mut raw)?;
        let data = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self { dimension, data })
    }
}

fn read_bytes<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], DomainError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

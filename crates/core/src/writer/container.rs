//! Binary result container
//!
//! Layout:
//!
//! ```text
//! 0   magic "WVFD"
//! 4   version (u8), 3 reserved bytes
//! 8   recorded step count (u64 LE), rewritten on close
//! 16  header length in bytes (u64 LE)
//! 24  JSON header
//! ..  zero padding to an 8-byte boundary (data start)
//! ..  datasets, native-endian f64, at the offsets listed in the header
//! ```
//!
//! Static datasets (`density`, `stiffness`) are one chunk. Displacement
//! datasets hold one contiguous chunk per time step, so a step is written
//! with a single seek and write.

use crate::error::{Result, SimError};
use crate::grid::{Mesh, Spacing};
use crate::material::MaterialField;
use crate::solver::{DisplacementComponent, Snapshot};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const MAGIC: &[u8; 4] = b"WVFD";
pub const VERSION: u8 = 1;
pub(crate) const PREAMBLE_LEN: u64 = 24;
pub(crate) const RECORDED_OFFSET: u64 = 8;
const F64_LEN: u64 = std::mem::size_of::<f64>() as u64;

/// Byte order of the platform that wrote the data.
pub fn native_byte_order() -> &'static str {
    if cfg!(target_endian = "little") {
        "little"
    } else {
        "big"
    }
}

/// One named array in the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name: String,
    /// Logical shape; displacement datasets carry the step count last.
    pub shape: Vec<usize>,
    /// Byte offset relative to the data start.
    pub offset: u64,
    /// Number of f64 values per chunk.
    pub chunk_len: usize,
    /// Number of chunks (1 for static datasets).
    pub chunks: usize,
}

impl DatasetInfo {
    pub(crate) fn chunk_offset(&self, chunk: usize) -> u64 {
        self.offset + chunk as u64 * self.chunk_len as u64 * F64_LEN
    }

    fn byte_len(&self) -> u64 {
        self.chunk_len as u64 * self.chunks as u64 * F64_LEN
    }

    /// End of the dataset relative to the data start, `None` on overflow.
    pub(crate) fn checked_end(&self) -> Option<u64> {
        (self.chunk_len as u64)
            .checked_mul(self.chunks as u64)?
            .checked_mul(F64_LEN)?
            .checked_add(self.offset)
    }
}

/// Self-describing metadata stored after the preamble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerHeader {
    pub byte_order: String,
    pub grid_x: Vec<f64>,
    pub grid_y: Vec<f64>,
    pub grid_z: Vec<f64>,
    pub spacing: Spacing,
    pub steps: usize,
    pub dt: f64,
    pub courant: f64,
    pub primary: String,
    pub secondary: String,
    pub datasets: Vec<DatasetInfo>,
}

impl ContainerHeader {
    fn new(mesh: &Mesh, material: &MaterialField, steps: usize) -> Self {
        let dims = mesh.dims();
        let cells = dims.cells();
        let mut datasets = Vec::with_capacity(5);
        let mut offset = 0;
        let mut push = |name: &str, shape: Vec<usize>, chunk_len: usize, chunks: usize| {
            let info = DatasetInfo {
                name: name.to_string(),
                shape,
                offset,
                chunk_len,
                chunks,
            };
            offset += info.byte_len();
            datasets.push(info);
        };

        push("density", vec![dims.nx, dims.ny, dims.nz], cells, 1);
        push("stiffness", vec![dims.nx, dims.ny, dims.nz, 6, 6], cells * 36, 1);
        for component in DisplacementComponent::ALL {
            let [a, b, c] = component.shape(dims);
            push(component.name(), vec![a, b, c, steps], a * b * c, steps);
        }

        Self {
            byte_order: native_byte_order().to_string(),
            grid_x: mesh.x().to_vec(),
            grid_y: mesh.y().to_vec(),
            grid_z: mesh.z().to_vec(),
            spacing: mesh.spacing(),
            steps,
            dt: material.dt(),
            courant: material.courant(),
            primary: material.primary_name().to_string(),
            secondary: material.secondary_name().to_string(),
            datasets,
        }
    }

    pub fn dataset(&self, name: &str) -> Result<&DatasetInfo> {
        self.datasets
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| SimError::Container(format!("no dataset named `{name}`")))
    }

    /// Total byte length of all datasets.
    pub(crate) fn data_len(&self) -> u64 {
        self.datasets.iter().map(DatasetInfo::byte_len).sum()
    }
}

/// Data start for a header of `header_len` bytes.
pub(crate) fn data_start(header_len: u64) -> u64 {
    (PREAMBLE_LEN + header_len).next_multiple_of(F64_LEN)
}

/// Sequential writer for one container file.
///
/// Created with the static datasets already written and the file
/// preallocated to its final size; only displacement steps remain.
#[derive(Debug)]
pub struct ContainerWriter {
    file: File,
    path: PathBuf,
    header: ContainerHeader,
    data_start: u64,
    recorded: u64,
}

impl ContainerWriter {
    pub fn create(path: &Path, mesh: &Mesh, material: &MaterialField, steps: usize) -> Result<Self> {
        if material.dims() != mesh.dims() {
            return Err(SimError::invalid(
                "material",
                "material field does not match the mesh dimensions",
            ));
        }
        let header = ContainerHeader::new(mesh, material, steps);
        let json = serde_json::to_vec(&header).map_err(|e| SimError::Container(e.to_string()))?;
        let data_start = data_start(json.len() as u64);

        let mut file = File::create(path)?;
        file.set_len(data_start + header.data_len())?;
        file.write_all(MAGIC)?;
        file.write_all(&[VERSION, 0, 0, 0])?;
        file.write_all(&0u64.to_le_bytes())?;
        file.write_all(&(json.len() as u64).to_le_bytes())?;
        file.write_all(&json)?;

        let mut writer = Self {
            file,
            path: path.to_path_buf(),
            header,
            data_start,
            recorded: 0,
        };
        writer.write_chunk("density", 0, material.density())?;
        let stiffness: Vec<f64> = material
            .stiffness()
            .iter()
            .flat_map(|c| (0..6).flat_map(move |r| (0..6).map(move |col| c[(r, col)])))
            .collect();
        writer.write_chunk("stiffness", 0, &stiffness)?;
        Ok(writer)
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn recorded_steps(&self) -> u64 {
        self.recorded
    }

    fn write_chunk(&mut self, name: &str, chunk: usize, values: &[f64]) -> Result<()> {
        let info = self.header.dataset(name)?;
        if values.len() != info.chunk_len {
            return Err(SimError::Container(format!(
                "`{name}` chunk holds {} values, got {}",
                info.chunk_len,
                values.len()
            )));
        }
        if chunk >= info.chunks {
            return Err(SimError::Container(format!(
                "`{name}` has {} chunks, chunk {chunk} is out of range",
                info.chunks
            )));
        }
        let offset = self.data_start + info.chunk_offset(chunk);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytemuck::cast_slice(values))?;
        Ok(())
    }

    /// Write the three displacement chunks of `snapshot`.
    pub fn write_step(&mut self, snapshot: &Snapshot) -> Result<()> {
        for component in DisplacementComponent::ALL {
            let field = snapshot.component(component);
            self.write_chunk(component.name(), snapshot.step, field.as_slice())?;
        }
        self.recorded += 1;
        Ok(())
    }

    /// Store the recorded step count and flush. Returns the count.
    pub fn close(mut self) -> Result<u64> {
        self.file.seek(SeekFrom::Start(RECORDED_OFFSET))?;
        self.file.write_all(&self.recorded.to_le_bytes())?;
        self.file.sync_all()?;
        Ok(self.recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_start_is_aligned() {
        assert_eq!(data_start(0), 24);
        assert_eq!(data_start(1), 32);
        assert_eq!(data_start(8), 32);
        assert_eq!(data_start(9), 40);
    }

    #[test]
    fn test_chunk_offsets() {
        let info = DatasetInfo {
            name: "ux".into(),
            shape: vec![2, 3, 4, 5],
            offset: 64,
            chunk_len: 24,
            chunks: 5,
        };
        assert_eq!(info.chunk_offset(0), 64);
        assert_eq!(info.chunk_offset(2), 64 + 2 * 24 * 8);
        assert_eq!(info.byte_len(), 5 * 24 * 8);
    }
}

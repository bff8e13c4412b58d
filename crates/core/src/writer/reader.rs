use super::container::{
    data_start, native_byte_order, ContainerHeader, MAGIC, PREAMBLE_LEN, VERSION,
};
use crate::error::{Result, SimError};
use crate::solver::{DisplacementComponent, Field3};
use nalgebra::Matrix6;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access reader for containers produced by the result writer.
#[derive(Debug)]
pub struct ContainerReader {
    file: File,
    header: ContainerHeader,
    data_start: u64,
    recorded: u64,
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

impl ContainerReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut preamble = [0u8; PREAMBLE_LEN as usize];
        file.read_exact(&mut preamble)
            .map_err(|e| SimError::Container(format!("truncated preamble: {e}")))?;
        if &preamble[..4] != MAGIC {
            return Err(SimError::Container("missing WVFD magic".into()));
        }
        if preamble[4] != VERSION {
            return Err(SimError::Container(format!(
                "unsupported container version {}",
                preamble[4]
            )));
        }
        let recorded = read_u64(&preamble[8..16]);
        let header_len = read_u64(&preamble[16..24]);

        let file_len = file.metadata()?.len();
        if header_len > file_len.saturating_sub(PREAMBLE_LEN) {
            return Err(SimError::Container(format!(
                "header length {header_len} exceeds the {file_len} byte file"
            )));
        }
        let header_len_usize = usize::try_from(header_len)
            .map_err(|_| SimError::Container("header length overflows".into()))?;
        let mut json = vec![0u8; header_len_usize];
        file.read_exact(&mut json)
            .map_err(|e| SimError::Container(format!("truncated header: {e}")))?;
        let header: ContainerHeader = serde_json::from_slice(&json)
            .map_err(|e| SimError::Container(format!("header: {e}")))?;
        if header.byte_order != native_byte_order() {
            return Err(SimError::Container(format!(
                "written with {} endian data",
                header.byte_order
            )));
        }
        let data_start = data_start(header_len);
        for info in &header.datasets {
            let fits = info
                .checked_end()
                .and_then(|end| end.checked_add(data_start))
                .is_some_and(|end| end <= file_len);
            if !fits {
                return Err(SimError::Container(format!(
                    "dataset `{}` runs past the end of the file",
                    info.name
                )));
            }
        }
        if recorded > header.steps as u64 {
            return Err(SimError::Container(format!(
                "{recorded} recorded steps exceed the {} declared",
                header.steps
            )));
        }

        Ok(Self {
            file,
            data_start,
            header,
            recorded,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Steps the writer actually stored. Less than `header().steps` for a
    /// cancelled run.
    pub fn recorded_steps(&self) -> u64 {
        self.recorded
    }

    fn read_chunk(&mut self, name: &str, chunk: usize) -> Result<Vec<f64>> {
        let info = self.header.dataset(name)?;
        if chunk >= info.chunks {
            return Err(SimError::Container(format!(
                "`{name}` has {} chunks, chunk {chunk} is out of range",
                info.chunks
            )));
        }
        let mut values = vec![0.0f64; info.chunk_len];
        self.file
            .seek(SeekFrom::Start(self.data_start + info.chunk_offset(chunk)))?;
        self.file.read_exact(bytemuck::cast_slice_mut(&mut values))?;
        Ok(values)
    }

    /// Per-cell density in grid order.
    pub fn density(&mut self) -> Result<Vec<f64>> {
        self.read_chunk("density", 0)
    }

    /// Per-cell stiffness tensors in grid order.
    pub fn stiffness(&mut self) -> Result<Vec<Matrix6<f64>>> {
        let values = self.read_chunk("stiffness", 0)?;
        Ok(values
            .chunks_exact(36)
            .map(Matrix6::from_row_slice)
            .collect())
    }

    /// Displacement `component` recorded at `step`.
    pub fn read_step(&mut self, component: DisplacementComponent, step: usize) -> Result<Field3> {
        if step as u64 >= self.recorded {
            return Err(SimError::Container(format!(
                "step {step} was not recorded ({} steps available)",
                self.recorded
            )));
        }
        let info = self.header.dataset(component.name())?;
        let [nx, ny, nz] = match info.shape.get(..3) {
            Some(&[nx, ny, nz]) => [nx, ny, nz],
            _ => {
                return Err(SimError::Container(format!(
                    "`{}` has shape {:?}, expected three grid axes",
                    info.name, info.shape
                )));
            }
        };
        let cells = nx.checked_mul(ny).and_then(|n| n.checked_mul(nz));
        if cells != Some(info.chunk_len) {
            return Err(SimError::Container(format!(
                "`{}` chunk of {} values does not match shape {:?}",
                info.name, info.chunk_len, info.shape
            )));
        }
        let data = self.read_chunk(component.name(), step)?;
        Ok(Field3 { data, nx, ny, nz })
    }
}

mod common;

use std::fs;
use std::io::Write;
use wave_sim_core::solver::DisplacementComponent;
use wave_sim_core::writer::{native_byte_order, ContainerHeader, MAGIC, VERSION};
use wave_sim_core::{ContainerReader, Session, SimError, StrategyKind};

#[test]
fn test_container_describes_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("described.wvfd");
    let mut session =
        Session::new(common::inclusion_block(&path, StrategyKind::Sequential, 6)).unwrap();
    let mesh = session.mesh().unwrap();
    let material = session.material().unwrap();
    let summary = session.execute().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], MAGIC);

    let mut reader = ContainerReader::open(&path).unwrap();
    let header = reader.header().clone();
    assert_eq!(header.byte_order, native_byte_order());
    assert_eq!(header.grid_x, mesh.x());
    assert_eq!(header.grid_y, mesh.y());
    assert_eq!(header.grid_z, mesh.z());
    assert_eq!(header.steps, 6);
    assert_eq!(header.dt, summary.dt);
    assert_eq!(header.secondary, "Soft");
    assert_eq!(reader.recorded_steps(), 6);

    assert_eq!(reader.density().unwrap(), material.density());
    assert_eq!(reader.stiffness().unwrap(), material.stiffness());

    let dims = mesh.dims();
    for component in DisplacementComponent::ALL {
        let info = header.dataset(component.name()).unwrap();
        let shape = component.shape(dims);
        assert_eq!(info.shape, vec![shape[0], shape[1], shape[2], 6]);
        assert_eq!(reader.read_step(component, 5).unwrap().shape(), shape);
    }
}

#[test]
fn test_reader_rejects_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.bin");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(b"NOPE and some more bytes to fill the preamble")
        .unwrap();
    drop(file);

    let err = ContainerReader::open(&path).unwrap_err();
    assert!(matches!(err, SimError::Container(_)));
}

#[test]
fn test_reader_rejects_oversized_header_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("oversized.wvfd");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[VERSION, 0, 0, 0]);
    bytes.extend_from_slice(&0u64.to_le_bytes());
    bytes.extend_from_slice(&(u64::MAX / 4).to_le_bytes());
    bytes.extend_from_slice(b"{}");
    fs::write(&path, bytes).unwrap();

    let err = ContainerReader::open(&path).unwrap_err();
    assert!(matches!(err, SimError::Container(_)), "{err}");
}

fn rewrite_header(path: &std::path::Path, edit: impl FnOnce(&mut ContainerHeader)) {
    let mut bytes = fs::read(path).unwrap();
    let header_len = u64::from_le_bytes(bytes[16..24].try_into().unwrap()) as usize;
    let mut header: ContainerHeader = serde_json::from_slice(&bytes[24..24 + header_len]).unwrap();
    edit(&mut header);

    let mut json = serde_json::to_vec(&header).unwrap();
    assert!(json.len() <= header_len, "edited header must not grow");
    json.resize(header_len, b' ');
    bytes[24..24 + header_len].copy_from_slice(&json);
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_reader_rejects_corrupt_dataset_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.wvfd");
    let mut session =
        Session::new(common::inclusion_block(&path, StrategyKind::Sequential, 2)).unwrap();
    session.execute().unwrap();

    // a displacement dataset that lost its grid axes
    rewrite_header(&path, |header| {
        let info = header
            .datasets
            .iter_mut()
            .find(|d| d.name == DisplacementComponent::X.name())
            .unwrap();
        info.shape.truncate(1);
    });
    let mut reader = ContainerReader::open(&path).unwrap();
    let err = reader.read_step(DisplacementComponent::X, 0).unwrap_err();
    assert!(matches!(err, SimError::Container(_)), "{err}");

    // a dataset claiming more chunks than the file holds
    rewrite_header(&path, |header| {
        let info = header.datasets.last_mut().unwrap();
        info.chunks *= 1000;
    });
    let err = ContainerReader::open(&path).unwrap_err();
    assert!(matches!(err, SimError::Container(_)), "{err}");
}

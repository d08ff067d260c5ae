//! Bench command - buffered I/O against a shared mapping.

use anyhow::{Context, Result};
use memmap2::MmapOptions;
use pageshadow_core::ShadowConfig;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Run the bench command.
///
/// Generates a file of `size` bytes (byte `i` is `i % 256`), then times
/// `iterations` rounds of read-modify-write through buffered I/O and through a
/// read-write shared mapping. The file must not exist beforehand; it is
/// created exclusively and removed afterwards.
pub fn run(
    config: &ShadowConfig,
    file: Option<PathBuf>,
    size: usize,
    iterations: u32,
) -> Result<()> {
    if size == 0 || iterations == 0 {
        anyhow::bail!("size and iterations must both be at least 1");
    }

    let path = file.unwrap_or_else(|| config.root.join("bench.dat"));
    generate(&path, size)?;
    tracing::info!(path = %path.display(), size, iterations, "Generated benchmark file");

    let result = measure(&path, iterations);
    if let Err(e) = std::fs::remove_file(&path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove benchmark file");
    }
    let (io, mmap) = result?;

    println!("File size:  {} bytes", size);
    println!("Iterations: {}", iterations);
    println!("Buffered I/O average: {:?}", io);
    println!("Shared mmap average:  {:?}", mmap);
    Ok(())
}

fn generate(path: &Path, size: usize) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Refusing to use {} for the benchmark", path.display()))?;
    let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
    file.write_all(&data)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn measure(path: &Path, iterations: u32) -> Result<(Duration, Duration)> {
    let mut io_total = Duration::ZERO;
    for _ in 0..iterations {
        let start = Instant::now();
        io_round(path)?;
        io_total += start.elapsed();
    }

    let mut mmap_total = Duration::ZERO;
    for _ in 0..iterations {
        let start = Instant::now();
        mmap_round(path)?;
        mmap_total += start.elapsed();
    }

    Ok((io_total / iterations, mmap_total / iterations))
}

fn io_round(path: &Path) -> Result<()> {
    let mut data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    for byte in data.iter_mut() {
        *byte = byte.wrapping_add(1);
    }
    std::fs::write(path, &data).with_context(|| format!("Failed to write {}", path.display()))
}

fn mmap_round(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    // SAFETY: the benchmark file is private to this process for the duration
    // of the mapping.
    let mut map = unsafe {
        MmapOptions::new()
            .map_mut(&file)
            .with_context(|| format!("Failed to map {}", path.display()))?
    };
    for byte in map.iter_mut() {
        *byte = byte.wrapping_add(1);
    }
    map.flush()
        .with_context(|| format!("Failed to flush {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn both_methods_modify_every_byte() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bench.dat");
        generate(&path, 1000).unwrap();

        io_round(&path).unwrap();
        mmap_round(&path).unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 1000);
        assert!(data.iter().enumerate().all(|(i, b)| *b == ((i % 256) as u8).wrapping_add(2)));
    }

    #[test]
    fn run_cleans_up_its_file() {
        let dir = tempdir().unwrap();
        let config = ShadowConfig::default().with_root(dir.path());

        run(&config, None, 4096, 2).unwrap();
        assert!(!dir.path().join("bench.dat").exists());
    }

    #[test]
    fn existing_file_is_left_alone() {
        let dir = tempdir().unwrap();
        let config = ShadowConfig::default().with_root(dir.path());
        let precious = dir.path().join("precious");
        std::fs::write(&precious, b"keep me").unwrap();

        assert!(run(&config, Some(precious.clone()), 4096, 1).is_err());
        assert_eq!(std::fs::read(&precious).unwrap(), b"keep me");

        std::fs::write(dir.path().join("bench.dat"), b"also mine").unwrap();
        assert!(run(&config, None, 4096, 1).is_err());
        assert_eq!(std::fs::read(dir.path().join("bench.dat")).unwrap(), b"also mine");
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let dir = tempdir().unwrap();
        let config = ShadowConfig::default().with_root(dir.path());
        assert!(run(&config, None, 4096, 0).is_err());
    }
}

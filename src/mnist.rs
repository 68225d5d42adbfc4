//! MNIST dataset loading from IDX format files
//!
//! Expects the four standard files (`train-images-idx3-ubyte`,
//! `train-labels-idx1-ubyte`, `t10k-images-idx3-ubyte`, `t10k-labels-idx1-ubyte`)
//! uncompressed under a data directory. Pixels are normalized to [0, 1] and each
//! image is flattened to a 784 element vector.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use thiserror::Error;

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// Errors for MNIST loading
#[derive(Debug, Error)]
pub enum MnistError {
    #[error("Failed to read MNIST file '{path}'")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid magic number 0x{magic:08x} in '{path}'")]
    BadMagic { path: PathBuf, magic: u32 },
    #[error("Image and label counts differ: {n_images} images, {n_labels} labels")]
    CountMismatch { n_images: usize, n_labels: usize },
}

/// One split of the dataset: flattened images and class labels
#[derive(Debug)]
pub struct MnistSplit {
    pub images: Vec<Vec<f32>>,
    pub labels: Vec<u8>,
}

/// Loads the training split from `dir`
pub fn load_training<P: AsRef<Path>>(dir: P) -> Result<MnistSplit, MnistError> {
    load_split(
        dir.as_ref().join("train-images-idx3-ubyte"),
        dir.as_ref().join("train-labels-idx1-ubyte"),
    )
}

/// Loads the held-out validation split from `dir`
pub fn load_validation<P: AsRef<Path>>(dir: P) -> Result<MnistSplit, MnistError> {
    load_split(
        dir.as_ref().join("t10k-images-idx3-ubyte"),
        dir.as_ref().join("t10k-labels-idx1-ubyte"),
    )
}

fn load_split(images_path: PathBuf, labels_path: PathBuf) -> Result<MnistSplit, MnistError> {
    let images = read_images(&images_path)?;
    let labels = read_labels(&labels_path)?;
    if images.len() != labels.len() {
        return Err(MnistError::CountMismatch {
            n_images: images.len(),
            n_labels: labels.len(),
        });
    }
    Ok(MnistSplit { images, labels })
}

fn open(path: &Path) -> Result<File, MnistError> {
    File::open(path).map_err(|source| MnistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_exact(file: &mut File, buf: &mut [u8], path: &Path) -> Result<(), MnistError> {
    file.read_exact(buf).map_err(|source| MnistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads an IDX image file, one normalized flattened vector per image
fn read_images(path: &Path) -> Result<Vec<Vec<f32>>, MnistError> {
    let mut file = open(path)?;

    // 16 byte header, big-endian: magic, count, rows, cols
    let mut header = [0u8; 16];
    read_exact(&mut file, &mut header, path)?;
    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if magic != IMAGES_MAGIC {
        return Err(MnistError::BadMagic {
            path: path.to_path_buf(),
            magic,
        });
    }
    let n_images = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let rows = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
    let cols = u32::from_be_bytes([header[12], header[13], header[14], header[15]]) as usize;

    let mut pixels = vec![0u8; n_images * rows * cols];
    read_exact(&mut file, &mut pixels, path)?;

    let images = pixels
        .chunks(rows * cols)
        .map(|image| image.iter().map(|&p| f32::from(p) / 255.0).collect())
        .collect();
    Ok(images)
}

/// Reads an IDX label file into class indices (0-9)
fn read_labels(path: &Path) -> Result<Vec<u8>, MnistError> {
    let mut file = open(path)?;

    // 8 byte header, big-endian: magic, count
    let mut header = [0u8; 8];
    read_exact(&mut file, &mut header, path)?;
    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if magic != LABELS_MAGIC {
        return Err(MnistError::BadMagic {
            path: path.to_path_buf(),
            magic,
        });
    }
    let n_labels = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let mut labels = vec![0u8; n_labels];
    read_exact(&mut file, &mut labels, path)?;
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_idx_images(path: &Path, images: &[[u8; 4]]) {
        let mut file = File::create(path).unwrap();
        file.write_all(&IMAGES_MAGIC.to_be_bytes()).unwrap();
        file.write_all(&(images.len() as u32).to_be_bytes()).unwrap();
        // 2x2 "images"
        file.write_all(&2u32.to_be_bytes()).unwrap();
        file.write_all(&2u32.to_be_bytes()).unwrap();
        for image in images {
            file.write_all(image).unwrap();
        }
    }

    fn write_idx_labels(path: &Path, labels: &[u8]) {
        let mut file = File::create(path).unwrap();
        file.write_all(&LABELS_MAGIC.to_be_bytes()).unwrap();
        file.write_all(&(labels.len() as u32).to_be_bytes()).unwrap();
        file.write_all(labels).unwrap();
    }

    #[test]
    fn test_read_images_and_labels() {
        let dir = std::env::temp_dir().join(format!("analog_grad_mnist_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let images_path = dir.join("images");
        let labels_path = dir.join("labels");
        write_idx_images(&images_path, &[[0, 255, 0, 255], [255, 0, 255, 0]]);
        write_idx_labels(&labels_path, &[3, 7]);

        let split = load_split(images_path, labels_path).unwrap();
        assert_eq!(split.images.len(), 2);
        assert_eq!(split.labels, vec![3, 7]);
        assert_eq!(split.images[0], vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(split.images[1], vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bad_magic() {
        let dir = std::env::temp_dir().join(format!("analog_grad_magic_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("labels_bad");
        // label file where an image file is expected, with enough labels that
        // the full 16 byte image header is readable before the magic check
        write_idx_labels(&path, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let err = read_images(&path).unwrap_err();
        assert!(matches!(
            err,
            MnistError::BadMagic {
                magic: LABELS_MAGIC,
                ..
            }
        ));
    }

    #[test]
    fn test_count_mismatch() {
        let dir = std::env::temp_dir().join(format!("analog_grad_count_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let images_path = dir.join("images");
        let labels_path = dir.join("labels");
        write_idx_images(&images_path, &[[0, 255, 0, 255]]);
        write_idx_labels(&labels_path, &[3, 7]);
        let err = load_split(images_path, labels_path).unwrap_err();
        assert!(matches!(
            err,
            MnistError::CountMismatch {
                n_images: 1,
                n_labels: 2
            }
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = load_training("does_not_exist").unwrap_err();
        assert!(matches!(err, MnistError::Io { .. }));
    }
}

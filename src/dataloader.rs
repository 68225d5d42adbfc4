//! Data loader

use std::collections::HashSet;

use rand::seq::SliceRandom;
use thiserror::Error;

use crate::values::Value;

/// Errors for the dataloader
#[derive(Debug, Error)]
pub enum DataLoaderError {
    #[error(
        "All input vectors must have the same dimension. Received different sizes: {input_dims:?}"
    )]
    InputDimensionMismatch { input_dims: HashSet<usize> },
    #[error("Labels must have the same length as the data")]
    LabelLengthMismatch { label_len: usize, data_len: usize },
    #[error("Batch size must be nonzero")]
    ZeroBatchSize,
}

/// Data loader, returns batches of data and class labels optionally shuffled
/// Takes inspiration from the PyTorch DataLoader
/// <https://pytorch.org/docs/stable/data.html#torch.utils.data.DataLoader>
pub struct DataLoader {
    data: Vec<Vec<Value>>,
    // class indices, not one hot encoded
    labels: Vec<u8>,
    batch_size: usize,
    shuffle: bool,
}

impl DataLoader {
    pub fn new(
        data: Vec<Vec<f32>>,
        labels: Vec<u8>,
        batch_size: usize,
        shuffle: bool,
    ) -> Result<Self, DataLoaderError> {
        if batch_size == 0 {
            return Err(DataLoaderError::ZeroBatchSize);
        }
        if data.len() != labels.len() {
            return Err(DataLoaderError::LabelLengthMismatch {
                label_len: labels.len(),
                data_len: data.len(),
            });
        }
        let input_dims = data.iter().map(|d| d.len()).collect::<HashSet<_>>();
        if input_dims.len() > 1 {
            return Err(DataLoaderError::InputDimensionMismatch { input_dims });
        }
        let data = data
            .iter()
            .map(|d| d.iter().map(|v| Value::new(*v)).collect())
            .collect();
        Ok(Self {
            data,
            labels,
            batch_size,
            shuffle,
        })
    }

    /// Number of examples in the dataset
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of batches per pass, counting a trailing partial batch
    pub fn n_batches(&self) -> usize {
        self.data.len().div_ceil(self.batch_size)
    }

    #[cfg(test)]
    fn seeded_iter(&self, seed: u64) -> DataLoaderIterator<'_> {
        use rand::SeedableRng;
        use rand_pcg::Pcg64Mcg;

        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let mut indices = (0..self.data.len()).collect::<Vec<_>>();
        indices.shuffle(&mut rng);
        DataLoaderIterator {
            data: &self.data,
            labels: &self.labels,
            batch_size: self.batch_size,
            indices,
            curr_iter: 0,
        }
    }

    pub fn iter(&self) -> DataLoaderIterator<'_> {
        let mut indices = (0..self.data.len()).collect::<Vec<_>>();
        if self.shuffle {
            indices.shuffle(&mut rand::rng());
        }
        DataLoaderIterator {
            data: &self.data,
            labels: &self.labels,
            batch_size: self.batch_size,
            indices,
            curr_iter: 0,
        }
    }
}

/// An iterator which returns mini batches of data and labels until the end of the dataset
/// The final batch may be smaller than `batch_size`
pub struct DataLoaderIterator<'a> {
    data: &'a [Vec<Value>],
    labels: &'a [u8],
    batch_size: usize,
    // optionally shuffled indices
    indices: Vec<usize>,
    curr_iter: usize,
}

impl<'a> Iterator for DataLoaderIterator<'a> {
    type Item = (Vec<&'a [Value]>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.curr_iter >= self.data.len() {
            return None;
        }
        let end = (self.curr_iter + self.batch_size).min(self.data.len());
        let batch_data = self.indices[self.curr_iter..end]
            .iter()
            .map(|&i| self.data[i].as_slice())
            .collect::<Vec<_>>();
        let batch_labels = self.indices[self.curr_iter..end]
            .iter()
            .map(|&i| self.labels[i])
            .collect::<Vec<_>>();
        self.curr_iter = end;
        Some((batch_data, batch_labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataloader() {
        let data = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let labels = vec![0, 1];
        let dataloader = DataLoader::new(data, labels, 2, false).unwrap();
        assert_eq!(dataloader.n_batches(), 1);
        let mut iter = dataloader.iter();
        assert_eq!(
            iter.next(),
            Some((
                vec![
                    [Value::new(1.0), Value::new(2.0), Value::new(3.0)].as_slice(),
                    [Value::new(4.0), Value::new(5.0), Value::new(6.0)].as_slice(),
                ],
                vec![0, 1],
            ))
        );
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_dataloader_partial_last_batch() {
        let data = vec![vec![1.0], vec![2.0], vec![3.0]];
        let labels = vec![0, 1, 0];
        let dataloader = DataLoader::new(data, labels, 2, false).unwrap();
        assert_eq!(dataloader.n_batches(), 2);
        let mut iter = dataloader.iter();
        let (batch, _) = iter.next().unwrap();
        assert_eq!(batch.len(), 2);
        let (batch, batch_labels) = iter.next().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch_labels, vec![0]);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_dataloader_shuffle() {
        let seed = 42;
        let data = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let labels = vec![0, 1];
        let dataloader = DataLoader::new(data, labels, 2, true).unwrap();
        let mut iter = dataloader.seeded_iter(seed);
        assert_eq!(
            iter.next(),
            Some((
                vec![
                    [Value::new(4.0), Value::new(5.0), Value::new(6.0)].as_slice(),
                    [Value::new(1.0), Value::new(2.0), Value::new(3.0)].as_slice(),
                ],
                vec![1, 0],
            ))
        );
    }

    #[test]
    fn test_dataloader_errors() {
        // different length data and labels
        let data = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let labels = vec![0, 1, 0];
        let expected_label_len = labels.len();
        let expected_data_len = data.len();
        let dataloader = DataLoader::new(data, labels, 2, false);
        assert!(matches!(
            dataloader,
            Err(DataLoaderError::LabelLengthMismatch {
                label_len,
                data_len,
            }) if label_len == expected_label_len && data_len == expected_data_len
        ));
    }

    #[test]
    fn test_dataloader_rejects_zero_batch_size() {
        let data = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let labels = vec![0, 1];
        let dataloader = DataLoader::new(data, labels, 0, false);
        assert!(matches!(dataloader, Err(DataLoaderError::ZeroBatchSize)));
    }
}

//! Batching a dataset in sequential or shuffled order.
//!
//! [`IndexedDataLoader`] yields `(indices, batch)` pairs, where `indices` are
//! the dataset positions of the examples in `batch`.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::collators::{Collate, IndexedCollate, IntoIndexed};
use crate::params::{match_params, CallerParams, ParamManifest};

/// Data loader options. Not every backend honours all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLoaderOptions {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub shuffle: bool,

    /// Skip a trailing batch smaller than `batch_size`.
    #[serde(default)]
    pub drop_last: bool,

    /// Shuffle seed. Unseeded shuffles differ between runs.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub num_workers: usize,

    #[serde(default)]
    pub pin_memory: bool,

    #[serde(default)]
    pub prefetch_factor: Option<usize>,

    #[serde(default)]
    pub persistent_workers: bool,
}

fn default_batch_size() -> usize {
    16
}

impl Default for DataLoaderOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            shuffle: false,
            drop_last: false,
            seed: None,
            num_workers: 0,
            pin_memory: false,
            prefetch_factor: None,
            persistent_workers: false,
        }
    }
}

impl DataLoaderOptions {
    /// These options as named parameters, each declared with its default.
    pub fn caller_params(&self) -> CallerParams {
        let defaults = Self::default();
        CallerParams::new()
            .declare("batch_size", defaults.batch_size)
            .declare("shuffle", defaults.shuffle)
            .declare("drop_last", defaults.drop_last)
            .declare("seed", defaults.seed)
            .declare("num_workers", defaults.num_workers)
            .declare("pin_memory", defaults.pin_memory)
            .declare("prefetch_factor", defaults.prefetch_factor)
            .declare("persistent_workers", defaults.persistent_workers)
            .set("batch_size", self.batch_size)
            .set("shuffle", self.shuffle)
            .set("drop_last", self.drop_last)
            .set("seed", self.seed)
            .set("num_workers", self.num_workers)
            .set("pin_memory", self.pin_memory)
            .set("prefetch_factor", self.prefetch_factor)
            .set("persistent_workers", self.persistent_workers)
    }

    /// The options `backend` accepts. Options it does not accept are dropped,
    /// with a warning when they were changed from their default.
    pub fn backend_options(&self, backend: &ParamManifest) -> BTreeMap<String, Value> {
        match match_params(&self.caller_params(), backend) {
            Some(matched) => matched.params,
            None => self.conservative_options(),
        }
    }

    fn conservative_options(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("batch_size".to_string(), Value::from(self.batch_size)),
            ("shuffle".to_string(), Value::from(self.shuffle)),
            ("drop_last".to_string(), Value::from(self.drop_last)),
        ])
    }
}

/// Iterates a dataset in batches of `(indices, collated examples)`.
pub struct IndexedDataLoader<'a, T, C> {
    dataset: &'a [T],
    collate: IndexedCollate<C>,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    drop_last: bool,
}

impl<'a, T, C> IndexedDataLoader<'a, T, C>
where
    T: Clone,
    C: Collate<T>,
{
    /// Options this loader understands; the rest are dropped.
    pub fn manifest() -> ParamManifest {
        ParamManifest::named("IndexedDataLoader", ["batch_size", "shuffle", "drop_last", "seed"])
    }

    pub fn new(dataset: &'a [T], collate: impl IntoIndexed<Inner = C>, options: &DataLoaderOptions) -> Self {
        let matched = options.backend_options(&Self::manifest());
        let batch_size = matched
            .get("batch_size")
            .and_then(Value::as_u64)
            .map_or(options.batch_size, |size| size as usize)
            .max(1);
        let shuffle = matched.get("shuffle").and_then(Value::as_bool).unwrap_or(false);
        let drop_last = matched.get("drop_last").and_then(Value::as_bool).unwrap_or(false);
        let seed = matched.get("seed").and_then(Value::as_u64);

        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if shuffle {
            let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
            order.shuffle(&mut rng);
        }
        debug!(examples = dataset.len(), batch_size, shuffle, drop_last, "Built data loader");

        Self {
            dataset,
            collate: collate.into_indexed(),
            order,
            cursor: 0,
            batch_size,
            drop_last,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches in one pass.
    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last { n / self.batch_size } else { n.div_ceil(self.batch_size) }
    }

    pub fn collate_fn(&self) -> &IndexedCollate<C> {
        &self.collate
    }
}

impl<T, C> Iterator for IndexedDataLoader<'_, T, C>
where
    T: Clone,
    C: Collate<T>,
{
    type Item = (Vec<usize>, C::Output);

    fn next(&mut self) -> Option<Self::Item> {
        let end = (self.cursor + self.batch_size).min(self.order.len());
        if self.cursor >= end || (self.drop_last && end - self.cursor < self.batch_size) {
            return None;
        }

        let batch = self.order[self.cursor..end].iter().map(|&i| (i, self.dataset[i].clone())).collect();
        self.cursor = end;
        Some(self.collate.collate(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collators::FnCollate;

    fn collect_ids(dataset: &[u32], options: &DataLoaderOptions) -> Vec<Vec<usize>> {
        let collate = FnCollate::new(|batch: Vec<u32>| batch);
        IndexedDataLoader::new(dataset, collate, options).map(|(indices, _)| indices).collect()
    }

    #[test]
    fn test_sequential_batches() {
        let data = [10, 11, 12, 13, 14];
        let options = DataLoaderOptions { batch_size: 2, ..Default::default() };
        assert_eq!(collect_ids(&data, &options), vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_indices_match_examples() {
        let data = [10, 11, 12];
        let options = DataLoaderOptions { batch_size: 2, shuffle: true, seed: Some(3), ..Default::default() };
        let loader = IndexedDataLoader::new(&data[..], FnCollate::new(|batch: Vec<u32>| batch), &options);
        for (indices, batch) in loader {
            let expected: Vec<u32> = indices.iter().map(|&i| data[i]).collect();
            assert_eq!(batch, expected);
        }
    }

    #[test]
    fn test_drop_last() {
        let data = [1, 2, 3, 4, 5];
        let options = DataLoaderOptions { batch_size: 2, drop_last: true, ..Default::default() };
        let loader = IndexedDataLoader::new(&data[..], FnCollate::new(|batch: Vec<u32>| batch), &options);
        assert_eq!(loader.num_batches(), 2);
        assert_eq!(collect_ids(&data, &options).len(), 2);
    }

    #[test]
    fn test_seeded_shuffle_is_deterministic_permutation() {
        let data: Vec<u32> = (0..20).collect();
        let options = DataLoaderOptions { batch_size: 4, shuffle: true, seed: Some(7), ..Default::default() };
        let first = collect_ids(&data, &options);
        assert_eq!(first, collect_ids(&data, &options));

        let mut all: Vec<usize> = first.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_backend_options_drop_unsupported() {
        let options = DataLoaderOptions { num_workers: 4, batch_size: 8, ..Default::default() };
        let accepted = options.backend_options(&ParamManifest::named("minimal", ["batch_size"]));
        assert_eq!(accepted, BTreeMap::from([("batch_size".to_string(), Value::from(8))]));

        let all = options.backend_options(&ParamManifest::any("everything"));
        assert_eq!(all.len(), 8);
        assert_eq!(all["seed"], Value::Null);
    }

    #[test]
    fn test_options_from_toml_use_defaults() {
        let options: DataLoaderOptions = toml::from_str("shuffle = true").unwrap();
        assert!(options.shuffle);
        assert_eq!(options.batch_size, 16);
        assert_eq!(options.seed, None);
    }
}

//! Partitioned (IVF-style) similarity index.
//!
//! Vectors are grouped into up to `nlist` inverted lists around centroids.
//! A query ranks the centroids and scans only the `nprobe` closest lists,
//! trading exactness for fewer distance computations. With no more records
//! than lists, every record is its own list and search is exact.
//!
//! Construction is deterministic: centroids are seeded from evenly strided
//! records and refined with a single k-means pass.

use crate::models::{IndexRecord, SearchHit};

use super::Metric;

/// Immutable, queryable snapshot of a collection.
#[derive(Debug, Clone)]
pub struct IvfIndex {
    metric: Metric,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<usize>>,
    records: Vec<IndexRecord>,
}

impl IvfIndex {
    /// Build the index over `records`.
    pub fn build(records: Vec<IndexRecord>, metric: Metric, nlist: usize) -> Self {
        let nlist = nlist.max(1);

        if records.len() <= nlist {
            let centroids = records.iter().map(|r| r.vector.clone()).collect();
            let lists = (0..records.len()).map(|i| vec![i]).collect();
            return Self {
                metric,
                centroids,
                lists,
                records,
            };
        }

        let stride = records.len() / nlist;
        let mut centroids: Vec<Vec<f32>> = (0..nlist)
            .map(|i| records[i * stride].vector.clone())
            .collect();

        let lists = assign(&records, &centroids, metric);
        for (centroid, members) in centroids.iter_mut().zip(lists.iter()) {
            if let Some(mean) = mean_vector(&records, members) {
                *centroid = mean;
            }
        }
        let lists = assign(&records, &centroids, metric);

        Self {
            metric,
            centroids,
            lists,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of non-empty inverted lists.
    pub fn list_count(&self) -> usize {
        self.lists.iter().filter(|l| !l.is_empty()).count()
    }

    /// Top-`k` search scanning the `nprobe` lists closest to `query`.
    pub fn search(&self, query: &[f32], k: usize, nprobe: usize) -> Vec<SearchHit> {
        if k == 0 || self.records.is_empty() {
            return Vec::new();
        }

        let mut ranked_lists: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, self.metric.distance(query, c)))
            .collect();
        ranked_lists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut candidates: Vec<(usize, f32)> = ranked_lists
            .iter()
            .take(nprobe.max(1))
            .flat_map(|(list, _)| self.lists[*list].iter().copied())
            .map(|i| (i, self.metric.distance(query, &self.records[i].vector)))
            .collect();

        // Distance ascending, then id ascending for a stable order.
        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(self.records[a.0].id.cmp(&self.records[b.0].id))
        });
        candidates.truncate(k);

        candidates
            .into_iter()
            .map(|(i, distance)| {
                let r = &self.records[i];
                SearchHit {
                    id: r.id,
                    text: r.text.clone(),
                    source: r.source.clone(),
                    score: self.metric.score(distance),
                }
            })
            .collect()
    }
}

fn assign(records: &[IndexRecord], centroids: &[Vec<f32>], metric: Metric) -> Vec<Vec<usize>> {
    let mut lists = vec![Vec::new(); centroids.len()];
    for (i, record) in records.iter().enumerate() {
        let nearest = centroids
            .iter()
            .enumerate()
            .map(|(c, centroid)| (c, metric.distance(&record.vector, centroid)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(c, _)| c)
            .unwrap_or(0);
        lists[nearest].push(i);
    }
    lists
}

fn mean_vector(records: &[IndexRecord], members: &[usize]) -> Option<Vec<f32>> {
    let first = members.first()?;
    let mut mean = vec![0.0f32; records[*first].vector.len()];
    for &i in members {
        for (m, x) in mean.iter_mut().zip(records[i].vector.iter()) {
            *m += x;
        }
    }
    let n = members.len() as f32;
    for m in mean.iter_mut() {
        *m /= n;
    }
    Some(mean)
}

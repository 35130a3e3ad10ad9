//! Perceptual similarity engine for sampled frames.
//!
//! Frames are fingerprinted with a 64-bit DCT perceptual hash and compared
//! by Hamming distance. Clustering is greedy first-fit in input order: each
//! frame is compared only with the first member of every existing cluster
//! and joins the first one within the threshold. A frame can therefore join
//! a cluster whose later members have drifted away from it. The grouping is
//! not optimal but it is deterministic for a fixed order and threshold.

use std::fmt;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use rayon::prelude::*;
use rustdct::{Dct2, DctPlanner};

use crate::error::{MediaError, MediaResult};

/// Default Hamming distance under which two frames are considered duplicates.
pub const DEFAULT_HAMMING_THRESHOLD: u32 = 8;

/// Side of the grayscale thumbnail fed to the DCT.
const HASH_IMAGE_SIZE: usize = 32;
/// Side of the low-frequency block kept from the DCT.
const HASH_BLOCK_SIZE: usize = 8;

/// 64-bit perceptual fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Hamming distance between two fingerprints.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        distance(*self, *other)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.0)
    }
}

/// Hamming distance between two fingerprints.
pub fn distance(a: Fingerprint, b: Fingerprint) -> u32 {
    (a.0 ^ b.0).count_ones()
}

/// Compute the perceptual hash of an image.
///
/// The image is converted to grayscale, resized to 32x32, transformed with a
/// 2-D DCT-II, and the top-left 8x8 coefficients are thresholded against
/// their median.
pub fn fingerprint(image: &DynamicImage) -> Fingerprint {
    let small = image
        .grayscale()
        .resize_exact(HASH_IMAGE_SIZE as u32, HASH_IMAGE_SIZE as u32, FilterType::Lanczos3)
        .to_luma8();

    let mut matrix: Vec<f32> = small.pixels().map(|p| f32::from(p.0[0])).collect();
    dct_2d(&mut matrix, HASH_IMAGE_SIZE);

    let mut low = Vec::with_capacity(HASH_BLOCK_SIZE * HASH_BLOCK_SIZE);
    for row in 0..HASH_BLOCK_SIZE {
        let start = row * HASH_IMAGE_SIZE;
        low.extend_from_slice(&matrix[start..start + HASH_BLOCK_SIZE]);
    }

    let median = median(&low);
    let bits = low
        .iter()
        .fold(0u64, |acc, &c| (acc << 1) | u64::from(c > median));

    Fingerprint(bits)
}

/// In-place separable 2-D DCT-II over a square row-major matrix.
fn dct_2d(matrix: &mut [f32], size: usize) {
    let mut planner = DctPlanner::new();
    let dct = planner.plan_dct2(size);

    for row in matrix.chunks_exact_mut(size) {
        dct.process_dct2(row);
    }

    let mut column = vec![0f32; size];
    for col in 0..size {
        for (r, value) in column.iter_mut().enumerate() {
            *value = matrix[r * size + col];
        }
        dct.process_dct2(&mut column);
        for (r, value) in column.iter().enumerate() {
            matrix[r * size + col] = *value;
        }
    }
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Focus measure: variance of the 4-neighbour Laplacian over the grayscale image.
///
/// Border pixels are skipped. Images smaller than 3x3 score 0.
pub fn sharpness(image: &DynamicImage) -> f64 {
    laplacian_variance(&image.to_luma8())
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| f64::from(gray.get_pixel(x, y).0[0]);
    let count = f64::from((w - 2) * (h - 2));
    let mut sum = 0.0;
    let mut sum_sq = 0.0;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let response =
                px(x, y - 1) + px(x - 1, y) + px(x + 1, y) + px(x, y + 1) - 4.0 * px(x, y);
            sum += response;
            sum_sq += response * response;
        }
    }

    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}

/// Per-frame attributes computed once from the decoded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFeatures {
    pub fingerprint: Fingerprint,
    pub sharpness: f64,
}

/// Decode one image and compute its features.
///
/// Undecodable images are an error; no placeholder hash is substituted.
pub fn analyze_frame(path: &Path) -> MediaResult<FrameFeatures> {
    let image = image::open(path).map_err(|e| MediaError::image_decode(path, e.to_string()))?;
    Ok(FrameFeatures {
        fingerprint: fingerprint(&image),
        sharpness: sharpness(&image),
    })
}

/// Analyze many frames in parallel, preserving input order.
pub fn analyze_frames(paths: &[PathBuf]) -> MediaResult<Vec<FrameFeatures>> {
    paths.par_iter().map(|p| analyze_frame(p)).collect()
}

/// Group of near-duplicate frames, stored as indices into the input slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Index of the first frame, which every candidate is compared against
    pub representative: usize,
    /// All member indices in input order, representative first
    pub members: Vec<usize>,
}

/// Greedy first-fit clustering in input order.
///
/// A `threshold` of 0 merges only identical fingerprints.
pub fn cluster(fingerprints: &[Fingerprint], threshold: u32) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for (index, fp) in fingerprints.iter().enumerate() {
        let home = clusters
            .iter_mut()
            .find(|c| distance(fingerprints[c.representative], *fp) <= threshold);

        match home {
            Some(c) => c.members.push(index),
            None => clusters.push(Cluster {
                representative: index,
                members: vec![index],
            }),
        }
    }

    clusters
}

/// Member with the highest sharpness; ties go to the earliest member.
pub fn select_representative(cluster: &Cluster, sharpness: &[f64]) -> usize {
    let mut best = cluster.representative;
    for &member in &cluster.members {
        if sharpness[member] > sharpness[best] {
            best = member;
        }
    }
    best
}

/// Cluster frames and keep the sharpest of each cluster.
///
/// Returns the kept indices in ascending (time) order.
pub fn deduplicate(features: &[FrameFeatures], threshold: u32) -> Vec<usize> {
    let fingerprints: Vec<Fingerprint> = features.iter().map(|f| f.fingerprint).collect();
    let sharpness: Vec<f64> = features.iter().map(|f| f.sharpness).collect();

    let mut kept: Vec<usize> = cluster(&fingerprints, threshold)
        .iter()
        .map(|c| select_representative(c, &sharpness))
        .collect();
    kept.sort_unstable();
    kept
}

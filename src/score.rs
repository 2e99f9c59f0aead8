//! Structural-similarity scoring of reference versus captured images.

use crate::rows::{ImageBytes, SENTINEL_SCORE};
use image::imageops::{self, FilterType};
use image::GrayImage;
use image_compare::Algorithm;
use log::debug;

/// Scores how closely `candidate` matches `reference`, as a percentage.
///
/// Both images are decoded to grayscale and the candidate is resized to the
/// reference's exact dimensions before comparing; aspect-ratio mismatches are
/// deliberately discarded, so the score is not symmetric in its arguments.
/// Undecodable input yields the sentinel rather than an error. The SSIM index
/// lives in [-1, 1], so extreme dissimilarity can produce a negative
/// percentage; callers must not assume non-negativity.
pub fn similarity(reference: &ImageBytes, candidate: &ImageBytes) -> f64 {
    let Some(reference) = decode_gray(reference) else {
        return SENTINEL_SCORE;
    };
    let Some(candidate) = decode_gray(candidate) else {
        return SENTINEL_SCORE;
    };

    let candidate = if candidate.dimensions() == reference.dimensions() {
        candidate
    } else {
        imageops::resize(
            &candidate,
            reference.width(),
            reference.height(),
            FilterType::Triangle,
        )
    };

    match image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, &reference, &candidate)
    {
        Ok(result) => round_percent(result.score),
        Err(err) => {
            debug!("ssim comparison failed: {err:?}");
            SENTINEL_SCORE
        }
    }
}

fn decode_gray(bytes: &ImageBytes) -> Option<GrayImage> {
    image::load_from_memory(bytes.as_bytes())
        .ok()
        .map(|img| img.to_luma8())
}

fn round_percent(index: f64) -> f64 {
    (index * 100.0 * 100.0).round() / 100.0
}

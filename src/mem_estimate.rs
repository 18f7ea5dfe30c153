//! Closed-form peak-memory estimate for ROI/binning compression jobs,
//! for choosing chunk counts that fit a node's RAM before submitting.

/// Memory multiple observed for the SZ stage
const SZ_MEM_MULTIPLE: f64 = 3.0;
/// Memory multiple observed for the fpzip stage
const FPZIP_MEM_MULTIPLE: f64 = 3.0;
/// Bin sizes used by the binning stage
const BIN_X: f64 = 2.0;
const BIN_Y: f64 = 2.0;
/// ROI sizes (2x+1 since this is what the compressor does)
const ROI_X: f64 = 17.0;
const ROI_Y: f64 = 17.0;
/// Detector frame dimensions
const DIM_X: f64 = 1480.0;
const DIM_Y: f64 = 1552.0;
/// float32 elements are 4 bytes
const ELEMENT_SIZE: f64 = 4.0;
/// Maximum number of peaks in a single chunk
const MAX_PEAKS_PER_CHUNK: f64 = 2048.0;

/// Upper-bound estimate of the peak memory footprint in bytes for
/// compressing `chunks` frames per core on `cores` cores. An estimate,
/// not a measurement; inputs are taken as given, without range checks.
pub fn estimate_bytes(chunks: u64, cores: u64) -> u64 {
    let per_chunk = (1.0 + (2.0 * SZ_MEM_MULTIPLE) / (BIN_X * BIN_Y)) * DIM_X * DIM_Y
        + (1.0 + FPZIP_MEM_MULTIPLE) * ROI_X * ROI_Y * MAX_PEAKS_PER_CHUNK
        + 7.0 * MAX_PEAKS_PER_CHUNK
        + 1.0;
    (cores as f64 * chunks as f64 * ELEMENT_SIZE * per_chunk) as u64
}

/// Render a byte count with one decimal place in the smallest binary
/// unit keeping the scaled value below 1024 (>= 1024 gb stays gb).
pub fn to_human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes < KB {
        format!("{bytes:.1}b")
    } else if bytes < MB {
        format!("{:.1}kb", bytes / KB)
    } else if bytes < GB {
        format!("{:.1}mb", bytes / MB)
    } else {
        format!("{:.1}gb", bytes / GB)
    }
}

use crate::FbError;

/// Color accumulated from `count` samples. A zero count means zero color.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccumulatedSample {
    pub color: [f32; 3],
    pub count: f32,
}

impl AccumulatedSample {
    pub fn new(color: [f32; 3], count: f32) -> Self {
        Self { color, count }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Combines two accumulations, weighting each color by its share of samples.
pub fn merge(a: AccumulatedSample, b: AccumulatedSample) -> AccumulatedSample {
    let total = a.count + b.count;
    if total > 0.0 {
        let wa = a.count / total;
        let wb = b.count / total;
        AccumulatedSample {
            color: std::array::from_fn(|i| a.color[i] * wa + b.color[i] * wb),
            count: total,
        }
    } else {
        AccumulatedSample::zero()
    }
}

/// Per-pixel [`merge`] of `src` into `acc` over interleaved buffers with
/// `num_chan` values and one count per pixel.
pub fn merge_weighted(
    acc: &mut [f32],
    acc_counts: &mut [f32],
    src: &[f32],
    src_counts: &[f32],
    num_chan: usize,
) -> Result<(), FbError> {
    if src.len() != acc.len() {
        return Err(FbError::mismatch("merge buffer length", acc.len(), src.len()));
    }
    if acc_counts.len() != src_counts.len() {
        return Err(FbError::mismatch(
            "merge count length",
            acc_counts.len(),
            src_counts.len(),
        ));
    }
    if acc_counts.len() * num_chan != acc.len() {
        return Err(FbError::mismatch(
            "merge count length",
            acc.len() / num_chan.max(1),
            acc_counts.len(),
        ));
    }

    for (pixel, (acc_n, &src_n)) in acc_counts.iter_mut().zip(src_counts).enumerate() {
        let range = pixel * num_chan..(pixel + 1) * num_chan;
        let total = *acc_n + src_n;
        if total > 0.0 {
            let wa = *acc_n / total;
            let wb = src_n / total;
            for (dst, &value) in acc[range.clone()].iter_mut().zip(&src[range]) {
                *dst = *dst * wa + value * wb;
            }
            *acc_n = total;
        } else {
            acc[range].fill(0.0);
            *acc_n = 0.0;
        }
    }
    Ok(())
}

const GAMMA: f32 = 2.2;

/// Gamma-2.2 encodes a linear value to 8 bits. Non-positive input maps to 0.
pub fn gamma22_to_u8(value: f32) -> u8 {
    if value <= 0.0 {
        return 0;
    }
    (value.powf(1.0 / GAMMA) * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

pub fn u8_gamma22_to_linear(code: u8) -> f32 {
    (code as f32 / 255.0).powf(GAMMA)
}

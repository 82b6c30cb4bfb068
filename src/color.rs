//! Packed RGBA colors for the visualization raster.

/// An 8-bit-per-channel color, channels widened to `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub a: i32,
}

/// Class colors used by the rasterization kernel, indexed by output row.
pub const PALETTE: [Color; 6] = [
    Color::rgb(32, 64, 160),
    Color::rgb(224, 96, 32),
    Color::rgb(48, 176, 80),
    Color::rgb(200, 40, 120),
    Color::rgb(230, 210, 60),
    Color::rgb(90, 200, 220),
];

impl Color {
    /// Creates a color from all four channels.
    pub const fn new(r: i32, g: i32, b: i32, a: i32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color.
    pub const fn rgb(r: i32, g: i32, b: i32) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Packs the color as `0xAARRGGBB`, each channel clamped to 0..=255.
    pub fn to_bits(self) -> i32 {
        let c = |v: i32| v.clamp(0, 255) as u32;
        let bits = (c(self.a) << 24) | (c(self.r) << 16) | (c(self.g) << 8) | c(self.b);
        bits as i32
    }

    /// Unpacks a `0xAARRGGBB` value.
    pub fn from_bits(bits: i32) -> Self {
        let bits = bits as u32;
        Self {
            a: ((bits >> 24) & 0xff) as i32,
            r: ((bits >> 16) & 0xff) as i32,
            g: ((bits >> 8) & 0xff) as i32,
            b: (bits & 0xff) as i32,
        }
    }

    /// Linear blend toward `other`; `percent` 0 keeps `self`, 1 yields `other`.
    pub fn blend(self, other: Color, percent: f64) -> Color {
        let mix = |from: i32, to: i32| from + ((to - from) as f64 * percent).round() as i32;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

/// Maps one column of output activations to a packed pixel.
///
/// A single output blends the first two palette entries by the clamped
/// activation. Several outputs weight each class color by its clamped
/// activation. `discrete` snaps to the winning class instead.
pub fn shade(outputs: &[f32], discrete: bool) -> i32 {
    match outputs {
        [] => Color::new(0, 0, 0, 255).to_bits(),
        [single] => {
            let mut t = single.clamp(0.0, 1.0);
            if discrete {
                t = if t > 0.5 { 1.0 } else { 0.0 };
            }
            PALETTE[0].blend(PALETTE[1], t as f64).to_bits()
        }
        many => {
            if discrete {
                let best = many
                    .iter()
                    .enumerate()
                    .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
                        if v > best.1 {
                            (i, v)
                        } else {
                            best
                        }
                    })
                    .0;
                return PALETTE[best % PALETTE.len()].to_bits();
            }
            let mut acc = [0.0f64; 3];
            let mut total = 0.0f64;
            for (i, &v) in many.iter().enumerate() {
                let w = v.clamp(0.0, 1.0) as f64;
                let c = PALETTE[i % PALETTE.len()];
                acc[0] += w * c.r as f64;
                acc[1] += w * c.g as f64;
                acc[2] += w * c.b as f64;
                total += w;
            }
            if total <= 0.0 {
                return Color::new(0, 0, 0, 255).to_bits();
            }
            Color::rgb(
                (acc[0] / total).round() as i32,
                (acc[1] / total).round() as i32,
                (acc[2] / total).round() as i32,
            )
            .to_bits()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_roundtrip() {
        let c = Color::new(12, 34, 56, 255);
        assert_eq!(Color::from_bits(c.to_bits()), c);
    }

    #[test]
    fn test_blend_endpoints() {
        let a = Color::rgb(0, 0, 0);
        let b = Color::rgb(200, 100, 50);
        assert_eq!(a.blend(b, 0.0), a);
        assert_eq!(a.blend(b, 1.0), b);
        assert_eq!(a.blend(b, 0.5), Color::rgb(100, 50, 25));
    }

    #[test]
    fn test_shade_discrete_single() {
        assert_eq!(shade(&[0.9], true), PALETTE[1].to_bits());
        assert_eq!(shade(&[0.1], true), PALETTE[0].to_bits());
    }

    #[test]
    fn test_shade_discrete_argmax() {
        assert_eq!(shade(&[0.1, 0.2, 0.7], true), PALETTE[2].to_bits());
    }
}

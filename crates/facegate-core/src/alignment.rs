//! Face alignment via a 4-DOF similarity transform.
//!
//! Maps the five detected landmarks onto the canonical 112×112 recognition
//! template and warps the RGB image accordingly.

use image::{Rgb, RgbImage};

/// Canonical landmark positions for a 112×112 crop
/// (left eye, right eye, nose, left mouth corner, right mouth corner).
pub const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

pub const ALIGNED_SIZE: u32 = 112;

/// Similarity transform `dst = s·R·src + t`, stored as `[a, b, tx, ty]` with
/// `a = s·cosθ`, `b = s·sinθ`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Similarity {
    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    /// Inverse mapping, or `None` for a degenerate (zero-scale) transform.
    pub fn invert(&self) -> Option<Similarity> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Similarity {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }

    /// Least-squares fit from `src` to `dst` (closed form on centred points).
    pub fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Similarity {
        let centroid = |pts: &[(f32, f32); 5]| {
            let (sx, sy) = pts.iter().fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
            (sx / 5.0, sy / 5.0)
        };
        let (scx, scy) = centroid(src);
        let (dcx, dcy) = centroid(dst);

        let mut dot = 0.0f32;
        let mut cross = 0.0f32;
        let mut norm = 0.0f32;
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
            let (sx, sy) = (sx - scx, sy - scy);
            let (dx, dy) = (dx - dcx, dy - dcy);
            dot += sx * dx + sy * dy;
            cross += sx * dy - sy * dx;
            norm += sx * sx + sy * sy;
        }

        if norm < 1e-12 {
            // All landmarks collapsed onto one point: translate only.
            return Similarity { a: 1.0, b: 0.0, tx: dcx - scx, ty: dcy - scy };
        }

        let a = dot / norm;
        let b = cross / norm;
        Similarity {
            a,
            b,
            tx: dcx - (a * scx - b * scy),
            ty: dcy - (b * scx + a * scy),
        }
    }
}

/// Bilinear sample; out-of-bounds neighbours read as black.
fn sample(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let px = |xi: i64, yi: i64| -> [f32; 3] {
        if xi >= 0 && xi < w && yi >= 0 && yi < h {
            let p = image.get_pixel(xi as u32, yi as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32]
        } else {
            [0.0; 3]
        }
    };

    let (tl, tr, bl, br) = (px(x0, y0), px(x0 + 1, y0), px(x0, y0 + 1), px(x0 + 1, y0 + 1));
    let mut out = [0u8; 3];
    for c in 0..3 {
        let v = tl[c] * (1.0 - fx) * (1.0 - fy)
            + tr[c] * fx * (1.0 - fy)
            + bl[c] * (1.0 - fx) * fy
            + br[c] * fx * fy;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Warp `image` so that `transform` maps it into an `out_size`² crop.
fn warp(image: &RgbImage, transform: &Similarity, out_size: u32) -> RgbImage {
    let Some(inverse) = transform.invert() else {
        return RgbImage::new(out_size, out_size);
    };
    RgbImage::from_fn(out_size, out_size, |ox, oy| {
        let (sx, sy) = inverse.apply((ox as f32, oy as f32));
        sample(image, sx, sy)
    })
}

/// Align a detected face to the canonical 112×112 recognition crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let transform = Similarity::estimate(landmarks, &REFERENCE_LANDMARKS_112);
    warp(image, &transform, ALIGNED_SIZE)
}

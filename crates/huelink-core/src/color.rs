// Color and gamut conversion
//
// Different fixture generations support different chromaticity gamuts,
// so an RGB color must be converted per light, keyed by the light's
// model identifier. The pipeline follows the vendor's published math:
// inverse sRGB gamma, Wide-RGB-D65 matrix to XYZ, xy chromaticity, then
// clamping to the nearest point inside the target gamut triangle.

/// An 8-bit-per-channel RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Unpack `0xRRGGBB`.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            r: (packed >> 16) as u8,
            g: (packed >> 8) as u8,
            b: packed as u8,
        }
    }
}

/// A CIE 1931 chromaticity point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XyPoint {
    pub x: f64,
    pub y: f64,
}

impl XyPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<XyPoint> for [f64; 2] {
    fn from(p: XyPoint) -> Self {
        [p.x, p.y]
    }
}

/// D65 white point — fallback for colors with no chromaticity (black).
const WHITE_POINT: XyPoint = XyPoint::new(0.3127, 0.3290);

/// The triangle of chromaticities a fixture can reproduce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gamut {
    pub red: XyPoint,
    pub green: XyPoint,
    pub blue: XyPoint,
}

/// Gamut A: early LivingColors and friends-of-hue lamps.
pub const GAMUT_A: Gamut = Gamut {
    red: XyPoint::new(0.704, 0.296),
    green: XyPoint::new(0.2151, 0.7106),
    blue: XyPoint::new(0.138, 0.08),
};

/// Gamut B: first-generation hue bulbs.
pub const GAMUT_B: Gamut = Gamut {
    red: XyPoint::new(0.675, 0.322),
    green: XyPoint::new(0.409, 0.518),
    blue: XyPoint::new(0.167, 0.04),
};

/// Gamut C: richer-color third-generation bulbs and lightstrip plus.
pub const GAMUT_C: Gamut = Gamut {
    red: XyPoint::new(0.692, 0.308),
    green: XyPoint::new(0.17, 0.7),
    blue: XyPoint::new(0.153, 0.048),
};

/// The full CIE triangle — used when the model is unknown; the bridge
/// clamps to the light's real gamut itself then.
pub const GAMUT_FULL: Gamut = Gamut {
    red: XyPoint::new(1.0, 0.0),
    green: XyPoint::new(0.0, 1.0),
    blue: XyPoint::new(0.0, 0.0),
};

const GAMUT_A_MODELS: &[&str] = &[
    "LST001", "LLC005", "LLC006", "LLC007", "LLC010", "LLC011", "LLC012", "LLC013", "LLC014",
];
const GAMUT_B_MODELS: &[&str] = &["LCT001", "LCT002", "LCT003", "LCT007", "LLM001"];
const GAMUT_C_MODELS: &[&str] = &[
    "LCT010", "LCT011", "LCT012", "LCT014", "LCT015", "LCT016", "LLC020", "LST002",
];

/// Gamut profile for a fixture, keyed by model identifier. The firmware
/// version is part of the key for forward compatibility (the vendor has
/// shipped gamut changes in firmware before) but currently unused.
pub fn gamut_for_model(model_id: &str, _sw_version: &str) -> Gamut {
    if GAMUT_A_MODELS.contains(&model_id) {
        GAMUT_A
    } else if GAMUT_B_MODELS.contains(&model_id) {
        GAMUT_B
    } else if GAMUT_C_MODELS.contains(&model_id) {
        GAMUT_C
    } else {
        GAMUT_FULL
    }
}

impl Gamut {
    /// Convert an RGB color into a chromaticity point inside this gamut.
    pub fn xy_from_rgb(&self, rgb: Rgb) -> XyPoint {
        let r = inverse_gamma(f64::from(rgb.r) / 255.0);
        let g = inverse_gamma(f64::from(rgb.g) / 255.0);
        let b = inverse_gamma(f64::from(rgb.b) / 255.0);

        // Wide RGB D65 conversion.
        let x = 0.649_926 * r + 0.103_455 * g + 0.197_109 * b;
        let y = 0.234_327 * r + 0.743_075 * g + 0.022_598 * b;
        let z = 0.053_077 * g + 1.035_763 * b;

        let sum = x + y + z;
        if sum <= f64::EPSILON {
            return self.clamp(WHITE_POINT);
        }

        self.clamp(XyPoint::new(x / sum, y / sum))
    }

    /// Clamp a chromaticity point into this gamut: points inside the
    /// triangle pass through, points outside map to the closest point on
    /// the triangle's boundary.
    pub fn clamp(&self, point: XyPoint) -> XyPoint {
        if self.contains(point) {
            return point;
        }

        let candidates = [
            closest_on_segment(self.red, self.green, point),
            closest_on_segment(self.green, self.blue, point),
            closest_on_segment(self.blue, self.red, point),
        ];

        candidates
            .into_iter()
            .min_by(|a, b| {
                distance_sq(*a, point)
                    .partial_cmp(&distance_sq(*b, point))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(WHITE_POINT)
    }

    fn contains(&self, p: XyPoint) -> bool {
        let d1 = cross(p, self.red, self.green);
        let d2 = cross(p, self.green, self.blue);
        let d3 = cross(p, self.blue, self.red);

        let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
        let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
        !(has_neg && has_pos)
    }
}

/// sRGB inverse gamma (linearization).
fn inverse_gamma(channel: f64) -> f64 {
    if channel > 0.04045 {
        ((channel + 0.055) / 1.055).powf(2.4)
    } else {
        channel / 12.92
    }
}

fn cross(p: XyPoint, a: XyPoint, b: XyPoint) -> f64 {
    (p.x - b.x) * (a.y - b.y) - (a.x - b.x) * (p.y - b.y)
}

fn distance_sq(a: XyPoint, b: XyPoint) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

fn closest_on_segment(a: XyPoint, b: XyPoint, p: XyPoint) -> XyPoint {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f64::EPSILON {
        return a;
    }

    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    XyPoint::new(a.x + t * abx, a.y + t * aby)
}

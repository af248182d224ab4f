use std::fmt;
use std::fmt::Write as _;

use winnow::binary::{le_u16, le_u32, u8};
use winnow::prelude::*;
use winnow::token::take;

/// Device configuration a collection of resource entries is designed for.
///
/// Zero always means "unspecified"; no real qualifier encodes as zero on
/// any of these axes, which every comparison below relies on. Axes are
/// compared in declaration order: imsi, locale, orientation, touchscreen,
/// screen size, version.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResTableConfig {
    /// Mobile country code (from SIM)
    pub mcc: u16,

    /// Mobile network code (from SIM)
    pub mnc: u16,

    /// Two-letter language code, e.g. `*b"fr"`
    pub language: [u8; 2],

    /// Two-letter country code, e.g. `*b"CA"`
    pub country: [u8; 2],

    /// 1 = portrait, 2 = landscape, 3 = square
    pub orientation: u8,

    /// 1 = notouch, 2 = stylus, 3 = finger
    pub touchscreen: u8,

    /// Screen width in pixels
    pub screen_width: u16,

    /// Screen height in pixels
    pub screen_height: u16,

    /// Platform SDK version the entries require
    pub sdk_version: u16,

    /// Currently always 0 in practice
    pub minor_version: u16,
}

impl ResTableConfig {
    /// Parse the on-disk config record. The record carries its own size and
    /// regularly holds more fields than the axes consulted here (density,
    /// input, screen layout, locale script, ...); everything past the
    /// version pair is skipped using the declared size.
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableConfig> {
        let start = input.len();

        let size = le_u32.parse_next(input)?;

        let mut config = ResTableConfig::default();

        (le_u16, le_u16)
            .map(|(mcc, mnc)| {
                config.mcc = mcc;
                config.mnc = mnc;
            })
            .parse_next(input)?;

        (u8, u8, u8, u8)
            .map(|(l0, l1, c0, c1)| {
                config.language = [l0, l1];
                config.country = [c0, c1];
            })
            .parse_next(input)?;

        // density rides along in the screen-type word but is not an axis
        // this resolver consults
        (u8, u8, le_u16)
            .map(|(orientation, touchscreen, _density)| {
                config.orientation = orientation;
                config.touchscreen = touchscreen;
            })
            .parse_next(input)?;

        if size >= 20 {
            // keyboard, navigation, input flags, padding: layout only
            let _ = le_u32.parse_next(input)?;
        }
        if size >= 24 {
            (le_u16, le_u16)
                .map(|(width, height)| {
                    config.screen_width = width;
                    config.screen_height = height;
                })
                .parse_next(input)?;
        }
        if size >= 28 {
            (le_u16, le_u16)
                .map(|(sdk, minor)| {
                    config.sdk_version = sdk;
                    config.minor_version = minor;
                })
                .parse_next(input)?;
        }

        // consume whatever the record declares beyond the consulted fields
        let consumed = (start - input.len()) as u32;
        let _ = take(size.saturating_sub(consumed) as usize).parse_next(input)?;

        Ok(config)
    }

    /// Whether `self` is usable as a candidate for `requested`.
    ///
    /// Per axis: an unspecified request selects only candidates that leave
    /// the axis unspecified; a specified request accepts an unspecified or
    /// equal candidate. Screen size and minor version relax the first half
    /// (a sized candidate stays eligible for an unsized request); the sdk
    /// axis instead rejects any candidate demanding a newer platform than
    /// requested.
    pub fn matches(&self, requested: &ResTableConfig) -> bool {
        // imsi
        if requested.mcc == 0 {
            if self.mcc != 0 {
                return false;
            }
        } else if self.mcc != 0 && self.mcc != requested.mcc {
            return false;
        }
        if requested.mnc == 0 {
            if self.mnc != 0 {
                return false;
            }
        } else if self.mnc != 0 && self.mnc != requested.mnc {
            return false;
        }

        // locale
        if requested.language[0] == 0 {
            if self.language[0] != 0 {
                return false;
            }
        } else if self.language[0] != 0 && self.language != requested.language {
            return false;
        }
        if requested.country[0] == 0 {
            if self.country[0] != 0 {
                return false;
            }
        } else if self.country[0] != 0 && self.country != requested.country {
            return false;
        }

        // screen type
        if requested.orientation == 0 {
            if self.orientation != 0 {
                return false;
            }
        } else if self.orientation != 0 && self.orientation != requested.orientation {
            return false;
        }
        if requested.touchscreen == 0 {
            if self.touchscreen != 0 {
                return false;
            }
        } else if self.touchscreen != 0 && self.touchscreen != requested.touchscreen {
            return false;
        }

        // screen size rejects only a conflict between two specified sides
        if requested.screen_width != 0
            && self.screen_width != 0
            && self.screen_width != requested.screen_width
        {
            return false;
        }
        if requested.screen_height != 0
            && self.screen_height != 0
            && self.screen_height != requested.screen_height
        {
            return false;
        }

        // version: candidates must not exceed the requested platform
        if self.sdk_version != 0 && self.sdk_version > requested.sdk_version {
            return false;
        }
        if requested.minor_version != 0
            && self.minor_version != 0
            && self.minor_version != requested.minor_version
        {
            return false;
        }

        true
    }

    /// Specificity ordering used when no reference configuration exists:
    /// the first axis where exactly one side is specified decides.
    pub fn is_more_specific_than(&self, other: &ResTableConfig) -> bool {
        if (self.mcc != 0) != (other.mcc != 0) {
            return self.mcc != 0;
        }
        if (self.mnc != 0) != (other.mnc != 0) {
            return self.mnc != 0;
        }

        if (self.language[0] != 0) != (other.language[0] != 0) {
            return self.language[0] != 0;
        }
        if (self.country[0] != 0) != (other.country[0] != 0) {
            return self.country[0] != 0;
        }

        if (self.orientation != 0) != (other.orientation != 0) {
            return self.orientation != 0;
        }
        if (self.touchscreen != 0) != (other.touchscreen != 0) {
            return self.touchscreen != 0;
        }

        if (self.screen_width != 0) != (other.screen_width != 0) {
            return self.screen_width != 0;
        }
        if (self.screen_height != 0) != (other.screen_height != 0) {
            return self.screen_height != 0;
        }

        if (self.sdk_version != 0) != (other.sdk_version != 0) {
            return self.sdk_version != 0;
        }
        if (self.minor_version != 0) != (other.minor_version != 0) {
            return self.minor_version != 0;
        }

        false
    }

    /// Preference between two candidates that both match `requested`.
    ///
    /// An axis breaks the tie only when the two candidates disagree on it
    /// and the request itself specifies it; the specified side wins. The
    /// sdk axis instead prefers the numerically larger candidate (closest
    /// to the already match-filtered request), and the minor-version axis
    /// decides without consulting the request at all.
    pub fn is_better_than(
        &self,
        other: &ResTableConfig,
        requested: Option<&ResTableConfig>,
    ) -> bool {
        let Some(r) = requested else {
            return self.is_more_specific_than(other);
        };

        // imsi
        if self.mcc != other.mcc && r.mcc != 0 {
            return self.mcc != 0;
        }
        if self.mnc != other.mnc && r.mnc != 0 {
            return self.mnc != 0;
        }

        // locale
        if self.language != other.language && r.language[0] != 0 {
            return self.language[0] != 0;
        }
        if self.country != other.country && r.country[0] != 0 {
            return self.country[0] != 0;
        }

        // screen type
        if self.orientation != other.orientation && r.orientation != 0 {
            return self.orientation != 0;
        }
        if self.touchscreen != other.touchscreen && r.touchscreen != 0 {
            return self.touchscreen != 0;
        }

        // screen size
        if self.screen_width != other.screen_width && r.screen_width != 0 {
            return self.screen_width != 0;
        }
        if self.screen_height != other.screen_height && r.screen_height != 0 {
            return self.screen_height != 0;
        }

        // version
        if self.sdk_version != other.sdk_version && r.sdk_version != 0 {
            return self.sdk_version > other.sdk_version;
        }
        if self.minor_version != other.minor_version {
            return self.minor_version != 0;
        }

        false
    }

    /// Locale in resource-directory form: `""`, `"fr"` or `"fr-CA"`.
    pub fn locale(&self) -> String {
        if self.language[0] == 0 {
            return String::new();
        }

        let language = String::from_utf8_lossy(&self.language);
        if self.country[0] == 0 {
            language.into_owned()
        } else {
            format!("{}-{}", language, String::from_utf8_lossy(&self.country))
        }
    }
}

/// Renders the specified axes the way resource directories spell them,
/// e.g. `fr-rCA-land-v21`. An all-unspecified configuration renders empty.
impl fmt::Display for ResTableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let mut push = |part: &str| {
            if !out.is_empty() {
                out.push('-');
            }
            out.push_str(part);
        };

        if self.mcc != 0 {
            push(&format!("mcc{}", self.mcc));
        }
        if self.mnc != 0 {
            push(&format!("mnc{}", self.mnc));
        }

        if self.language[0] != 0 {
            push(&String::from_utf8_lossy(&self.language));
        }
        if self.country[0] != 0 {
            push(&format!("r{}", String::from_utf8_lossy(&self.country)));
        }

        match self.orientation {
            0 => {}
            1 => push("port"),
            2 => push("land"),
            3 => push("square"),
            v => push(&format!("orientation={v}")),
        }
        match self.touchscreen {
            0 => {}
            1 => push("notouch"),
            2 => push("stylus"),
            3 => push("finger"),
            v => push(&format!("touchscreen={v}")),
        }

        if self.screen_width != 0 || self.screen_height != 0 {
            push(&format!("{}x{}", self.screen_width, self.screen_height));
        }

        if self.sdk_version != 0 {
            let mut version = String::new();
            let _ = write!(version, "v{}", self.sdk_version);
            if self.minor_version != 0 {
                let _ = write!(version, ".{}", self.minor_version);
            }
            push(&version);
        }

        f.write_str(&out)
    }
}

/// Serialize a 28-byte config record for fixtures; the version pair is
/// the last field the decoder consumes.
#[cfg(test)]
pub(crate) fn build_config_record(config: &ResTableConfig) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&28u32.to_le_bytes());
    out.extend_from_slice(&config.mcc.to_le_bytes());
    out.extend_from_slice(&config.mnc.to_le_bytes());
    out.extend_from_slice(&config.language);
    out.extend_from_slice(&config.country);
    out.push(config.orientation);
    out.push(config.touchscreen);
    out.extend_from_slice(&0u16.to_le_bytes()); // density
    out.extend_from_slice(&0u32.to_le_bytes()); // input
    out.extend_from_slice(&config.screen_width.to_le_bytes());
    out.extend_from_slice(&config.screen_height.to_le_bytes());
    out.extend_from_slice(&config.sdk_version.to_le_bytes());
    out.extend_from_slice(&config.minor_version.to_le_bytes());
    out
}

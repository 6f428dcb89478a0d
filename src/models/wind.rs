use std::fmt;

use serde::{Deserialize, Serialize};

/// The 16 standard compass points. Anything else reported as a wind
/// direction is a sensor or transcription fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassPoint {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl CompassPoint {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "N" => Some(CompassPoint::N),
            "NNE" => Some(CompassPoint::NNE),
            "NE" => Some(CompassPoint::NE),
            "ENE" => Some(CompassPoint::ENE),
            "E" => Some(CompassPoint::E),
            "ESE" => Some(CompassPoint::ESE),
            "SE" => Some(CompassPoint::SE),
            "SSE" => Some(CompassPoint::SSE),
            "S" => Some(CompassPoint::S),
            "SSW" => Some(CompassPoint::SSW),
            "SW" => Some(CompassPoint::SW),
            "WSW" => Some(CompassPoint::WSW),
            "W" => Some(CompassPoint::W),
            "WNW" => Some(CompassPoint::WNW),
            "NW" => Some(CompassPoint::NW),
            "NNW" => Some(CompassPoint::NNW),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompassPoint::N => "N",
            CompassPoint::NNE => "NNE",
            CompassPoint::NE => "NE",
            CompassPoint::ENE => "ENE",
            CompassPoint::E => "E",
            CompassPoint::ESE => "ESE",
            CompassPoint::SE => "SE",
            CompassPoint::SSE => "SSE",
            CompassPoint::S => "S",
            CompassPoint::SSW => "SSW",
            CompassPoint::SW => "SW",
            CompassPoint::WSW => "WSW",
            CompassPoint::W => "W",
            CompassPoint::WNW => "WNW",
            CompassPoint::NW => "NW",
            CompassPoint::NNW => "NNW",
        }
    }
}

impl fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_sixteen_points() {
        let points = [
            "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
            "NW", "NNW",
        ];
        for p in points {
            let parsed = CompassPoint::parse(p).unwrap();
            assert_eq!(parsed.as_str(), p);
        }
    }

    #[test]
    fn rejects_non_compass_values() {
        assert_eq!(CompassPoint::parse("NNNE"), None);
        assert_eq!(CompassPoint::parse("north"), None);
        assert_eq!(CompassPoint::parse(""), None);
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(CompassPoint::parse(" NNE "), Some(CompassPoint::NNE));
    }
}

use std::fmt;

/// Mean earth radius in meters used for arc distances.
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.7714;

const GEOHASH_ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parses `"lat,lon"`, `"POINT(lon lat)"` or a geohash.
    pub fn parse(value: &str) -> Result<Self, GeoParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(GeoParseError::Empty);
        }

        if let Some((lat, lon)) = trimmed.split_once(',') {
            let lat = parse_coordinate(lat, trimmed)?;
            let lon = parse_coordinate(lon, trimmed)?;
            return Self::checked(lat, lon, trimmed);
        }

        let upper = trimmed.to_ascii_uppercase();
        if let Some(body) = upper.strip_prefix("POINT") {
            let inner = body
                .trim()
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| GeoParseError::Malformed(trimmed.to_string()))?;
            let mut parts = inner.split_whitespace();
            let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(GeoParseError::Malformed(trimmed.to_string()));
            };
            let lon = parse_coordinate(lon, trimmed)?;
            let lat = parse_coordinate(lat, trimmed)?;
            return Self::checked(lat, lon, trimmed);
        }

        decode_geohash(trimmed)
    }

    /// Great-circle distance in meters (haversine).
    pub fn arc_distance(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_MEAN_RADIUS_METERS * h.sqrt().min(1.0).asin()
    }

    fn checked(lat: f64, lon: f64, raw: &str) -> Result<Self, GeoParseError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(GeoParseError::OutOfRange(raw.to_string()));
        }
        Ok(Self { lat, lon })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lon)
    }
}

fn parse_coordinate(value: &str, raw: &str) -> Result<f64, GeoParseError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| GeoParseError::Malformed(raw.to_string()))
}

fn decode_geohash(hash: &str) -> Result<GeoPoint, GeoParseError> {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut even = true;

    for byte in hash.to_ascii_lowercase().bytes() {
        let index = GEOHASH_ALPHABET
            .iter()
            .position(|candidate| *candidate == byte)
            .ok_or_else(|| GeoParseError::Malformed(hash.to_string()))?;

        for shift in (0..5).rev() {
            let bit = (index >> shift) & 1;
            let range = if even { &mut lon_range } else { &mut lat_range };
            let mid = (range.0 + range.1) / 2.0;
            if bit == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }

    Ok(GeoPoint {
        lat: (lat_range.0 + lat_range.1) / 2.0,
        lon: (lon_range.0 + lon_range.1) / 2.0,
    })
}

/// Length units accepted in distance strings such as `"5km"` or `"500m"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Inch,
    Yard,
    Feet,
    Kilometers,
    NauticalMiles,
    Millimeters,
    Centimeters,
    Miles,
    Meters,
}

impl DistanceUnit {
    const ALL: [DistanceUnit; 9] = [
        DistanceUnit::Inch,
        DistanceUnit::Yard,
        DistanceUnit::Feet,
        DistanceUnit::Kilometers,
        DistanceUnit::NauticalMiles,
        DistanceUnit::Millimeters,
        DistanceUnit::Centimeters,
        DistanceUnit::Miles,
        DistanceUnit::Meters,
    ];

    fn meters(self) -> f64 {
        match self {
            DistanceUnit::Inch => 0.0254,
            DistanceUnit::Yard => 0.9144,
            DistanceUnit::Feet => 0.3048,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::NauticalMiles => 1852.0,
            DistanceUnit::Millimeters => 0.001,
            DistanceUnit::Centimeters => 0.01,
            DistanceUnit::Miles => 1609.344,
            DistanceUnit::Meters => 1.0,
        }
    }

    fn names(self) -> &'static [&'static str] {
        match self {
            DistanceUnit::Inch => &["in", "inch"],
            DistanceUnit::Yard => &["yd", "yards"],
            DistanceUnit::Feet => &["ft", "feet"],
            DistanceUnit::Kilometers => &["km", "kilometers"],
            DistanceUnit::NauticalMiles => &["NM", "nmi", "nauticalmiles"],
            DistanceUnit::Millimeters => &["mm", "millimeters"],
            DistanceUnit::Centimeters => &["cm", "centimeters"],
            DistanceUnit::Miles => &["mi", "miles"],
            DistanceUnit::Meters => &["m", "meters"],
        }
    }
}

/// Parses a distance string into meters. A bare number is taken as meters.
pub fn parse_distance(value: &str) -> Result<f64, GeoParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GeoParseError::Empty);
    }

    // Longest suffix first so "nmi" is not read as "mi" and "mm" not as "m".
    let mut best: Option<(DistanceUnit, &str)> = None;
    for unit in DistanceUnit::ALL {
        for &name in unit.names() {
            if trimmed.ends_with(name) && best.map_or(true, |(_, found)| name.len() > found.len())
            {
                best = Some((unit, name));
            }
        }
    }

    let (unit, number) = match best {
        Some((unit, name)) => (unit, &trimmed[..trimmed.len() - name.len()]),
        None => (DistanceUnit::Meters, trimmed),
    };

    let amount = number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| GeoParseError::InvalidDistance(trimmed.to_string()))?;
    Ok(amount * unit.meters())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoParseError {
    #[error("value is empty")]
    Empty,
    #[error("cannot parse geo point from '{0}'")]
    Malformed(String),
    #[error("geo point '{0}' is outside valid latitude/longitude bounds")]
    OutOfRange(String),
    #[error("cannot parse distance from '{0}'")]
    InvalidDistance(String),
}

use std::{fmt, str::FromStr, sync::LazyLock};

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Datum { Wgs84, Nad83 }

impl Datum {
    fn proj4(self) -> &'static str {
        match self {
            Datum::Wgs84 => "WGS84",
            Datum::Nad83 => "NAD83",
        }
    }

    fn esri_geogcs(self) -> &'static str {
        match self {
            Datum::Wgs84 => r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
            Datum::Nad83 => r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
        }
    }

    fn esri_prefix(self) -> &'static str {
        match self {
            Datum::Wgs84 => "WGS_1984",
            Datum::Nad83 => "NAD_1983",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrsKind {
    Geographic(Datum),
    Utm { datum: Datum, zone: u32, north: bool },
}

/// Coordinate reference system tag carried by every point and polygon layer,
/// identified by EPSG code. Written in configuration as `"EPSG:4326"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// Geographic WGS84 longitude/latitude.
    pub const WGS84: Crs = Crs { epsg: 4326 };

    /// Geographic NAD83 longitude/latitude.
    pub const NAD83: Crs = Crs { epsg: 4269 };

    /// Build from an EPSG code, rejecting codes that cannot be reprojected.
    pub fn from_epsg(epsg: u32) -> Result<Self> {
        let crs = Self { epsg };
        crs.kind().ok_or_else(|| anyhow!("unsupported CRS EPSG:{epsg}"))?;
        Ok(crs)
    }

    /// WGS84 UTM zone (1..=60), north or south hemisphere.
    pub fn utm(zone: u32, north: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) { bail!("UTM zone {zone} out of range"); }
        Ok(Self { epsg: if north { 32600 + zone } else { 32700 + zone } })
    }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// True for longitude/latitude systems (coordinates in degrees).
    #[inline] pub fn is_geographic(&self) -> bool { matches!(self.kind(), Some(CrsKind::Geographic(_))) }

    fn kind(&self) -> Option<CrsKind> {
        match self.epsg {
            4326 => Some(CrsKind::Geographic(Datum::Wgs84)),
            4269 => Some(CrsKind::Geographic(Datum::Nad83)),
            code @ 32601..=32660 => Some(CrsKind::Utm { datum: Datum::Wgs84, zone: code - 32600, north: true }),
            code @ 32701..=32760 => Some(CrsKind::Utm { datum: Datum::Wgs84, zone: code - 32700, north: false }),
            code @ 26901..=26923 => Some(CrsKind::Utm { datum: Datum::Nad83, zone: code - 26900, north: true }),
            _ => None,
        }
    }

    /// PROJ.4 definition used for reprojection.
    pub fn proj4(&self) -> Result<String> {
        match self.kind().ok_or_else(|| anyhow!("unsupported CRS {self}"))? {
            CrsKind::Geographic(datum) => Ok(format!("+proj=longlat +datum={} +no_defs +type=crs", datum.proj4())),
            CrsKind::Utm { datum, zone, north } => {
                let south = if north { "" } else { " +south" };
                Ok(format!("+proj=utm +zone={zone}{south} +datum={} +units=m +no_defs +type=crs", datum.proj4()))
            }
        }
    }

    /// ESRI-flavoured WKT, as stored in a shapefile `.prj`.
    pub fn to_esri_wkt(&self) -> Result<String> {
        match self.kind().ok_or_else(|| anyhow!("unsupported CRS {self}"))? {
            CrsKind::Geographic(datum) => Ok(datum.esri_geogcs().to_string()),
            CrsKind::Utm { datum, zone, north } => {
                let hemisphere = if north { 'N' } else { 'S' };
                let false_northing = if north { 0.0 } else { 10_000_000.0 };
                let central_meridian = zone as f64 * 6.0 - 183.0;
                Ok(format!(
                    r#"PROJCS["{}_UTM_Zone_{zone}{hemisphere}",{},PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",{false_northing:.1}],PARAMETER["Central_Meridian",{central_meridian:.1}],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#,
                    datum.esri_prefix(),
                    datum.esri_geogcs(),
                ))
            }
        }
    }

    /// Recognise a supported CRS from `.prj` WKT (ESRI or OGC flavour).
    pub fn from_wkt(wkt: &str) -> Option<Self> {
        static AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid regex")
        });
        static UTM_ZONE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)UTM[_ ]zone[_ ](\d{1,2})\s*([NS])").expect("valid regex")
        });

        // The outermost AUTHORITY closes the WKT, so the last one names the whole CRS.
        if let Some(crs) = AUTHORITY.captures_iter(wkt).last()
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .and_then(|epsg| Crs::from_epsg(epsg).ok()) {
            return Some(crs)
        }

        let upper = wkt.to_ascii_uppercase();
        let nad83 = upper.contains("NAD_1983") || upper.contains("NAD83") || upper.contains("NORTH_AMERICAN_1983");

        if upper.trim_start().starts_with("PROJCS") {
            let caps = UTM_ZONE.captures(wkt)?;
            let zone = caps[1].parse::<u32>().ok()?;
            let north = caps[2].eq_ignore_ascii_case("N");
            return match (nad83, north) {
                (true, true) => Crs::from_epsg(26900 + zone).ok(),
                _ => Crs::utm(zone, north).ok(),
            }
        }

        if upper.trim_start().starts_with("GEOGCS") {
            if nad83 { return Some(Crs::NAD83) }
            if upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84") {
                return Some(Crs::WGS84)
            }
        }

        None
    }
}

impl Default for Crs {
    fn default() -> Self { Crs::WGS84 }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let code = s.get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
            .map_or(s, |_| &s[5..]);
        let epsg = code.trim().parse::<u32>()
            .map_err(|_| anyhow!("invalid CRS {s:?}, expected e.g. \"EPSG:4326\""))?;
        Crs::from_epsg(epsg)
    }
}

impl TryFrom<String> for Crs {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> { value.parse() }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self { crs.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_strings() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!("epsg:32735".parse::<Crs>().unwrap().epsg(), 32735);
        assert_eq!("4269".parse::<Crs>().unwrap(), Crs::NAD83);
        assert!("EPSG:3857".parse::<Crs>().is_err());
        assert!("wgs84".parse::<Crs>().is_err());
    }

    #[test]
    fn esri_wkt_is_recognised_again() {
        for crs in [Crs::WGS84, Crs::NAD83, Crs::utm(35, false).unwrap(), Crs::utm(36, true).unwrap()] {
            let wkt = crs.to_esri_wkt().unwrap();
            assert_eq!(Crs::from_wkt(&wkt), Some(crs), "{wkt}");
        }
    }

    #[test]
    fn ogc_wkt_uses_outer_authority() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 35S",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],AUTHORITY["EPSG","4326"]],UNIT["metre",1],AUTHORITY["EPSG","32735"]]"#;
        assert_eq!(Crs::from_wkt(wkt).map(|c| c.epsg()), Some(32735));
    }

    #[test]
    fn utm_south_proj4() {
        let proj = Crs::utm(35, false).unwrap().proj4().unwrap();
        assert!(proj.contains("+zone=35 +south"));
        assert!(Crs::WGS84.is_geographic());
        assert!(!Crs::utm(35, false).unwrap().is_geographic());
    }
}

//! GetFeatureInfo parameter construction
//!
//! Both protocol variants share every parameter except the spatial reference
//! name (`CRS` vs `SRS`) and the pixel coordinate names. WMS 1.3.0 requests
//! carry the pixel under both `I`/`J` and `X`/`Y` because several servers only
//! read one of the pairs regardless of the declared version.

use crate::config::QueryConfig;
use crate::types::{BBox, Coordinate, ProtocolVariant};

/// Ordered set of query parameters for one attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRequest {
    params: Vec<(&'static str, String)>,
}

impl QueryRequest {
    /// Parameters in insertion order
    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    /// Value of a parameter, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameter is set
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.params.push((name, value.into()));
    }
}

/// Builds [`QueryRequest`]s; pure and free of I/O
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    config: QueryConfig,
}

impl QueryBuilder {
    /// Create a builder with the given static parameters
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    /// Static parameters in use
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Build the GetFeatureInfo parameters for one pixel under one protocol variant
    pub fn build(
        &self,
        layer: &str,
        bbox: &BBox,
        width: u32,
        height: u32,
        coordinate: Coordinate,
        variant: ProtocolVariant,
    ) -> QueryRequest {
        let c = &self.config;
        let mut request = QueryRequest {
            params: Vec::with_capacity(23),
        };

        request.push("SERVICE", "WMS");
        request.push("REQUEST", "GetFeatureInfo");
        request.push("VERSION", variant.version());
        request.push("LAYERS", layer);
        request.push("QUERY_LAYERS", layer);
        request.push("STYLES", c.style.as_str());
        request.push("FORMAT", c.format.as_str());
        request.push("TRANSPARENT", if c.transparent { "TRUE" } else { "FALSE" });
        request.push("DPI", c.dpi.to_string());
        request.push("FEATURE_COUNT", c.feature_count.to_string());
        request.push("FI_POINT_TOLERANCE", c.point_tolerance.to_string());
        request.push("FI_LINE_TOLERANCE", c.line_tolerance.to_string());
        request.push("FI_POLYGON_TOLERANCE", c.polygon_tolerance.to_string());
        request.push("EXCEPTIONS", c.exceptions.as_str());
        request.push("INFO_FORMAT", c.info_format.as_str());

        request.push(variant.srs_param(), c.crs.as_str());
        request.push("BBOX", bbox.to_string());
        request.push("WIDTH", width.to_string());
        request.push("HEIGHT", height.to_string());

        let i = coordinate.i.to_string();
        let j = coordinate.j.to_string();
        match variant {
            ProtocolVariant::V1_3_0 => {
                request.push("I", i.clone());
                request.push("J", j.clone());
                request.push("X", i);
                request.push("Y", j);
            }
            ProtocolVariant::V1_1_1 => {
                request.push("X", i);
                request.push("Y", j);
            }
        }

        request
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bbox() -> BBox {
        BBox::new(1252852.50301, 5568056.154502, 1556460.379317, 5936176.882673).unwrap()
    }

    fn build(variant: ProtocolVariant) -> QueryRequest {
        QueryBuilder::default().build(
            "impianti",
            &bbox(),
            993,
            1204,
            Coordinate::new(15, 42),
            variant,
        )
    }

    fn as_map(request: &QueryRequest) -> BTreeMap<&'static str, String> {
        request.params().iter().cloned().collect()
    }

    #[test]
    fn v130_uses_crs_and_both_pixel_conventions() {
        let request = build(ProtocolVariant::V1_3_0);
        assert_eq!(request.get("VERSION"), Some("1.3.0"));
        assert_eq!(request.get("CRS"), Some("EPSG:3857"));
        assert_eq!(request.get("SRS"), None);
        assert_eq!(request.get("I"), Some("15"));
        assert_eq!(request.get("J"), Some("42"));
        assert_eq!(request.get("X"), Some("15"));
        assert_eq!(request.get("Y"), Some("42"));
    }

    #[test]
    fn v111_uses_srs_and_xy_only() {
        let request = build(ProtocolVariant::V1_1_1);
        assert_eq!(request.get("VERSION"), Some("1.1.1"));
        assert_eq!(request.get("SRS"), Some("EPSG:3857"));
        assert_eq!(request.get("CRS"), None);
        assert_eq!(request.get("I"), None);
        assert_eq!(request.get("J"), None);
        assert_eq!(request.get("X"), Some("15"));
        assert_eq!(request.get("Y"), Some("42"));
    }

    #[test]
    fn variants_differ_only_in_naming_fields() {
        let v13 = as_map(&build(ProtocolVariant::V1_3_0));
        let v111 = as_map(&build(ProtocolVariant::V1_1_1));
        let naming = ["VERSION", "CRS", "SRS", "I", "J"];

        for (name, value) in &v13 {
            if naming.contains(name) {
                continue;
            }
            assert_eq!(v111.get(name), Some(value), "{name} differs between variants");
        }
        for name in v111.keys() {
            assert!(
                naming.contains(name) || v13.contains_key(name),
                "{name} only present in 1.1.1"
            );
        }
    }

    #[test]
    fn shared_parameters_follow_configuration() {
        let request = build(ProtocolVariant::V1_3_0);
        assert_eq!(request.get("SERVICE"), Some("WMS"));
        assert_eq!(request.get("REQUEST"), Some("GetFeatureInfo"));
        assert_eq!(request.get("LAYERS"), Some("impianti"));
        assert_eq!(request.get("QUERY_LAYERS"), Some("impianti"));
        assert_eq!(request.get("STYLES"), Some("predefinito"));
        assert_eq!(request.get("FORMAT"), Some("image/png"));
        assert_eq!(request.get("TRANSPARENT"), Some("TRUE"));
        assert_eq!(request.get("DPI"), Some("96"));
        assert_eq!(request.get("FEATURE_COUNT"), Some("1000"));
        assert_eq!(request.get("FI_POINT_TOLERANCE"), Some("60"));
        assert_eq!(request.get("FI_LINE_TOLERANCE"), Some("20"));
        assert_eq!(request.get("FI_POLYGON_TOLERANCE"), Some("10"));
        assert_eq!(
            request.get("EXCEPTIONS"),
            Some("application/vnd.ogc.se_inimage")
        );
        assert_eq!(request.get("INFO_FORMAT"), Some("text/html"));
        assert_eq!(
            request.get("BBOX"),
            Some("1252852.50301,5568056.154502,1556460.379317,5936176.882673")
        );
        assert_eq!(request.get("WIDTH"), Some("993"));
        assert_eq!(request.get("HEIGHT"), Some("1204"));
    }

    #[test]
    fn parameter_order_is_stable() {
        let names: Vec<&str> = build(ProtocolVariant::V1_1_1)
            .params()
            .iter()
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(&names[..3], &["SERVICE", "REQUEST", "VERSION"]);
        assert_eq!(&names[names.len() - 6..], &["SRS", "BBOX", "WIDTH", "HEIGHT", "X", "Y"]);
        assert_eq!(build(ProtocolVariant::V1_3_0).len(), names.len() + 2);
    }

    #[test]
    fn custom_configuration_changes_shared_fields_only() {
        let builder = QueryBuilder::new(QueryConfig {
            crs: "EPSG:4326".to_string(),
            style: String::new(),
            transparent: false,
            feature_count: 5,
            ..QueryConfig::default()
        });
        let request = builder.build(
            "a",
            &bbox(),
            10,
            10,
            Coordinate::new(1, 2),
            ProtocolVariant::V1_1_1,
        );
        assert_eq!(request.get("SRS"), Some("EPSG:4326"));
        assert_eq!(request.get("STYLES"), Some(""));
        assert_eq!(request.get("TRANSPARENT"), Some("FALSE"));
        assert_eq!(request.get("FEATURE_COUNT"), Some("5"));
    }
}

use crate::csv_reader::PointRecord;
use crate::formula::{Diagnostic, Formula};
use crate::geometry::{Ring, build_cell};
use crate::spacing::SpacingEstimate;

use log::{debug, warn};

/// Named metric computed from a formula over raw fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedField {
    pub name: String,
    pub formula: String,
}

impl DerivedField {
    pub fn new(name: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formula: formula.into(),
        }
    }
}

/// Ordered metric values of a feature.
///
/// Re-inserting a key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    entries: Vec<(String, Option<f64>)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: Option<f64>) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Option<f64>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One output cell: a named point with its metrics
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    /// (lat, lon)
    pub center: (f64, f64),
    pub metrics: Metrics,
}

impl Feature {
    pub fn cell(&self, spacing: &SpacingEstimate) -> Ring {
        let (lat, lon) = self.center;
        build_cell(lat, lon, spacing.half_latitude, spacing.half_longitude)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub features: Vec<Feature>,
    /// every formula problem met while building, in record order
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds one feature per record, in input order.
///
/// Raw numeric fields come first, then derived fields in definition order.
/// Derived formulas only see raw fields. A derived field named like a raw
/// column replaces that column's value.
pub fn build_layer(records: &[PointRecord], derived_fields: &[DerivedField]) -> Layer {
    let formulas: Vec<(&str, Formula)> = derived_fields
        .iter()
        .map(|field| (field.name.as_str(), Formula::parse(&field.formula)))
        .collect();

    for (name, formula) in &formulas {
        if let Err(e) = formula.expr() {
            warn!(
                "Derived field '{}' has an invalid formula '{}': {}",
                name,
                formula.source(),
                e
            );
        }
    }

    let mut layer = Layer {
        features: Vec::with_capacity(records.len()),
        diagnostics: Vec::new(),
    };

    for record in records {
        let mut metrics = Metrics::new();
        for (key, value) in record.raw_fields.iter() {
            metrics.insert(key, value);
        }

        for (name, formula) in &formulas {
            let result = formula.evaluate(&record.raw_fields);
            for diagnostic in &result.diagnostics {
                warn!("{} [{}]: {}", record.name, name, diagnostic);
            }
            layer.diagnostics.extend(result.diagnostics);
            metrics.insert(name, Some(result.value));
        }

        layer.features.push(Feature {
            name: record.name.clone(),
            center: (record.latitude, record.longitude),
            metrics,
        });
    }

    debug!(
        "Built {} features ({} derived fields, {} diagnostics)",
        layer.features.len(),
        formulas.len(),
        layer.diagnostics.len()
    );
    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_reader::RawFields;

    fn record(name: &str, lat: f64, lon: f64, fields: &[(&str, Option<f64>)]) -> PointRecord {
        PointRecord {
            name: name.to_string(),
            latitude: lat,
            longitude: lon,
            raw_fields: fields.iter().copied().collect::<RawFields>(),
        }
    }

    #[test]
    fn test_raw_then_derived_order() {
        let records = [record(
            "A",
            1.0,
            2.0,
            &[("Pop", Some(200.0)), ("HH", Some(50.0))],
        )];
        let derived = [DerivedField::new("PerHH", "Pop / HH")];

        let layer = build_layer(&records, &derived);
        let feature = &layer.features[0];

        assert_eq!(feature.metrics.keys().collect::<Vec<_>>(), vec!["Pop", "HH", "PerHH"]);
        assert_eq!(feature.metrics.get("PerHH"), Some(Some(4.0)));
        assert_eq!(feature.center, (1.0, 2.0));
        assert!(layer.diagnostics.is_empty());
    }

    #[test]
    fn test_derived_field_shadows_raw_column_in_place() {
        let records = [record("A", 0.0, 0.0, &[("Pop", Some(10.0)), ("HH", Some(4.0))])];
        let derived = [DerivedField::new("Pop", "Pop * 2")];

        let layer = build_layer(&records, &derived);
        let metrics = &layer.features[0].metrics;

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.keys().collect::<Vec<_>>(), vec!["Pop", "HH"]);
        assert_eq!(metrics.get("Pop"), Some(Some(20.0)));
    }

    #[test]
    fn test_derived_fields_see_raw_values_only() {
        let records = [record("A", 0.0, 0.0, &[("X", Some(3.0))])];
        let derived = [
            DerivedField::new("Y", "X + 1"),
            DerivedField::new("Z", "Y * 2"),
        ];

        let layer = build_layer(&records, &derived);
        let metrics = &layer.features[0].metrics;

        assert_eq!(metrics.get("Y"), Some(Some(4.0)));
        assert_eq!(metrics.get("Z"), Some(Some(0.0)));
        assert!(matches!(
            layer.diagnostics.as_slice(),
            [Diagnostic::UnresolvedField { field, .. }] if field == "Y"
        ));
    }

    #[test]
    fn test_bad_formula_does_not_abort() {
        let records = [
            record("A", 0.0, 0.0, &[("X", Some(3.0))]),
            record("B", 0.0, 0.015, &[("X", Some(5.0))]),
        ];
        let derived = [
            DerivedField::new("Broken", "X +* 2"),
            DerivedField::new("Double", "X * 2"),
        ];

        let layer = build_layer(&records, &derived);

        assert_eq!(layer.features.len(), 2);
        assert_eq!(layer.diagnostics.len(), 2);
        assert_eq!(layer.features[0].metrics.get("Broken"), Some(Some(0.0)));
        assert_eq!(layer.features[1].metrics.get("Double"), Some(Some(10.0)));
    }

    #[test]
    fn test_input_order_and_duplicates_are_kept() {
        let records = [
            record("Same", 1.0, 1.0, &[]),
            record("Other", 0.0, 0.0, &[]),
            record("Same", 1.0, 1.0, &[]),
        ];
        let layer = build_layer(&records, &[]);
        let names: Vec<&str> = layer.features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Same", "Other", "Same"]);
    }

    #[test]
    fn test_missing_raw_value_is_kept_as_missing() {
        let records = [record("A", 0.0, 0.0, &[("Pop", None)])];
        let layer = build_layer(&records, &[]);
        assert_eq!(layer.features[0].metrics.get("Pop"), Some(None));
    }

    #[test]
    fn test_feature_cell_uses_spacing() {
        let feature = Feature {
            name: "A".to_string(),
            center: (10.0, 20.0),
            metrics: Metrics::new(),
        };
        let spacing = SpacingEstimate {
            half_latitude: 0.5,
            half_longitude: 0.25,
        };
        let ring = feature.cell(&spacing);
        assert_eq!(ring[0], (19.75, 9.5));
        assert_eq!(ring[2], (20.25, 10.5));
    }
}

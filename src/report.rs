//! Client-facing export of the measurement list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MeasureError, MeasureResult};
use crate::measurement::{Measurement, MeasurementKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: MeasurementKind,
    pub display_value: String,
    /// Feet or square feet, unformatted.
    pub raw_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub count: usize,
    /// Sum of all area measurements.
    pub total_area_sqft: f64,
    /// Sum of distance measurements; heights are not linear footage.
    pub total_linear_ft: f64,
}

impl ReportSummary {
    #[must_use]
    pub fn of(measurements: &[Measurement]) -> Self {
        let total = |kind: MeasurementKind| -> f64 {
            measurements
                .iter()
                .filter(|m| m.kind == kind)
                .map(|m| m.value)
                .sum()
        };
        Self {
            count: measurements.len(),
            total_area_sqft: total(MeasurementKind::Area),
            total_linear_ft: total(MeasurementKind::Distance),
        }
    }
}

/// Exported document, in measurement order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub project: String,
    pub exported_at: DateTime<Utc>,
    pub measurements: Vec<ReportEntry>,
    pub summary: ReportSummary,
}

impl Report {
    /// Build a report; there must be at least one measurement.
    pub fn new(project: impl Into<String>, measurements: &[Measurement]) -> MeasureResult<Self> {
        if measurements.is_empty() {
            return Err(MeasureError::empty_state("no measurements to export"));
        }
        Ok(Self {
            project: project.into(),
            exported_at: Utc::now(),
            measurements: measurements
                .iter()
                .map(|m| ReportEntry {
                    label: m.label.clone(),
                    kind: m.kind,
                    display_value: m.display_value.clone(),
                    raw_value: m.value,
                })
                .collect(),
            summary: ReportSummary::of(measurements),
        })
    }

    pub fn to_json(&self) -> MeasureResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `<project>-measurements.json`, project slugged to `[a-z0-9-]`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let mut slug = String::new();
        for c in self.project.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');
        if slug.is_empty() {
            "measurements.json".to_owned()
        } else {
            format!("{slug}-measurements.json")
        }
    }
}

/// Offer the report to the user as a file download.
#[cfg(target_arch = "wasm32")]
pub fn download(report: &Report) -> anyhow::Result<()> {
    use wasm_bindgen::JsCast;

    let json = report.to_json()?;
    let to_err = |e: wasm_bindgen::JsValue| anyhow::anyhow!("{e:?}");

    let parts = js_sys::Array::of1(&wasm_bindgen::JsValue::from_str(&json));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/json");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options).map_err(to_err)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(to_err)?;

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| anyhow::anyhow!("no document"))?;
    let anchor: web_sys::HtmlAnchorElement = document
        .create_element("a")
        .map_err(to_err)?
        .dyn_into()
        .map_err(|_| anyhow::anyhow!("<a> is not an anchor"))?;
    anchor.set_href(&url);
    anchor.set_download(&report.file_name());
    anchor.click();
    web_sys::Url::revoke_object_url(&url).map_err(to_err)?;
    Ok(())
}

/// Write the report into the working directory.
#[cfg(not(target_arch = "wasm32"))]
pub fn download(report: &Report) -> anyhow::Result<()> {
    let name = report.file_name();
    std::fs::write(&name, report.to_json()?)?;
    log::info!("report written to {name}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;
    use nalgebra::Point3;

    fn measurement(kind: MeasurementKind, coords: &[(f64, f64, f64)], label: &str) -> Measurement {
        let points = coords.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect();
        Measurement::new(kind, points, &Calibration::default(), label).unwrap()
    }

    fn sample() -> Vec<Measurement> {
        vec![
            measurement(MeasurementKind::Distance, &[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)], "Wall"),
            measurement(MeasurementKind::Height, &[(0.0, 0.0, 0.0), (0.0, 8.0, 0.0)], "Ceiling"),
            measurement(
                MeasurementKind::Area,
                &[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (10.0, 0.0, 12.0), (0.0, 0.0, 12.0)],
                "Floor",
            ),
            measurement(MeasurementKind::Distance, &[(0.0, 0.0, 0.0), (0.0, 0.0, 2.5)], "Door"),
        ]
    }

    #[test]
    fn test_summary_excludes_height() {
        let report = Report::new("Kitchen", &sample()).unwrap();
        assert_eq!(report.summary.count, 4);
        assert!((report.summary.total_linear_ft - 12.5).abs() < 1e-9);
        assert!((report.summary.total_area_sqft - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_entries_keep_order() {
        let report = Report::new("Kitchen", &sample()).unwrap();
        let labels: Vec<&str> = report.measurements.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["Wall", "Ceiling", "Floor", "Door"]);
        assert_eq!(report.measurements[2].display_value, "120.00 sq ft");
        assert!((report.measurements[3].raw_value - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_is_empty_state() {
        let err = Report::new("Kitchen", &[]).unwrap_err();
        assert!(matches!(err, MeasureError::EmptyState(_)));
    }

    #[test]
    fn test_json_shape() {
        let report = Report::new("Kitchen", &sample()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["project"], "Kitchen");
        assert_eq!(json["measurements"][1]["type"], "height");
        assert!(json["summary"]["total_area_sqft"].is_number());
        assert!(json["exported_at"].is_string());
    }

    #[test]
    fn test_file_name() {
        let mut report = Report::new("Casa  Puerto Varas!", &sample()).unwrap();
        assert_eq!(report.file_name(), "casa-puerto-varas-measurements.json");
        report.project = "***".into();
        assert_eq!(report.file_name(), "measurements.json");
    }
}

//! JSON codec for recorded display items
//!
//! The guest shim writes one `<filename>.df.json` document per display call.
//! Cells are plain JSON scalars or tagged objects:
//!
//! - `{"$tuple": [...]}` for fixed-arity tuples
//! - `{"$provenance": {"value", "created_by", "label", "seal"}}` for tagged numbers
//! - `{"$unsupported": "TypeName"}` for values outside the supported set
//!
//! Labels are scalars, or arrays for multi-level axes. A provenance tag is
//! honoured only when the [`SealVerifier`] accepts it; forged tags decode as
//! plain numbers.

use crate::display::{DisplayArgs, DisplayFunction, DisplayItem};
use crate::error::{DecodeError, DecodeResult};
use crate::provenance::ProvenanceValue;
use crate::table::{Axis, Cell, Label, Table};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const TUPLE_TAG: &str = "$tuple";
const PROVENANCE_TAG: &str = "$provenance";
const UNSUPPORTED_TAG: &str = "$unsupported";
const LABEL_TYPE_TAG: &str = "$type";

/// Decides whether a provenance tag found in an artifact is genuine
pub trait SealVerifier {
    /// Accept a tag carrying `seal`, claimed to come from `created_by`
    fn accepts(&self, seal: &str, created_by: &str) -> bool;
}

impl<F> SealVerifier for F
where
    F: Fn(&str, &str) -> bool,
{
    fn accepts(&self, seal: &str, created_by: &str) -> bool {
        self(seal, created_by)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireItem {
    function: DisplayFunction,
    filename: String,
    #[serde(default)]
    kwargs: DisplayArgs,
    table: WireTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lineage: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTable {
    index: WireAxis,
    columns: WireAxis,
    data: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireAxis {
    #[serde(default)]
    names: Vec<Option<String>>,
    labels: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireProvenance {
    value: Option<f64>,
    created_by: String,
    #[serde(default)]
    label: Option<String>,
    seal: String,
}

/// Decode a display item document
pub fn decode_display_item(text: &str, verifier: &dyn SealVerifier) -> DecodeResult<DisplayItem> {
    let wire: WireItem = serde_json::from_str(text)?;
    let table = Table::new(
        decode_axis(wire.table.index),
        decode_axis(wire.table.columns),
        wire.table
            .data
            .iter()
            .map(|row| row.iter().map(|v| decode_cell(v, verifier)).collect())
            .collect::<DecodeResult<_>>()?,
    );
    table.validate_shape()?;
    Ok(DisplayItem {
        function: wire.function,
        filename: wire.filename,
        args: wire.kwargs,
        table,
        lineage: wire.lineage,
    })
}

impl DisplayItem {
    /// Encode as a display item document, sealing tagged cells with `seal`
    pub fn to_json(&self, seal: &str) -> DecodeResult<String> {
        let wire = WireItem {
            function: self.function,
            filename: self.filename.clone(),
            kwargs: self.args.clone(),
            table: WireTable {
                index: encode_axis(&self.table.index),
                columns: encode_axis(&self.table.columns),
                data: self
                    .table
                    .data
                    .iter()
                    .map(|row| row.iter().map(|c| encode_cell(c, seal)).collect())
                    .collect(),
            },
            lineage: self.lineage.clone(),
        };
        Ok(serde_json::to_string_pretty(&wire)?)
    }
}

fn decode_axis(wire: WireAxis) -> Axis {
    let names = if wire.names.is_empty() {
        vec![None]
    } else {
        wire.names
    };
    Axis {
        names,
        labels: wire.labels.iter().map(decode_label).collect(),
    }
}

fn encode_axis(axis: &Axis) -> WireAxis {
    WireAxis {
        names: axis.names.clone(),
        labels: axis.labels.iter().map(encode_label).collect(),
    }
}

fn decode_label(value: &Value) -> Label {
    match value {
        Value::Null => Label::Null,
        Value::Bool(b) => Label::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Label::Int(i),
            None => n.as_f64().map_or(Label::Null, Label::Float),
        },
        Value::String(s) => Label::Str(s.clone()),
        Value::Array(parts) => Label::Multi(parts.iter().map(decode_label).collect()),
        Value::Object(map) => Label::Other(
            map.get(LABEL_TYPE_TAG)
                .and_then(Value::as_str)
                .unwrap_or("object")
                .to_string(),
        ),
    }
}

fn encode_label(label: &Label) -> Value {
    match label {
        Label::Int(i) => json!(i),
        Label::Float(f) => json!(f),
        Label::Str(s) => json!(s),
        Label::Bool(b) => json!(b),
        Label::Null => Value::Null,
        Label::Multi(parts) => Value::Array(parts.iter().map(encode_label).collect()),
        Label::Other(name) => json!({ LABEL_TYPE_TAG: name }),
    }
}

fn decode_cell(value: &Value, verifier: &dyn SealVerifier) -> DecodeResult<Cell> {
    Ok(match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map_or(Cell::Null, Cell::from),
        },
        Value::String(s) => Cell::Str(s.clone()),
        Value::Array(items) => Cell::Tuple(
            items
                .iter()
                .map(|v| decode_cell(v, verifier))
                .collect::<DecodeResult<_>>()?,
        ),
        Value::Object(map) => decode_tagged_cell(map, verifier)?,
    })
}

fn decode_tagged_cell(map: &Map<String, Value>, verifier: &dyn SealVerifier) -> DecodeResult<Cell> {
    if let Some(Value::Array(items)) = map.get(TUPLE_TAG) {
        return Ok(Cell::Tuple(
            items
                .iter()
                .map(|v| decode_cell(v, verifier))
                .collect::<DecodeResult<_>>()?,
        ));
    }
    if let Some(tag) = map.get(PROVENANCE_TAG) {
        let tag: WireProvenance = serde_json::from_value(tag.clone())?;
        let Some(value) = tag.value else {
            return Ok(Cell::Null);
        };
        if verifier.accepts(&tag.seal, &tag.created_by) {
            return Ok(Cell::Provenance(ProvenanceValue::new(
                value,
                tag.created_by,
                tag.label,
            )));
        }
        tracing::warn!(
            created_by = %tag.created_by,
            "provenance tag rejected, decoding as plain number"
        );
        return Ok(Cell::from(value));
    }
    if let Some(name) = map.get(UNSUPPORTED_TAG) {
        return Ok(Cell::Unsupported(
            name.as_str().unwrap_or("object").to_string(),
        ));
    }
    Err(DecodeError::unknown_cell(
        map.keys().cloned().collect::<Vec<_>>().join(", "),
    ))
}

fn encode_cell(cell: &Cell, seal: &str) -> Value {
    match cell {
        Cell::Int(i) => json!(i),
        Cell::Float(f) => json!(f),
        Cell::Str(s) => json!(s),
        Cell::Bool(b) => json!(b),
        Cell::Tuple(items) => {
            json!({ TUPLE_TAG: items.iter().map(|c| encode_cell(c, seal)).collect::<Vec<_>>() })
        }
        Cell::Provenance(p) => json!({
            PROVENANCE_TAG: {
                "value": p.value(),
                "created_by": p.created_by(),
                "label": p.label(),
                "seal": seal,
            }
        }),
        Cell::Null => Value::Null,
        Cell::Unsupported(name) => json!({ UNSUPPORTED_TAG: name }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::OneOrMany;
    use pretty_assertions::assert_eq;

    const SEAL: &str = "run-seal";

    fn accept_seal(seal: &str, _created_by: &str) -> bool {
        seal == SEAL
    }

    fn every_cell_kind() -> DisplayItem {
        let table = Table::new(
            Axis::new(vec![Label::from("r1"), Label::Multi(vec![Label::Int(1), "b".into()])]),
            Axis::new(vec!["num".into(), "mixed".into(), "other".into()])
                .with_names(vec![Some("Metric".into())]),
            vec![
                vec![
                    Cell::Int(3),
                    Cell::Tuple(vec![Cell::Float(0.5), Cell::Float(1.5)]),
                    Cell::Provenance(ProvenanceValue::new(0.031, "ttest_ind", Some("pvalue".into()))),
                ],
                vec![Cell::Float(2.25), Cell::Str("x".into()), Cell::Bool(true)],
            ],
        );
        DisplayItem::new(DisplayFunction::Latex, "df_demo", table)
            .with_args(DisplayArgs::default().with_caption("Demo").with_y(OneOrMany::One("num".into())))
            .with_lineage(vec!["df_raw".into()])
    }

    #[test]
    fn decode_inverts_encode() {
        let item = every_cell_kind();
        let text = item.to_json(SEAL).unwrap();
        let decoded = decode_display_item(&text, &accept_seal).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn nulls_and_unsupported_survive() {
        let mut item = every_cell_kind();
        item.table.data[1][0] = Cell::Null;
        item.table.data[1][2] = Cell::Unsupported("datetime".into());
        let decoded = decode_display_item(&item.to_json(SEAL).unwrap(), &accept_seal).unwrap();
        assert_eq!(decoded.table, item.table);
    }

    #[test]
    fn forged_seal_drops_provenance() {
        let text = every_cell_kind().to_json("forged").unwrap();
        let decoded = decode_display_item(&text, &accept_seal).unwrap();
        assert_eq!(decoded.table.cell(0, 2), Some(&Cell::Float(0.031)));
    }

    #[test]
    fn guest_document_decodes() {
        let text = r#"{
            "function": "df_to_figure",
            "filename": "df_bars",
            "kwargs": {"kind": "bar", "y": ["a", "b"], "dpi": 300},
            "table": {
                "index": {"names": [null], "labels": ["x", "y"]},
                "columns": {"names": [null], "labels": ["a", "b"]},
                "data": [[1, 2.5], [null, {"$unsupported": "Timestamp"}]]
            }
        }"#;
        let item = decode_display_item(text, &accept_seal).unwrap();
        assert!(item.is_figure());
        assert_eq!(item.args.kind.as_deref(), Some("bar"));
        assert_eq!(item.args.extra.get("dpi"), Some(&json!(300)));
        assert_eq!(item.table.cell(1, 1), Some(&Cell::Unsupported("Timestamp".into())));
    }

    #[test]
    fn unknown_tags_are_errors() {
        let text = r#"{"function": "df_to_latex", "filename": "df_a",
            "table": {"index": {"labels": [0]}, "columns": {"labels": ["a"]},
                      "data": [[{"$weird": 1}]]}}"#;
        assert!(matches!(
            decode_display_item(text, &accept_seal),
            Err(DecodeError::UnknownCell(_))
        ));
    }
}

//! Table and Provenance Tests
//!
//! Provenance travels with cells through table reshaping and the codec.

use vetrun_artifact::prelude::*;
use vetrun_artifact::{decode_display_item, render_latex, Scalar};

fn pvalue(v: f64) -> Cell {
    Cell::from(Scalar::Tagged(ProvenanceValue::new(v, "mannwhitneyu", Some("pvalue".into()))))
}

fn results_table() -> Table {
    Table::from_rows(
        &["U", "p"],
        vec![
            vec![Cell::Float(12.5), pvalue(0.004)],
            vec![Cell::Float(30.0), pvalue(0.2)],
        ],
    )
    .with_index(Axis::new(vec!["Male".into(), "Female".into()]))
}

#[test]
fn test_transpose_keeps_tags_per_cell() {
    let t = results_table().transpose();
    let tagged: Vec<(usize, usize)> = t
        .cells()
        .filter(|(_, _, c)| c.provenance().is_some())
        .map(|(r, c, _)| (r, c))
        .collect();
    assert_eq!(tagged, vec![(1, 0), (1, 1)]);
}

#[test]
fn test_untagged_scalar_is_plain_float() {
    assert_eq!(Cell::from(Scalar::Plain(0.5)), Cell::Float(0.5));
    assert_eq!(Cell::from(Scalar::Plain(f64::NAN)), Cell::Null);
}

#[test]
fn test_codec_and_rendering_agree() {
    let item = DisplayItem::new(DisplayFunction::Latex, "df_mw", results_table())
        .with_args(DisplayArgs::default().with_caption("Mann-Whitney"));
    let text = item.to_json("seal").unwrap();
    let decoded = decode_display_item(&text, &|seal: &str, _: &str| seal == "seal").unwrap();
    assert_eq!(
        render_latex(&decoded, RenderMode::SmallerThan),
        render_latex(&item, RenderMode::SmallerThan)
    );
    assert!(render_latex(&decoded, RenderMode::SmallerThan).contains("0.004"));
}

//! Exported workbooks, read back with calamine.

mod common;

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use classification_core::export::SHEET_NAME;
use classification_core::validation::SEGMENT_CONTENT_MAX;
use classification_core::{CoreError, SegmentPatch};
use common::{catalog, chain, material};

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

fn read_rows(bytes: Vec<u8>) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).expect("export is a valid xlsx file");
    let range = workbook
        .worksheet_range(SHEET_NAME)
        .expect("export has the segments sheet");
    range
        .rows()
        .map(|row| {
            let mut cells: Vec<String> = row.iter().map(cell_text).collect();
            cells.resize(9, String::new());
            cells
        })
        .collect()
}

#[tokio::test]
async fn export_has_one_row_per_segment_with_flattened_levels() {
    let catalog = catalog();
    let levels = chain(&catalog, &["A", "B", "C"]).await;
    let m = material(&catalog, "M").await;
    catalog
        .create_segment(m.id, "first paragraph", 5, Some(levels[2].id))
        .await
        .unwrap();

    let artifact = catalog.export_material(m.id).await.unwrap();
    assert_eq!(artifact.filename, "M.xlsx");

    let rows = read_rows(artifact.bytes);
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        ["#", "Paragraph", "Page", "Level 1", "Level 2", "Level 3", "Level 4", "Level 5", "Level 6"]
    );
    assert_eq!(
        rows[1],
        ["1", "first paragraph", "5", "A", "B", "C", "", "", ""]
    );
}

#[tokio::test]
async fn export_follows_display_order_and_renumbers() {
    let catalog = catalog();
    let m = material(&catalog, "كتاب الصلاة").await;
    let first = catalog.create_segment(m.id, "one", 3, None).await.unwrap();
    let second = catalog.create_segment(m.id, "two", 1, None).await.unwrap();
    let third = catalog.create_segment(m.id, "three", 2, None).await.unwrap();

    // Drop the middle one to leave a gap, then move the last to the front.
    catalog.delete_segment(second.id).await.unwrap();
    catalog
        .reorder_segments(m.id, &[third.id, first.id])
        .await
        .unwrap();

    let artifact = catalog.export_material(m.id).await.unwrap();
    assert_eq!(artifact.filename, "كتاب_الصلاة.xlsx");

    let rows = read_rows(artifact.bytes);
    let body: Vec<(String, String, String)> = rows[1..]
        .iter()
        .map(|r| (r[0].clone(), r[1].clone(), r[2].clone()))
        .collect();
    assert_eq!(
        body,
        vec![
            ("1".to_string(), "three".to_string(), "2".to_string()),
            ("2".to_string(), "one".to_string(), "3".to_string()),
        ]
    );
}

#[tokio::test]
async fn empty_material_exports_only_the_header() {
    let catalog = catalog();
    let m = material(&catalog, "empty").await;

    let rows = read_rows(catalog.export_material(m.id).await.unwrap().bytes);
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn exporting_a_missing_material_is_not_found() {
    let catalog = catalog();
    let err = catalog
        .export_material(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn longest_allowed_paragraph_exports_in_full() {
    let catalog = catalog();
    let m = material(&catalog, "long").await;
    let longest = "ع".repeat(SEGMENT_CONTENT_MAX);
    let kept = catalog.create_segment(m.id, &longest, 1, None).await.unwrap();

    let too_long = "ع".repeat(40_000);
    let err = catalog
        .create_segment(m.id, &too_long, 2, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "content", .. }));
    let err = catalog
        .update_segment(
            kept.id,
            SegmentPatch {
                content: Some(too_long),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "content", .. }));

    let rows = read_rows(catalog.export_material(m.id).await.unwrap().bytes);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1].chars().count(), SEGMENT_CONTENT_MAX);
}

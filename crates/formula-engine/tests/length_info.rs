use formula_engine::{LengthInfo, Sheet, SheetError};
use formula_model::{Axis, Point, Scalar, Size};
use pretty_assertions::assert_eq;

fn render(runs: impl Iterator<Item = (u32, u32, LengthInfo)>) -> String {
    runs.map(|(start, end, info)| match info.length {
        Some(length) => format!("[{start}, {end}, {length}, {}]", info.hidden),
        None => format!("[{start}, {end}, {}]", info.hidden),
    })
    .collect()
}

fn rows(sheet: &Sheet, extra: u32) -> String {
    render(sheet.row_heights(0, sheet.size().height + extra))
}

fn columns(sheet: &Sheet, extra: u32) -> String {
    render(sheet.column_widths(0, sheet.size().width + extra))
}

#[test]
fn row_heights_follow_inserted_and_deleted_rows() {
    let mut sheet = Sheet::new();
    sheet.set_row_height(3, 1, 12).unwrap();
    assert_eq!(sheet.size().height, 4);
    assert_eq!(sheet.row_height(3), LengthInfo::new(Some(12), false));
    assert_eq!(rows(&sheet, 0), "[0, 3, false][3, 4, 12, false]");

    sheet.clear_row_height(3, 1).unwrap();
    assert_eq!(rows(&sheet, 0), "[0, 4, false]");

    sheet.set_row_height(3, 1, 12).unwrap();
    sheet.delete_rows(3, 1).unwrap();
    assert_eq!(rows(&sheet, 1), "[0, 4, false]");

    sheet.set_row_height(3, 1, 12).unwrap();
    sheet.insert_rows(3, 5).unwrap();
    assert_eq!(rows(&sheet, 1), "[0, 3, false][3, 9, 12, false][9, 10, false]");
}

#[test]
fn hiding_rows_keeps_heights() {
    let mut sheet = Sheet::new();
    sheet.hide_rows(3, 1, false).unwrap();
    assert_eq!(sheet.size().height, 4);
    assert_eq!(sheet.row_height(3), LengthInfo::DEFAULT);
    assert_eq!(rows(&sheet, 0), "[0, 4, false]");

    sheet.hide_rows(3, 1, true).unwrap();
    assert_eq!(rows(&sheet, 0), "[0, 3, false][3, 4, true]");

    sheet.set_row_height(3, 1, 12).unwrap();
    assert_eq!(rows(&sheet, 0), "[0, 3, false][3, 4, 12, true]");

    sheet.clear_row_height(3, 1).unwrap();
    assert_eq!(rows(&sheet, 0), "[0, 3, false][3, 4, true]");

    sheet.set_row_height(3, 1, 12).unwrap();
    sheet.hide_rows(3, 1, false).unwrap();
    assert_eq!(rows(&sheet, 0), "[0, 3, false][3, 4, 12, false]");
}

#[test]
fn column_widths_follow_inserted_and_deleted_columns() {
    let mut sheet = Sheet::new();
    sheet.set_column_width(3, 1, 12).unwrap();
    assert_eq!(sheet.size().width, 4);
    assert_eq!(sheet.column_width(3), LengthInfo::new(Some(12), false));
    assert_eq!(columns(&sheet, 0), "[0, 3, false][3, 4, 12, false]");

    sheet.clear_column_width(3, 1).unwrap();
    assert_eq!(columns(&sheet, 0), "[0, 4, false]");

    sheet.set_column_width(3, 1, 12).unwrap();
    sheet.delete_columns(3, 1).unwrap();
    assert_eq!(columns(&sheet, 1), "[0, 4, false]");

    sheet.set_column_width(3, 1, 12).unwrap();
    sheet.insert_columns(3, 5).unwrap();
    assert_eq!(
        columns(&sheet, 1),
        "[0, 3, false][3, 9, 12, false][9, 10, false]"
    );
}

#[test]
fn hiding_columns_keeps_widths() {
    let mut sheet = Sheet::new();
    sheet.hide_columns(3, 1, false).unwrap();
    assert_eq!(sheet.size().width, 4);
    assert_eq!(sheet.column_width(3), LengthInfo::DEFAULT);
    assert_eq!(columns(&sheet, 0), "[0, 4, false]");

    sheet.hide_columns(3, 1, true).unwrap();
    assert_eq!(columns(&sheet, 0), "[0, 3, false][3, 4, true]");

    sheet.set_column_width(3, 1, 12).unwrap();
    assert_eq!(columns(&sheet, 0), "[0, 3, false][3, 4, 12, true]");

    sheet.clear_column_width(3, 1).unwrap();
    assert_eq!(columns(&sheet, 0), "[0, 3, false][3, 4, true]");

    sheet.set_column_width(3, 1, 12).unwrap();
    sheet.hide_columns(3, 1, false).unwrap();
    assert_eq!(columns(&sheet, 0), "[0, 3, false][3, 4, 12, false]");
}

#[test]
fn lengths_and_cells_shift_together() {
    let mut sheet = Sheet::new();
    sheet.set_value_cell(Point::new(0, 5), 1.0).unwrap();
    sheet.set_row_height(5, 1, 40).unwrap();
    sheet.set_row_height(8, 2, 10).unwrap();
    sheet.delete_rows(1, 2).unwrap();
    assert_eq!(sheet.get_value(Point::new(0, 3)), Scalar::from(1.0));
    assert_eq!(sheet.row_height(3), LengthInfo::new(Some(40), false));
    assert_eq!(sheet.row_height(6), LengthInfo::new(Some(10), false));
    assert_eq!(sheet.row_height(8), LengthInfo::DEFAULT);

    // Deleting every row carrying a height drops it.
    sheet.delete_rows(6, 2).unwrap();
    assert_eq!(
        rows(&sheet, 0),
        "[0, 3, false][3, 4, 40, false][4, 6, false]"
    );
}

#[test]
fn length_spans_are_validated() {
    let config = formula_engine::SheetConfig {
        max_size: Size::new(10, 10),
        ..Default::default()
    };
    let mut sheet = Sheet::with_config(config).unwrap();
    assert_eq!(
        sheet.set_row_height(8, 3, 5),
        Err(SheetError::InvalidSpan {
            axis: Axis::Row,
            start: 8,
            count: 3
        })
    );
    assert!(sheet.hide_columns(10, 1, true).is_err());
    assert_eq!(sheet.size(), Size::new(0, 0));
    sheet.set_column_width(0, 10, 7).unwrap();
    assert_eq!(columns(&sheet, 0), "[0, 10, 7, false]");
}

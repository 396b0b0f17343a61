use pretty_assertions::assert_eq;
use report_model::{Row, SheetNameError, StyleSheet, Workbook};

#[test]
fn add_sheet_rejects_case_insensitive_duplicates() {
    let mut workbook = Workbook::new();
    workbook.add_sheet("Summary").expect("first sheet");

    let err = workbook.add_sheet("SUMMARY").unwrap_err();
    assert_eq!(err, SheetNameError::DuplicateName("SUMMARY".to_string()));
    assert_eq!(workbook.sheets.len(), 1);
}

#[test]
fn add_sheet_validates_names() {
    let mut workbook = Workbook::new();
    assert_eq!(workbook.add_sheet("  ").unwrap_err(), SheetNameError::EmptyName);
    assert_eq!(
        workbook.add_sheet("a/b").unwrap_err(),
        SheetNameError::InvalidCharacter('/')
    );
    assert_eq!(
        workbook.add_sheet("x".repeat(32)).unwrap_err(),
        SheetNameError::TooLong
    );
    assert_eq!(
        workbook.add_sheet("'quoted'").unwrap_err(),
        SheetNameError::LeadingOrTrailingApostrophe
    );
}

#[test]
fn with_styles_shares_the_style_sheet() {
    let styles = StyleSheet {
        styles_xml: Some(b"<styleSheet/>".to_vec()),
        ..Default::default()
    };
    let mut report = Workbook::with_styles(styles.clone());
    report
        .add_sheet("Data")
        .expect("add sheet")
        .add_row(Row::from_texts(["a"]));

    assert_eq!(report.styles, styles);
    assert_eq!(report.sheet("data").map(|s| s.rows.len()), Some(1));
}

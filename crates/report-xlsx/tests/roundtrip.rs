use pretty_assertions::assert_eq;
use report_model::{CellValue, Row, Workbook};
use report_xlsx::{
    read_workbook, read_workbook_from_bytes, write_workbook, write_workbook_to_bytes, ReadError,
};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

fn template_bytes() -> Vec<u8> {
    let mut workbook = XlsxWorkbook::new();
    let bold = Format::new().set_bold();
    let wrapped = Format::new().set_text_wrap();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Report").unwrap();
    sheet.merge_range(0, 0, 0, 2, "{{title}}", &bold).unwrap();
    sheet.write_string(1, 0, "{{range rows}}").unwrap();
    sheet.write_string(2, 0, "{{name}}").unwrap();
    sheet.write_number(2, 1, 42.5).unwrap();
    sheet.write_boolean(2, 2, true).unwrap();
    sheet.write_string_with_format(2, 3, "{{notes}}", &wrapped).unwrap();
    sheet.write_string(3, 0, "{{end}}").unwrap();
    sheet.write_formula(4, 1, "=SUM(B3:B3)").unwrap();
    sheet.set_row_height(2, 30).unwrap();
    sheet.set_column_width(0, 24).unwrap();

    let second = workbook.add_worksheet();
    second.set_name("Summary").unwrap();
    second.write_string(0, 0, "{{total}}").unwrap();

    workbook.save_to_buffer().unwrap()
}

#[test]
fn reads_template_into_dense_rows() {
    let workbook = read_workbook_from_bytes(&template_bytes()).unwrap();

    let names: Vec<&str> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Report", "Summary"]);

    let sheet = &workbook.sheets[0];
    assert_eq!(sheet.rows.len(), 5);
    assert_eq!(sheet.rows[0].cells[0].text(), Some("{{title}}"));
    assert_eq!(sheet.rows[0].cells[0].h_merge, 2);
    assert_eq!(sheet.rows[1].texts(), vec!["{{range rows}}"]);

    let body = &sheet.rows[2];
    assert_eq!(body.height, Some(30.0));
    assert_eq!(body.cells[1].value, CellValue::Number(42.5));
    assert_eq!(body.cells[2].value, CellValue::Boolean(true));
    let notes_xf = workbook.styles.xf(body.cells[3].style.xf_index).unwrap();
    assert!(notes_xf.wrap_text);

    let formula_row = &sheet.rows[4];
    assert_eq!(formula_row.cells[1].formula.as_deref(), Some("SUM(B3:B3)"));
    assert!(formula_row.cells[0].is_empty());

    let col = &sheet.columns[0];
    assert_eq!((col.min, col.max), (1, 1));
    assert!(col.width.is_some());

    assert!(workbook.styles.styles_xml.is_some());
}

#[test]
fn written_report_reads_back_with_cells_merges_and_layout() {
    let template = read_workbook_from_bytes(&template_bytes()).unwrap();

    let mut report = Workbook::with_styles(template.styles.clone());
    let sheet = report.add_sheet("Report").unwrap();
    // Shift the merged title down a row to check spans follow the anchor.
    sheet.rows.push(Row::default());
    sheet.rows.extend(template.sheets[0].rows.iter().cloned());
    sheet.columns = template.sheets[0].columns.clone();

    let mut long = report_model::Cell::new("a long line that should wrap");
    long.style.wrap_text = true;
    sheet.rows.push(Row::new(vec![long]));

    let bytes = write_workbook_to_bytes(&report).unwrap();
    let back = read_workbook_from_bytes(&bytes).unwrap();

    let sheet = &back.sheets[0];
    assert_eq!(sheet.rows.len(), 7);
    assert!(sheet.rows[0].cells.is_empty());
    assert_eq!(sheet.rows[1].cells[0].text(), Some("{{title}}"));
    assert_eq!(
        sheet.merged_ranges().iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        vec!["A2:C2"]
    );
    assert_eq!(sheet.rows[3].height, Some(30.0));
    assert_eq!(sheet.rows[3].cells[1].value, CellValue::Number(42.5));
    assert_eq!(sheet.rows[5].cells[1].formula.as_deref(), Some("SUM(B3:B3)"));
    assert_eq!(sheet.columns, template.sheets[0].columns);

    // The bold title keeps its original format index.
    assert_eq!(
        sheet.rows[1].cells[0].style.xf_index,
        template.sheets[0].rows[0].cells[0].style.xf_index
    );

    let wrapped = &sheet.rows[6].cells[0];
    assert!(back.styles.xf(wrapped.style.xf_index).unwrap().wrap_text);
    assert!(back.styles.cell_xfs.len() > template.styles.cell_xfs.len());
}

#[test]
fn writes_and_reads_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");

    let mut workbook = Workbook::new();
    workbook
        .add_sheet("Only")
        .unwrap()
        .rows
        .push(Row::from_texts(["a", "b"]));
    write_workbook(&workbook, &path).unwrap();

    let back = read_workbook(&path).unwrap();
    assert_eq!(back.sheets[0].name, "Only");
    assert_eq!(back.sheets[0].rows[0].texts(), vec!["a", "b"]);
}

#[test]
fn rejects_packages_without_a_workbook() {
    let err = read_workbook_from_bytes(b"not a zip").unwrap_err();
    assert!(matches!(err, ReadError::Zip(_)), "{err:?}");

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("docProps/app.xml", zip::write::FileOptions::<()>::default())
            .unwrap();
        std::io::Write::write_all(&mut zip, b"<Properties/>").unwrap();
        zip.finish().unwrap();
    }
    let err = read_workbook_from_bytes(buf.get_ref()).unwrap_err();
    assert!(matches!(err, ReadError::MissingPart("xl/workbook.xml")), "{err:?}");
}

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::NaiveDate;
use invoice_packager::ToolError;
use invoice_packager::io::cell::CellRef;
use invoice_packager::io::template::TemplateWorkbook;
use invoice_packager::pipeline::{RunContext, RunMode};
use invoice_packager::report::layout::GRAND_TOTAL_LABEL;
use invoice_packager::report::style::ReportSheet;
use invoice_packager::settings::Settings;
use rust_xlsxwriter::{Format, Workbook};
use tempfile::{TempDir, tempdir};

fn issue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

fn write_billing(path: &Path) {
    let rows: [(&str, &str, &str, &str, &str, f64, f64); 4] = [
        ("C1", "2024-03-01", "INV-1", "IT-2", "Widget", 100.0, 90.0),
        ("C1", "2024-03-02", "INV-1", "IT-1", "Bolt", 50.0, 45.0),
        ("C2", "2024-03-05", "INV-9", "IT-7", "Gear", 10.0, 10.0),
        ("C1", "2024-04-10", "INV-2", "IT-2", "Widget", 25.5, 20.0),
    ];

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("KF").expect("sheet named");
    for (column, header) in ["Client", "Date", "Invoice", "Item", "Description", "Amount", "Assessed"]
        .iter()
        .enumerate()
    {
        sheet.write_string(0, column as u16, *header).expect("header written");
    }
    for (offset, (client, date, invoice, item, description, amount, assessed)) in rows.iter().enumerate() {
        let row = offset as u32 + 1;
        sheet.write_string(row, 0, *client).expect("cell written");
        sheet.write_string(row, 1, *date).expect("cell written");
        sheet.write_string(row, 2, *invoice).expect("cell written");
        sheet.write_string(row, 3, *item).expect("cell written");
        sheet.write_string(row, 4, *description).expect("cell written");
        sheet.write_number(row, 5, *amount).expect("cell written");
        sheet.write_number(row, 6, *assessed).expect("cell written");
    }

    let notes = workbook.add_worksheet().set_name("Notes").expect("sheet named");
    notes.write_string(0, 0, "not billing data").expect("cell written");
    workbook.save(path).expect("billing workbook saved");
}

fn write_client_info(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("Clients").expect("sheet named");
    let rows = [
        ["Id", "Name", "Address", "City", "Postal", "Reference"],
        ["C1", "Acme Ltd", "1 Main St", "Springfield", "12345", "EXT-77"],
        ["ZZ", "Nobody", "", "", "", ""],
    ];
    for (row, values) in rows.iter().enumerate() {
        for (column, value) in values.iter().enumerate() {
            sheet
                .write_string(row as u32, column as u16, *value)
                .expect("cell written");
        }
    }
    workbook.save(path).expect("client info saved");
}

fn write_template(path: &Path, with_header: bool) {
    let money = Format::new().set_num_format("#,##0.00");
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let plain = Format::new().set_italic();

    let mut workbook = Workbook::new();
    let summary = workbook.add_worksheet().set_name("Schedule 2").expect("sheet named");
    summary.write_string(1, 1, "Schedule of invoices").expect("title written");
    summary.write_blank(7, 1, &date).expect("cell written");
    summary.write_blank(7, 2, &plain).expect("cell written");
    summary.write_blank(7, 4, &money).expect("cell written");
    summary.write_blank(7, 7, &money).expect("cell written");

    let items = workbook.add_worksheet().set_name("Schedule 3").expect("sheet named");
    items.write_blank(8, 1, &plain).expect("cell written");

    if with_header {
        write_header_sheet(&mut workbook, &money, &date);
    }
    workbook.save(path).expect("template saved");
}

fn write_invoice_template(path: &Path) {
    let money = Format::new().set_num_format("#,##0.00");
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let mut workbook = Workbook::new();
    write_header_sheet(&mut workbook, &money, &date);
    workbook.save(path).expect("invoice template saved");
}

fn write_header_sheet(workbook: &mut Workbook, money: &Format, date: &Format) {
    let header = workbook.add_worksheet().set_name("Invoice").expect("sheet named");
    header.write_string(0, 0, "INVOICE").expect("title written");
    header.write_blank(6, 5, date).expect("cell written");
    header.write_blank(7, 5, date).expect("cell written");
    header.write_blank(19, 5, money).expect("cell written");
    header.write_blank(23, 5, money).expect("cell written");
}

/// Lays out inputs, templates and a settings file in a fresh directory.
fn fixture(invoice_template: bool) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("temporary directory");
    write_billing(&dir.path().join("billing.xlsx"));
    write_client_info(&dir.path().join("clients.xlsx"));
    write_template(&dir.path().join("schedules.xlsx"), !invoice_template);

    let invoice_line = if invoice_template {
        write_invoice_template(&dir.path().join("invoice.xlsx"));
        r#""InvoiceTemplateDocumentPath": "invoice.xlsx","#
    } else {
        ""
    };
    let settings = format!(
        r#"{{
            "InputDocumentPath": "billing.xlsx",
            "ClientInfoDocumentPath": "clients.xlsx",
            "TemplateDocumentPath": "schedules.xlsx",
            {invoice_line}
            "OutputFolder": "out",
            "Worksheets": {{
                "KF": {{
                    "FirstRow": 2,
                    "ClientId": "A",
                    "Date": "B",
                    "InvoiceId": "C",
                    "ItemId": "D",
                    "ItemDescription": "E",
                    "Amount": "F",
                    "Assessed": "G"
                }}
            }}
        }}"#
    );
    let settings_path = dir.path().join("settings.json");
    fs::write(&settings_path, settings).expect("settings written");
    (dir, settings_path)
}

fn run(settings_path: &Path, mode: RunMode) -> invoice_packager::Result<RunContext> {
    let settings = Settings::load(settings_path)?;
    let mut context = RunContext::new(settings, mode);
    context.run(issue_date())?;
    Ok(context)
}

fn cell(path: &Path, sheet: &str, reference: &str) -> DataType {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("report opened");
    let range = workbook
        .worksheet_range(sheet)
        .expect("sheet present")
        .expect("sheet read");
    let at = CellRef::parse(reference).expect("valid reference");
    range
        .get_value((at.row - 1, at.column))
        .cloned()
        .unwrap_or(DataType::Empty)
}

fn number(value: &DataType) -> Option<f64> {
    match value {
        DataType::Float(number) | DataType::DateTime(number) => Some(*number),
        DataType::Int(number) => Some(*number as f64),
        _ => None,
    }
}

fn text(value: DataType) -> String {
    match value {
        DataType::String(text) => text,
        other => panic!("expected text, found {other:?}"),
    }
}

#[test]
fn writes_one_package_per_client() {
    let (dir, settings_path) = fixture(false);
    let context = run(&settings_path, RunMode::Development).expect("run succeeded");

    let registry = context.registry();
    assert_eq!(registry.len(), 2);
    assert!(!registry.contains("ZZ"));
    assert_eq!(context.entries().len(), 4);
    assert_eq!(registry.get("C1").expect("C1 present").name, "Acme Ltd");

    let report = dir.path().join("out").join("C1.xlsx");
    assert!(dir.path().join("out").join("C2.xlsx").exists());

    assert_eq!(text(cell(&report, "Schedule 2", "B2")), "Schedule of invoices");
    assert_eq!(number(&cell(&report, "Schedule 2", "B8")), Some(45352.0));
    assert_eq!(text(cell(&report, "Schedule 2", "C8")), "INV-1");
    assert_eq!(number(&cell(&report, "Schedule 2", "E8")), Some(150.0));
    assert_eq!(number(&cell(&report, "Schedule 2", "H8")), Some(135.0));
    assert_eq!(text(cell(&report, "Schedule 2", "C9")), "INV-2");
    assert_eq!(number(&cell(&report, "Schedule 2", "E9")), Some(25.5));
    assert_eq!(cell(&report, "Schedule 2", "C10"), DataType::Empty);
    assert_eq!(text(cell(&report, "Schedule 2", "C11")), GRAND_TOTAL_LABEL);
    assert_eq!(number(&cell(&report, "Schedule 2", "E11")), Some(175.5));
    assert_eq!(number(&cell(&report, "Schedule 2", "H11")), Some(155.0));

    assert_eq!(text(cell(&report, "Schedule 3", "B9")), "C1");
    assert_eq!(text(cell(&report, "Schedule 3", "C9")), "IT-1");
    assert_eq!(text(cell(&report, "Schedule 3", "D9")), "Bolt");
    assert_eq!(text(cell(&report, "Schedule 3", "D10")), "Widget");
    assert_eq!(cell(&report, "Schedule 3", "C11"), DataType::Empty);

    assert_eq!(text(cell(&report, "Invoice", "A1")), "INVOICE");
    assert_eq!(text(cell(&report, "Invoice", "F5")), "C1");
    assert_eq!(text(cell(&report, "Invoice", "F6")), "EXT-77");
    assert_eq!(text(cell(&report, "Invoice", "B8")), "Acme Ltd");
    assert_eq!(text(cell(&report, "Invoice", "B11")), "12345");
    assert_eq!(number(&cell(&report, "Invoice", "F24")), Some(155.0));

    let other = dir.path().join("out").join("C2.xlsx");
    assert_eq!(number(&cell(&other, "Schedule 2", "H10")), Some(10.0));
    assert_eq!(number(&cell(&other, "Invoice", "F20")), Some(10.0));
}

#[test]
fn template_styles_survive_and_totals_are_bold() {
    let (dir, settings_path) = fixture(false);
    run(&settings_path, RunMode::Development).expect("run succeeded");

    let mut report = TemplateWorkbook::open(&dir.path().join("out").join("C1.xlsx")).expect("report opened");
    let style = |report: &mut TemplateWorkbook, sheet: &str, reference: &str| {
        report
            .sheet_mut(sheet)
            .expect("sheet parsed")
            .expect("sheet present")
            .style_at(CellRef::parse(reference).expect("valid reference"))
    };

    let amount = style(&mut report, "Schedule 2", "E8").expect("amount styled");
    assert_eq!(style(&mut report, "Schedule 2", "E9"), Some(amount));
    assert!(!report.is_bold(amount));

    let total = style(&mut report, "Schedule 2", "E11").expect("total styled");
    assert_ne!(total, amount);
    assert!(report.is_bold(total));
    let label = style(&mut report, "Schedule 2", "C11").expect("label styled");
    assert!(report.is_bold(label));

    let item = style(&mut report, "Schedule 3", "B9").expect("item styled");
    assert_eq!(style(&mut report, "Schedule 3", "B10"), Some(item));

    let due = style(&mut report, "Invoice", "F8").expect("due date styled");
    assert!(!report.is_bold(due));
    assert_eq!(style(&mut report, "Invoice", "F7"), Some(due));
    let money = style(&mut report, "Invoice", "F20").expect("total styled");
    assert_ne!(money, due);
    assert_eq!(style(&mut report, "Invoice", "F24"), Some(money));
    assert_eq!(style(&mut report, "Invoice", "F5"), None);

    assert_eq!(
        cell(report.path(), "Invoice", "F8"),
        DataType::DateTime(45474.0)
    );
    assert_eq!(
        cell(report.path(), "Invoice", "F7"),
        DataType::DateTime(45444.0)
    );
}

#[test]
fn production_run_refuses_to_overwrite() {
    let (dir, settings_path) = fixture(false);
    run(&settings_path, RunMode::Development).expect("first run succeeded");
    run(&settings_path, RunMode::Development).expect("development overwrites");

    let error = run(&settings_path, RunMode::Production).err().expect("collision reported");
    match error {
        ToolError::OutputExists(path) => assert_eq!(path, dir.path().join("out").join("C1.xlsx")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn separate_invoice_template_gets_its_own_file() {
    let (dir, settings_path) = fixture(true);
    let context = run(&settings_path, RunMode::Development).expect("run succeeded");
    assert_eq!(context.registry().len(), 2);

    let invoice = dir.path().join("out").join("C1 Invoice.xlsx");
    assert!(invoice.exists());
    assert_eq!(text(cell(&invoice, "Invoice", "B8")), "Acme Ltd");
    assert_eq!(number(&cell(&invoice, "Invoice", "F20")), Some(155.0));

    let schedules = dir.path().join("out").join("C1.xlsx");
    assert_eq!(number(&cell(&schedules, "Schedule 2", "H11")), Some(155.0));
}

#[test]
fn missing_input_workbook_is_reported() {
    let (dir, settings_path) = fixture(false);
    fs::remove_file(dir.path().join("billing.xlsx")).expect("input removed");
    let error = run(&settings_path, RunMode::Development).err().expect("run failed");
    assert!(matches!(error, ToolError::MissingInput(_)));
}

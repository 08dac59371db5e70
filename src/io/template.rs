//! Fills value cells of an `.xlsx` template in place.
//!
//! The workbook is kept as its raw zip parts. Only the worksheets that were
//! written to and the stylesheet (when a bold variant had to be derived) are
//! re-serialised on save; every other part is copied through untouched, so
//! template content and formatting survive.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, ToolError};
use crate::io::cell::{CellRef, CellStyle, CellValue};
use crate::io::dates::date_to_serial;
use crate::report::style::{ReportSheet, ReportWorkbook};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

type Attributes = Vec<(String, String)>;

struct Part {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
}

/// An `.xlsx` workbook opened for value patching.
pub struct TemplateWorkbook {
    path: PathBuf,
    parts: Vec<Part>,
    sheet_parts: Vec<(String, String)>,
    worksheets: HashMap<String, WorksheetXml>,
    styles: Option<Stylesheet>,
}

impl TemplateWorkbook {
    /// Copies `template` to `output` and opens the copy.
    pub fn create_from(template: &Path, output: &Path) -> Result<Self> {
        if !template.exists() {
            return Err(ToolError::MissingInput(template.to_path_buf()));
        }
        fs::copy(template, output)?;
        Self::open(output)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            parts.push(Part {
                name: entry.name().to_string(),
                data,
                compression: entry.compression(),
            });
        }

        let mut workbook = Self {
            path: path.to_path_buf(),
            parts,
            sheet_parts: Vec::new(),
            worksheets: HashMap::new(),
            styles: None,
        };

        let workbook_xml = workbook.part_text(WORKBOOK_PART)?.ok_or_else(|| {
            ToolError::InvalidWorkbook(format!("{} has no {WORKBOOK_PART}", path.display()))
        })?;
        let rels_xml = workbook.part_text(WORKBOOK_RELS_PART)?.ok_or_else(|| {
            ToolError::InvalidWorkbook(format!("{} has no {WORKBOOK_RELS_PART}", path.display()))
        })?;
        workbook.sheet_parts = resolve_sheet_parts(&workbook_xml, &rels_xml)?;

        workbook.styles = match workbook.part_text(STYLES_PART)? {
            Some(xml) => Some(Stylesheet::parse(xml)?),
            None => None,
        };

        debug!(
            path = %path.display(),
            sheets = workbook.sheet_parts.len(),
            "template opened"
        );
        Ok(workbook)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `style` renders its font bold.
    pub fn is_bold(&self, style: CellStyle) -> bool {
        self.styles
            .as_ref()
            .is_some_and(|styles| styles.is_bold(style.0))
    }

    /// Opens the named worksheet for reading and writing.
    pub fn sheet_mut(&mut self, name: &str) -> Result<Option<TemplateSheet<'_>>> {
        let Some(part) = self
            .sheet_parts
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, part)| part.clone())
        else {
            return Ok(None);
        };

        if !self.worksheets.contains_key(&part) {
            let xml = self.part_text(&part)?.ok_or_else(|| {
                ToolError::InvalidWorkbook(format!("worksheet part '{part}' is missing"))
            })?;
            self.worksheets.insert(part.clone(), WorksheetXml::parse(xml)?);
        }

        let Self {
            worksheets, styles, ..
        } = self;
        Ok(worksheets.get_mut(&part).map(|sheet| TemplateSheet {
            sheet,
            styles: styles.as_mut(),
        }))
    }

    /// Writes the workbook back to its path, patching modified parts.
    pub fn save(&self) -> Result<()> {
        let mut patched: HashMap<&str, Vec<u8>> = HashMap::new();
        for (part, sheet) in &self.worksheets {
            if sheet.dirty {
                patched.insert(part.as_str(), sheet.render().into_bytes());
            }
        }
        if let Some(styles) = self.styles.as_ref().filter(|styles| styles.dirty) {
            patched.insert(STYLES_PART, styles.render().into_bytes());
        }

        // The calc chain lists formula cells; a stale entry makes Excel repair the file.
        let drop_calc_chain = self.worksheets.values().any(|sheet| sheet.formulas_cleared)
            && self.parts.iter().any(|part| part.name == CALC_CHAIN_PART);
        if drop_calc_chain {
            if let Some(xml) = self.part_text(CONTENT_TYPES_PART)? {
                let xml = remove_elements(&xml, b"Override", |attributes| {
                    has_attribute(attributes, "PartName", |value| value == "/xl/calcChain.xml")
                })?;
                patched.insert(CONTENT_TYPES_PART, xml.into_bytes());
            }
            if let Some(xml) = self.part_text(WORKBOOK_RELS_PART)? {
                let xml = remove_elements(&xml, b"Relationship", |attributes| {
                    has_attribute(attributes, "Type", |value| value.ends_with("/calcChain"))
                })?;
                patched.insert(WORKBOOK_RELS_PART, xml.into_bytes());
            }
            debug!(path = %self.path.display(), "calc chain dropped");
        }

        let tmp_path = self.path.with_extension("xlsx.tmp");
        let mut out = ZipWriter::new(File::create(&tmp_path)?);
        for part in &self.parts {
            if drop_calc_chain && part.name == CALC_CHAIN_PART {
                continue;
            }
            let options = SimpleFileOptions::default().compression_method(part.compression);
            out.start_file(part.name.as_str(), options)?;
            let data = patched
                .get(part.name.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&part.data);
            out.write_all(data)?;
        }
        out.finish()?;

        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), parts = patched.len(), "template saved");
        Ok(())
    }

    fn part_text(&self, name: &str) -> Result<Option<String>> {
        match self.parts.iter().find(|part| part.name == name) {
            Some(part) => String::from_utf8(part.data.clone())
                .map(Some)
                .map_err(|_| ToolError::InvalidWorkbook(format!("part '{name}' is not UTF-8"))),
            None => Ok(None),
        }
    }
}

impl ReportWorkbook for TemplateWorkbook {
    type Sheet<'a> = TemplateSheet<'a>;

    fn sheet(&mut self, name: &str) -> Result<Option<Self::Sheet<'_>>> {
        self.sheet_mut(name)
    }
}

/// Mutable handle on one worksheet of a [`TemplateWorkbook`].
pub struct TemplateSheet<'a> {
    sheet: &'a mut WorksheetXml,
    styles: Option<&'a mut Stylesheet>,
}

impl ReportSheet for TemplateSheet<'_> {
    fn style_at(&self, cell: CellRef) -> Option<CellStyle> {
        self.sheet.style_at(cell).map(CellStyle)
    }

    fn set_style(&mut self, cell: CellRef, style: Option<CellStyle>) {
        self.sheet.cell_mut(cell).style = style.map(|style| style.0);
    }

    fn set_value(&mut self, cell: CellRef, value: &CellValue) -> Result<()> {
        self.sheet.write_value(cell, value)
    }

    fn embolden(&mut self, cell: CellRef) -> Result<()> {
        let Some(styles) = self.styles.as_deref_mut() else {
            warn!(%cell, "template has no stylesheet; bold skipped");
            return Ok(());
        };
        let base = self.sheet.style_at(cell).unwrap_or(0);
        let bold = styles.bold_variant(base)?;
        self.sheet.cell_mut(cell).style = Some(bold);
        Ok(())
    }
}

fn attribute_list(start: &BytesStart<'_>) -> Attributes {
    start
        .attributes()
        .flatten()
        .map(|attr| {
            (
                String::from_utf8_lossy(attr.key.as_ref()).to_string(),
                String::from_utf8_lossy(&attr.value).to_string(),
            )
        })
        .collect()
}

fn render_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(key, value)| format!(" {key}=\"{value}\""))
        .collect()
}

fn resolve_sheet_parts(workbook_xml: &str, rels_xml: &str) -> Result<Vec<(String, String)>> {
    let mut sheets = Vec::new();
    let mut reader = Reader::from_str(workbook_xml);
    loop {
        match reader.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rid = None;
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"name" {
                        let raw = String::from_utf8_lossy(&attr.value).to_string();
                        name = Some(match quick_xml::escape::unescape(&raw) {
                            Ok(unescaped) => unescaped.to_string(),
                            Err(_) => raw,
                        });
                    } else if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
                        rid = Some(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
                if let (Some(name), Some(rid)) = (name, rid) {
                    sheets.push((name, rid));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut targets: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    loop {
        match reader.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => target = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(sheets
        .into_iter()
        .filter_map(|(name, rid)| {
            let target = targets.get(&rid)?;
            let part = match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{target}"),
            };
            Some((name, part))
        })
        .collect())
}

/// Worksheet XML split around its `sheetData`, with the cells held as a
/// row → column map.
#[derive(Debug, Clone)]
struct WorksheetXml {
    prefix: String,
    suffix: String,
    rows: BTreeMap<u32, RowXml>,
    column_styles: Vec<(u32, u32, u32)>,
    dirty: bool,
    /// Set once a formula cell has been overwritten with a plain value.
    formulas_cleared: bool,
}

#[derive(Debug, Clone, Default)]
struct RowXml {
    attributes: Attributes,
    cells: BTreeMap<u32, CellXml>,
}

#[derive(Debug, Clone, Default)]
struct CellXml {
    style: Option<u32>,
    kind: Option<String>,
    attributes: Attributes,
    body: String,
}

impl WorksheetXml {
    fn parse(xml: String) -> Result<Self> {
        let mut reader = Reader::from_str(&xml);
        let mut rows = BTreeMap::new();
        let mut column_styles = Vec::new();
        let mut split = None;

        loop {
            let before = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"col" => {
                    if let Some(range) = column_style(e) {
                        column_styles.push(range);
                    }
                }
                Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" => {
                    parse_rows(&mut reader, &xml, &mut rows)?;
                    split = Some((before, reader.buffer_position() as usize));
                    break;
                }
                Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                    split = Some((before, reader.buffer_position() as usize));
                    break;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let (prefix_end, suffix_start) = split
            .ok_or_else(|| ToolError::InvalidWorkbook("worksheet has no sheetData".into()))?;

        Ok(Self {
            prefix: xml[..prefix_end].to_string(),
            suffix: xml[suffix_start..].to_string(),
            rows,
            column_styles,
            dirty: false,
            formulas_cleared: false,
        })
    }

    /// Cell style, falling back to the row's and then the column's default.
    fn style_at(&self, cell: CellRef) -> Option<u32> {
        let row = self.rows.get(&cell.row);
        if let Some(style) = row
            .and_then(|row| row.cells.get(&cell.column))
            .and_then(|cell| cell.style)
        {
            return Some(style);
        }
        if let Some(style) = row.and_then(RowXml::default_style) {
            return Some(style);
        }
        let column = cell.column + 1;
        self.column_styles
            .iter()
            .find(|(min, max, _)| (*min..=*max).contains(&column))
            .map(|(_, _, style)| *style)
    }

    /// Replaces the value of `cell`. A shared-formula master is refused since
    /// the cells sharing its formula would lose their definition.
    fn write_value(&mut self, cell: CellRef, value: &CellValue) -> Result<()> {
        let formula = self
            .rows
            .get(&cell.row)
            .and_then(|row| row.cells.get(&cell.column))
            .and_then(CellXml::formula);
        if let Some(formula) = formula {
            let shared = has_attribute(&formula, "t", |value| value == "shared");
            if shared && formula.iter().any(|(key, _)| key == "ref") {
                return Err(ToolError::SharedFormula(cell.to_string()));
            }
            self.formulas_cleared = true;
        }
        self.cell_mut(cell).set_value(value);
        Ok(())
    }

    fn cell_mut(&mut self, cell: CellRef) -> &mut CellXml {
        self.dirty = true;
        let row = self.rows.entry(cell.row).or_default();
        row.attributes.retain(|(key, _)| key != "spans");
        row.cells.entry(cell.column).or_default()
    }

    fn render(&self) -> String {
        let mut xml = String::with_capacity(self.prefix.len() + self.suffix.len() + 64 * self.rows.len());
        xml.push_str(&self.prefix);
        xml.push_str("<sheetData>");
        for (number, row) in &self.rows {
            let attributes = render_attributes(&row.attributes);
            if row.cells.is_empty() {
                xml.push_str(&format!("<row r=\"{number}\"{attributes}/>"));
                continue;
            }
            xml.push_str(&format!("<row r=\"{number}\"{attributes}>"));
            for (column, cell) in &row.cells {
                xml.push_str(&cell.render(CellRef::new(*number, *column)));
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");
        xml.push_str(&self.suffix);
        xml
    }
}

impl RowXml {
    fn default_style(&self) -> Option<u32> {
        let custom = self
            .attributes
            .iter()
            .any(|(key, value)| key == "customFormat" && (value == "1" || value == "true"));
        if !custom {
            return None;
        }
        self.attributes
            .iter()
            .find(|(key, _)| key == "s")
            .and_then(|(_, value)| value.parse().ok())
    }
}

impl CellXml {
    fn from_start(start: &BytesStart<'_>) -> (Option<CellRef>, Self) {
        let mut reference = None;
        let mut cell = CellXml::default();
        for (key, value) in attribute_list(start) {
            match key.as_str() {
                "r" => reference = CellRef::parse(&value).ok(),
                "s" => cell.style = value.parse().ok(),
                "t" => cell.kind = Some(value),
                _ => cell.attributes.push((key, value)),
            }
        }
        (reference, cell)
    }

    /// Attributes of the cell's `<f>` element, if it has one.
    fn formula(&self) -> Option<Attributes> {
        if self.body.is_empty() {
            return None;
        }
        let mut reader = Reader::from_str(&self.body);
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"f" => {
                    return Some(attribute_list(e));
                }
                Ok(Event::Eof) | Err(_) => return None,
                _ => {}
            }
        }
    }

    fn set_value(&mut self, value: &CellValue) {
        match value {
            CellValue::Text(text) => {
                self.kind = Some("inlineStr".to_string());
                self.body = format!("<is><t xml:space=\"preserve\">{}</t></is>", escape(text.as_str()));
            }
            CellValue::Number(number) => {
                self.kind = None;
                self.body = format!("<v>{number}</v>");
            }
            CellValue::Date(date) => {
                self.kind = None;
                self.body = format!("<v>{}</v>", date_to_serial(*date));
            }
        }
    }

    fn render(&self, reference: CellRef) -> String {
        let mut xml = format!("<c r=\"{reference}\"");
        if let Some(style) = self.style {
            xml.push_str(&format!(" s=\"{style}\""));
        }
        if let Some(kind) = &self.kind {
            xml.push_str(&format!(" t=\"{kind}\""));
        }
        xml.push_str(&render_attributes(&self.attributes));
        if self.body.is_empty() {
            xml.push_str("/>");
        } else {
            xml.push('>');
            xml.push_str(&self.body);
            xml.push_str("</c>");
        }
        xml
    }
}

fn column_style(start: &BytesStart<'_>) -> Option<(u32, u32, u32)> {
    let mut min = None;
    let mut max = None;
    let mut style = None;
    for (key, value) in attribute_list(start) {
        match key.as_str() {
            "min" => min = value.parse().ok(),
            "max" => max = value.parse().ok(),
            "style" => style = value.parse().ok(),
            _ => {}
        }
    }
    Some((min?, max?, style?))
}

fn parse_rows(
    reader: &mut Reader<&[u8]>,
    xml: &str,
    rows: &mut BTreeMap<u32, RowXml>,
) -> Result<()> {
    let mut current: Option<(u32, RowXml)> = None;
    let mut next_row = 1;
    let mut next_column = 0;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == b"row" => {
                let (number, row) = row_from_start(e, next_row);
                current = Some((number, row));
                next_column = 0;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                let (number, row) = row_from_start(e, next_row);
                rows.insert(number, row);
                next_row = number + 1;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"row" => {
                if let Some((number, row)) = current.take() {
                    rows.insert(number, row);
                    next_row = number + 1;
                }
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"c" => {
                let (reference, mut cell) = CellXml::from_start(e);
                let name = e.name().as_ref().to_vec();
                let span = reader.read_to_end(QName(&name))?;
                cell.body = xml[span.start as usize..span.end as usize].to_string();
                next_column = place_cell(&mut current, reference, next_column, cell)?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                let (reference, cell) = CellXml::from_start(e);
                next_column = place_cell(&mut current, reference, next_column, cell)?;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => return Ok(()),
            Event::Eof => {
                return Err(ToolError::InvalidWorkbook("unterminated sheetData".into()));
            }
            _ => {}
        }
    }
}

fn row_from_start(start: &BytesStart<'_>, fallback: u32) -> (u32, RowXml) {
    let mut number = fallback;
    let mut row = RowXml::default();
    for (key, value) in attribute_list(start) {
        if key == "r" {
            number = value.parse().unwrap_or(fallback);
        } else {
            row.attributes.push((key, value));
        }
    }
    (number, row)
}

fn place_cell(
    current: &mut Option<(u32, RowXml)>,
    reference: Option<CellRef>,
    next_column: u32,
    cell: CellXml,
) -> Result<u32> {
    let (_, row) = current
        .as_mut()
        .ok_or_else(|| ToolError::InvalidWorkbook("cell outside of a row".into()))?;
    let column = reference.map(|reference| reference.column).unwrap_or(next_column);
    row.cells.insert(column, cell);
    Ok(column + 1)
}

/// `<fonts>` or `<cellXfs>` block of the stylesheet, children kept verbatim.
#[derive(Debug, Clone)]
struct XmlList {
    start: usize,
    end: usize,
    tag: String,
    attributes: Attributes,
    children: Vec<String>,
}

impl XmlList {
    fn render(&self) -> String {
        let attributes: Attributes = self
            .attributes
            .iter()
            .filter(|(key, _)| key != "count")
            .cloned()
            .collect();
        format!(
            "<{tag} count=\"{count}\"{attributes}>{children}</{tag}>",
            tag = self.tag,
            count = self.children.len(),
            attributes = render_attributes(&attributes),
            children = self.children.concat(),
        )
    }
}

/// Cell formats of a workbook, extended on demand with bold variants.
#[derive(Debug, Clone)]
struct Stylesheet {
    xml: String,
    fonts: XmlList,
    cell_formats: XmlList,
    bold_variants: HashMap<u32, u32>,
    dirty: bool,
}

impl Stylesheet {
    fn parse(xml: String) -> Result<Self> {
        let mut reader = Reader::from_str(&xml);
        let mut fonts = None;
        let mut cell_formats = None;

        loop {
            let before = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Start(ref e) if e.local_name().as_ref() == b"fonts" => {
                    fonts = Some(read_list(&mut reader, &xml, e, before, b"font")?);
                }
                Event::Start(ref e) if e.local_name().as_ref() == b"cellXfs" => {
                    cell_formats = Some(read_list(&mut reader, &xml, e, before, b"xf")?);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        match (fonts, cell_formats) {
            (Some(fonts), Some(cell_formats)) => Ok(Self {
                xml,
                fonts,
                cell_formats,
                bold_variants: HashMap::new(),
                dirty: false,
            }),
            _ => Err(ToolError::InvalidWorkbook(
                "stylesheet lacks fonts or cellXfs".into(),
            )),
        }
    }

    fn font_id(&self, style: u32) -> Result<u32> {
        let xf = self.cell_formats.children.get(style as usize).ok_or_else(|| {
            ToolError::InvalidWorkbook(format!("cell format {style} is not defined"))
        })?;
        Ok(start_attributes(xf)?
            .iter()
            .find(|(key, _)| key == "fontId")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(0))
    }

    fn is_bold(&self, style: u32) -> bool {
        self.font_id(style)
            .ok()
            .and_then(|font| self.fonts.children.get(font as usize))
            .is_some_and(|font| font_is_bold(font))
    }

    /// Index of a cell format equal to `style` but with a bold font.
    fn bold_variant(&mut self, style: u32) -> Result<u32> {
        if let Some(bold) = self.bold_variants.get(&style) {
            return Ok(*bold);
        }
        if self.is_bold(style) {
            return Ok(style);
        }

        let font_id = self.font_id(style)?;
        let font = self.fonts.children.get(font_id as usize).ok_or_else(|| {
            ToolError::InvalidWorkbook(format!("font {font_id} is not defined"))
        })?;
        let bold_font = embolden_font(font);
        self.fonts.children.push(bold_font);
        let bold_font = (self.fonts.children.len() - 1) as u32;

        let xf = &self.cell_formats.children[style as usize];
        let rewritten = rewrite_start(
            xf,
            &[("fontId", bold_font.to_string()), ("applyFont", "1".to_string())],
        )?;
        self.cell_formats.children.push(rewritten);
        let bold = (self.cell_formats.children.len() - 1) as u32;

        self.bold_variants.insert(style, bold);
        self.dirty = true;
        Ok(bold)
    }

    fn render(&self) -> String {
        let (first, second) = if self.fonts.start < self.cell_formats.start {
            (&self.fonts, &self.cell_formats)
        } else {
            (&self.cell_formats, &self.fonts)
        };
        let mut xml = String::with_capacity(self.xml.len() + 256);
        xml.push_str(&self.xml[..first.start]);
        xml.push_str(&first.render());
        xml.push_str(&self.xml[first.end..second.start]);
        xml.push_str(&second.render());
        xml.push_str(&self.xml[second.end..]);
        xml
    }
}

fn read_list(
    reader: &mut Reader<&[u8]>,
    xml: &str,
    start: &BytesStart<'_>,
    start_offset: usize,
    child: &[u8],
) -> Result<XmlList> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let attributes = attribute_list(start);
    let mut children = Vec::new();

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == child => {
                let name = e.name().as_ref().to_vec();
                reader.read_to_end(QName(&name))?;
                children.push(xml[before..reader.buffer_position() as usize].to_string());
            }
            Event::Empty(ref e) if e.local_name().as_ref() == child => {
                children.push(xml[before..reader.buffer_position() as usize].to_string());
            }
            Event::End(ref e) if e.name().as_ref() == tag.as_bytes() => {
                return Ok(XmlList {
                    start: start_offset,
                    end: reader.buffer_position() as usize,
                    tag,
                    attributes,
                    children,
                });
            }
            Event::Eof => {
                return Err(ToolError::InvalidWorkbook(format!("unterminated <{tag}>")));
            }
            _ => {}
        }
    }
}

/// Attributes of the first element of `fragment`.
fn start_attributes(fragment: &str) -> Result<Attributes> {
    let mut reader = Reader::from_str(fragment);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => return Ok(attribute_list(e)),
            Event::Eof => return Ok(Vec::new()),
            _ => {}
        }
    }
}

/// Replaces (or adds) attributes on the first element of `fragment`.
fn rewrite_start(fragment: &str, replacements: &[(&str, String)]) -> Result<String> {
    let mut reader = Reader::from_str(fragment);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = fragment[..reader.buffer_position() as usize].ends_with("/>");
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let mut attributes = attribute_list(e);
                for (key, value) in replacements {
                    match attributes.iter_mut().find(|(existing, _)| existing == key) {
                        Some(slot) => slot.1 = value.clone(),
                        None => attributes.push((key.to_string(), value.clone())),
                    }
                }
                let rest = &fragment[reader.buffer_position() as usize..];
                let close = if is_empty { "/>" } else { ">" };
                return Ok(format!("<{tag}{}{close}{rest}", render_attributes(&attributes)));
            }
            Event::Eof => {
                return Err(ToolError::InvalidWorkbook(format!("empty style fragment '{fragment}'")));
            }
            _ => {}
        }
    }
}

fn has_attribute(attributes: &Attributes, key: &str, accept: impl Fn(&str) -> bool) -> bool {
    attributes
        .iter()
        .any(|(name, value)| name == key && accept(value))
}

/// Copy of `xml` without the `name` elements whose attributes match.
fn remove_elements(xml: &str, name: &[u8], matches: impl Fn(&Attributes) -> bool) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut kept = String::with_capacity(xml.len());
    let mut copied = 0;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Empty(ref e) if e.local_name().as_ref() == name && matches(&attribute_list(e)) => {
                kept.push_str(&xml[copied..before]);
                copied = reader.buffer_position() as usize;
            }
            Event::Start(ref e) if e.local_name().as_ref() == name && matches(&attribute_list(e)) => {
                let element = e.name().as_ref().to_vec();
                reader.read_to_end(QName(&element))?;
                kept.push_str(&xml[copied..before]);
                copied = reader.buffer_position() as usize;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    kept.push_str(&xml[copied..]);
    Ok(kept)
}

fn font_is_bold(font: &str) -> bool {
    let mut reader = Reader::from_str(font);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"b" => {
                return !attribute_list(e)
                    .iter()
                    .any(|(key, value)| key == "val" && (value == "0" || value == "false"));
            }
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
    }
}

fn embolden_font(font: &str) -> String {
    let trimmed = font.trim_end();
    if let Some(open) = trimmed.strip_suffix("/>") {
        return format!("{}><b/></font>", open.trim_end());
    }
    match font.find('>') {
        Some(end) => format!("{}<b/>{}", &font[..=end], &font[end + 1..]),
        None => font.to_string(),
    }
}

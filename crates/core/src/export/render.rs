use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};

use crate::domain::inspection::{InspectionRoom, RoomDimensions, RoomOpening};

use super::records::{money, ExportSummary, LineItemRecord, UNASSIGNED_ROOM};
use super::ExportError;

const XACTDOC_TEMPLATE: &str = "xactdoc.xml.tera";
const ROUGHDRAFT_TEMPLATE: &str = "roughdraft.xml.tera";

const DEFAULT_LENGTH_FT: i64 = 10;
const DEFAULT_WIDTH_FT: i64 = 10;
const DEFAULT_HEIGHT_FT: i64 = 8;

/// Escapes the five XML special characters, plus line breaks and tabs so
/// attribute values survive whitespace normalization.
pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn tera_xml_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let raw = match value {
        tera::Value::String(text) => text.clone(),
        tera::Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(tera::Value::String(escape_xml(&raw)))
}

pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("xml", tera_xml_filter);
}

#[derive(Serialize)]
pub struct CarrierView {
    pub id: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct SummaryView {
    pub total_rcv: String,
    pub total_acv: String,
    pub total_depreciation: String,
    pub deductible: String,
    pub line_item_count: usize,
}

impl From<&ExportSummary> for SummaryView {
    fn from(summary: &ExportSummary) -> Self {
        Self {
            total_rcv: amount(summary.total_rcv),
            total_acv: amount(summary.total_acv),
            total_depreciation: amount(summary.total_depreciation),
            deductible: amount(summary.deductible),
            line_item_count: summary.line_item_count,
        }
    }
}

#[derive(Serialize, Default)]
pub struct InsuredView {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Serialize)]
pub struct XactdocView {
    pub transaction_id: String,
    pub carrier: CarrierView,
    pub estimate_type: &'static str,
    pub summary: SummaryView,
    pub insured: InsuredView,
    pub adjuster_name: String,
    pub date_of_loss: String,
    pub date_inspected: String,
    pub claim_number: String,
    pub policy_number: String,
    pub price_list: String,
    pub depreciation_type: &'static str,
    pub supplemental_note: Option<String>,
}

#[derive(Serialize)]
struct OpeningView {
    opening_type: String,
    width: String,
    height: String,
    quantity: u32,
    opens_into: Option<String>,
    goes_to_floor: &'static str,
    goes_to_ceiling: &'static str,
}

#[derive(Serialize)]
struct SubroomView {
    name: String,
    shape: &'static str,
    length: String,
    width: String,
    height: String,
    structure: Option<String>,
    openings: Vec<OpeningView>,
}

#[derive(Serialize)]
struct ItemView {
    line_num: usize,
    code: String,
    category: String,
    selector: String,
    action: String,
    description: String,
    quantity: String,
    unit: String,
    labor_total: String,
    labor_hours: String,
    material: String,
    tax: String,
    acv_total: String,
    rcv_total: String,
}

#[derive(Serialize)]
struct GroupView {
    name: String,
    room_id: Option<String>,
    sketch: bool,
    items: Vec<ItemView>,
}

#[derive(Serialize)]
struct RoughdraftView {
    subrooms: Vec<SubroomView>,
    groups: Vec<GroupView>,
}

pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    pub fn with_embedded_templates() -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        register_template_filters(&mut tera);
        tera.add_raw_templates(vec![
            (XACTDOC_TEMPLATE, include_str!("../../templates/esx/xactdoc.xml.tera")),
            (ROUGHDRAFT_TEMPLATE, include_str!("../../templates/esx/roughdraft.xml.tera")),
        ])
        .map_err(template_error)?;
        Ok(Self { tera })
    }

    pub fn render_xactdoc(&self, view: &XactdocView) -> Result<String, ExportError> {
        let context = Context::from_serialize(view).map_err(template_error)?;
        self.tera.render(XACTDOC_TEMPLATE, &context).map_err(template_error)
    }

    /// Geometry for every room, then one item group per room in room order.
    ///
    /// Lines whose room is unknown land in a trailing `Unassigned` group.
    pub fn render_roughdraft(
        &self,
        rooms: &[InspectionRoom],
        openings: &[RoomOpening],
        records: &[LineItemRecord],
    ) -> Result<String, ExportError> {
        let subrooms = rooms.iter().map(|room| subroom_view(room, openings)).collect();

        let mut groups: Vec<GroupView> = rooms
            .iter()
            .map(|room| GroupView {
                name: room.name.clone(),
                room_id: Some(room.id.0.clone()),
                sketch: room.is_exterior(),
                items: item_views(
                    records.iter().filter(|record| record.room_id.as_ref() == Some(&room.id)),
                ),
            })
            .collect();

        let orphans: Vec<&LineItemRecord> =
            records.iter().filter(|record| record.room_id.is_none()).collect();
        if !orphans.is_empty() {
            groups.push(GroupView {
                name: UNASSIGNED_ROOM.to_string(),
                room_id: None,
                sketch: false,
                items: item_views(orphans.into_iter()),
            });
        }

        let context = Context::from_serialize(RoughdraftView { subrooms, groups })
            .map_err(template_error)?;
        self.tera.render(ROUGHDRAFT_TEMPLATE, &context).map_err(template_error)
    }
}

fn template_error(error: tera::Error) -> ExportError {
    // tera nests the useful message in the source chain
    let mut message = error.to_string();
    let mut source = std::error::Error::source(&error);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    ExportError::Template(message)
}

fn subroom_view(room: &InspectionRoom, openings: &[RoomOpening]) -> SubroomView {
    let dimensions = room.dimensions.unwrap_or_default();
    let shape = if room.room_type().contains("elevation") { "elevation" } else { "box" };

    SubroomView {
        name: room.name.clone(),
        shape,
        length: amount(dimension_or(dimensions, |d| d.length, DEFAULT_LENGTH_FT)),
        width: amount(dimension_or(dimensions, |d| d.width, DEFAULT_WIDTH_FT)),
        height: amount(dimension_or(dimensions, |d| d.height, DEFAULT_HEIGHT_FT)),
        structure: room.structure.clone(),
        openings: openings
            .iter()
            .filter(|opening| opening.room_id == room.id)
            .map(|opening| OpeningView {
                opening_type: opening.opening_type.clone(),
                width: amount(opening.width_ft),
                height: amount(opening.height_ft),
                quantity: opening.quantity.max(1),
                opens_into: opening.opens_into.clone(),
                goes_to_floor: flag(opening.goes_to_floor),
                goes_to_ceiling: flag(opening.goes_to_ceiling),
            })
            .collect(),
    }
}

fn dimension_or(
    dimensions: RoomDimensions,
    pick: impl Fn(RoomDimensions) -> Option<Decimal>,
    default: i64,
) -> Decimal {
    pick(dimensions).filter(|value| *value > Decimal::ZERO).unwrap_or_else(|| Decimal::from(default))
}

fn item_views<'a>(records: impl Iterator<Item = &'a LineItemRecord>) -> Vec<ItemView> {
    records
        .enumerate()
        .map(|(index, record)| ItemView {
            line_num: index + 1,
            code: record.code.clone(),
            category: record.category.clone(),
            selector: record.selector.clone(),
            action: record.action.clone(),
            description: record.description.clone(),
            quantity: amount(record.quantity),
            unit: record.unit.clone(),
            labor_total: amount(record.labor_total),
            labor_hours: amount(record.labor_hours),
            material: amount(record.material),
            tax: amount(record.tax),
            acv_total: amount(record.acv_total),
            rcv_total: amount(record.rcv_total),
        })
        .collect()
}

fn amount(value: Decimal) -> String {
    format!("{:.2}", money(value))
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
